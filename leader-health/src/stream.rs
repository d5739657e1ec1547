//! Normalizes the engine's two leadership notification mechanisms into one
//! sequence of `bool` values.

use crate::ReporterConfig;
use futures_util::stream::{self, Stream};
use leader_health_core::{ConsensusSource, LeaderChannel, Observation, ObservationFilter, Observer};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Notification mechanism selected for a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regime {
    /// Leadership values read directly from an independent leadership channel
    Channel,
    /// Leader-change observations followed by a role query
    Observer,
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Regime::Channel => write!(f, "leadership channel"),
            Regime::Observer => write!(f, "observer"),
        }
    }
}

/// Lazy, non-restartable sequence of leadership values.
///
/// The variant is chosen once by [`LeadershipStream::subscribe`]: if two
/// requests for a leadership channel return the same handle, that channel
/// cannot serve independent subscribers and an observer is registered instead.
pub enum LeadershipStream<S: ConsensusSource + ?Sized> {
    Channel(LeaderChannel),
    Observer {
        notifications: mpsc::Receiver<Observation>,
        filter: ObservationFilter,
        source: Arc<S>,
    },
}

impl<S: ConsensusSource + ?Sized> LeadershipStream<S> {
    /// Probes the engine and subscribes through whichever mechanism supports
    /// an independent subscriber.
    pub fn subscribe(source: &Arc<S>, config: &ReporterConfig) -> Self {
        let first = source.leader_channel();
        let second = source.leader_channel();

        if first.same_channel(&second) {
            debug!("Leadership channel is shared, falling back to observer registration");
            let (tx, rx) = mpsc::channel(config.observer_capacity.max(1));
            let filter = ObservationFilter::LeaderChange;
            source.register_observer(Observer::new(tx, config.observer_blocking, filter.clone()));

            LeadershipStream::Observer {
                notifications: rx,
                filter,
                source: Arc::clone(source),
            }
        } else {
            debug!("Leadership channel supports independent subscribers");
            LeadershipStream::Channel(first)
        }
    }

    pub fn regime(&self) -> Regime {
        match self {
            LeadershipStream::Channel(_) => Regime::Channel,
            LeadershipStream::Observer { .. } => Regime::Observer,
        }
    }

    /// Waits for the next leadership value; `None` once the engine closed the
    /// underlying channel.
    ///
    /// On the observer path the notification itself is discarded and the
    /// engine's current role is read instead, so a dropped notification never
    /// leaves a stale value behind.
    pub async fn next(&mut self) -> Option<bool> {
        match self {
            LeadershipStream::Channel(channel) => channel.recv().await,
            LeadershipStream::Observer {
                notifications,
                filter,
                source,
            } => loop {
                let observation = notifications.recv().await?;
                // Engines are not trusted to apply the registered filter
                if filter.matches(&observation) {
                    return Some(source.is_leader());
                }
                trace!("Ignoring observation {:?}", observation.data);
            },
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = bool> + Send
    where
        S: Send + Sync,
    {
        stream::unfold(self, |mut leadership| async move {
            let is_leader = leadership.next().await?;
            Some((is_leader, leadership))
        })
    }
}

impl<S: ConsensusSource + ?Sized> fmt::Debug for LeadershipStream<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LeadershipStream").field(&self.regime()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use leader_health_core::{Delivery, NodeId, ObservationData, RaftRole};
    use std::sync::Mutex;

    struct FakeEngine {
        shared: Option<LeaderChannel>,
        senders: Mutex<Vec<mpsc::Sender<bool>>>,
        observers: Mutex<Vec<Observer>>,
        role: Mutex<RaftRole>,
    }

    impl FakeEngine {
        fn new(shared: bool) -> (Arc<Self>, Option<mpsc::Sender<bool>>) {
            let (shared, shared_tx) = if shared {
                let (tx, rx) = mpsc::channel(8);
                (Some(LeaderChannel::new(rx)), Some(tx))
            } else {
                (None, None)
            };
            let engine = Arc::new(Self {
                shared,
                senders: Mutex::new(Vec::new()),
                observers: Mutex::new(Vec::new()),
                role: Mutex::new(RaftRole::Follower),
            });
            (engine, shared_tx)
        }

        fn observer(&self) -> Observer {
            self.observers.lock().unwrap()[0].clone()
        }
    }

    impl ConsensusSource for FakeEngine {
        fn leader_channel(&self) -> LeaderChannel {
            if let Some(shared) = &self.shared {
                return shared.clone();
            }
            let (tx, rx) = mpsc::channel(8);
            self.senders.lock().unwrap().push(tx);
            LeaderChannel::new(rx)
        }

        fn register_observer(&self, observer: Observer) {
            self.observers.lock().unwrap().push(observer);
        }

        fn role(&self) -> RaftRole {
            *self.role.lock().unwrap()
        }
    }

    fn init_logging() {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    }

    fn leader_change() -> Observation {
        Observation::new(NodeId::from(1), ObservationData::LeaderChange { leader: None })
    }

    #[tokio::test]
    async fn test_distinct_handles_select_channel() {
        init_logging();
        let (engine, _) = FakeEngine::new(false);
        let mut leadership = LeadershipStream::subscribe(&engine, &ReporterConfig::default());

        assert_eq!(leadership.regime(), Regime::Channel);
        assert!(engine.observers.lock().unwrap().is_empty());

        let first = engine.senders.lock().unwrap()[0].clone();
        first.send(true).await.unwrap();
        assert_eq!(leadership.next().await, Some(true));

        // The second probe handle was released
        let second = engine.senders.lock().unwrap()[1].clone();
        assert!(second.is_closed());
    }

    #[tokio::test]
    async fn test_shared_handle_selects_observer() {
        init_logging();
        let (engine, shared_tx) = FakeEngine::new(true);
        let mut leadership = LeadershipStream::subscribe(&engine, &ReporterConfig::default());
        assert_eq!(leadership.regime(), Regime::Observer);
        assert_eq!(engine.observers.lock().unwrap().len(), 1);

        *engine.role.lock().unwrap() = RaftRole::Leader;
        engine.observer().deliver(leader_change()).await;
        assert_eq!(leadership.next().await, Some(true));

        // The shared channel is left untouched
        let shared_tx = shared_tx.unwrap();
        assert_eq!(shared_tx.capacity(), shared_tx.max_capacity());
    }

    #[tokio::test]
    async fn test_observer_path_reads_current_role() {
        init_logging();
        let (engine, _shared_tx) = FakeEngine::new(true);
        let mut leadership = LeadershipStream::subscribe(&engine, &ReporterConfig::default());
        let observer = engine.observer();

        *engine.role.lock().unwrap() = RaftRole::Leader;
        assert_eq!(observer.deliver(leader_change()).await, Delivery::Delivered);
        assert_eq!(observer.deliver(leader_change()).await, Delivery::Dropped);
        *engine.role.lock().unwrap() = RaftRole::Candidate;

        assert_eq!(leadership.next().await, Some(false));
    }

    #[tokio::test]
    async fn test_observer_path_ignores_unfiltered_events() {
        init_logging();
        let (engine, _shared_tx) = FakeEngine::new(true);
        let config = ReporterConfig::default().with_observer_capacity(4);
        let leadership = LeadershipStream::subscribe(&engine, &config);

        // Push straight into the buffer, bypassing the registered filter
        let raw = engine.observer().sender().clone();
        engine.observers.lock().unwrap().clear();
        raw.send(Observation::new(
            NodeId::from(1),
            ObservationData::RoleChange(RaftRole::Leader),
        ))
        .await
        .unwrap();
        raw.send(leader_change()).await.unwrap();
        drop(raw);

        *engine.role.lock().unwrap() = RaftRole::Leader;
        let values: Vec<bool> = leadership.into_stream().collect().await;
        assert_eq!(values, vec![true]);
    }

    #[tokio::test]
    async fn test_stream_ends_when_channel_closes() {
        init_logging();
        let (engine, _) = FakeEngine::new(false);
        let leadership = LeadershipStream::subscribe(&engine, &ReporterConfig::default());

        let first = engine.senders.lock().unwrap().remove(0);
        first.send(false).await.unwrap();
        first.send(true).await.unwrap();
        drop(first);
        engine.senders.lock().unwrap().clear();

        let values: Vec<bool> = leadership.into_stream().collect().await;
        assert_eq!(values, vec![false, true]);
    }
}
