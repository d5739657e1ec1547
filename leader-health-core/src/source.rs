//! Consensus engine surface consumed by the leadership reporter.
//!
//! An engine exposes leadership in up to two ways: a leadership channel that
//! carries `bool` values directly, and an observer registry that delivers
//! generic [`Observation`]s which only announce that something changed.

use crate::{NodeId, RaftRole};
use parking_lot::Mutex;
use std::fmt;
use std::future::poll_fn;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use uuid::Uuid;

/// Handle to a leadership channel handed out by a consensus engine.
///
/// Engines that only support one long-lived subscription return clones of the
/// same handle on every request; [`LeaderChannel::same_channel`] tells the two
/// cases apart. Only one task should wait on a given channel at a time.
#[derive(Clone)]
pub struct LeaderChannel {
    inner: Arc<Mutex<mpsc::Receiver<bool>>>,
}

impl LeaderChannel {
    pub fn new(receiver: mpsc::Receiver<bool>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(receiver)),
        }
    }

    /// Creates a channel whose sender overwrites the oldest pending value
    /// when the buffer is full.
    pub fn bounded(capacity: usize) -> (LeaderSender, LeaderChannel) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let channel = Self::new(receiver);
        let sender = LeaderSender {
            sender,
            receiver: Arc::downgrade(&channel.inner),
        };
        (sender, channel)
    }

    /// Returns `true` if both handles read from the same underlying channel.
    pub fn same_channel(&self, other: &LeaderChannel) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Waits for the next leadership value; `None` once the engine closed the
    /// channel.
    pub async fn recv(&self) -> Option<bool> {
        // The lock is only held while polling, never across a suspension
        poll_fn(|cx| self.inner.lock().poll_recv(cx)).await
    }
}

impl fmt::Debug for LeaderChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeaderChannel")
            .field("handle", &Arc::as_ptr(&self.inner))
            .finish()
    }
}

/// Outcome of [`LeaderSender::send_latest`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderSend {
    Sent,
    /// The buffer was full; the oldest pending value was discarded
    Replaced,
    /// Every handle to the channel is gone
    Closed,
}

/// Engine side of a [`LeaderChannel`] created with [`LeaderChannel::bounded`].
///
/// Does not keep the channel alive: once every [`LeaderChannel`] handle is
/// dropped the sender reports [`LeaderSend::Closed`].
#[derive(Debug, Clone)]
pub struct LeaderSender {
    sender: mpsc::Sender<bool>,
    receiver: Weak<Mutex<mpsc::Receiver<bool>>>,
}

impl LeaderSender {
    /// Queues `value` without waiting. A full buffer loses its oldest value,
    /// so the most recent leadership value always reaches the reader.
    pub fn send_latest(&self, value: bool) -> LeaderSend {
        match self.sender.try_send(value) {
            Ok(()) => return LeaderSend::Sent,
            Err(TrySendError::Closed(_)) => return LeaderSend::Closed,
            Err(TrySendError::Full(_)) => {}
        }

        let Some(receiver) = self.receiver.upgrade() else {
            return LeaderSend::Closed;
        };
        let mut receiver = receiver.lock();
        loop {
            match receiver.try_recv() {
                Ok(_) | Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => return LeaderSend::Closed,
            }
            match self.sender.try_send(value) {
                Ok(()) => return LeaderSend::Replaced,
                Err(TrySendError::Closed(_)) => return LeaderSend::Closed,
                Err(TrySendError::Full(_)) => {}
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Values queued and not yet read
    pub fn pending(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }
}

/// Payload of an engine observation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservationData {
    /// The cluster leader changed; `None` while no leader is known
    LeaderChange { leader: Option<NodeId> },

    /// The local node moved to a new role
    RoleChange(RaftRole),

    /// A peer was added to or removed from the configuration
    PeerChange { peer: NodeId, removed: bool },

    /// A vote was requested from the local node
    RequestVote { candidate: NodeId, term: u64 },

    /// Heartbeats to a peer started failing
    FailedHeartbeat { peer: NodeId },
}

/// Notification emitted by the engine whenever an observable event fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub node_id: NodeId,
    pub data: ObservationData,
}

impl Observation {
    pub fn new(node_id: NodeId, data: ObservationData) -> Self {
        Self { node_id, data }
    }

    pub fn is_leader_change(&self) -> bool {
        matches!(self.data, ObservationData::LeaderChange { .. })
    }
}

/// Predicate deciding which observations reach an observer
#[derive(Clone)]
pub enum ObservationFilter {
    /// Every observation
    All,

    /// Leader changes only
    LeaderChange,

    /// Local role changes only
    RoleChange,

    /// Custom filter function
    Custom(Arc<dyn Fn(&Observation) -> bool + Send + Sync>),
}

impl ObservationFilter {
    pub fn matches(&self, observation: &Observation) -> bool {
        match self {
            ObservationFilter::All => true,
            ObservationFilter::LeaderChange => observation.is_leader_change(),
            ObservationFilter::RoleChange => {
                matches!(observation.data, ObservationData::RoleChange(_))
            }
            ObservationFilter::Custom(func) => func(observation),
        }
    }
}

impl fmt::Debug for ObservationFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObservationFilter::All => write!(f, "All"),
            ObservationFilter::LeaderChange => write!(f, "LeaderChange"),
            ObservationFilter::RoleChange => write!(f, "RoleChange"),
            ObservationFilter::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Unique identifier for a registered observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(Uuid);

impl ObserverId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ObserverId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of handing one observation to an observer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// Rejected by the observer's filter
    Filtered,
    /// Buffer full on a non-blocking observer
    Dropped,
    /// Receiving side is gone
    Closed,
}

/// Registration passed to [`ConsensusSource::register_observer`].
///
/// A blocking observer makes the engine wait for buffer space; a non-blocking
/// one drops observations while its buffer is full.
#[derive(Debug, Clone)]
pub struct Observer {
    id: ObserverId,
    sender: mpsc::Sender<Observation>,
    blocking: bool,
    filter: ObservationFilter,
}

impl Observer {
    pub fn new(
        sender: mpsc::Sender<Observation>,
        blocking: bool,
        filter: ObservationFilter,
    ) -> Self {
        Self {
            id: ObserverId::new(),
            sender,
            blocking,
            filter,
        }
    }

    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Raw buffer sender, for engines that deliver on their own terms
    pub fn sender(&self) -> &mpsc::Sender<Observation> {
        &self.sender
    }

    pub fn is_blocking(&self) -> bool {
        self.blocking
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub fn accepts(&self, observation: &Observation) -> bool {
        self.filter.matches(observation)
    }

    /// Delivers an observation according to the observer's filter and
    /// blocking policy. Engines call this for every observable event.
    pub async fn deliver(&self, observation: Observation) -> Delivery {
        if !self.accepts(&observation) {
            return Delivery::Filtered;
        }

        if self.blocking {
            match self.sender.send(observation).await {
                Ok(()) => Delivery::Delivered,
                Err(_) => Delivery::Closed,
            }
        } else {
            match self.sender.try_send(observation) {
                Ok(()) => Delivery::Delivered,
                Err(mpsc::error::TrySendError::Full(_)) => Delivery::Dropped,
                Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Closed,
            }
        }
    }
}

/// The consensus engine as seen by the leadership reporter.
///
/// Implementations wrap a real engine; the reporter only subscribes and
/// queries, it never drives elections.
pub trait ConsensusSource: Send + Sync + 'static {
    /// Requests a leadership channel. Whether repeated calls return the same
    /// handle is engine-dependent.
    fn leader_channel(&self) -> LeaderChannel;

    /// Registers an observer for engine events.
    fn register_observer(&self, observer: Observer);

    /// Current role of the local node.
    fn role(&self) -> RaftRole;

    fn is_leader(&self) -> bool {
        self.role().is_leader()
    }
}
