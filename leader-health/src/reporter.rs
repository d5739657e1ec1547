//! Background task reflecting leadership into a status sink.

use crate::{LeadershipStream, Regime, ReporterConfig};
use futures_util::StreamExt;
use leader_health_core::{ConsensusSource, ServiceSet, ServingStatus, StatusSink};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Starts reflecting the engine's leadership into `sink` for every name in
/// `services`, using the default [`ReporterConfig`].
///
/// The current role is written once before this function returns; every later
/// change is applied by a background task. See [`report_with_config`].
pub async fn report<S, K>(source: Arc<S>, sink: K, services: ServiceSet) -> ReporterHandle
where
    S: ConsensusSource + ?Sized,
    K: StatusSink,
{
    report_with_config(source, sink, services, ReporterConfig::default()).await
}

/// Starts reflecting the engine's leadership into `sink`.
///
/// The subscription is taken before the current role is read, so a transition
/// racing with startup is never missed. The spawned task runs until the engine
/// closes its notification channel; dropping the returned handle leaves it
/// running.
pub async fn report_with_config<S, K>(
    source: Arc<S>,
    sink: K,
    services: ServiceSet,
    config: ReporterConfig,
) -> ReporterHandle
where
    S: ConsensusSource + ?Sized,
    K: StatusSink,
{
    let leadership = LeadershipStream::subscribe(&source, &config);
    let regime = leadership.regime();
    info!(
        "Reporting leadership for {} through the {} regime",
        services, regime
    );

    let is_leader = source.is_leader();
    publish(&sink, &services, is_leader).await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(run_reporter(leadership, sink, services, shutdown_rx));

    ReporterHandle {
        regime,
        shutdown_tx,
        task,
    }
}

/// Writes one leadership determination to every tracked name: configured
/// names in order, then the reserved leader service.
///
/// The batch is not atomic; a concurrent reader of the sink may observe it
/// half applied.
pub async fn publish<K>(sink: &K, services: &ServiceSet, is_leader: bool)
where
    K: StatusSink + ?Sized,
{
    let status = ServingStatus::from_leadership(is_leader);
    for name in services.tracked_names() {
        sink.set_serving_status(name, status).await;
    }
}

async fn run_reporter<S, K>(
    leadership: LeadershipStream<S>,
    sink: K,
    services: ServiceSet,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    S: ConsensusSource + ?Sized,
    K: StatusSink,
{
    let updates = leadership.into_stream();
    tokio::pin!(updates);

    // Set once the handle is dropped; from then on only the engine can end the loop
    let mut detached = false;

    loop {
        tokio::select! {
            changed = shutdown_rx.changed(), if !detached => {
                match changed {
                    Ok(()) if *shutdown_rx.borrow() => {
                        debug!("Leadership reporter stopped");
                        break;
                    }
                    Ok(()) => {}
                    Err(_) => detached = true,
                }
            }
            update = updates.next() => {
                match update {
                    Some(is_leader) => {
                        debug!(
                            "Leadership changed, marking {} as {}",
                            services,
                            ServingStatus::from_leadership(is_leader)
                        );
                        publish(&sink, &services, is_leader).await;
                    }
                    None => {
                        debug!("Leadership notifications closed, reporter exiting");
                        break;
                    }
                }
            }
        }
    }
}

/// Handle to a running leadership reporter.
///
/// Dropping the handle detaches the task: it keeps reporting until the engine
/// closes its notification channel.
#[derive(Debug)]
pub struct ReporterHandle {
    regime: Regime,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReporterHandle {
    /// Notification mechanism chosen when the reporter subscribed
    pub fn regime(&self) -> Regime {
        self.regime
    }

    /// Returns `true` once the background task has ended.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the background task and waits for it to end. Statuses keep the
    /// last value written.
    pub async fn stop(self) {
        if self.shutdown_tx.send(true).is_err() {
            debug!("Leadership reporter already finished");
        }

        if let Err(e) = self.task.await {
            warn!("Leadership reporter task failed: {}", e);
        }
    }

    /// Lets the task run for the rest of the process lifetime.
    pub fn detach(self) {}
}
