//! In-memory consensus engine exposing both leadership notification
//! mechanisms, driven by explicit role transitions.

use leader_health_core::{
    ConsensusSource, Delivery, LeaderChannel, LeaderSend, LeaderSender, NodeId, Observation,
    ObservationData, Observer, ObserverId, RaftRole,
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// How [`SimulatedEngine`] answers repeated leadership channel requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    /// Every request returns the same long-lived handle
    Shared,
    /// Every request returns a new, independent channel
    Independent,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub channel_mode: ChannelMode,
    pub leader_channel_capacity: usize,
    pub initial_role: RaftRole,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            channel_mode: ChannelMode::Independent,
            leader_channel_capacity: 64,
            initial_role: RaftRole::Follower,
        }
    }
}

impl EngineConfig {
    pub fn new(channel_mode: ChannelMode) -> Self {
        Self {
            channel_mode,
            ..Default::default()
        }
    }

    pub fn with_initial_role(mut self, role: RaftRole) -> Self {
        self.initial_role = role;
        self
    }

    pub fn with_leader_channel_capacity(mut self, capacity: usize) -> Self {
        self.leader_channel_capacity = capacity.max(1);
        self
    }
}

/// Statistics about notifications published by the engine
#[derive(Debug, Default, Clone)]
pub struct EngineStats {
    pub leader_channel_requests: u64,
    pub observers_registered: u64,
    pub role_transitions: u64,
    pub leader_values_sent: u64,
    /// Values that overwrote an unread value in a full channel
    pub leader_values_replaced: u64,
    pub observations_delivered: u64,
    pub observations_filtered: u64,
    pub observations_dropped: u64,
}

struct SharedChannel {
    sender: LeaderSender,
    handle: LeaderChannel,
}

/// Simulated consensus engine for a single local node.
///
/// Role transitions publish the new leadership value on every open leadership
/// channel and a [`ObservationData::RoleChange`] observation, followed by a
/// [`ObservationData::LeaderChange`] observation whenever leadership flips.
pub struct SimulatedEngine {
    node_id: NodeId,
    config: EngineConfig,
    role: RwLock<RaftRole>,
    shared: Mutex<Option<SharedChannel>>,
    leader_senders: Mutex<Vec<LeaderSender>>,
    observers: RwLock<HashMap<ObserverId, Observer>>,
    stats: Mutex<EngineStats>,
    shut_down: RwLock<bool>,
}

impl SimulatedEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            node_id: NodeId::new(),
            role: RwLock::new(config.initial_role),
            config,
            shared: Mutex::new(None),
            leader_senders: Mutex::new(Vec::new()),
            observers: RwLock::new(HashMap::new()),
            stats: Mutex::new(EngineStats::default()),
            shut_down: RwLock::new(false),
        }
    }

    pub fn with_mode(channel_mode: ChannelMode) -> Self {
        Self::new(EngineConfig::new(channel_mode))
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn stats(&self) -> EngineStats {
        self.stats.lock().clone()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    /// Independent leadership channels whose receiver is still alive
    pub fn open_leader_channels(&self) -> usize {
        self.leader_senders
            .lock()
            .iter()
            .filter(|sender| !sender.is_closed())
            .count()
    }

    /// Values buffered in the shared leadership channel and not yet read
    pub fn shared_channel_backlog(&self) -> usize {
        match self.shared.lock().as_ref() {
            Some(shared) => shared.sender.pending(),
            None => 0,
        }
    }

    pub fn is_shut_down(&self) -> bool {
        *self.shut_down.read()
    }

    pub async fn become_leader(&self) {
        self.set_role(RaftRole::Leader).await;
    }

    pub async fn become_follower(&self) {
        self.set_role(RaftRole::Follower).await;
    }

    pub async fn become_candidate(&self) {
        self.set_role(RaftRole::Candidate).await;
    }

    /// Moves the local node to `role` and publishes the transition.
    pub async fn set_role(&self, role: RaftRole) {
        if self.is_shut_down() {
            warn!("Ignoring transition to {} on a shut down engine", role);
            return;
        }

        let previous = std::mem::replace(&mut *self.role.write(), role);
        if previous == role {
            return;
        }

        self.stats.lock().role_transitions += 1;
        info!("Node {} moved from {} to {}", self.node_id, previous, role);

        self.emit(ObservationData::RoleChange(role)).await;

        if previous.is_leader() != role.is_leader() {
            self.send_leadership(role.is_leader());
            let leader = role.is_leader().then_some(self.node_id);
            self.emit(ObservationData::LeaderChange { leader }).await;
        }
    }

    /// Hands an observation to every registered observer.
    pub async fn emit(&self, data: ObservationData) {
        let observation = Observation::new(self.node_id, data);
        let observers: Vec<Observer> = self.observers.read().values().cloned().collect();

        let mut delivered = 0;
        let mut filtered = 0;
        let mut dropped = 0;
        let mut closed = Vec::new();

        for observer in observers {
            match observer.deliver(observation.clone()).await {
                Delivery::Delivered => delivered += 1,
                Delivery::Filtered => filtered += 1,
                Delivery::Dropped => dropped += 1,
                Delivery::Closed => closed.push(observer.id()),
            }
        }

        if !closed.is_empty() {
            let mut observers = self.observers.write();
            for id in closed {
                observers.remove(&id);
                debug!("Removed closed observer {}", id);
            }
        }

        {
            let mut stats = self.stats.lock();
            stats.observations_delivered += delivered;
            stats.observations_filtered += filtered;
            stats.observations_dropped += dropped;
        }

        debug!(
            "Observation {:?}: delivered={}, filtered={}, dropped={}",
            observation.data, delivered, filtered, dropped
        );
    }

    /// Closes every leadership channel and observer, as an engine does on
    /// shutdown.
    pub fn shutdown(&self) {
        *self.shut_down.write() = true;
        *self.role.write() = RaftRole::Shutdown;

        self.shared.lock().take();
        self.leader_senders.lock().clear();
        self.observers.write().clear();

        info!("Simulated engine for node {} shut down", self.node_id);
    }

    fn send_leadership(&self, is_leader: bool) {
        let mut sent = 0;
        let mut replaced = 0;
        let mut record = |outcome: LeaderSend| match outcome {
            LeaderSend::Sent => {
                sent += 1;
                true
            }
            LeaderSend::Replaced => {
                sent += 1;
                replaced += 1;
                true
            }
            LeaderSend::Closed => false,
        };

        if let Some(shared) = self.shared.lock().as_ref() {
            record(shared.sender.send_latest(is_leader));
        }

        self.leader_senders
            .lock()
            .retain(|sender| record(sender.send_latest(is_leader)));

        if replaced > 0 {
            debug!("Overwrote unread leadership value on {} channel(s)", replaced);
        }

        let mut stats = self.stats.lock();
        stats.leader_values_sent += sent;
        stats.leader_values_replaced += replaced;
    }

    fn closed_channel() -> LeaderChannel {
        let (_, channel) = LeaderChannel::bounded(1);
        channel
    }
}

impl ConsensusSource for SimulatedEngine {
    fn leader_channel(&self) -> LeaderChannel {
        self.stats.lock().leader_channel_requests += 1;

        if self.is_shut_down() {
            return Self::closed_channel();
        }

        let capacity = self.config.leader_channel_capacity.max(1);
        match self.config.channel_mode {
            ChannelMode::Shared => {
                let mut shared = self.shared.lock();
                if let Some(existing) = shared.as_ref() {
                    return existing.handle.clone();
                }
                let (sender, handle) = LeaderChannel::bounded(capacity);
                *shared = Some(SharedChannel {
                    sender,
                    handle: handle.clone(),
                });
                handle
            }
            ChannelMode::Independent => {
                let (sender, channel) = LeaderChannel::bounded(capacity);
                self.leader_senders.lock().push(sender);
                channel
            }
        }
    }

    fn register_observer(&self, observer: Observer) {
        if self.is_shut_down() {
            debug!("Dropping observer {} registered after shutdown", observer.id());
            return;
        }

        let id = observer.id();
        self.observers.write().insert(id, observer);
        self.stats.lock().observers_registered += 1;
        debug!("Registered observer {}", id);
    }

    fn role(&self) -> RaftRole {
        *self.role.read()
    }
}
