//! # Core Types
//!
//! Roles reported by the consensus engine, the serving status written to the
//! health table, and the set of service names that track leadership.

use crate::{HealthError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

/// Service name that always tracks leadership, whatever else is configured.
pub const DEFAULT_LEADER_SERVICE: &str = "quis.RaftLeader";

/// Unique identifier for a node in the consensus cluster.
///
/// # Examples
///
/// ```rust
/// use leader_health_core::NodeId;
///
/// let node_id = NodeId::new();
/// assert_ne!(node_id, NodeId::new());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Creates a new random node identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&id.to_be_bytes());
        Self(Uuid::from_bytes(bytes))
    }
}

/// Role of the local node inside its consensus group.
///
/// Only [`RaftRole::Leader`] maps to a serving status; every other role,
/// including the transient candidate role, is reported as not serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RaftRole {
    Follower,
    Candidate,
    Leader,
    Shutdown,
}

impl RaftRole {
    pub fn is_leader(&self) -> bool {
        matches!(self, RaftRole::Leader)
    }
}

impl fmt::Display for RaftRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RaftRole::Follower => write!(f, "Follower"),
            RaftRole::Candidate => write!(f, "Candidate"),
            RaftRole::Leader => write!(f, "Leader"),
            RaftRole::Shutdown => write!(f, "Shutdown"),
        }
    }
}

/// Serving status written to the health table for a single service name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServingStatus {
    Serving,
    NotServing,
}

impl ServingStatus {
    /// Maps a leadership flag onto a serving status.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use leader_health_core::ServingStatus;
    ///
    /// assert_eq!(ServingStatus::from_leadership(true), ServingStatus::Serving);
    /// assert_eq!(ServingStatus::from_leadership(false), ServingStatus::NotServing);
    /// ```
    pub fn from_leadership(is_leader: bool) -> Self {
        if is_leader {
            ServingStatus::Serving
        } else {
            ServingStatus::NotServing
        }
    }

    pub fn is_serving(&self) -> bool {
        matches!(self, ServingStatus::Serving)
    }
}

impl fmt::Display for ServingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServingStatus::Serving => write!(f, "SERVING"),
            ServingStatus::NotServing => write!(f, "NOT_SERVING"),
        }
    }
}

fn default_leader_service() -> String {
    DEFAULT_LEADER_SERVICE.to_string()
}

/// Ordered set of service names whose serving status tracks leadership.
///
/// Besides the configured names, every set carries one reserved leader service
/// name ([`DEFAULT_LEADER_SERVICE`] unless overridden) that is always written
/// last.
///
/// # Examples
///
/// ```rust
/// use leader_health_core::ServiceSet;
///
/// let services = ServiceSet::new(["a", "b"]).with_leader_service("R");
/// let names: Vec<&str> = services.tracked_names().collect();
/// assert_eq!(names, vec!["a", "b", "R"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSet {
    services: Vec<String>,
    #[serde(default = "default_leader_service")]
    leader_service: String,
}

impl ServiceSet {
    /// Creates a set from the given names, keeping their order.
    pub fn new<I, S>(services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            services: services.into_iter().map(Into::into).collect(),
            leader_service: default_leader_service(),
        }
    }

    /// A set that only tracks the reserved leader service.
    pub fn leader_only() -> Self {
        Self::new(Vec::<String>::new())
    }

    /// Creates a set and validates it, rejecting empty or repeated names.
    pub fn try_new<I, S>(services: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set = Self::new(services);
        set.validate()?;
        Ok(set)
    }

    /// Parses a comma-separated list such as `"kv.Store, kv.Admin"`.
    ///
    /// Surrounding whitespace is trimmed and empty segments are skipped, so an
    /// empty string yields a set tracking only the leader service.
    pub fn parse(list: &str) -> Result<Self> {
        Self::try_new(
            list.split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty()),
        )
    }

    /// Replaces the reserved leader service name.
    pub fn with_leader_service(mut self, name: impl Into<String>) -> Self {
        self.leader_service = name.into();
        self
    }

    /// Checks that every tracked name is non-empty and appears only once.
    ///
    /// The empty name is reserved by the gRPC health protocol for the overall
    /// server status, so it is never a valid tracked name.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for name in self.tracked_names() {
            if name.trim().is_empty() {
                return Err(HealthError::invalid_service(
                    name,
                    "service name must not be empty",
                ));
            }
            if !seen.insert(name) {
                return Err(HealthError::DuplicateService {
                    name: name.to_string(),
                });
            }
        }
        Ok(())
    }

    /// The configured names, without the reserved leader service.
    pub fn services(&self) -> &[String] {
        &self.services
    }

    pub fn leader_service(&self) -> &str {
        &self.leader_service
    }

    /// Every name written on a status update: configured names in order,
    /// then the reserved leader service.
    pub fn tracked_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.services
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.leader_service.as_str()))
    }

    /// Number of tracked names, the reserved leader service included.
    pub fn len(&self) -> usize {
        self.services.len() + 1
    }

    /// Always `false`: the reserved leader service is always tracked.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Default for ServiceSet {
    fn default() -> Self {
        Self::leader_only()
    }
}

impl fmt::Display for ServiceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.tracked_names().collect();
        write!(f, "[{}]", names.join(", "))
    }
}
