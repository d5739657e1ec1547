//! # Leader Health Core
//!
//! Shared vocabulary for reflecting a consensus node's leadership into a
//! health-check serving-status table.
//!
//! ## Components
//!
//! - **ConsensusSource**: the consensus engine surface (leadership channel,
//!   observer registration, current role query)
//! - **StatusSink**: the serving-status table a health server reads from
//! - **ServiceSet**: ordered service names that track leadership, plus the
//!   reserved leader service
//! - **Error Handling**: configuration and transport errors
//!
//! ## Example
//!
//! ```rust
//! use leader_health_core::{InMemoryStatusTable, ServiceSet, ServingStatus, StatusSink};
//!
//! # tokio_test::block_on(async {
//! let table = InMemoryStatusTable::new();
//! let services = ServiceSet::new(["kv.Store"]);
//!
//! for name in services.tracked_names() {
//!     table.set_serving_status(name, ServingStatus::NotServing).await;
//! }
//! assert_eq!(table.get("quis.RaftLeader"), Some(ServingStatus::NotServing));
//! # });
//! ```

pub mod error;
pub mod sink;
pub mod source;
pub mod types;

pub use error::*;
pub use sink::{InMemoryStatusTable, StatusSink};
pub use source::{
    ConsensusSource, Delivery, LeaderChannel, LeaderSend, LeaderSender, Observation,
    ObservationData, ObservationFilter, Observer, ObserverId,
};
pub use types::*;
