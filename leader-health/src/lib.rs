//! # Leader Health
//!
//! Reflects a consensus node's leadership into a health-check serving-status
//! table, so load balancers can route to the current leader.
//!
//! Every configured service name, plus the reserved `quis.RaftLeader` name, is
//! marked SERVING while the local node is leader and NOT_SERVING otherwise.
//!
//! ## Subscription
//!
//! Engines expose leadership through a leadership channel, an observer
//! registry, or both. The reporter requests the leadership channel twice: two
//! distinct handles mean independent subscriptions are supported and values are
//! read from the first handle. An identical handle means the channel is shared,
//! so an observer filtered to leader changes is registered instead and the
//! engine's current role is re-read on every notification.
//!
//! ## Example
//!
//! ```rust,no_run
//! use leader_health::{serve, setup, ServiceSet};
//! # use leader_health::ConsensusSource;
//! # use std::sync::Arc;
//! # async fn run(engine: Arc<impl ConsensusSource>) -> leader_health::Result<()> {
//! let mut server = tonic::transport::Server::builder();
//! let (router, _reporter) = setup(engine, &mut server, ServiceSet::new(["kv.Store"])).await;
//! serve(router, "0.0.0.0:50051".parse().unwrap()).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod grpc;
pub mod reporter;
pub mod stream;

pub use config::ReporterConfig;
pub use grpc::{serve, serve_with_listener, setup, setup_with_config, GrpcStatusSink};
pub use reporter::{publish, report, report_with_config, ReporterHandle};
pub use stream::{LeadershipStream, Regime};

pub use leader_health_core::{
    ConsensusSource, HealthError, InMemoryStatusTable, Result, ServiceSet, ServingStatus,
    StatusSink, DEFAULT_LEADER_SERVICE,
};
