//! Serves gRPC health for a simulated node whose leadership flips on a timer.
//!
//! Environment:
//! - `LEADER_HEALTH_ADDR`: listen address (default `127.0.0.1:50051`)
//! - `LEADER_HEALTH_SERVICES`: comma-separated service names (default `kv.Store`)
//! - `LEADER_HEALTH_FLIP_SECS`: seconds between leadership flips (default 5)
//! - `LEADER_HEALTH_SHARED_CHANNEL`: set to use the observer fallback path
//!
//! Query it with `grpc_health_probe -addr=127.0.0.1:50051 -service=quis.RaftLeader`.

use anyhow::Context;
use leader_health::{serve, setup, ConsensusSource, ServiceSet};
use leader_health_testing::{ChannelMode, SimulatedEngine};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tonic::transport::Server;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let addr: SocketAddr = std::env::var("LEADER_HEALTH_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:50051".to_string())
        .parse()
        .context("LEADER_HEALTH_ADDR is not a socket address")?;
    let services = ServiceSet::parse(
        &std::env::var("LEADER_HEALTH_SERVICES").unwrap_or_else(|_| "kv.Store".to_string()),
    )?;
    let flip_every = Duration::from_secs(
        std::env::var("LEADER_HEALTH_FLIP_SECS")
            .ok()
            .map(|secs| secs.parse::<u64>())
            .transpose()
            .context("LEADER_HEALTH_FLIP_SECS is not a number of seconds")?
            .unwrap_or(5)
            .max(1),
    );
    let mode = if std::env::var_os("LEADER_HEALTH_SHARED_CHANNEL").is_some() {
        ChannelMode::Shared
    } else {
        ChannelMode::Independent
    };

    let engine = Arc::new(SimulatedEngine::with_mode(mode));
    let mut server = Server::builder();
    let (router, reporter) = setup(engine.clone(), &mut server, services).await;
    info!("Reporter attached through the {} regime", reporter.regime());
    reporter.detach();

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(flip_every);
        interval.tick().await;
        loop {
            interval.tick().await;
            if engine.role().is_leader() {
                engine.become_follower().await;
            } else {
                engine.become_candidate().await;
                engine.become_leader().await;
            }
        }
    });

    serve(router, addr).await?;
    Ok(())
}
