//! gRPC health protocol binding (`grpc.health.v1.Health`) built on
//! `tonic-health`.

use crate::{report_with_config, ReporterConfig, ReporterHandle};
use async_trait::async_trait;
use leader_health_core::{
    ConsensusSource, HealthError, Result, ServiceSet, ServingStatus, StatusSink,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::server::Router;
use tonic::transport::Server;
use tonic_health::server::HealthReporter;
use tracing::info;

/// [`StatusSink`] writing into a `tonic-health` status table.
#[derive(Clone)]
pub struct GrpcStatusSink {
    reporter: HealthReporter,
}

impl GrpcStatusSink {
    pub fn new(reporter: HealthReporter) -> Self {
        Self { reporter }
    }

    pub fn reporter(&self) -> &HealthReporter {
        &self.reporter
    }
}

fn grpc_status(status: ServingStatus) -> tonic_health::ServingStatus {
    match status {
        ServingStatus::Serving => tonic_health::ServingStatus::Serving,
        ServingStatus::NotServing => tonic_health::ServingStatus::NotServing,
    }
}

#[async_trait]
impl StatusSink for GrpcStatusSink {
    async fn set_serving_status(&self, service: &str, status: ServingStatus) {
        // HealthReporter is a cheap handle over a shared table
        let mut reporter = self.reporter.clone();
        reporter.set_service_status(service, grpc_status(status)).await;
    }
}

/// Creates a health service, starts reporting leadership into it and registers
/// it on `server`.
///
/// Returns the router to serve (add further services to it first if needed)
/// and the reporter handle.
pub async fn setup<S>(
    source: Arc<S>,
    server: &mut Server,
    services: ServiceSet,
) -> (Router, ReporterHandle)
where
    S: ConsensusSource + ?Sized,
{
    setup_with_config(source, server, services, ReporterConfig::default()).await
}

pub async fn setup_with_config<S>(
    source: Arc<S>,
    server: &mut Server,
    services: ServiceSet,
    config: ReporterConfig,
) -> (Router, ReporterHandle)
where
    S: ConsensusSource + ?Sized,
{
    let (reporter, health_service) = tonic_health::server::health_reporter();
    let handle = report_with_config(source, GrpcStatusSink::new(reporter), services, config).await;
    let router = server.add_service(health_service);
    (router, handle)
}

/// Serves `router` on `addr` until the process exits or the transport fails.
pub async fn serve(router: Router, addr: SocketAddr) -> Result<()> {
    info!("Serving gRPC health on {}", addr);
    router
        .serve(addr)
        .await
        .map_err(|e| HealthError::transport(e.to_string()))
}

/// Serves `router` on an already bound listener.
pub async fn serve_with_listener(router: Router, listener: TcpListener) -> Result<()> {
    info!("Serving gRPC health on {}", listener.local_addr()?);
    router
        .serve_with_incoming(TcpListenerStream::new(listener))
        .await
        .map_err(|e| HealthError::transport(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            grpc_status(ServingStatus::Serving),
            tonic_health::ServingStatus::Serving
        );
        assert_eq!(
            grpc_status(ServingStatus::NotServing),
            tonic_health::ServingStatus::NotServing
        );
    }
}
