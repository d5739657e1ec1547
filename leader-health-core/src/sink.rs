//! Serving-status table abstraction written by the leadership reporter.

use crate::ServingStatus;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::trace;

/// Destination of serving-status updates, usually a health server's table.
///
/// Setting the same status twice has no further effect. Failures are the
/// sink's own concern and are never reported back to the caller.
#[async_trait]
pub trait StatusSink: Send + Sync + 'static {
    async fn set_serving_status(&self, service: &str, status: ServingStatus);
}

#[async_trait]
impl<T: StatusSink + ?Sized> StatusSink for Arc<T> {
    async fn set_serving_status(&self, service: &str, status: ServingStatus) {
        (**self).set_serving_status(service, status).await
    }
}

/// In-memory status table, safe for one writer and any number of readers.
#[derive(Debug, Default)]
pub struct InMemoryStatusTable {
    statuses: DashMap<String, ServingStatus>,
}

impl InMemoryStatusTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, service: &str) -> Option<ServingStatus> {
        self.statuses.get(service).map(|entry| *entry.value())
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    /// Copy of the table sorted by service name
    pub fn snapshot(&self) -> Vec<(String, ServingStatus)> {
        let mut entries: Vec<(String, ServingStatus)> = self
            .statuses
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn set(&self, service: &str, status: ServingStatus) {
        trace!("Setting {} to {}", service, status);
        self.statuses.insert(service.to_string(), status);
    }
}

#[async_trait]
impl StatusSink for InMemoryStatusTable {
    async fn set_serving_status(&self, service: &str, status: ServingStatus) {
        self.set(service, status);
    }
}
