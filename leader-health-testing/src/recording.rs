//! Status sink that remembers every call, for order and convergence checks.

use async_trait::async_trait;
use leader_health_core::{InMemoryStatusTable, ServiceSet, ServingStatus, StatusSink};
use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCall {
    pub service: String,
    pub status: ServingStatus,
}

impl StatusCall {
    pub fn new(service: impl Into<String>, status: ServingStatus) -> Self {
        Self {
            service: service.into(),
            status,
        }
    }
}

#[derive(Default)]
pub struct RecordingSink {
    table: InMemoryStatusTable,
    calls: Mutex<Vec<StatusCall>>,
    changed: Notify,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<StatusCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn status(&self, service: &str) -> Option<ServingStatus> {
        self.table.get(service)
    }

    pub fn table(&self) -> &InMemoryStatusTable {
        &self.table
    }

    /// Current status of every tracked name, in tracking order
    pub fn tracked_statuses(&self, services: &ServiceSet) -> Vec<(String, Option<ServingStatus>)> {
        services
            .tracked_names()
            .map(|name| (name.to_string(), self.status(name)))
            .collect()
    }

    pub fn all_tracked(&self, services: &ServiceSet, status: ServingStatus) -> bool {
        services
            .tracked_names()
            .all(|name| self.status(name) == Some(status))
    }

    /// Waits until `predicate` holds or `timeout` elapses; returns whether it
    /// held.
    pub async fn wait_for<F>(&self, timeout: Duration, predicate: F) -> bool
    where
        F: Fn(&Self) -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.changed.notified();
            if predicate(self) {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return predicate(self);
            }
        }
    }

    pub async fn wait_for_tracked(
        &self,
        services: &ServiceSet,
        status: ServingStatus,
        timeout: Duration,
    ) -> bool {
        self.wait_for(timeout, |sink| sink.all_tracked(services, status))
            .await
    }

    pub async fn wait_for_calls(&self, count: usize, timeout: Duration) -> bool {
        self.wait_for(timeout, |sink| sink.call_count() >= count).await
    }
}

#[async_trait]
impl StatusSink for RecordingSink {
    async fn set_serving_status(&self, service: &str, status: ServingStatus) {
        self.table.set(service, status);
        self.calls.lock().push(StatusCall::new(service, status));
        self.changed.notify_waiters();
    }
}
