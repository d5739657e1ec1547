/// Default depth of the observer buffer: at most one pending notification.
pub const DEFAULT_OBSERVER_CAPACITY: usize = 1;

#[derive(Debug, Clone)]
pub struct ReporterConfig {
    /// Buffer depth of the observer registered when the engine only offers a
    /// shared leadership channel. Clamped to at least one.
    pub observer_capacity: usize,
    /// Whether the engine should wait for buffer space instead of dropping
    /// notifications while one is still pending.
    pub observer_blocking: bool,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            observer_capacity: DEFAULT_OBSERVER_CAPACITY,
            observer_blocking: false,
        }
    }
}

impl ReporterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_observer_capacity(mut self, capacity: usize) -> Self {
        self.observer_capacity = capacity.max(1);
        self
    }

    pub fn with_observer_blocking(mut self, blocking: bool) -> Self {
        self.observer_blocking = blocking;
        self
    }
}
