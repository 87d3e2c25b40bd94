use crate::sync::Timeout;

/// Configuration for a [`Ring`](crate::Ring) instance.
#[derive(Debug, Clone, Copy)]
pub struct RingConfig {
    /// Number of elements the ring can hold. Fixed for the instance's
    /// lifetime; any value ≥ 1 is valid (no power-of-two requirement).
    pub capacity: usize,
    /// Timeout applied to every synchronized lock acquisition once a
    /// provider is installed. Callers in interrupt context should use
    /// `Timeout::Millis(0)` so an acquisition never blocks.
    pub acquire_timeout: Timeout,
}

impl RingConfig {
    /// Creates a configuration with the given capacity and a blocking
    /// (infinite) acquire timeout.
    pub const fn new(capacity: usize) -> Self {
        Self {
            capacity,
            acquire_timeout: Timeout::Forever,
        }
    }

    /// Sets the lock acquisition timeout.
    pub const fn acquire_timeout(mut self, timeout: Timeout) -> Self {
        self.acquire_timeout = timeout;
        self
    }
}
