use thiserror::Error;

/// Error types for ring operations.
///
/// A full or empty ring is a routine condition in a producer/consumer
/// system, so every variant is returned as a value to the immediate
/// caller; nothing here aborts. `LockTimeout` is deliberately distinct
/// from `Full`/`Empty` so callers can tell "no capacity" apart from
/// "could not get the lock in time".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RingError {
    /// Write rejected: the ring holds `capacity` elements.
    #[error("ring is full")]
    Full,
    /// Read rejected: the ring holds no elements.
    #[error("ring is empty")]
    Empty,
    /// Synchronized acquisition exceeded its timeout.
    #[error("lock acquisition timed out")]
    LockTimeout,
    /// Byte-level operation with a length that is not a whole number of
    /// elements.
    #[error("incompatible element size (element is {expected} bytes, got {got} bytes)")]
    IncompatibleElementSize {
        /// Element size of the ring in bytes.
        expected: usize,
        /// Byte length the caller supplied.
        got: usize,
    },
    /// Backing storage could not be obtained at construction time.
    /// No partial ring is created.
    #[error("storage allocation of {bytes} bytes failed")]
    AllocationFailed {
        /// Total byte size that was requested.
        bytes: usize,
    },
    /// Defensive check tripped: the observed count exceeds the capacity.
    /// This indicates a prior uncoordinated mutation; the operation
    /// aborts rather than trusting the state.
    #[error("ring corrupted: count {count} exceeds capacity {capacity}")]
    Corrupted {
        /// Element count that was observed.
        count: usize,
        /// Fixed capacity of the ring.
        capacity: usize,
    },
}
