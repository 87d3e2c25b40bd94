//! Fixed-capacity ring buffers with pluggable synchronization.
//!
//! The core type is [`Ring<T>`]: a circular FIFO of `Copy` elements sized at
//! construction, designed for producer/consumer traffic between execution
//! contexts that may be interrupt handlers, pre-scheduler boot code, or
//! tasks under a running scheduler. Rather than assuming one locking
//! discipline, every ring is built against a shared [`SyncContext`] and
//! re-evaluates the available protection on each operation:
//!
//! - with no [`MutexProvider`] installed, operations run under the
//!   context's [`InterruptMask`];
//! - once a provider is installed (typically when the scheduler starts),
//!   each ring lazily creates a provider mutex on its next operation and
//!   uses acquire/release from then on;
//! - provider failures degrade back to the interrupt mask instead of
//!   leaving data unprotected, while acquisition timeouts surface as the
//!   distinct [`RingError::LockTimeout`].
//!
//! Batch reads and writes complete in at most two contiguous copies so a
//! caller can hand the pieces to a DMA engine, and the `write_bytes` /
//! `read_bytes` escape hatches accept raw byte regions at that boundary.
//! Rings can also [`dump_into`](Ring::dump_into) one another with both
//! critical sections held in a deadlock-free order.
//!
//! # Example
//!
//! ```
//! use ringsync::{Ring, RingConfig, SyncContext};
//!
//! let ctx = SyncContext::new();
//! let ring: Ring<u32> = Ring::new(ctx, RingConfig::new(8))?;
//!
//! ring.write(1)?;
//! ring.write(2)?;
//! assert_eq!(ring.read()?, 1);
//! assert_eq!(ring.available(), 1);
//! # Ok::<(), ringsync::RingError>(())
//! ```

mod config;
mod critical;
mod error;
mod invariants;
mod ring;
pub mod sync;
mod transfer;

pub use config::RingConfig;
pub use error::RingError;
pub use ring::Ring;
pub use sync::{
    AcquireOutcome, InterruptMask, IrqToken, LockError, LockHandle, MutexProvider, SpinMask,
    SyncContext, Timeout,
};
