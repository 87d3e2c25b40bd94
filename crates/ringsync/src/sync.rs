//! The synchronization seam: the pluggable mutex provider interface, the
//! interrupt-mask fallback interface, and the [`SyncContext`] that rings are
//! constructed with.
//!
//! Three regimes are valid at any call, and may change between two calls on
//! the same ring (the boot transition from bare interrupts to a running
//! scheduler):
//!
//! 1. no provider installed — every critical section uses the interrupt mask;
//! 2. provider installed, no handle yet — the first synchronized operation
//!    creates the handle lazily;
//! 3. provider installed with a live handle — acquire/release bracket the
//!    operation.

use crossbeam_utils::Backoff;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Acquisition timeout passed through to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Block until the lock is granted (the ∞ sentinel).
    Forever,
    /// Give up after this many milliseconds. `Millis(0)` is a non-blocking
    /// probe and is what interrupt-context callers must use.
    Millis(u64),
}

/// Result of a single lock acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// The lock is held; the caller must release it.
    Acquired,
    /// The timeout elapsed before the lock was granted.
    TimedOut,
    /// The provider could not service the request (foreign handle, backend
    /// failure). The caller falls back to the interrupt mask.
    Failed,
}

/// Error from the non-acquire provider operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LockError {
    /// The handle was not created by this provider.
    #[error("lock handle was not created by this provider")]
    ForeignHandle,
    /// The underlying primitive reported a failure.
    #[error("lock primitive failed")]
    Backend,
}

/// Opaque per-ring lock handle, created and consumed by a [`MutexProvider`].
///
/// The ring core never looks inside; providers downcast to whatever concrete
/// state they put in at `create` time.
pub struct LockHandle(Box<dyn Any + Send + Sync>);

impl LockHandle {
    /// Wraps provider-specific lock state.
    pub fn new<H: Any + Send + Sync>(inner: H) -> Self {
        Self(Box::new(inner))
    }

    /// Borrows the provider-specific state, if `H` is what was stored.
    pub fn downcast_ref<H: Any>(&self) -> Option<&H> {
        self.0.downcast_ref::<H>()
    }

    /// Consumes the handle, recovering the provider-specific state.
    pub fn downcast<H: Any>(self) -> Result<Box<H>, LockHandle> {
        self.0.downcast::<H>().map_err(LockHandle)
    }
}

impl fmt::Debug for LockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LockHandle(..)")
    }
}

/// The four mutex primitives supplied by whichever scheduler is linked in.
///
/// At most one provider is active per [`SyncContext`]. Installing a new
/// provider does not migrate handles created under a previous one; acquiring
/// with a foreign handle must return [`AcquireOutcome::Failed`] rather than
/// panic, which degrades the ring to the interrupt-mask path.
pub trait MutexProvider: Send + Sync {
    /// Creates a mutex, returning `None` if the scheduler cannot allocate
    /// one. Creation failure is not fatal; rings fall back to the mask.
    fn create(&self) -> Option<LockHandle>;

    /// Destroys a mutex created by this provider.
    fn destroy(&self, handle: LockHandle) -> Result<(), LockError>;

    /// Acquires the mutex, blocking up to `timeout`.
    fn acquire(&self, handle: &LockHandle, timeout: Timeout) -> AcquireOutcome;

    /// Releases a mutex previously acquired by the calling context.
    fn release(&self, handle: &LockHandle) -> Result<(), LockError>;
}

/// Saved interrupt state returned by [`InterruptMask::save_and_disable`].
///
/// The payload is implementation-defined (a saved status word on hardware,
/// a nesting flag for the hosted stand-in) and must be passed back verbatim
/// to `restore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrqToken(pub u32);

/// The hardware interrupt-mask primitive used as the fallback lock.
///
/// `save_and_disable`/`restore` must nest: a context that disables twice and
/// restores twice in LIFO order ends up with interrupts in their original
/// state. Two-ring transfers rely on this when both rings share a context.
pub trait InterruptMask: Send + Sync {
    /// Saves the current interrupt-enable state and disables interrupts.
    fn save_and_disable(&self) -> IrqToken;

    /// Restores a previously saved state. Called on every exit path.
    fn restore(&self, token: IrqToken);
}

/// Portable stand-in for the hardware interrupt mask on hosted targets.
///
/// An owner-tracked spinlock: "disabling interrupts" means acquiring the
/// spin word, and nested saves by the owning context are no-ops, matching
/// the nesting semantics of a real save/restore pair.
pub struct SpinMask {
    owner: AtomicU64,
}

const IRQ_OUTERMOST: u32 = 0;
const IRQ_NESTED: u32 = 1;

impl SpinMask {
    pub fn new() -> Self {
        Self {
            owner: AtomicU64::new(0),
        }
    }
}

impl Default for SpinMask {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptMask for SpinMask {
    fn save_and_disable(&self) -> IrqToken {
        let me = context_id();
        if self.owner.load(Ordering::Acquire) == me {
            return IrqToken(IRQ_NESTED);
        }
        let backoff = Backoff::new();
        while self
            .owner
            .compare_exchange_weak(0, me, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            backoff.snooze();
        }
        IrqToken(IRQ_OUTERMOST)
    }

    fn restore(&self, token: IrqToken) {
        if token.0 == IRQ_OUTERMOST {
            self.owner.store(0, Ordering::Release);
        }
    }
}

/// Stable nonzero id for the calling execution context.
fn context_id() -> u64 {
    use std::cell::Cell;
    static NEXT: AtomicU64 = AtomicU64::new(1);
    thread_local! {
        static ID: Cell<u64> = const { Cell::new(0) };
    }
    ID.with(|id| {
        if id.get() == 0 {
            id.set(NEXT.fetch_add(1, Ordering::Relaxed));
        }
        id.get()
    })
}

/// Explicit synchronization context a ring is constructed with.
///
/// Replaces a hidden process-wide provider registry: unrelated rings can use
/// separate contexts and never contend, while rings that should share a boot
/// transition share one `Arc<SyncContext>`. Installing a provider is a
/// boot-sequence action; rings created earlier pick it up lazily on their
/// next synchronized operation.
pub struct SyncContext {
    provider: RwLock<Option<Arc<dyn MutexProvider>>>,
    mask: Arc<dyn InterruptMask>,
}

impl SyncContext {
    /// Creates a context with no provider and the hosted [`SpinMask`]
    /// fallback.
    pub fn new() -> Arc<Self> {
        Self::with_mask(Arc::new(SpinMask::new()))
    }

    /// Creates a context using a specific interrupt-mask implementation
    /// (a real hardware port, or a no-op mask for single-context use).
    pub fn with_mask(mask: Arc<dyn InterruptMask>) -> Arc<Self> {
        Arc::new(Self {
            provider: RwLock::new(None),
            mask,
        })
    }

    /// Installs (or replaces) the active provider.
    ///
    /// Handles already created under a previous provider are not migrated;
    /// acquiring with them fails over to the interrupt mask. Replacement is
    /// intended as a one-time boot action, not a runtime toggle.
    pub fn install_provider(&self, provider: Arc<dyn MutexProvider>) {
        *write_lossy(&self.provider) = Some(provider);
    }

    /// Removes the active provider, reverting all subsequent operations on
    /// rings of this context to the interrupt-mask fallback.
    pub fn clear_provider(&self) {
        *write_lossy(&self.provider) = None;
    }

    /// Whether a provider is currently installed.
    pub fn has_provider(&self) -> bool {
        read_lossy(&self.provider).is_some()
    }

    pub(crate) fn provider(&self) -> Option<Arc<dyn MutexProvider>> {
        read_lossy(&self.provider).clone()
    }

    pub(crate) fn mask(&self) -> &dyn InterruptMask {
        &*self.mask
    }
}

// Provider slots hold no invariant beyond the Option itself, so a poisoned
// lock is still readable.
fn read_lossy(
    slot: &RwLock<Option<Arc<dyn MutexProvider>>>,
) -> std::sync::RwLockReadGuard<'_, Option<Arc<dyn MutexProvider>>> {
    match slot.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write_lossy(
    slot: &RwLock<Option<Arc<dyn MutexProvider>>>,
) -> std::sync::RwLockWriteGuard<'_, Option<Arc<dyn MutexProvider>>> {
    match slot.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
