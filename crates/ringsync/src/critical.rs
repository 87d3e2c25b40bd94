//! Per-operation critical-section strategy.
//!
//! Every mutating ring operation starts by calling [`SyncState::enter`],
//! which decides between the provider mutex and the interrupt mask and
//! returns a tagged [`CriticalGuard`]. The matching "leave" is the guard's
//! `Drop` impl, which pattern-matches the tag — the release path can never
//! disagree with the acquire path, and early error returns restore state on
//! every exit.

use crate::sync::{
    AcquireOutcome, InterruptMask, IrqToken, LockHandle, MutexProvider, SyncContext, Timeout,
};
use crate::RingError;
use std::sync::{Arc, OnceLock};

/// Per-ring synchronization state: the shared context plus the lazily
/// created lock handle.
pub(crate) struct SyncState {
    ctx: Arc<SyncContext>,
    handle: OnceLock<LockHandle>,
}

impl SyncState {
    pub(crate) fn new(ctx: Arc<SyncContext>) -> Self {
        Self {
            ctx,
            handle: OnceLock::new(),
        }
    }

    pub(crate) fn context(&self) -> &Arc<SyncContext> {
        &self.ctx
    }

    /// Enters the ring's critical section.
    ///
    /// Decision order, re-evaluated on every call so the active regime may
    /// change between calls:
    ///
    /// 1. provider + handle → `acquire(handle, timeout)`; a timeout is the
    ///    distinct [`RingError::LockTimeout`] failure, a provider failure
    ///    degrades to the mask path;
    /// 2. provider, no handle → create exactly once, then acquire as in 1;
    ///    creation failure degrades to the mask path;
    /// 3. otherwise → save interrupt state and disable.
    pub(crate) fn enter(&self, timeout: Timeout) -> Result<CriticalGuard<'_>, RingError> {
        if let Some(provider) = self.ctx.provider() {
            if self.handle.get().is_none() {
                if let Some(handle) = provider.create() {
                    if let Err(extra) = self.handle.set(handle) {
                        // Lost a creation race; exactly one handle may live
                        // per instance, so the surplus one goes back.
                        if provider.destroy(extra).is_err() {
                            tracing::warn!("failed to destroy surplus lock handle");
                        }
                    }
                }
            }
            if let Some(handle) = self.handle.get() {
                match provider.acquire(handle, timeout) {
                    AcquireOutcome::Acquired => {
                        return Ok(CriticalGuard::Locked { provider, handle })
                    }
                    AcquireOutcome::TimedOut => return Err(RingError::LockTimeout),
                    // Foreign handle after a provider swap, or backend
                    // failure: never leave the data unprotected.
                    AcquireOutcome::Failed => {}
                }
            }
        }
        let mask = self.ctx.mask();
        let token = mask.save_and_disable();
        Ok(CriticalGuard::Masked { mask, token })
    }

    /// Removes the lock handle for teardown.
    pub(crate) fn take_handle(&mut self) -> Option<LockHandle> {
        self.handle.take()
    }
}

/// Which protection path [`SyncState::enter`] took for one operation.
pub(crate) enum CriticalGuard<'a> {
    /// The provider mutex is held and must be released.
    Locked {
        provider: Arc<dyn MutexProvider>,
        handle: &'a LockHandle,
    },
    /// Interrupts are masked and the saved state must be restored.
    Masked {
        mask: &'a dyn InterruptMask,
        token: IrqToken,
    },
}

impl Drop for CriticalGuard<'_> {
    fn drop(&mut self) {
        match self {
            CriticalGuard::Locked { provider, handle } => {
                if provider.release(handle).is_err() {
                    tracing::warn!("mutex release failed; ring may be wedged");
                }
            }
            CriticalGuard::Masked { mask, token } => mask.restore(*token),
        }
    }
}
