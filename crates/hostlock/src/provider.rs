use ringsync::{AcquireOutcome, LockError, LockHandle, MutexProvider, Timeout};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Binary semaphore backing one ring's lock.
///
/// `acquire`/`release` are split calls with no guard object, matching the
/// shape of an RTOS mutex API. Poisoning cannot occur: the protected state
/// is a single bool with no invariant to lose, so a poisoned `std` lock is
/// recovered and used as-is.
pub struct HostMutex {
    locked: Mutex<bool>,
    unlocked: Condvar,
}

impl HostMutex {
    pub fn new() -> Self {
        Self {
            locked: Mutex::new(false),
            unlocked: Condvar::new(),
        }
    }

    /// Acquires the semaphore, blocking up to `timeout`.
    pub fn acquire(&self, timeout: Timeout) -> AcquireOutcome {
        let mut locked = recover(self.locked.lock());
        match timeout {
            Timeout::Forever => {
                while *locked {
                    locked = recover(self.unlocked.wait(locked));
                }
            }
            Timeout::Millis(0) => {
                // Non-blocking probe, the interrupt-context form.
                if *locked {
                    return AcquireOutcome::TimedOut;
                }
            }
            Timeout::Millis(ms) => {
                let deadline = Duration::from_millis(ms);
                let (guard, result) = recover(self.unlocked.wait_timeout_while(
                    locked,
                    deadline,
                    |held| *held,
                ));
                locked = guard;
                if result.timed_out() && *locked {
                    return AcquireOutcome::TimedOut;
                }
            }
        }
        *locked = true;
        AcquireOutcome::Acquired
    }

    /// Releases the semaphore. Releasing while unlocked reports a backend
    /// error instead of silently double-counting.
    pub fn release(&self) -> Result<(), LockError> {
        let mut locked = recover(self.locked.lock());
        if !*locked {
            return Err(LockError::Backend);
        }
        *locked = false;
        self.unlocked.notify_one();
        Ok(())
    }
}

impl Default for HostMutex {
    fn default() -> Self {
        Self::new()
    }
}

fn recover<T>(result: Result<T, std::sync::PoisonError<T>>) -> T {
    match result {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Provider that hands out [`HostMutex`] handles.
///
/// Install one on a [`SyncContext`](ringsync::SyncContext) to move its rings
/// from the interrupt-mask path onto real blocking mutexes, the way a
/// scheduler's startup hook would on a target.
pub struct StdMutexProvider;

impl StdMutexProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StdMutexProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MutexProvider for StdMutexProvider {
    fn create(&self) -> Option<LockHandle> {
        Some(LockHandle::new(HostMutex::new()))
    }

    fn destroy(&self, handle: LockHandle) -> Result<(), LockError> {
        match handle.downcast::<HostMutex>() {
            Ok(_mutex) => Ok(()),
            Err(_foreign) => Err(LockError::ForeignHandle),
        }
    }

    fn acquire(&self, handle: &LockHandle, timeout: Timeout) -> AcquireOutcome {
        match handle.downcast_ref::<HostMutex>() {
            Some(mutex) => mutex.acquire(timeout),
            None => {
                tracing::warn!("acquire with a handle from another provider");
                AcquireOutcome::Failed
            }
        }
    }

    fn release(&self, handle: &LockHandle) -> Result<(), LockError> {
        match handle.downcast_ref::<HostMutex>() {
            Some(mutex) => mutex.release(),
            None => Err(LockError::ForeignHandle),
        }
    }
}
