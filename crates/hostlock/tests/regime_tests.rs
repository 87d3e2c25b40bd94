//! End-to-end tests of the synchronization regimes: the boot transition
//! from interrupt masking to provider mutexes, degradation paths, and
//! mutex-protected concurrency.

use hostlock::{HostMutex, StdMutexProvider};
use ringsync::{
    AcquireOutcome, LockError, LockHandle, MutexProvider, Ring, RingConfig, RingError,
    SyncContext, Timeout,
};
use std::sync::Arc;
use std::thread;

#[test]
fn test_fifo_order_spans_the_boot_transition() {
    let ctx = SyncContext::new();
    let ring: Ring<u32> = Ring::with_capacity(Arc::clone(&ctx), 8).unwrap();

    // Pre-scheduler: masked operations.
    ring.write(1).unwrap();
    ring.write(2).unwrap();

    // Scheduler starts; the ring switches regimes on its next call.
    ctx.install_provider(Arc::new(StdMutexProvider::new()));
    ring.write(3).unwrap();
    ring.write(4).unwrap();

    for expected in 1..=4u32 {
        assert_eq!(ring.read(), Ok(expected));
    }
    assert!(ring.is_empty());
}

#[test]
fn test_clear_provider_reverts_to_mask() {
    let ctx = SyncContext::new();
    let ring: Ring<u32> = Ring::with_capacity(Arc::clone(&ctx), 4).unwrap();

    ctx.install_provider(Arc::new(StdMutexProvider::new()));
    ring.write(1).unwrap();

    ctx.clear_provider();
    assert!(!ctx.has_provider());
    ring.write(2).unwrap();
    assert_eq!(ring.read(), Ok(1));
    assert_eq!(ring.read(), Ok(2));
}

/// Provider that hands every ring the same test-held mutex, so the test can
/// keep it busy from outside.
struct SharedMutexProvider {
    mutex: Arc<HostMutex>,
}

impl MutexProvider for SharedMutexProvider {
    fn create(&self) -> Option<LockHandle> {
        Some(LockHandle::new(Arc::clone(&self.mutex)))
    }
    fn destroy(&self, _handle: LockHandle) -> Result<(), LockError> {
        Ok(())
    }
    fn acquire(&self, handle: &LockHandle, timeout: Timeout) -> AcquireOutcome {
        match handle.downcast_ref::<Arc<HostMutex>>() {
            Some(mutex) => mutex.acquire(timeout),
            None => AcquireOutcome::Failed,
        }
    }
    fn release(&self, handle: &LockHandle) -> Result<(), LockError> {
        match handle.downcast_ref::<Arc<HostMutex>>() {
            Some(mutex) => mutex.release(),
            None => Err(LockError::ForeignHandle),
        }
    }
}

#[test]
fn test_contended_lock_surfaces_timeout() {
    let mutex = Arc::new(HostMutex::new());
    let ctx = SyncContext::new();
    ctx.install_provider(Arc::new(SharedMutexProvider {
        mutex: Arc::clone(&mutex),
    }));

    let ring: Ring<u32> = Ring::new(
        ctx,
        RingConfig::new(4).acquire_timeout(Timeout::Millis(10)),
    )
    .unwrap();

    // Warm up so the lazy handle exists, then hold the mutex from outside.
    ring.write(1).unwrap();
    assert_eq!(mutex.acquire(Timeout::Forever), AcquireOutcome::Acquired);

    assert_eq!(ring.write(2), Err(RingError::LockTimeout));
    assert_eq!(ring.read(), Err(RingError::LockTimeout));
    // Size queries never take the lock.
    assert_eq!(ring.available(), 1);

    mutex.release().unwrap();
    assert_eq!(ring.write(2), Ok(()));
    assert_eq!(ring.read(), Ok(1));
}

/// Provider whose acquire never works: operations must degrade to the mask
/// path and still complete, rather than fail or run unprotected.
struct BrokenProvider;

impl MutexProvider for BrokenProvider {
    fn create(&self) -> Option<LockHandle> {
        Some(LockHandle::new(()))
    }
    fn destroy(&self, _handle: LockHandle) -> Result<(), LockError> {
        Ok(())
    }
    fn acquire(&self, _handle: &LockHandle, _timeout: Timeout) -> AcquireOutcome {
        AcquireOutcome::Failed
    }
    fn release(&self, _handle: &LockHandle) -> Result<(), LockError> {
        Ok(())
    }
}

#[test]
fn test_failed_acquire_degrades_to_mask() {
    let ctx = SyncContext::new();
    ctx.install_provider(Arc::new(BrokenProvider));
    let ring: Ring<u32> = Ring::with_capacity(ctx, 4).unwrap();

    ring.write(5).unwrap();
    assert_eq!(ring.read(), Ok(5));
}

#[test]
fn test_mutex_protected_producers_and_consumer() {
    const PRODUCERS: u32 = 3;
    const PER_PRODUCER: u32 = 400;

    let ctx = SyncContext::new();
    ctx.install_provider(Arc::new(StdMutexProvider::new()));
    let ring = Arc::new(Ring::<u32>::with_capacity(ctx, 8).unwrap());

    let handles: Vec<_> = (0..PRODUCERS)
        .map(|id| {
            let ring = Arc::clone(&ring);
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    let tagged = id << 16 | i;
                    while ring.write(tagged) == Err(RingError::Full) {
                        thread::yield_now();
                    }
                }
            })
        })
        .collect();

    let total = (PRODUCERS * PER_PRODUCER) as usize;
    let mut last_seen = vec![None::<u32>; PRODUCERS as usize];
    let mut received = 0usize;
    while received < total {
        match ring.read() {
            Ok(v) => {
                let id = (v >> 16) as usize;
                let seq = v & 0xFFFF;
                if let Some(prev) = last_seen[id] {
                    assert!(seq > prev, "producer {id} reordered: {prev} then {seq}");
                }
                last_seen[id] = Some(seq);
                received += 1;
            }
            Err(RingError::Empty) => thread::yield_now(),
            Err(other) => panic!("unexpected read error: {other}"),
        }
    }
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_opposite_direction_transfers_under_mutexes() {
    const ROUNDS: usize = 1_000;

    let ctx = SyncContext::new();
    ctx.install_provider(Arc::new(StdMutexProvider::new()));
    let a = Arc::new(Ring::<u32>::with_capacity(Arc::clone(&ctx), 8).unwrap());
    let b = Arc::new(Ring::<u32>::with_capacity(ctx, 8).unwrap());
    a.write_many(&[1, 2, 3, 4]).unwrap();

    let forward = {
        let a = Arc::clone(&a);
        let b = Arc::clone(&b);
        thread::spawn(move || {
            for _ in 0..ROUNDS {
                a.dump_into(&b).unwrap();
            }
        })
    };
    let backward = {
        let a = Arc::clone(&a);
        let b = Arc::clone(&b);
        thread::spawn(move || {
            for _ in 0..ROUNDS {
                b.dump_into(&a).unwrap();
            }
        })
    };

    forward.join().unwrap();
    backward.join().unwrap();
    assert_eq!(a.available() + b.available(), 4);
}
