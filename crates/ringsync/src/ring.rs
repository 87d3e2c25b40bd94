use crate::critical::{CriticalGuard, SyncState};
use crate::invariants::{
    debug_assert_bounded_count, debug_assert_cursor_range, debug_assert_wrap_identity,
};
use crate::sync::{SyncContext, Timeout};
use crate::{RingConfig, RingError};
use std::cell::UnsafeCell;
use std::mem::{size_of, MaybeUninit};
use std::ptr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

// =============================================================================
// SYNCHRONIZATION MODEL
// =============================================================================
//
// This is deliberately NOT a lock-free ring. Every mutating operation runs
// inside one coarse per-instance critical section obtained from SyncState:
// the provider mutex when a scheduler is linked in, the interrupt mask
// otherwise. The fields split accordingly:
//
// - `head`, `tail`, `storage`: UnsafeCell, touched only while a
//   CriticalGuard for this instance is live. The guard's acquire/release
//   provides the happens-before edges between contexts.
// - `count`: atomic, because the size queries (available/free/is_empty/
//   is_full) read it without entering the critical section, exactly like the
//   producers/consumers that poll fill level from interrupt context. It is
//   the single source of truth for empty/full; head and tail are derived
//   cursors and are never compared to decide fullness.
// - everything else is immutable after construction.
//
// `seq` is a construction-ordered identity used to impose a total order on
// lock acquisition when a transfer spans two rings (see transfer.rs).
//
// =============================================================================

static NEXT_RING_SEQ: AtomicU64 = AtomicU64::new(1);

/// Backing storage: allocated by the ring, or attached by the caller.
enum Storage<T: 'static> {
    /// The ring allocated this region and frees it on drop.
    Owned(Box<[MaybeUninit<T>]>),
    /// Caller-supplied region; the ring never frees it.
    Attached(&'static mut [MaybeUninit<T>]),
}

/// Fixed-capacity FIFO ring buffer with per-instance synchronization.
///
/// Elements are plain copyable values (`T: Copy`), matching the byte-copy
/// semantics the batch operations expose to DMA engines. All mutating
/// operations, including peeks, run inside the instance's critical section;
/// the active synchronization regime (bare interrupts, scheduler without a
/// mutex yet, scheduler with a real mutex) is re-evaluated on every call, so
/// a ring constructed before the scheduler starts keeps working after it
/// does, with no change at the call sites.
pub struct Ring<T: 'static> {
    seq: u64,
    capacity: usize,
    acquire_timeout: Timeout,
    owned: bool,
    sync: SyncState,
    count: AtomicUsize,
    head: UnsafeCell<usize>,
    tail: UnsafeCell<usize>,
    storage: UnsafeCell<Storage<T>>,
}

// Safety: all shared mutable state is either atomic (`count`) or accessed
// only inside the per-instance critical section (`head`, `tail`, `storage`).
unsafe impl<T: Send + 'static> Send for Ring<T> {}
unsafe impl<T: Send + 'static> Sync for Ring<T> {}

impl<T: 'static> std::fmt::Debug for Ring<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ring")
            .field("seq", &self.seq)
            .field("capacity", &self.capacity)
            .field("owned", &self.owned)
            .field("count", &self.count.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<T: Copy + 'static> Ring<T> {
    /// Creates a ring that owns its storage.
    ///
    /// Allocation is fallible: zero capacity, a zero-sized element type, or
    /// an allocator failure all return [`RingError::AllocationFailed`] and
    /// no partial ring is created.
    pub fn new(ctx: Arc<SyncContext>, config: RingConfig) -> Result<Self, RingError> {
        let bytes = config.capacity.saturating_mul(size_of::<T>());
        if config.capacity == 0 || size_of::<T>() == 0 {
            return Err(RingError::AllocationFailed { bytes });
        }
        let mut slots: Vec<MaybeUninit<T>> = Vec::new();
        slots
            .try_reserve_exact(config.capacity)
            .map_err(|_| RingError::AllocationFailed { bytes })?;
        slots.resize_with(config.capacity, MaybeUninit::uninit);
        Ok(Self::from_storage(
            ctx,
            config,
            Storage::Owned(slots.into_boxed_slice()),
            true,
        ))
    }

    /// Creates an owning ring with the default (blocking) acquire timeout.
    pub fn with_capacity(ctx: Arc<SyncContext>, capacity: usize) -> Result<Self, RingError> {
        Self::new(ctx, RingConfig::new(capacity))
    }

    /// Creates a ring over caller-supplied storage.
    ///
    /// The ring never frees the region; the caller manages its lifetime
    /// (hence `'static`). The region must hold at least `config.capacity`
    /// slots; a shorter region fails construction.
    pub fn attach(
        ctx: Arc<SyncContext>,
        config: RingConfig,
        storage: &'static mut [MaybeUninit<T>],
    ) -> Result<Self, RingError> {
        let bytes = config.capacity.saturating_mul(size_of::<T>());
        if config.capacity == 0 || size_of::<T>() == 0 || storage.len() < config.capacity {
            return Err(RingError::AllocationFailed { bytes });
        }
        Ok(Self::from_storage(
            ctx,
            config,
            Storage::Attached(storage),
            false,
        ))
    }

    fn from_storage(
        ctx: Arc<SyncContext>,
        config: RingConfig,
        storage: Storage<T>,
        owned: bool,
    ) -> Self {
        Self {
            seq: NEXT_RING_SEQ.fetch_add(1, Ordering::Relaxed),
            capacity: config.capacity,
            acquire_timeout: config.acquire_timeout,
            owned,
            sync: SyncState::new(ctx),
            count: AtomicUsize::new(0),
            head: UnsafeCell::new(0),
            tail: UnsafeCell::new(0),
            storage: UnsafeCell::new(storage),
        }
    }

    // ---------------------------------------------------------------------
    // SIZE QUERIES
    // ---------------------------------------------------------------------

    /// Number of elements currently stored.
    ///
    /// Defensive check: an observed count above capacity indicates a prior
    /// uncoordinated mutation; it is reported to the diagnostic sink and
    /// the query answers zero rather than trusting the state.
    pub fn available(&self) -> usize {
        let count = self.count.load(Ordering::Acquire);
        if count > self.capacity {
            tracing::error!(
                count,
                capacity = self.capacity,
                "ring corrupted: count exceeds capacity"
            );
            return 0;
        }
        count
    }

    /// Number of elements that can still be written.
    pub fn free(&self) -> usize {
        let count = self.count.load(Ordering::Acquire);
        if count > self.capacity {
            tracing::error!(
                count,
                capacity = self.capacity,
                "ring corrupted: count exceeds capacity"
            );
            return 0;
        }
        self.capacity - count
    }

    /// True if no elements are stored.
    pub fn is_empty(&self) -> bool {
        self.count.load(Ordering::Acquire) == 0
    }

    /// True if `count == capacity`.
    pub fn is_full(&self) -> bool {
        self.count.load(Ordering::Acquire) == self.capacity
    }

    /// Maximum number of elements, fixed at construction.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Size of one element in bytes.
    pub const fn element_size(&self) -> usize {
        size_of::<T>()
    }

    /// True if the ring allocated (and will free) its own storage.
    pub const fn owns_storage(&self) -> bool {
        self.owned
    }

    /// The synchronization context this ring was constructed with.
    pub fn context(&self) -> &Arc<SyncContext> {
        self.sync.context()
    }

    pub(crate) const fn sequence(&self) -> u64 {
        self.seq
    }

    pub(crate) const fn acquire_timeout(&self) -> Timeout {
        self.acquire_timeout
    }

    pub(crate) fn sync_state(&self) -> &SyncState {
        &self.sync
    }

    // ---------------------------------------------------------------------
    // SINGLE-ELEMENT OPERATIONS
    // ---------------------------------------------------------------------

    /// Writes one element, rejecting with [`RingError::Full`] when the ring
    /// holds `capacity` elements.
    pub fn write(&self, value: T) -> Result<(), RingError> {
        let guard = self.sync.enter(self.acquire_timeout)?;
        let count = self.locked_count(&guard)?;
        if count == self.capacity {
            return Err(RingError::Full);
        }
        // SAFETY: the critical section is held; this context is the only
        // mutator of the cursors and storage.
        unsafe {
            let head = *self.head.get();
            debug_assert_cursor_range!("head", head, self.capacity);
            self.slots()[head].write(value);
            *self.head.get() = wrap(head + 1, self.capacity);
            debug_assert_wrap_identity!(
                *self.head.get(),
                *self.tail.get(),
                count + 1,
                self.capacity
            );
        }
        self.count.store(count + 1, Ordering::Release);
        Ok(())
    }

    /// Reads (removes) the oldest element, rejecting with
    /// [`RingError::Empty`] when nothing is stored.
    pub fn read(&self) -> Result<T, RingError> {
        let guard = self.sync.enter(self.acquire_timeout)?;
        let count = self.locked_count(&guard)?;
        if count == 0 {
            return Err(RingError::Empty);
        }
        // SAFETY: critical section held; count > 0 means the slot at `tail`
        // was fully written by a previous producer inside its own section.
        let value = unsafe {
            let tail = *self.tail.get();
            debug_assert_cursor_range!("tail", tail, self.capacity);
            let value = self.slots()[tail].assume_init_read();
            *self.tail.get() = wrap(tail + 1, self.capacity);
            debug_assert_wrap_identity!(
                *self.head.get(),
                *self.tail.get(),
                count - 1,
                self.capacity
            );
            value
        };
        self.count.store(count - 1, Ordering::Release);
        Ok(value)
    }

    /// Writes one element, discarding the oldest when full. Never rejects
    /// for capacity; `count` stays at `capacity` once saturated. Returns
    /// whether an element was discarded.
    pub fn push_overwrite(&self, value: T) -> Result<bool, RingError> {
        let guard = self.sync.enter(self.acquire_timeout)?;
        let count = self.locked_count(&guard)?;
        let full = count == self.capacity;
        // SAFETY: critical section held.
        unsafe {
            let head = *self.head.get();
            self.slots()[head].write(value);
            *self.head.get() = wrap(head + 1, self.capacity);
            if full {
                let tail = *self.tail.get();
                *self.tail.get() = wrap(tail + 1, self.capacity);
            }
            debug_assert_cursor_range!("head", *self.head.get(), self.capacity);
            debug_assert_cursor_range!("tail", *self.tail.get(), self.capacity);
        }
        if full {
            tracing::trace!(capacity = self.capacity, "overwrote oldest element");
            Ok(true)
        } else {
            self.count.store(count + 1, Ordering::Release);
            Ok(false)
        }
    }

    /// Copies the oldest element without moving the cursors.
    ///
    /// Peek runs inside the critical section like every other operation;
    /// it is not a lock-free read.
    pub fn peek_oldest(&self) -> Result<T, RingError> {
        let guard = self.sync.enter(self.acquire_timeout)?;
        let count = self.locked_count(&guard)?;
        if count == 0 {
            return Err(RingError::Empty);
        }
        // SAFETY: critical section held; slot at `tail` is initialized.
        let value = unsafe {
            let tail = *self.tail.get();
            self.slots()[tail].assume_init_read()
        };
        Ok(value)
    }

    /// Copies the newest element without moving the cursors.
    pub fn peek_newest(&self) -> Result<T, RingError> {
        let guard = self.sync.enter(self.acquire_timeout)?;
        let count = self.locked_count(&guard)?;
        if count == 0 {
            return Err(RingError::Empty);
        }
        // SAFETY: critical section held; head-1 is the last written slot.
        let value = unsafe {
            let head = *self.head.get();
            let newest = wrap(head + self.capacity - 1, self.capacity);
            self.slots()[newest].assume_init_read()
        };
        Ok(value)
    }

    /// Discards the oldest element without copying it out.
    pub fn pop_oldest(&self) -> Result<(), RingError> {
        match self.pop_oldest_many(1)? {
            0 => Err(RingError::Empty),
            _ => Ok(()),
        }
    }

    /// Discards the newest element without copying it out.
    pub fn pop_newest(&self) -> Result<(), RingError> {
        match self.pop_newest_many(1)? {
            0 => Err(RingError::Empty),
            _ => Ok(()),
        }
    }

    /// Discards up to `n` oldest elements, clamped to the current count.
    /// Returns the number discarded.
    pub fn pop_oldest_many(&self, n: usize) -> Result<usize, RingError> {
        let guard = self.sync.enter(self.acquire_timeout)?;
        let count = self.locked_count(&guard)?;
        let drop_n = n.min(count);
        if drop_n == 0 {
            return Ok(0);
        }
        // SAFETY: critical section held.
        unsafe {
            let tail = *self.tail.get();
            *self.tail.get() = wrap(tail + drop_n, self.capacity);
            debug_assert_cursor_range!("tail", *self.tail.get(), self.capacity);
        }
        self.count.store(count - drop_n, Ordering::Release);
        Ok(drop_n)
    }

    /// Discards up to `n` newest elements, clamped to the current count.
    /// Returns the number discarded.
    pub fn pop_newest_many(&self, n: usize) -> Result<usize, RingError> {
        let guard = self.sync.enter(self.acquire_timeout)?;
        let count = self.locked_count(&guard)?;
        let drop_n = n.min(count);
        if drop_n == 0 {
            return Ok(0);
        }
        // SAFETY: critical section held. Head walks backwards.
        unsafe {
            let head = *self.head.get();
            *self.head.get() = wrap(head + self.capacity - (drop_n % self.capacity), self.capacity);
            debug_assert_cursor_range!("head", *self.head.get(), self.capacity);
        }
        self.count.store(count - drop_n, Ordering::Release);
        Ok(drop_n)
    }

    /// Resets the ring to empty. Cursor positions are discarded; the
    /// element data itself is not scrubbed.
    pub fn clear(&self) -> Result<(), RingError> {
        let _guard = self.sync.enter(self.acquire_timeout)?;
        // SAFETY: critical section held.
        unsafe {
            *self.head.get() = 0;
            *self.tail.get() = 0;
        }
        self.count.store(0, Ordering::Release);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // MULTI-ELEMENT OPERATIONS (DMA-friendly)
    // ---------------------------------------------------------------------
    //
    // The batch operations complete in at most two contiguous copies: one
    // chunk up to the end of the backing array, one wrapped to the start.
    // That two-chunk decomposition is what lets a caller drive them from a
    // single DMA descriptor pair instead of copying per element.
    // ---------------------------------------------------------------------

    /// Writes `min(data.len(), free)` elements. Never blocks waiting for
    /// space and never splits an element. Returns the number written.
    pub fn write_many(&self, data: &[T]) -> Result<usize, RingError> {
        if data.is_empty() {
            return Ok(0);
        }
        let guard = self.sync.enter(self.acquire_timeout)?;
        let count = self.locked_count(&guard)?;
        let n = data.len().min(self.capacity - count);
        if n == 0 {
            return Ok(0);
        }
        // SAFETY: critical section held; the two chunks land in slots that
        // are free (outside [tail, tail+count)).
        unsafe {
            let head = *self.head.get();
            let first = n.min(self.capacity - head);
            self.copy_in(head, &data[..first]);
            if n > first {
                self.copy_in(0, &data[first..n]);
            }
            *self.head.get() = wrap(head + n, self.capacity);
            debug_assert_cursor_range!("head", *self.head.get(), self.capacity);
            debug_assert_wrap_identity!(*self.head.get(), *self.tail.get(), count + n, self.capacity);
        }
        self.count.store(count + n, Ordering::Release);
        Ok(n)
    }

    /// Reads `min(out.len(), count)` elements into `out`. Returns the
    /// number read.
    pub fn read_many(&self, out: &mut [T]) -> Result<usize, RingError> {
        if out.is_empty() {
            return Ok(0);
        }
        let guard = self.sync.enter(self.acquire_timeout)?;
        let count = self.locked_count(&guard)?;
        let n = out.len().min(count);
        if n == 0 {
            return Ok(0);
        }
        // SAFETY: critical section held; the n oldest slots are initialized.
        unsafe {
            let tail = *self.tail.get();
            let first = n.min(self.capacity - tail);
            self.copy_out(tail, &mut out[..first]);
            if n > first {
                self.copy_out(0, &mut out[first..n]);
            }
            *self.tail.get() = wrap(tail + n, self.capacity);
            debug_assert_cursor_range!("tail", *self.tail.get(), self.capacity);
            debug_assert_wrap_identity!(*self.head.get(), *self.tail.get(), count - n, self.capacity);
        }
        self.count.store(count - n, Ordering::Release);
        Ok(n)
    }

    /// Writes all of `data`, discarding oldest elements as needed. Always
    /// writes every element (later elements of an oversized batch win);
    /// returns the number written, which is `data.len()`.
    pub fn push_overwrite_many(&self, data: &[T]) -> Result<usize, RingError> {
        if data.is_empty() {
            return Ok(0);
        }
        let guard = self.sync.enter(self.acquire_timeout)?;
        let count = self.locked_count(&guard)?;
        let n = data.len();
        // Only the last `capacity` elements of an oversized batch survive.
        let keep = n.min(self.capacity);
        let discarded = (count + n).saturating_sub(self.capacity);
        // SAFETY: critical section held.
        unsafe {
            let head = *self.head.get();
            let start = wrap(head + (n - keep), self.capacity);
            let src = &data[n - keep..];
            let first = keep.min(self.capacity - start);
            self.copy_in(start, &src[..first]);
            if keep > first {
                self.copy_in(0, &src[first..]);
            }
            *self.head.get() = wrap(head + (n % self.capacity), self.capacity);
            if discarded > 0 {
                let tail = *self.tail.get();
                *self.tail.get() = wrap(tail + (discarded % self.capacity), self.capacity);
            }
            debug_assert_cursor_range!("head", *self.head.get(), self.capacity);
            debug_assert_cursor_range!("tail", *self.tail.get(), self.capacity);
        }
        let new_count = (count + n).min(self.capacity);
        debug_assert_bounded_count!(new_count, self.capacity);
        self.count.store(new_count, Ordering::Release);
        if discarded > 0 {
            tracing::trace!(discarded, "overwrote oldest elements in batch push");
        }
        Ok(n)
    }

    /// Copies up to `out.len()` oldest elements (oldest first) without
    /// moving the cursors. Returns the number copied.
    pub fn peek_oldest_many(&self, out: &mut [T]) -> Result<usize, RingError> {
        if out.is_empty() {
            return Ok(0);
        }
        let guard = self.sync.enter(self.acquire_timeout)?;
        let count = self.locked_count(&guard)?;
        let n = out.len().min(count);
        if n == 0 {
            return Ok(0);
        }
        // SAFETY: critical section held; same two-chunk shape as read_many.
        unsafe {
            let tail = *self.tail.get();
            let first = n.min(self.capacity - tail);
            self.copy_out(tail, &mut out[..first]);
            if n > first {
                self.copy_out(0, &mut out[first..n]);
            }
        }
        Ok(n)
    }

    /// Copies up to `out.len()` newest elements, newest first, without
    /// moving the cursors. Returns the number copied.
    pub fn peek_newest_many(&self, out: &mut [T]) -> Result<usize, RingError> {
        if out.is_empty() {
            return Ok(0);
        }
        let guard = self.sync.enter(self.acquire_timeout)?;
        let count = self.locked_count(&guard)?;
        let n = out.len().min(count);
        if n == 0 {
            return Ok(0);
        }
        // SAFETY: critical section held. Walks backwards from head-1, so
        // this one is per-element rather than two-chunk.
        unsafe {
            let head = *self.head.get();
            for (i, slot) in out.iter_mut().take(n).enumerate() {
                let pos = wrap(head + self.capacity - 1 - i, self.capacity);
                *slot = self.slots()[pos].assume_init_read();
            }
        }
        Ok(n)
    }

    // ---------------------------------------------------------------------
    // RAW-BYTE ESCAPE HATCH (hardware boundary)
    // ---------------------------------------------------------------------

    /// Writes whole elements from a raw byte buffer, e.g. a DMA completion
    /// region. Behaves like [`write_many`](Self::write_many) over
    /// `bytes.len() / element_size` elements; a byte length that is not a
    /// whole number of elements fails with
    /// [`RingError::IncompatibleElementSize`]. Returns elements written.
    ///
    /// # Safety
    ///
    /// Every `element_size`-byte chunk of `bytes` must be a valid bit
    /// pattern for `T`.
    pub unsafe fn write_bytes(&self, bytes: &[u8]) -> Result<usize, RingError> {
        let elem = size_of::<T>();
        if bytes.len() % elem != 0 {
            return Err(RingError::IncompatibleElementSize {
                expected: elem,
                got: bytes.len(),
            });
        }
        let total = bytes.len() / elem;
        if total == 0 {
            return Ok(0);
        }
        let guard = self.sync.enter(self.acquire_timeout)?;
        let count = self.locked_count(&guard)?;
        let n = total.min(self.capacity - count);
        if n == 0 {
            return Ok(0);
        }
        // SAFETY (internal): critical section held; byte-for-byte the same
        // two-chunk copy as write_many, without requiring an aligned &[T].
        unsafe {
            let head = *self.head.get();
            let base = self.base_ptr().cast::<u8>();
            let first = n.min(self.capacity - head);
            ptr::copy_nonoverlapping(bytes.as_ptr(), base.add(head * elem), first * elem);
            if n > first {
                ptr::copy_nonoverlapping(
                    bytes.as_ptr().add(first * elem),
                    base,
                    (n - first) * elem,
                );
            }
            *self.head.get() = wrap(head + n, self.capacity);
            debug_assert_cursor_range!("head", *self.head.get(), self.capacity);
        }
        self.count.store(count + n, Ordering::Release);
        Ok(n)
    }

    /// Reads whole elements into a raw byte buffer, e.g. a DMA transmit
    /// region. Symmetric to [`write_bytes`](Self::write_bytes); returns
    /// elements read.
    ///
    /// # Safety
    ///
    /// `out` receives the raw object representation of `T`, including any
    /// padding bytes; the caller must treat it as opaque element payloads.
    pub unsafe fn read_bytes(&self, out: &mut [u8]) -> Result<usize, RingError> {
        let elem = size_of::<T>();
        if out.len() % elem != 0 {
            return Err(RingError::IncompatibleElementSize {
                expected: elem,
                got: out.len(),
            });
        }
        let total = out.len() / elem;
        if total == 0 {
            return Ok(0);
        }
        let guard = self.sync.enter(self.acquire_timeout)?;
        let count = self.locked_count(&guard)?;
        let n = total.min(count);
        if n == 0 {
            return Ok(0);
        }
        // SAFETY (internal): critical section held; the n oldest slots are
        // initialized.
        unsafe {
            let tail = *self.tail.get();
            let base = self.base_ptr().cast::<u8>();
            let first = n.min(self.capacity - tail);
            ptr::copy_nonoverlapping(base.add(tail * elem), out.as_mut_ptr(), first * elem);
            if n > first {
                ptr::copy_nonoverlapping(base, out.as_mut_ptr().add(first * elem), (n - first) * elem);
            }
            *self.tail.get() = wrap(tail + n, self.capacity);
            debug_assert_cursor_range!("tail", *self.tail.get(), self.capacity);
        }
        self.count.store(count - n, Ordering::Release);
        Ok(n)
    }

    // ---------------------------------------------------------------------
    // INTERNALS (all require the critical section)
    // ---------------------------------------------------------------------

    /// Count check used inside a held critical section. Surfaces the
    /// distinct `Corrupted` error so the mutating operation aborts.
    pub(crate) fn locked_count(&self, _guard: &CriticalGuard<'_>) -> Result<usize, RingError> {
        let count = self.count.load(Ordering::Acquire);
        if count > self.capacity {
            tracing::error!(
                count,
                capacity = self.capacity,
                "ring corrupted: count exceeds capacity"
            );
            return Err(RingError::Corrupted {
                count,
                capacity: self.capacity,
            });
        }
        Ok(count)
    }

    /// # Safety
    /// Caller must hold this ring's critical section.
    #[allow(clippy::mut_from_ref)]
    unsafe fn slots(&self) -> &mut [MaybeUninit<T>] {
        match &mut *self.storage.get() {
            Storage::Owned(slots) => slots,
            Storage::Attached(slots) => slots,
        }
    }

    /// # Safety
    /// Caller must hold this ring's critical section.
    pub(crate) unsafe fn base_ptr(&self) -> *mut T {
        self.slots().as_mut_ptr().cast::<T>()
    }

    /// # Safety
    /// Caller must hold this ring's critical section;
    /// `idx + src.len() <= capacity`.
    unsafe fn copy_in(&self, idx: usize, src: &[T]) {
        ptr::copy_nonoverlapping(src.as_ptr(), self.base_ptr().add(idx), src.len());
    }

    /// # Safety
    /// Caller must hold this ring's critical section; the `dst.len()` slots
    /// at `idx` must be initialized.
    unsafe fn copy_out(&self, idx: usize, dst: &mut [T]) {
        ptr::copy_nonoverlapping(self.base_ptr().add(idx), dst.as_mut_ptr(), dst.len());
    }

    /// # Safety
    /// Caller must hold this ring's critical section.
    pub(crate) unsafe fn cursors(&self) -> (&mut usize, &mut usize) {
        (&mut *self.head.get(), &mut *self.tail.get())
    }

    pub(crate) fn store_count(&self, count: usize) {
        debug_assert_bounded_count!(count, self.capacity);
        self.count.store(count, Ordering::Release);
    }
}

impl<T: 'static> Drop for Ring<T> {
    fn drop(&mut self) {
        // Owned storage is freed by the Box; the lock handle goes back to
        // whichever provider is installed at teardown time.
        if let Some(handle) = self.sync.take_handle() {
            if let Some(provider) = self.sync.context().provider() {
                if provider.destroy(handle).is_err() {
                    tracing::warn!("lock handle destroy failed during ring teardown");
                }
            }
        }
    }
}

#[inline]
const fn wrap(value: usize, capacity: usize) -> usize {
    value % capacity
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(capacity: usize) -> Ring<u32> {
        Ring::with_capacity(SyncContext::new(), capacity).unwrap()
    }

    #[test]
    fn test_write_read_fifo() {
        let rb = ring(4);

        for v in 1..=4u32 {
            rb.write(v).unwrap();
        }
        assert_eq!(rb.write(5), Err(RingError::Full));

        for v in 1..=4u32 {
            assert_eq!(rb.read(), Ok(v));
        }
        assert_eq!(rb.read(), Err(RingError::Empty));
    }

    #[test]
    fn test_read_empty_does_not_move_cursors() {
        let rb = ring(4);
        assert_eq!(rb.read(), Err(RingError::Empty));
        rb.write(7).unwrap();
        assert_eq!(rb.read(), Ok(7));
    }

    #[test]
    fn test_full_boundary_uses_all_slots() {
        let rb = ring(3);
        for v in 0..3 {
            rb.write(v).unwrap();
        }
        assert!(rb.is_full());
        assert_eq!(rb.available(), 3);
        assert_eq!(rb.free(), 0);
    }

    #[test]
    fn test_push_overwrite_discards_oldest() {
        let rb = ring(3);
        for v in 1..=5u32 {
            rb.push_overwrite(v).unwrap();
        }
        assert_eq!(rb.available(), 3);
        assert_eq!(rb.read(), Ok(3));
        assert_eq!(rb.read(), Ok(4));
        assert_eq!(rb.read(), Ok(5));
    }

    #[test]
    fn test_push_overwrite_reports_discard() {
        let rb = ring(2);
        assert_eq!(rb.push_overwrite(1), Ok(false));
        assert_eq!(rb.push_overwrite(2), Ok(false));
        assert_eq!(rb.push_overwrite(3), Ok(true));
    }

    #[test]
    fn test_peeks_do_not_consume() {
        let rb = ring(4);
        rb.write(10).unwrap();
        rb.write(20).unwrap();

        assert_eq!(rb.peek_oldest(), Ok(10));
        assert_eq!(rb.peek_newest(), Ok(20));
        assert_eq!(rb.available(), 2);
        assert_eq!(rb.read(), Ok(10));
    }

    #[test]
    fn test_peek_empty() {
        let rb = ring(2);
        assert_eq!(rb.peek_oldest(), Err(RingError::Empty));
        assert_eq!(rb.peek_newest(), Err(RingError::Empty));
    }

    #[test]
    fn test_pop_front_and_back() {
        let rb = ring(4);
        for v in 1..=4u32 {
            rb.write(v).unwrap();
        }
        rb.pop_oldest().unwrap(); // drops 1
        rb.pop_newest().unwrap(); // drops 4
        assert_eq!(rb.read(), Ok(2));
        assert_eq!(rb.read(), Ok(3));
        assert_eq!(rb.pop_oldest(), Err(RingError::Empty));
    }

    #[test]
    fn test_pop_many_clamps() {
        let rb = ring(4);
        for v in 1..=3u32 {
            rb.write(v).unwrap();
        }
        assert_eq!(rb.pop_oldest_many(10), Ok(3));
        assert!(rb.is_empty());
        assert_eq!(rb.pop_newest_many(1), Ok(0));
    }

    #[test]
    fn test_pop_newest_many_leaves_oldest() {
        let rb = ring(5);
        for v in 1..=5u32 {
            rb.write(v).unwrap();
        }
        assert_eq!(rb.pop_newest_many(3), Ok(3));
        assert_eq!(rb.read(), Ok(1));
        assert_eq!(rb.read(), Ok(2));
        assert!(rb.is_empty());
    }

    #[test]
    fn test_clear() {
        let rb = ring(4);
        rb.write(1).unwrap();
        rb.write(2).unwrap();
        rb.clear().unwrap();
        assert!(rb.is_empty());
        rb.write(9).unwrap();
        assert_eq!(rb.read(), Ok(9));
    }

    #[test]
    fn test_write_many_wraps_across_boundary() {
        // capacity deliberately not a multiple of the batch size
        let rb = ring(10);
        let first: Vec<u32> = (0..7).collect();
        assert_eq!(rb.write_many(&first), Ok(7));

        let mut out = [0u32; 7];
        assert_eq!(rb.read_many(&mut out), Ok(7));
        assert_eq!(&out[..], &first[..]);

        // head/tail now sit at 7; the next batch wraps
        let second: Vec<u32> = (100..107).collect();
        assert_eq!(rb.write_many(&second), Ok(7));
        assert_eq!(rb.read_many(&mut out), Ok(7));
        assert_eq!(&out[..], &second[..]);
    }

    #[test]
    fn test_write_many_clamps_to_free_space() {
        let rb = ring(4);
        rb.write(1).unwrap();
        let data = [10u32, 11, 12, 13, 14];
        assert_eq!(rb.write_many(&data), Ok(3));
        assert_eq!(rb.read(), Ok(1));
        assert_eq!(rb.read(), Ok(10));
        assert_eq!(rb.read(), Ok(11));
        assert_eq!(rb.read(), Ok(12));
        assert!(rb.is_empty());
    }

    #[test]
    fn test_read_many_clamps_to_count() {
        let rb = ring(4);
        rb.write(5).unwrap();
        let mut out = [0u32; 4];
        assert_eq!(rb.read_many(&mut out), Ok(1));
        assert_eq!(out[0], 5);
    }

    #[test]
    fn test_push_overwrite_many_on_full_ring() {
        let rb = ring(4);
        for v in 1..=4u32 {
            rb.write(v).unwrap();
        }
        assert_eq!(rb.push_overwrite_many(&[5, 6]), Ok(2));
        assert_eq!(rb.available(), 4);
        let mut out = [0u32; 4];
        assert_eq!(rb.read_many(&mut out), Ok(4));
        assert_eq!(out, [3, 4, 5, 6]);
    }

    #[test]
    fn test_push_overwrite_many_oversized_batch() {
        let rb = ring(3);
        let data: Vec<u32> = (1..=8).collect();
        assert_eq!(rb.push_overwrite_many(&data), Ok(8));
        assert_eq!(rb.available(), 3);
        let mut out = [0u32; 3];
        assert_eq!(rb.read_many(&mut out), Ok(3));
        assert_eq!(out, [6, 7, 8]);
    }

    #[test]
    fn test_peek_many_both_directions() {
        let rb = ring(5);
        for v in 1..=4u32 {
            rb.write(v).unwrap();
        }

        let mut oldest = [0u32; 3];
        assert_eq!(rb.peek_oldest_many(&mut oldest), Ok(3));
        assert_eq!(oldest, [1, 2, 3]);

        let mut newest = [0u32; 3];
        assert_eq!(rb.peek_newest_many(&mut newest), Ok(3));
        assert_eq!(newest, [4, 3, 2]);

        assert_eq!(rb.available(), 4);
    }

    #[test]
    fn test_byte_hatch_round_trip() {
        let rb = ring(4);
        let bytes: Vec<u8> = [1u32, 2, 3]
            .iter()
            .flat_map(|v| v.to_ne_bytes())
            .collect();
        // SAFETY: u32 accepts any bit pattern.
        let written = unsafe { rb.write_bytes(&bytes) }.unwrap();
        assert_eq!(written, 3);

        let mut out = [0u8; 8];
        let read = unsafe { rb.read_bytes(&mut out) }.unwrap();
        assert_eq!(read, 2);
        assert_eq!(rb.read(), Ok(3));
    }

    #[test]
    fn test_byte_hatch_rejects_partial_element() {
        let rb = ring(4);
        let bytes = [0u8; 6]; // not a multiple of 4
        assert_eq!(
            unsafe { rb.write_bytes(&bytes) },
            Err(RingError::IncompatibleElementSize {
                expected: 4,
                got: 6
            })
        );
        let mut out = [0u8; 2];
        assert_eq!(
            unsafe { rb.read_bytes(&mut out) },
            Err(RingError::IncompatibleElementSize {
                expected: 4,
                got: 2
            })
        );
    }

    #[test]
    fn test_construction_rejects_zero_capacity() {
        let err = Ring::<u32>::with_capacity(SyncContext::new(), 0).unwrap_err();
        assert_eq!(err, RingError::AllocationFailed { bytes: 0 });
    }

    #[test]
    fn test_attached_storage_is_not_owned() {
        let slots: &'static mut [MaybeUninit<u32>] =
            Box::leak(vec![MaybeUninit::uninit(); 8].into_boxed_slice());
        let rb = Ring::attach(SyncContext::new(), RingConfig::new(8), slots).unwrap();
        assert!(!rb.owns_storage());
        assert_eq!(rb.capacity(), 8);
        rb.write(3).unwrap();
        assert_eq!(rb.read(), Ok(3));
    }

    #[test]
    fn test_attach_rejects_short_region() {
        let slots: &'static mut [MaybeUninit<u32>] =
            Box::leak(vec![MaybeUninit::uninit(); 2].into_boxed_slice());
        assert!(Ring::attach(SyncContext::new(), RingConfig::new(8), slots).is_err());
    }

    #[test]
    fn test_corrupted_count_answers_zero_and_aborts_mutation() {
        let rb = ring(4);
        rb.write(1).unwrap();
        // Simulate an uncoordinated mutation pushing count past capacity.
        rb.count.store(5, Ordering::Release);

        assert_eq!(rb.available(), 0);
        assert_eq!(rb.free(), 0);

        let expected = Err(RingError::Corrupted {
            count: 5,
            capacity: 4,
        });
        assert_eq!(rb.write(2), expected);
        assert_eq!(rb.read(), expected.map(|()| 0));
        assert_eq!(rb.push_overwrite(2), expected.map(|()| false));
        assert_eq!(rb.pop_oldest_many(1), expected.map(|()| 0));
        assert_eq!(rb.write_many(&[1, 2]), expected.map(|()| 0));
    }

    #[test]
    fn test_element_size() {
        let rb = ring(2);
        assert_eq!(rb.element_size(), 4);
        assert!(rb.owns_storage());
    }
}
