//! Ring-to-ring transfer.
//!
//! A transfer holds both rings' critical sections at once. To keep two
//! contexts that transfer in opposite directions from deadlocking, the
//! sections are always entered in construction order (each ring carries a
//! construction sequence number): whichever ring was created first is locked
//! first, regardless of which side is the source.

use crate::critical::CriticalGuard;
use crate::invariants::debug_assert_cursor_range;
use crate::{Ring, RingError};
use std::ptr;

impl<T: Copy + 'static> Ring<T> {
    /// Moves as many elements as fit from `self` into `dst`, preserving
    /// order. Transfers `min(self.available(), dst.free())` elements and
    /// returns the number moved; a full destination or empty source moves
    /// zero and is not an error. Transferring a ring into itself is a no-op.
    pub fn dump_into(&self, dst: &Ring<T>) -> Result<usize, RingError> {
        self.transfer(dst, usize::MAX, false)
    }

    /// Like [`dump_into`](Self::dump_into) but moves at most `limit`
    /// elements.
    pub fn dump_into_limited(&self, dst: &Ring<T>, limit: usize) -> Result<usize, RingError> {
        self.transfer(dst, limit, false)
    }

    /// Copies elements into `dst` without consuming them from `self`.
    /// Same clamping as [`dump_into`](Self::dump_into).
    pub fn copy_into(&self, dst: &Ring<T>) -> Result<usize, RingError> {
        self.transfer(dst, usize::MAX, true)
    }

    /// Like [`copy_into`](Self::copy_into) but copies at most `limit`
    /// elements.
    pub fn copy_into_limited(&self, dst: &Ring<T>, limit: usize) -> Result<usize, RingError> {
        self.transfer(dst, limit, true)
    }

    fn transfer(&self, dst: &Ring<T>, limit: usize, preserve_source: bool) -> Result<usize, RingError> {
        if ptr::eq(self, dst) {
            return Ok(0);
        }

        // Enter both critical sections in construction order, whichever
        // side that puts first.
        let (src_guard, dst_guard): (CriticalGuard<'_>, CriticalGuard<'_>) =
            if self.sequence() < dst.sequence() {
                let a = self.sync_state().enter(self.acquire_timeout())?;
                let b = dst.sync_state().enter(dst.acquire_timeout())?;
                (a, b)
            } else {
                let b = dst.sync_state().enter(dst.acquire_timeout())?;
                let a = self.sync_state().enter(self.acquire_timeout())?;
                (a, b)
            };

        let src_count = self.locked_count(&src_guard)?;
        let dst_count = dst.locked_count(&dst_guard)?;
        let n = src_count.min(dst.capacity() - dst_count).min(limit);
        if n == 0 {
            return Ok(0);
        }

        // SAFETY: both critical sections are held; the source's n oldest
        // slots are initialized and the destination's n slots past its head
        // are free. Chunk boundaries are whichever wrap point comes first.
        unsafe {
            let (_, src_tail) = self.cursors();
            let (dst_head, _) = dst.cursors();
            let mut s = *src_tail;
            let mut d = *dst_head;
            let mut remaining = n;
            while remaining > 0 {
                let chunk = remaining
                    .min(self.capacity() - s)
                    .min(dst.capacity() - d);
                ptr::copy_nonoverlapping(self.base_ptr().add(s), dst.base_ptr().add(d), chunk);
                s = (s + chunk) % self.capacity();
                d = (d + chunk) % dst.capacity();
                remaining -= chunk;
            }
            *dst_head = d;
            debug_assert_cursor_range!("head", *dst_head, dst.capacity());
            if !preserve_source {
                *src_tail = s;
                debug_assert_cursor_range!("tail", *src_tail, self.capacity());
            }
        }

        dst.store_count(dst_count + n);
        if !preserve_source {
            self.store_count(src_count - n);
        }
        tracing::trace!(moved = n, preserve_source, "ring transfer");
        Ok(n)
    }
}
