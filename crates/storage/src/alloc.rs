//! Fixed-size buffer slab (spec.md §4.1).
//!
//! Every page and serialized record originates here so eviction frees
//! memory predictably: buffers of a given size are pooled and reused rather
//! than going back to the global allocator on every page swap.

use common::DbError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Thread-safe slab allocator for fixed-size byte buffers.
pub struct PageAllocator {
    /// Free buffers, bucketed by exact size.
    free: Mutex<HashMap<usize, Vec<Vec<u8>>>>,
    outstanding_bytes: AtomicUsize,
    ceiling_bytes: usize,
}

impl PageAllocator {
    pub fn new(ceiling_bytes: usize) -> Self {
        PageAllocator {
            free: Mutex::new(HashMap::new()),
            outstanding_bytes: AtomicUsize::new(0),
            ceiling_bytes,
        }
    }

    /// Outstanding bytes currently checked out via `apply` and not yet
    /// returned via `release`.
    pub fn outstanding(&self) -> usize {
        self.outstanding_bytes.load(Ordering::Relaxed)
    }

    /// Return a zero-initialized buffer of exactly `n` bytes, reusing a
    /// pooled buffer of that size when one is available.
    ///
    /// Errs with [`DbError::AllocatorExceeded`] (`CM_EXCEED_LIMIT`) if
    /// granting this request would push outstanding bytes past the
    /// configured ceiling.
    pub fn apply(&self, n: usize) -> Result<Vec<u8>, DbError> {
        let prev = self.outstanding_bytes.fetch_add(n, Ordering::Relaxed);
        if prev + n > self.ceiling_bytes {
            self.outstanding_bytes.fetch_sub(n, Ordering::Relaxed);
            return Err(DbError::AllocatorExceeded);
        }

        let mut pooled = {
            let mut free = self.free.lock().unwrap();
            free.get_mut(&n).and_then(|bucket| bucket.pop())
        };
        if let Some(buf) = pooled.take() {
            debug_assert_eq!(buf.len(), n);
            return Ok(buf);
        }
        Ok(vec![0u8; n])
    }

    /// Return a buffer previously obtained from `apply(n)` back to the
    /// slab for reuse. `n` must match the size it was applied for.
    pub fn release(&self, mut buf: Vec<u8>, n: usize) {
        debug_assert_eq!(buf.len(), n, "release() size must match the original apply()");
        self.outstanding_bytes.fetch_sub(n, Ordering::Relaxed);
        buf.iter_mut().for_each(|b| *b = 0);
        let mut free = self.free.lock().unwrap();
        free.entry(n).or_default().push(buf);
    }
}

impl Default for PageAllocator {
    fn default() -> Self {
        PageAllocator::new(512 * 1024 * 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_returns_zeroed_buffer_of_requested_size() {
        let alloc = PageAllocator::default();
        let buf = alloc.apply(128).unwrap();
        assert_eq!(buf.len(), 128);
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn release_then_apply_reuses_buffer() {
        let alloc = PageAllocator::default();
        let mut buf = alloc.apply(64).unwrap();
        buf[0] = 0xAB;
        alloc.release(buf, 64);
        assert_eq!(alloc.outstanding(), 0);
        let reused = alloc.apply(64).unwrap();
        assert_eq!(reused.len(), 64);
        // Released buffers are re-zeroed before going back on the shelf.
        assert!(reused.iter().all(|&b| b == 0));
    }

    #[test]
    fn exceeding_ceiling_fails() {
        let alloc = PageAllocator::new(100);
        assert!(alloc.apply(50).is_ok());
        let err = alloc.apply(51).unwrap_err();
        assert!(matches!(err, DbError::AllocatorExceeded));
    }

    #[test]
    fn outstanding_bytes_tracks_live_allocations() {
        let alloc = PageAllocator::default();
        let a = alloc.apply(10).unwrap();
        let b = alloc.apply(20).unwrap();
        assert_eq!(alloc.outstanding(), 30);
        alloc.release(a, 10);
        assert_eq!(alloc.outstanding(), 20);
        alloc.release(b, 20);
        assert_eq!(alloc.outstanding(), 0);
    }
}
