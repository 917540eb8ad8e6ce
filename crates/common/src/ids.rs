//! Page and file identifiers.

use std::collections::HashSet;
use std::sync::Mutex;

/// Identifies a page within a single index file. 32-bit per spec.md §3.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct PageId(pub u32);

/// All-ones sentinel meaning "no page" (`PAGE_NULL_POINTER` in spec.md §3).
pub const PAGE_NULL_POINTER: PageId = PageId(u32::MAX);

impl PageId {
    pub const NULL: PageId = PAGE_NULL_POINTER;

    pub fn is_null(&self) -> bool {
        *self == PAGE_NULL_POINTER
    }

    pub fn next(self) -> PageId {
        PageId(self.0 + 1)
    }

    pub fn offset(self, n: u32) -> PageId {
        PageId(self.0 + n)
    }
}

impl Default for PageId {
    fn default() -> Self {
        PAGE_NULL_POINTER
    }
}

/// Identifies an open index file for the lifetime of the process.
/// 16-bit per spec.md §3.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct FileId(pub u16);

/// Global monotonic-with-reuse allocator for [`FileId`]s.
///
/// Grounded on the source engine's file-id allocator, with the inversion
/// flagged in spec.md's Open Questions fixed: the source inserts an id into
/// the "in use" set only when the id is *already* present, which is
/// backwards. The correct rule implemented here is: walk ids from `0`,
/// skip ones already in use, claim the first one that is free; only grow
/// the high-water mark when every id below it is in use.
pub struct FileIdAllocator {
    inner: Mutex<Inner>,
}

struct Inner {
    in_use: HashSet<u16>,
    next_new: u16,
}

impl FileIdAllocator {
    pub const fn new() -> Self {
        FileIdAllocator {
            inner: Mutex::new(Inner {
                in_use: HashSet::new(),
                next_new: 0,
            }),
        }
    }

    /// Allocate the smallest `FileId` not currently in use.
    pub fn allocate(&self) -> FileId {
        let mut inner = self.inner.lock().unwrap();
        for candidate in 0..inner.next_new {
            if !inner.in_use.contains(&candidate) {
                inner.in_use.insert(candidate);
                return FileId(candidate);
            }
        }
        let id = inner.next_new;
        inner.next_new += 1;
        inner.in_use.insert(id);
        FileId(id)
    }

    /// Return a `FileId` to the pool so it can be reused by a later
    /// `allocate()` call.
    pub fn release(&self, id: FileId) {
        let mut inner = self.inner.lock().unwrap();
        inner.in_use.remove(&id.0);
    }
}

impl Default for FileIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_sequentially_when_nothing_released() {
        let alloc = FileIdAllocator::new();
        assert_eq!(alloc.allocate(), FileId(0));
        assert_eq!(alloc.allocate(), FileId(1));
        assert_eq!(alloc.allocate(), FileId(2));
    }

    #[test]
    fn reuses_released_ids_before_growing() {
        let alloc = FileIdAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();
        let _c = alloc.allocate();
        alloc.release(b);
        // The freed id (1) must be handed back out before a fresh id (3).
        assert_eq!(alloc.allocate(), b);
        assert_eq!(alloc.allocate(), FileId(3));
        let _ = a;
    }

    #[test]
    fn page_null_pointer_is_all_ones() {
        assert_eq!(PAGE_NULL_POINTER.0, u32::MAX);
        assert!(PageId::NULL.is_null());
        assert!(!PageId(0).is_null());
    }
}
