//! Free-page-id list with contiguous-run support (spec.md §4.8).

use common::{PageId, PAGE_NULL_POINTER};
use std::collections::BTreeMap;

/// Free list of reclaimed page ids, organised by run start so that a
/// contiguous span of `n` free pages (needed for overflow page runs) can be
/// found without a linear scan.
#[derive(Debug, Default)]
pub struct GarbageOwner {
    /// start page id -> run length, for runs of free pages.
    runs: BTreeMap<u32, u32>,
}

impl GarbageOwner {
    pub fn new() -> Self {
        GarbageOwner { runs: BTreeMap::new() }
    }

    /// Return the start of a run of at least `n` contiguous free pages,
    /// removing it (or the consumed prefix of it) from the free list.
    /// Returns [`PAGE_NULL_POINTER`] if no run is long enough — callers
    /// must treat that as "allocate fresh pages", never as a valid id
    /// (spec.md's Open Questions flags this exact ambiguity).
    pub fn apply(&mut self, n: u32) -> PageId {
        let Some((&start, &len)) = self.runs.iter().find(|(_, &len)| len >= n) else {
            return PAGE_NULL_POINTER;
        };
        self.runs.remove(&start);
        if len > n {
            self.runs.insert(start + n, len - n);
        }
        PageId(start)
    }

    /// Merge `[first, first+n)` back into the free list, coalescing with
    /// adjacent runs on either side.
    pub fn release(&mut self, first: PageId, n: u32) {
        if n == 0 {
            return;
        }
        let mut start = first.0;
        let mut len = n;

        // Coalesce with a run that ends exactly at `start`.
        if let Some((&prev_start, &prev_len)) = self.runs.range(..start).next_back() {
            if prev_start + prev_len == start {
                self.runs.remove(&prev_start);
                start = prev_start;
                len += prev_len;
            }
        }
        // Coalesce with a run that begins exactly at `start + len`.
        if let Some(&next_len) = self.runs.get(&(start + len)) {
            self.runs.remove(&(start + len));
            len += next_len;
        }

        self.runs.insert(start, len);
    }

    pub fn free_page_count(&self) -> u32 {
        self.runs.values().sum()
    }

    #[cfg(test)]
    fn run_count(&self) -> usize {
        self.runs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_on_empty_owner_returns_null_pointer() {
        let mut owner = GarbageOwner::new();
        assert_eq!(owner.apply(1), PAGE_NULL_POINTER);
    }

    #[test]
    fn release_then_apply_round_trips() {
        let mut owner = GarbageOwner::new();
        owner.release(PageId(10), 5);
        assert_eq!(owner.apply(3), PageId(10));
        // Partial consumption leaves the remainder (13, len 2) free.
        assert_eq!(owner.free_page_count(), 2);
        assert_eq!(owner.apply(2), PageId(13));
        assert_eq!(owner.apply(1), PAGE_NULL_POINTER);
    }

    #[test]
    fn adjacent_runs_coalesce_on_release() {
        let mut owner = GarbageOwner::new();
        owner.release(PageId(0), 5);
        owner.release(PageId(5), 5);
        assert_eq!(owner.run_count(), 1);
        assert_eq!(owner.apply(10), PageId(0));
    }

    #[test]
    fn release_coalesces_on_both_sides() {
        let mut owner = GarbageOwner::new();
        owner.release(PageId(0), 5);
        owner.release(PageId(10), 5);
        owner.release(PageId(5), 5); // fills the gap between both runs
        assert_eq!(owner.run_count(), 1);
        assert_eq!(owner.free_page_count(), 15);
    }

    #[test]
    fn apply_picks_a_run_long_enough_even_if_not_first() {
        let mut owner = GarbageOwner::new();
        owner.release(PageId(0), 2);
        owner.release(PageId(100), 10);
        assert_eq!(owner.apply(5), PageId(100));
    }
}
