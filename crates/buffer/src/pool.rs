//! Sharded page cache with periodic LRU-ish sweep (spec.md §4.10).

use crate::traits::CachedPage;
use common::{FileId, PageId};
use lru::LruCache;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

const SHARD_COUNT: usize = 16;
const MIN_QUOTA: usize = 1_000;
const MAX_QUOTA: usize = 100_000;

type Key = (FileId, PageId);

fn shard_of(key: Key) -> usize {
    let hash = ((key.0 .0 as u64) << 32) | (key.1 .0 as u64);
    (hash as usize) % SHARD_COUNT
}

/// An unbounded `lru::LruCache` gives each shard the recency order the
/// source's pool approximates by hand; `sweep` walks it from the
/// least-recently-used end instead of sorting `last_access_ts` itself.
/// Capacity is enforced by `sweep`, not by the cache itself, because
/// eviction here must skip pinned/write-latched pages, which `LruCache`'s
/// own capacity eviction knows nothing about.
struct Shard {
    entries: Mutex<LruCache<Key, Arc<dyn CachedPage>>>,
}

impl Shard {
    fn new() -> Self {
        Shard { entries: Mutex::new(LruCache::unbounded()) }
    }
}

/// Resident-page cache keyed by `(file_id, page_id)`, sharded to keep lock
/// contention local the way the source's `(file_id << 32) | page_id` sharded
/// hash map does.
pub struct PageBufferPool {
    shards: Vec<Shard>,
    max_cache_pages: usize,
    sweep_target_ratio: f64,
    len: AtomicUsize,
    sweeping: AtomicBool,
    next_quota: AtomicUsize,
    evicted_total: AtomicUsize,
}

impl PageBufferPool {
    pub fn new(max_cache_pages: usize, sweep_target_ratio: f64) -> Self {
        PageBufferPool {
            shards: (0..SHARD_COUNT).map(|_| Shard::new()).collect(),
            max_cache_pages,
            sweep_target_ratio,
            len: AtomicUsize::new(0),
            sweeping: AtomicBool::new(false),
            next_quota: AtomicUsize::new(MIN_QUOTA),
            evicted_total: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total pages evicted across this pool's lifetime, for telemetry.
    pub fn evicted_total(&self) -> usize {
        self.evicted_total.load(Ordering::Relaxed)
    }

    /// Look up a cached page. `LruCache::get` promotes the entry to
    /// most-recently-used; `touch` additionally bumps the page's own
    /// telemetry (spec.md §4.10).
    pub fn find(&self, file_id: FileId, page_id: PageId) -> Option<Arc<dyn CachedPage>> {
        let key = (file_id, page_id);
        let shard = &self.shards[shard_of(key)];
        let mut entries = shard.entries.lock();
        let page = entries.get(&key).cloned();
        if let Some(p) = &page {
            p.touch();
        }
        page
    }

    /// Insert a freshly loaded page. If a racing insert already populated
    /// this slot, the existing entry wins and is returned with its
    /// recency bumped (spec.md §4.10: `insert` "increments page refcount on
    /// successful find").
    pub fn insert(&self, page: Arc<dyn CachedPage>) -> Arc<dyn CachedPage> {
        let key = (page.file_id(), page.page_id());
        let shard = &self.shards[shard_of(key)];
        let mut entries = shard.entries.lock();
        if let Some(existing) = entries.get(&key) {
            existing.touch();
            return existing.clone();
        }
        entries.put(key, page.clone());
        drop(entries);
        self.len.fetch_add(1, Ordering::Relaxed);
        page
    }

    /// Mark every cached page belonging to `file_id` as closed so the next
    /// sweep evicts it immediately, regardless of recency or refcount.
    pub fn mark_file_closed(&self, file_id: FileId) {
        for shard in &self.shards {
            let entries = shard.entries.lock();
            for (key, page) in entries.iter() {
                if key.0 == file_id {
                    page.mark_closed();
                }
            }
        }
    }

    /// Run one sweep pass, evicting down toward `target = max_cache_pages *
    /// sweep_target_ratio`. Only one sweep runs at a time (spec.md §4.10: "At
    /// most one sweep runs at a time"); concurrent callers simply no-op.
    ///
    /// Returns the number of pages evicted.
    pub fn sweep(&self) -> usize {
        if self
            .sweeping
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return 0;
        }
        let evicted = self.sweep_inner();
        self.sweeping.store(false, Ordering::Release);
        evicted
    }

    fn sweep_inner(&self) -> usize {
        let target = ((self.max_cache_pages as f64) * self.sweep_target_ratio) as usize;
        let current = self.len();
        if current <= target {
            self.adapt_quota(0);
            return 0;
        }

        let quota = self.next_quota.load(Ordering::Relaxed);
        let per_shard_quota = (quota / SHARD_COUNT).max(1);
        let mut total_evicted = 0usize;

        for shard in &self.shards {
            let mut entries = shard.entries.lock();

            // Closed pages are evicted unconditionally first.
            let closed: Vec<Key> = entries
                .iter()
                .filter(|(_, p)| p.is_closed())
                .map(|(k, _)| *k)
                .collect();
            for key in closed {
                entries.pop(&key);
                total_evicted += 1;
            }

            // Remaining candidates: unpinned, not write-latched, chosen by
            // walking the shard's LRU order from its least-recently-used end
            // (iter() yields most-recently-used first, so collect then walk
            // the snapshot in reverse — `LruCache`'s iterator isn't
            // double-ended) until `per_shard_quota` victims are found.
            let snapshot: Vec<(Key, bool, bool)> =
                entries.iter().map(|(k, p)| (*k, p.refcount() > 0, p.is_write_latched())).collect();
            let mut victims: Vec<Key> = Vec::with_capacity(per_shard_quota);
            for (key, pinned, write_latched) in snapshot.into_iter().rev() {
                if victims.len() >= per_shard_quota {
                    break;
                }
                if pinned || write_latched {
                    continue;
                }
                victims.push(key);
            }
            for key in victims {
                entries.pop(&key);
                total_evicted += 1;
            }
        }

        self.len.fetch_sub(total_evicted, Ordering::Relaxed);
        self.evicted_total.fetch_add(total_evicted, Ordering::Relaxed);
        self.adapt_quota(total_evicted);
        total_evicted
    }

    /// Next sweep's quota is clamped to `[prev/2, prev*2]` and to
    /// `[MIN_QUOTA, MAX_QUOTA]` (spec.md §4.10).
    fn adapt_quota(&self, evicted: usize) {
        let prev = self.next_quota.load(Ordering::Relaxed);
        let proposed = if evicted == 0 { prev } else { evicted };
        let clamped_to_prev = proposed.clamp(prev / 2, prev.saturating_mul(2));
        let clamped = clamped_to_prev.clamp(MIN_QUOTA, MAX_QUOTA);
        self.next_quota.store(clamped, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64};

    struct TestPage {
        file_id: FileId,
        page_id: PageId,
        ts: AtomicU64,
        refcount: AtomicI64,
        write_latched: AtomicBool,
        closed: AtomicBool,
    }

    impl TestPage {
        fn new(file_id: u16, page_id: u32, ts: u64) -> Arc<dyn CachedPage> {
            Arc::new(TestPage {
                file_id: FileId(file_id),
                page_id: PageId(page_id),
                ts: AtomicU64::new(ts),
                refcount: AtomicI64::new(0),
                write_latched: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            })
        }
    }

    impl CachedPage for TestPage {
        fn file_id(&self) -> FileId {
            self.file_id
        }
        fn page_id(&self) -> PageId {
            self.page_id
        }
        fn last_access_ts(&self) -> u64 {
            self.ts.load(Ordering::Relaxed)
        }
        fn touch(&self) {
            self.ts.fetch_add(1, Ordering::Relaxed);
            self.refcount.fetch_add(1, Ordering::Relaxed);
        }
        fn refcount(&self) -> i64 {
            self.refcount.load(Ordering::Relaxed)
        }
        fn unpin(&self) {
            self.refcount.fetch_sub(1, Ordering::Relaxed);
        }
        fn is_write_latched(&self) -> bool {
            self.write_latched.load(Ordering::Relaxed)
        }
        fn mark_closed(&self) {
            self.closed.store(true, Ordering::Relaxed);
        }
        fn is_closed(&self) -> bool {
            self.closed.load(Ordering::Relaxed)
        }
    }

    #[test]
    fn insert_then_find_round_trips() {
        let pool = PageBufferPool::new(100, 0.8);
        let page = TestPage::new(1, 1, 0);
        pool.insert(page.clone());
        let found = pool.find(FileId(1), PageId(1)).unwrap();
        assert_eq!(found.page_id(), PageId(1));
    }

    #[test]
    fn racing_insert_keeps_first_entry() {
        let pool = PageBufferPool::new(100, 0.8);
        let a = TestPage::new(1, 1, 0);
        let b = TestPage::new(1, 1, 0);
        let won = pool.insert(a.clone());
        let lost = pool.insert(b);
        assert!(Arc::ptr_eq(&won, &pool.find(FileId(1), PageId(1)).unwrap()));
        let _ = lost;
    }

    #[test]
    fn sweep_evicts_closed_pages_unconditionally() {
        let pool = PageBufferPool::new(1, 0.8);
        let page = TestPage::new(1, 1, 0);
        pool.insert(page.clone());
        page.mark_closed();
        let evicted = pool.sweep();
        assert_eq!(evicted, 1);
        assert!(pool.find(FileId(1), PageId(1)).is_none());
    }

    #[test]
    fn sweep_skips_pinned_pages() {
        let pool = PageBufferPool::new(1, 0.5);
        let page = TestPage::new(1, 1, 0);
        pool.insert(page.clone());
        page.touch(); // refcount now 1
        pool.sweep();
        assert!(pool.find(FileId(1), PageId(1)).is_some());
    }

    #[test]
    fn sweep_evicts_unpinned_pages_in_lru_order() {
        let pool = PageBufferPool::new(10, 0.0); // target 0, evict as many as possible
        pool.insert(TestPage::new(1, 1, 100));
        pool.insert(TestPage::new(1, 2, 1));
        let page3 = pool.insert(TestPage::new(1, 3, 50));
        // Touching page 3 after the others were inserted promotes it to
        // most-recently-used, but `touch` also pins it (refcount > 0), so it
        // must survive the sweep regardless of eviction order.
        page3.touch();
        let evicted = pool.sweep();
        assert!(evicted >= 1);
        assert!(pool.find(FileId(1), PageId(3)).is_some());
    }
}
