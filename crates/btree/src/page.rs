//! `IndexPage` common machinery plus the two concrete node kinds,
//! `LeafPage` and `BranchPage` (spec.md §4.4, §4.5, §4.6).

use crate::record::{sort_key_cmp, value_cmp, BranchRecord, LeafRecord, LeafVersion, RawRecord};
use crate::tree::IndexTree;
use buffer::{CachedPage, DivisiblePage};
use common::{DbResult, FileId, PageId, PAGE_NULL_POINTER};
use common::spin::SharedSpinLatch;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{OnceLock, Weak};
use std::time::{SystemTime, UNIX_EPOCH};
use types::Value;

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

/// Fields every resident page carries, regardless of kind (spec.md §4.4).
struct PageMeta {
    file_id: FileId,
    page_id: PageId,
    parent_page_id: RwLock<PageId>,
    last_access_ts: AtomicU64,
    enqueued_at_ms: AtomicU64,
    refcount: AtomicI64,
    latch: SharedSpinLatch,
    closed: AtomicBool,
    dirty: AtomicBool,
}

impl PageMeta {
    fn new(file_id: FileId, page_id: PageId, parent_page_id: PageId) -> Self {
        PageMeta {
            file_id,
            page_id,
            parent_page_id: RwLock::new(parent_page_id),
            last_access_ts: AtomicU64::new(now_ms()),
            enqueued_at_ms: AtomicU64::new(now_ms()),
            refcount: AtomicI64::new(0),
            latch: SharedSpinLatch::new(),
            closed: AtomicBool::new(false),
            dirty: AtomicBool::new(true),
        }
    }

    fn parent_page_id(&self) -> PageId {
        *self.parent_page_id.read()
    }

    fn set_parent_page_id(&self, pid: PageId) {
        *self.parent_page_id.write() = pid;
    }
}

macro_rules! impl_cached_page {
    ($ty:ty) => {
        impl CachedPage for $ty {
            fn file_id(&self) -> FileId {
                self.meta.file_id
            }
            fn page_id(&self) -> PageId {
                self.meta.page_id
            }
            fn last_access_ts(&self) -> u64 {
                self.meta.last_access_ts.load(Ordering::Relaxed)
            }
            fn touch(&self) {
                self.meta.last_access_ts.store(now_ms(), Ordering::Relaxed);
                self.meta.refcount.fetch_add(1, Ordering::Relaxed);
            }
            fn refcount(&self) -> i64 {
                self.meta.refcount.load(Ordering::Relaxed)
            }
            fn unpin(&self) {
                self.meta.refcount.fetch_sub(1, Ordering::Relaxed);
            }
            fn is_write_latched(&self) -> bool {
                self.meta.latch.is_write_locked()
            }
            fn mark_closed(&self) {
                self.meta.closed.store(true, Ordering::Relaxed);
            }
            fn is_closed(&self) -> bool {
                self.meta.closed.load(Ordering::Relaxed)
            }
        }
    };
}

/// Outcome of `search_key`: an insertion index in `[0, record_count]` and
/// whether the key (and, for non-unique pages, suffix) was found exactly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchResult {
    pub index: usize,
    pub found: bool,
}

fn search<R: RawRecord>(records: &[R], key: &Value, pk_suffix: Option<&Value>) -> SearchResult {
    // Leftmost match on key, tie-broken by pk_suffix, matching spec.md
    // §4.6's "left-most branch entry" rule for non-unique navigation.
    let target = (key, pk_suffix);
    let index = records.partition_point(|r| sort_key_cmp(r.sort_key(), target) == std::cmp::Ordering::Less);
    let found = records.get(index).map(|r| r.sort_key() == target).unwrap_or(false);
    SearchResult { index, found }
}

/// Sorted vector of leaf records plus sibling links (spec.md §4.5).
pub struct LeafPage {
    meta: PageMeta,
    prev_page_id: RwLock<PageId>,
    next_page_id: RwLock<PageId>,
    records: RwLock<Vec<LeafRecord>>,
    max_data_length: usize,
    non_unique: bool,
    /// Set once by the owning `IndexTree` right after construction so
    /// `page_divide` can call back into `IndexTree::divide_leaf_from_pool`.
    owner: OnceLock<Weak<IndexTree>>,
}

impl_cached_page!(LeafPage);

impl LeafPage {
    pub fn new(file_id: FileId, page_id: PageId, parent_page_id: PageId, max_data_length: usize, non_unique: bool) -> Self {
        LeafPage {
            meta: PageMeta::new(file_id, page_id, parent_page_id),
            prev_page_id: RwLock::new(PAGE_NULL_POINTER),
            next_page_id: RwLock::new(PAGE_NULL_POINTER),
            records: RwLock::new(Vec::new()),
            max_data_length,
            non_unique,
            owner: OnceLock::new(),
        }
    }

    /// Registers this page's owning tree. Called exactly once, right after
    /// construction, by `IndexTree::create_index`/`open_index`/`split_leaf`.
    pub(crate) fn set_owner(&self, owner: Weak<IndexTree>) {
        let _ = self.owner.set(owner);
    }

    pub fn parent_page_id(&self) -> PageId {
        self.meta.parent_page_id()
    }
    pub fn set_parent_page_id(&self, pid: PageId) {
        self.meta.set_parent_page_id(pid);
    }
    pub fn prev_page_id(&self) -> PageId {
        *self.prev_page_id.read()
    }
    pub fn set_prev_page_id(&self, pid: PageId) {
        *self.prev_page_id.write() = pid;
    }
    pub fn next_page_id(&self) -> PageId {
        *self.next_page_id.read()
    }
    pub fn set_next_page_id(&self, pid: PageId) {
        *self.next_page_id.write() = pid;
    }
    pub fn record_count(&self) -> usize {
        self.records.read().len()
    }
    pub fn is_non_unique(&self) -> bool {
        self.non_unique
    }

    pub fn search_key(&self, key: &Value, pk_suffix: Option<&Value>) -> SearchResult {
        search(&self.records.read(), key, pk_suffix)
    }

    /// `insert_record` (spec.md §4.5): fails with [`common::DbError::RepeatedRecord`]
    /// on an exact duplicate under a unique/primary index.
    pub fn insert_record(&self, record: LeafRecord) -> DbResult<()> {
        let mut records = self.records.write();
        let result = search(&records, &record.key, record.pk_suffix.as_ref());
        if result.found && !self.non_unique {
            return Err(common::DbError::RepeatedRecord);
        }
        records.insert(result.index, record);
        drop(records);
        self.meta.dirty.store(true, Ordering::Relaxed);
        self.meta.enqueued_at_ms.store(now_ms(), Ordering::Relaxed);
        Ok(())
    }

    /// Append-only fast path for bulk loading (spec.md §4.5 `add_record`).
    pub fn add_record(&self, record: LeafRecord, load_factor: f64) -> DbResult<bool> {
        let mut records = self.records.write();
        let projected: usize = records.iter().map(LeafRecord::approx_len).sum::<usize>() + record.approx_len();
        if projected as f64 > self.max_data_length as f64 * load_factor {
            return Ok(false);
        }
        records.push(record);
        Ok(true)
    }

    /// All records sharing `key` (the full non-unique run starting on this
    /// page; spec.md §4.5 `get_records`).
    pub fn get_records(&self, key: &Value) -> Vec<LeafRecord> {
        let records = self.records.read();
        records.iter().filter(|r| &r.key == key).cloned().collect()
    }

    pub fn get_record_at(&self, index: usize) -> Option<LeafRecord> {
        self.records.read().get(index).cloned()
    }

    /// Mark the record matching `key`/`pk_suffix` deleted at `stamp` (spec.md
    /// §4.3 "Deletion is a write of an empty value with the delete flag").
    pub fn delete_record(&self, key: &Value, pk_suffix: Option<&Value>, stamp: u64, active: &common::ActiveStampSet) -> bool {
        let mut records = self.records.write();
        let result = search(&records, key, pk_suffix);
        if !result.found {
            return false;
        }
        records[result.index].update(stamp, None, active);
        self.meta.dirty.store(true, Ordering::Relaxed);
        true
    }

    /// `update_record` (spec.md §4.3 write rule), taking an already-built
    /// [`LeafVersion`] rather than a raw value so the caller
    /// (`IndexTree::update`) can decide ahead of time whether the value
    /// needs to spill to an overflow run (spec.md §4.3 step 3).
    pub fn update_record_with_version(
        &self,
        key: &Value,
        pk_suffix: Option<&Value>,
        version: LeafVersion,
        active: &common::ActiveStampSet,
    ) -> bool {
        let mut records = self.records.write();
        let result = search(&records, key, pk_suffix);
        if !result.found {
            return false;
        }
        records[result.index].push_version(version, active);
        self.meta.dirty.store(true, Ordering::Relaxed);
        true
    }

    /// Range scan within this page (spec.md §4.5 `fetch_records`). Returns
    /// the matching records and whether the scan ran off the tail (caller
    /// should continue onto `next_page_id`).
    pub fn fetch_records(&self, start: Option<&Value>, end: Option<&Value>, inc_left: bool, inc_right: bool) -> (Vec<LeafRecord>, bool) {
        let records = self.records.read();
        let mut out = Vec::new();
        for r in records.iter() {
            if let Some(lo) = start {
                let order = value_cmp(&r.key, lo);
                let ok = if inc_left { order != std::cmp::Ordering::Less } else { order == std::cmp::Ordering::Greater };
                if !ok {
                    continue;
                }
            }
            if let Some(hi) = end {
                let order = value_cmp(&r.key, hi);
                let ok = if inc_right { order != std::cmp::Ordering::Greater } else { order == std::cmp::Ordering::Less };
                if !ok {
                    break;
                }
            }
            out.push(r.clone());
        }
        let reached_tail = match end {
            None => true,
            Some(hi) => records.last().map(|r| value_cmp(&r.key, hi) != std::cmp::Ordering::Greater).unwrap_or(true),
        };
        (out, reached_tail)
    }

    pub fn total_records_snapshot(&self) -> Vec<LeafRecord> {
        self.records.read().clone()
    }

    pub fn replace_records(&self, records: Vec<LeafRecord>) {
        *self.records.write() = records;
        self.meta.dirty.store(true, Ordering::Relaxed);
    }

    /// `min_key`/`max_key` used by split and by the linked-list consistency
    /// check (spec.md §8 property 3).
    pub fn min_key(&self) -> Option<Value> {
        self.records.read().first().map(|r| r.key.clone())
    }
    pub fn max_key(&self) -> Option<Value> {
        self.records.read().last().map(|r| r.key.clone())
    }

    /// Blocking write-latch acquisition; pairs with the [`DivisiblePage`]
    /// trait's `unlatch_write`, which releases the same latch.
    pub fn latch_write(&self) {
        self.meta.latch.lock();
    }
    pub fn latch_read(&self) {
        self.meta.latch.lock_shared();
    }
    pub fn unlatch_read(&self) {
        self.meta.latch.unlock_shared();
    }
}

impl DivisiblePage for LeafPage {
    fn total_data_length(&self) -> usize {
        self.records.read().iter().map(LeafRecord::approx_len).sum()
    }
    fn max_data_length(&self) -> usize {
        self.max_data_length
    }
    fn enqueued_at_ms(&self) -> u64 {
        self.meta.enqueued_at_ms.load(Ordering::Relaxed)
    }
    fn has_referenced_records(&self) -> bool {
        false
    }
    fn try_write_latch(&self) -> bool {
        self.meta.latch.try_lock()
    }
    fn unlatch_write(&self) {
        self.meta.latch.unlock();
    }
    fn page_divide(&self) -> DbResult<()> {
        // Actual redistribution needs page-id allocation and the parent
        // branch, both owned by `IndexTree`; this hook just forwards there.
        let owner = self
            .owner
            .get()
            .expect("leaf page must be registered with its owning tree before it can reach the divide pool");
        match owner.upgrade() {
            Some(tree) => tree.divide_leaf_from_pool(self.meta.page_id),
            None => Ok(()), // owning tree already dropped; nothing left to split
        }
    }
    fn save_records(&self) -> DbResult<bool> {
        let too_large = self.total_data_length() > self.max_data_length;
        self.meta.dirty.store(false, Ordering::Relaxed);
        Ok(!too_large)
    }
}

/// Sorted vector of branch records routing to child pages (spec.md §4.6).
pub struct BranchPage {
    meta: PageMeta,
    records: RwLock<Vec<BranchRecord>>,
    max_data_length: usize,
}

impl_cached_page!(BranchPage);

impl BranchPage {
    pub fn new(file_id: FileId, page_id: PageId, parent_page_id: PageId, max_data_length: usize) -> Self {
        BranchPage { meta: PageMeta::new(file_id, page_id, parent_page_id), records: RwLock::new(Vec::new()), max_data_length }
    }

    pub fn parent_page_id(&self) -> PageId {
        self.meta.parent_page_id()
    }
    pub fn set_parent_page_id(&self, pid: PageId) {
        self.meta.set_parent_page_id(pid);
    }
    pub fn record_count(&self) -> usize {
        self.records.read().len()
    }

    pub fn search_key(&self, key: &Value, pk_suffix: Option<&Value>) -> SearchResult {
        search(&self.records.read(), key, pk_suffix)
    }

    /// Resolve the child to descend into for `key`. Each record's key is
    /// the inclusive upper bound of its child's subtree (spec.md §4.6); the
    /// last record's child is the unbounded catch-all for keys past every
    /// stored separator ("`+∞` at the last slot", spec.md §8 property 2).
    pub fn child_for_key(&self, key: &Value, pk_suffix: Option<&Value>) -> PageId {
        let records = self.records.read();
        if records.is_empty() {
            return PAGE_NULL_POINTER;
        }
        let target = (key, pk_suffix);
        let idx = records.partition_point(|r| sort_key_cmp(r.sort_key(), target) == std::cmp::Ordering::Less).min(records.len() - 1);
        records[idx].child_page_id
    }

    pub fn insert_record(&self, record: BranchRecord) -> DbResult<()> {
        let mut records = self.records.write();
        let result = search(&records, &record.key, record.pk_suffix.as_ref());
        let idx = if result.found { result.index + 1 } else { result.index };
        records.insert(idx, record);
        drop(records);
        self.meta.dirty.store(true, Ordering::Relaxed);
        Ok(())
    }

    pub fn delete_record(&self, key: &Value, pk_suffix: Option<&Value>) -> bool {
        let mut records = self.records.write();
        let result = search(&records, key, pk_suffix);
        if !result.found {
            return false;
        }
        records.remove(result.index);
        true
    }

    pub fn get_record_by_pos(&self, pos: usize) -> Option<BranchRecord> {
        self.records.read().get(pos).cloned()
    }

    pub fn record_exist(&self, key: &Value, pk_suffix: Option<&Value>) -> bool {
        search(&self.records.read(), key, pk_suffix).found
    }

    pub fn total_records_snapshot(&self) -> Vec<BranchRecord> {
        self.records.read().clone()
    }

    pub fn replace_records(&self, records: Vec<BranchRecord>) {
        *self.records.write() = records;
        self.meta.dirty.store(true, Ordering::Relaxed);
    }

    pub fn total_data_length(&self) -> usize {
        self.records.read().iter().map(BranchRecord::approx_len).sum()
    }
    pub fn max_data_length(&self) -> usize {
        self.max_data_length
    }

    pub fn latch_write(&self) {
        self.meta.latch.lock();
    }
    pub fn unlatch_write(&self) {
        self.meta.latch.unlock();
    }
    pub fn latch_read(&self) {
        self.meta.latch.lock_shared();
    }
    pub fn unlatch_read(&self) {
        self.meta.latch.unlock_shared();
    }

    /// After a child split: shrink the separator covering the original
    /// (now left) child and insert a fresh separator for its new right
    /// sibling immediately after it (spec.md §4.5 `page_divide` cascading
    /// into the parent branch).
    pub fn update_separator_and_insert_sibling(
        &self,
        old_child: PageId,
        left_key: Value,
        left_suffix: Option<Value>,
        right_key: Value,
        right_suffix: Option<Value>,
        right_child: PageId,
    ) -> DbResult<()> {
        let mut records = self.records.write();
        match records.iter().position(|r| r.child_page_id == old_child) {
            Some(pos) => {
                records[pos].key = left_key;
                records[pos].pk_suffix = left_suffix;
                records.insert(pos + 1, BranchRecord::new(right_key, right_suffix, right_child));
            }
            None => records.push(BranchRecord::new(right_key, right_suffix, right_child)),
        }
        drop(records);
        self.meta.dirty.store(true, Ordering::Relaxed);
        Ok(())
    }
}
