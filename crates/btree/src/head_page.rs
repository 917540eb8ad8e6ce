//! The single metadata page at page id 0 (spec.md §4.7, §6).

use common::{ActiveStampSet, DbError, DbResult, PageId, Stamp, PAGE_NULL_POINTER};
use serde::{Deserialize, Serialize};

/// File-version triple checked on open; a major/minor mismatch fails open
/// (spec.md §6, §7 `TB_ERROR_INDEX_VERSION`).
pub const FILE_VERSION: (u16, u8, u8) = (1, 0, 0);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexType {
    Primary = 0,
    Unique = 1,
    NonUnique = 2,
}

impl IndexType {
    pub fn is_unique(self) -> bool {
        matches!(self, IndexType::Primary | IndexType::Unique)
    }
}

/// Snapshot of `HeadPage` fields suitable for serialization; the active
/// `HeadPage` wraps this plus the live [`ActiveStampSet`], which is not
/// itself `Serialize` (it owns a lock).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HeadPageLayout {
    pub file_version: (u16, u8, u8),
    pub index_type: IndexType,
    pub total_page_count: u32,
    pub total_record_count: u64,
    pub root_page_id: PageId,
    pub begin_leaf_page_id: PageId,
    pub auto_pk_counter: u64,
    pub current_record_stamp: Stamp,
    pub key_var_field_count: u16,
    pub value_var_field_count: u16,
    pub active_stamps: Vec<Stamp>,
    /// `(start_page, page_count)` for every overflow run written so far
    /// (spec.md §4.3 step 3), so `open_index` knows which page ids to skip
    /// when reloading leaves and branches. Grows with every overflow write;
    /// a real deployment would track this out of band instead of inside the
    /// single-page head blob.
    pub overflow_runs: Vec<(PageId, u16)>,
}

/// Live, in-memory head page. `root_mutex` in the source maps to the
/// `parking_lot::RwLock` guarding `root_page_id` here; every other field is
/// bumped under the same lock for simplicity, matching spec.md's framing of
/// `HeadPage` as "shared... via a shared/exclusive latch".
pub struct HeadPage {
    inner: parking_lot::RwLock<HeadPageLayout>,
    pub active_stamps: ActiveStampSet,
}

impl HeadPage {
    pub fn new(index_type: IndexType, key_var_field_count: u16, value_var_field_count: u16) -> Self {
        HeadPage {
            inner: parking_lot::RwLock::new(HeadPageLayout {
                file_version: FILE_VERSION,
                index_type,
                total_page_count: 1, // the head page itself
                total_record_count: 0,
                root_page_id: PAGE_NULL_POINTER,
                begin_leaf_page_id: PAGE_NULL_POINTER,
                auto_pk_counter: 0,
                current_record_stamp: 0,
                key_var_field_count,
                value_var_field_count,
                active_stamps: Vec::new(),
                overflow_runs: Vec::new(),
            }),
            active_stamps: ActiveStampSet::new(Vec::new()),
        }
    }

    pub fn from_layout(layout: HeadPageLayout) -> DbResult<Self> {
        if (layout.file_version.0, layout.file_version.1) != (FILE_VERSION.0, FILE_VERSION.1) {
            return Err(DbError::IndexVersionMismatch);
        }
        let active = ActiveStampSet::new(layout.active_stamps.clone());
        Ok(HeadPage { inner: parking_lot::RwLock::new(layout), active_stamps: active })
    }

    pub fn snapshot(&self) -> HeadPageLayout {
        let mut layout = self.inner.read().clone();
        layout.active_stamps = self.active_stamps.snapshot();
        layout
    }

    pub fn root_page_id(&self) -> PageId {
        self.inner.read().root_page_id
    }

    /// Atomic root-pointer swap (spec.md §4.9 `update_root_page`).
    pub fn set_root_page_id(&self, new_root: PageId) {
        self.inner.write().root_page_id = new_root;
    }

    pub fn begin_leaf_page_id(&self) -> PageId {
        self.inner.read().begin_leaf_page_id
    }

    pub fn set_begin_leaf_page_id(&self, pid: PageId) {
        self.inner.write().begin_leaf_page_id = pid;
    }

    pub fn index_type(&self) -> IndexType {
        self.inner.read().index_type
    }

    pub fn total_page_count(&self) -> u32 {
        self.inner.read().total_page_count
    }

    /// Bump the total page count and return the newly minted page id
    /// (spec.md §4.8: "`apply_page_id(n)`... falls back to bumping
    /// `HeadPage.total_page_count`").
    pub fn allocate_fresh_pages(&self, n: u32) -> PageId {
        let mut layout = self.inner.write();
        let start = layout.total_page_count;
        layout.total_page_count += n;
        PageId(start)
    }

    pub fn next_stamp(&self) -> Stamp {
        let mut layout = self.inner.write();
        layout.current_record_stamp += 1;
        layout.current_record_stamp
    }

    pub fn next_auto_pk(&self) -> u64 {
        let mut layout = self.inner.write();
        let pk = layout.auto_pk_counter;
        layout.auto_pk_counter += 1;
        pk
    }

    pub fn bump_record_count(&self, delta: i64) {
        let mut layout = self.inner.write();
        layout.total_record_count = (layout.total_record_count as i64 + delta).max(0) as u64;
    }

    pub fn total_record_count(&self) -> u64 {
        self.inner.read().total_record_count
    }

    /// Records a freshly written overflow run so a later `open_index` can
    /// skip its pages instead of trying to decode them as a leaf or branch.
    pub fn record_overflow_run(&self, start: PageId, page_count: u16) {
        self.inner.write().overflow_runs.push((start, page_count));
    }

    /// Every page id occupied by an overflow run, expanded from the
    /// `(start, page_count)` pairs `record_overflow_run` accumulated.
    pub fn overflow_page_ids(&self) -> std::collections::HashSet<PageId> {
        let layout = self.inner.read();
        let mut ids = std::collections::HashSet::new();
        for (start, count) in &layout.overflow_runs {
            for i in 0..*count as u32 {
                ids.insert(PageId(start.0 + i));
            }
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_head_page_starts_with_null_root() {
        let head = HeadPage::new(IndexType::Primary, 0, 0);
        assert!(head.root_page_id().is_null());
        assert_eq!(head.total_page_count(), 1);
    }

    #[test]
    fn allocate_fresh_pages_bumps_total_count() {
        let head = HeadPage::new(IndexType::Primary, 0, 0);
        let first = head.allocate_fresh_pages(3);
        assert_eq!(first, PageId(1));
        assert_eq!(head.total_page_count(), 4);
        let second = head.allocate_fresh_pages(1);
        assert_eq!(second, PageId(4));
    }

    #[test]
    fn from_layout_rejects_mismatched_major_version() {
        let mut layout = HeadPage::new(IndexType::Primary, 0, 0).snapshot();
        layout.file_version.0 += 1;
        let err = HeadPage::from_layout(layout).unwrap_err();
        assert!(matches!(err, DbError::IndexVersionMismatch));
    }

    #[test]
    fn stamps_advance_monotonically() {
        let head = HeadPage::new(IndexType::Primary, 0, 0);
        assert_eq!(head.next_stamp(), 1);
        assert_eq!(head.next_stamp(), 2);
    }
}
