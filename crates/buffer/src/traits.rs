//! The seam between the generic caching/divide machinery in this crate and
//! the concrete page kinds defined in `btree` (spec.md §9 Design Notes:
//! "Polymorphic page/record families... dispatch through the tag, not
//! virtual calls" — here the tag is the concrete type behind the trait
//! object, dispatch is a vtable call instead of the source's virtual calls).

use common::{FileId, PageId};

/// Anything the buffer pool can hold a reference-counted, latchable handle
/// to: a page of any concrete kind (head, branch, leaf, overflow).
pub trait CachedPage: Send + Sync {
    fn file_id(&self) -> FileId;
    fn page_id(&self) -> PageId;

    /// Monotonic tick of last access, used by `sweep` to pick eviction
    /// candidates by smallest `last_access_ts` (spec.md §4.10).
    fn last_access_ts(&self) -> u64;

    /// Record an access, bumping `last_access_ts` and the refcount.
    fn touch(&self);

    /// Current pin count. A page with `refcount() > 0` is never evicted.
    fn refcount(&self) -> i64;

    /// Release one reference taken by a prior `touch`/pool lookup.
    fn unpin(&self);

    /// True while any thread holds this page's write latch.
    fn is_write_latched(&self) -> bool;

    /// Set when the owning index has been closed; such pages are evicted
    /// on the next sweep regardless of refcount or recency.
    fn mark_closed(&self);
    fn is_closed(&self) -> bool;
}

/// A [`CachedPage`] that additionally knows how to shrink itself back under
/// its size budget, the operation `PageDividePool` drives (spec.md §4.11).
pub trait DivisiblePage: CachedPage {
    /// Sum of serialized record bytes currently held (spec.md §4.4/§4.11).
    fn total_data_length(&self) -> usize;

    /// Size budget above which `page_divide` rather than `save_records` is
    /// required.
    fn max_data_length(&self) -> usize;

    /// Millisecond timestamp this page was queued for the divide pool.
    fn enqueued_at_ms(&self) -> u64;

    /// True if any record on this page is currently borrowed by a caller;
    /// such a page must be skipped and re-queued.
    fn has_referenced_records(&self) -> bool;

    /// Attempt to take this page's write latch without blocking.
    fn try_write_latch(&self) -> bool;
    fn unlatch_write(&self);

    /// Split this (over-large) page, cascading into parent branch splits as
    /// needed. Only called while the caller holds the write latch.
    fn page_divide(&self) -> common::DbResult<()>;

    /// Serialize all non-deleted, non-tombstoned records into a fresh page
    /// buffer and hand it to `StoragePool` for I/O. Returns `false` if the
    /// page is still too large and `page_divide` is required instead.
    fn save_records(&self) -> common::DbResult<bool>;
}
