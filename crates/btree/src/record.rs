//! Record codec and MVCC (spec.md §3 "Record (leaf)"/"Record (branch)",
//! §4.3). Mirrors the teacher's `BTreeNode` sum-type-over-serde approach
//! (`node.rs`) but for individual records rather than whole nodes, and adds
//! the multi-version chain the teacher's single-value leaf entries don't
//! need.

use common::{ActiveStampSet, PageId, Stamp};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use types::Value;

/// Order two values of what must be the same declared key type.
/// `Value` deliberately has no blanket `Ord` impl (cross-type comparison is
/// a schema violation, not an ordering question); within one index every
/// key and every pk_suffix shares a single declared type, so this always
/// succeeds here.
pub fn value_cmp(a: &Value, b: &Value) -> Ordering {
    a.cmp_same_type(b).expect("keys within one index share a declared data type")
}

/// Order two `(key, pk_suffix)` pairs the way sorted pages do: by key, then
/// by suffix with an absent suffix sorting before a present one (spec.md
/// §4.6 navigation tie-break).
pub fn sort_key_cmp(a: (&Value, Option<&Value>), b: (&Value, Option<&Value>)) -> Ordering {
    let key_order = value_cmp(a.0, b.0);
    if key_order != Ordering::Equal {
        return key_order;
    }
    match (a.1, b.1) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => value_cmp(x, y),
    }
}

/// One version of a record's value, newest-first in [`LeafRecord::versions`]
/// (spec.md §6: "Multi-version order is newest first").
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LeafVersion {
    pub stamp: Stamp,
    /// `None` encodes a logical delete (spec.md §4.3 step 2: "length of
    /// zero... is logically deleted").
    pub value: Option<Value>,
    /// Set when `value` is too large to inline and instead lives in an
    /// overflow page run; `(start_page, page_count, crc32)`.
    pub overflow: Option<(PageId, u16, u32)>,
}

impl LeafVersion {
    pub fn live(stamp: Stamp, value: Value) -> Self {
        LeafVersion { stamp, value: Some(value), overflow: None }
    }

    pub fn tombstone(stamp: Stamp) -> Self {
        LeafVersion { stamp, value: None, overflow: None }
    }

    /// A version whose value spilled to an overflow page run (spec.md §4.3
    /// step 3) rather than being inlined; `value` stays `None` in memory and
    /// is reconstructed from the run on read.
    pub fn overflowed(stamp: Stamp, start: PageId, page_count: u16, crc32: u32) -> Self {
        LeafVersion { stamp, value: None, overflow: Some((start, page_count, crc32)) }
    }

    pub fn is_deleted(&self) -> bool {
        self.value.is_none() && self.overflow.is_none()
    }
}

/// A shared trait over the two record kinds, covering the parts of ordering
/// and navigation that don't depend on whether the record carries a child
/// pointer or a value (spec.md §4.4: "Compare dispatch").
pub trait RawRecord {
    fn key(&self) -> &Value;
    /// For non-unique indexes, the suffix breaking ties between records that
    /// share `key()` (spec.md §3, §4.6).
    fn pk_suffix(&self) -> Option<&Value>;

    fn sort_key(&self) -> (&Value, Option<&Value>) {
        (self.key(), self.pk_suffix())
    }
}

/// A leaf-page entry: a key plus its chain of MVCC versions
/// (spec.md §3 "Record (leaf)", §4.3).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LeafRecord {
    pub key: Value,
    pub pk_suffix: Option<Value>,
    /// Newest-first version chain.
    pub versions: Vec<LeafVersion>,
}

impl RawRecord for LeafRecord {
    fn key(&self) -> &Value {
        &self.key
    }
    fn pk_suffix(&self) -> Option<&Value> {
        self.pk_suffix.as_ref()
    }
}

impl LeafRecord {
    pub fn new(key: Value, pk_suffix: Option<Value>, stamp: Stamp, value: Value) -> Self {
        LeafRecord { key, pk_suffix, versions: vec![LeafVersion::live(stamp, value)] }
    }

    /// Visibility rule for reads (spec.md §4.3): the newest version whose
    /// stamp is `<= rs`. Returns `None` if no such version exists or the
    /// visible version is a tombstone.
    pub fn visible_at(&self, rs: Stamp) -> Option<&Value> {
        self.versions.iter().find(|v| v.stamp <= rs).and_then(|v| v.value.as_ref())
    }

    /// The version visible at `rs`, or `None` if none exists or the visible
    /// version is a tombstone. Unlike [`visible_at`](Self::visible_at), this
    /// also returns versions whose value spilled to an overflow run —
    /// callers that need the actual value must resolve `overflow` through
    /// the owning `IndexTree`.
    pub fn visible_version_at(&self, rs: Stamp) -> Option<&LeafVersion> {
        self.versions.iter().find(|v| v.stamp <= rs).filter(|v| !v.is_deleted())
    }

    /// True if the version visible at `rs` exists at all (live or deleted),
    /// used to distinguish "never existed" from "deleted".
    pub fn has_version_at(&self, rs: Stamp) -> bool {
        self.versions.iter().any(|v| v.stamp <= rs)
    }

    /// Prepend an already-built version and run MVCC GC, dropping old
    /// versions no active reader (and not the current head) can still
    /// observe (spec.md §4.3 write rule).
    pub fn push_version(&mut self, version: LeafVersion, active: &ActiveStampSet) {
        let min_active = active.min();
        self.versions.retain(|v| match min_active {
            Some(floor) => v.stamp >= floor,
            None => false,
        });
        self.versions.insert(0, version);
    }

    /// `update_record` (spec.md §4.3 write rule) for a plain inline value;
    /// values needing to spill to an overflow run go through
    /// [`push_version`](Self::push_version) instead, built by `IndexTree`.
    pub fn update(&mut self, new_stamp: Stamp, new_value: Option<Value>, active: &ActiveStampSet) {
        let version = match new_value {
            Some(value) => LeafVersion::live(new_stamp, value),
            None => LeafVersion::tombstone(new_stamp),
        };
        self.push_version(version, active);
    }

    pub fn is_tombstoned_everywhere(&self, active: &ActiveStampSet) -> bool {
        let min_active = active.min().unwrap_or(u64::MAX);
        self.versions.iter().all(|v| v.stamp < min_active) && self.versions.first().map(|v| v.is_deleted()).unwrap_or(true)
    }

    /// Rough estimate of this record's serialized footprint, used for page
    /// size accounting ahead of an exact bincode pass.
    pub fn approx_len(&self) -> usize {
        let key_len = self.key.persisted_len();
        let versions_len: usize = self
            .versions
            .iter()
            .map(|v| 8 + v.value.as_ref().map(|val| val.persisted_len()).unwrap_or(0))
            .sum();
        key_len + versions_len + 16
    }
}

/// A branch-page entry: a key (plus, for non-unique indexes, a primary-key
/// suffix) and the id of the child subtree it routes to (spec.md §3
/// "Record (branch)").
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BranchRecord {
    pub key: Value,
    pub pk_suffix: Option<Value>,
    pub child_page_id: PageId,
}

impl RawRecord for BranchRecord {
    fn key(&self) -> &Value {
        &self.key
    }
    fn pk_suffix(&self) -> Option<&Value> {
        self.pk_suffix.as_ref()
    }
}

impl BranchRecord {
    pub fn new(key: Value, pk_suffix: Option<Value>, child_page_id: PageId) -> Self {
        BranchRecord { key, pk_suffix, child_page_id }
    }

    pub fn approx_len(&self) -> usize {
        self.key.persisted_len() + 4 + self.pk_suffix.as_ref().map(|v| v.persisted_len()).unwrap_or(0)
    }
}
