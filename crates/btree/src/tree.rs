//! Root-to-leaf descent, latch coupling, and the public index surface
//! (spec.md §4.9).
//!
//! Page loading here is eager rather than pool-backed demand paging: on
//! `open_index` every page is read and reconstructed into the in-memory
//! `LeafPage`/`BranchPage` maps up front, and `close` writes every page
//! back in one pass. A production version would instead route every page
//! fault through `buffer::Engine`'s pool and `StoragePool`, letting cold
//! pages stay on disk; this crate still wires a tree's leaves through
//! `PageDividePool` on mutation (see `insert`) and its buffer pool entries
//! through `mark_file_closed` on `close`, so the background machinery is
//! genuinely exercised, just not yet the sole path pages travel.

use crate::garbage::GarbageOwner;
use crate::head_page::{HeadPage, HeadPageLayout, IndexType};
use crate::overflow_page::OverflowPage;
use crate::page::{BranchPage, LeafPage};
use crate::record::{BranchRecord, LeafRecord, LeafVersion, RawRecord};
use bincode::config::{self, Config};
use buffer::{CachedPage, DivisiblePage, Engine};
use common::{DbError, DbResult, EngineConfig, FileId, PageId, Stamp, PAGE_NULL_POINTER};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use storage::PageFile;
use types::{DataType, Value};

/// Bytes reserved for the common page prefix (spec.md §3) ahead of the
/// bincode-encoded record vector; used only to size `max_data_length`.
const PAGE_PREFIX_LEN: usize = 32;

fn bincode_config() -> impl Config {
    config::legacy()
}

#[derive(Serialize, Deserialize)]
enum PersistedNode {
    Leaf { parent: PageId, prev: PageId, next: PageId, records: Vec<LeafRecord> },
    Branch { parent: PageId, records: Vec<BranchRecord> },
}

fn encode_page<T: Serialize>(value: &T, page_size: usize) -> DbResult<Vec<u8>> {
    let bytes = bincode::serde::encode_to_vec(value, bincode_config()).map_err(|_| DbError::Corrupt)?;
    if bytes.len() + 4 > page_size {
        return Err(DbError::KeyTooLong);
    }
    let mut buf = vec![0u8; page_size];
    buf[0..4].copy_from_slice(&(bytes.len() as u32).to_le_bytes());
    buf[4..4 + bytes.len()].copy_from_slice(&bytes);
    Ok(buf)
}

/// Whether `value`'s runtime type matches the index's declared key type.
/// `Value::data_type()` recovers `VarChar`/`Blob` declared lengths from the
/// current payload rather than a stored schema width, so those compare by
/// variant only; `FixedChar` carries its declared width on the value
/// itself and so compares exactly.
fn key_type_matches(value: &Value, declared: &DataType) -> bool {
    match (value.data_type(), declared) {
        (DataType::FixedChar(a), DataType::FixedChar(b)) => a == *b,
        (DataType::VarChar(_), DataType::VarChar(_)) => true,
        (DataType::Blob(_), DataType::Blob(_)) => true,
        (actual, declared) => &actual == declared,
    }
}

fn decode_page<T: for<'de> Deserialize<'de>>(buf: &[u8]) -> DbResult<T> {
    let len = u32::from_le_bytes(buf[0..4].try_into().map_err(|_| DbError::Corrupt)?) as usize;
    if 4 + len > buf.len() {
        return Err(DbError::Corrupt);
    }
    let (value, _): (T, usize) =
        bincode::serde::decode_from_slice(&buf[4..4 + len], bincode_config()).map_err(|_| DbError::Corrupt)?;
    Ok(value)
}

/// A persistent B+-tree index (spec.md §4.9).
pub struct IndexTree {
    file_id: FileId,
    head: Arc<HeadPage>,
    engine: Arc<Engine>,
    leaves: RwLock<HashMap<PageId, Arc<LeafPage>>>,
    branches: RwLock<HashMap<PageId, Arc<BranchPage>>>,
    garbage: Mutex<GarbageOwner>,
    file: Mutex<PageFile>,
    #[allow(dead_code)]
    path: PathBuf,
    config: EngineConfig,
    key_type: DataType,
    non_unique: bool,
    max_data_length: usize,
    closed: AtomicBool,
    /// Lets a `LeafPage` call back into its owning tree from
    /// `DivisiblePage::page_divide`, the hook `PageDividePool` drives when a
    /// leaf is found over `max_data_length` outside `insert`'s own
    /// synchronous split check.
    self_weak: Weak<IndexTree>,
}

impl IndexTree {
    /// Creates a new index file. Fails if the file already exists (spec.md
    /// §4.9) or if inserted keys don't match `key_type`
    /// (`TB_INDEX_UNSUPPORT_DATA_TYPE`, surfaced lazily from `insert`).
    pub fn create_index(
        path: impl AsRef<Path>,
        index_type: IndexType,
        key_type: DataType,
        non_unique: bool,
        config: EngineConfig,
        engine: Arc<Engine>,
    ) -> DbResult<Arc<IndexTree>> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            return Err(DbError::FileOpenFailed);
        }

        let file_id = engine.file_ids.allocate();
        let head = Arc::new(HeadPage::new(index_type, 0, 0));
        let root_id = head.allocate_fresh_pages(1);
        head.set_root_page_id(root_id);
        head.set_begin_leaf_page_id(root_id);

        let max_data_length = config.max_data_length(PAGE_PREFIX_LEN);
        let root_leaf = Arc::new(LeafPage::new(file_id, root_id, PAGE_NULL_POINTER, max_data_length, non_unique));
        let mut leaves = HashMap::new();
        leaves.insert(root_id, root_leaf);

        let file = PageFile::open(&path, config.page_size)?;

        let tree = Arc::new_cyclic(|weak| {
            for leaf in leaves.values() {
                leaf.set_owner(weak.clone());
            }
            IndexTree {
                file_id,
                head,
                engine,
                leaves: RwLock::new(leaves),
                branches: RwLock::new(HashMap::new()),
                garbage: Mutex::new(GarbageOwner::new()),
                file: Mutex::new(file),
                path,
                config,
                key_type,
                non_unique,
                max_data_length,
                closed: AtomicBool::new(false),
                self_weak: weak.clone(),
            }
        });
        tree.flush_all()?;
        Ok(tree)
    }

    /// Opens an existing index file, validating the head page's version
    /// (spec.md §6, §7 `TB_ERROR_INDEX_VERSION`).
    pub fn open_index(
        path: impl AsRef<Path>,
        key_type: DataType,
        non_unique: bool,
        config: EngineConfig,
        engine: Arc<Engine>,
    ) -> DbResult<Arc<IndexTree>> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(DbError::FileOpenFailed);
        }
        let mut file = PageFile::open(&path, config.page_size)?;

        let mut head_buf = vec![0u8; config.page_size];
        file.read_page(PageId(0), &mut head_buf)?;
        let head_layout: HeadPageLayout = decode_page(&head_buf)?;
        let total_pages = head_layout.total_page_count;
        let head = Arc::new(HeadPage::from_layout(head_layout)?);

        let file_id = engine.file_ids.allocate();
        let max_data_length = config.max_data_length(PAGE_PREFIX_LEN);
        let mut leaves = HashMap::new();
        let mut branches = HashMap::new();
        let overflow_page_ids = head.overflow_page_ids();

        for raw in 1..total_pages {
            let pid = PageId(raw);
            if overflow_page_ids.contains(&pid) {
                continue;
            }
            let mut buf = vec![0u8; config.page_size];
            file.read_page(pid, &mut buf)?;
            if buf.iter().all(|&b| b == 0) {
                continue;
            }
            match decode_page::<PersistedNode>(&buf)? {
                PersistedNode::Leaf { parent, prev, next, records } => {
                    let leaf = LeafPage::new(file_id, pid, parent, max_data_length, non_unique);
                    leaf.set_prev_page_id(prev);
                    leaf.set_next_page_id(next);
                    leaf.replace_records(records);
                    leaves.insert(pid, Arc::new(leaf));
                }
                PersistedNode::Branch { parent, records } => {
                    let branch = BranchPage::new(file_id, pid, parent, max_data_length);
                    branch.replace_records(records);
                    branches.insert(pid, Arc::new(branch));
                }
            }
        }

        Ok(Arc::new_cyclic(|weak| {
            for leaf in leaves.values() {
                leaf.set_owner(weak.clone());
            }
            IndexTree {
                file_id,
                head,
                engine,
                leaves: RwLock::new(leaves),
                branches: RwLock::new(branches),
                garbage: Mutex::new(GarbageOwner::new()),
                file: Mutex::new(file),
                path,
                config,
                key_type,
                non_unique,
                max_data_length,
                closed: AtomicBool::new(false),
                self_weak: weak.clone(),
            }
        }))
    }

    pub fn record_count(&self) -> u64 {
        self.head.total_record_count()
    }

    pub fn current_stamp(&self) -> Stamp {
        self.head.snapshot().current_record_stamp
    }

    pub(crate) fn root_page_id(&self) -> PageId {
        self.head.root_page_id()
    }

    // ---- descent ----

    pub(crate) fn get_leaf(&self, id: PageId) -> Option<Arc<LeafPage>> {
        self.leaves.read().get(&id).cloned()
    }

    fn get_branch(&self, id: PageId) -> Option<Arc<BranchPage>> {
        self.branches.read().get(&id).cloned()
    }

    fn set_child_parent(&self, child_id: PageId, new_parent: PageId) {
        if let Some(leaf) = self.get_leaf(child_id) {
            leaf.set_parent_page_id(new_parent);
            return;
        }
        if let Some(branch) = self.get_branch(child_id) {
            branch.set_parent_page_id(new_parent);
        }
    }

    /// Root-to-leaf descent with latch coupling (spec.md §4.9): a child's
    /// latch is taken before its parent's is released. Returns the leaf
    /// latched for write (`for_write`) or read.
    fn descend(&self, key: &Value, pk_suffix: Option<&Value>, for_write: bool) -> Arc<LeafPage> {
        let root_id = self.head.root_page_id();
        if let Some(leaf) = self.get_leaf(root_id) {
            if for_write {
                leaf.latch_write();
            } else {
                leaf.latch_read();
            }
            return leaf;
        }
        let mut branch = self.get_branch(root_id).expect("root page must be resident");
        branch.latch_read();
        loop {
            let child_id = branch.child_for_key(key, pk_suffix);
            if let Some(leaf) = self.get_leaf(child_id) {
                if for_write {
                    leaf.latch_write();
                } else {
                    leaf.latch_read();
                }
                branch.unlatch_read();
                return leaf;
            }
            let child_branch = self.get_branch(child_id).expect("branch child must be resident");
            child_branch.latch_read();
            branch.unlatch_read();
            branch = child_branch;
        }
    }

    fn allocate_page_id(&self, n: u32) -> PageId {
        let mut garbage = self.garbage.lock();
        let pid = garbage.apply(n);
        if !pid.is_null() {
            return pid;
        }
        drop(garbage);
        self.head.allocate_fresh_pages(n)
    }

    // ---- overflow values ----

    /// Build the version to store for a freshly written or updated value
    /// (spec.md §4.3 step 3): values whose encoded length exceeds
    /// `config.max_inline_value` spill into an overflow page run instead of
    /// being inlined on the leaf.
    fn build_version(&self, stamp: Stamp, value: Value) -> DbResult<LeafVersion> {
        let bytes = bincode::serde::encode_to_vec(&value, bincode_config()).map_err(|_| DbError::Corrupt)?;
        if bytes.len() <= self.config.max_inline_value {
            return Ok(LeafVersion::live(stamp, value));
        }
        let (start, page_count, crc) = self.write_overflow(bytes)?;
        Ok(LeafVersion::overflowed(stamp, start, page_count, crc))
    }

    /// Allocate and write a fresh overflow run, recording its page range on
    /// the head page so `open_index` knows to skip it on reload.
    fn write_overflow(&self, bytes: Vec<u8>) -> DbResult<(PageId, u16, u32)> {
        let run = OverflowPage::build(bytes, self.config.page_size);
        let start = self.allocate_page_id(run.page_count as u32);
        {
            let mut file = self.file.lock();
            run.write_to(&mut file, start, self.config.page_size)?;
        }
        self.head.record_overflow_run(start, run.page_count);
        Ok((start, run.page_count, run.crc32))
    }

    fn read_overflow(&self, start: PageId, page_count: u16) -> DbResult<Value> {
        let run = {
            let mut file = self.file.lock();
            OverflowPage::read_from(&mut file, start, page_count, self.config.page_size)?
        };
        run.verify()?;
        let (value, _): (Value, usize) = bincode::serde::decode_from_slice(&run.value, bincode_config()).map_err(|_| DbError::Corrupt)?;
        Ok(value)
    }

    /// Resolve a version's actual value, reading through to its overflow
    /// run when the value wasn't inlined. Swallows a corrupt/unreadable
    /// overflow run rather than propagating, since `search`/`scan` are
    /// infallible; the failure is still logged (spec.md §9.2 "CRC mismatch
    /// on read").
    fn resolve_version(&self, version: &LeafVersion) -> Option<Value> {
        match (&version.value, version.overflow) {
            (Some(value), None) => Some(value.clone()),
            (_, Some((start, page_count, _crc))) => match self.read_overflow(start, page_count) {
                Ok(value) => Some(value),
                Err(err) => {
                    log::warn!("overflow read failed for run at page {:?} ({} pages): {:?}", start, page_count, err);
                    None
                }
            },
            (None, None) => None,
        }
    }

    // ---- public operations ----

    /// `insert_record` (spec.md §4.5): fails with `RepeatedRecord` on an
    /// exact duplicate under a unique/primary index.
    pub fn insert(&self, key: Value, pk_suffix: Option<Value>, value: Value) -> DbResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DbError::FileOpenFailed);
        }
        if !key_type_matches(&key, &self.key_type) {
            return Err(DbError::UnsupportedDataType);
        }

        let stamp = self.head.next_stamp();
        let version = self.build_version(stamp, value)?;
        let leaf = self.descend(&key, pk_suffix.as_ref(), true);
        let record = LeafRecord { key, pk_suffix, versions: vec![version] };
        let result = leaf.insert_record(record);
        if result.is_err() {
            leaf.unlatch_write();
            return result;
        }
        self.head.bump_record_count(1);
        self.engine.divide_pool.enqueue(leaf.clone());

        if (leaf.total_data_length() as f64) > (self.max_data_length as f64 * self.config.load_factor) {
            let split_result = self.split_leaf_and_propagate(&leaf);
            leaf.unlatch_write();
            return split_result;
        }
        leaf.unlatch_write();
        Ok(())
    }

    /// `get_records` across the full non-unique run, continuing onto
    /// `next_page_id` when the run spans a page boundary (spec.md §4.5).
    pub fn search(&self, key: &Value) -> Vec<Value> {
        self.search_at(key, self.current_stamp())
    }

    pub fn search_at(&self, key: &Value, rs: Stamp) -> Vec<Value> {
        let mut out = Vec::new();
        let mut leaf = self.descend(key, None, false);
        loop {
            let recs = leaf.get_records(key);
            for r in &recs {
                if let Some(version) = r.visible_version_at(rs) {
                    if let Some(value) = self.resolve_version(version) {
                        out.push(value);
                    }
                }
            }
            let continue_to_next = !recs.is_empty() && leaf.max_key().as_ref() == Some(key);
            let next_id = leaf.next_page_id();
            leaf.unlatch_read();
            if !continue_to_next || next_id.is_null() {
                break;
            }
            leaf = self.get_leaf(next_id).expect("linked leaf must be resident");
            leaf.latch_read();
        }
        out
    }

    /// Ordered `(key, value)` pairs visible at `rs` within `[lo, hi]`
    /// (`None` bounds are open), following leaf sibling links as needed
    /// (spec.md §4.5 `fetch_records`).
    pub fn scan(&self, lo: Option<&Value>, hi: Option<&Value>, rs: Stamp) -> Vec<(Value, Value)> {
        let mut out = Vec::new();
        let mut leaf = match lo {
            Some(k) => self.descend(k, None, false),
            None => {
                let l = self.get_leaf(self.head.begin_leaf_page_id()).expect("begin leaf must be resident");
                l.latch_read();
                l
            }
        };
        loop {
            let (recs, reached_tail) = leaf.fetch_records(lo, hi, true, true);
            for r in &recs {
                if let Some(version) = r.visible_version_at(rs) {
                    if let Some(value) = self.resolve_version(version) {
                        out.push((r.key.clone(), value));
                    }
                }
            }
            let next_id = leaf.next_page_id();
            leaf.unlatch_read();
            if reached_tail || next_id.is_null() {
                break;
            }
            let next_leaf = self.get_leaf(next_id).expect("linked leaf must be resident");
            next_leaf.latch_read();
            leaf = next_leaf;
        }
        out
    }

    pub fn delete(&self, key: &Value, pk_suffix: Option<&Value>) -> bool {
        let stamp = self.head.next_stamp();
        let leaf = self.descend(key, pk_suffix, true);
        let deleted = leaf.delete_record(key, pk_suffix, stamp, &self.head.active_stamps);
        if deleted {
            self.head.bump_record_count(-1);
        }
        leaf.unlatch_write();
        deleted
    }

    /// MVCC `update_record` (spec.md §4.3): prepends a new version and GCs
    /// old ones per the engine's active-stamp set.
    pub fn update(&self, key: &Value, pk_suffix: Option<&Value>, new_value: Value) -> bool {
        let stamp = self.head.next_stamp();
        let version = match self.build_version(stamp, new_value) {
            Ok(version) => version,
            Err(err) => {
                log::warn!("update: failed to build version for key (overflow write failed): {:?}", err);
                return false;
            }
        };
        let leaf = self.descend(key, pk_suffix, true);
        let updated = leaf.update_record_with_version(key, pk_suffix, version, &self.head.active_stamps);
        leaf.unlatch_write();
        updated
    }

    pub fn active_stamps(&self) -> &common::ActiveStampSet {
        &self.head.active_stamps
    }

    // ---- splitting ----

    fn split_leaf(&self, leaf: &Arc<LeafPage>) -> DbResult<(Value, Option<Value>, PageId)> {
        let snapshot = leaf.total_records_snapshot();
        let mid = snapshot.len() / 2;
        let (left_part, right_part) = snapshot.split_at(mid);

        let right_id = self.allocate_page_id(1);
        let right_leaf =
            Arc::new(LeafPage::new(self.file_id, right_id, leaf.parent_page_id(), self.max_data_length, self.non_unique));
        right_leaf.set_owner(self.self_weak.clone());
        right_leaf.replace_records(right_part.to_vec());
        right_leaf.set_next_page_id(leaf.next_page_id());
        right_leaf.set_prev_page_id(leaf.page_id());

        if let Some(old_next) = self.get_leaf(leaf.next_page_id()) {
            old_next.set_prev_page_id(right_id);
        }

        leaf.replace_records(left_part.to_vec());
        leaf.set_next_page_id(right_id);

        self.leaves.write().insert(right_id, right_leaf.clone());

        let right_key = right_part.last().expect("split keeps at least one record on each side").key.clone();
        let right_suffix = right_part.last().unwrap().pk_suffix.clone();
        Ok((right_key, right_suffix, right_id))
    }

    fn split_branch(&self, branch: &Arc<BranchPage>) -> DbResult<(Value, Option<Value>, PageId)> {
        let snapshot = branch.total_records_snapshot();
        let mid = snapshot.len() / 2;
        let (left_part, right_part) = snapshot.split_at(mid);

        let right_id = self.allocate_page_id(1);
        let right_branch = Arc::new(BranchPage::new(self.file_id, right_id, branch.parent_page_id(), self.max_data_length));
        right_branch.replace_records(right_part.to_vec());
        for rec in right_part {
            self.set_child_parent(rec.child_page_id, right_id);
        }

        branch.replace_records(left_part.to_vec());
        self.branches.write().insert(right_id, right_branch);

        let right_key = right_part.last().expect("split keeps at least one record on each side").key.clone();
        let right_suffix = right_part.last().unwrap().pk_suffix.clone();
        Ok((right_key, right_suffix, right_id))
    }

    fn split_leaf_and_propagate(&self, leaf: &Arc<LeafPage>) -> DbResult<()> {
        let (right_key, right_suffix, right_id) = self.split_leaf(leaf)?;
        let left_snapshot = leaf.total_records_snapshot();
        let left_key = left_snapshot.last().expect("left side keeps at least one record").key.clone();
        let left_suffix = left_snapshot.last().unwrap().pk_suffix.clone();
        self.propagate_split(leaf.page_id(), left_key, left_suffix, right_key, right_suffix, right_id, leaf.parent_page_id())
    }

    /// The `DivisiblePage::page_divide` hook's real destination
    /// (spec.md §4.11 step 4): `PageDividePool` calls this through
    /// `LeafPage::page_divide` for a leaf found over `max_data_length`
    /// outside `insert`'s own synchronous check. The caller already holds
    /// `leaf`'s write latch (`process_one`'s `try_write_latch`), so this
    /// does not latch again.
    pub(crate) fn divide_leaf_from_pool(&self, page_id: PageId) -> DbResult<()> {
        let Some(leaf) = self.get_leaf(page_id) else { return Ok(()) };
        if leaf.total_data_length() <= self.max_data_length {
            return Ok(());
        }
        self.split_leaf_and_propagate(&leaf)
    }

    /// Attach a freshly split child to its parent, cascading into parent
    /// splits (and, at the top, a fresh root) as needed (spec.md §4.5
    /// `page_divide`).
    fn propagate_split(
        &self,
        old_child_id: PageId,
        left_key: Value,
        left_suffix: Option<Value>,
        right_key: Value,
        right_suffix: Option<Value>,
        right_id: PageId,
        parent_id: PageId,
    ) -> DbResult<()> {
        if parent_id.is_null() {
            let new_root_id = self.allocate_page_id(1);
            let new_root = Arc::new(BranchPage::new(self.file_id, new_root_id, PAGE_NULL_POINTER, self.max_data_length));
            new_root.insert_record(BranchRecord::new(left_key, left_suffix, old_child_id))?;
            new_root.insert_record(BranchRecord::new(right_key, right_suffix, right_id))?;
            self.set_child_parent(old_child_id, new_root_id);
            self.set_child_parent(right_id, new_root_id);
            self.branches.write().insert(new_root_id, new_root);
            self.head.set_root_page_id(new_root_id);
            return Ok(());
        }

        let parent = self.get_branch(parent_id).expect("parent branch must be resident");
        parent.latch_write();
        let attach = parent.update_separator_and_insert_sibling(old_child_id, left_key, left_suffix, right_key, right_suffix, right_id);
        if attach.is_err() {
            parent.unlatch_write();
            return attach;
        }
        self.set_child_parent(right_id, parent_id);

        let needs_split = (parent.total_data_length() as f64) > (self.max_data_length as f64 * self.config.load_factor);
        let outcome = if needs_split {
            self.split_branch(&parent).and_then(|(r_key, r_suffix, r_id)| {
                let left_snapshot = parent.total_records_snapshot();
                let l_key = left_snapshot.last().expect("left branch keeps at least one record").key.clone();
                let l_suffix = left_snapshot.last().unwrap().pk_suffix.clone();
                self.propagate_split(parent.page_id(), l_key, l_suffix, r_key, r_suffix, r_id, parent.parent_page_id())
            })
        } else {
            Ok(())
        };
        parent.unlatch_write();
        outcome
    }

    // ---- lifecycle ----

    fn flush_all(&self) -> DbResult<()> {
        let mut file = self.file.lock();

        let head_layout = self.head.snapshot();
        let head_bytes = encode_page(&head_layout, self.config.page_size)?;
        file.write_page(PageId(0), &head_bytes)?;

        for (id, leaf) in self.leaves.read().iter() {
            let node = PersistedNode::Leaf {
                parent: leaf.parent_page_id(),
                prev: leaf.prev_page_id(),
                next: leaf.next_page_id(),
                records: leaf.total_records_snapshot(),
            };
            let bytes = encode_page(&node, self.config.page_size)?;
            file.write_page(*id, &bytes)?;
        }
        for (id, branch) in self.branches.read().iter() {
            let node = PersistedNode::Branch { parent: branch.parent_page_id(), records: branch.total_records_snapshot() };
            let bytes = encode_page(&node, self.config.page_size)?;
            file.write_page(*id, &bytes)?;
        }
        file.sync()?;
        Ok(())
    }

    /// Marks the tree closed, drains the divide queue's view of this file,
    /// and flushes every page (spec.md §4.9 `close`: "never fails: it
    /// drains and proceeds best-effort").
    pub fn close(&self) -> DbResult<()> {
        self.closed.store(true, Ordering::Release);
        self.engine.buffer_pool.mark_file_closed(self.file_id);
        let result = self.flush_all();
        self.engine.file_ids.release(self.file_id);
        result
    }
}

impl Drop for IndexTree {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::Acquire) {
            let _ = self.close();
        }
    }
}
