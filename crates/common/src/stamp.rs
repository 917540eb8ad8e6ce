//! MVCC version stamps and the active-stamp set used for GC (spec.md §4.3,
//! §4.7, §8 property 5).

use parking_lot::RwLock;

/// A monotonically increasing version id associated with each write.
pub type Stamp = u64;

/// The set of stamps still needed by live readers, kept sorted ascending.
/// `HeadPage` persists this set; `LeafRecord::update_record` consults its
/// minimum to decide which prior versions can be garbage collected.
#[derive(Debug, Default)]
pub struct ActiveStampSet {
    stamps: RwLock<Vec<Stamp>>,
}

impl ActiveStampSet {
    pub fn new(mut stamps: Vec<Stamp>) -> Self {
        stamps.sort_unstable();
        stamps.dedup();
        ActiveStampSet {
            stamps: RwLock::new(stamps),
        }
    }

    pub fn snapshot(&self) -> Vec<Stamp> {
        self.stamps.read().clone()
    }

    /// Smallest stamp any live reader might still need, or `None` if the
    /// set is empty (nothing needs preserving beyond the current version).
    pub fn min(&self) -> Option<Stamp> {
        self.stamps.read().first().copied()
    }

    pub fn insert(&self, stamp: Stamp) {
        let mut guard = self.stamps.write();
        if let Err(pos) = guard.binary_search(&stamp) {
            guard.insert(pos, stamp);
        }
    }

    pub fn remove(&self, stamp: Stamp) {
        let mut guard = self.stamps.write();
        if let Ok(pos) = guard.binary_search(&stamp) {
            guard.remove(pos);
        }
    }

    pub fn contains(&self, stamp: Stamp) -> bool {
        self.stamps.read().binary_search(&stamp).is_ok()
    }
}
