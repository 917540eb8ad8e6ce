//! Spin latch primitives for short, non-I/O critical sections.
//!
//! Grounded on `original_source/src/utils/SpinMutex.h`: an exclusive
//! [`SpinLatch`], a shared/exclusive [`SharedSpinLatch`] (used for
//! `HeadPage::root_mutex` and every cached page per spec.md §5), and a
//! [`ReentrantSpinLatch`] for call sites that re-enter the same latch on the
//! same thread. Every latch spins a bounded number of iterations before
//! yielding to the OS scheduler, and records the owning thread for debug
//! assertions against double-unlock / unlock-by-non-owner misuse — the
//! design note calls for "a standard read/write lock" for everything except
//! these contended, short, non-I/O sections, which is exactly their scope
//! here (root pointer swaps, per-shard buffer-pool maps, per-page latching).

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicU64, Ordering};
use std::thread::{self, ThreadId};

/// Busy-spin iterations attempted before yielding to the OS scheduler.
const SPIN_BOUND: u32 = 64;

fn thread_hash() -> u64 {
    // `ThreadId` has no stable numeric representation; hash its `Debug`
    // output, which is unique per thread for the process lifetime and
    // stable across calls on the same thread.
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let id: ThreadId = thread::current().id();
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    hasher.finish()
}

fn spin_then_yield(attempt: u32) {
    if attempt < SPIN_BOUND {
        std::hint::spin_loop();
    } else {
        thread::yield_now();
    }
}

/// Exclusive-only spin latch.
pub struct SpinLatch {
    flag: AtomicBool,
    owner: AtomicU64,
}

impl SpinLatch {
    pub const fn new() -> Self {
        SpinLatch {
            flag: AtomicBool::new(false),
            owner: AtomicU64::new(0),
        }
    }

    pub fn lock(&self) {
        let mut attempt = 0u32;
        while self
            .flag
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            spin_then_yield(attempt);
            attempt = attempt.saturating_add(1);
        }
        self.owner.store(thread_hash(), Ordering::Relaxed);
    }

    pub fn try_lock(&self) -> bool {
        let ok = self
            .flag
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok();
        if ok {
            self.owner.store(thread_hash(), Ordering::Relaxed);
        }
        ok
    }

    pub fn unlock(&self) {
        debug_assert_eq!(
            self.owner.load(Ordering::Relaxed),
            thread_hash(),
            "SpinLatch unlocked by a thread that does not hold it"
        );
        self.owner.store(0, Ordering::Relaxed);
        self.flag.store(false, Ordering::Release);
    }

    pub fn is_locked(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

impl Default for SpinLatch {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared (many-reader, one-writer) spin latch. Backs `HeadPage::root_mutex`
/// and the per-page read/write latch described in spec.md §4.4/§5.
pub struct SharedSpinLatch {
    read_count: AtomicU32,
    write_flag: AtomicBool,
    owner: AtomicU64,
}

impl SharedSpinLatch {
    pub const fn new() -> Self {
        SharedSpinLatch {
            read_count: AtomicU32::new(0),
            write_flag: AtomicBool::new(false),
            owner: AtomicU64::new(0),
        }
    }

    pub fn lock(&self) {
        let mut attempt = 0u32;
        while self
            .write_flag
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            spin_then_yield(attempt);
            attempt = attempt.saturating_add(1);
        }
        attempt = 0;
        while self.read_count.load(Ordering::Acquire) > 0 {
            spin_then_yield(attempt);
            attempt = attempt.saturating_add(1);
        }
        self.owner.store(thread_hash(), Ordering::Relaxed);
    }

    pub fn try_lock(&self) -> bool {
        if self.read_count.load(Ordering::Relaxed) != 0 {
            return false;
        }
        if self
            .write_flag
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return false;
        }
        if self.read_count.load(Ordering::Acquire) > 0 {
            self.write_flag.store(false, Ordering::Release);
            return false;
        }
        self.owner.store(thread_hash(), Ordering::Relaxed);
        true
    }

    pub fn unlock(&self) {
        debug_assert_eq!(
            self.owner.load(Ordering::Relaxed),
            thread_hash(),
            "SharedSpinLatch write-unlocked by a thread that does not hold it"
        );
        self.owner.store(0, Ordering::Relaxed);
        self.write_flag.store(false, Ordering::Release);
    }

    pub fn lock_shared(&self) {
        let mut attempt = 0u32;
        loop {
            self.read_count.fetch_add(1, Ordering::Acquire);
            if !self.write_flag.load(Ordering::Relaxed) {
                return;
            }
            self.read_count.fetch_sub(1, Ordering::Relaxed);
            spin_then_yield(attempt);
            attempt = attempt.saturating_add(1);
        }
    }

    pub fn try_lock_shared(&self) -> bool {
        if self.write_flag.load(Ordering::Relaxed) {
            return false;
        }
        self.read_count.fetch_add(1, Ordering::Acquire);
        if self.write_flag.load(Ordering::Relaxed) {
            self.read_count.fetch_sub(1, Ordering::Relaxed);
            return false;
        }
        true
    }

    pub fn unlock_shared(&self) {
        self.read_count.fetch_sub(1, Ordering::Release);
    }

    pub fn is_write_locked(&self) -> bool {
        self.write_flag.load(Ordering::Relaxed)
    }

    pub fn read_locked_count(&self) -> u32 {
        self.read_count.load(Ordering::Relaxed)
    }

    pub fn is_locked(&self) -> bool {
        self.is_write_locked() || self.read_locked_count() > 0
    }
}

impl Default for SharedSpinLatch {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive spin latch that the owning thread may re-enter.
pub struct ReentrantSpinLatch {
    flag: AtomicBool,
    owner: AtomicU64,
    depth: AtomicI32,
}

impl ReentrantSpinLatch {
    pub const fn new() -> Self {
        ReentrantSpinLatch {
            flag: AtomicBool::new(false),
            owner: AtomicU64::new(0),
            depth: AtomicI32::new(0),
        }
    }

    pub fn lock(&self) {
        let me = thread_hash();
        if self.owner.load(Ordering::Relaxed) == me && self.depth.load(Ordering::Relaxed) > 0 {
            self.depth.fetch_add(1, Ordering::Relaxed);
            return;
        }
        let mut attempt = 0u32;
        while self
            .flag
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            spin_then_yield(attempt);
            attempt = attempt.saturating_add(1);
        }
        self.owner.store(me, Ordering::Relaxed);
        self.depth.store(1, Ordering::Relaxed);
    }

    pub fn unlock(&self) {
        debug_assert_eq!(
            self.owner.load(Ordering::Relaxed),
            thread_hash(),
            "ReentrantSpinLatch unlocked by a thread that does not hold it"
        );
        let remaining = self.depth.fetch_sub(1, Ordering::Relaxed) - 1;
        if remaining == 0 {
            self.owner.store(0, Ordering::Relaxed);
            self.flag.store(false, Ordering::Release);
        }
    }

    pub fn is_locked(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

impl Default for ReentrantSpinLatch {
    fn default() -> Self {
        Self::new()
    }
}
