//! Crate-level integration tests exercising the pool/divide/engine pieces
//! together through a minimal fake page, the way `btree`'s concrete pages
//! will drive them in practice.

use super::*;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

struct FakeLeaf {
    file_id: common::FileId,
    page_id: common::PageId,
    ts: AtomicU64,
    refcount: AtomicI64,
    write_latched: AtomicBool,
    closed: AtomicBool,
    total_len: AtomicUsize,
    max_len: usize,
    referenced: AtomicBool,
}

impl CachedPage for FakeLeaf {
    fn file_id(&self) -> common::FileId {
        self.file_id
    }
    fn page_id(&self) -> common::PageId {
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

impl DivisiblePage for FakeLeaf {
    fn total_data_length(&self) -> usize {
        self.total_len.load(Ordering::Relaxed)
    }
    fn max_data_length(&self) -> usize {
        self.max_len
    }
    fn enqueued_at_ms(&self) -> u64 {
        0
    }
    fn has_referenced_records(&self) -> bool {
        self.referenced.load(Ordering::Relaxed)
    }
    fn try_write_latch(&self) -> bool {
        !self.write_latched.swap(true, Ordering::AcqRel)
    }
    fn unlatch_write(&self) {
        self.write_latched.store(false, Ordering::Release);
    }
    fn page_divide(&self) -> common::DbResult<()> {
        self.total_len.store(self.max_len / 2, Ordering::Relaxed);
        Ok(())
    }
    fn save_records(&self) -> common::DbResult<bool> {
        Ok(true)
    }
}

fn fake_leaf(page_id: u32, total_len: usize) -> Arc<FakeLeaf> {
    Arc::new(FakeLeaf {
        file_id: common::FileId(1),
        page_id: common::PageId(page_id),
        ts: AtomicU64::new(0),
        refcount: AtomicI64::new(0),
        write_latched: AtomicBool::new(false),
        closed: AtomicBool::new(false),
        total_len: AtomicUsize::new(total_len),
        max_len: 100,
        referenced: AtomicBool::new(false),
    })
}

#[test]
fn pool_and_divide_pool_cooperate_on_an_oversized_page() {
    let buffer_pool = PageBufferPool::new(10, 0.8);
    let divide_pool = PageDividePool::new(0);

    let page = fake_leaf(1, 200);
    buffer_pool.insert(page.clone());
    divide_pool.enqueue(page.clone());
    divide_pool.process_one(page.clone());

    assert_eq!(page.total_data_length(), 50);
    assert!(buffer_pool.find(common::FileId(1), common::PageId(1)).is_some());
}

#[test]
fn closing_a_file_evicts_all_its_pages_on_next_sweep() {
    let pool = PageBufferPool::new(10, 0.8);
    pool.insert(fake_leaf(1, 10));
    pool.insert(fake_leaf(2, 10));
    pool.mark_file_closed(common::FileId(1));
    let evicted = pool.sweep();
    assert_eq!(evicted, 2);
    assert!(pool.is_empty());
}

#[test]
fn storage_pool_read_and_write_round_trip() {
    let pool = StoragePool::new(2);
    let handle = pool.submit_read(|| vec![1u8, 2, 3]);
    assert_eq!(handle.wait(), vec![1, 2, 3]);

    let landed = Arc::new(AtomicBool::new(false));
    let l = landed.clone();
    pool.submit_write(move || l.store(true, Ordering::Relaxed));
    pool.drain();
    assert!(landed.load(Ordering::Relaxed));
}

#[test]
fn engine_wires_sweep_through_the_timer() {
    let config = common::EngineConfig::builder()
        .max_cache_pages(1)
        .sweep_target_ratio(0.0)
        .sweep_interval_ms(5)
        .build();
    let engine = Engine::new(&config);
    let page = fake_leaf(7, 10);
    engine.buffer_pool.insert(page.clone());
    engine.start(&config);
    std::thread::sleep(std::time::Duration::from_millis(60));
    engine.stop();
    assert!(engine.buffer_pool.evicted_total() >= 1);
}
