//! Process-wide subsystem bundle, replacing the source's static-constructor
//! singletons (spec.md §9 Design Notes: "Model as an explicit `Engine`
//! struct owning these subsystems, passed to every `IndexTree`").

use crate::divide::PageDividePool;
use crate::pool::PageBufferPool;
use crate::storage_pool::StoragePool;
use crate::timer::Timer;
use common::{EngineConfig, FileIdAllocator};
use std::sync::Arc;
use std::time::Duration;

/// Owns the buffer pool, divide pool, storage pool, and timer thread for one
/// process. Constructed once, shared by every open index tree, and torn
/// down explicitly via `stop` (or implicitly on drop) which joins every
/// background worker.
pub struct Engine {
    pub buffer_pool: Arc<PageBufferPool>,
    pub divide_pool: Arc<PageDividePool>,
    pub storage_pool: Arc<StoragePool>,
    pub timer: Arc<Timer>,
    /// Shared across every `IndexTree` opened through this engine, so two
    /// trees never collide on the `FileId` used to key buffer-pool entries.
    pub file_ids: FileIdAllocator,
    started: std::sync::atomic::AtomicBool,
}

impl Engine {
    pub fn new(config: &EngineConfig) -> Arc<Self> {
        Arc::new(Engine {
            buffer_pool: Arc::new(PageBufferPool::new(config.max_cache_pages, config.sweep_target_ratio)),
            divide_pool: PageDividePool::new(config.divide_flush_interval_ms),
            storage_pool: Arc::new(StoragePool::new(config.storage_pool_workers)),
            timer: Arc::new(Timer::new()),
            file_ids: FileIdAllocator::new(),
            started: std::sync::atomic::AtomicBool::new(false),
        })
    }

    /// Start background workers: the divide pool's drain thread and the
    /// timer thread driving periodic buffer-pool sweeps.
    pub fn start(self: &Arc<Self>, config: &EngineConfig) {
        use std::sync::atomic::Ordering;
        if self.started.swap(true, Ordering::AcqRel) {
            return;
        }
        self.divide_pool.start();
        let buffer_pool = self.buffer_pool.clone();
        self.timer.schedule_periodic(
            "buffer_pool_sweep",
            Duration::from_millis(config.sweep_interval_ms),
            move || {
                buffer_pool.sweep();
            },
        );
        self.timer.start();
    }

    /// Stop and join every background worker. Outstanding writes in
    /// `storage_pool` are drained first so no page write is lost.
    pub fn stop(&self) {
        self.timer.stop();
        self.divide_pool.stop();
        self.storage_pool.drain();
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_starts_and_stops_cleanly() {
        let config = EngineConfig::default();
        let engine = Engine::new(&config);
        engine.start(&config);
        std::thread::sleep(Duration::from_millis(20));
        engine.stop();
    }
}
