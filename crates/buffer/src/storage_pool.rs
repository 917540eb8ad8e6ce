//! Worker pool executing page reads and writes off the caller's thread
//! (spec.md §4.12).
//!
//! This crate has no knowledge of concrete page types (that would create a
//! cycle with `btree`), so tasks are boxed closures over raw page bytes;
//! `btree` supplies the actual file I/O and CRC check inside them.

use crossbeam::channel::{bounded, unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;

type ReadTask = Box<dyn FnOnce() + Send>;

enum Task {
    Read(ReadTask),
    Write(Box<dyn FnOnce() + Send>),
}

/// A pending read's result, delivered once the worker completes it.
pub struct ReadHandle<T> {
    rx: Receiver<T>,
}

impl<T> ReadHandle<T> {
    /// Block until the read completes.
    pub fn wait(self) -> T {
        self.rx.recv().expect("storage pool worker dropped without completing read")
    }
}

/// Fixed worker pool draining a shared task queue of page reads and writes.
pub struct StoragePool {
    sender: Sender<Task>,
    workers: Vec<JoinHandle<()>>,
    pending_writes: std::sync::Arc<AtomicUsize>,
}

impl StoragePool {
    pub fn new(worker_count: usize) -> Self {
        let (sender, receiver) = unbounded::<Task>();
        let pending_writes = std::sync::Arc::new(AtomicUsize::new(0));
        let mut workers = Vec::with_capacity(worker_count);
        for _ in 0..worker_count.max(1) {
            let receiver: Receiver<Task> = receiver.clone();
            let pending_writes = pending_writes.clone();
            workers.push(std::thread::spawn(move || {
                while let Ok(task) = receiver.recv() {
                    match task {
                        Task::Read(f) => f(),
                        Task::Write(f) => {
                            f();
                            pending_writes.fetch_sub(1, Ordering::AcqRel);
                        }
                    }
                }
            }));
        }
        StoragePool { sender, workers, pending_writes }
    }

    /// Submit a read, returning a handle the caller can `wait()` on for the
    /// result (spec.md §4.12: "reads resolve a promise the caller awaits").
    pub fn submit_read<T, F>(&self, f: F) -> ReadHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = bounded(1);
        let task = Task::Read(Box::new(move || {
            let result = f();
            let _ = tx.send(result);
        }));
        let _ = self.sender.send(task);
        ReadHandle { rx }
    }

    /// Submit a fire-and-forget write, accounted in `pending_writes` so
    /// `close`/`drain` can wait for outstanding writes to land.
    pub fn submit_write<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.pending_writes.fetch_add(1, Ordering::AcqRel);
        let _ = self.sender.send(Task::Write(Box::new(f)));
    }

    pub fn pending_writes(&self) -> usize {
        self.pending_writes.load(Ordering::Acquire)
    }

    /// Busy-poll until every submitted write has completed.
    pub fn drain(&self) {
        while self.pending_writes() > 0 {
            std::thread::yield_now();
        }
    }
}

impl Drop for StoragePool {
    fn drop(&mut self) {
        self.drain();
        drop(std::mem::replace(&mut self.sender, unbounded().0));
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
