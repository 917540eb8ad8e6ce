//! Single timer thread scheduling periodic and one-shot tasks
//! (spec.md §4.13), used by `PageBufferPool`'s sweep and `PageDividePool`'s
//! age checks. Tasks run sequentially on the timer thread; anything
//! long-running should hand off to [`crate::storage_pool::StoragePool`]
//! rather than block it.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

enum Schedule {
    Periodic(Duration),
    Once,
}

struct Task {
    name: String,
    schedule: Schedule,
    next_run: Instant,
    action: Box<dyn FnMut() + Send>,
}

struct State {
    tasks: Vec<Task>,
    running: bool,
}

/// A single background thread that fires registered callbacks at their
/// scheduled times, in order.
pub struct Timer {
    state: Arc<(Mutex<State>, Condvar)>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Timer {
    pub fn new() -> Self {
        Timer {
            state: Arc::new((Mutex::new(State { tasks: Vec::new(), running: false }), Condvar::new())),
            worker: Mutex::new(None),
        }
    }

    /// Register a task that fires every `period` starting one period from
    /// now.
    pub fn schedule_periodic(&self, name: impl Into<String>, period: Duration, action: impl FnMut() + Send + 'static) {
        self.push_task(Task {
            name: name.into(),
            schedule: Schedule::Periodic(period),
            next_run: Instant::now() + period,
            action: Box::new(action),
        });
    }

    /// Register a task that fires once at `due_at`.
    pub fn schedule_once(&self, name: impl Into<String>, due_at: Instant, action: impl FnMut() + Send + 'static) {
        self.push_task(Task { name: name.into(), schedule: Schedule::Once, next_run: due_at, action: Box::new(action) });
    }

    fn push_task(&self, task: Task) {
        let (lock, cvar) = &*self.state;
        let mut state = lock.lock().unwrap();
        state.tasks.push(task);
        cvar.notify_all();
    }

    pub fn start(&self) {
        let mut guard = self.worker.lock().unwrap();
        if guard.is_some() {
            return;
        }
        {
            let (lock, _) = &*self.state;
            lock.lock().unwrap().running = true;
        }
        let state = self.state.clone();
        *guard = Some(std::thread::spawn(move || Self::run_loop(state)));
    }

    pub fn stop(&self) {
        {
            let (lock, cvar) = &*self.state;
            lock.lock().unwrap().running = false;
            cvar.notify_all();
        }
        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = handle.join();
        }
    }

    fn run_loop(state: Arc<(Mutex<State>, Condvar)>) {
        let (lock, cvar) = &*state;
        loop {
            let mut guard = lock.lock().unwrap();
            if !guard.running {
                return;
            }
            let now = Instant::now();
            let due_idx: Vec<usize> = guard
                .tasks
                .iter()
                .enumerate()
                .filter(|(_, t)| t.next_run <= now)
                .map(|(i, _)| i)
                .collect();

            if due_idx.is_empty() {
                let wait_for = guard
                    .tasks
                    .iter()
                    .map(|t| t.next_run.saturating_duration_since(now))
                    .min()
                    .unwrap_or(Duration::from_millis(100));
                let (g, _) = cvar.wait_timeout(guard, wait_for.min(Duration::from_millis(100))).unwrap();
                guard = g;
                drop(guard);
                continue;
            }

            // Run due tasks sequentially, reschedule periodic ones, drop one-shots.
            let mut tasks = std::mem::take(&mut guard.tasks);
            drop(guard);

            for idx in &due_idx {
                log::trace!("timer: running task {}", tasks[*idx].name);
                (tasks[*idx].action)();
            }

            let now = Instant::now();
            let mut remaining = Vec::with_capacity(tasks.len());
            for (i, mut t) in tasks.drain(..).enumerate() {
                if due_idx.contains(&i) {
                    match t.schedule {
                        Schedule::Periodic(period) => {
                            t.next_run = now + period;
                            remaining.push(t);
                        }
                        Schedule::Once => {}
                    }
                } else {
                    remaining.push(t);
                }
            }

            let mut guard = lock.lock().unwrap();
            guard.tasks.extend(remaining);
        }
    }
}

impl Default for Timer {
    fn default() -> Self {
        Timer::new()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn periodic_task_fires_multiple_times() {
        let timer = Timer::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        timer.schedule_periodic("tick", Duration::from_millis(5), move || {
            c.fetch_add(1, Ordering::Relaxed);
        });
        timer.start();
        std::thread::sleep(Duration::from_millis(60));
        timer.stop();
        assert!(count.load(Ordering::Relaxed) >= 2, "expected at least 2 ticks, got {}", count.load(Ordering::Relaxed));
    }

    #[test]
    fn once_task_fires_exactly_once() {
        let timer = Timer::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        timer.schedule_once("once", Instant::now(), move || {
            c.fetch_add(1, Ordering::Relaxed);
        });
        timer.start();
        std::thread::sleep(Duration::from_millis(50));
        timer.stop();
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }
}
