//! Fixed-size worker pool over a bounded queue.
//!
//! ```text
//! schedule ──► [bounded queue, 2 × workers] ──► worker 0..n ──► errors
//! shutdown ──► one Exit per worker, then join
//! ```
//!
//! Tasks are dequeued in FIFO order; completion order across workers is
//! unspecified, so callers needing ordered output re-sort after `shutdown`.
//! A task's `Err` or panic is recorded as an error string; the pool keeps
//! running.

#[cfg(not(panic = "unwind"))]
compile_error!("the worker pool records task panics and needs `panic = \"unwind\"`");

use crate::log;
use parking_lot::Mutex;
use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
    thread::JoinHandle,
};

type Task = Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'static>;

enum Message {
    Run(Task),
    Exit,
}

pub struct WorkerPool {
    sender: async_channel::Sender<Message>,
    workers: Vec<JoinHandle<()>>,
    errors: Arc<Mutex<Vec<String>>>,
}

impl WorkerPool {
    /// Spawn `size` workers (at least one).
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let (sender, receiver) = async_channel::bounded::<Message>(size * 2);
        let errors = Arc::new(Mutex::new(Vec::new()));

        let workers = (0..size)
            .map(|worker_id| {
                let receiver = receiver.clone();
                let errors = Arc::clone(&errors);
                std::thread::spawn(move || {
                    while let Ok(message) = receiver.recv_blocking() {
                        let task = match message {
                            Message::Run(task) => task,
                            Message::Exit => break,
                        };
                        if let Some(err) = run_task(task) {
                            log!("pool"; "worker {worker_id}: {err}");
                            errors.lock().push(err);
                        }
                    }
                })
            })
            .collect();

        Self {
            sender,
            workers,
            errors,
        }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Enqueue a task; blocks while the queue is full.
    pub fn schedule<F>(&self, task: F)
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        if self.sender.send_blocking(Message::Run(Box::new(task))).is_err() {
            // Workers only stop after shutdown, which consumes the pool.
            self.errors.lock().push("worker pool closed".to_owned());
        }
    }

    /// Post one exit message per worker, join them, and return every
    /// recorded task error.
    pub fn shutdown(self) -> Vec<String> {
        for _ in 0..self.workers.len() {
            if self.sender.send_blocking(Message::Exit).is_err() {
                break;
            }
        }
        for worker in self.workers {
            if worker.join().is_err() {
                self.errors.lock().push("worker thread panicked".to_owned());
            }
        }
        std::mem::take(&mut *self.errors.lock())
    }
}

/// Run one task, converting failure and panics into an error string.
fn run_task(task: Task) -> Option<String> {
    match catch_unwind(AssertUnwindSafe(task)) {
        Ok(Ok(())) => None,
        Ok(Err(err)) => Some(format!("{err:#}")),
        Err(panic) => Some(
            panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "task panicked".to_owned()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_all_tasks_run() {
        let pool = WorkerPool::new(3);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..50 {
            let counter = Arc::clone(&counter);
            pool.schedule(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        let errors = pool.shutdown();
        assert!(errors.is_empty());
        assert_eq!(counter.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn test_task_errors_are_collected() {
        let pool = WorkerPool::new(2);
        pool.schedule(|| bail!("conversion failed"));
        pool.schedule(|| Ok(()));
        pool.schedule(|| bail!("second failure"));

        let mut errors = pool.shutdown();
        errors.sort();
        assert_eq!(errors, vec!["conversion failed", "second failure"]);
    }

    #[test]
    fn test_panic_does_not_kill_pool() {
        let pool = WorkerPool::new(1);
        let counter = Arc::new(AtomicUsize::new(0));
        pool.schedule(|| panic!("boom"));
        for _ in 0..5 {
            let counter = Arc::clone(&counter);
            pool.schedule(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        let errors = pool.shutdown();
        assert_eq!(errors, vec!["boom"]);
        assert_eq!(counter.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_single_worker_is_fifo() {
        let pool = WorkerPool::new(1);
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..10 {
            let order = Arc::clone(&order);
            pool.schedule(move || {
                order.lock().push(i);
                Ok(())
            });
        }
        pool.shutdown();
        assert_eq!(*order.lock(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_zero_size_gets_one_worker() {
        assert_eq!(WorkerPool::new(0).size(), 1);
    }
}
