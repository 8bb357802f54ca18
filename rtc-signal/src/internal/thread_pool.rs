use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;

use log::trace;

use crate::constants::THREAD_POOL_SIZE;

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size worker pool used to run transport teardown off the calling
/// thread, so a transport can be stopped from a callback running on its own
/// thread without self-joining.
pub(crate) struct ThreadPool {
    sender: Sender<Task>,
}

static INSTANCE: OnceLock<ThreadPool> = OnceLock::new();

impl ThreadPool {
    /// The process-global pool.
    pub(crate) fn instance() -> &'static ThreadPool {
        INSTANCE.get_or_init(|| ThreadPool::new(THREAD_POOL_SIZE))
    }

    pub(crate) fn new(size: usize) -> Self {
        let (sender, receiver) = channel::<Task>();
        let receiver = Arc::new(Mutex::new(receiver));

        for id in 0..size {
            let receiver = Arc::clone(&receiver);
            thread::Builder::new()
                .name(format!("rtc-signal-worker-{id}"))
                .spawn(move || Self::run_worker(id, receiver))
                .ok();
        }

        ThreadPool { sender }
    }

    fn run_worker(id: usize, receiver: Arc<Mutex<Receiver<Task>>>) {
        loop {
            // Hold the lock only while receiving, never while running
            let task = match receiver.lock() {
                Ok(receiver) => receiver.recv(),
                Err(_) => break,
            };
            match task {
                Ok(task) => {
                    trace!("worker {id} picked up a task");
                    task();
                }
                Err(_) => break,
            }
        }
    }

    /// Runs `task` exactly once on some worker thread.
    pub(crate) fn enqueue(&self, task: impl FnOnce() + Send + 'static) {
        // The receiver outlives the process-global pool, so a send can only
        // fail during shutdown, when the task no longer matters
        let _ = self.sender.send(Box::new(task));
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_enqueue_runs_each_task_once() {
        let pool = ThreadPool::new(4);
        let counter = Arc::new(AtomicUsize::new(0));
        let (done_tx, done_rx) = mpsc::channel();

        for _ in 0..32 {
            let counter = Arc::clone(&counter);
            let done_tx = done_tx.clone();
            pool.enqueue(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = done_tx.send(());
            });
        }

        for _ in 0..32 {
            done_rx
                .recv_timeout(Duration::from_secs(5))
                .expect("task did not run");
        }
        assert_eq!(counter.load(Ordering::SeqCst), 32);
    }

    #[test]
    fn test_instance_is_shared() {
        let first = ThreadPool::instance() as *const ThreadPool;
        let second = ThreadPool::instance() as *const ThreadPool;
        assert_eq!(first, second);
    }

    #[test]
    fn test_tasks_run_concurrently_with_enqueue() {
        let pool = ThreadPool::new(2);
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Arc::new(Mutex::new(release_rx));
        let (done_tx, done_rx) = mpsc::channel();

        // Park one worker; the other must still pick up tasks
        {
            let release_rx = Arc::clone(&release_rx);
            pool.enqueue(move || {
                let _ = release_rx.lock().unwrap().recv();
            });
        }
        {
            let done_tx = done_tx.clone();
            pool.enqueue(move || {
                let _ = done_tx.send(());
            });
        }

        done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("second worker did not run");
        let _ = release_tx.send(());
    }
}
