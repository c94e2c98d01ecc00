use std::collections::BinaryHeap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::SchedulerError;
use crate::priority::Priority;
use crate::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    /// Tasks are accepted but workers do not pop them yet.
    Paused,
    Running,
    /// Shutdown requested; workers exit after their current task.
    Stopped,
}

#[derive(Debug)]
struct QueueState {
    tasks: BinaryHeap<Task>,
    next_seq: u64,
    run_state: RunState,
    /// Tasks queued or currently executing.
    outstanding: usize,
}

#[derive(Debug)]
struct Shared {
    queue: Mutex<QueueState>,
    work_available: Condvar,
    idle: Condvar,
}

/// Fixed pool of worker threads draining a single priority queue.
///
/// `queue_task` never blocks on work in progress; it only takes the queue
/// lock long enough to push. Tasks queued after [`TaskScheduler::shutdown`]
/// are rejected, and tasks still queued at shutdown are dropped unexecuted.
#[derive(Debug)]
pub struct TaskScheduler {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl TaskScheduler {
    /// Spawn `num_threads` workers that start draining immediately.
    pub fn new(num_threads: usize) -> Self {
        Self::spawn(num_threads, RunState::Running)
    }

    /// Spawn `num_threads` workers that hold off until [`TaskScheduler::begin_work`].
    pub fn paused(num_threads: usize) -> Self {
        Self::spawn(num_threads, RunState::Paused)
    }

    fn spawn(num_threads: usize, run_state: RunState) -> Self {
        let num_threads = num_threads.max(1);
        let shared = Arc::new(Shared {
            queue: Mutex::new(QueueState {
                tasks: BinaryHeap::new(),
                next_seq: 0,
                run_state,
                outstanding: 0,
            }),
            work_available: Condvar::new(),
            idle: Condvar::new(),
        });

        let mut workers = Vec::with_capacity(num_threads);
        for index in 0..num_threads {
            let shared = Arc::clone(&shared);
            let spawned = thread::Builder::new()
                .name(format!("terrastream-worker-{index}"))
                .spawn(move || process_loop(index, &shared));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => log::error!("Failed to spawn worker thread {index}: {e}"),
            }
        }

        log::info!("Task scheduler started with {} workers", workers.len());
        Self { shared, workers }
    }

    /// Number of worker threads actually running.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Queue `work` to run on a worker with exclusive access to `payload`.
    /// Returns the task's sequence number.
    pub fn queue_task<P, F>(
        &self,
        priority: Priority,
        payload: P,
        work: F,
    ) -> Result<u64, SchedulerError>
    where
        P: Send + 'static,
        F: FnOnce(&mut P) + Send + 'static,
    {
        self.push(|seq| Task::new(seq, priority, payload, work))
    }

    /// Like [`TaskScheduler::queue_task`], then hand the payload to `callback`
    /// on the same worker once `work` returns.
    pub fn queue_task_with_callback<P, F, C>(
        &self,
        priority: Priority,
        payload: P,
        work: F,
        callback: C,
    ) -> Result<u64, SchedulerError>
    where
        P: Send + 'static,
        F: FnOnce(&mut P) + Send + 'static,
        C: FnOnce(P) + Send + 'static,
    {
        self.push(|seq| Task::with_callback(seq, priority, payload, work, callback))
    }

    fn push(&self, build: impl FnOnce(u64) -> Task) -> Result<u64, SchedulerError> {
        let mut queue = self.shared.queue.lock();
        if queue.run_state == RunState::Stopped {
            return Err(SchedulerError::ShutDown);
        }
        let seq = queue.next_seq;
        queue.next_seq += 1;
        queue.tasks.push(build(seq));
        queue.outstanding += 1;
        let running = queue.run_state == RunState::Running;
        drop(queue);

        if running {
            self.shared.work_available.notify_one();
        }
        Ok(seq)
    }

    /// Start a paused scheduler and wake every worker.
    pub fn begin_work(&self) {
        {
            let mut queue = self.shared.queue.lock();
            if queue.run_state == RunState::Paused {
                queue.run_state = RunState::Running;
            }
        }
        self.shared.work_available.notify_all();
    }

    /// Broadcast a wake-up to all workers.
    pub fn wake_all(&self) {
        self.shared.work_available.notify_all();
    }

    /// Tasks queued or executing.
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().outstanding
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.queue.lock().run_state == RunState::Stopped
    }

    /// Block until every queued task has finished.
    /// Returns immediately if the scheduler is paused with work queued.
    pub fn wait_idle(&self) {
        let mut queue = self.shared.queue.lock();
        while queue.outstanding > 0 && queue.run_state == RunState::Running {
            self.shared.idle.wait(&mut queue);
        }
    }

    /// Like [`TaskScheduler::wait_idle`] with an upper bound.
    /// Returns true if the queue drained in time.
    pub fn wait_idle_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut queue = self.shared.queue.lock();
        while queue.outstanding > 0 {
            if queue.run_state != RunState::Running {
                return false;
            }
            if Instant::now() >= deadline {
                return false;
            }
            self.shared.idle.wait_until(&mut queue, deadline);
        }
        true
    }

    /// Stop accepting work, drop everything still queued, and join the
    /// workers once they finish their current task. Idempotent.
    pub fn shutdown(&mut self) {
        let dropped: Vec<Task> = {
            let mut queue = self.shared.queue.lock();
            if queue.run_state == RunState::Stopped && self.workers.is_empty() {
                return;
            }
            queue.run_state = RunState::Stopped;
            let dropped: Vec<Task> = queue.tasks.drain().collect();
            queue.outstanding -= dropped.len();
            dropped
        };
        self.shared.work_available.notify_all();
        self.shared.idle.notify_all();

        if !dropped.is_empty() {
            log::info!("Dropping {} queued tasks at shutdown", dropped.len());
        }
        // Payload destructors may take other locks; run them outside the queue lock.
        drop(dropped);

        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("Worker thread panicked outside a task boundary");
            }
        }
        log::info!("Task scheduler shut down");
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn process_loop(index: usize, shared: &Shared) {
    log::debug!("Worker {index} started");
    loop {
        let task = {
            let mut queue = shared.queue.lock();
            loop {
                match queue.run_state {
                    RunState::Stopped => {
                        log::debug!("Worker {index} exiting");
                        return;
                    }
                    RunState::Running => {
                        if let Some(task) = queue.tasks.pop() {
                            break task;
                        }
                    }
                    RunState::Paused => {}
                }
                shared.work_available.wait(&mut queue);
            }
        };

        task.run();

        let mut queue = shared.queue.lock();
        queue.outstanding -= 1;
        if queue.outstanding == 0 {
            shared.idle.notify_all();
        }
    }
}
