use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::priority::Priority;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// One unit of background work.
///
/// The payload and optional callback are captured inside `job` when the task
/// is built, so ownership of the payload moves to the scheduler on queueing,
/// to the work function while it runs, and then to the callback.
pub struct Task {
    /// Arrival order; lower runs first among equal priorities.
    pub seq: u64,
    pub priority: Priority,
    job: Job,
}

impl Task {
    pub fn new<P, F>(seq: u64, priority: Priority, payload: P, work: F) -> Self
    where
        P: Send + 'static,
        F: FnOnce(&mut P) + Send + 'static,
    {
        Self::with_callback(seq, priority, payload, work, |_: P| {})
    }

    pub fn with_callback<P, F, C>(
        seq: u64,
        priority: Priority,
        payload: P,
        work: F,
        callback: C,
    ) -> Self
    where
        P: Send + 'static,
        F: FnOnce(&mut P) + Send + 'static,
        C: FnOnce(P) + Send + 'static,
    {
        let job = move || {
            let mut payload = payload;
            work(&mut payload);
            callback(payload);
        };
        Self {
            seq,
            priority,
            job: Box::new(job),
        }
    }

    /// Run the task, containing any panic at the task boundary.
    /// Returns false if the work or its callback panicked.
    pub fn run(self) -> bool {
        let seq = self.seq;
        let priority = self.priority;
        match panic::catch_unwind(AssertUnwindSafe(self.job)) {
            Ok(()) => true,
            Err(cause) => {
                log::error!(
                    "Task #{seq} ({priority:?}) panicked: {}",
                    panic_message(cause.as_ref())
                );
                false
            }
        }
    }
}

fn panic_message(cause: &(dyn Any + Send)) -> &str {
    if let Some(s) = cause.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = cause.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("seq", &self.seq)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Task {}

impl PartialOrd for Task {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Max-heap order: higher priority first, then earlier arrival.
impl Ord for Task {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BinaryHeap;
    use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_heap_pops_by_priority_then_fifo() {
        let mut heap = BinaryHeap::new();
        heap.push(Task::new(0, Priority::Low, (), |_| {}));
        heap.push(Task::new(1, Priority::High, (), |_| {}));
        heap.push(Task::new(2, Priority::Medium, (), |_| {}));
        heap.push(Task::new(3, Priority::High, (), |_| {}));
        heap.push(Task::new(4, Priority::None, (), |_| {}));

        let order: Vec<u64> = std::iter::from_fn(|| heap.pop().map(|t| t.seq)).collect();
        assert_eq!(order, vec![1, 3, 2, 0, 4]);
    }

    #[test]
    fn test_callback_receives_payload_after_work() {
        let out = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&out);
        let task = Task::with_callback(
            0,
            Priority::Medium,
            vec![1, 2],
            |v: &mut Vec<i32>| v.push(3),
            move |v| sink.lock().extend(v),
        );
        assert!(task.run());
        assert_eq!(*out.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn test_panic_is_contained() {
        let callbacks = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&callbacks);
        let task = Task::with_callback(
            9,
            Priority::High,
            (),
            |_| panic!("terrain exploded"),
            move |_| {
                counter.fetch_add(1, AtomicOrdering::SeqCst);
            },
        );
        assert!(!task.run());
        assert_eq!(callbacks.load(AtomicOrdering::SeqCst), 0);
    }
}
