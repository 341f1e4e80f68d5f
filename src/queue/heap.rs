// Priority collection of scheduled tasks, shared by the loop and outside callers
use crate::task::{ScheduledTask, TaskType};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;

/// Heap entry: schedule order with insertion sequence as the final tie-break.
struct Queued {
    task: ScheduledTask,
    seq: u64,
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Queued {}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        self.task
            .schedule_cmp(&other.task)
            .then(self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Lightweight view of a queued task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSnapshot {
    pub task_type: TaskType,
    pub name: String,
    pub scheduled_at: Instant,
    pub recurring: bool,
}

impl TaskSnapshot {
    fn of(task: &ScheduledTask) -> Self {
        Self {
            task_type: task.task_type(),
            name: task.name(),
            scheduled_at: task.scheduled_at(),
            recurring: task.is_recurring(),
        }
    }
}

#[derive(Default)]
struct Inner {
    heap: BinaryHeap<Reverse<Queued>>,
    next_seq: u64,
}

#[derive(Default)]
pub struct TaskHeap {
    inner: Mutex<Inner>,
}

impl TaskHeap {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert unless an equal task is already queued. Returns whether it was added.
    pub fn push(&self, task: ScheduledTask) -> bool {
        let mut inner = self.lock();
        if inner.heap.iter().any(|Reverse(q)| q.task == task) {
            return false;
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.heap.push(Reverse(Queued { task, seq }));
        true
    }

    pub fn peek(&self) -> Option<TaskSnapshot> {
        self.lock().heap.peek().map(|Reverse(q)| TaskSnapshot::of(&q.task))
    }

    pub fn pop(&self) -> Option<ScheduledTask> {
        self.lock().heap.pop().map(|Reverse(q)| q.task)
    }

    /// Pop the head if it is due at `now`.
    pub fn pop_due(&self, now: Instant) -> Option<ScheduledTask> {
        let mut inner = self.lock();
        let due = inner
            .heap
            .peek()
            .is_some_and(|Reverse(q)| q.task.scheduled_at() <= now);
        if due {
            inner.heap.pop().map(|Reverse(q)| q.task)
        } else {
            None
        }
    }

    /// Remove every task of `task_type`, returning how many were removed.
    pub fn remove_type(&self, task_type: TaskType) -> usize {
        let mut inner = self.lock();
        let before = inner.heap.len();
        inner.heap.retain(|Reverse(q)| q.task.task_type() != task_type);
        before - inner.heap.len()
    }

    pub fn contains_type(&self, task_type: TaskType) -> bool {
        self.lock()
            .heap
            .iter()
            .any(|Reverse(q)| q.task.task_type() == task_type)
    }

    /// Move every task of `task_type` scheduled after `to` up to `to`.
    /// Returns whether any task of that type is queued.
    pub fn advance_type(&self, task_type: TaskType, to: Instant) -> bool {
        let mut inner = self.lock();
        let mut entries = std::mem::take(&mut inner.heap).into_vec();
        let mut found = false;
        for Reverse(q) in entries.iter_mut() {
            if q.task.task_type() == task_type {
                found = true;
                if q.task.scheduled_at() > to {
                    let delay = to.saturating_duration_since(Instant::now());
                    q.task.schedule_mut().reschedule_in(delay);
                }
            }
        }
        inner.heap = BinaryHeap::from(entries);
        found
    }

    /// Earliest scheduled time among non-bootstrap tasks.
    pub fn earliest_regular(&self) -> Option<Instant> {
        self.lock()
            .heap
            .iter()
            .filter(|Reverse(q)| !q.task.is_bootstrap())
            .map(|Reverse(q)| q.task.scheduled_at())
            .min()
    }

    pub fn len(&self) -> usize {
        self.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().heap.is_empty()
    }

    /// Remove everything, returning the types that were queued.
    pub fn drain(&self) -> Vec<TaskType> {
        let mut types: Vec<TaskType> = std::mem::take(&mut self.lock().heap)
            .into_iter()
            .map(|Reverse(q)| q.task.task_type())
            .collect();
        types.sort();
        types.dedup();
        types
    }

    /// All queued tasks in execution order.
    pub fn snapshot(&self) -> Vec<TaskSnapshot> {
        let inner = self.lock();
        let mut queued: Vec<&Queued> = inner.heap.iter().map(|Reverse(q)| q).collect();
        queued.sort();
        queued.into_iter().map(|q| TaskSnapshot::of(&q.task)).collect()
    }
}
