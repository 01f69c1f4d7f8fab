//! Deferred one-shot and repeating tasks.

use std::fmt;

use tracing::trace;

/// Identifies one scheduled task for its whole life, including every
/// repetition of a repeating task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T-{}", self.0)
    }
}

#[derive(Debug)]
struct Entry<T> {
    id: TaskId,
    due: u64,
    period: Option<u64>,
    payload: T,
}

/// A tick-driven queue of tasks.
///
/// Delays are counted in ticks and are at least one: a task scheduled while
/// the current tick's tasks are running fires on the next [`advance`]
/// at the earliest. Tasks due on the same tick come out in the order they
/// were scheduled.
///
/// [`advance`]: TaskQueue::advance
#[derive(Debug)]
pub struct TaskQueue<T> {
    now: u64,
    next_id: u64,
    entries: Vec<Entry<T>>,
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self {
            now: 0,
            next_id: 1,
            entries: Vec::new(),
        }
    }
}

impl<T: Clone> TaskQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current tick.
    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, delay: u64, period: Option<u64>, payload: T) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        let due = self.now + delay.max(1);
        trace!(task = %id, due, ?period, "task scheduled");
        self.entries.push(Entry {
            id,
            due,
            period,
            payload,
        });
        id
    }

    /// Runs `payload` once, `delay` ticks from now.
    pub fn schedule_once(&mut self, delay: u64, payload: T) -> TaskId {
        self.push(delay, None, payload)
    }

    /// Runs `payload` after `delay` ticks, then every `period` ticks until
    /// cancelled.
    pub fn schedule_repeating(&mut self, delay: u64, period: u64, payload: T) -> TaskId {
        self.push(delay, Some(period.max(1)), payload)
    }

    /// Returns whether the task was still scheduled.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        before != self.entries.len()
    }

    /// Cancels every task whose payload matches `predicate`; returns how many
    /// were removed.
    pub fn cancel_where(&mut self, mut predicate: impl FnMut(&T) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| !predicate(&e.payload));
        before - self.entries.len()
    }

    pub fn is_scheduled(&self, id: TaskId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    /// Moves one tick forward and returns every task due on it.
    ///
    /// One-shot tasks leave the queue; repeating tasks are rescheduled one
    /// period later and stay scheduled under the same id.
    pub fn advance(&mut self) -> Vec<(TaskId, T)> {
        self.now += 1;
        let now = self.now;

        let mut due: Vec<(u64, TaskId, T)> = Vec::new();
        self.entries.retain_mut(|entry| {
            if entry.due > now {
                return true;
            }
            due.push((entry.due, entry.id, entry.payload.clone()));
            match entry.period {
                Some(period) => {
                    entry.due = now + period;
                    true
                }
                None => false,
            }
        });

        due.sort_by_key(|(at, id, _)| (*at, *id));
        due.into_iter().map(|(_, id, payload)| (id, payload)).collect()
    }
}

// ---------------------------------------------------------------------------
// RunnerDecision
// ---------------------------------------------------------------------------

/// What to do with a self-managing repeating task given the size of the set
/// it watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerDecision {
    Start,
    Stop,
    Keep,
}

impl RunnerDecision {
    /// A runner runs exactly while its tracked set is non-empty.
    ///
    /// ```rust
    /// use gladius_tick::RunnerDecision;
    ///
    /// assert_eq!(RunnerDecision::decide(1, false), RunnerDecision::Start);
    /// assert_eq!(RunnerDecision::decide(0, true), RunnerDecision::Stop);
    /// assert_eq!(RunnerDecision::decide(3, true), RunnerDecision::Keep);
    /// ```
    pub fn decide(tracked: usize, running: bool) -> Self {
        match (tracked > 0, running) {
            (true, false) => Self::Start,
            (false, true) => Self::Stop,
            _ => Self::Keep,
        }
    }
}
