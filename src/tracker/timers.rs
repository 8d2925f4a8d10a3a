use std::mem;

/// Work the tracker deferred to a later turn of the event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerTask {
    /// Periodic flush, re-armed every time it runs.
    Flush,
    /// Scroll listener went quiet; evaluate checkpoints.
    ScrollSettled,
    /// History changed; compare the visible path with the last one.
    NavigationCheck,
    /// Continue an outbound navigation that was held back for capture.
    Navigate(String),
}

#[derive(Debug, Clone)]
struct Scheduled {
    due_at: i64,
    seq: u64,
    task: TimerTask,
}

/// Deterministic stand-in for `setTimeout`/`setInterval`. The host calls
/// back into the tracker when the earliest deadline passes.
#[derive(Debug, Default)]
pub struct TimerQueue {
    scheduled: Vec<Scheduled>,
    next_seq: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due_at: i64, task: TimerTask) {
        self.scheduled.push(Scheduled {
            due_at,
            seq: self.next_seq,
            task,
        });
        self.next_seq += 1;
    }

    /// Cancels pending tasks of the same kind, then schedules `task`
    /// (clearTimeout + setTimeout).
    pub fn reschedule(&mut self, due_at: i64, task: TimerTask) {
        self.cancel(&task);
        self.schedule(due_at, task);
    }

    /// Cancels every pending task of the same kind as `task`.
    pub fn cancel(&mut self, task: &TimerTask) {
        let kind = mem::discriminant(task);
        self.scheduled
            .retain(|scheduled| mem::discriminant(&scheduled.task) != kind);
    }

    pub fn next_deadline(&self) -> Option<i64> {
        self.scheduled.iter().map(|scheduled| scheduled.due_at).min()
    }

    /// Removes and returns the earliest task due at `now`. Ties run in
    /// scheduling order.
    pub fn pop_due(&mut self, now: i64) -> Option<TimerTask> {
        let index = self
            .scheduled
            .iter()
            .enumerate()
            .filter(|(_, scheduled)| scheduled.due_at <= now)
            .min_by_key(|(_, scheduled)| (scheduled.due_at, scheduled.seq))
            .map(|(index, _)| index)?;
        Some(self.scheduled.remove(index).task)
    }

    /// Removes every pending task, returned in the order they would run.
    pub fn drain(&mut self) -> Vec<TimerTask> {
        let mut scheduled = mem::take(&mut self.scheduled);
        scheduled.sort_by_key(|scheduled| (scheduled.due_at, scheduled.seq));
        scheduled.into_iter().map(|scheduled| scheduled.task).collect()
    }

    pub fn len(&self) -> usize {
        self.scheduled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scheduled.is_empty()
    }
}
