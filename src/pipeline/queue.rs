use std::collections::VecDeque;

use crate::subtitle::Cue;

/// A cue waiting for translation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Sequence number the track assigned when the cue was accepted
    pub sequence: u64,
    /// Number of the track the cue belongs to
    pub track: u64,
    pub cue: Cue,
}

/// FIFO of pending tasks.
///
/// The queue is owned by the pipeline controller, so `drain_up_to` takes its
/// prefix under `&mut self` and no task can end up in two batches.
#[derive(Debug, Default)]
pub struct TaskQueue {
    tasks: VecDeque<Task>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, task: Task) {
        self.tasks.push_back(task);
    }

    /// Remove and return at most `max` tasks from the head, in order
    pub fn drain_up_to(&mut self, max: usize) -> Vec<Task> {
        let count = max.min(self.tasks.len());
        self.tasks.drain(..count).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
