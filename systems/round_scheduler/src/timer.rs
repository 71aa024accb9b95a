//! Priority queue of deadlines driving every timed wait of the scheduler.

use std::{
    cmp::Reverse,
    collections::{BTreeMap, BinaryHeap},
    time::Duration,
};

/// Continuations ordered by deadline, ties resolved in scheduling order.
#[derive(Debug)]
pub(crate) struct TimerQueue<T> {
    heap: BinaryHeap<Reverse<(Duration, u64)>>,
    pending: BTreeMap<u64, T>,
    next_sequence: u64,
}

impl<T> TimerQueue<T> {
    pub(crate) fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            pending: BTreeMap::new(),
            next_sequence: 0,
        }
    }

    pub(crate) fn schedule(&mut self, deadline: Duration, continuation: T) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(Reverse((deadline, sequence)));
        let _ = self.pending.insert(sequence, continuation);
    }

    /// Pops the earliest continuation whose deadline is not after `now`.
    pub(crate) fn pop_due(&mut self, now: Duration) -> Option<(Duration, T)> {
        let Reverse((deadline, _)) = *self.heap.peek()?;
        if deadline > now {
            return None;
        }
        let Reverse((deadline, sequence)) = self.heap.pop()?;
        self.pending
            .remove(&sequence)
            .map(|continuation| (deadline, continuation))
    }

    pub(crate) fn clear(&mut self) {
        self.heap.clear();
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_entries_pop_in_deadline_then_schedule_order() {
        let mut queue = TimerQueue::new();
        queue.schedule(Duration::from_secs(2), "late");
        queue.schedule(Duration::from_secs(1), "first");
        queue.schedule(Duration::from_secs(1), "second");

        assert_eq!(queue.pop_due(Duration::from_millis(500)), None);
        assert_eq!(
            queue.pop_due(Duration::from_secs(1)),
            Some((Duration::from_secs(1), "first"))
        );
        assert_eq!(
            queue.pop_due(Duration::from_secs(1)),
            Some((Duration::from_secs(1), "second"))
        );
        assert_eq!(queue.pop_due(Duration::from_secs(1)), None);

        queue.clear();
        assert_eq!(queue.pop_due(Duration::from_secs(10)), None);
    }
}
