use std::{cmp::Ordering, collections::BinaryHeap};

use meshbench_core::units::Nanosecs;

/// A time-ordered queue of events. Events scheduled for the same instant pop in the order
/// they were pushed.
#[derive(Debug)]
pub(crate) struct EventQueue<E> {
    heap: BinaryHeap<Scheduled<E>>,
    next_seq: u64,
}

impl<E> EventQueue<E> {
    pub(crate) fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    pub(crate) fn push(&mut self, at: Nanosecs, event: E) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Scheduled { at, seq, event });
    }

    pub(crate) fn pop(&mut self) -> Option<(Nanosecs, E)> {
        self.heap.pop().map(|s| (s.at, s.event))
    }

    pub(crate) fn peek_time(&self) -> Option<Nanosecs> {
        self.heap.peek().map(|s| s.at)
    }

    /// Empties the queue, yielding the remaining events in no particular order.
    pub(crate) fn drain(&mut self) -> impl Iterator<Item = E> + '_ {
        self.heap.drain().map(|s| s.event)
    }

    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }
}

#[derive(Debug)]
struct Scheduled<E> {
    at: Nanosecs,
    seq: u64,
    event: E,
}

// `BinaryHeap` is a max-heap, so the ordering is reversed to pop the earliest event first.
impl<E> Ord for Scheduled<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        (other.at, other.seq).cmp(&(self.at, self.seq))
    }
}

impl<E> PartialOrd for Scheduled<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> PartialEq for Scheduled<E> {
    fn eq(&self, other: &Self) -> bool {
        (self.at, self.seq) == (other.at, other.seq)
    }
}

impl<E> Eq for Scheduled<E> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn earliest_first() {
        let mut q = EventQueue::new();
        q.push(Nanosecs::new(30), 'c');
        q.push(Nanosecs::new(10), 'a');
        q.push(Nanosecs::new(20), 'b');
        assert_eq!(q.peek_time(), Some(Nanosecs::new(10)));
        let order = std::iter::from_fn(|| q.pop()).map(|(_, e)| e).collect::<String>();
        assert_eq!(order, "abc");
    }

    #[test]
    fn ties_pop_in_push_order() {
        let mut q = EventQueue::new();
        for c in ['x', 'y', 'z'] {
            q.push(Nanosecs::new(5), c);
        }
        q.push(Nanosecs::new(1), 'w');
        let order = std::iter::from_fn(|| q.pop()).map(|(_, e)| e).collect::<String>();
        assert_eq!(order, "wxyz");
    }

    #[test]
    fn drain_empties() {
        let mut q = EventQueue::new();
        q.push(Nanosecs::new(1), 1);
        q.push(Nanosecs::new(2), 2);
        assert_eq!(q.drain().sum::<i32>(), 3);
        assert_eq!(q.len(), 0);
    }
}
