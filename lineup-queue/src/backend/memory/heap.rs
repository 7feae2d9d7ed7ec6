use std::cmp::Ordering;

use tracing::debug;

use crate::{Job, JobSummary, QueueError, QueueResult};

/// Default number of slots allocated up front
pub const DEFAULT_INITIAL_CAPACITY: usize = 10;

/// Growable binary min-heap of jobs
///
/// The heap is a complete binary tree embedded in a flat array: the
/// children of slot `k` live at `2k + 1` and `2k + 2`. For every non-root
/// slot the parent orders before or equal to the child, first by priority
/// and then by arrival sequence.
///
/// `capacity` is the number of allocated slots. It doubles (minimum 1)
/// whenever a push finds the heap full and never shrinks.
#[derive(Debug)]
pub struct PriorityQueue {
    slots: Vec<Job>,
    capacity: usize,
    max_jobs: Option<usize>,
    next_sequence: u64,
}

impl PriorityQueue {
    /// Create an empty queue with no slots allocated
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            capacity: 0,
            max_jobs: None,
            next_sequence: 0,
        }
    }

    /// Create an empty queue with `capacity` slots allocated up front
    pub fn with_capacity(capacity: usize) -> QueueResult<Self> {
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| QueueError::CapacityExhausted { capacity: 0 })?;
        Ok(Self {
            slots,
            capacity,
            max_jobs: None,
            next_sequence: 0,
        })
    }

    /// Bound the number of queued jobs; pushes beyond it fail
    pub fn with_max_jobs(mut self, max_jobs: Option<usize>) -> Self {
        self.max_jobs = max_jobs;
        self
    }

    /// Insert a job and restore heap order. Returns the assigned sequence.
    pub fn push(&mut self, job: Job) -> QueueResult<u64> {
        if let Some(max) = self.max_jobs {
            if self.slots.len() >= max {
                return Err(QueueError::CapacityExhausted { capacity: max });
            }
        }
        if self.slots.len() == self.capacity {
            self.grow()?;
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        self.slots.push(job.with_sequence(sequence));
        self.bubble_up(self.slots.len() - 1);
        Ok(sequence)
    }

    /// Remove and return the most urgent job, or `None` when empty
    pub fn pop(&mut self) -> Option<Job> {
        if self.slots.is_empty() {
            return None;
        }
        // swap_remove moves the last job into the root slot
        let root = self.slots.swap_remove(0);
        if !self.slots.is_empty() {
            self.bubble_down(0);
        }
        Some(root)
    }

    /// The most urgent job without removing it
    pub fn peek(&self) -> Option<&Job> {
        self.slots.first()
    }

    /// Metadata of the most urgent job
    pub fn peek_summary(&self) -> Option<JobSummary> {
        self.peek().map(Job::summary)
    }

    /// Number of queued jobs
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of allocated slots
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn max_jobs(&self) -> Option<usize> {
        self.max_jobs
    }

    /// Check the heap property over every parent/child pair
    pub fn is_heap_ordered(&self) -> bool {
        (1..self.slots.len()).all(|k| self.less_or_equal(Self::parent(k), k))
    }

    fn grow(&mut self) -> QueueResult<()> {
        let new_capacity = match self.capacity {
            0 => 1,
            n => n
                .checked_mul(2)
                .ok_or(QueueError::CapacityExhausted { capacity: n })?,
        };
        let additional = new_capacity - self.slots.len();
        self.slots
            .try_reserve_exact(additional)
            .map_err(|_| QueueError::CapacityExhausted { capacity: self.capacity })?;

        debug!(from = self.capacity, to = new_capacity, "Grew priority queue");
        self.capacity = new_capacity;
        Ok(())
    }

    fn bubble_up(&mut self, mut k: usize) {
        while k > 0 {
            let parent = Self::parent(k);
            if self.cmp_slots(k, parent) != Ordering::Less {
                break;
            }
            self.slots.swap(k, parent);
            k = parent;
        }
    }

    fn bubble_down(&mut self, mut k: usize) {
        let len = self.slots.len();
        loop {
            let left = 2 * k + 1;
            let right = left + 1;

            let mut smallest = k;
            if left < len && self.cmp_slots(left, smallest) == Ordering::Less {
                smallest = left;
            }
            if right < len && self.cmp_slots(right, smallest) == Ordering::Less {
                smallest = right;
            }
            if smallest == k {
                return;
            }
            self.slots.swap(k, smallest);
            k = smallest;
        }
    }

    fn parent(k: usize) -> usize {
        (k - 1) / 2
    }

    fn cmp_slots(&self, a: usize, b: usize) -> Ordering {
        self.slots[a].heap_cmp(&self.slots[b])
    }

    fn less_or_equal(&self, a: usize, b: usize) -> bool {
        self.cmp_slots(a, b) != Ordering::Greater
    }
}

impl Default for PriorityQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Priority;

    fn drain(queue: &mut PriorityQueue) -> Vec<i64> {
        std::iter::from_fn(|| queue.pop()).map(|job| job.priority().value()).collect()
    }

    #[test]
    fn test_pop_on_empty_queue_returns_none() {
        let mut queue = PriorityQueue::new();
        assert!(queue.pop().is_none());
        assert!(queue.peek().is_none());
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_pops_in_priority_order() {
        let mut queue = PriorityQueue::new();
        for priority in [5, 3, 9, 1, 7, 1, 0, 12] {
            queue.push(Job::new(priority, "x")).unwrap();
            assert!(queue.is_heap_ordered());
        }

        assert_eq!(drain(&mut queue), vec![0, 1, 1, 3, 5, 7, 9, 12]);
    }

    #[test]
    fn test_equal_priorities_pop_in_arrival_order() {
        let mut queue = PriorityQueue::new();
        queue.push(Job::new(4, "first")).unwrap();
        queue.push(Job::new(4, "second")).unwrap();
        queue.push(Job::new(2, "urgent")).unwrap();
        queue.push(Job::new(4, "third")).unwrap();

        let bodies: Vec<_> = std::iter::from_fn(|| queue.pop())
            .map(|job| job.into_payload())
            .collect();
        assert_eq!(bodies, vec!["urgent", "first", "second", "third"]);
    }

    #[test]
    fn test_capacity_doubles_from_one() {
        let mut queue = PriorityQueue::new();
        assert_eq!(queue.capacity(), 0);

        let mut seen = Vec::new();
        for i in 0..9 {
            queue.push(Job::new(i, "x")).unwrap();
            seen.push(queue.capacity());
        }
        assert_eq!(seen, vec![1, 2, 4, 4, 8, 8, 8, 8, 16]);
    }

    #[test]
    fn test_capacity_never_shrinks() {
        let mut queue = PriorityQueue::with_capacity(DEFAULT_INITIAL_CAPACITY).unwrap();
        for i in 0..11 {
            queue.push(Job::new(i, "x")).unwrap();
        }
        assert_eq!(queue.capacity(), 20);

        drain(&mut queue);
        assert_eq!(queue.capacity(), 20);
        assert!(queue.capacity() >= queue.len());
    }

    #[test]
    fn test_max_jobs_rejects_push() {
        let mut queue = PriorityQueue::new().with_max_jobs(Some(2));
        queue.push(Job::new(1, "a")).unwrap();
        queue.push(Job::new(2, "b")).unwrap();

        let result = queue.push(Job::new(0, "c"));
        assert_eq!(result, Err(QueueError::CapacityExhausted { capacity: 2 }));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.peek().map(Job::priority), Some(Priority(1)));
    }

    #[test]
    fn test_peek_does_not_mutate() {
        let mut queue = PriorityQueue::new();
        queue.push(Job::new(3, "abc")).unwrap();

        let summary = queue.peek_summary().unwrap();
        assert_eq!(summary.length, 3);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop().unwrap().payload().as_ref(), b"abc");
    }

    #[test]
    fn test_negative_priorities_are_more_urgent() {
        let mut queue = PriorityQueue::new();
        queue.push(Job::new(0, "zero")).unwrap();
        queue.push(Job::new(-10, "neg")).unwrap();
        queue.push(Job::new(i64::MAX, "max")).unwrap();

        assert_eq!(drain(&mut queue), vec![-10, 0, i64::MAX]);
    }
}
