use lineup_queue::{Job, PriorityQueue};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Push(i64),
    Pop,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (-50i64..50).prop_map(Op::Push),
        1 => Just(Op::Pop),
    ]
}

proptest! {
    #[test]
    fn heap_property_holds_after_any_sequence(ops in prop::collection::vec(op_strategy(), 0..200)) {
        let mut queue = PriorityQueue::new();
        let mut expected_len = 0usize;

        for op in ops {
            match op {
                Op::Push(priority) => {
                    queue.push(Job::new(priority, "x")).unwrap();
                    expected_len += 1;
                }
                Op::Pop => {
                    if queue.pop().is_some() {
                        expected_len -= 1;
                    }
                }
            }
            prop_assert!(queue.is_heap_ordered());
            prop_assert_eq!(queue.len(), expected_len);
            prop_assert!(queue.capacity() >= queue.len());
        }
    }

    #[test]
    fn pops_are_non_decreasing(priorities in prop::collection::vec(any::<i64>(), 0..300)) {
        let mut queue = PriorityQueue::new();
        for priority in &priorities {
            queue.push(Job::new(*priority, "x")).unwrap();
        }

        let popped: Vec<i64> = std::iter::from_fn(|| queue.pop())
            .map(|job| job.priority().value())
            .collect();

        let mut sorted = priorities.clone();
        sorted.sort_unstable();
        prop_assert_eq!(popped, sorted);
    }

    #[test]
    fn growth_never_loses_jobs(k in 0u32..10) {
        let count = (1usize << k) + 1;
        let mut queue = PriorityQueue::new();
        for i in 0..count {
            let body = (i as u64).to_be_bytes();
            queue.push(Job::try_new((count - i) as i64, &body).unwrap()).unwrap();
        }

        let mut bodies: Vec<u64> = std::iter::from_fn(|| queue.pop())
            .map(|job| {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(job.payload());
                u64::from_be_bytes(raw)
            })
            .collect();
        prop_assert_eq!(bodies.len(), count);

        bodies.sort_unstable();
        let expected: Vec<u64> = (0..count as u64).collect();
        prop_assert_eq!(bodies, expected);
    }
}
