//! Property tests: stage locks are exclusive under contention.

use bee_common::plate::PlateRef;
use bee_transfer::{AbortSignal, ResourceArbiter};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

fn loaded_arbiter(stages: u8) -> ResourceArbiter {
    let arbiter = ResourceArbiter::new(1..=stages, [1, 2], AbortSignal::new())
        .with_poll_interval(Duration::from_millis(1));
    for stage in 1..=stages {
        arbiter
            .set_loaded(
                stage,
                Some(PlateRef {
                    barcode: format!("P{stage}"),
                    labware: "plate96".to_string(),
                }),
            )
            .unwrap();
    }
    arbiter
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn at_most_one_holder_per_stage(
        stages in 1u8..4,
        plans in prop::collection::vec(prop::collection::vec(0u8..8, 1..6), 2..5),
    ) {
        let arbiter = loaded_arbiter(stages);
        let holders: Vec<AtomicUsize> = (0..stages).map(|_| AtomicUsize::new(0)).collect();
        let violations = AtomicUsize::new(0);

        thread::scope(|s| {
            for (worker, plan) in plans.iter().enumerate() {
                let (arbiter, holders, violations) = (&arbiter, &holders, &violations);
                s.spawn(move || {
                    for &pick in plan {
                        let stage = pick % stages + 1;
                        let lease = arbiter
                            .request_stage_for_transfer(&[worker as u8], stage, false)
                            .unwrap();
                        let slot = &holders[usize::from(stage - 1)];
                        if slot.fetch_add(1, Ordering::SeqCst) != 0 {
                            violations.fetch_add(1, Ordering::SeqCst);
                        }
                        thread::sleep(Duration::from_micros(200));
                        slot.fetch_sub(1, Ordering::SeqCst);
                        drop(lease);
                    }
                });
            }
        });

        prop_assert_eq!(violations.load(Ordering::SeqCst), 0);
        for stage in 1..=stages {
            prop_assert!(arbiter.is_stage_available(stage));
        }
    }

    #[test]
    fn channel_grants_never_overlap(
        requests in prop::collection::vec(1usize..3, 2..6),
    ) {
        let arbiter = loaded_arbiter(2);
        let busy: Vec<AtomicUsize> = (0..2).map(|_| AtomicUsize::new(0)).collect();
        let violations = AtomicUsize::new(0);

        thread::scope(|s| {
            for &count in &requests {
                let (arbiter, busy, violations) = (&arbiter, &busy, &violations);
                s.spawn(move || {
                    let lease = arbiter.request_channels(count).unwrap();
                    assert_eq!(lease.ids().len(), count);
                    for &id in lease.ids() {
                        if busy[usize::from(id - 1)].fetch_add(1, Ordering::SeqCst) != 0 {
                            violations.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                    thread::sleep(Duration::from_micros(200));
                    for &id in lease.ids() {
                        busy[usize::from(id - 1)].fetch_sub(1, Ordering::SeqCst);
                    }
                });
            }
        });

        prop_assert_eq!(violations.load(Ordering::SeqCst), 0);
        prop_assert!(arbiter.busy_channels().is_empty());
    }
}
