//! Abort from the operator, from the signal, and while blocked on a stage.

use super::{Rig, W_ASPIRATE_END_50UL, protocol_toml};
use bee_transfer::arbiter::StageStatus;
use bee_transfer::escalation::{AutoRetry, ErrorOption, OperatorQueue};
use bee_transfer::plate_handler::PlateEvent;
use bee_transfer::state::State;
use bee_transfer::{SchedulerError, TransferError, TransferStateMachine};
use std::thread;
use std::time::Duration;

fn pair_protocol() -> String {
    protocol_toml(
        "plate96",
        "plate96",
        &[("SRC", "A1", "DST", "A1"), ("SRC", "A2", "DST", "A2")],
    )
}

#[test]
fn operator_abort_stops_the_run() {
    let rig = Rig::new(&pair_protocol());
    rig.axes["ch1.w"].fail_moves_to(W_ASPIRATE_END_50UL, 1, "following error");
    let queue = OperatorQueue::new(rig.arbiter.abort_signal().clone(), Duration::from_millis(1));

    let result = thread::scope(|s| {
        let run = s.spawn(|| rig.run(&queue));
        let id = loop {
            if let Some((id, data)) = queue.pending().into_iter().next() {
                assert!(data.message.contains("Aspirate"));
                assert!(data.offers(ErrorOption::Abort));
                break id;
            }
            thread::sleep(Duration::from_millis(1));
        };
        assert!(queue.resolve(id, ErrorOption::Abort));
        run.join().unwrap()
    });

    assert!(matches!(result, Err(SchedulerError::Aborted)));
    assert!(rig.arbiter.abort_signal().is_aborted());
    // nothing is retrieved after an abort
    assert!(
        !rig.handler
            .events()
            .iter()
            .any(|e| matches!(e, PlateEvent::Retrieved { .. }))
    );
    for stage in [1, 2] {
        assert_eq!(rig.arbiter.stage_status(stage), Some(StageStatus::Free));
    }
    assert!(rig.arbiter.busy_channels().is_empty());
    for id in [1, 2] {
        assert_eq!(rig.deck.channel(id).unwrap().z().position(), 0.0);
    }
}

#[test]
fn raised_signal_prevents_any_work() {
    let rig = Rig::new(&pair_protocol());
    rig.arbiter.abort_signal().abort();

    assert!(matches!(rig.run(&AutoRetry::new()), Err(SchedulerError::Aborted)));
    assert!(rig.handler.events().is_empty());
}

#[test]
fn abort_cancels_a_machine_waiting_for_its_source() {
    let rig = Rig::new(&pair_protocol());
    rig.seat_plates();
    let blocker = rig.arbiter.request_stage_for_transfer(&[9], 2, false).unwrap();
    let escalation = AutoRetry::new();
    let mut machine = TransferStateMachine::new(rig.ctx(&escalation), rig.assignment(-90.0)).unwrap();

    let result = thread::scope(|s| {
        s.spawn(|| {
            thread::sleep(Duration::from_millis(30));
            rig.arbiter.abort_signal().abort();
        });
        machine.run()
    });

    assert!(matches!(
        result,
        Err(TransferError::Aborted(State::MoveToSourceYR))
    ));
    assert_eq!(machine.entries(State::PreMoveXToSource), 1);
    assert_eq!(machine.state(), State::Aborted);
    assert_eq!(escalation.count(), 0);
    for id in [1, 2] {
        assert_eq!(rig.deck.channel(id).unwrap().z().position(), 0.0);
    }
    drop(blocker);
    assert!(rig.arbiter.is_stage_available(2));
}
