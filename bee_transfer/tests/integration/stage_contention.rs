//! A transfer meeting a stage held by someone else: pre-positioning while
//! it waits, and a bounded wait that runs out.

use super::{Rig, protocol_toml};
use bee_common::axis::Axis;
use bee_transfer::arbiter::StageLease;
use bee_transfer::escalation::{ErrorData, ErrorEscalation, ErrorOption};
use bee_transfer::state::State;
use bee_transfer::{AbortSignal, ResourceArbiter, TransferStateMachine};
use parking_lot::Mutex;
use std::thread;
use std::time::{Duration, Instant};

/// Channel 1 over stage 2 at -90 degrees is at x = 391.5, over stage 1 at 191.5.
const X_BETWEEN_STAGES: f64 = 250.0;

fn pair_rig() -> Rig {
    Rig::new(&protocol_toml(
        "plate96",
        "plate96",
        &[("SRC", "A1", "DST", "A1"), ("SRC", "A2", "DST", "A2")],
    ))
}

/// Retries every error and lets go of a held stage on the first one.
struct ReleaseOnFirstError<'a> {
    held: Mutex<Option<StageLease<'a>>>,
    messages: Mutex<Vec<String>>,
}

impl ErrorEscalation for ReleaseOnFirstError<'_> {
    fn add_error(&self, error: ErrorData) -> ErrorOption {
        self.messages.lock().push(error.message);
        self.held.lock().take();
        ErrorOption::Retry
    }
}

#[test]
fn busy_destination_pre_positions_then_proceeds() {
    let rig = pair_rig();
    rig.seat_plates();
    let held = rig.arbiter.request_stage_for_transfer(&[9], 1, true).unwrap();
    let escalation = ReleaseOnFirstError {
        held: Mutex::new(None),
        messages: Mutex::new(Vec::new()),
    };
    let mut machine = TransferStateMachine::new(rig.ctx(&escalation), rig.assignment(-90.0)).unwrap();
    let x = &rig.axes["ch1.x"];

    let result = thread::scope(|s| {
        s.spawn(move || {
            // over the source plate, then pre-positioned over the held destination
            let deadline = Instant::now() + Duration::from_secs(5);
            while x.position() < X_BETWEEN_STAGES && Instant::now() < deadline {
                thread::sleep(Duration::from_micros(100));
            }
            while x.position() > X_BETWEEN_STAGES && Instant::now() < deadline {
                thread::sleep(Duration::from_micros(100));
            }
            drop(held);
        });
        machine.run()
    });

    result.unwrap();
    assert_eq!(machine.state(), State::Done);
    assert_eq!(machine.entries(State::LockDestPlate), 1);
    assert_eq!(machine.entries(State::PreMoveXToDest), 1);
    let history = machine.history();
    let lock = history.iter().position(|&s| s == State::LockDestPlate).unwrap();
    assert_eq!(
        &history[lock..lock + 3],
        &[State::LockDestPlate, State::PreMoveXToDest, State::MoveToDestYR]
    );
    assert!(escalation.messages.lock().is_empty());
    assert_eq!(machine.dispensed_wells().len(), 2);
}

#[test]
fn free_destination_skips_pre_positioning() {
    let rig = pair_rig();
    rig.seat_plates();
    let escalation = ReleaseOnFirstError {
        held: Mutex::new(None),
        messages: Mutex::new(Vec::new()),
    };
    let mut machine = TransferStateMachine::new(rig.ctx(&escalation), rig.assignment(-90.0)).unwrap();

    machine.run().unwrap();

    assert_eq!(machine.entries(State::PreMoveXToSource), 0);
    assert_eq!(machine.entries(State::PreMoveXToDest), 0);
}

#[test]
fn timed_out_stage_wait_escalates_and_resumes() {
    let mut rig = pair_rig();
    rig.arbiter = ResourceArbiter::for_deck(&rig.deck, AbortSignal::new())
        .with_timeout(Some(Duration::from_millis(20)));
    rig.seat_plates();
    let escalation = ReleaseOnFirstError {
        held: Mutex::new(Some(
            rig.arbiter.request_stage_for_transfer(&[9], 2, false).unwrap(),
        )),
        messages: Mutex::new(Vec::new()),
    };
    let mut machine = TransferStateMachine::new(rig.ctx(&escalation), rig.assignment(-90.0)).unwrap();

    machine.run().unwrap();

    assert_eq!(machine.state(), State::Done);
    assert_eq!(machine.entries(State::PreMoveXToSource), 1);
    assert_eq!(machine.entries(State::MoveToSourceYRError), 1);
    assert_eq!(machine.entries(State::MoveToSourceYR), 2);
    let messages = escalation.messages.lock();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("MoveToSourceYR"));
    assert!(messages[0].contains("timed out"));
    assert!(messages[0].contains("stage 2"));
    assert_eq!(machine.dispensed_wells().len(), 2);
    assert!(rig.arbiter.is_stage_available(2));
}
