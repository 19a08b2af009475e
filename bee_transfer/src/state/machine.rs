//! Transfer state and trigger vocabulary with the transition table.
//!
//! Happy path:
//! `Idle → Initialize → TipsOn → [PreMoveXToSource] → MoveToSourceYR → MoveToSource →
//! MoveIntoSource → Aspirate → MoveOutOfSource → MoveFromSource → LockDestPlate →
//! [PreMoveXToDest] → MoveToDestYR → MoveToDest → MoveIntoDest → Dispense →
//! MoveOutOfDest → MoveFromDest → UnlockDestPlate → RunTipHandling → Done`.
//!
//! Each motion state, and `TipsOn` which presses fresh tips when they are
//! changed, has a paired `*Error` state left by `Retry` (back to the motion
//! state) or `Abort` (to `Aborting`).

/// Transfer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Idle,
    Initialize,
    TipsOn,
    TipsOnError,
    PreMoveXToSource,
    PreMoveXToSourceError,
    MoveToSourceYR,
    MoveToSourceYRError,
    MoveToSource,
    MoveToSourceError,
    MoveIntoSource,
    MoveIntoSourceError,
    Aspirate,
    AspirateError,
    MoveOutOfSource,
    MoveOutOfSourceError,
    MoveFromSource,
    MoveFromSourceError,
    LockDestPlate,
    PreMoveXToDest,
    PreMoveXToDestError,
    MoveToDestYR,
    MoveToDestYRError,
    MoveToDest,
    MoveToDestError,
    MoveIntoDest,
    MoveIntoDestError,
    Dispense,
    DispenseError,
    MoveOutOfDest,
    MoveOutOfDestError,
    MoveFromDest,
    MoveFromDestError,
    UnlockDestPlate,
    RunTipHandling,
    RunTipHandlingError,
    Done,
    Aborting,
    Aborted,
}

impl State {
    /// Paired error state of a motion state.
    pub const fn error_state(self) -> Option<State> {
        use State::*;
        Some(match self {
            TipsOn => TipsOnError,
            PreMoveXToSource => PreMoveXToSourceError,
            MoveToSourceYR => MoveToSourceYRError,
            MoveToSource => MoveToSourceError,
            MoveIntoSource => MoveIntoSourceError,
            Aspirate => AspirateError,
            MoveOutOfSource => MoveOutOfSourceError,
            MoveFromSource => MoveFromSourceError,
            PreMoveXToDest => PreMoveXToDestError,
            MoveToDestYR => MoveToDestYRError,
            MoveToDest => MoveToDestError,
            MoveIntoDest => MoveIntoDestError,
            Dispense => DispenseError,
            MoveOutOfDest => MoveOutOfDestError,
            MoveFromDest => MoveFromDestError,
            RunTipHandling => RunTipHandlingError,
            _ => return None,
        })
    }

    /// State an error state retries.
    pub const fn origin(self) -> Option<State> {
        use State::*;
        Some(match self {
            TipsOnError => TipsOn,
            PreMoveXToSourceError => PreMoveXToSource,
            MoveToSourceYRError => MoveToSourceYR,
            MoveToSourceError => MoveToSource,
            MoveIntoSourceError => MoveIntoSource,
            AspirateError => Aspirate,
            MoveOutOfSourceError => MoveOutOfSource,
            MoveFromSourceError => MoveFromSource,
            PreMoveXToDestError => PreMoveXToDest,
            MoveToDestYRError => MoveToDestYR,
            MoveToDestError => MoveToDest,
            MoveIntoDestError => MoveIntoDest,
            DispenseError => Dispense,
            MoveOutOfDestError => MoveOutOfDest,
            MoveFromDestError => MoveFromDest,
            RunTipHandlingError => RunTipHandling,
            _ => return None,
        })
    }

    pub const fn is_error(self) -> bool {
        self.origin().is_some()
    }

    /// Motion state that follows on `MoveComplete`.
    const fn after_move(self) -> Option<State> {
        use State::*;
        Some(match self {
            PreMoveXToSource => MoveToSourceYR,
            MoveToSourceYR => MoveToSource,
            MoveToSource => MoveIntoSource,
            MoveIntoSource => Aspirate,
            Aspirate => MoveOutOfSource,
            MoveOutOfSource => MoveFromSource,
            MoveFromSource => LockDestPlate,
            PreMoveXToDest => MoveToDestYR,
            MoveToDestYR => MoveToDest,
            MoveToDest => MoveIntoDest,
            MoveIntoDest => Dispense,
            Dispense => MoveOutOfDest,
            MoveOutOfDest => MoveFromDest,
            MoveFromDest => UnlockDestPlate,
            _ => return None,
        })
    }

    /// No further triggers are accepted except `Exit`.
    pub const fn is_terminal(self) -> bool {
        matches!(self, State::Done | State::Aborted)
    }
}

/// Transition trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Start,
    Success,
    SourceStageInUse,
    DestStageInUse,
    MoveComplete,
    MoveError,
    Retry,
    Abort,
    Done,
    Exit,
}

/// Result of a transition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// Transition succeeded, new state.
    Ok(State),
    /// Transition rejected, reason.
    Rejected(&'static str),
}

/// Current state plus the exit flag that stops the driving loop.
#[derive(Debug, Clone)]
pub struct TransferMachine {
    state: State,
    exit: bool,
}

impl Default for TransferMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferMachine {
    pub const fn new() -> Self {
        Self {
            state: State::Idle,
            exit: false,
        }
    }

    #[inline]
    pub const fn state(&self) -> State {
        self.state
    }

    /// Set once `Exit` has been fired from a terminal state.
    #[inline]
    pub const fn should_exit(&self) -> bool {
        self.exit
    }

    pub fn fire(&mut self, trigger: Trigger) -> TransitionResult {
        use State::*;
        use Trigger as T;

        let next = match (self.state, trigger) {
            (Idle, T::Start) => Some(Initialize),
            (Initialize, T::Success) => Some(TipsOn),

            // source stage free: go straight to it, otherwise pre-position X
            (TipsOn, T::Success) => Some(MoveToSourceYR),
            (TipsOn, T::SourceStageInUse) => Some(PreMoveXToSource),

            (LockDestPlate, T::Done) => Some(MoveToDestYR),
            (LockDestPlate, T::DestStageInUse) => Some(PreMoveXToDest),

            (UnlockDestPlate, T::Done) => Some(RunTipHandling),
            (RunTipHandling, T::Done) => Some(Done),
            (Aborting, T::Done) => Some(Aborted),

            (state, T::MoveComplete) => state.after_move(),
            (state, T::MoveError) => state.error_state(),
            (state, T::Retry) => state.origin(),

            // abort is observed between states; Idle never started anything
            (Idle, T::Abort) => Some(Aborted),
            (state, T::Abort) if !state.is_terminal() && state != Aborting => Some(Aborting),

            (state, T::Exit) if state.is_terminal() => {
                self.exit = true;
                return TransitionResult::Ok(state);
            }

            _ => None,
        };

        match next {
            Some(next) => {
                self.state = next;
                TransitionResult::Ok(next)
            }
            None => TransitionResult::Rejected(invalid_transition_reason(self.state, trigger)),
        }
    }
}

fn invalid_transition_reason(state: State, trigger: Trigger) -> &'static str {
    use State::*;
    match (state, trigger) {
        (Done | Aborted, _) => "terminal state: only Exit allowed",
        (Aborting, _) => "Aborting: only Done allowed",
        (s, _) if s.is_error() => "error state: only Retry or Abort allowed",
        (_, Trigger::Retry) => "Retry only allowed from an error state",
        (_, Trigger::MoveError) => "state has no paired error state",
        (_, Trigger::Exit) => "Exit only allowed from a terminal state",
        _ => "invalid trigger for current state",
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
