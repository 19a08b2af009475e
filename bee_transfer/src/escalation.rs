//! Operator error escalation.
//!
//! A state machine that cannot recover on its own posts an [`ErrorData`] and
//! blocks until one of the offered options is chosen. How the choice is
//! presented is up to the implementation: [`OperatorQueue`] exposes pending
//! errors to a front end, [`ConsoleEscalation`] prompts on a terminal and
//! [`AutoRetry`] answers without asking.

use crate::abort::AbortSignal;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::io::{self, BufRead, BufReader, Stderr, Stdin, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{info, warn};

/// Choice offered to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorOption {
    Retry,
    Abort,
}

impl ErrorOption {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Retry => "Try move again",
            Self::Abort => "Abort transfer",
        }
    }

    /// Console shortcut.
    pub const fn key(self) -> char {
        match self {
            Self::Retry => 'r',
            Self::Abort => 'a',
        }
    }

    pub fn from_key(key: char) -> Option<Self> {
        match key.to_ascii_lowercase() {
            'r' => Some(Self::Retry),
            'a' => Some(Self::Abort),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One escalated error and the options the operator may pick from.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorData {
    pub message: String,
    pub options: Vec<ErrorOption>,
}

impl ErrorData {
    pub fn new(message: impl Into<String>, options: impl Into<Vec<ErrorOption>>) -> Self {
        Self {
            message: message.into(),
            options: options.into(),
        }
    }

    pub fn offers(&self, option: ErrorOption) -> bool {
        self.options.contains(&option)
    }
}

/// Routes an unrecoverable error to a decision point and blocks for the answer.
pub trait ErrorEscalation: Send + Sync {
    /// Block until one of `error.options` is chosen and return it.
    fn add_error(&self, error: ErrorData) -> ErrorOption;
}

/// Answers `Retry` to every error, up to an optional limit after which it
/// answers `Abort`.
#[derive(Debug, Default)]
pub struct AutoRetry {
    limit: Option<usize>,
    count: AtomicUsize,
}

impl AutoRetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            count: AtomicUsize::new(0),
        }
    }

    /// Number of errors seen so far.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl ErrorEscalation for AutoRetry {
    fn add_error(&self, error: ErrorData) -> ErrorOption {
        let seen = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        let exhausted = self.limit.is_some_and(|limit| seen > limit);
        if exhausted && error.offers(ErrorOption::Abort) {
            warn!("Retry limit reached, aborting: {}", error.message);
            ErrorOption::Abort
        } else {
            info!("Auto-retrying: {}", error.message);
            ErrorOption::Retry
        }
    }
}

/// Handle to one pending error in an [`OperatorQueue`].
pub type ErrorId = u64;

#[derive(Debug, Default)]
struct QueueState {
    next_id: ErrorId,
    pending: Vec<(ErrorId, ErrorData)>,
    resolved: Vec<(ErrorId, ErrorOption)>,
}

/// Errors waiting for an operator decision.
///
/// `add_error` blocks the calling state machine until a front end calls
/// [`resolve`](Self::resolve), or answers `Abort` once the abort signal is
/// raised.
#[derive(Debug)]
pub struct OperatorQueue {
    state: Mutex<QueueState>,
    changed: Condvar,
    abort: AbortSignal,
    poll_interval: Duration,
}

impl OperatorQueue {
    pub fn new(abort: AbortSignal, poll_interval: Duration) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            changed: Condvar::new(),
            abort,
            poll_interval,
        }
    }

    /// Errors still waiting for a decision, oldest first.
    pub fn pending(&self) -> Vec<(ErrorId, ErrorData)> {
        self.state.lock().pending.clone()
    }

    /// Answer a pending error. Returns `false` if the id is unknown or the
    /// option was not offered.
    pub fn resolve(&self, id: ErrorId, option: ErrorOption) -> bool {
        let mut state = self.state.lock();
        let Some(index) = state.pending.iter().position(|(pending, _)| *pending == id) else {
            return false;
        };
        if !state.pending[index].1.offers(option) {
            return false;
        }
        state.pending.remove(index);
        state.resolved.push((id, option));
        drop(state);
        self.changed.notify_all();
        true
    }
}

impl ErrorEscalation for OperatorQueue {
    fn add_error(&self, error: ErrorData) -> ErrorOption {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        warn!("Operator decision needed ({}): {}", id, error.message);
        state.pending.push((id, error));

        loop {
            if let Some(index) = state.resolved.iter().position(|(r, _)| *r == id) {
                let (_, option) = state.resolved.remove(index);
                info!("Operator chose '{}' for error {}", option, id);
                return option;
            }
            if self.abort.is_aborted() {
                state.pending.retain(|(pending, _)| *pending != id);
                return ErrorOption::Abort;
            }
            self.changed.wait_for(&mut state, self.poll_interval);
        }
    }
}

/// Prompts on a line-based console. One prompt at a time; other machines
/// wait their turn. A closed input answers `Abort` when it is offered.
pub struct ConsoleEscalation<R, W> {
    io: Mutex<(R, W)>,
}

impl ConsoleEscalation<BufReader<Stdin>, Stderr> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(io::stdin()), io::stderr())
    }
}

impl<R: BufRead, W: Write> ConsoleEscalation<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            io: Mutex::new((input, output)),
        }
    }

    pub fn into_inner(self) -> (R, W) {
        self.io.into_inner()
    }
}

impl<R: BufRead + Send, W: Write + Send> ErrorEscalation for ConsoleEscalation<R, W> {
    fn add_error(&self, error: ErrorData) -> ErrorOption {
        let mut io = self.io.lock();
        let (input, output) = &mut *io;
        warn!("Operator decision needed: {}", error.message);

        loop {
            let _ = writeln!(output, "\n{}", error.message);
            for option in &error.options {
                let _ = writeln!(output, "  [{}] {}", option.key(), option);
            }
            let _ = write!(output, "> ");
            let _ = output.flush();

            let mut line = String::new();
            match input.read_line(&mut line) {
                Ok(0) | Err(_) => {
                    let fallback = if error.offers(ErrorOption::Abort) {
                        ErrorOption::Abort
                    } else {
                        error.options.first().copied().unwrap_or(ErrorOption::Abort)
                    };
                    warn!("Console closed, answering '{}'", fallback);
                    return fallback;
                }
                Ok(_) => {}
            }

            match line.trim().chars().next().and_then(ErrorOption::from_key) {
                Some(option) if error.offers(option) => {
                    info!("Operator chose '{}'", option);
                    return option;
                }
                _ => {
                    let _ = writeln!(output, "Unrecognised choice '{}'", line.trim());
                }
            }
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
