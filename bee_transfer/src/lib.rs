//! # Bumblebee Transfer Library
//!
//! Liquid transfers on a dual-tip pipettor: two channels (X/Z/W) working
//! over plate stages (Y/R). A transfer aspirates from a source well and
//! dispenses into one or more destination wells. Two transfers whose wells
//! line up under both tips at some stage angle run together.
//!
//! # Module Structure
//!
//! - [`state`] - Transfer state machine, geometry and runner
//! - [`arbiter`] - Stage and channel leases shared by all threads
//! - [`motion`] - Grouped channel moves
//! - [`scheduler`] - Destination/source plate schedulers and tip pairing
//! - [`tips`] - Tip wash/change cycle
//! - [`escalation`] - Operator decisions on unrecoverable errors
//! - [`plate_handler`] - Plate robot interface
//! - [`config`] - Protocol file loading
//!
//! # Threads
//!
//! ```text
//!   main ──► destination thread (one plate at a time)
//!                 │
//!                 ├─► source loader / worker ──► TransferStateMachine
//!                 └─► source loader / worker ──► TransferStateMachine
//!                              │                        │
//!                              └──── ResourceArbiter ◄──┘
//! ```

pub mod abort;
pub mod arbiter;
pub mod config;
pub mod error;
pub mod escalation;
pub mod motion;
pub mod plate_handler;
pub mod scheduler;
pub mod state;
pub mod tips;

pub use crate::abort::AbortSignal;
pub use crate::arbiter::{ResourceArbiter, StageMode, StageStatus};
pub use crate::config::{Protocol, load_protocol, load_protocol_from_str};
pub use crate::error::{ArbiterError, SchedulerError, TransferError};
pub use crate::escalation::{AutoRetry, ConsoleEscalation, ErrorEscalation, ErrorOption, OperatorQueue};
pub use crate::plate_handler::{PlateHandler, SimulatedPlateHandler};
pub use crate::scheduler::{RunReport, Scheduler};
pub use crate::state::{TipAssignment, TransferContext, TransferStateMachine};
