//! Transfer state machine.
//!
//! - [`machine`] - state and trigger vocabulary, transition table
//! - [`geometry`] - Z/W set points fixed at `Initialize`
//! - [`transfer`] - the runner that executes one tip assignment

pub mod geometry;
pub mod machine;
pub mod transfer;

pub use geometry::{ChannelGeometry, GeometryInput, PreCalculatedGeometry};
pub use machine::{State, TransferMachine, TransitionResult, Trigger};
pub use transfer::{TipAssignment, TransferContext, TransferStateMachine};
