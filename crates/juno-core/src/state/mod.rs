//! Architectural CPU state: register file and run state.

/// Register file with the PC and data-base aliases.
pub mod registers;
mod run_state;

pub use registers::{
    RegisterFile, DATA_BASE_REGISTER, DEFAULT_REGISTER_COUNT, MIN_REGISTER_COUNT, PC_REGISTER,
};
pub use run_state::{RunState, StallReason};
