//! Core 80x86 emulator primitives and traits.
//!
//! The CPU ([`cpu_80x86::Intel80x86`]) owns registers, flags and memory and
//! runs decoded [`opcodes::OpCode`] values against a machine context
//! ([`system::IbmPc`]) holding the interrupt table, I/O ports and console.

pub mod cpu_80x86;
pub mod error;
pub mod flags;
pub mod interrupts;
pub mod logging;
pub mod memory;
pub mod opcodes;
pub mod operand;
pub mod ports;
pub mod program;
pub mod register;
mod stack;
pub mod system;

#[cfg(test)]
mod cpu_80x86_tests;

pub use cpu_80x86::{CpuModel, Intel80x86, RunOutcome};
pub use error::CpuError;

use serde_json::Value;

/// A high-level System trait tying components together.
pub trait System {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Reset to initial power-on state
    fn reset(&mut self);

    /// Execute exactly one instruction
    fn step(&mut self) -> Result<(), Self::Error>;

    /// Execute until the program halts, completes or fails
    fn run(&mut self) -> Result<RunOutcome, Self::Error>;

    /// Return a JSON-serializable save state for debugging.
    /// Note: Save states should NOT include the loaded program.
    /// Only save machine state (registers, counters, exit code).
    fn save_state(&self) -> Value;

    /// Load a JSON save state.
    fn load_state(&mut self, v: &Value) -> Result<(), serde_json::Error>;

    /// Check if this system supports save/load state functionality
    fn supports_save_states(&self) -> bool {
        false // Default: no save state support
    }
}
