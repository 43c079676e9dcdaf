//! Error type shared by every instruction and subsystem of the core.

use crate::cpu_80x86::CpuModel;
use thiserror::Error;

/// Failure raised while constructing or executing an instruction.
///
/// Every failure is a hard stop of the current execution stream: the fetch
/// loop rewinds IP to the faulting instruction and surfaces the error to the
/// host without retrying.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    /// Instruction shape that no 80x86 encoding can express
    #[error("illegal instruction: {0}")]
    IllegalInstruction(String),

    /// An operand used in a position its variant does not support
    #[error("invalid operand {operand} for {mnemonic}: {reason}")]
    InvalidOperand {
        mnemonic: &'static str,
        operand: String,
        reason: &'static str,
    },

    /// Attempt to write through an immediate or computed operand
    #[error("operand {0} is not settable")]
    OperandNotSettable(String),

    /// Architecturally valid instruction that this core does not implement
    #[error("unimplemented instruction: {0}")]
    UnimplementedInstruction(&'static str),

    /// `INT n` with no handler registered under `n`
    #[error("unhandled interrupt {0:02X}h")]
    UnhandledInterrupt(u8),

    /// A registered handler was asked for a sub-function it does not provide
    #[error("interrupt {vector:02X}h has no service {function:02X}h")]
    UnsupportedService { vector: u8, function: u8 },

    /// Pop against an exhausted stack
    #[error("stack underflow at SS:SP={ss:04X}:{sp:04X}")]
    StackUnderflow { ss: u16, sp: u16 },

    /// Divide by zero or quotient overflow with no INT 00h handler installed
    #[error("divide error")]
    DivideError,

    /// Instruction introduced after the selected CPU model
    #[error("{mnemonic} requires an {} (running as {})", .required.name(), .model.name())]
    UnsupportedModel {
        mnemonic: &'static str,
        required: CpuModel,
        model: CpuModel,
    },

    /// No decoded instruction lives at CS:IP
    #[error("no instruction at {cs:04X}:{ip:04X}")]
    InvalidInstructionPointer { cs: u16, ip: u16 },

    /// Host-imposed instruction budget ran out
    #[error("step limit of {0} instructions exceeded")]
    StepLimitExceeded(u64),
}

impl CpuError {
    /// Shorthand for an [`CpuError::InvalidOperand`] built from any displayable operand
    pub fn invalid_operand(
        mnemonic: &'static str,
        operand: &impl std::fmt::Display,
        reason: &'static str,
    ) -> Self {
        CpuError::InvalidOperand {
            mnemonic,
            operand: operand.to_string(),
            reason,
        }
    }
}
