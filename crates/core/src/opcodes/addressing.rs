//! Segment override prefixes (CS: DS: ES: SS: FS: GS:)

use super::{later_model, Instruction, OpCode};
use crate::cpu_80x86::{CpuModel, Intel80x86};
use crate::error::CpuError;
use crate::register::SegmentRegister;
use crate::system::IbmPc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Runs exactly one instruction with its default data segment replaced.
///
/// The previous override is put back whether or not the wrapped
/// instruction succeeds, so nothing leaks into the next instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentOverride {
    pub segment: SegmentRegister,
    pub instruction: Box<OpCode>,
}

impl SegmentOverride {
    pub fn new(segment: SegmentRegister, instruction: OpCode) -> Result<Self, CpuError> {
        let op = Self {
            segment,
            instruction: Box::new(instruction),
        };
        op.validate()?;
        Ok(op)
    }
}

impl Instruction for SegmentOverride {
    fn mnemonic(&self) -> &'static str {
        self.instruction.mnemonic()
    }

    fn execute(&self, system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
        let saved = cpu.segment_override();
        cpu.set_segment_override(Some(self.segment));
        let result = cpu.execute(system, &self.instruction);
        cpu.set_segment_override(saved);
        result
    }

    fn validate(&self) -> Result<(), CpuError> {
        self.instruction.validate()
    }

    fn required_model(&self) -> CpuModel {
        let prefix = match self.segment {
            SegmentRegister::FS | SegmentRegister::GS => CpuModel::Intel80386,
            _ => CpuModel::Intel8086,
        };
        later_model(prefix, self.instruction.required_model())
    }
}

impl fmt::Display for SegmentOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.segment, self.instruction)
    }
}
