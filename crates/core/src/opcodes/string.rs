//! String instructions: MOVS, CMPS, SCAS, LODS, STOS and the REP prefixes
//!
//! The source operand is at DS:SI (the segment honours an override prefix),
//! the destination at ES:DI (never overridden). After each element SI/DI
//! move by the element width, forward when DF=0 and backward when DF=1.
//! A repeated instruction runs its whole count inside one `execute`.

use super::Instruction;
use crate::cpu_80x86::{CpuModel, Intel80x86};
use crate::error::CpuError;
use crate::logging::{log, LogCategory, LogLevel};
use crate::operand::OperandSize;
use crate::register::{Register, SegmentRegister};
use crate::system::IbmPc;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Repeat {
    None,
    /// Repeat CX times (REPE for CMPS/SCAS)
    Rep,
    /// Repeat while equal (ZF=1)
    Repe,
    /// Repeat while not equal (ZF=0)
    Repne,
}

impl Repeat {
    fn prefix(self, compares: bool) -> Option<&'static str> {
        match self {
            Repeat::None => None,
            Repeat::Rep if compares => Some("REPE"),
            Repeat::Rep => Some("REP"),
            Repeat::Repe if compares => Some("REPE"),
            Repeat::Repe => Some("REP"),
            Repeat::Repne if compares => Some("REPNE"),
            Repeat::Repne => Some("REP"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StringKind {
    Movs,
    Cmps,
    Scas,
    Lods,
    Stos,
}

impl StringKind {
    /// CMPS and SCAS set flags, so REPE/REPNE test ZF after each element
    fn compares(self) -> bool {
        matches!(self, StringKind::Cmps | StringKind::Scas)
    }

    fn uses_source(self) -> bool {
        matches!(self, StringKind::Movs | StringKind::Cmps | StringKind::Lods)
    }

    fn uses_destination(self) -> bool {
        !matches!(self, StringKind::Lods)
    }
}

/// MOVS/CMPS/SCAS/LODS/STOS with an optional repeat prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringOp {
    pub kind: StringKind,
    pub size: OperandSize,
    pub repeat: Repeat,
}

impl StringOp {
    pub fn new(kind: StringKind, size: OperandSize, repeat: Repeat) -> Self {
        Self { kind, size, repeat }
    }

    fn step(&self, cpu: &Intel80x86) -> i64 {
        let width = self.size.bytes() as i64;
        if cpu.flags().direction() {
            -width
        } else {
            width
        }
    }

    /// One element, SI/DI advanced afterwards
    fn execute_once(&self, cpu: &mut Intel80x86) {
        let size = self.size;
        let source_segment = cpu.effective_segment(SegmentRegister::DS);
        let si = cpu.registers.word(Register::SI);
        let es = cpu.registers.word(Register::ES);
        let di = cpu.registers.word(Register::DI);
        let accumulator = Register::accumulator(size);

        match self.kind {
            StringKind::Movs => {
                let value = cpu.memory.read(source_segment, si, size);
                cpu.memory.write(es, di, size, value);
            }
            StringKind::Cmps => {
                let a = cpu.memory.read(source_segment, si, size);
                let b = cpu.memory.read(es, di, size);
                cpu.flags_mut().compare(a, b, size);
            }
            StringKind::Scas => {
                let a = cpu.get_register(accumulator);
                let b = cpu.memory.read(es, di, size);
                cpu.flags_mut().compare(a, b, size);
            }
            StringKind::Lods => {
                let value = cpu.memory.read(source_segment, si, size);
                cpu.set_register(accumulator, value);
            }
            StringKind::Stos => {
                let value = cpu.get_register(accumulator);
                cpu.memory.write(es, di, size, value);
            }
        }

        let step = self.step(cpu);
        if self.kind.uses_source() {
            cpu.registers.add(Register::SI, step);
        }
        if self.kind.uses_destination() {
            cpu.registers.add(Register::DI, step);
        }
    }

    /// Run up to `count` elements, decrementing CX after each. Compare
    /// forms stop early once ZF contradicts the prefix.
    pub fn execute_en_mass(&self, cpu: &mut Intel80x86, count: u32) {
        let until_equal = self.repeat == Repeat::Repne;
        for _ in 0..count {
            self.execute_once(cpu);
            cpu.registers.add(Register::CX, -1);
            if self.kind.compares() && cpu.flags().zero() == until_equal {
                break;
            }
        }
    }
}

impl Instruction for StringOp {
    fn mnemonic(&self) -> &'static str {
        match (self.kind, self.size) {
            (StringKind::Movs, OperandSize::Byte) => "MOVSB",
            (StringKind::Movs, OperandSize::Word) => "MOVSW",
            (StringKind::Movs, OperandSize::DoubleWord) => "MOVSD",
            (StringKind::Cmps, OperandSize::Byte) => "CMPSB",
            (StringKind::Cmps, OperandSize::Word) => "CMPSW",
            (StringKind::Cmps, OperandSize::DoubleWord) => "CMPSD",
            (StringKind::Scas, OperandSize::Byte) => "SCASB",
            (StringKind::Scas, OperandSize::Word) => "SCASW",
            (StringKind::Scas, OperandSize::DoubleWord) => "SCASD",
            (StringKind::Lods, OperandSize::Byte) => "LODSB",
            (StringKind::Lods, OperandSize::Word) => "LODSW",
            (StringKind::Lods, OperandSize::DoubleWord) => "LODSD",
            (StringKind::Stos, OperandSize::Byte) => "STOSB",
            (StringKind::Stos, OperandSize::Word) => "STOSW",
            (StringKind::Stos, OperandSize::DoubleWord) => "STOSD",
        }
    }

    fn execute(&self, _system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
        if self.repeat == Repeat::None {
            self.execute_once(cpu);
        } else {
            let count = cpu.registers.word(Register::CX) as u32;
            self.execute_en_mass(cpu, count);
        }
        Ok(())
    }

    fn required_model(&self) -> CpuModel {
        match self.size {
            OperandSize::DoubleWord => CpuModel::Intel80386,
            _ => CpuModel::Intel8086,
        }
    }
}

impl fmt::Display for StringOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = self.repeat.prefix(self.kind.compares()) {
            write!(f, "{} ", prefix)?;
        }
        f.write_str(self.mnemonic())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StringIoKind {
    Ins,
    Outs,
}

/// INS/OUTS. Recognised and model-checked, but performs no transfer yet;
/// every execution is reported at `Warn` under the stubs category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringIo {
    pub kind: StringIoKind,
    pub size: OperandSize,
    pub repeat: Repeat,
}

impl StringIo {
    pub fn new(kind: StringIoKind, size: OperandSize, repeat: Repeat) -> Self {
        Self { kind, size, repeat }
    }
}

impl Instruction for StringIo {
    fn mnemonic(&self) -> &'static str {
        match (self.kind, self.size) {
            (StringIoKind::Ins, OperandSize::Byte) => "INSB",
            (StringIoKind::Ins, OperandSize::Word) => "INSW",
            (StringIoKind::Ins, OperandSize::DoubleWord) => "INSD",
            (StringIoKind::Outs, OperandSize::Byte) => "OUTSB",
            (StringIoKind::Outs, OperandSize::Word) => "OUTSW",
            (StringIoKind::Outs, OperandSize::DoubleWord) => "OUTSD",
        }
    }

    fn execute(&self, _system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
        log(LogCategory::Stubs, LogLevel::Warn, || {
            format!(
                "{} at {:04X}:{:04X} not implemented, skipped",
                self,
                cpu.registers.word(Register::CS),
                cpu.ip()
            )
        });
        Ok(())
    }

    fn required_model(&self) -> CpuModel {
        match self.size {
            OperandSize::DoubleWord => CpuModel::Intel80386,
            _ => CpuModel::Intel80186,
        }
    }
}

impl fmt::Display for StringIo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = self.repeat.prefix(false) {
            write!(f, "{} ", prefix)?;
        }
        f.write_str(self.mnemonic())
    }
}
