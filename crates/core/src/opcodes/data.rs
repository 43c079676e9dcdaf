//! Data movement. None of these touch FLAGS except SAHF.

use super::{
    later_model, operands_model, require_compatible_sizes, require_destination,
    require_general_register, require_memory, require_not_both_memory, require_word_or_wider,
    write_instruction, Instruction,
};
use crate::cpu_80x86::{CpuModel, Intel80x86};
use crate::error::CpuError;
use crate::operand::{Operand, OperandSize};
use crate::register::{Register, SegmentRegister};
use crate::system::IbmPc;
use serde::{Deserialize, Serialize};
use std::fmt;

fn is_segment(op: &Operand) -> bool {
    op.as_register().is_some_and(Register::is_segment)
}

/// MOV dest,src
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mov {
    pub dest: Operand,
    pub src: Operand,
}

impl Mov {
    pub fn new(dest: Operand, src: Operand) -> Result<Self, CpuError> {
        let op = Self { dest, src };
        op.validate()?;
        Ok(op)
    }
}

impl Instruction for Mov {
    fn mnemonic(&self) -> &'static str {
        "MOV"
    }

    fn execute(&self, _system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
        let value = self.src.value_as(cpu, self.dest.size());
        self.dest.set(cpu, value as i64)
    }

    fn validate(&self) -> Result<(), CpuError> {
        require_destination("MOV", &self.dest)?;
        require_not_both_memory("MOV", &self.dest, &self.src)?;
        require_compatible_sizes("MOV", &self.dest, &self.src)?;
        if self.dest.as_register() == Some(Register::CS) {
            return Err(CpuError::invalid_operand("MOV", &self.dest, "CS cannot be loaded by MOV"));
        }
        if matches!(self.dest.as_register(), Some(Register::IP | Register::FLAGS)) {
            return Err(CpuError::invalid_operand("MOV", &self.dest, "not addressable by MOV"));
        }
        if is_segment(&self.dest) && (self.src.is_immediate() || is_segment(&self.src)) {
            return Err(CpuError::IllegalInstruction(format!(
                "MOV {},{}: segment registers load only from a register or memory",
                self.dest, self.src
            )));
        }
        Ok(())
    }

    fn required_model(&self) -> CpuModel {
        operands_model(&[&self.dest, &self.src])
    }
}

impl fmt::Display for Mov {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_instruction(f, "MOV", &[&self.dest, &self.src])
    }
}

/// XCHG a,b
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Xchg {
    pub a: Operand,
    pub b: Operand,
}

impl Xchg {
    pub fn new(a: Operand, b: Operand) -> Result<Self, CpuError> {
        let op = Self { a, b };
        op.validate()?;
        Ok(op)
    }
}

impl Instruction for Xchg {
    fn mnemonic(&self) -> &'static str {
        "XCHG"
    }

    fn execute(&self, _system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
        let a = self.a.get_unsigned(cpu);
        let b = self.b.get_unsigned(cpu);
        self.a.set(cpu, b as i64)?;
        self.b.set(cpu, a as i64)
    }

    fn validate(&self) -> Result<(), CpuError> {
        require_destination("XCHG", &self.a)?;
        require_destination("XCHG", &self.b)?;
        require_not_both_memory("XCHG", &self.a, &self.b)?;
        for op in [&self.a, &self.b] {
            if op.as_register().is_some() {
                require_general_register("XCHG", op)?;
            }
        }
        require_compatible_sizes("XCHG", &self.a, &self.b)
    }

    fn required_model(&self) -> CpuModel {
        operands_model(&[&self.a, &self.b])
    }
}

impl fmt::Display for Xchg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_instruction(f, "XCHG", &[&self.a, &self.b])
    }
}

/// LEA reg,mem: the effective offset, no memory access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lea {
    pub dest: Operand,
    pub src: Operand,
}

impl Lea {
    pub fn new(dest: Operand, src: Operand) -> Result<Self, CpuError> {
        let op = Self { dest, src };
        op.validate()?;
        Ok(op)
    }
}

impl Instruction for Lea {
    fn mnemonic(&self) -> &'static str {
        "LEA"
    }

    fn execute(&self, _system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
        let mem = require_memory("LEA", &self.src)?;
        let offset = mem.offset(cpu);
        self.dest.set(cpu, offset as i64)
    }

    fn validate(&self) -> Result<(), CpuError> {
        require_general_register("LEA", &self.dest)?;
        require_word_or_wider("LEA", &self.dest)?;
        require_memory("LEA", &self.src).map(|_| ())
    }

    fn required_model(&self) -> CpuModel {
        operands_model(&[&self.dest])
    }
}

impl fmt::Display for Lea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_instruction(f, "LEA", &[&self.dest, &self.src])
    }
}

/// LDS/LES/LSS/LFS/LGS reg,mem: load a far pointer (offset then segment)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadFarPointer {
    pub segment: SegmentRegister,
    pub dest: Operand,
    pub src: Operand,
}

impl LoadFarPointer {
    pub fn new(segment: SegmentRegister, dest: Operand, src: Operand) -> Result<Self, CpuError> {
        let op = Self { segment, dest, src };
        op.validate()?;
        Ok(op)
    }
}

impl Instruction for LoadFarPointer {
    fn mnemonic(&self) -> &'static str {
        match self.segment {
            SegmentRegister::DS => "LDS",
            SegmentRegister::ES => "LES",
            SegmentRegister::SS => "LSS",
            SegmentRegister::FS => "LFS",
            SegmentRegister::GS => "LGS",
            SegmentRegister::CS => "LCS",
        }
    }

    fn execute(&self, _system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
        let mem = require_memory(self.mnemonic(), &self.src)?;
        let segment = mem.segment_value(cpu);
        let offset = mem.offset(cpu);
        let width = self.dest.size();
        let pointer = cpu.memory.read(segment, offset, width);
        let selector = cpu.memory.get_word(segment, offset.wrapping_add(width.bytes()));

        self.dest.set(cpu, pointer as i64)?;
        cpu.set_register(self.segment.register(), selector as u32);
        Ok(())
    }

    fn validate(&self) -> Result<(), CpuError> {
        let mnemonic = self.mnemonic();
        if self.segment == SegmentRegister::CS {
            return Err(CpuError::IllegalInstruction("LCS does not exist".to_string()));
        }
        require_general_register(mnemonic, &self.dest)?;
        require_word_or_wider(mnemonic, &self.dest)?;
        require_memory(mnemonic, &self.src).map(|_| ())
    }

    fn required_model(&self) -> CpuModel {
        let base = match self.segment {
            SegmentRegister::DS | SegmentRegister::ES => CpuModel::Intel8086,
            _ => CpuModel::Intel80386,
        };
        later_model(base, operands_model(&[&self.dest]))
    }
}

impl fmt::Display for LoadFarPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_instruction(f, self.mnemonic(), &[&self.dest, &self.src])
    }
}

/// MOVSX/MOVZX reg,r/m (80386)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveExtend {
    pub signed: bool,
    pub dest: Operand,
    pub src: Operand,
}

impl MoveExtend {
    pub fn new(signed: bool, dest: Operand, src: Operand) -> Result<Self, CpuError> {
        let op = Self { signed, dest, src };
        op.validate()?;
        Ok(op)
    }
}

impl Instruction for MoveExtend {
    fn mnemonic(&self) -> &'static str {
        if self.signed {
            "MOVSX"
        } else {
            "MOVZX"
        }
    }

    fn execute(&self, _system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
        let raw = self.src.get_unsigned(cpu);
        let value = if self.signed {
            self.src.size().sign_extend(raw)
        } else {
            raw as i64
        };
        self.dest.set(cpu, value)
    }

    fn validate(&self) -> Result<(), CpuError> {
        let mnemonic = self.mnemonic();
        require_general_register(mnemonic, &self.dest)?;
        if self.src.is_immediate() || self.src.size() >= self.dest.size() {
            return Err(CpuError::invalid_operand(
                mnemonic,
                &self.src,
                "source must be a narrower register or memory",
            ));
        }
        Ok(())
    }

    fn required_model(&self) -> CpuModel {
        CpuModel::Intel80386
    }
}

impl fmt::Display for MoveExtend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_instruction(f, self.mnemonic(), &[&self.dest, &self.src])
    }
}

/// Operand-less data instructions working on fixed registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImpliedData {
    /// AL sign-extended into AX
    Cbw,
    /// AX sign-extended into DX:AX
    Cwd,
    /// AX sign-extended into EAX
    Cwde,
    /// EAX sign-extended into EDX:EAX
    Cdq,
    /// AH = SF ZF - AF - PF - CF
    Lahf,
    /// Flags low byte = AH
    Sahf,
    /// AL = [DS:BX + AL]
    Xlat,
}

impl Instruction for ImpliedData {
    fn mnemonic(&self) -> &'static str {
        match self {
            ImpliedData::Cbw => "CBW",
            ImpliedData::Cwd => "CWD",
            ImpliedData::Cwde => "CWDE",
            ImpliedData::Cdq => "CDQ",
            ImpliedData::Lahf => "LAHF",
            ImpliedData::Sahf => "SAHF",
            ImpliedData::Xlat => "XLAT",
        }
    }

    fn execute(&self, _system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
        match self {
            ImpliedData::Cbw => {
                let al = cpu.get_register(Register::AL);
                cpu.set_register(Register::AX, OperandSize::Byte.sign_extend(al) as u32);
            }
            ImpliedData::Cwd => {
                let ax = cpu.get_register(Register::AX);
                let dx = if ax & 0x8000 != 0 { 0xFFFF } else { 0 };
                cpu.set_register(Register::DX, dx);
            }
            ImpliedData::Cwde => {
                let ax = cpu.get_register(Register::AX);
                cpu.set_register(Register::EAX, OperandSize::Word.sign_extend(ax) as u32);
            }
            ImpliedData::Cdq => {
                let eax = cpu.get_register(Register::EAX);
                let edx = if eax & 0x8000_0000 != 0 { 0xFFFF_FFFF } else { 0 };
                cpu.set_register(Register::EDX, edx);
            }
            ImpliedData::Lahf => {
                let low = cpu.flags().low_byte();
                cpu.set_register(Register::AH, low as u32);
            }
            ImpliedData::Sahf => {
                let ah = cpu.get_register(Register::AH) as u8;
                cpu.flags_mut().set_low_byte(ah);
            }
            ImpliedData::Xlat => {
                let segment = cpu.effective_segment(SegmentRegister::DS);
                let offset = cpu
                    .registers
                    .word(Register::BX)
                    .wrapping_add(cpu.get_register(Register::AL) as u16);
                let value = cpu.memory.get_byte(segment, offset);
                cpu.set_register(Register::AL, value as u32);
            }
        }
        Ok(())
    }

    fn required_model(&self) -> CpuModel {
        match self {
            ImpliedData::Cwde | ImpliedData::Cdq => CpuModel::Intel80386,
            _ => CpuModel::Intel8086,
        }
    }
}

impl fmt::Display for ImpliedData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}
