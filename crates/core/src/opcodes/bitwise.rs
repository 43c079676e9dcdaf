//! Logic, shifts/rotates, bit test and bit scan

use super::{
    later_model, operands_model, require_compatible_sizes, require_destination,
    require_general_register, require_not_both_memory, require_word_or_wider, write_instruction,
    Instruction,
};
use crate::cpu_80x86::{CpuModel, Intel80x86};
use crate::error::CpuError;
use crate::flags::Flag;
use crate::operand::{Operand, OperandSize};
use crate::register::Register;
use crate::system::IbmPc;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicKind {
    And,
    Or,
    Xor,
    /// AND without writing the destination
    Test,
}

/// AND/OR/XOR/TEST. CF and OF cleared; SF, ZF, PF from the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Logic {
    pub kind: LogicKind,
    pub dest: Operand,
    pub src: Operand,
}

impl Logic {
    pub fn new(kind: LogicKind, dest: Operand, src: Operand) -> Result<Self, CpuError> {
        let op = Self { kind, dest, src };
        op.validate()?;
        Ok(op)
    }
}

impl Instruction for Logic {
    fn mnemonic(&self) -> &'static str {
        match self.kind {
            LogicKind::And => "AND",
            LogicKind::Or => "OR",
            LogicKind::Xor => "XOR",
            LogicKind::Test => "TEST",
        }
    }

    fn execute(&self, _system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
        let size = self.dest.size();
        let a = self.dest.get_unsigned(cpu);
        let b = self.src.value_as(cpu, size);
        let result = match self.kind {
            LogicKind::And | LogicKind::Test => a & b,
            LogicKind::Or => a | b,
            LogicKind::Xor => a ^ b,
        };
        cpu.flags_mut().update_logic(result, size);
        if self.kind == LogicKind::Test {
            return Ok(());
        }
        self.dest.set(cpu, result as i64)
    }

    fn validate(&self) -> Result<(), CpuError> {
        let mnemonic = self.mnemonic();
        require_destination(mnemonic, &self.dest)?;
        require_not_both_memory(mnemonic, &self.dest, &self.src)?;
        require_compatible_sizes(mnemonic, &self.dest, &self.src)
    }

    fn required_model(&self) -> CpuModel {
        operands_model(&[&self.dest, &self.src])
    }
}

impl fmt::Display for Logic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_instruction(f, self.mnemonic(), &[&self.dest, &self.src])
    }
}

/// NOT: one's complement within the operand width, no flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Not {
    pub dest: Operand,
}

impl Not {
    pub fn new(dest: Operand) -> Result<Self, CpuError> {
        let op = Self { dest };
        op.validate()?;
        Ok(op)
    }
}

impl Instruction for Not {
    fn mnemonic(&self) -> &'static str {
        "NOT"
    }

    fn execute(&self, _system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
        let value = !self.dest.get_unsigned(cpu) & self.dest.size().mask();
        self.dest.set(cpu, value as i64)
    }

    fn validate(&self) -> Result<(), CpuError> {
        require_destination("NOT", &self.dest)
    }

    fn required_model(&self) -> CpuModel {
        operands_model(&[&self.dest])
    }
}

impl fmt::Display for Not {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_instruction(f, "NOT", &[&self.dest])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShiftKind {
    Rol,
    Ror,
    Rcl,
    Rcr,
    Shl,
    Sal,
    Shr,
    Sar,
}

impl ShiftKind {
    fn mnemonic(self) -> &'static str {
        match self {
            ShiftKind::Rol => "ROL",
            ShiftKind::Ror => "ROR",
            ShiftKind::Rcl => "RCL",
            ShiftKind::Rcr => "RCR",
            ShiftKind::Shl => "SHL",
            ShiftKind::Sal => "SAL",
            ShiftKind::Shr => "SHR",
            ShiftKind::Sar => "SAR",
        }
    }

    fn is_rotate(self) -> bool {
        matches!(
            self,
            ShiftKind::Rol | ShiftKind::Ror | ShiftKind::Rcl | ShiftKind::Rcr
        )
    }
}

/// Shift or rotate `dest` by CL or an immediate count.
///
/// The count is masked to 5 bits and a zero count changes nothing. CF takes
/// the last bit shifted out. OF is only defined for a count of 1; for
/// larger counts it is left as is. Shifts update SF, ZF and PF, rotates do
/// not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shift {
    pub kind: ShiftKind,
    pub dest: Operand,
    pub count: Operand,
}

impl Shift {
    pub fn new(kind: ShiftKind, dest: Operand, count: Operand) -> Result<Self, CpuError> {
        let op = Self { kind, dest, count };
        op.validate()?;
        Ok(op)
    }

    fn is_single(&self) -> bool {
        matches!(self.count, Operand::Immediate(imm) if imm.raw() == 1)
    }
}

impl Instruction for Shift {
    fn mnemonic(&self) -> &'static str {
        self.kind.mnemonic()
    }

    fn execute(&self, _system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
        let count = self.count.get_unsigned(cpu) & 0x1F;
        if count == 0 {
            return Ok(());
        }

        let size = self.dest.size();
        let mask = size.mask();
        let msb = size.sign_bit();
        let original = self.dest.get_unsigned(cpu);
        let mut value = original;
        let mut carry = cpu.flags().carry();

        for _ in 0..count {
            match self.kind {
                ShiftKind::Rol => {
                    carry = value & msb != 0;
                    value = ((value << 1) | carry as u32) & mask;
                }
                ShiftKind::Ror => {
                    carry = value & 1 != 0;
                    value = (value >> 1) | if carry { msb } else { 0 };
                }
                ShiftKind::Rcl => {
                    let out = value & msb != 0;
                    value = ((value << 1) | carry as u32) & mask;
                    carry = out;
                }
                ShiftKind::Rcr => {
                    let out = value & 1 != 0;
                    value = (value >> 1) | if carry { msb } else { 0 };
                    carry = out;
                }
                ShiftKind::Shl | ShiftKind::Sal => {
                    carry = value & msb != 0;
                    value = (value << 1) & mask;
                }
                ShiftKind::Shr => {
                    carry = value & 1 != 0;
                    value >>= 1;
                }
                ShiftKind::Sar => {
                    carry = value & 1 != 0;
                    value = (value >> 1) | (value & msb);
                }
            }
        }

        let flags = cpu.flags_mut();
        flags.set(Flag::Carry, carry);
        if count == 1 {
            let result_msb = value & msb != 0;
            let overflow = match self.kind {
                ShiftKind::Rol | ShiftKind::Rcl | ShiftKind::Shl | ShiftKind::Sal => {
                    result_msb != carry
                }
                ShiftKind::Ror | ShiftKind::Rcr => result_msb != ((value << 1) & msb != 0),
                ShiftKind::Shr => original & msb != 0,
                ShiftKind::Sar => false,
            };
            flags.set(Flag::Overflow, overflow);
        }
        if !self.kind.is_rotate() {
            flags.update_result(value, size);
        }
        self.dest.set(cpu, value as i64)
    }

    fn validate(&self) -> Result<(), CpuError> {
        let mnemonic = self.mnemonic();
        require_destination(mnemonic, &self.dest)?;
        match self.count {
            Operand::Register(Register::CL) => Ok(()),
            Operand::Immediate(imm) if imm.size() == OperandSize::Byte => Ok(()),
            _ => Err(CpuError::invalid_operand(
                mnemonic,
                &self.count,
                "count must be CL or an 8-bit immediate",
            )),
        }
    }

    fn required_model(&self) -> CpuModel {
        let base = if self.count.is_immediate() && !self.is_single() {
            CpuModel::Intel80186
        } else {
            CpuModel::Intel8086
        };
        later_model(base, operands_model(&[&self.dest]))
    }
}

impl fmt::Display for Shift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_instruction(f, self.mnemonic(), &[&self.dest, &self.count])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BitTestKind {
    Bt,
    Bts,
    Btr,
    Btc,
}

/// BT/BTS/BTR: copy the selected bit to CF, then set or reset it.
/// BTC is recognized but not implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitTest {
    pub kind: BitTestKind,
    pub dest: Operand,
    pub bit: Operand,
}

impl BitTest {
    pub fn new(kind: BitTestKind, dest: Operand, bit: Operand) -> Result<Self, CpuError> {
        let op = Self { kind, dest, bit };
        op.validate()?;
        Ok(op)
    }
}

impl Instruction for BitTest {
    fn mnemonic(&self) -> &'static str {
        match self.kind {
            BitTestKind::Bt => "BT",
            BitTestKind::Bts => "BTS",
            BitTestKind::Btr => "BTR",
            BitTestKind::Btc => "BTC",
        }
    }

    fn execute(&self, _system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
        if self.kind == BitTestKind::Btc {
            return Err(CpuError::UnimplementedInstruction("BTC"));
        }
        let n = self.bit.get_unsigned(cpu) % self.dest.size().bits();
        let value = self.dest.get_unsigned(cpu);
        let mask = 1u32 << n;
        cpu.flags_mut().set(Flag::Carry, value & mask != 0);

        match self.kind {
            BitTestKind::Bts => self.dest.set(cpu, (value | mask) as i64),
            BitTestKind::Btr => self.dest.set(cpu, (value & !mask) as i64),
            _ => Ok(()),
        }
    }

    fn validate(&self) -> Result<(), CpuError> {
        let mnemonic = self.mnemonic();
        require_destination(mnemonic, &self.dest)?;
        require_word_or_wider(mnemonic, &self.dest)?;
        match self.bit {
            Operand::Immediate(imm) if imm.size() == OperandSize::Byte => Ok(()),
            Operand::Register(_) => require_compatible_sizes(mnemonic, &self.dest, &self.bit),
            _ => Err(CpuError::invalid_operand(
                mnemonic,
                &self.bit,
                "bit index must be a register or an 8-bit immediate",
            )),
        }
    }

    fn required_model(&self) -> CpuModel {
        CpuModel::Intel80386
    }
}

impl fmt::Display for BitTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_instruction(f, self.mnemonic(), &[&self.dest, &self.bit])
    }
}

/// BSF/BSR: index of the lowest/highest set bit. A zero source sets ZF and
/// leaves the destination alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitScan {
    pub reverse: bool,
    pub dest: Operand,
    pub src: Operand,
}

impl BitScan {
    pub fn new(reverse: bool, dest: Operand, src: Operand) -> Result<Self, CpuError> {
        let op = Self { reverse, dest, src };
        op.validate()?;
        Ok(op)
    }
}

impl Instruction for BitScan {
    fn mnemonic(&self) -> &'static str {
        if self.reverse {
            "BSR"
        } else {
            "BSF"
        }
    }

    fn execute(&self, _system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
        let value = self.src.get_unsigned(cpu);
        if value == 0 {
            cpu.flags_mut().set(Flag::Zero, true);
            return Ok(());
        }
        cpu.flags_mut().set(Flag::Zero, false);
        let index = if self.reverse {
            31 - value.leading_zeros()
        } else {
            value.trailing_zeros()
        };
        self.dest.set(cpu, index as i64)
    }

    fn validate(&self) -> Result<(), CpuError> {
        let mnemonic = self.mnemonic();
        require_general_register(mnemonic, &self.dest)?;
        require_word_or_wider(mnemonic, &self.dest)?;
        if self.src.is_immediate() {
            return Err(CpuError::invalid_operand(
                mnemonic,
                &self.src,
                "source must be a register or memory",
            ));
        }
        require_compatible_sizes(mnemonic, &self.dest, &self.src)
    }

    fn required_model(&self) -> CpuModel {
        CpuModel::Intel80386
    }
}

impl fmt::Display for BitScan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_instruction(f, self.mnemonic(), &[&self.dest, &self.src])
    }
}
