//! Integer and decimal arithmetic: ADD/ADC/SUB/SBB/CMP, INC/DEC/NEG,
//! MUL/IMUL/DIV/IDIV and the BCD adjustments.

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
pub enum ArithmeticKind {
    Add,
    Adc,
    Sub,
    Sbb,
    Cmp,
}

impl ArithmeticKind {
    fn mnemonic(self) -> &'static str {
        match self {
            ArithmeticKind::Add => "ADD",
            ArithmeticKind::Adc => "ADC",
            ArithmeticKind::Sub => "SUB",
            ArithmeticKind::Sbb => "SBB",
            ArithmeticKind::Cmp => "CMP",
        }
    }
}

/// Two-operand add/subtract family. Flags: OF SF ZF AF PF CF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arithmetic {
    pub kind: ArithmeticKind,
    pub dest: Operand,
    pub src: Operand,
}

impl Arithmetic {
    pub fn new(kind: ArithmeticKind, dest: Operand, src: Operand) -> Result<Self, CpuError> {
        let op = Self { kind, dest, src };
        op.validate()?;
        Ok(op)
    }
}

impl Instruction for Arithmetic {
    fn mnemonic(&self) -> &'static str {
        self.kind.mnemonic()
    }

    fn execute(&self, _system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
        let size = self.dest.size();
        let a = self.dest.get_unsigned(cpu);
        let b = self.src.value_as(cpu, size);
        let carry = cpu.flags().carry();
        let flags = cpu.flags_mut();

        let result = match self.kind {
            ArithmeticKind::Add => flags.update_add(a, b, false, size),
            ArithmeticKind::Adc => flags.update_add(a, b, carry, size),
            ArithmeticKind::Sub => flags.update_sub(a, b, false, size),
            ArithmeticKind::Sbb => flags.update_sub(a, b, carry, size),
            ArithmeticKind::Cmp => {
                flags.compare(a, b, size);
                return Ok(());
            }
        };
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

impl fmt::Display for Arithmetic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_instruction(f, self.mnemonic(), &[&self.dest, &self.src])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryKind {
    Inc,
    Dec,
    Neg,
}

/// INC/DEC (CF preserved) and NEG (CF set unless the operand was zero)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unary {
    pub kind: UnaryKind,
    pub dest: Operand,
}

impl Unary {
    pub fn new(kind: UnaryKind, dest: Operand) -> Result<Self, CpuError> {
        let op = Self { kind, dest };
        op.validate()?;
        Ok(op)
    }
}

impl Instruction for Unary {
    fn mnemonic(&self) -> &'static str {
        match self.kind {
            UnaryKind::Inc => "INC",
            UnaryKind::Dec => "DEC",
            UnaryKind::Neg => "NEG",
        }
    }

    fn execute(&self, _system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
        let size = self.dest.size();
        let a = self.dest.get_unsigned(cpu);
        let flags = cpu.flags_mut();
        let result = match self.kind {
            UnaryKind::Inc => flags.update_inc(a, size),
            UnaryKind::Dec => flags.update_dec(a, size),
            UnaryKind::Neg => flags.update_sub(0, a, false, size),
        };
        self.dest.set(cpu, result as i64)
    }

    fn validate(&self) -> Result<(), CpuError> {
        require_destination(self.mnemonic(), &self.dest)
    }

    fn required_model(&self) -> CpuModel {
        operands_model(&[&self.dest])
    }
}

impl fmt::Display for Unary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_instruction(f, self.mnemonic(), &[&self.dest])
    }
}

/// One-operand MUL/IMUL into AX, DX:AX or EDX:EAX.
///
/// Only CF and OF are defined afterwards: both set when the upper half of
/// the product is significant. SF, ZF, AF and PF are left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Multiply {
    pub signed: bool,
    pub src: Operand,
}

impl Multiply {
    pub fn new(signed: bool, src: Operand) -> Result<Self, CpuError> {
        let op = Self { signed, src };
        op.validate()?;
        Ok(op)
    }
}

impl Instruction for Multiply {
    fn mnemonic(&self) -> &'static str {
        if self.signed {
            "IMUL"
        } else {
            "MUL"
        }
    }

    fn execute(&self, _system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
        let size = self.src.size();
        let bits = size.bits();
        let acc = cpu.get_register(Register::accumulator(size));
        let src = self.src.get_unsigned(cpu);

        let (product, significant) = if self.signed {
            let product = size.sign_extend(acc) * size.sign_extend(src);
            let fits = product == size.sign_extend(product as u32 & size.mask());
            (product as u64, !fits)
        } else {
            let product = acc as u64 * src as u64;
            (product, product >> bits != 0)
        };

        let low = (product as u32) & size.mask();
        let high = ((product >> bits) as u32) & size.mask();
        match size {
            OperandSize::Byte => cpu.set_register(Register::AX, (high << 8) | low),
            _ => {
                cpu.set_register(Register::accumulator(size), low);
                cpu.set_register(Register::data(size), high);
            }
        }

        let flags = cpu.flags_mut();
        flags.set(Flag::Carry, significant);
        flags.set(Flag::Overflow, significant);
        Ok(())
    }

    fn validate(&self) -> Result<(), CpuError> {
        if self.src.is_immediate() || matches!(self.src, Operand::Far(_)) {
            return Err(CpuError::invalid_operand(
                self.mnemonic(),
                &self.src,
                "source must be a register or memory",
            ));
        }
        Ok(())
    }

    fn required_model(&self) -> CpuModel {
        operands_model(&[&self.src])
    }
}

impl fmt::Display for Multiply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_instruction(f, self.mnemonic(), &[&self.src])
    }
}

/// `IMUL reg,r/m` (80386) and `IMUL reg,r/m,imm` (80186): truncated signed
/// product into a register; CF/OF set when truncation lost significance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiplyExtended {
    pub dest: Operand,
    pub src: Operand,
    pub factor: Option<Operand>,
}

impl MultiplyExtended {
    pub fn new(dest: Operand, src: Operand, factor: Option<Operand>) -> Result<Self, CpuError> {
        let op = Self { dest, src, factor };
        op.validate()?;
        Ok(op)
    }
}

impl Instruction for MultiplyExtended {
    fn mnemonic(&self) -> &'static str {
        "IMUL"
    }

    fn execute(&self, _system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
        let size = self.dest.size();
        let (a, b) = match &self.factor {
            Some(factor) => (
                size.sign_extend(self.src.get_unsigned(cpu)),
                size.sign_extend(factor.value_as(cpu, size)),
            ),
            None => (
                size.sign_extend(self.dest.get_unsigned(cpu)),
                size.sign_extend(self.src.get_unsigned(cpu)),
            ),
        };
        let product = a * b;
        let truncated = (product as u32) & size.mask();
        let significant = product != size.sign_extend(truncated);

        self.dest.set(cpu, truncated as i64)?;
        let flags = cpu.flags_mut();
        flags.set(Flag::Carry, significant);
        flags.set(Flag::Overflow, significant);
        Ok(())
    }

    fn validate(&self) -> Result<(), CpuError> {
        require_general_register("IMUL", &self.dest)?;
        require_word_or_wider("IMUL", &self.dest)?;
        require_compatible_sizes("IMUL", &self.dest, &self.src)?;
        if self.src.is_immediate() {
            return Err(CpuError::invalid_operand(
                "IMUL",
                &self.src,
                "source must be a register or memory",
            ));
        }
        match &self.factor {
            Some(factor) if !factor.is_immediate() => Err(CpuError::invalid_operand(
                "IMUL",
                factor,
                "multiplier must be an immediate",
            )),
            Some(factor) => require_compatible_sizes("IMUL", &self.dest, factor),
            None => Ok(()),
        }
    }

    fn required_model(&self) -> CpuModel {
        let base = match self.factor {
            Some(_) => CpuModel::Intel80186,
            None => CpuModel::Intel80386,
        };
        later_model(base, operands_model(&[&self.dest, &self.src]))
    }
}

impl fmt::Display for MultiplyExtended {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.factor {
            Some(factor) => write_instruction(f, "IMUL", &[&self.dest, &self.src, factor]),
            None => write_instruction(f, "IMUL", &[&self.dest, &self.src]),
        }
    }
}

/// One-operand DIV/IDIV of AX, DX:AX or EDX:EAX.
///
/// Division by zero or a quotient that does not fit raises INT 00h (or
/// fails with `DivideError` when nothing handles it). Flags are untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Divide {
    pub signed: bool,
    pub src: Operand,
}

impl Divide {
    pub fn new(signed: bool, src: Operand) -> Result<Self, CpuError> {
        let op = Self { signed, src };
        op.validate()?;
        Ok(op)
    }

    /// (quotient, remainder), or None on a divide fault
    fn divide(&self, dividend: u64, divisor: u32, size: OperandSize) -> Option<(u32, u32)> {
        if divisor == 0 {
            return None;
        }
        if self.signed {
            let wide = size.doubled();
            let dividend = match wide {
                Some(wide) => wide.sign_extend(dividend as u32),
                None => dividend as i64,
            };
            let divisor = size.sign_extend(divisor);
            let quotient = dividend.checked_div(divisor)?;
            let remainder = dividend.checked_rem(divisor)?;
            let limit = (size.sign_bit() as i64) - 1;
            if quotient > limit || quotient < -limit - 1 {
                return None;
            }
            Some((quotient as u32 & size.mask(), remainder as u32 & size.mask()))
        } else {
            let quotient = dividend / divisor as u64;
            if quotient > size.mask() as u64 {
                return None;
            }
            Some((quotient as u32, (dividend % divisor as u64) as u32))
        }
    }
}

impl Instruction for Divide {
    fn mnemonic(&self) -> &'static str {
        if self.signed {
            "IDIV"
        } else {
            "DIV"
        }
    }

    fn execute(&self, system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
        let size = self.src.size();
        let divisor = self.src.get_unsigned(cpu);
        let dividend = match size {
            OperandSize::Byte => cpu.get_register(Register::AX) as u64,
            _ => {
                let high = cpu.get_register(Register::data(size)) as u64;
                let low = cpu.get_register(Register::accumulator(size)) as u64;
                (high << size.bits()) | low
            }
        };

        let Some((quotient, remainder)) = self.divide(dividend, divisor, size) else {
            return cpu.divide_error(system);
        };

        match size {
            OperandSize::Byte => {
                cpu.set_register(Register::AL, quotient);
                cpu.set_register(Register::AH, remainder);
            }
            _ => {
                cpu.set_register(Register::accumulator(size), quotient);
                cpu.set_register(Register::data(size), remainder);
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), CpuError> {
        if self.src.is_immediate() || matches!(self.src, Operand::Far(_)) {
            return Err(CpuError::invalid_operand(
                self.mnemonic(),
                &self.src,
                "divisor must be a register or memory",
            ));
        }
        Ok(())
    }

    fn required_model(&self) -> CpuModel {
        operands_model(&[&self.src])
    }
}

impl fmt::Display for Divide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_instruction(f, self.mnemonic(), &[&self.src])
    }
}

/// ASCII and packed-BCD adjustments of AL/AX
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecimalAdjust {
    Aaa,
    Aas,
    Daa,
    Das,
    /// AAM with its base (10 for the plain mnemonic)
    Aam(u8),
    /// AAD with its base
    Aad(u8),
}

impl Instruction for DecimalAdjust {
    fn mnemonic(&self) -> &'static str {
        match self {
            DecimalAdjust::Aaa => "AAA",
            DecimalAdjust::Aas => "AAS",
            DecimalAdjust::Daa => "DAA",
            DecimalAdjust::Das => "DAS",
            DecimalAdjust::Aam(_) => "AAM",
            DecimalAdjust::Aad(_) => "AAD",
        }
    }

    fn execute(&self, system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
        let al = cpu.get_register(Register::AL) as u8;
        let ah = cpu.get_register(Register::AH) as u8;
        let adjust_low = (al & 0x0F) > 9 || cpu.flags().auxiliary();

        match *self {
            DecimalAdjust::Aaa => {
                if adjust_low {
                    cpu.set_register(Register::AL, (al.wrapping_add(6) & 0x0F) as u32);
                    cpu.set_register(Register::AH, ah.wrapping_add(1) as u32);
                } else {
                    cpu.set_register(Register::AL, (al & 0x0F) as u32);
                }
                let flags = cpu.flags_mut();
                flags.set(Flag::Auxiliary, adjust_low);
                flags.set(Flag::Carry, adjust_low);
            }
            DecimalAdjust::Aas => {
                if adjust_low {
                    cpu.set_register(Register::AL, (al.wrapping_sub(6) & 0x0F) as u32);
                    cpu.set_register(Register::AH, ah.wrapping_sub(1) as u32);
                } else {
                    cpu.set_register(Register::AL, (al & 0x0F) as u32);
                }
                let flags = cpu.flags_mut();
                flags.set(Flag::Auxiliary, adjust_low);
                flags.set(Flag::Carry, adjust_low);
            }
            DecimalAdjust::Daa | DecimalAdjust::Das => {
                let subtract = matches!(self, DecimalAdjust::Das);
                let old_carry = cpu.flags().carry();
                let mut result = al;
                let mut carry = false;
                if adjust_low {
                    let (value, overflow) = if subtract {
                        result.overflowing_sub(6)
                    } else {
                        result.overflowing_add(6)
                    };
                    result = value;
                    carry = old_carry || overflow;
                }
                if al > 0x99 || old_carry {
                    result = if subtract {
                        result.wrapping_sub(0x60)
                    } else {
                        result.wrapping_add(0x60)
                    };
                    carry = true;
                }
                cpu.set_register(Register::AL, result as u32);
                let flags = cpu.flags_mut();
                flags.set(Flag::Auxiliary, adjust_low);
                flags.set(Flag::Carry, carry);
                flags.update_result(result as u32, OperandSize::Byte);
            }
            DecimalAdjust::Aam(base) => {
                if base == 0 {
                    return cpu.divide_error(system);
                }
                let result = al % base;
                cpu.set_register(Register::AH, (al / base) as u32);
                cpu.set_register(Register::AL, result as u32);
                cpu.flags_mut().update_result(result as u32, OperandSize::Byte);
            }
            DecimalAdjust::Aad(base) => {
                let result = al.wrapping_add(ah.wrapping_mul(base));
                cpu.set_register(Register::AX, result as u32);
                cpu.flags_mut().update_result(result as u32, OperandSize::Byte);
            }
        }
        Ok(())
    }
}

impl fmt::Display for DecimalAdjust {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecimalAdjust::Aam(base) | DecimalAdjust::Aad(base) if *base != 10 => {
                write!(f, "{} {:02X}", self.mnemonic(), base)
            }
            _ => f.write_str(self.mnemonic()),
        }
    }
}
