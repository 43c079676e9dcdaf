//! PUSH/POP and the implied stack instructions

use super::{later_model, operands_model, write_instruction, Instruction};
use crate::cpu_80x86::{CpuModel, Intel80x86};
use crate::error::CpuError;
use crate::operand::{Operand, OperandSize};
use crate::register::Register;
use crate::system::IbmPc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// PUSH src
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Push {
    pub src: Operand,
}

impl Push {
    pub fn new(src: Operand) -> Result<Self, CpuError> {
        let op = Self { src };
        op.validate()?;
        Ok(op)
    }
}

impl Instruction for Push {
    fn mnemonic(&self) -> &'static str {
        "PUSH"
    }

    fn execute(&self, _system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
        cpu.push(&self.src)
    }

    fn validate(&self) -> Result<(), CpuError> {
        match self.src {
            Operand::Far(_) => Err(CpuError::invalid_operand("PUSH", &self.src, "far pointer")),
            Operand::Register(Register::IP | Register::FLAGS) => Err(CpuError::invalid_operand(
                "PUSH",
                &self.src,
                "use PUSHF for the flags",
            )),
            Operand::Register(_) | Operand::Memory(_) if self.src.size() == OperandSize::Byte => {
                Err(CpuError::invalid_operand("PUSH", &self.src, "byte operand not allowed"))
            }
            _ => Ok(()),
        }
    }

    fn required_model(&self) -> CpuModel {
        let immediate = if self.src.is_immediate() {
            CpuModel::Intel80186
        } else {
            CpuModel::Intel8086
        };
        later_model(immediate, operands_model(&[&self.src]))
    }
}

impl fmt::Display for Push {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_instruction(f, "PUSH", &[&self.src])
    }
}

/// POP dest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pop {
    pub dest: Operand,
}

impl Pop {
    pub fn new(dest: Operand) -> Result<Self, CpuError> {
        let op = Self { dest };
        op.validate()?;
        Ok(op)
    }
}

impl Instruction for Pop {
    fn mnemonic(&self) -> &'static str {
        "POP"
    }

    fn execute(&self, _system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
        cpu.pop(&self.dest)
    }

    fn validate(&self) -> Result<(), CpuError> {
        if !self.dest.is_settable() {
            return Err(CpuError::invalid_operand(
                "POP",
                &self.dest,
                "destination must be a register or memory",
            ));
        }
        match self.dest.as_register() {
            Some(Register::CS) => Err(CpuError::IllegalInstruction("POP CS".to_string())),
            Some(Register::IP | Register::FLAGS) => Err(CpuError::invalid_operand(
                "POP",
                &self.dest,
                "use POPF for the flags",
            )),
            _ if self.dest.size() == OperandSize::Byte => {
                Err(CpuError::invalid_operand("POP", &self.dest, "byte operand not allowed"))
            }
            _ => Ok(()),
        }
    }

    fn required_model(&self) -> CpuModel {
        operands_model(&[&self.dest])
    }
}

impl fmt::Display for Pop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_instruction(f, "POP", &[&self.dest])
    }
}

/// Operand-less stack instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StackOp {
    Pusha,
    Popa,
    Pushad,
    Popad,
    Pushf,
    Popf,
    Pushfd,
    Popfd,
    Leave,
}

impl Instruction for StackOp {
    fn mnemonic(&self) -> &'static str {
        match self {
            StackOp::Pusha => "PUSHA",
            StackOp::Popa => "POPA",
            StackOp::Pushad => "PUSHAD",
            StackOp::Popad => "POPAD",
            StackOp::Pushf => "PUSHF",
            StackOp::Popf => "POPF",
            StackOp::Pushfd => "PUSHFD",
            StackOp::Popfd => "POPFD",
            StackOp::Leave => "LEAVE",
        }
    }

    fn execute(&self, _system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
        match self {
            StackOp::Pusha => cpu.pusha(),
            StackOp::Popa => cpu.popa(),
            StackOp::Pushad => cpu.pushad(),
            StackOp::Popad => cpu.popad(),
            StackOp::Pushf | StackOp::Pushfd => {
                let size = if *self == StackOp::Pushf {
                    OperandSize::Word
                } else {
                    OperandSize::DoubleWord
                };
                let flags = cpu.flags().bits() as u32;
                cpu.push_value(flags, size)
            }
            StackOp::Popf | StackOp::Popfd => {
                let size = if *self == StackOp::Popf {
                    OperandSize::Word
                } else {
                    OperandSize::DoubleWord
                };
                let flags = cpu.pop_value(size)?;
                cpu.flags_mut().set_bits(flags as u16);
                Ok(())
            }
            StackOp::Leave => cpu.leave(),
        }
    }

    fn required_model(&self) -> CpuModel {
        match self {
            StackOp::Pusha | StackOp::Popa | StackOp::Leave => CpuModel::Intel80186,
            StackOp::Pushad | StackOp::Popad | StackOp::Pushfd | StackOp::Popfd => {
                CpuModel::Intel80386
            }
            StackOp::Pushf | StackOp::Popf => CpuModel::Intel8086,
        }
    }
}

impl fmt::Display for StackOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// ENTER size,level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enter {
    pub size: u16,
    pub level: u8,
}

impl Instruction for Enter {
    fn mnemonic(&self) -> &'static str {
        "ENTER"
    }

    fn execute(&self, _system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
        cpu.enter(self.size, self.level)
    }

    fn required_model(&self) -> CpuModel {
        CpuModel::Intel80186
    }
}

impl fmt::Display for Enter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ENTER {:04X},{:02X}", self.size, self.level)
    }
}
