//! System instructions: INT/INTO/INT3, BOUND, HLT/NOP/WAIT, flag control
//! and the protected-mode group.

use super::{
    later_model, operands_model, require_general_register, require_memory,
    require_word_or_wider, write_instruction, Instruction,
};
use crate::cpu_80x86::{CpuModel, Intel80x86};
use crate::error::CpuError;
use crate::flags::Flag;
use crate::operand::{Operand, OperandSize};
use crate::system::IbmPc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Vector raised by BOUND when the index is out of range
const BOUND_VECTOR: u8 = 0x05;

/// Protection Enable bit of the machine status word
const MSW_PE: u16 = 0x0001;

/// INT n
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interrupt {
    pub vector: u8,
}

impl Instruction for Interrupt {
    fn mnemonic(&self) -> &'static str {
        "INT"
    }

    fn execute(&self, system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
        system.interrupt(cpu, self.vector)
    }
}

impl fmt::Display for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "INT {:02X}", self.vector)
    }
}

/// BOUND index,bounds: INT 5 unless lower <= index <= upper (signed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bound {
    pub index: Operand,
    pub bounds: Operand,
}

impl Bound {
    pub fn new(index: Operand, bounds: Operand) -> Result<Self, CpuError> {
        let op = Self { index, bounds };
        op.validate()?;
        Ok(op)
    }
}

impl Instruction for Bound {
    fn mnemonic(&self) -> &'static str {
        "BOUND"
    }

    fn execute(&self, system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
        let size = self.index.size();
        let lower_ref = *require_memory("BOUND", &self.bounds)?;
        let mut upper_ref = lower_ref.with_size(size);
        upper_ref.displacement += size.bytes() as i32;

        let index = size.sign_extend(self.index.get_unsigned(cpu));
        let lower = size.sign_extend(lower_ref.with_size(size).read(cpu));
        let upper = size.sign_extend(upper_ref.read(cpu));
        if index < lower || index > upper {
            system.interrupt(cpu, BOUND_VECTOR)
        } else {
            Ok(())
        }
    }

    fn validate(&self) -> Result<(), CpuError> {
        require_general_register("BOUND", &self.index)?;
        require_word_or_wider("BOUND", &self.index)?;
        require_memory("BOUND", &self.bounds)?;
        Ok(())
    }

    fn required_model(&self) -> CpuModel {
        later_model(CpuModel::Intel80186, operands_model(&[&self.index]))
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_instruction(f, "BOUND", &[&self.index, &self.bounds])
    }
}

/// Operand-less control instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlOp {
    Hlt,
    Nop,
    /// No coprocessor is attached, so there is nothing to wait for
    Wait,
    Clc,
    Stc,
    Cmc,
    Cld,
    Std,
    Cli,
    Sti,
    /// INT 4 if OF is set
    Into,
    /// Breakpoint, INT 3
    Int3,
}

impl Instruction for ControlOp {
    fn mnemonic(&self) -> &'static str {
        match self {
            ControlOp::Hlt => "HLT",
            ControlOp::Nop => "NOP",
            ControlOp::Wait => "WAIT",
            ControlOp::Clc => "CLC",
            ControlOp::Stc => "STC",
            ControlOp::Cmc => "CMC",
            ControlOp::Cld => "CLD",
            ControlOp::Std => "STD",
            ControlOp::Cli => "CLI",
            ControlOp::Sti => "STI",
            ControlOp::Into => "INTO",
            ControlOp::Int3 => "INT3",
        }
    }

    fn execute(&self, system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
        match self {
            ControlOp::Hlt => cpu.halt(),
            ControlOp::Nop | ControlOp::Wait => {}
            ControlOp::Clc => cpu.flags_mut().set(Flag::Carry, false),
            ControlOp::Stc => cpu.flags_mut().set(Flag::Carry, true),
            ControlOp::Cmc => {
                let carry = cpu.flags().carry();
                cpu.flags_mut().set(Flag::Carry, !carry);
            }
            ControlOp::Cld => cpu.flags_mut().set(Flag::Direction, false),
            ControlOp::Std => cpu.flags_mut().set(Flag::Direction, true),
            ControlOp::Cli => cpu.flags_mut().set(Flag::Interrupt, false),
            ControlOp::Sti => cpu.flags_mut().set(Flag::Interrupt, true),
            ControlOp::Into => {
                if cpu.flags().overflow() {
                    return system.interrupt(cpu, 0x04);
                }
            }
            ControlOp::Int3 => return system.interrupt(cpu, 0x03),
        }
        Ok(())
    }
}

impl fmt::Display for ControlOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// SMSW dest / LMSW src
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineStatus {
    /// true for SMSW
    pub store: bool,
    pub operand: Operand,
}

impl MachineStatus {
    pub fn store(dest: Operand) -> Result<Self, CpuError> {
        let op = Self {
            store: true,
            operand: dest,
        };
        op.validate()?;
        Ok(op)
    }

    pub fn load(src: Operand) -> Result<Self, CpuError> {
        let op = Self {
            store: false,
            operand: src,
        };
        op.validate()?;
        Ok(op)
    }
}

impl Instruction for MachineStatus {
    fn mnemonic(&self) -> &'static str {
        if self.store {
            "SMSW"
        } else {
            "LMSW"
        }
    }

    fn execute(&self, _system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
        if self.store {
            let msw = cpu.machine_status();
            return self.operand.set(cpu, msw as i64);
        }
        let msw = self.operand.get_unsigned(cpu) as u16;
        if msw & MSW_PE != 0 {
            // protected mode is not emulated
            return Err(CpuError::UnimplementedInstruction("LMSW"));
        }
        let kept = cpu.machine_status() & !0x000F;
        cpu.set_machine_status(kept | (msw & 0x000F));
        Ok(())
    }

    fn validate(&self) -> Result<(), CpuError> {
        if self.operand.size() != OperandSize::Word {
            return Err(CpuError::invalid_operand(
                self.mnemonic(),
                &self.operand,
                "machine status word is 16 bits",
            ));
        }
        if self.store && !self.operand.is_settable() {
            return Err(CpuError::invalid_operand(
                "SMSW",
                &self.operand,
                "destination must be a register or memory",
            ));
        }
        if let Operand::Register(_) = self.operand {
            require_general_register(self.mnemonic(), &self.operand)?;
        }
        Ok(())
    }

    fn required_model(&self) -> CpuModel {
        CpuModel::Intel80286
    }
}

impl fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_instruction(f, self.mnemonic(), &[&self.operand])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrivilegedKind {
    Ltr,
    Str,
    Lgdt,
    Sgdt,
    Lidt,
    Sidt,
    Lldt,
    Sldt,
    Clts,
}

/// Descriptor-table and task-register instructions. They exist on the
/// 80286 and later but real-mode emulation has no tables behind them, so
/// every execution fails as unimplemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Privileged {
    pub kind: PrivilegedKind,
}

impl Instruction for Privileged {
    fn mnemonic(&self) -> &'static str {
        match self.kind {
            PrivilegedKind::Ltr => "LTR",
            PrivilegedKind::Str => "STR",
            PrivilegedKind::Lgdt => "LGDT",
            PrivilegedKind::Sgdt => "SGDT",
            PrivilegedKind::Lidt => "LIDT",
            PrivilegedKind::Sidt => "SIDT",
            PrivilegedKind::Lldt => "LLDT",
            PrivilegedKind::Sldt => "SLDT",
            PrivilegedKind::Clts => "CLTS",
        }
    }

    fn execute(&self, _system: &mut IbmPc, _cpu: &mut Intel80x86) -> Result<(), CpuError> {
        Err(CpuError::UnimplementedInstruction(self.mnemonic()))
    }

    fn required_model(&self) -> CpuModel {
        CpuModel::Intel80286
    }
}

impl fmt::Display for Privileged {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}
