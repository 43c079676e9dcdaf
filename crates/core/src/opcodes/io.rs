//! IN/OUT against the machine's port file. The port is either an imm8 or
//! DX; the data register is AL, AX or EAX.

use super::{operands_model, write_instruction, Instruction};
use crate::cpu_80x86::{CpuModel, Intel80x86};
use crate::error::CpuError;
use crate::operand::{Operand, OperandSize};
use crate::register::Register;
use crate::system::IbmPc;
use serde::{Deserialize, Serialize};
use std::fmt;

fn require_port(mnemonic: &'static str, port: &Operand) -> Result<(), CpuError> {
    match port {
        Operand::Immediate(imm) if imm.size() == OperandSize::Byte => Ok(()),
        Operand::Register(Register::DX) => Ok(()),
        _ => Err(CpuError::invalid_operand(mnemonic, port, "port must be imm8 or DX")),
    }
}

fn require_accumulator(mnemonic: &'static str, op: &Operand) -> Result<(), CpuError> {
    match op.as_register() {
        Some(Register::AL | Register::AX | Register::EAX) => Ok(()),
        _ => Err(CpuError::invalid_operand(mnemonic, op, "must be AL, AX or EAX")),
    }
}

fn port_number(port: &Operand, cpu: &Intel80x86) -> u16 {
    port.get_unsigned(cpu) as u16
}

/// IN acc,port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct In {
    pub dest: Operand,
    pub port: Operand,
}

impl In {
    pub fn new(dest: Operand, port: Operand) -> Result<Self, CpuError> {
        let op = Self { dest, port };
        op.validate()?;
        Ok(op)
    }
}

impl Instruction for In {
    fn mnemonic(&self) -> &'static str {
        "IN"
    }

    fn execute(&self, system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
        let port = port_number(&self.port, cpu);
        let value = system.ports.read(port, self.dest.size());
        self.dest.set(cpu, value as i64)
    }

    fn validate(&self) -> Result<(), CpuError> {
        require_accumulator("IN", &self.dest)?;
        require_port("IN", &self.port)
    }

    fn required_model(&self) -> CpuModel {
        operands_model(&[&self.dest])
    }
}

impl fmt::Display for In {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_instruction(f, "IN", &[&self.dest, &self.port])
    }
}

/// OUT port,acc
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Out {
    pub port: Operand,
    pub src: Operand,
}

impl Out {
    pub fn new(port: Operand, src: Operand) -> Result<Self, CpuError> {
        let op = Self { port, src };
        op.validate()?;
        Ok(op)
    }
}

impl Instruction for Out {
    fn mnemonic(&self) -> &'static str {
        "OUT"
    }

    fn execute(&self, system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
        let port = port_number(&self.port, cpu);
        let value = self.src.get_unsigned(cpu);
        system.ports.write(port, self.src.size(), value);
        Ok(())
    }

    fn validate(&self) -> Result<(), CpuError> {
        require_port("OUT", &self.port)?;
        require_accumulator("OUT", &self.src)
    }

    fn required_model(&self) -> CpuModel {
        operands_model(&[&self.src])
    }
}

impl fmt::Display for Out {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_instruction(f, "OUT", &[&self.port, &self.src])
    }
}
