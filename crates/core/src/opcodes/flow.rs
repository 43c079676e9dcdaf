//! Flow control: JMP, CALL, Jcc, JCXZ/JECXZ, LOOPxx, RET/RETF/IRET
//!
//! Conditional transfers share one template: evaluate a predicate over the
//! current registers and flags and, only when it holds, hand the target to
//! `Intel80x86::jump_to`.

use super::{operands_model, write_instruction, Instruction};
use crate::cpu_80x86::{CpuModel, Intel80x86};
use crate::error::CpuError;
use crate::flags::Flags;
use crate::operand::{Operand, OperandSize};
use crate::register::Register;
use crate::system::IbmPc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The sixteen Jcc conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    Overflow,
    NotOverflow,
    /// CF=1 (JB/JC/JNAE)
    Below,
    /// CF=0 (JAE/JNB/JNC)
    AboveOrEqual,
    Equal,
    NotEqual,
    /// CF=1 or ZF=1
    BelowOrEqual,
    /// CF=0 and ZF=0
    Above,
    Sign,
    NotSign,
    ParityEven,
    ParityOdd,
    /// SF != OF
    Less,
    /// SF == OF
    GreaterOrEqual,
    /// ZF=1 or SF != OF
    LessOrEqual,
    /// ZF=0 and SF == OF
    Greater,
}

impl Condition {
    pub fn evaluate(self, flags: &Flags) -> bool {
        match self {
            Condition::Overflow => flags.overflow(),
            Condition::NotOverflow => !flags.overflow(),
            Condition::Below => flags.carry(),
            Condition::AboveOrEqual => !flags.carry(),
            Condition::Equal => flags.zero(),
            Condition::NotEqual => !flags.zero(),
            Condition::BelowOrEqual => flags.carry() || flags.zero(),
            Condition::Above => !flags.carry() && !flags.zero(),
            Condition::Sign => flags.sign(),
            Condition::NotSign => !flags.sign(),
            Condition::ParityEven => flags.parity(),
            Condition::ParityOdd => !flags.parity(),
            Condition::Less => flags.sign() != flags.overflow(),
            Condition::GreaterOrEqual => flags.sign() == flags.overflow(),
            Condition::LessOrEqual => flags.zero() || flags.sign() != flags.overflow(),
            Condition::Greater => !flags.zero() && flags.sign() == flags.overflow(),
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Condition::Overflow => "JO",
            Condition::NotOverflow => "JNO",
            Condition::Below => "JB",
            Condition::AboveOrEqual => "JAE",
            Condition::Equal => "JE",
            Condition::NotEqual => "JNE",
            Condition::BelowOrEqual => "JBE",
            Condition::Above => "JA",
            Condition::Sign => "JS",
            Condition::NotSign => "JNS",
            Condition::ParityEven => "JPE",
            Condition::ParityOdd => "JPO",
            Condition::Less => "JL",
            Condition::GreaterOrEqual => "JGE",
            Condition::LessOrEqual => "JLE",
            Condition::Greater => "JG",
        }
    }

    /// Condition for the low nibble of a Jcc encoding (0x70..0x7F)
    pub fn from_code(code: u8) -> Self {
        match code & 0x0F {
            0x0 => Condition::Overflow,
            0x1 => Condition::NotOverflow,
            0x2 => Condition::Below,
            0x3 => Condition::AboveOrEqual,
            0x4 => Condition::Equal,
            0x5 => Condition::NotEqual,
            0x6 => Condition::BelowOrEqual,
            0x7 => Condition::Above,
            0x8 => Condition::Sign,
            0x9 => Condition::NotSign,
            0xA => Condition::ParityEven,
            0xB => Condition::ParityOdd,
            0xC => Condition::Less,
            0xD => Condition::GreaterOrEqual,
            0xE => Condition::LessOrEqual,
            _ => Condition::Greater,
        }
    }
}

/// Predicate-guarded transfer
pub trait ConditionalFlow {
    fn redirects_flow(&self, cpu: &Intel80x86) -> bool;
    fn destination(&self) -> &Operand;
}

fn branch(flow: &impl ConditionalFlow, cpu: &mut Intel80x86) -> Result<(), CpuError> {
    if flow.redirects_flow(cpu) {
        cpu.jump_to(flow.destination(), false)
    } else {
        Ok(())
    }
}

fn require_target(mnemonic: &'static str, dest: &Operand) -> Result<(), CpuError> {
    match dest {
        Operand::Immediate(_) | Operand::Far(_) => Ok(()),
        Operand::Register(reg) if reg.is_general() && reg.size() != OperandSize::Byte => Ok(()),
        Operand::Memory(mem) if mem.size != OperandSize::Byte => Ok(()),
        _ => Err(CpuError::invalid_operand(mnemonic, dest, "not a valid transfer target")),
    }
}

/// A doubleword memory target is a far pointer, not a 32-bit operand
fn transfer_model(dest: &Operand) -> CpuModel {
    match dest {
        Operand::Memory(mem) if mem.size == OperandSize::DoubleWord => {
            operands_model(&[&Operand::mem(mem.with_size(OperandSize::Word))])
        }
        _ => operands_model(&[dest]),
    }
}

/// Operand-variant classification: literal targets are direct
fn is_direct(dest: &Operand) -> bool {
    matches!(dest, Operand::Immediate(_) | Operand::Far(_))
}

/// JMP: near/far, direct/indirect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jump {
    pub dest: Operand,
}

impl Jump {
    pub fn new(dest: Operand) -> Result<Self, CpuError> {
        let op = Self { dest };
        op.validate()?;
        Ok(op)
    }

    pub fn is_direct(&self) -> bool {
        is_direct(&self.dest)
    }
}

impl Instruction for Jump {
    fn mnemonic(&self) -> &'static str {
        "JMP"
    }

    fn execute(&self, _system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
        cpu.jump_to(&self.dest, false)
    }

    fn validate(&self) -> Result<(), CpuError> {
        require_target("JMP", &self.dest)
    }

    fn required_model(&self) -> CpuModel {
        transfer_model(&self.dest)
    }
}

impl fmt::Display for Jump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_instruction(f, "JMP", &[&self.dest])
    }
}

/// CALL: push the return address (CS too when far), then jump
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    pub dest: Operand,
}

impl Call {
    pub fn new(dest: Operand) -> Result<Self, CpuError> {
        let op = Self { dest };
        op.validate()?;
        Ok(op)
    }

    pub fn is_direct(&self) -> bool {
        is_direct(&self.dest)
    }
}

impl Instruction for Call {
    fn mnemonic(&self) -> &'static str {
        "CALL"
    }

    fn execute(&self, _system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
        cpu.jump_to(&self.dest, true)
    }

    fn validate(&self) -> Result<(), CpuError> {
        require_target("CALL", &self.dest)
    }

    fn required_model(&self) -> CpuModel {
        transfer_model(&self.dest)
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_instruction(f, "CALL", &[&self.dest])
    }
}

/// Jcc near target, taken when its condition holds over the six-flag
/// state left by the last flag-setting instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionalJump {
    pub condition: Condition,
    pub dest: Operand,
}

impl ConditionalJump {
    pub fn new(condition: Condition, target: u16) -> Self {
        Self {
            condition,
            dest: Operand::imm16(target),
        }
    }
}

impl ConditionalFlow for ConditionalJump {
    fn redirects_flow(&self, cpu: &Intel80x86) -> bool {
        self.condition.evaluate(cpu.flags())
    }

    fn destination(&self) -> &Operand {
        &self.dest
    }
}

impl Instruction for ConditionalJump {
    fn mnemonic(&self) -> &'static str {
        self.condition.mnemonic()
    }

    fn execute(&self, _system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
        branch(self, cpu)
    }

    fn validate(&self) -> Result<(), CpuError> {
        match self.dest {
            Operand::Immediate(_) => Ok(()),
            _ => Err(CpuError::invalid_operand(
                self.mnemonic(),
                &self.dest,
                "conditional jumps take a direct target",
            )),
        }
    }
}

impl fmt::Display for ConditionalJump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_instruction(f, self.mnemonic(), &[&self.dest])
    }
}

/// JCXZ (CX) / JECXZ (ECX): jump when the counter is zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JumpIfCounterZero {
    pub size: OperandSize,
    pub dest: Operand,
}

impl JumpIfCounterZero {
    pub fn new(size: OperandSize, target: u16) -> Self {
        Self {
            size,
            dest: Operand::imm16(target),
        }
    }
}

impl ConditionalFlow for JumpIfCounterZero {
    fn redirects_flow(&self, cpu: &Intel80x86) -> bool {
        cpu.get_register(Register::counter(self.size)) == 0
    }

    fn destination(&self) -> &Operand {
        &self.dest
    }
}

impl Instruction for JumpIfCounterZero {
    fn mnemonic(&self) -> &'static str {
        match self.size {
            OperandSize::DoubleWord => "JECXZ",
            _ => "JCXZ",
        }
    }

    fn execute(&self, _system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
        branch(self, cpu)
    }

    fn required_model(&self) -> CpuModel {
        match self.size {
            OperandSize::DoubleWord => CpuModel::Intel80386,
            _ => CpuModel::Intel8086,
        }
    }
}

impl fmt::Display for JumpIfCounterZero {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_instruction(f, self.mnemonic(), &[&self.dest])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopKind {
    Loop,
    /// Also requires ZF=1
    Loope,
    /// Also requires ZF=0
    Loopne,
}

/// LOOP/LOOPE/LOOPNE: decrement CX (flags untouched), then branch while
/// CX != 0 and the ZF condition holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loop {
    pub kind: LoopKind,
    pub dest: Operand,
}

impl Loop {
    pub fn new(kind: LoopKind, target: u16) -> Self {
        Self {
            kind,
            dest: Operand::imm16(target),
        }
    }
}

impl ConditionalFlow for Loop {
    fn redirects_flow(&self, cpu: &Intel80x86) -> bool {
        let counting = cpu.get_register(Register::CX) != 0;
        match self.kind {
            LoopKind::Loop => counting,
            LoopKind::Loope => counting && cpu.flags().zero(),
            LoopKind::Loopne => counting && !cpu.flags().zero(),
        }
    }

    fn destination(&self) -> &Operand {
        &self.dest
    }
}

impl Instruction for Loop {
    fn mnemonic(&self) -> &'static str {
        match self.kind {
            LoopKind::Loop => "LOOP",
            LoopKind::Loope => "LOOPE",
            LoopKind::Loopne => "LOOPNE",
        }
    }

    fn execute(&self, _system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
        cpu.registers.add(Register::CX, -1);
        branch(self, cpu)
    }
}

impl fmt::Display for Loop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_instruction(f, self.mnemonic(), &[&self.dest])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnKind {
    Near,
    Far,
    /// IRET: IP, CS, then FLAGS
    Interrupt,
}

/// RET n / RETF n / IRET
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Return {
    pub kind: ReturnKind,
    /// Bytes of caller arguments released after the pop
    pub release: u16,
}

impl Return {
    pub fn new(kind: ReturnKind, release: u16) -> Self {
        Self { kind, release }
    }
}

impl Instruction for Return {
    fn mnemonic(&self) -> &'static str {
        match self.kind {
            ReturnKind::Near => "RET",
            ReturnKind::Far => "RETF",
            ReturnKind::Interrupt => "IRET",
        }
    }

    fn execute(&self, _system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
        match self.kind {
            ReturnKind::Near => cpu.return_near(self.release),
            ReturnKind::Far => cpu.return_far(self.release),
            ReturnKind::Interrupt => cpu.interrupt_return(),
        }
    }

    fn validate(&self) -> Result<(), CpuError> {
        if self.kind == ReturnKind::Interrupt && self.release != 0 {
            return Err(CpuError::IllegalInstruction(
                "IRET takes no operand".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for Return {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.release == 0 {
            f.write_str(self.mnemonic())
        } else {
            write!(f, "{} {:04X}", self.mnemonic(), self.release)
        }
    }
}
