//! Opcode set and dispatch
//!
//! Every instruction is an immutable value built from its operands and
//! validated on construction. [`OpCode`] is the tagged union the fetch loop
//! executes; each variant wraps a struct implementing [`Instruction`], so
//! dispatch is exactly one `match` deep.

mod addressing;
mod arithmetic;
mod bitwise;
mod control;
mod data;
mod flow;
mod io;
mod stack_ops;
mod string;

pub use addressing::SegmentOverride;
pub use arithmetic::{
    Arithmetic, ArithmeticKind, DecimalAdjust, Divide, Multiply, MultiplyExtended, Unary, UnaryKind,
};
pub use bitwise::{BitScan, BitTest, BitTestKind, Logic, LogicKind, Not, Shift, ShiftKind};
pub use control::{Bound, ControlOp, Interrupt, MachineStatus, Privileged, PrivilegedKind};
pub use data::{ImpliedData, Lea, LoadFarPointer, MoveExtend, Mov, Xchg};
pub use flow::{
    Call, Condition, ConditionalFlow, ConditionalJump, Jump, JumpIfCounterZero, Loop, LoopKind,
    Return, ReturnKind,
};
pub use io::{In, Out};
pub use stack_ops::{Enter, Pop, Push, StackOp};
pub use string::{Repeat, StringIo, StringIoKind, StringKind, StringOp};

use crate::cpu_80x86::{CpuModel, Intel80x86};
use crate::error::CpuError;
use crate::operand::{Operand, OperandSize};
use crate::register::{Register, SegmentRegister};
use crate::system::IbmPc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Behavior shared by every instruction
pub trait Instruction: fmt::Display {
    fn mnemonic(&self) -> &'static str;

    /// Perform the full effect: read sources, write destinations, update
    /// the documented flags and redirect IP for flow control
    fn execute(&self, system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError>;

    /// Reject operand shapes no encoding can express
    fn validate(&self) -> Result<(), CpuError> {
        Ok(())
    }

    /// Oldest CPU model that has this instruction
    fn required_model(&self) -> CpuModel {
        CpuModel::Intel8086
    }
}

/// The newer of two models
pub(crate) fn later_model(a: CpuModel, b: CpuModel) -> CpuModel {
    if a.supports(b) {
        a
    } else {
        b
    }
}

/// 80386 if any operand uses 32-bit widths, extended registers or FS/GS
pub(crate) fn operands_model(operands: &[&Operand]) -> CpuModel {
    if operands.iter().any(|op| op.needs_80386()) {
        CpuModel::Intel80386
    } else {
        CpuModel::Intel8086
    }
}

pub(crate) fn require_destination(mnemonic: &'static str, op: &Operand) -> Result<(), CpuError> {
    if op.is_settable() {
        Ok(())
    } else {
        Err(CpuError::invalid_operand(
            mnemonic,
            op,
            "destination must be a register or memory",
        ))
    }
}

pub(crate) fn require_not_both_memory(
    mnemonic: &'static str,
    dest: &Operand,
    src: &Operand,
) -> Result<(), CpuError> {
    if dest.is_memory() && src.is_memory() {
        Err(CpuError::IllegalInstruction(format!(
            "{} {},{}: memory to memory",
            mnemonic, dest, src
        )))
    } else {
        Ok(())
    }
}

/// Sources must match the destination width; immediates may be narrower
pub(crate) fn require_compatible_sizes(
    mnemonic: &'static str,
    dest: &Operand,
    src: &Operand,
) -> Result<(), CpuError> {
    let ok = if src.is_immediate() {
        src.size() <= dest.size()
    } else {
        src.size() == dest.size()
    };
    if ok {
        Ok(())
    } else {
        Err(CpuError::invalid_operand(
            mnemonic,
            src,
            "operand size does not match destination",
        ))
    }
}

pub(crate) fn require_general_register(
    mnemonic: &'static str,
    op: &Operand,
) -> Result<Register, CpuError> {
    match op.as_register() {
        Some(reg) if !reg.is_segment() && reg != Register::IP && reg != Register::FLAGS => Ok(reg),
        _ => Err(CpuError::invalid_operand(
            mnemonic,
            op,
            "must be a general-purpose register",
        )),
    }
}

pub(crate) fn require_memory<'a>(
    mnemonic: &'static str,
    op: &'a Operand,
) -> Result<&'a crate::operand::MemoryReference, CpuError> {
    op.as_memory()
        .ok_or_else(|| CpuError::invalid_operand(mnemonic, op, "must be a memory reference"))
}

pub(crate) fn require_word_or_wider(mnemonic: &'static str, op: &Operand) -> Result<(), CpuError> {
    if op.size() == OperandSize::Byte {
        Err(CpuError::invalid_operand(mnemonic, op, "byte operand not allowed"))
    } else {
        Ok(())
    }
}

/// `MNEMONIC op1,op2`
pub(crate) fn write_instruction(
    f: &mut fmt::Formatter<'_>,
    mnemonic: &str,
    operands: &[&Operand],
) -> fmt::Result {
    f.write_str(mnemonic)?;
    for (i, op) in operands.iter().enumerate() {
        f.write_str(if i == 0 { " " } else { "," })?;
        write!(f, "{}", op)?;
    }
    Ok(())
}

/// Every instruction the core executes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpCode {
    // data movement
    Mov(Mov),
    Xchg(Xchg),
    Lea(Lea),
    LoadFarPointer(LoadFarPointer),
    MoveExtend(MoveExtend),
    Implied(ImpliedData),
    // arithmetic
    Arithmetic(Arithmetic),
    Unary(Unary),
    Multiply(Multiply),
    MultiplyExtended(MultiplyExtended),
    Divide(Divide),
    Adjust(DecimalAdjust),
    // bitwise
    Logic(Logic),
    Not(Not),
    Shift(Shift),
    BitTest(BitTest),
    BitScan(BitScan),
    // flow control
    Jump(Jump),
    Call(Call),
    ConditionalJump(ConditionalJump),
    JumpIfCounterZero(JumpIfCounterZero),
    Loop(Loop),
    Return(Return),
    // stack
    Push(Push),
    Pop(Pop),
    Stack(StackOp),
    Enter(Enter),
    // string
    String(StringOp),
    StringIo(StringIo),
    // port I/O
    In(In),
    Out(Out),
    // system
    Interrupt(Interrupt),
    Bound(Bound),
    Control(ControlOp),
    MachineStatus(MachineStatus),
    Privileged(Privileged),
    // addressing
    SegmentOverride(SegmentOverride),
}

macro_rules! dispatch {
    ($opcode:expr, $inner:ident => $body:expr) => {
        match $opcode {
            OpCode::Mov($inner) => $body,
            OpCode::Xchg($inner) => $body,
            OpCode::Lea($inner) => $body,
            OpCode::LoadFarPointer($inner) => $body,
            OpCode::MoveExtend($inner) => $body,
            OpCode::Implied($inner) => $body,
            OpCode::Arithmetic($inner) => $body,
            OpCode::Unary($inner) => $body,
            OpCode::Multiply($inner) => $body,
            OpCode::MultiplyExtended($inner) => $body,
            OpCode::Divide($inner) => $body,
            OpCode::Adjust($inner) => $body,
            OpCode::Logic($inner) => $body,
            OpCode::Not($inner) => $body,
            OpCode::Shift($inner) => $body,
            OpCode::BitTest($inner) => $body,
            OpCode::BitScan($inner) => $body,
            OpCode::Jump($inner) => $body,
            OpCode::Call($inner) => $body,
            OpCode::ConditionalJump($inner) => $body,
            OpCode::JumpIfCounterZero($inner) => $body,
            OpCode::Loop($inner) => $body,
            OpCode::Return($inner) => $body,
            OpCode::Push($inner) => $body,
            OpCode::Pop($inner) => $body,
            OpCode::Stack($inner) => $body,
            OpCode::Enter($inner) => $body,
            OpCode::String($inner) => $body,
            OpCode::StringIo($inner) => $body,
            OpCode::In($inner) => $body,
            OpCode::Out($inner) => $body,
            OpCode::Interrupt($inner) => $body,
            OpCode::Bound($inner) => $body,
            OpCode::Control($inner) => $body,
            OpCode::MachineStatus($inner) => $body,
            OpCode::Privileged($inner) => $body,
            OpCode::SegmentOverride($inner) => $body,
        }
    };
}

impl OpCode {
    pub fn mnemonic(&self) -> &'static str {
        dispatch!(self, op => op.mnemonic())
    }

    pub fn execute(&self, system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
        dispatch!(self, op => op.execute(system, cpu))
    }

    pub fn validate(&self) -> Result<(), CpuError> {
        dispatch!(self, op => op.validate())
    }

    pub fn required_model(&self) -> CpuModel {
        dispatch!(self, op => op.required_model())
    }

    /// False for opcodes kept as explicit not-yet-implemented markers
    pub fn is_implemented(&self) -> bool {
        match self {
            OpCode::StringIo(_) => false,
            OpCode::SegmentOverride(prefix) => prefix.instruction.is_implemented(),
            _ => true,
        }
    }

    /// True for JMP/CALL whose target is a literal known at construction
    pub fn is_direct_transfer(&self) -> Option<bool> {
        match self {
            OpCode::Jump(jump) => Some(jump.is_direct()),
            OpCode::Call(call) => Some(call.is_direct()),
            _ => None,
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        dispatch!(self, op => fmt::Display::fmt(op, f))
    }
}

/// Assembler-style constructors
impl OpCode {
    pub fn mov(dest: impl Into<Operand>, src: impl Into<Operand>) -> Result<Self, CpuError> {
        Mov::new(dest.into(), src.into()).map(OpCode::Mov)
    }

    pub fn xchg(a: impl Into<Operand>, b: impl Into<Operand>) -> Result<Self, CpuError> {
        Xchg::new(a.into(), b.into()).map(OpCode::Xchg)
    }

    pub fn lea(dest: Register, src: impl Into<Operand>) -> Result<Self, CpuError> {
        Lea::new(Operand::reg(dest), src.into()).map(OpCode::Lea)
    }

    pub fn load_far_pointer(
        segment: SegmentRegister,
        dest: Register,
        src: impl Into<Operand>,
    ) -> Result<Self, CpuError> {
        LoadFarPointer::new(segment, Operand::reg(dest), src.into()).map(OpCode::LoadFarPointer)
    }

    pub fn movsx(dest: Register, src: impl Into<Operand>) -> Result<Self, CpuError> {
        MoveExtend::new(true, Operand::reg(dest), src.into()).map(OpCode::MoveExtend)
    }

    pub fn movzx(dest: Register, src: impl Into<Operand>) -> Result<Self, CpuError> {
        MoveExtend::new(false, Operand::reg(dest), src.into()).map(OpCode::MoveExtend)
    }

    pub fn implied(op: ImpliedData) -> Self {
        OpCode::Implied(op)
    }

    fn arithmetic(
        kind: ArithmeticKind,
        dest: impl Into<Operand>,
        src: impl Into<Operand>,
    ) -> Result<Self, CpuError> {
        Arithmetic::new(kind, dest.into(), src.into()).map(OpCode::Arithmetic)
    }

    pub fn add(dest: impl Into<Operand>, src: impl Into<Operand>) -> Result<Self, CpuError> {
        Self::arithmetic(ArithmeticKind::Add, dest, src)
    }

    pub fn adc(dest: impl Into<Operand>, src: impl Into<Operand>) -> Result<Self, CpuError> {
        Self::arithmetic(ArithmeticKind::Adc, dest, src)
    }

    pub fn sub(dest: impl Into<Operand>, src: impl Into<Operand>) -> Result<Self, CpuError> {
        Self::arithmetic(ArithmeticKind::Sub, dest, src)
    }

    pub fn sbb(dest: impl Into<Operand>, src: impl Into<Operand>) -> Result<Self, CpuError> {
        Self::arithmetic(ArithmeticKind::Sbb, dest, src)
    }

    pub fn cmp(dest: impl Into<Operand>, src: impl Into<Operand>) -> Result<Self, CpuError> {
        Self::arithmetic(ArithmeticKind::Cmp, dest, src)
    }

    pub fn inc(dest: impl Into<Operand>) -> Result<Self, CpuError> {
        Unary::new(UnaryKind::Inc, dest.into()).map(OpCode::Unary)
    }

    pub fn dec(dest: impl Into<Operand>) -> Result<Self, CpuError> {
        Unary::new(UnaryKind::Dec, dest.into()).map(OpCode::Unary)
    }

    pub fn neg(dest: impl Into<Operand>) -> Result<Self, CpuError> {
        Unary::new(UnaryKind::Neg, dest.into()).map(OpCode::Unary)
    }

    pub fn mul(src: impl Into<Operand>) -> Result<Self, CpuError> {
        Multiply::new(false, src.into()).map(OpCode::Multiply)
    }

    pub fn imul(src: impl Into<Operand>) -> Result<Self, CpuError> {
        Multiply::new(true, src.into()).map(OpCode::Multiply)
    }

    /// `IMUL dest,src` (80386) or `IMUL dest,src,imm` (80186)
    pub fn imul_extended(
        dest: Register,
        src: impl Into<Operand>,
        factor: Option<Operand>,
    ) -> Result<Self, CpuError> {
        MultiplyExtended::new(Operand::reg(dest), src.into(), factor).map(OpCode::MultiplyExtended)
    }

    pub fn div(src: impl Into<Operand>) -> Result<Self, CpuError> {
        Divide::new(false, src.into()).map(OpCode::Divide)
    }

    pub fn idiv(src: impl Into<Operand>) -> Result<Self, CpuError> {
        Divide::new(true, src.into()).map(OpCode::Divide)
    }

    pub fn adjust(op: DecimalAdjust) -> Self {
        OpCode::Adjust(op)
    }

    fn logic(kind: LogicKind, dest: impl Into<Operand>, src: impl Into<Operand>) -> Result<Self, CpuError> {
        Logic::new(kind, dest.into(), src.into()).map(OpCode::Logic)
    }

    pub fn and(dest: impl Into<Operand>, src: impl Into<Operand>) -> Result<Self, CpuError> {
        Self::logic(LogicKind::And, dest, src)
    }

    pub fn or(dest: impl Into<Operand>, src: impl Into<Operand>) -> Result<Self, CpuError> {
        Self::logic(LogicKind::Or, dest, src)
    }

    pub fn xor(dest: impl Into<Operand>, src: impl Into<Operand>) -> Result<Self, CpuError> {
        Self::logic(LogicKind::Xor, dest, src)
    }

    pub fn test(dest: impl Into<Operand>, src: impl Into<Operand>) -> Result<Self, CpuError> {
        Self::logic(LogicKind::Test, dest, src)
    }

    pub fn not(dest: impl Into<Operand>) -> Result<Self, CpuError> {
        Not::new(dest.into()).map(OpCode::Not)
    }

    pub fn shift(kind: ShiftKind, dest: impl Into<Operand>, count: Operand) -> Result<Self, CpuError> {
        Shift::new(kind, dest.into(), count).map(OpCode::Shift)
    }

    pub fn bit_test(kind: BitTestKind, dest: impl Into<Operand>, bit: Operand) -> Result<Self, CpuError> {
        BitTest::new(kind, dest.into(), bit).map(OpCode::BitTest)
    }

    pub fn bsf(dest: Register, src: impl Into<Operand>) -> Result<Self, CpuError> {
        BitScan::new(false, Operand::reg(dest), src.into()).map(OpCode::BitScan)
    }

    pub fn bsr(dest: Register, src: impl Into<Operand>) -> Result<Self, CpuError> {
        BitScan::new(true, Operand::reg(dest), src.into()).map(OpCode::BitScan)
    }

    pub fn jmp(dest: impl Into<Operand>) -> Result<Self, CpuError> {
        Jump::new(dest.into()).map(OpCode::Jump)
    }

    pub fn call(dest: impl Into<Operand>) -> Result<Self, CpuError> {
        Call::new(dest.into()).map(OpCode::Call)
    }

    /// `Jcc target` with a near offset
    pub fn jcc(condition: Condition, target: u16) -> Self {
        OpCode::ConditionalJump(ConditionalJump::new(condition, target))
    }

    pub fn jcxz(target: u16) -> Self {
        OpCode::JumpIfCounterZero(JumpIfCounterZero::new(OperandSize::Word, target))
    }

    pub fn jecxz(target: u16) -> Self {
        OpCode::JumpIfCounterZero(JumpIfCounterZero::new(OperandSize::DoubleWord, target))
    }

    pub fn loop_(kind: LoopKind, target: u16) -> Self {
        OpCode::Loop(Loop::new(kind, target))
    }

    pub fn ret(release: u16) -> Self {
        OpCode::Return(Return::new(ReturnKind::Near, release))
    }

    pub fn retf(release: u16) -> Self {
        OpCode::Return(Return::new(ReturnKind::Far, release))
    }

    pub fn iret() -> Self {
        OpCode::Return(Return::new(ReturnKind::Interrupt, 0))
    }

    pub fn push(src: impl Into<Operand>) -> Result<Self, CpuError> {
        Push::new(src.into()).map(OpCode::Push)
    }

    pub fn pop(dest: impl Into<Operand>) -> Result<Self, CpuError> {
        Pop::new(dest.into()).map(OpCode::Pop)
    }

    pub fn stack(op: StackOp) -> Self {
        OpCode::Stack(op)
    }

    pub fn enter(size: u16, level: u8) -> Self {
        OpCode::Enter(Enter { size, level })
    }

    pub fn string(kind: StringKind, size: OperandSize, repeat: Repeat) -> Self {
        OpCode::String(StringOp::new(kind, size, repeat))
    }

    pub fn string_io(kind: StringIoKind, size: OperandSize, repeat: Repeat) -> Self {
        OpCode::StringIo(StringIo::new(kind, size, repeat))
    }

    pub fn input(dest: Register, port: Operand) -> Result<Self, CpuError> {
        In::new(Operand::reg(dest), port).map(OpCode::In)
    }

    pub fn output(port: Operand, src: Register) -> Result<Self, CpuError> {
        Out::new(port, Operand::reg(src)).map(OpCode::Out)
    }

    pub fn int(vector: u8) -> Self {
        OpCode::Interrupt(Interrupt { vector })
    }

    pub fn bound(index: Register, bounds: impl Into<Operand>) -> Result<Self, CpuError> {
        Bound::new(Operand::reg(index), bounds.into()).map(OpCode::Bound)
    }

    pub fn control(op: ControlOp) -> Self {
        OpCode::Control(op)
    }

    pub fn hlt() -> Self {
        OpCode::Control(ControlOp::Hlt)
    }

    pub fn nop() -> Self {
        OpCode::Control(ControlOp::Nop)
    }

    pub fn smsw(dest: impl Into<Operand>) -> Result<Self, CpuError> {
        MachineStatus::store(dest.into()).map(OpCode::MachineStatus)
    }

    pub fn lmsw(src: impl Into<Operand>) -> Result<Self, CpuError> {
        MachineStatus::load(src.into()).map(OpCode::MachineStatus)
    }

    pub fn privileged(kind: PrivilegedKind) -> Self {
        OpCode::Privileged(Privileged { kind })
    }

    /// Prefix `instruction` with a segment override
    pub fn with_segment(segment: SegmentRegister, instruction: OpCode) -> Result<Self, CpuError> {
        SegmentOverride::new(segment, instruction).map(OpCode::SegmentOverride)
    }
}
