//! Tests for jumps, loops, calls and returns

use super::{machine, CODE_SEGMENT, DATA_SEGMENT, STACK_SEGMENT};
use crate::cpu_80x86::RunOutcome;
use crate::flags::{Flag, Flags};
use crate::interrupts::VectorHandler;
use crate::opcodes::{Condition, LoopKind, OpCode};
use crate::operand::{MemoryReference, Operand, OperandSize};
use crate::program::Program;
use crate::register::Register;

#[test]
fn test_jmp_near_direct() {
    let (mut system, mut cpu) = machine();
    cpu.execute(&mut system, &OpCode::jmp(Operand::imm16(0x0200)).unwrap())
        .unwrap();
    assert_eq!(cpu.ip(), 0x0200);
    assert_eq!(cpu.get_register(Register::CS), CODE_SEGMENT as u32);
}

#[test]
fn test_jmp_far_direct() {
    let (mut system, mut cpu) = machine();
    cpu.execute(&mut system, &OpCode::jmp(Operand::far(0x5000, 0x0010)).unwrap())
        .unwrap();
    assert_eq!(cpu.get_register(Register::CS), 0x5000);
    assert_eq!(cpu.ip(), 0x0010);
}

#[test]
fn test_jmp_indirect_register_and_memory() {
    let (mut system, mut cpu) = machine();
    cpu.set_register(Register::BX, 0x0456);
    cpu.execute(&mut system, &OpCode::jmp(Register::BX).unwrap()).unwrap();
    assert_eq!(cpu.ip(), 0x0456);

    cpu.memory.set_word(DATA_SEGMENT, 0x0010, 0x0020);
    cpu.memory.set_word(DATA_SEGMENT, 0x0012, 0x6000);
    let far = MemoryReference::direct(OperandSize::DoubleWord, 0x0010);
    cpu.execute(&mut system, &OpCode::jmp(far).unwrap()).unwrap();
    assert_eq!(cpu.get_register(Register::CS), 0x6000);
    assert_eq!(cpu.ip(), 0x0020);
}

#[test]
fn test_far_indirect_jump_runs_on_8086() {
    let far = MemoryReference::direct(OperandSize::DoubleWord, 0x0010);
    let jmp = OpCode::jmp(far).unwrap();
    assert_eq!(jmp.required_model(), crate::cpu_80x86::CpuModel::Intel8086);
    assert_eq!(jmp.is_direct_transfer(), Some(false));
}

#[test]
fn test_conditional_jump_taken_and_not_taken() {
    let (mut system, mut cpu) = machine();
    cpu.set_ip(0x0100);
    cpu.set_register(Register::AX, 5);
    cpu.execute(&mut system, &OpCode::cmp(Register::AX, Operand::imm16(5)).unwrap())
        .unwrap();

    cpu.execute(&mut system, &OpCode::jcc(Condition::NotEqual, 0x0300))
        .unwrap();
    assert_eq!(cpu.ip(), 0x0100);

    cpu.execute(&mut system, &OpCode::jcc(Condition::Equal, 0x0300))
        .unwrap();
    assert_eq!(cpu.ip(), 0x0300);
}

#[test]
fn test_condition_table() {
    let mut flags = Flags::new();
    // 1 - 2: borrow, negative, no overflow
    flags.compare(1, 2, OperandSize::Word);
    assert!(Condition::Below.evaluate(&flags));
    assert!(Condition::BelowOrEqual.evaluate(&flags));
    assert!(!Condition::Above.evaluate(&flags));
    assert!(Condition::Less.evaluate(&flags));
    assert!(Condition::LessOrEqual.evaluate(&flags));
    assert!(!Condition::Greater.evaluate(&flags));
    assert!(Condition::Sign.evaluate(&flags));

    // 0x8000 - 1: signed overflow, no borrow
    flags.compare(0x8000, 1, OperandSize::Word);
    assert!(Condition::Overflow.evaluate(&flags));
    assert!(Condition::AboveOrEqual.evaluate(&flags));
    assert!(Condition::Above.evaluate(&flags));
    assert!(Condition::Less.evaluate(&flags));
    assert!(!Condition::GreaterOrEqual.evaluate(&flags));

    flags.compare(3, 3, OperandSize::Byte);
    assert!(Condition::Equal.evaluate(&flags));
    assert!(Condition::GreaterOrEqual.evaluate(&flags));
    assert!(!Condition::Greater.evaluate(&flags));
    assert!(Condition::ParityEven.evaluate(&flags));
    assert!(!Condition::ParityOdd.evaluate(&flags));
}

#[test]
fn test_condition_codes() {
    assert_eq!(Condition::from_code(0x74), Condition::Equal);
    assert_eq!(Condition::from_code(0x7F), Condition::Greater);
    assert_eq!(Condition::from_code(0x72), Condition::Below);
}

fn counting_program(kind: LoopKind) -> Program {
    let mut program = Program::new();
    program.org(CODE_SEGMENT, 0x0100);
    program.push(OpCode::mov(Register::CX, Operand::imm16(5)).unwrap());
    program.push(OpCode::mov(Register::AX, Operand::imm16(0)).unwrap());
    let top = program.push(OpCode::add(Register::AX, Operand::imm16(2)).unwrap());
    program.push(OpCode::cmp(Register::AX, Operand::imm16(4)).unwrap());
    program.push(OpCode::loop_(kind, top));
    program.push(OpCode::hlt());
    program
}

#[test]
fn test_loop_runs_cx_times() {
    let (mut system, mut cpu) = machine();
    cpu.set_ip(0x0100);
    let program = counting_program(LoopKind::Loop);
    let outcome = cpu.run(&mut system, &program, Some(100)).unwrap();

    assert_eq!(outcome, RunOutcome::Halted);
    assert_eq!(cpu.get_register(Register::AX), 10);
    assert_eq!(cpu.get_register(Register::CX), 0);
}

#[test]
fn test_loopne_stops_on_equal() {
    let (mut system, mut cpu) = machine();
    cpu.set_ip(0x0100);
    let program = counting_program(LoopKind::Loopne);
    cpu.run(&mut system, &program, Some(100)).unwrap();

    // AX reaches 4 on the second pass, CMP sets ZF
    assert_eq!(cpu.get_register(Register::AX), 4);
    assert_eq!(cpu.get_register(Register::CX), 3);
}

#[test]
fn test_loope_stops_on_not_equal() {
    let (mut system, mut cpu) = machine();
    cpu.set_ip(0x0100);
    let program = counting_program(LoopKind::Loope);
    cpu.run(&mut system, &program, Some(100)).unwrap();

    assert_eq!(cpu.get_register(Register::AX), 2);
    assert_eq!(cpu.get_register(Register::CX), 4);
}

#[test]
fn test_loop_does_not_touch_flags() {
    let (mut system, mut cpu) = machine();
    cpu.set_register(Register::CX, 1);
    cpu.flags_mut().set(Flag::Zero, false);
    cpu.execute(&mut system, &OpCode::loop_(LoopKind::Loop, 0x0200)).unwrap();

    assert_eq!(cpu.get_register(Register::CX), 0);
    assert!(!cpu.flags().zero());
}

#[test]
fn test_jcxz() {
    let (mut system, mut cpu) = machine();
    cpu.set_ip(0x0100);
    cpu.set_register(Register::CX, 1);
    cpu.execute(&mut system, &OpCode::jcxz(0x0200)).unwrap();
    assert_eq!(cpu.ip(), 0x0100);

    cpu.set_register(Register::CX, 0);
    cpu.execute(&mut system, &OpCode::jcxz(0x0200)).unwrap();
    assert_eq!(cpu.ip(), 0x0200);
}

#[test]
fn test_call_and_ret_near() {
    let (mut system, mut cpu) = machine();
    cpu.set_ip(0x0105);
    cpu.execute(&mut system, &OpCode::call(Operand::imm16(0x0300)).unwrap())
        .unwrap();

    assert_eq!(cpu.ip(), 0x0300);
    assert_eq!(cpu.get_register(Register::SP), 0x03FE);
    assert_eq!(cpu.memory.get_word(STACK_SEGMENT, 0x03FE), 0x0105);

    cpu.execute(&mut system, &OpCode::ret(0)).unwrap();
    assert_eq!(cpu.ip(), 0x0105);
    assert_eq!(cpu.get_register(Register::SP), 0x0400);
}

#[test]
fn test_ret_releases_arguments() {
    let (mut system, mut cpu) = machine();
    cpu.set_ip(0x0110);
    cpu.push_value(0x1111, OperandSize::Word).unwrap();
    cpu.push_value(0x2222, OperandSize::Word).unwrap();
    cpu.execute(&mut system, &OpCode::call(Operand::imm16(0x0400)).unwrap())
        .unwrap();
    cpu.execute(&mut system, &OpCode::ret(4)).unwrap();

    assert_eq!(cpu.ip(), 0x0110);
    assert_eq!(cpu.get_register(Register::SP), 0x0400);
}

#[test]
fn test_call_and_retf_far() {
    let (mut system, mut cpu) = machine();
    cpu.set_ip(0x0123);
    cpu.execute(&mut system, &OpCode::call(Operand::far(0x7000, 0x0040)).unwrap())
        .unwrap();

    assert_eq!(cpu.get_register(Register::CS), 0x7000);
    assert_eq!(cpu.ip(), 0x0040);
    assert_eq!(cpu.memory.get_word(STACK_SEGMENT, 0x03FC), 0x0123);
    assert_eq!(cpu.memory.get_word(STACK_SEGMENT, 0x03FE), CODE_SEGMENT);

    cpu.execute(&mut system, &OpCode::retf(0)).unwrap();
    assert_eq!(cpu.get_register(Register::CS), CODE_SEGMENT as u32);
    assert_eq!(cpu.ip(), 0x0123);
}

#[test]
fn test_interrupt_and_iret_through_vector_table() {
    let (mut system, mut cpu) = machine();
    system.interrupts.register(0x60, VectorHandler::new(0x60));
    cpu.memory.set_word(0x0000, 0x0180, 0x0010);
    cpu.memory.set_word(0x0000, 0x0182, 0x5000);
    cpu.set_ip(0x0123);
    cpu.flags_mut().set(Flag::Interrupt, true);
    cpu.flags_mut().set(Flag::Carry, true);

    cpu.execute(&mut system, &OpCode::int(0x60)).unwrap();
    assert_eq!(cpu.get_register(Register::CS), 0x5000);
    assert_eq!(cpu.ip(), 0x0010);
    assert!(!cpu.flags().interrupt());

    cpu.flags_mut().set(Flag::Carry, false);
    cpu.execute(&mut system, &OpCode::iret()).unwrap();
    assert_eq!(cpu.get_register(Register::CS), CODE_SEGMENT as u32);
    assert_eq!(cpu.ip(), 0x0123);
    assert!(cpu.flags().interrupt());
    assert!(cpu.flags().carry());
    assert_eq!(cpu.get_register(Register::SP), 0x0400);
}

#[test]
fn test_ret_on_empty_stack_underflows() {
    let (mut system, mut cpu) = machine();
    let result = cpu.execute(&mut system, &OpCode::ret(0));
    assert!(matches!(
        result,
        Err(crate::error::CpuError::StackUnderflow { .. })
    ));
}

#[test]
fn test_iret_with_short_frame_leaves_stack() {
    let (mut system, mut cpu) = machine();
    cpu.push_value(0x0123, OperandSize::Word).unwrap();
    cpu.push_value(0x5000, OperandSize::Word).unwrap();
    cpu.set_ip(0x0200);

    let result = cpu.execute(&mut system, &OpCode::iret());
    assert!(matches!(
        result,
        Err(crate::error::CpuError::StackUnderflow { .. })
    ));
    assert_eq!(cpu.get_register(Register::SP), 0x03FC);
    assert_eq!(cpu.get_register(Register::CS), CODE_SEGMENT as u32);
    assert_eq!(cpu.ip(), 0x0200);
}

#[test]
fn test_retf_with_short_frame_leaves_stack() {
    let (mut system, mut cpu) = machine();
    cpu.push_value(0x0123, OperandSize::Word).unwrap();

    assert!(cpu.execute(&mut system, &OpCode::retf(0)).is_err());
    assert_eq!(cpu.get_register(Register::SP), 0x03FE);
    assert_eq!(cpu.get_register(Register::CS), CODE_SEGMENT as u32);
}

#[test]
fn test_transfer_target_must_be_general_word_register() {
    assert!(OpCode::jmp(Register::AL).is_err());
    assert!(OpCode::call(Register::CS).is_err());
    assert!(OpCode::jmp(Register::FLAGS).is_err());
    assert!(OpCode::call(Register::BX).is_ok());
    assert!(OpCode::jmp(Register::EAX).is_ok());
}
