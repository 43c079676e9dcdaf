//! Tests for stack instructions

use super::{machine, run_all, STACK_SEGMENT};
use crate::cpu_80x86::CpuModel;
use crate::error::CpuError;
use crate::flags::Flag;
use crate::opcodes::{OpCode, StackOp};
use crate::operand::{MemoryReference, Operand, OperandSize};
use crate::register::Register;

#[test]
fn test_push_cx_pop_ds() {
    let (mut system, mut cpu) = machine();
    run_all(
        &mut system,
        &mut cpu,
        &[
            OpCode::mov(Register::CX, Operand::imm16(0x13CF)).unwrap(),
            OpCode::push(Register::CX).unwrap(),
            OpCode::pop(Register::DS).unwrap(),
        ],
    )
    .unwrap();

    assert_eq!(cpu.get_register(Register::DS), 0x13CF);
    assert_eq!(cpu.get_register(Register::CX), 0x13CF);
    assert_eq!(cpu.get_register(Register::SP), 0x0400);
}

#[test]
fn test_push_pop_memory_operand() {
    let (mut system, mut cpu) = machine();
    let slot = MemoryReference::direct(OperandSize::Word, 0x0080);
    cpu.set_register(Register::DX, 0x5A5A);
    run_all(
        &mut system,
        &mut cpu,
        &[OpCode::push(Register::DX).unwrap(), OpCode::pop(slot).unwrap()],
    )
    .unwrap();

    assert_eq!(
        cpu.memory.get_word(super::DATA_SEGMENT, 0x0080),
        0x5A5A
    );
}

#[test]
fn test_push_immediate_needs_80186() {
    let push = OpCode::push(Operand::imm16(0x1234)).unwrap();
    assert_eq!(push.required_model(), CpuModel::Intel80186);
    assert_eq!(OpCode::push(Register::AX).unwrap().required_model(), CpuModel::Intel8086);
    assert_eq!(OpCode::push(Register::EAX).unwrap().required_model(), CpuModel::Intel80386);
}

#[test]
fn test_stack_shape_validation() {
    assert!(matches!(
        OpCode::pop(Register::CS),
        Err(CpuError::IllegalInstruction(_))
    ));
    assert!(matches!(
        OpCode::push(Register::AL),
        Err(CpuError::InvalidOperand { .. })
    ));
    assert!(matches!(
        OpCode::pop(Operand::imm16(1)),
        Err(CpuError::InvalidOperand { .. })
    ));
    assert!(OpCode::push(Register::CS).is_ok());
}

#[test]
fn test_pushf_popf() {
    let (mut system, mut cpu) = machine();
    cpu.flags_mut().set(Flag::Carry, true);
    cpu.flags_mut().set(Flag::Direction, true);
    cpu.execute(&mut system, &OpCode::stack(StackOp::Pushf)).unwrap();
    assert_eq!(
        cpu.memory.get_word(STACK_SEGMENT, 0x03FE),
        cpu.flags().bits()
    );

    cpu.flags_mut().set_bits(0);
    cpu.execute(&mut system, &OpCode::stack(StackOp::Popf)).unwrap();
    assert!(cpu.flags().carry());
    assert!(cpu.flags().direction());
    assert_eq!(cpu.get_register(Register::SP), 0x0400);
}

#[test]
fn test_pusha_popa_opcodes_round_trip() {
    let (mut system, mut cpu) = machine();
    let regs = [
        Register::AX,
        Register::CX,
        Register::DX,
        Register::BX,
        Register::BP,
        Register::SI,
        Register::DI,
    ];
    for (i, &r) in regs.iter().enumerate() {
        cpu.set_register(r, 0x0A00 + i as u32);
    }
    cpu.execute(&mut system, &OpCode::stack(StackOp::Pusha)).unwrap();
    assert_eq!(cpu.get_register(Register::SP), 0x0400 - 16);
    for &r in &regs {
        cpu.set_register(r, 0);
    }
    cpu.execute(&mut system, &OpCode::stack(StackOp::Popa)).unwrap();

    for (i, &r) in regs.iter().enumerate() {
        assert_eq!(cpu.get_register(r), 0x0A00 + i as u32);
    }
    assert_eq!(cpu.get_register(Register::SP), 0x0400);
}

#[test]
fn test_enter_leave_frame() {
    let (mut system, mut cpu) = machine();
    cpu.set_register(Register::BP, 0x1234);
    cpu.execute(&mut system, &OpCode::enter(6, 0)).unwrap();

    assert_eq!(cpu.get_register(Register::BP), 0x03FE);
    assert_eq!(cpu.get_register(Register::SP), 0x03FE - 6);
    assert_eq!(cpu.memory.get_word(STACK_SEGMENT, 0x03FE), 0x1234);

    cpu.execute(&mut system, &OpCode::stack(StackOp::Leave)).unwrap();
    assert_eq!(cpu.get_register(Register::BP), 0x1234);
    assert_eq!(cpu.get_register(Register::SP), 0x0400);
}

#[test]
fn test_pop_on_empty_stack_fails() {
    let (mut system, mut cpu) = machine();
    let result = cpu.execute(&mut system, &OpCode::pop(Register::AX).unwrap());
    assert_eq!(
        result,
        Err(CpuError::StackUnderflow {
            ss: STACK_SEGMENT,
            sp: 0x0400
        })
    );
}

#[test]
fn test_pushad_needs_80386() {
    let (mut system, mut cpu) = machine();
    cpu.set_model(CpuModel::Intel80286);
    let result = cpu.execute(&mut system, &OpCode::stack(StackOp::Pushad));
    assert_eq!(
        result,
        Err(CpuError::UnsupportedModel {
            mnemonic: "PUSHAD",
            required: CpuModel::Intel80386,
            model: CpuModel::Intel80286,
        })
    );
    assert_eq!(cpu.get_register(Register::SP), 0x0400);
}
