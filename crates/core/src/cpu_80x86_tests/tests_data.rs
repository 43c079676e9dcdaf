//! Tests for data movement

use super::{machine, run_all, DATA_SEGMENT, STACK_SEGMENT};
use crate::error::CpuError;
use crate::opcodes::{ImpliedData, OpCode};
use crate::operand::{MemoryReference, Operand, OperandSize};
use crate::register::{Register, SegmentRegister};

#[test]
fn test_mov_register_halves() {
    let (mut system, mut cpu) = machine();
    run_all(
        &mut system,
        &mut cpu,
        &[
            OpCode::mov(Register::AX, Operand::imm16(0x1234)).unwrap(),
            OpCode::mov(Register::AH, Operand::imm8(0xAB)).unwrap(),
            OpCode::mov(Register::BL, Register::AL).unwrap(),
        ],
    )
    .unwrap();

    assert_eq!(cpu.get_register(Register::AX), 0xAB34);
    assert_eq!(cpu.get_register(Register::BX), 0x0034);
}

#[test]
fn test_mov_memory_uses_ds() {
    let (mut system, mut cpu) = machine();
    cpu.set_register(Register::BX, 0x0100);
    cpu.set_register(Register::SI, 0x0020);
    let slot = MemoryReference::indexed(OperandSize::Word, Register::BX, Register::SI, 0x10);
    cpu.execute(&mut system, &OpCode::mov(slot, Operand::imm16(0xBEEF)).unwrap())
        .unwrap();

    assert_eq!(cpu.memory.get_word(DATA_SEGMENT, 0x0130), 0xBEEF);
    assert_eq!(cpu.memory.get_byte(DATA_SEGMENT, 0x0130), 0xEF);
}

#[test]
fn test_bp_addressing_defaults_to_ss() {
    let (mut system, mut cpu) = machine();
    cpu.set_register(Register::BP, 0x0200);
    cpu.memory.set_word(STACK_SEGMENT, 0x01FE, 0x4242);
    let local = MemoryReference::based(OperandSize::Word, Register::BP, -2);
    cpu.execute(&mut system, &OpCode::mov(Register::AX, local).unwrap())
        .unwrap();

    assert_eq!(cpu.get_register(Register::AX), 0x4242);
}

#[test]
fn test_mov_into_cs_rejected() {
    let result = OpCode::mov(Register::CS, Register::AX);
    assert!(matches!(result, Err(CpuError::InvalidOperand { .. })));
}

#[test]
fn test_mov_segment_from_immediate_rejected() {
    let result = OpCode::mov(Register::DS, Operand::imm16(0x13CF));
    assert!(matches!(result, Err(CpuError::IllegalInstruction(_))));
}

#[test]
fn test_xchg() {
    let (mut system, mut cpu) = machine();
    cpu.set_register(Register::AX, 0x1111);
    cpu.set_register(Register::DX, 0x2222);
    cpu.execute(&mut system, &OpCode::xchg(Register::AX, Register::DX).unwrap())
        .unwrap();

    assert_eq!(cpu.get_register(Register::AX), 0x2222);
    assert_eq!(cpu.get_register(Register::DX), 0x1111);
}

#[test]
fn test_lea_computes_offset_only() {
    let (mut system, mut cpu) = machine();
    cpu.set_register(Register::BX, 0x1000);
    cpu.set_register(Register::DI, 0x0004);
    let src = MemoryReference::indexed(OperandSize::Word, Register::BX, Register::DI, -1);
    cpu.execute(&mut system, &OpCode::lea(Register::SI, src).unwrap())
        .unwrap();

    assert_eq!(cpu.get_register(Register::SI), 0x1003);
}

#[test]
fn test_lds_loads_offset_and_segment() {
    let (mut system, mut cpu) = machine();
    cpu.memory.set_word(DATA_SEGMENT, 0x0040, 0x2000);
    cpu.memory.set_word(DATA_SEGMENT, 0x0042, 0x13CF);
    let pointer = MemoryReference::direct(OperandSize::DoubleWord, 0x0040);
    cpu.execute(
        &mut system,
        &OpCode::load_far_pointer(SegmentRegister::DS, Register::DX, pointer).unwrap(),
    )
    .unwrap();

    assert_eq!(cpu.get_register(Register::DX), 0x2000);
    assert_eq!(cpu.get_register(Register::DS), 0x13CF);
}

#[test]
fn test_movsx_and_movzx() {
    let (mut system, mut cpu) = machine();
    cpu.set_register(Register::BL, 0x80);
    run_all(
        &mut system,
        &mut cpu,
        &[
            OpCode::movsx(Register::AX, Register::BL).unwrap(),
            OpCode::movzx(Register::CX, Register::BL).unwrap(),
        ],
    )
    .unwrap();

    assert_eq!(cpu.get_register(Register::AX), 0xFF80);
    assert_eq!(cpu.get_register(Register::CX), 0x0080);
}

#[test]
fn test_sign_extension_family() {
    let (mut system, mut cpu) = machine();
    cpu.set_register(Register::AL, 0xF0);
    run_all(
        &mut system,
        &mut cpu,
        &[OpCode::implied(ImpliedData::Cbw), OpCode::implied(ImpliedData::Cwd)],
    )
    .unwrap();
    assert_eq!(cpu.get_register(Register::AX), 0xFFF0);
    assert_eq!(cpu.get_register(Register::DX), 0xFFFF);

    cpu.execute(&mut system, &OpCode::implied(ImpliedData::Cwde)).unwrap();
    assert_eq!(cpu.get_register(Register::EAX), 0xFFFF_FFF0);
}

#[test]
fn test_lahf_sahf_round_trip() {
    let (mut system, mut cpu) = machine();
    cpu.set_register(Register::AH, 0xD5);
    cpu.execute(&mut system, &OpCode::implied(ImpliedData::Sahf)).unwrap();
    assert!(cpu.flags().sign());
    assert!(cpu.flags().zero());
    assert!(cpu.flags().auxiliary());
    assert!(cpu.flags().parity());
    assert!(cpu.flags().carry());

    cpu.set_register(Register::AH, 0);
    cpu.execute(&mut system, &OpCode::implied(ImpliedData::Lahf)).unwrap();
    assert_eq!(cpu.get_register(Register::AH), 0xD7);
}

#[test]
fn test_xlat_table_lookup() {
    let (mut system, mut cpu) = machine();
    cpu.memory.set_bytes(DATA_SEGMENT, 0x0300, b"0123456789ABCDEF");
    cpu.set_register(Register::BX, 0x0300);
    cpu.set_register(Register::AL, 0x0C);
    cpu.execute(&mut system, &OpCode::implied(ImpliedData::Xlat)).unwrap();

    assert_eq!(cpu.get_register(Register::AL), b'C' as u32);
}
