//! Tests for integer arithmetic and its flag effects

use super::{machine, run_all, DATA_SEGMENT};
use crate::cpu_80x86::Intel80x86;
use crate::error::CpuError;
use crate::flags::Flag;
use crate::opcodes::{ControlOp, DecimalAdjust, OpCode};
use crate::operand::{MemoryReference, Operand, OperandSize};
use crate::register::Register;
use crate::system::IbmPc;

fn mov(reg: Register, value: u16) -> OpCode {
    OpCode::mov(reg, Operand::imm16(value)).unwrap()
}

fn mov8(reg: Register, value: u8) -> OpCode {
    OpCode::mov(reg, Operand::imm8(value)).unwrap()
}

#[test]
fn test_add_word_wraps_with_carry() {
    let (mut system, mut cpu) = machine();
    run_all(
        &mut system,
        &mut cpu,
        &[mov(Register::AX, 0xFFFE), OpCode::add(Register::AX, Operand::imm16(22)).unwrap()],
    )
    .unwrap();

    assert_eq!(cpu.get_register(Register::AX), 0x0014);
    let flags = cpu.flags();
    assert!(flags.carry());
    assert!(!flags.overflow());
    assert!(!flags.zero());
    assert!(!flags.sign());
    assert!(flags.auxiliary());
    assert!(flags.parity());
}

#[test]
fn test_add_signed_overflow() {
    let (mut system, mut cpu) = machine();
    run_all(
        &mut system,
        &mut cpu,
        &[mov(Register::AX, 0x7FFF), OpCode::add(Register::AX, Operand::imm16(1)).unwrap()],
    )
    .unwrap();

    assert_eq!(cpu.get_register(Register::AX), 0x8000);
    assert!(cpu.flags().overflow());
    assert!(cpu.flags().sign());
    assert!(!cpu.flags().carry());
}

#[test]
fn test_compare_equal_sets_zero() {
    let (mut system, mut cpu) = machine();
    run_all(
        &mut system,
        &mut cpu,
        &[mov(Register::AX, 4321), OpCode::cmp(Register::AX, Operand::imm16(4321)).unwrap()],
    )
    .unwrap();

    assert!(cpu.flags().zero());
    assert!(!cpu.flags().carry());
    assert_eq!(cpu.get_register(Register::AX), 4321);
}

#[test]
fn test_compare_greater_clears_zero() {
    let (mut system, mut cpu) = machine();
    run_all(
        &mut system,
        &mut cpu,
        &[mov(Register::AX, 4321), OpCode::cmp(Register::AX, Operand::imm16(1234)).unwrap()],
    )
    .unwrap();

    let flags = cpu.flags();
    assert!(!flags.zero());
    assert!(!flags.carry());
    // signed greater: SF == OF
    assert_eq!(flags.sign(), flags.overflow());
}

#[test]
fn test_compare_below_sets_carry() {
    let (mut system, mut cpu) = machine();
    run_all(
        &mut system,
        &mut cpu,
        &[mov(Register::AX, 1234), OpCode::cmp(Register::AX, Operand::imm16(4321)).unwrap()],
    )
    .unwrap();

    let flags = cpu.flags();
    assert!(flags.carry());
    assert!(!flags.zero());
    assert_ne!(flags.sign(), flags.overflow());
}

#[test]
fn test_adc_and_sbb_use_carry() {
    let (mut system, mut cpu) = machine();
    run_all(
        &mut system,
        &mut cpu,
        &[
            mov8(Register::AL, 0x10),
            OpCode::control(ControlOp::Stc),
            OpCode::adc(Register::AL, Operand::imm8(0x01)).unwrap(),
            mov8(Register::BL, 0x10),
            OpCode::control(ControlOp::Stc),
            OpCode::sbb(Register::BL, Operand::imm8(0x01)).unwrap(),
        ],
    )
    .unwrap();

    assert_eq!(cpu.get_register(Register::AL), 0x12);
    assert_eq!(cpu.get_register(Register::BL), 0x0E);
}

#[test]
fn test_signed_immediate_is_sign_extended() {
    let (mut system, mut cpu) = machine();
    run_all(
        &mut system,
        &mut cpu,
        &[mov(Register::BX, 0x0010), OpCode::add(Register::BX, Operand::simm8(-2)).unwrap()],
    )
    .unwrap();

    assert_eq!(cpu.get_register(Register::BX), 0x000E);
    assert!(cpu.flags().carry());
}

#[test]
fn test_inc_preserves_carry() {
    let (mut system, mut cpu) = machine();
    run_all(
        &mut system,
        &mut cpu,
        &[
            OpCode::control(ControlOp::Clc),
            mov(Register::AX, 0xFFFF),
            OpCode::inc(Register::AX).unwrap(),
        ],
    )
    .unwrap();

    assert_eq!(cpu.get_register(Register::AX), 0);
    assert!(cpu.flags().zero());
    assert!(!cpu.flags().carry());
}

#[test]
fn test_dec_memory_byte() {
    let (mut system, mut cpu) = machine();
    cpu.memory.set_byte(DATA_SEGMENT, 0x0050, 0x01);
    let counter = MemoryReference::direct(OperandSize::Byte, 0x0050);
    cpu.execute(&mut system, &OpCode::dec(counter).unwrap()).unwrap();

    assert_eq!(cpu.memory.get_byte(DATA_SEGMENT, 0x0050), 0);
    assert!(cpu.flags().zero());
}

#[test]
fn test_neg() {
    let (mut system, mut cpu) = machine();
    run_all(&mut system, &mut cpu, &[mov8(Register::AL, 1), OpCode::neg(Register::AL).unwrap()])
        .unwrap();

    assert_eq!(cpu.get_register(Register::AL), 0xFF);
    assert!(cpu.flags().carry());
    assert!(cpu.flags().sign());
}

#[test]
fn test_mul_byte_sets_carry_on_high_half() {
    let (mut system, mut cpu) = machine();
    run_all(
        &mut system,
        &mut cpu,
        &[mov8(Register::AL, 0x80), mov8(Register::BL, 2), OpCode::mul(Register::BL).unwrap()],
    )
    .unwrap();

    assert_eq!(cpu.get_register(Register::AX), 0x0100);
    assert!(cpu.flags().carry());
    assert!(cpu.flags().overflow());
}

#[test]
fn test_mul_word_into_dx_ax() {
    let (mut system, mut cpu) = machine();
    run_all(
        &mut system,
        &mut cpu,
        &[mov(Register::AX, 0x1234), mov(Register::BX, 0x0100), OpCode::mul(Register::BX).unwrap()],
    )
    .unwrap();

    assert_eq!(cpu.get_register(Register::DX), 0x0012);
    assert_eq!(cpu.get_register(Register::AX), 0x3400);
}

#[test]
fn test_imul_byte_negative() {
    let (mut system, mut cpu) = machine();
    run_all(
        &mut system,
        &mut cpu,
        &[mov8(Register::AL, 0xFF), mov8(Register::BL, 2), OpCode::imul(Register::BL).unwrap()],
    )
    .unwrap();

    assert_eq!(cpu.get_register(Register::AX), 0xFFFE);
    assert!(!cpu.flags().carry());
}

#[test]
fn test_imul_three_operand() {
    let (mut system, mut cpu) = machine();
    run_all(
        &mut system,
        &mut cpu,
        &[
            mov(Register::BX, 7),
            OpCode::imul_extended(Register::CX, Register::BX, Some(Operand::imm16(6))).unwrap(),
        ],
    )
    .unwrap();

    assert_eq!(cpu.get_register(Register::CX), 42);
}

#[test]
fn test_div_word() {
    let (mut system, mut cpu) = machine();
    run_all(
        &mut system,
        &mut cpu,
        &[
            mov(Register::DX, 0x0001),
            mov(Register::AX, 0x0005),
            mov(Register::BX, 0x0010),
            OpCode::div(Register::BX).unwrap(),
        ],
    )
    .unwrap();

    assert_eq!(cpu.get_register(Register::AX), 0x1000);
    assert_eq!(cpu.get_register(Register::DX), 0x0005);
}

#[test]
fn test_idiv_truncates_toward_zero() {
    let (mut system, mut cpu) = machine();
    run_all(
        &mut system,
        &mut cpu,
        &[mov(Register::AX, 0xFFF9), mov8(Register::BL, 2), OpCode::idiv(Register::BL).unwrap()],
    )
    .unwrap();

    assert_eq!(cpu.get_register(Register::AL), 0xFD);
    assert_eq!(cpu.get_register(Register::AH), 0xFF);
}

#[test]
fn test_divide_by_zero_without_handler() {
    let (mut system, mut cpu) = machine();
    let result = run_all(
        &mut system,
        &mut cpu,
        &[mov(Register::AX, 10), mov8(Register::BL, 0), OpCode::div(Register::BL).unwrap()],
    );
    assert_eq!(result, Err(CpuError::DivideError));
    assert_eq!(cpu.get_register(Register::AX), 10);
}

#[test]
fn test_divide_overflow_routes_to_int0() {
    let (mut system, mut cpu) = machine();
    system
        .interrupts
        .register(0x00, |_: &mut IbmPc, cpu: &mut Intel80x86| -> Result<(), CpuError> {
            cpu.set_register(Register::SI, 0xDEAD);
            Ok(())
        });
    run_all(
        &mut system,
        &mut cpu,
        &[mov(Register::AX, 0x1000), mov8(Register::BL, 2), OpCode::div(Register::BL).unwrap()],
    )
    .unwrap();

    assert_eq!(cpu.get_register(Register::SI), 0xDEAD);
    assert_eq!(cpu.get_register(Register::AX), 0x1000);
}

#[test]
fn test_daa_after_bcd_add() {
    let (mut system, mut cpu) = machine();
    run_all(
        &mut system,
        &mut cpu,
        &[
            mov8(Register::AL, 0x15),
            OpCode::add(Register::AL, Operand::imm8(0x27)).unwrap(),
            OpCode::adjust(DecimalAdjust::Daa),
        ],
    )
    .unwrap();

    assert_eq!(cpu.get_register(Register::AL), 0x42);
    assert!(!cpu.flags().carry());
}

#[test]
fn test_aaa_unpacked_carry() {
    let (mut system, mut cpu) = machine();
    run_all(
        &mut system,
        &mut cpu,
        &[
            mov(Register::AX, 0x0008),
            OpCode::add(Register::AL, Operand::imm8(0x05)).unwrap(),
            OpCode::adjust(DecimalAdjust::Aaa),
        ],
    )
    .unwrap();

    assert_eq!(cpu.get_register(Register::AX), 0x0103);
    assert!(cpu.flags().carry());
}

#[test]
fn test_aam_and_aad() {
    let (mut system, mut cpu) = machine();
    run_all(&mut system, &mut cpu, &[mov8(Register::AL, 47), OpCode::adjust(DecimalAdjust::Aam(10))])
        .unwrap();
    assert_eq!(cpu.get_register(Register::AX), 0x0407);

    cpu.execute(&mut system, &OpCode::adjust(DecimalAdjust::Aad(10))).unwrap();
    assert_eq!(cpu.get_register(Register::AX), 47);
}

#[test]
fn test_aam_zero_base_is_divide_error() {
    let (mut system, mut cpu) = machine();
    let result = cpu.execute(&mut system, &OpCode::adjust(DecimalAdjust::Aam(0)));
    assert_eq!(result, Err(CpuError::DivideError));
}

#[test]
fn test_arithmetic_leaves_direction_flag() {
    let (mut system, mut cpu) = machine();
    cpu.flags_mut().set(Flag::Direction, true);
    cpu.flags_mut().set(Flag::Interrupt, true);
    run_all(&mut system, &mut cpu, &[mov(Register::AX, 1), OpCode::sub(Register::AX, Operand::imm16(1)).unwrap()])
        .unwrap();

    assert!(cpu.flags().direction());
    assert!(cpu.flags().interrupt());
    assert!(cpu.flags().zero());
}
