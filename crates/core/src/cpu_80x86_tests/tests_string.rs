//! Tests for string instructions

use super::{machine, DATA_SEGMENT, EXTRA_SEGMENT, STACK_SEGMENT};
use crate::flags::Flag;
use crate::opcodes::{OpCode, Repeat, StringIoKind, StringKind};
use crate::operand::OperandSize;
use crate::register::{Register, SegmentRegister};

#[test]
fn test_rep_movsb_copies_block() {
    let (mut system, mut cpu) = machine();
    cpu.memory.set_bytes(DATA_SEGMENT, 0x0100, b"Hello");
    cpu.set_register(Register::SI, 0x0100);
    cpu.set_register(Register::DI, 0x0200);
    cpu.set_register(Register::CX, 5);
    cpu.execute(
        &mut system,
        &OpCode::string(StringKind::Movs, OperandSize::Byte, Repeat::Rep),
    )
    .unwrap();

    assert_eq!(cpu.memory.get_bytes(EXTRA_SEGMENT, 0x0200, 5), b"Hello");
    assert_eq!(cpu.get_register(Register::CX), 0);
    assert_eq!(cpu.get_register(Register::SI), 0x0105);
    assert_eq!(cpu.get_register(Register::DI), 0x0205);
}

#[test]
fn test_rep_with_zero_count_does_nothing() {
    let (mut system, mut cpu) = machine();
    cpu.set_register(Register::DI, 0x0010);
    cpu.set_register(Register::CX, 0);
    cpu.set_register(Register::AL, 0xAA);
    cpu.execute(
        &mut system,
        &OpCode::string(StringKind::Stos, OperandSize::Byte, Repeat::Rep),
    )
    .unwrap();

    assert_eq!(cpu.memory.get_byte(EXTRA_SEGMENT, 0x0010), 0);
    assert_eq!(cpu.get_register(Register::DI), 0x0010);
}

#[test]
fn test_stosw_backwards_with_direction_flag() {
    let (mut system, mut cpu) = machine();
    cpu.flags_mut().set(Flag::Direction, true);
    cpu.set_register(Register::AX, 0xBEEF);
    cpu.set_register(Register::DI, 0x0010);
    cpu.set_register(Register::CX, 3);
    cpu.execute(
        &mut system,
        &OpCode::string(StringKind::Stos, OperandSize::Word, Repeat::Rep),
    )
    .unwrap();

    assert_eq!(cpu.memory.get_word(EXTRA_SEGMENT, 0x0010), 0xBEEF);
    assert_eq!(cpu.memory.get_word(EXTRA_SEGMENT, 0x000E), 0xBEEF);
    assert_eq!(cpu.memory.get_word(EXTRA_SEGMENT, 0x000C), 0xBEEF);
    assert_eq!(cpu.get_register(Register::DI), 0x000A);
}

#[test]
fn test_repe_cmpsb_stops_at_first_difference() {
    let (mut system, mut cpu) = machine();
    cpu.memory.set_bytes(DATA_SEGMENT, 0x0000, b"ABCDEF");
    cpu.memory.set_bytes(EXTRA_SEGMENT, 0x0000, b"ABCxEF");
    cpu.set_register(Register::CX, 6);
    cpu.execute(
        &mut system,
        &OpCode::string(StringKind::Cmps, OperandSize::Byte, Repeat::Repe),
    )
    .unwrap();

    assert!(!cpu.flags().zero());
    assert_eq!(cpu.get_register(Register::CX), 2);
    assert_eq!(cpu.get_register(Register::SI), 4);
}

#[test]
fn test_repne_scasb_finds_terminator() {
    let (mut system, mut cpu) = machine();
    cpu.memory.set_bytes(EXTRA_SEGMENT, 0x0040, b"Hello World$");
    cpu.set_register(Register::DI, 0x0040);
    cpu.set_register(Register::AL, b'$' as u32);
    cpu.set_register(Register::CX, 0xFFFF);
    cpu.execute(
        &mut system,
        &OpCode::string(StringKind::Scas, OperandSize::Byte, Repeat::Repne),
    )
    .unwrap();

    assert!(cpu.flags().zero());
    // DI is one past the match
    assert_eq!(cpu.get_register(Register::DI), 0x0040 + 12);
    assert_eq!(cpu.get_register(Register::CX), 0xFFFF - 12);
}

#[test]
fn test_lodsb_honours_segment_override() {
    let (mut system, mut cpu) = machine();
    cpu.memory.set_byte(STACK_SEGMENT, 0x0005, 0x77);
    cpu.memory.set_byte(DATA_SEGMENT, 0x0005, 0x11);
    cpu.set_register(Register::SI, 0x0005);
    let lods = OpCode::string(StringKind::Lods, OperandSize::Byte, Repeat::None);
    let prefixed = OpCode::with_segment(SegmentRegister::SS, lods.clone()).unwrap();

    cpu.execute(&mut system, &prefixed).unwrap();
    assert_eq!(cpu.get_register(Register::AL), 0x77);
    assert_eq!(cpu.get_register(Register::SI), 0x0006);

    cpu.set_register(Register::SI, 0x0005);
    cpu.execute(&mut system, &lods).unwrap();
    assert_eq!(cpu.get_register(Register::AL), 0x11);
}

#[test]
fn test_string_display() {
    assert_eq!(
        OpCode::string(StringKind::Movs, OperandSize::Byte, Repeat::Rep).to_string(),
        "REP MOVSB"
    );
    assert_eq!(
        OpCode::string(StringKind::Cmps, OperandSize::Word, Repeat::Rep).to_string(),
        "REPE CMPSW"
    );
    assert_eq!(
        OpCode::string(StringKind::Scas, OperandSize::Byte, Repeat::Repne).to_string(),
        "REPNE SCASB"
    );
    assert_eq!(
        OpCode::string(StringKind::Lods, OperandSize::Word, Repeat::None).to_string(),
        "LODSW"
    );
}

#[test]
fn test_string_io_is_a_logged_no_op() {
    let (mut system, mut cpu) = machine();
    cpu.set_register(Register::DI, 0x0010);
    cpu.set_register(Register::CX, 4);
    let ins = OpCode::string_io(StringIoKind::Ins, OperandSize::Byte, Repeat::Rep);
    cpu.execute(&mut system, &ins).unwrap();

    assert_eq!(cpu.get_register(Register::DI), 0x0010);
    assert_eq!(cpu.get_register(Register::CX), 4);
    assert_eq!(ins.to_string(), "REP INSB");
}
