//! Tests for interrupts, ports, segment overrides, CPU models and the fetch loop

use super::{machine, run_all, CODE_SEGMENT, DATA_SEGMENT, EXTRA_SEGMENT};
use crate::cpu_80x86::{CpuModel, Intel80x86, RunOutcome};
use crate::error::CpuError;
use crate::opcodes::{ControlOp, OpCode, PrivilegedKind, StackOp};
use crate::operand::{MemoryReference, Operand, OperandSize};
use crate::program::Program;
use crate::register::{Register, SegmentRegister};
use crate::system::IbmPc;

#[test]
fn test_segment_override_is_scoped() {
    let (mut system, mut cpu) = machine();
    cpu.memory.set_word(EXTRA_SEGMENT, 0x0010, 0x1111);
    cpu.memory.set_word(DATA_SEGMENT, 0x0010, 0x2222);
    let src = MemoryReference::direct(OperandSize::Word, 0x0010);
    let load = OpCode::mov(Register::AX, src).unwrap();
    let prefixed = OpCode::with_segment(SegmentRegister::ES, load.clone()).unwrap();

    cpu.execute(&mut system, &prefixed).unwrap();
    assert_eq!(cpu.get_register(Register::AX), 0x1111);
    assert_eq!(cpu.segment_override(), None);
    assert_eq!(cpu.get_register(Register::DS), DATA_SEGMENT as u32);

    cpu.execute(&mut system, &load).unwrap();
    assert_eq!(cpu.get_register(Register::AX), 0x2222);
}

#[test]
fn test_segment_override_restored_on_failure() {
    let (mut system, mut cpu) = machine();
    let divisor = MemoryReference::direct(OperandSize::Byte, 0x0030);
    let prefixed =
        OpCode::with_segment(SegmentRegister::ES, OpCode::div(divisor).unwrap()).unwrap();

    let result = cpu.execute(&mut system, &prefixed);
    assert_eq!(result, Err(CpuError::DivideError));
    assert_eq!(cpu.segment_override(), None);
    assert_eq!(cpu.get_register(Register::DS), DATA_SEGMENT as u32);
    assert_eq!(cpu.get_register(Register::ES), EXTRA_SEGMENT as u32);
}

#[test]
fn test_explicit_segment_beats_override() {
    let (mut system, mut cpu) = machine();
    cpu.memory.set_byte(DATA_SEGMENT, 0x0001, 0x0D);
    cpu.memory.set_byte(EXTRA_SEGMENT, 0x0001, 0x0E);
    let src = MemoryReference::direct(OperandSize::Byte, 0x0001).with_segment(SegmentRegister::DS);
    let prefixed =
        OpCode::with_segment(SegmentRegister::ES, OpCode::mov(Register::AL, src).unwrap()).unwrap();
    cpu.execute(&mut system, &prefixed).unwrap();

    assert_eq!(cpu.get_register(Register::AL), 0x0D);
}

#[test]
fn test_segment_override_display() {
    let src = MemoryReference::based(OperandSize::Byte, Register::DI, 4);
    let prefixed =
        OpCode::with_segment(SegmentRegister::ES, OpCode::mov(Register::AL, src).unwrap()).unwrap();
    assert_eq!(prefixed.to_string(), "ES: MOV AL,BYTE PTR [DI+0004]");
    assert_eq!(prefixed.mnemonic(), "MOV");
}

#[test]
fn test_unhandled_interrupt() {
    let (mut system, mut cpu) = machine();
    let result = cpu.execute(&mut system, &OpCode::int(0x99));
    assert_eq!(result, Err(CpuError::UnhandledInterrupt(0x99)));
}

#[test]
fn test_registered_handler_mutates_cpu() {
    let (mut system, mut cpu) = machine();
    system
        .interrupts
        .register(0x1A, |_: &mut IbmPc, cpu: &mut Intel80x86| -> Result<(), CpuError> {
            cpu.set_register(Register::CX, 0x07E8);
            cpu.set_register(Register::DH, 10);
            cpu.set_register(Register::DL, 16);
            Ok(())
        });
    cpu.execute(&mut system, &OpCode::int(0x1A)).unwrap();

    assert_eq!(cpu.get_register(Register::CX), 0x07E8);
    assert_eq!(cpu.get_register(Register::DX), 0x0A10);
}

#[test]
fn test_into_only_on_overflow() {
    let (mut system, mut cpu) = machine();
    cpu.execute(&mut system, &OpCode::control(ControlOp::Into)).unwrap();

    cpu.set_register(Register::AL, 0x7F);
    cpu.execute(&mut system, &OpCode::add(Register::AL, Operand::imm8(1)).unwrap())
        .unwrap();
    let result = cpu.execute(&mut system, &OpCode::control(ControlOp::Into));
    assert_eq!(result, Err(CpuError::UnhandledInterrupt(0x04)));
}

#[test]
fn test_bound_in_and_out_of_range() {
    let (mut system, mut cpu) = machine();
    cpu.memory.set_word(DATA_SEGMENT, 0x0020, 0);
    cpu.memory.set_word(DATA_SEGMENT, 0x0022, 10);
    let bounds = MemoryReference::direct(OperandSize::Word, 0x0020);
    let bound = OpCode::bound(Register::BX, bounds).unwrap();

    cpu.set_register(Register::BX, 10);
    cpu.execute(&mut system, &bound).unwrap();

    cpu.set_register(Register::BX, 0xFFFF);
    let result = cpu.execute(&mut system, &bound);
    assert_eq!(result, Err(CpuError::UnhandledInterrupt(0x05)));
}

#[test]
fn test_out_then_in_through_ports() {
    let (mut system, mut cpu) = machine();
    cpu.set_register(Register::AX, 0x3342);
    cpu.set_register(Register::DX, 0x0060);
    run_all(
        &mut system,
        &mut cpu,
        &[OpCode::output(Operand::imm8(0x60), Register::AL).unwrap()],
    )
    .unwrap();
    assert_eq!(system.ports.in_byte(0x60), 0x42);
    assert_eq!(system.ports.in_byte(0x61), 0x00);

    system.ports.out_byte(0x61, 0x33);
    cpu.set_register(Register::AX, 0);
    cpu.execute(
        &mut system,
        &OpCode::input(Register::AX, Operand::reg(Register::DX)).unwrap(),
    )
    .unwrap();
    assert_eq!(cpu.get_register(Register::AX), 0x3342);
}

#[test]
fn test_io_operand_validation() {
    assert!(OpCode::input(Register::BX, Operand::imm8(0x60)).is_err());
    assert!(OpCode::input(Register::AL, Operand::reg(Register::CX)).is_err());
    assert!(OpCode::output(Operand::imm16(0x3F8), Register::AL).is_err());
}

#[test]
fn test_unsupported_model_rejected_before_execution() {
    let (mut system, mut cpu) = machine();
    cpu.set_model(CpuModel::Intel8086);
    cpu.set_register(Register::AX, 0x1234);
    let result = cpu.execute(&mut system, &OpCode::stack(StackOp::Pusha));

    assert!(matches!(
        result,
        Err(CpuError::UnsupportedModel {
            required: CpuModel::Intel80186,
            ..
        })
    ));
    assert_eq!(cpu.get_register(Register::SP), 0x0400);

    cpu.set_model(CpuModel::Intel80188);
    cpu.execute(&mut system, &OpCode::stack(StackOp::Pusha)).unwrap();
    assert_eq!(cpu.get_register(Register::SP), 0x03F0);
}

#[test]
fn test_machine_status_word() {
    let (mut system, mut cpu) = machine();
    cpu.set_register(Register::AX, 0x000E);
    cpu.execute(&mut system, &OpCode::lmsw(Register::AX).unwrap()).unwrap();
    cpu.execute(&mut system, &OpCode::smsw(Register::BX).unwrap()).unwrap();
    assert_eq!(cpu.get_register(Register::BX), 0x000E);

    cpu.set_register(Register::AX, 0x0001);
    assert_eq!(
        cpu.execute(&mut system, &OpCode::lmsw(Register::AX).unwrap()),
        Err(CpuError::UnimplementedInstruction("LMSW"))
    );
}

#[test]
fn test_privileged_instructions_unimplemented() {
    let (mut system, mut cpu) = machine();
    for (kind, mnemonic) in [
        (PrivilegedKind::Ltr, "LTR"),
        (PrivilegedKind::Lgdt, "LGDT"),
        (PrivilegedKind::Clts, "CLTS"),
    ] {
        let result = cpu.execute(&mut system, &OpCode::privileged(kind));
        assert_eq!(result, Err(CpuError::UnimplementedInstruction(mnemonic)));
    }
}

#[test]
fn test_flag_control() {
    let (mut system, mut cpu) = machine();
    run_all(
        &mut system,
        &mut cpu,
        &[
            OpCode::control(ControlOp::Stc),
            OpCode::control(ControlOp::Cmc),
            OpCode::control(ControlOp::Std),
            OpCode::control(ControlOp::Sti),
        ],
    )
    .unwrap();
    assert!(!cpu.flags().carry());
    assert!(cpu.flags().direction());
    assert!(cpu.flags().interrupt());

    run_all(
        &mut system,
        &mut cpu,
        &[OpCode::control(ControlOp::Cld), OpCode::control(ControlOp::Cli)],
    )
    .unwrap();
    assert!(!cpu.flags().direction());
    assert!(!cpu.flags().interrupt());
}

#[test]
fn test_hello_world_through_int21() {
    let (mut system, mut cpu) = machine();
    system
        .interrupts
        .register(0x21, |system: &mut IbmPc, cpu: &mut Intel80x86| -> Result<(), CpuError> {
            let function = cpu.get_register(Register::AH) as u8;
            if function != 0x09 {
                return Err(CpuError::UnsupportedService {
                    vector: 0x21,
                    function,
                });
            }
            let ds = cpu.registers.word(Register::DS);
            let dx = cpu.registers.word(Register::DX);
            let text = cpu.memory.read_until(ds, dx, b'$', 0x10000);
            system.console.write_bytes(&text);
            Ok(())
        });
    cpu.memory.set_bytes(0x13CF, 0x2000, b"Hello World$");

    let mut program = Program::new();
    program.org(CODE_SEGMENT, 0x0100);
    program.push(OpCode::mov(Register::CX, Operand::imm16(0x13CF)).unwrap());
    program.push(OpCode::push(Register::CX).unwrap());
    program.push(OpCode::pop(Register::DS).unwrap());
    program.push(OpCode::mov(Register::DX, Operand::imm16(0x2000)).unwrap());
    program.push(OpCode::mov(Register::AH, Operand::imm8(0x09)).unwrap());
    program.push(OpCode::int(0x21));
    cpu.set_ip(0x0100);

    let outcome = cpu.run(&mut system, &program, None).unwrap();
    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(cpu.get_register(Register::CX), 0x13CF);
    assert_eq!(cpu.get_register(Register::DS), 0x13CF);
    assert_eq!(cpu.get_register(Register::DX), 0x2000);
    assert_eq!(cpu.get_register(Register::AH), 0x09);
    assert_eq!(system.console.transcript(), "Hello World");
    assert_eq!(cpu.instructions_executed(), 6);
}

#[test]
fn test_step_restores_ip_on_failure() {
    let (mut system, mut cpu) = machine();
    let mut program = Program::new();
    program.org(CODE_SEGMENT, 0x0100);
    program.push_with_length(OpCode::div(Register::BL).unwrap(), 2, 0xF6F3);
    cpu.set_ip(0x0100);

    let result = cpu.step(&mut system, &program);
    assert_eq!(result, Err(CpuError::DivideError));
    assert_eq!(cpu.ip(), 0x0100);
    assert_eq!(cpu.instructions_executed(), 0);
}

#[test]
fn test_step_restores_sp_on_failure() {
    let (mut system, mut cpu) = machine();
    system.interrupts.register(
        0x70,
        |_: &mut IbmPc, cpu: &mut Intel80x86| -> Result<(), CpuError> {
            cpu.push_value(0xBEEF, OperandSize::Word)?;
            Err(CpuError::UnsupportedService {
                vector: 0x70,
                function: 0,
            })
        },
    );
    let mut program = Program::new();
    program.org(CODE_SEGMENT, 0x0100);
    program.push(OpCode::int(0x70));
    cpu.set_ip(0x0100);

    assert!(cpu.step(&mut system, &program).is_err());
    assert_eq!(cpu.get_register(Register::SP), 0x0400);
    assert_eq!(cpu.ip(), 0x0100);
}

#[test]
fn test_run_step_limit() {
    let (mut system, mut cpu) = machine();
    let mut program = Program::new();
    program.org(CODE_SEGMENT, 0x0100);
    program.push(OpCode::jmp(Operand::imm16(0x0100)).unwrap());
    cpu.set_ip(0x0100);

    let result = cpu.run(&mut system, &program, Some(10));
    assert_eq!(result, Err(CpuError::StepLimitExceeded(10)));
    assert_eq!(cpu.instructions_executed(), 10);
}

#[test]
fn test_run_halts() {
    let (mut system, mut cpu) = machine();
    let mut program = Program::new();
    program.org(CODE_SEGMENT, 0x0100);
    program.push(OpCode::hlt());
    program.push(OpCode::nop());
    cpu.set_ip(0x0100);

    assert_eq!(cpu.run(&mut system, &program, None), Ok(RunOutcome::Halted));
    assert!(cpu.is_halted());
    assert_eq!(cpu.ip(), 0x0101);
}

#[test]
fn test_step_without_instruction() {
    let (mut system, mut cpu) = machine();
    let mut program = Program::new();
    program.org(CODE_SEGMENT, 0x0100);
    program.push(OpCode::nop());
    cpu.set_ip(0x0050);

    assert_eq!(
        cpu.step(&mut system, &program),
        Err(CpuError::InvalidInstructionPointer {
            cs: CODE_SEGMENT,
            ip: 0x0050
        })
    );
}
