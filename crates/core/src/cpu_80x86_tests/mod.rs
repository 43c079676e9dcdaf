//! Instruction-level tests for the 80x86 core
//!
//! Tests are organized by instruction family:
//! - `tests_arithmetic`: ADD/SUB/CMP families, INC/DEC/NEG, MUL/DIV, BCD adjust
//! - `tests_bitwise`: logic, NOT, shifts and rotates, bit test/scan
//! - `tests_data`: MOV/XCHG/LEA, far pointer loads, sign extension, LAHF/SAHF
//! - `tests_flow`: jumps, loops, calls and returns
//! - `tests_stack`: PUSH/POP, PUSHA/POPA, PUSHF/POPF, ENTER/LEAVE
//! - `tests_string`: string instructions and REP prefixes
//! - `tests_system`: interrupts, ports, segment overrides, CPU models, the fetch loop

mod tests_arithmetic;
mod tests_data;
mod tests_flow;
mod tests_stack;
mod tests_string;
mod tests_system;

use crate::cpu_80x86::Intel80x86;
use crate::error::CpuError;
use crate::opcodes::OpCode;
use crate::register::Register;
use crate::system::IbmPc;

const CODE_SEGMENT: u16 = 0x1000;
const STACK_SEGMENT: u16 = 0x2000;
const DATA_SEGMENT: u16 = 0x3000;
const EXTRA_SEGMENT: u16 = 0x4000;

/// A machine with distinct CS, SS, DS and ES and an empty stack at SS:0400
fn machine() -> (IbmPc, Intel80x86) {
    let mut cpu = Intel80x86::new();
    cpu.set_register(Register::CS, CODE_SEGMENT as u32);
    cpu.set_register(Register::DS, DATA_SEGMENT as u32);
    cpu.set_register(Register::ES, EXTRA_SEGMENT as u32);
    cpu.set_stack(STACK_SEGMENT, 0x0400);
    (IbmPc::new(), cpu)
}

/// Execute each opcode in order, stopping at the first failure
fn run_all(system: &mut IbmPc, cpu: &mut Intel80x86, ops: &[OpCode]) -> Result<(), CpuError> {
    for op in ops {
        cpu.execute(system, op)?;
    }
    Ok(())
}
