//! Built-in demo program

use emu86_core::opcodes::OpCode;
use emu86_core::operand::Operand;
use emu86_core::program::Program;
use emu86_core::register::Register;
use emu86_core::CpuError;

/// Where the demo keeps its message
pub const MESSAGE_SEGMENT: u16 = 0x13CF;
pub const MESSAGE_OFFSET: u16 = 0x2000;

/// Prints "Hello World" through INT 21h/09h, then exits with code 0.
///
/// ```text
/// MOV CX,13CF
/// PUSH CX
/// POP DS
/// MOV DX,2000
/// MOV AH,09
/// INT 21
/// MOV AX,4C00
/// INT 21
/// ```
pub fn hello_world(segment: u16, origin: u16) -> Result<Program, CpuError> {
    let mut program = Program::new();
    program.org(segment, origin);
    program.push_with_length(
        OpCode::mov(Register::CX, Operand::imm16(MESSAGE_SEGMENT))?,
        3,
        0xB9,
    );
    program.push_with_length(OpCode::push(Register::CX)?, 1, 0x51);
    program.push_with_length(OpCode::pop(Register::DS)?, 1, 0x1F);
    program.push_with_length(
        OpCode::mov(Register::DX, Operand::imm16(MESSAGE_OFFSET))?,
        3,
        0xBA,
    );
    program.push_with_length(OpCode::mov(Register::AH, Operand::imm8(0x09))?, 2, 0xB4);
    program.push_with_length(OpCode::int(0x21), 2, 0xCD);
    program.push_with_length(OpCode::mov(Register::AX, Operand::imm16(0x4C00))?, 3, 0xB8);
    program.push_with_length(OpCode::int(0x21), 2, 0xCD);
    program.add_data(MESSAGE_SEGMENT, MESSAGE_OFFSET, b"Hello World$");
    Ok(program)
}
