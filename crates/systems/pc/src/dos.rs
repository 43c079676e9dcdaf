//! MS-DOS services (INT 20h, INT 21h)
//!
//! Enough of the DOS API for console programs: character and string I/O,
//! the interrupt vector calls, date/time and termination. Set Vector also
//! routes later `INT n` calls through the new IVT entry, so a program that
//! hooks a vector gets real-mode delivery and returns with IRET.

use chrono::{Datelike, Local, Timelike};
use emu86_core::error::CpuError;
use emu86_core::flags::Flag;
use emu86_core::interrupts::{InterruptTable, VectorHandler};
use emu86_core::logging::{log, LogCategory, LogLevel};
use emu86_core::register::Register;
use emu86_core::system::IbmPc;
use emu86_core::Intel80x86;

/// Reported DOS version (5.0)
const DOS_VERSION: (u8, u8) = (5, 0);

/// Current drive reported by function 19h (C:)
const CURRENT_DRIVE: u8 = 2;

const STRING_TERMINATOR: u8 = b'$';

/// A `$` string never runs past the end of its segment
const MAX_STRING_LENGTH: usize = 0x10000;

pub fn install(table: &mut InterruptTable) {
    table.register_builtin(0x20, program_terminate);
    table.register_builtin(0x21, dos_services);
}

/// INT 20h - Program Terminate
fn program_terminate(system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
    system.terminate(cpu, 0);
    Ok(())
}

fn set(cpu: &mut Intel80x86, reg: Register, value: u8) {
    cpu.set_register(reg, value as u32);
}

fn write_char(system: &mut IbmPc, cpu: &mut Intel80x86) {
    let ch = cpu.get_register(Register::DL) as u8;
    system.console.write_byte(ch);
    set(cpu, Register::AL, ch);
}

/// Read one key; an empty queue reads as 00h
fn read_char(system: &mut IbmPc, cpu: &mut Intel80x86, echo: bool) {
    let ch = system.console.read_byte().unwrap_or(0);
    if echo && ch != 0 {
        system.console.write_byte(ch);
    }
    set(cpu, Register::AL, ch);
}

fn print_string(system: &mut IbmPc, cpu: &mut Intel80x86) {
    let ds = cpu.registers.word(Register::DS);
    let dx = cpu.registers.word(Register::DX);
    let text = cpu
        .memory
        .read_until(ds, dx, STRING_TERMINATOR, MAX_STRING_LENGTH);
    system.console.write_bytes(&text);
    set(cpu, Register::AL, STRING_TERMINATOR);
}

fn direct_console_io(system: &mut IbmPc, cpu: &mut Intel80x86) {
    if cpu.get_register(Register::DL) != 0xFF {
        write_char(system, cpu);
        return;
    }
    match system.console.read_byte() {
        Some(ch) => {
            set(cpu, Register::AL, ch);
            cpu.flags_mut().set(Flag::Zero, false);
        }
        None => {
            set(cpu, Register::AL, 0);
            cpu.flags_mut().set(Flag::Zero, true);
        }
    }
}

fn set_vector(system: &mut IbmPc, cpu: &mut Intel80x86) {
    let vector = cpu.get_register(Register::AL) as u8;
    let segment = cpu.registers.word(Register::DS);
    let offset = cpu.registers.word(Register::DX);
    let (table_segment, table_offset) = InterruptTable::vector_address(vector);
    cpu.memory.set_word(table_segment, table_offset, offset);
    cpu.memory
        .set_word(table_segment, table_offset.wrapping_add(2), segment);
    system.interrupts.register(vector, VectorHandler::new(vector));
    log(LogCategory::Interrupts, LogLevel::Debug, || {
        format!("INT {:02X}h hooked to {:04X}:{:04X}", vector, segment, offset)
    });
}

fn get_vector(cpu: &mut Intel80x86) {
    let vector = cpu.get_register(Register::AL) as u8;
    let (table_segment, table_offset) = InterruptTable::vector_address(vector);
    let offset = cpu.memory.get_word(table_segment, table_offset);
    let segment = cpu
        .memory
        .get_word(table_segment, table_offset.wrapping_add(2));
    cpu.set_register(Register::BX, offset as u32);
    cpu.set_register(Register::ES, segment as u32);
}

fn get_date(cpu: &mut Intel80x86) {
    let today = Local::now().date_naive();
    cpu.set_register(Register::CX, today.year() as u32);
    set(cpu, Register::DH, today.month() as u8);
    set(cpu, Register::DL, today.day() as u8);
    set(cpu, Register::AL, today.weekday().num_days_from_sunday() as u8);
}

fn get_time(cpu: &mut Intel80x86) {
    let now = Local::now();
    set(cpu, Register::CH, now.hour() as u8);
    set(cpu, Register::CL, now.minute() as u8);
    set(cpu, Register::DH, now.second() as u8);
    set(cpu, Register::DL, (now.timestamp_subsec_millis() / 10) as u8);
}

fn get_version(cpu: &mut Intel80x86) {
    let (major, minor) = DOS_VERSION;
    set(cpu, Register::AL, major);
    set(cpu, Register::AH, minor);
    // OEM: IBM, no serial number
    set(cpu, Register::BH, 0x00);
    set(cpu, Register::BL, 0x00);
    cpu.set_register(Register::CX, 0);
}

/// INT 21h - DOS function dispatcher (function in AH)
fn dos_services(system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
    let function = cpu.get_register(Register::AH) as u8;
    match function {
        0x00 => system.terminate(cpu, 0),
        0x01 => read_char(system, cpu, true),
        0x02 => write_char(system, cpu),
        0x06 => direct_console_io(system, cpu),
        0x08 => read_char(system, cpu, false),
        0x09 => print_string(system, cpu),
        0x19 => set(cpu, Register::AL, CURRENT_DRIVE),
        0x25 => set_vector(system, cpu),
        0x2A => get_date(cpu),
        0x2C => get_time(cpu),
        0x30 => get_version(cpu),
        0x35 => get_vector(cpu),
        0x4C => {
            let code = cpu.get_register(Register::AL) as u8;
            system.terminate(cpu, code);
        }
        _ => {
            log(LogCategory::Interrupts, LogLevel::Warn, || {
                format!("INT 21h function {:02X}h is not supported", function)
            });
            return Err(CpuError::UnsupportedService {
                vector: 0x21,
                function,
            });
        }
    }
    Ok(())
}
