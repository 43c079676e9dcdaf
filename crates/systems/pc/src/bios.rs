//! BIOS services for PC emulation
//!
//! Handlers are plain functions registered into the core interrupt table.
//! Video output goes to the system console, keyboard input comes from its
//! input queue.

use chrono::{Local, Timelike};
use emu86_core::error::CpuError;
use emu86_core::flags::Flag;
use emu86_core::interrupts::InterruptTable;
use emu86_core::logging::{log, LogCategory, LogLevel};
use emu86_core::register::Register;
use emu86_core::system::IbmPc;
use emu86_core::Intel80x86;

/// 80x25 color text
const VIDEO_MODE: u8 = 0x03;
const VIDEO_COLUMNS: u8 = 80;

/// One floppy drive, initial video mode 80x25 color
const EQUIPMENT_WORD: u16 = 0x0021;

/// Conventional memory in KB
const MEMORY_SIZE_KB: u16 = 640;

/// PIT input clock over the 65536 divisor, per millisecond
const PIT_HZ: u64 = 1_193_180;
const TICK_DIVISOR: u64 = 65_536 * 1000;

pub fn install(table: &mut InterruptTable) {
    table.register_builtin(0x10, video_services);
    table.register_builtin(0x11, equipment_list);
    table.register_builtin(0x12, memory_size);
    table.register_builtin(0x16, keyboard_services);
    table.register_builtin(0x1A, time_services);
}

fn function(cpu: &Intel80x86) -> u8 {
    cpu.get_register(Register::AH) as u8
}

fn unsupported(vector: u8, function: u8) -> CpuError {
    log(LogCategory::Interrupts, LogLevel::Warn, || {
        format!("INT {:02X}h function {:02X}h is not supported", vector, function)
    });
    CpuError::UnsupportedService { vector, function }
}

/// INT 10h - Video Services
fn video_services(system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
    match function(cpu) {
        // Teletype output
        0x0E => {
            let ch = cpu.get_register(Register::AL) as u8;
            system.console.write_byte(ch);
            Ok(())
        }
        // Get current video mode
        0x0F => {
            cpu.set_register(Register::AL, VIDEO_MODE as u32);
            cpu.set_register(Register::AH, VIDEO_COLUMNS as u32);
            cpu.set_register(Register::BH, 0);
            Ok(())
        }
        f => Err(unsupported(0x10, f)),
    }
}

/// INT 11h - Equipment List
fn equipment_list(_system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
    cpu.set_register(Register::AX, EQUIPMENT_WORD as u32);
    Ok(())
}

/// INT 12h - Get Memory Size
fn memory_size(_system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
    cpu.set_register(Register::AX, MEMORY_SIZE_KB as u32);
    Ok(())
}

/// INT 16h - Keyboard Services
///
/// There are no scan codes; AH always comes back 0. Reading from an empty
/// queue returns AX=0 instead of blocking.
fn keyboard_services(system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
    match function(cpu) {
        0x00 => {
            let key = system.console.read_byte().unwrap_or(0);
            cpu.set_register(Register::AX, key as u32);
            Ok(())
        }
        0x01 => {
            match system.console.peek_byte() {
                Some(key) => {
                    cpu.set_register(Register::AX, key as u32);
                    cpu.flags_mut().set(Flag::Zero, false);
                }
                None => cpu.flags_mut().set(Flag::Zero, true),
            }
            Ok(())
        }
        f => Err(unsupported(0x16, f)),
    }
}

/// Timer ticks (18.2 Hz) since midnight, host local time
fn ticks_since_midnight() -> u32 {
    let now = Local::now();
    let millis =
        now.num_seconds_from_midnight() as u64 * 1000 + now.timestamp_subsec_millis() as u64;
    (millis * PIT_HZ / TICK_DIVISOR) as u32
}

/// INT 1Ah - Time Services
fn time_services(_system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
    match function(cpu) {
        // Read system clock counter
        0x00 => {
            let ticks = ticks_since_midnight();
            cpu.set_register(Register::CX, ticks >> 16);
            cpu.set_register(Register::DX, ticks & 0xFFFF);
            cpu.set_register(Register::AL, 0);
            Ok(())
        }
        f => Err(unsupported(0x1A, f)),
    }
}
