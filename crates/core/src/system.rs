//! System context handed to every opcode
//!
//! Holds what lives outside the CPU proper: the interrupt handler table,
//! the I/O port space and a text console that BIOS/DOS services print to.

use crate::cpu_80x86::Intel80x86;
use crate::error::CpuError;
use crate::interrupts::InterruptTable;
use crate::logging::{log, LogCategory, LogLevel};
use crate::ports::HardwarePorts;
use crate::register::Register;
use std::collections::VecDeque;
use std::io::Write;

/// Character console: an output transcript and a queue of pending keys
#[derive(Debug, Clone, Default)]
pub struct Console {
    output: Vec<u8>,
    input: VecDeque<u8>,
    /// Mirror output to the host stdout as it is produced
    pub echo: bool,
}

impl Console {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_byte(&mut self, byte: u8) {
        self.output.push(byte);
        if self.echo {
            echo(&mut std::io::stdout(), byte);
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.write_byte(byte);
        }
    }

    /// Everything written so far, lossily decoded
    pub fn transcript(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Drain the transcript
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    /// Queue keystrokes for programs to read
    pub fn feed_input(&mut self, bytes: &[u8]) {
        self.input.extend(bytes.iter().copied());
    }

    pub fn read_byte(&mut self) -> Option<u8> {
        self.input.pop_front()
    }

    pub fn peek_byte(&self) -> Option<u8> {
        self.input.front().copied()
    }

    pub fn has_input(&self) -> bool {
        !self.input.is_empty()
    }

    pub fn clear(&mut self) {
        self.output.clear();
        self.input.clear();
    }
}

/// Mirror one byte to the host; a failed write is logged and the run goes on
fn echo(out: &mut impl Write, byte: u8) {
    if let Err(err) = out.write_all(&[byte]).and_then(|()| out.flush()) {
        log(LogCategory::Interrupts, LogLevel::Warn, || {
            format!("console echo failed: {}", err)
        });
    }
}

/// The machine around the CPU
#[derive(Debug, Clone, Default)]
pub struct IbmPc {
    pub interrupts: InterruptTable,
    pub ports: HardwarePorts,
    pub console: Console,
    exit_code: Option<u8>,
}

impl IbmPc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoke the handler registered for `vector`
    pub fn interrupt(&mut self, cpu: &mut Intel80x86, vector: u8) -> Result<(), CpuError> {
        log(LogCategory::Interrupts, LogLevel::Debug, || {
            format!(
                "INT {:02X}h AX={:04X} at {:04X}:{:04X}",
                vector,
                cpu.registers.word(Register::AX),
                cpu.registers.word(Register::CS),
                cpu.ip()
            )
        });
        let handler = self
            .interrupts
            .lookup(vector)
            .ok_or(CpuError::UnhandledInterrupt(vector))?;
        handler.handle(self, cpu)
    }

    /// Stop the program with an exit code (DOS terminate)
    pub fn terminate(&mut self, cpu: &mut Intel80x86, code: u8) {
        log(LogCategory::Interrupts, LogLevel::Info, || {
            format!("program terminated with exit code {}", code)
        });
        self.exit_code = Some(code);
        cpu.halt();
    }

    pub fn exit_code(&self) -> Option<u8> {
        self.exit_code
    }

    pub fn set_exit_code(&mut self, code: Option<u8>) {
        self.exit_code = code;
    }

    /// Forget run state (exit code, console, port latches); handlers stay
    pub fn reset(&mut self) {
        self.exit_code = None;
        self.console.clear();
        self.ports.clear();
    }
}
