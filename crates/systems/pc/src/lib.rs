//! IBM PC/XT system implementation
//!
//! Runs decoded 80x86 programs on the core CPU inside a DOS-like machine:
//! BIOS and MS-DOS services are registered as interrupt handlers and print
//! to a text console.

#![allow(clippy::upper_case_acronyms)]

mod bios;
mod config;
mod cpu;
pub mod demo;
mod dos;

use cpu::PcCpu;
use emu86_core::logging::{log, LogCategory, LogLevel};
use emu86_core::program::{Listing, Program};
use emu86_core::system::IbmPc;
use emu86_core::{CpuError, CpuModel, Intel80x86, RunOutcome, System};
use serde_json::Value;
use std::fs;
use std::path::Path;
use thiserror::Error;

pub use config::PcConfig;
pub use cpu::CpuRegisters;

#[derive(Debug, Error)]
pub enum PcError {
    #[error(transparent)]
    Cpu(#[from] CpuError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("No program loaded")]
    MissingProgram,
}

/// PC system state
pub struct PcSystem {
    cpu: PcCpu,
    machine: IbmPc,
    program: Program,
    config: PcConfig,
}

impl Default for PcSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl PcSystem {
    /// Create a PC with the default configuration (80386, BIOS and DOS installed)
    pub fn new() -> Self {
        Self::with_config(PcConfig::default())
    }

    pub fn with_config(config: PcConfig) -> Self {
        let mut machine = IbmPc::new();
        machine.console.echo = config.echo;
        if config.install_bios {
            bios::install(&mut machine.interrupts);
        }
        if config.install_dos {
            dos::install(&mut machine.interrupts);
        }
        let mut cpu = PcCpu::with_config(&config);
        machine
            .interrupts
            .seed_vector_table(&mut cpu.cpu_mut().memory);
        Self {
            cpu,
            machine,
            program: Program::new(),
            config,
        }
    }

    pub fn config(&self) -> &PcConfig {
        &self.config
    }

    /// Get the CPU model
    pub fn cpu_model(&self) -> CpuModel {
        self.cpu.model()
    }

    pub fn cpu(&self) -> &Intel80x86 {
        self.cpu.cpu()
    }

    pub fn cpu_mut(&mut self) -> &mut Intel80x86 {
        self.cpu.cpu_mut()
    }

    /// The machine around the CPU (interrupt table, ports, console)
    pub fn machine(&self) -> &IbmPc {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut IbmPc {
        &mut self.machine
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Load a program: copy its data blocks into memory and point CS:IP at
    /// its entry
    pub fn load_program(&mut self, program: Program) -> Result<(), PcError> {
        let (segment, offset) = program.entry().ok_or(PcError::MissingProgram)?;
        self.program = program;
        self.load_data();
        self.cpu.set_entry(segment, offset);
        log(LogCategory::Memory, LogLevel::Info, || {
            format!(
                "loaded {} instructions, entry {:04X}:{:04X}",
                self.program.len(),
                segment,
                offset
            )
        });
        Ok(())
    }

    /// Load a program from a JSON listing
    pub fn load_listing(&mut self, json: &str) -> Result<(), PcError> {
        let listing: Listing = serde_json::from_str(json)?;
        let program = Program::from_listing(listing)?;
        self.load_program(program)
    }

    pub fn load_listing_from_path(&mut self, path: impl AsRef<Path>) -> Result<(), PcError> {
        let json = fs::read_to_string(path)?;
        self.load_listing(&json)
    }

    fn load_data(&mut self) {
        let memory = &mut self.cpu.cpu_mut().memory;
        for block in self.program.data() {
            memory.set_bytes(block.segment, block.offset, &block.bytes);
        }
    }

    /// Queue keystrokes for the program
    pub fn feed_input(&mut self, bytes: &[u8]) {
        self.machine.console.feed_input(bytes);
    }

    /// Everything the program printed
    pub fn console_output(&self) -> String {
        self.machine.console.transcript()
    }

    /// Exit code passed to DOS terminate, if the program terminated
    pub fn exit_code(&self) -> Option<u8> {
        self.machine.exit_code()
    }

    pub fn registers(&self) -> CpuRegisters {
        self.cpu.get_registers()
    }

    pub fn instructions_executed(&self) -> u64 {
        self.cpu.cpu().instructions_executed()
    }

    fn require_program(&self) -> Result<(), PcError> {
        if self.program.is_empty() {
            Err(PcError::MissingProgram)
        } else {
            Ok(())
        }
    }
}

impl System for PcSystem {
    type Error = PcError;

    /// Registers back to the boot state, memory cleared and reloaded with
    /// the program's data; BIOS and DOS services are active again and
    /// reachable through the vector table
    fn reset(&mut self) {
        self.cpu.cpu_mut().memory.clear();
        self.cpu.reset();
        self.machine.reset();
        self.machine.interrupts.restore_builtins();
        self.machine
            .interrupts
            .seed_vector_table(&mut self.cpu.cpu_mut().memory);
        self.load_data();
        if let Some((segment, offset)) = self.program.entry() {
            self.cpu.set_entry(segment, offset);
        }
    }

    fn step(&mut self) -> Result<(), Self::Error> {
        self.require_program()?;
        let cpu = self.cpu.cpu_mut();
        cpu.step(&mut self.machine, &self.program)?;
        Ok(())
    }

    fn run(&mut self) -> Result<RunOutcome, Self::Error> {
        self.require_program()?;
        let cpu = self.cpu.cpu_mut();
        let outcome = cpu.run(&mut self.machine, &self.program, self.config.max_steps)?;
        Ok(outcome)
    }

    fn save_state(&self) -> Value {
        let cpu = self.cpu.cpu();
        serde_json::json!({
            "version": 1,
            "system": "pc",
            "model": self.cpu.model(),
            "registers": self.cpu.get_registers(),
            "halted": cpu.is_halted(),
            "instructions": cpu.instructions_executed(),
            "exit_code": self.machine.exit_code(),
        })
    }

    fn load_state(&mut self, state: &Value) -> Result<(), serde_json::Error> {
        if let Some(model) = state.get("model") {
            let model: CpuModel = serde_json::from_value(model.clone())?;
            self.cpu.cpu_mut().set_model(model);
        }

        if let Some(regs) = state.get("registers") {
            let regs: CpuRegisters = serde_json::from_value(regs.clone())?;
            self.cpu.set_registers(&regs);
        }

        if let Some(halted) = state.get("halted").and_then(|v| v.as_bool()) {
            let cpu = self.cpu.cpu_mut();
            if halted {
                cpu.halt();
            } else {
                cpu.resume();
            }
        }

        if let Some(count) = state.get("instructions").and_then(|v| v.as_u64()) {
            self.cpu.cpu_mut().set_instructions_executed(count);
        }

        if let Some(code) = state.get("exit_code") {
            let code: Option<u8> = serde_json::from_value(code.clone())?;
            self.machine.set_exit_code(code);
        }

        Ok(())
    }

    fn supports_save_states(&self) -> bool {
        true
    }
}
