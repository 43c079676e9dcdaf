//! Intel 80x86 CPU orchestrator
//!
//! `Intel80x86` owns the register file and memory of one virtual machine and
//! runs pre-decoded opcodes from a [`Program`]. It also provides the
//! primitives that several opcodes share: far/near jumps and calls, returns
//! with argument release, the effective data segment under a prefix, and
//! divide-error delivery.
//!
//! There is no byte decoder here: a producer (assembler, test, listing file)
//! builds the opcode stream and the fetch loop looks instructions up by
//! CS:IP.

use crate::error::CpuError;
use crate::flags::Flags;
use crate::logging::{log, LogCategory, LogLevel};
use crate::memory::{compute_physical_address, Memory};
use crate::opcodes::OpCode;
use crate::operand::{Operand, OperandSize};
use crate::program::Program;
use crate::register::{Register, RegisterFile, SegmentRegister};
use crate::system::IbmPc;
use serde::{Deserialize, Serialize};

/// CPU model variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CpuModel {
    /// Intel 8086 (1978) - Original 16-bit x86 processor
    Intel8086,
    /// Intel 8088 (1979) - 8086 with 8-bit external data bus
    Intel8088,
    /// Intel 80186 (1982) - PUSHA/POPA, ENTER/LEAVE, BOUND, immediate PUSH and shifts
    Intel80186,
    /// Intel 80188 (1982) - 80186 with 8-bit external data bus
    Intel80188,
    /// Intel 80286 (1982) - Protected mode (only MSW access is modeled)
    Intel80286,
    /// Intel 80386 (1985) - 32-bit registers, FS/GS, bit scan/test, MOVSX/MOVZX
    #[default]
    Intel80386,
}

impl CpuModel {
    /// Instruction-set generation: 0 = 8086, 1 = 80186, 2 = 80286, 3 = 80386
    const fn generation(self) -> u8 {
        match self {
            CpuModel::Intel8086 | CpuModel::Intel8088 => 0,
            CpuModel::Intel80186 | CpuModel::Intel80188 => 1,
            CpuModel::Intel80286 => 2,
            CpuModel::Intel80386 => 3,
        }
    }

    /// Returns true if this CPU model supports 80186+ instructions
    pub fn supports_80186_instructions(&self) -> bool {
        self.generation() >= 1
    }

    /// Returns true if this CPU model supports 80286+ instructions
    pub fn supports_80286_instructions(&self) -> bool {
        self.generation() >= 2
    }

    /// Returns true if this CPU model supports 80386+ instructions
    pub fn supports_80386_instructions(&self) -> bool {
        self.generation() >= 3
    }

    /// True if everything `required` can run also runs on this model
    pub fn supports(&self, required: CpuModel) -> bool {
        self.generation() >= required.generation()
    }

    /// Returns the name of the CPU model as a string
    pub fn name(&self) -> &'static str {
        match self {
            CpuModel::Intel8086 => "Intel 8086",
            CpuModel::Intel8088 => "Intel 8088",
            CpuModel::Intel80186 => "Intel 80186",
            CpuModel::Intel80188 => "Intel 80188",
            CpuModel::Intel80286 => "Intel 80286",
            CpuModel::Intel80386 => "Intel 80386",
        }
    }

    /// Parse a model name such as "8086", "80286" or "Intel 80386"
    pub fn from_name(name: &str) -> Option<Self> {
        let digits = name.trim().trim_start_matches("Intel").trim();
        match digits.to_ascii_lowercase().trim_start_matches('i') {
            "8086" => Some(CpuModel::Intel8086),
            "8088" => Some(CpuModel::Intel8088),
            "80186" | "186" => Some(CpuModel::Intel80186),
            "80188" | "188" => Some(CpuModel::Intel80188),
            "80286" | "286" => Some(CpuModel::Intel80286),
            "80386" | "386" => Some(CpuModel::Intel80386),
            _ => None,
        }
    }
}

/// Why `run` stopped without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    /// HLT executed or a handler terminated the program
    Halted,
    /// IP reached the address just past the last instruction
    Completed,
}

/// One 80x86 virtual machine: registers, flags and memory
#[derive(Debug, Clone)]
pub struct Intel80x86 {
    pub registers: RegisterFile,
    pub memory: Memory,
    model: CpuModel,
    halted: bool,
    /// Segment forced by an active override prefix
    segment_override: Option<SegmentRegister>,
    /// SP value the stack was (re)established at; pops past it underflow
    stack_base: u16,
    /// 80286 machine status word (SMSW/LMSW)
    machine_status: u16,
    instructions_executed: u64,
}

impl Default for Intel80x86 {
    fn default() -> Self {
        Self::new()
    }
}

impl Intel80x86 {
    pub fn new() -> Self {
        Self::with_model(CpuModel::default())
    }

    pub fn with_model(model: CpuModel) -> Self {
        Self {
            registers: RegisterFile::new(),
            memory: Memory::new(),
            model,
            halted: false,
            segment_override: None,
            stack_base: 0,
            machine_status: 0,
            instructions_executed: 0,
        }
    }

    /// Power-on state: registers cleared, memory kept, model preserved
    pub fn reset(&mut self) {
        self.registers = RegisterFile::new();
        self.halted = false;
        self.segment_override = None;
        self.stack_base = 0;
        self.machine_status = 0;
        self.instructions_executed = 0;
    }

    pub fn model(&self) -> CpuModel {
        self.model
    }

    pub fn set_model(&mut self, model: CpuModel) {
        self.model = model;
    }

    pub fn get_register(&self, reg: Register) -> u32 {
        self.registers.get(reg)
    }

    /// Write a register. Loading SS establishes a new stack whose base is
    /// the current SP.
    pub fn set_register(&mut self, reg: Register, value: u32) {
        self.registers.set(reg, value);
        if reg == Register::SS {
            self.stack_base = self.registers.word(Register::SP);
        }
    }

    /// Establish a stack at SS:SP
    pub fn set_stack(&mut self, ss: u16, sp: u16) {
        self.registers.set(Register::SS, ss as u32);
        self.registers.set(Register::SP, sp as u32);
        self.stack_base = sp;
    }

    /// SP value at which the stack is empty
    pub fn stack_base(&self) -> u16 {
        self.stack_base
    }

    /// Restore a saved stack base without touching SS:SP
    pub fn set_stack_base(&mut self, base: u16) {
        self.stack_base = base;
    }

    pub fn machine_status(&self) -> u16 {
        self.machine_status
    }

    pub fn set_machine_status(&mut self, msw: u16) {
        self.machine_status = msw;
    }

    pub fn flags(&self) -> &Flags {
        &self.registers.flags
    }

    pub fn flags_mut(&mut self) -> &mut Flags {
        &mut self.registers.flags
    }

    pub fn ip(&self) -> u16 {
        self.registers.ip()
    }

    pub fn set_ip(&mut self, ip: u16) {
        self.registers.set_ip(ip);
    }

    /// CS:IP as a physical address
    pub fn instruction_address(&self) -> u32 {
        compute_physical_address(self.registers.word(Register::CS), self.ip())
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn halt(&mut self) {
        self.halted = true;
    }

    /// Clear the halted state (external interrupt or reset from the host)
    pub fn resume(&mut self) {
        self.halted = false;
    }

    pub fn instructions_executed(&self) -> u64 {
        self.instructions_executed
    }

    pub fn set_instructions_executed(&mut self, count: u64) {
        self.instructions_executed = count;
    }

    pub fn segment_override(&self) -> Option<SegmentRegister> {
        self.segment_override
    }

    pub fn set_segment_override(&mut self, segment: Option<SegmentRegister>) {
        self.segment_override = segment;
    }

    /// Value of the segment a memory access should use: the active
    /// override if there is one, `default` otherwise
    pub fn effective_segment(&self, default: SegmentRegister) -> u16 {
        self.registers
            .segment(self.segment_override.unwrap_or(default))
    }

    /// Transfer control to `destination`, optionally pushing the return
    /// address first (CALL).
    ///
    /// - Immediate: near target offset
    /// - Far pointer: far target CS:IP
    /// - Register or word memory: near indirect
    /// - Doubleword memory: far indirect (offset, then segment)
    ///
    /// The target is resolved before anything is pushed so `CALL [SP]`-style
    /// operands read the pre-call stack.
    pub fn jump_to(&mut self, destination: &Operand, save_point: bool) -> Result<(), CpuError> {
        let (segment, offset) = match destination {
            Operand::Immediate(imm) => (None, imm.raw() as u16),
            Operand::Far(ptr) => (Some(ptr.segment), ptr.offset),
            Operand::Register(reg) => (None, self.registers.word(*reg)),
            Operand::Memory(mem) => match mem.size {
                OperandSize::DoubleWord => {
                    let pointer = mem.read(self);
                    (Some((pointer >> 16) as u16), pointer as u16)
                }
                OperandSize::Word => (None, mem.read(self) as u16),
                OperandSize::Byte => {
                    return Err(CpuError::invalid_operand(
                        "JMP",
                        destination,
                        "byte operand cannot hold a target",
                    ))
                }
            },
        };

        if save_point {
            if segment.is_some() {
                let cs = self.registers.word(Register::CS);
                self.push_value(cs as u32, OperandSize::Word)?;
            }
            let ip = self.ip();
            self.push_value(ip as u32, OperandSize::Word)?;
        }

        if let Some(cs) = segment {
            self.registers.set(Register::CS, cs as u32);
        }
        self.set_ip(offset);
        Ok(())
    }

    /// RET: pop IP, then release `extra` bytes of caller arguments
    pub fn return_near(&mut self, extra: u16) -> Result<(), CpuError> {
        let ip = self.pop_value(OperandSize::Word)?;
        self.set_ip(ip as u16);
        self.release_stack(extra);
        Ok(())
    }

    /// RETF: pop IP and CS, then release `extra` bytes
    pub fn return_far(&mut self, extra: u16) -> Result<(), CpuError> {
        self.require_stack(4)?;
        let ip = self.pop_value(OperandSize::Word)?;
        let cs = self.pop_value(OperandSize::Word)?;
        self.set_ip(ip as u16);
        self.registers.set(Register::CS, cs);
        self.release_stack(extra);
        Ok(())
    }

    /// IRET: pop IP, CS, then FLAGS; nothing is popped unless all three are there
    pub fn interrupt_return(&mut self) -> Result<(), CpuError> {
        self.require_stack(6)?;
        self.return_far(0)?;
        let flags = self.pop_value(OperandSize::Word)?;
        self.set_register(Register::FLAGS, flags);
        Ok(())
    }

    /// Route a divide fault to INT 00h, or fail if nothing handles it
    pub fn divide_error(&mut self, system: &mut IbmPc) -> Result<(), CpuError> {
        if system.interrupts.is_registered(0) {
            system.interrupt(self, 0)
        } else {
            Err(CpuError::DivideError)
        }
    }

    /// Execute one opcode after checking it exists on this model
    pub fn execute(&mut self, system: &mut IbmPc, opcode: &OpCode) -> Result<(), CpuError> {
        let required = opcode.required_model();
        if !self.model.supports(required) {
            return Err(CpuError::UnsupportedModel {
                mnemonic: opcode.mnemonic(),
                required,
                model: self.model,
            });
        }
        opcode.execute(system, self)
    }

    /// Fetch and execute the instruction at CS:IP.
    ///
    /// IP advances past the instruction before it executes, so relative
    /// bookkeeping (CALL return addresses) sees the next instruction. On
    /// failure CS:IP and ESP are put back as they were before the
    /// instruction.
    pub fn step(&mut self, system: &mut IbmPc, program: &Program) -> Result<(), CpuError> {
        let cs = self.registers.word(Register::CS);
        let ip = self.ip();
        let esp = self.registers.get(Register::ESP);
        let Some(instruction) = program.fetch(cs, ip) else {
            return self.service_entry(system, cs, ip);
        };

        log(LogCategory::CPU, LogLevel::Trace, || {
            format!("{:04X}:{:04X}  {}", cs, ip, instruction.opcode)
        });

        self.set_ip(ip.wrapping_add(instruction.length));
        match self.execute(system, &instruction.opcode) {
            Ok(()) => {
                self.instructions_executed += 1;
                Ok(())
            }
            Err(err) => {
                self.registers.set(Register::CS, cs as u32);
                self.registers.set(Register::ESP, esp);
                self.set_ip(ip);
                log(LogCategory::CPU, LogLevel::Error, || {
                    format!("{:04X}:{:04X}  {}: {}", cs, ip, instruction.opcode, err)
                });
                Err(err)
            }
        }
    }

    /// CS:IP is on a built-in service entry point: run the service as if
    /// its code lived there, then return with IRET
    fn service_entry(&mut self, system: &mut IbmPc, cs: u16, ip: u16) -> Result<(), CpuError> {
        let (vector, handler) = system
            .interrupts
            .service_at(cs, ip)
            .ok_or(CpuError::InvalidInstructionPointer { cs, ip })?;
        log(LogCategory::Interrupts, LogLevel::Debug, || {
            format!("INT {:02X}h service entry at {:04X}:{:04X}", vector, cs, ip)
        });

        let esp = self.registers.get(Register::ESP);
        let result = handler.handle(system, self);
        match result.and_then(|()| self.interrupt_return()) {
            Ok(()) => {
                self.instructions_executed += 1;
                Ok(())
            }
            Err(err) => {
                self.registers.set(Register::CS, cs as u32);
                self.registers.set(Register::ESP, esp);
                self.set_ip(ip);
                Err(err)
            }
        }
    }

    /// Run until the program halts or falls off its end.
    ///
    /// `max_steps` bounds the number of instructions executed by this call.
    pub fn run(
        &mut self,
        system: &mut IbmPc,
        program: &Program,
        max_steps: Option<u64>,
    ) -> Result<RunOutcome, CpuError> {
        let mut steps = 0u64;
        loop {
            if self.halted {
                return Ok(RunOutcome::Halted);
            }
            let cs = self.registers.word(Register::CS);
            let ip = self.ip();
            if program.fetch(cs, ip).is_none() && program.is_end(cs, ip) {
                return Ok(RunOutcome::Completed);
            }
            if let Some(limit) = max_steps {
                if steps >= limit {
                    return Err(CpuError::StepLimitExceeded(limit));
                }
            }
            self.step(system, program)?;
            steps += 1;
        }
    }
}
