//! Software interrupt dispatch
//!
//! `INT n` does not walk the in-memory vector table by default; it looks up
//! a handler registered under `n`. BIOS and DOS services are plain handlers
//! that mutate CPU state directly. [`VectorHandler`] is the one handler that
//! emulates real hardware delivery through the IVT, for programs that hook
//! vectors themselves and return with IRET.
//!
//! Built-in services also get an entry point at F000:n in the vector table,
//! so a hook that chains to the vector it replaced (read with DOS 35h)
//! lands on the original service. The fetch loop runs the service there
//! and returns with IRET.

use crate::cpu_80x86::Intel80x86;
use crate::error::CpuError;
use crate::flags::Flag;
use crate::memory::Memory;
use crate::operand::OperandSize;
use crate::register::Register;
use crate::system::IbmPc;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// A service invoked by `INT n`
pub trait InterruptHandler {
    fn handle(&self, system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError>;
}

impl<F> InterruptHandler for F
where
    F: Fn(&mut IbmPc, &mut Intel80x86) -> Result<(), CpuError>,
{
    fn handle(&self, system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
        self(system, cpu)
    }
}

/// Segment holding the entry points of built-in services
pub const SERVICE_SEGMENT: u16 = 0xF000;

/// Interrupt number to handler
#[derive(Clone, Default)]
pub struct InterruptTable {
    handlers: HashMap<u8, Rc<dyn InterruptHandler>>,
    builtins: HashMap<u8, Rc<dyn InterruptHandler>>,
}

impl InterruptTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `vector`, replacing any previous one
    pub fn register<H>(&mut self, vector: u8, handler: H)
    where
        H: InterruptHandler + 'static,
    {
        self.handlers.insert(vector, Rc::new(handler));
    }

    /// Register a built-in service: the active handler for `vector`, and
    /// the service reachable through its F000:n entry point after a hook
    /// replaces it
    pub fn register_builtin<H>(&mut self, vector: u8, handler: H)
    where
        H: InterruptHandler + 'static,
    {
        let handler: Rc<dyn InterruptHandler> = Rc::new(handler);
        self.handlers.insert(vector, Rc::clone(&handler));
        self.builtins.insert(vector, handler);
    }

    /// Built-in service for `vector`, regardless of any hook
    pub fn builtin(&self, vector: u8) -> Option<Rc<dyn InterruptHandler>> {
        self.builtins.get(&vector).cloned()
    }

    /// Put every built-in service back as the active handler
    pub fn restore_builtins(&mut self) {
        for (&vector, handler) in &self.builtins {
            self.handlers.insert(vector, Rc::clone(handler));
        }
    }

    /// Point the IVT entry of each built-in service at its entry point
    pub fn seed_vector_table(&self, memory: &mut Memory) {
        for &vector in self.builtins.keys() {
            let (segment, offset) = Self::vector_address(vector);
            let (entry_segment, entry_offset) = Self::service_entry(vector);
            memory.set_word(segment, offset, entry_offset);
            memory.set_word(segment, offset.wrapping_add(2), entry_segment);
        }
    }

    pub fn unregister(&mut self, vector: u8) -> bool {
        self.handlers.remove(&vector).is_some()
    }

    pub fn lookup(&self, vector: u8) -> Option<Rc<dyn InterruptHandler>> {
        self.handlers.get(&vector).cloned()
    }

    pub fn is_registered(&self, vector: u8) -> bool {
        self.handlers.contains_key(&vector)
    }

    /// Registered vectors in ascending order
    pub fn vectors(&self) -> Vec<u8> {
        let mut vectors: Vec<u8> = self.handlers.keys().copied().collect();
        vectors.sort_unstable();
        vectors
    }

    pub fn clear(&mut self) {
        self.handlers.clear();
        self.builtins.clear();
    }

    /// Segment:offset of vector `n` in the real-mode interrupt vector table
    pub const fn vector_address(vector: u8) -> (u16, u16) {
        (0x0000, (vector as u16) * 4)
    }

    /// F000:n entry point of built-in service `n`
    pub const fn service_entry(vector: u8) -> (u16, u16) {
        (SERVICE_SEGMENT, vector as u16)
    }

    /// The built-in service whose entry point is CS:IP, if any
    pub fn service_at(&self, cs: u16, ip: u16) -> Option<(u8, Rc<dyn InterruptHandler>)> {
        if cs != SERVICE_SEGMENT {
            return None;
        }
        let vector = u8::try_from(ip).ok()?;
        self.builtin(vector).map(|handler| (vector, handler))
    }
}

impl fmt::Debug for InterruptTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterruptTable")
            .field("vectors", &self.vectors())
            .finish()
    }
}

/// Real-mode delivery through the IVT: push FLAGS, CS and IP, clear IF and
/// TF, then load CS:IP from 0000:n*4
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorHandler {
    pub vector: u8,
}

impl VectorHandler {
    pub fn new(vector: u8) -> Self {
        Self { vector }
    }
}

impl InterruptHandler for VectorHandler {
    fn handle(&self, _system: &mut IbmPc, cpu: &mut Intel80x86) -> Result<(), CpuError> {
        let (segment, offset) = InterruptTable::vector_address(self.vector);
        let target_ip = cpu.memory.get_word(segment, offset);
        let target_cs = cpu.memory.get_word(segment, offset.wrapping_add(2));

        let flags = cpu.get_register(Register::FLAGS);
        let cs = cpu.get_register(Register::CS);
        let ip = cpu.ip() as u32;
        cpu.push_value(flags, OperandSize::Word)?;
        cpu.push_value(cs, OperandSize::Word)?;
        cpu.push_value(ip, OperandSize::Word)?;

        cpu.flags_mut().set(Flag::Interrupt, false);
        cpu.flags_mut().set(Flag::Trap, false);
        cpu.registers.set(Register::CS, target_cs as u32);
        cpu.set_ip(target_ip);
        Ok(())
    }
}
