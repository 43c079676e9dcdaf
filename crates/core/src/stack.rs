//! Stack primitives over SS:SP
//!
//! SP moves only through the functions in this file. The stack grows
//! downward: a push decrements SP by the operand width and then writes, a
//! pop reads and then increments. Popping past the SP the stack was
//! established at fails with `StackUnderflow` instead of reading whatever
//! lies above it.

use crate::cpu_80x86::Intel80x86;
use crate::error::CpuError;
use crate::logging::{log, LogCategory, LogLevel};
use crate::operand::{Operand, OperandSize};
use crate::register::Register;

/// Registers saved by PUSHA/PUSHAD, in push order
const PUSHA_ORDER: [Register; 8] = [
    Register::AX,
    Register::CX,
    Register::DX,
    Register::BX,
    Register::SP,
    Register::BP,
    Register::SI,
    Register::DI,
];

const PUSHAD_ORDER: [Register; 8] = [
    Register::EAX,
    Register::ECX,
    Register::EDX,
    Register::EBX,
    Register::ESP,
    Register::EBP,
    Register::ESI,
    Register::EDI,
];

/// Stack slots are words or doublewords; a byte is pushed as a word
fn slot_size(size: OperandSize) -> OperandSize {
    match size {
        OperandSize::Byte => OperandSize::Word,
        other => other,
    }
}

impl Intel80x86 {
    fn sp(&self) -> u16 {
        self.registers.word(Register::SP)
    }

    fn set_sp(&mut self, sp: u16) {
        self.registers.set(Register::SP, sp as u32);
    }

    /// Bytes currently on the stack above SP
    pub fn stack_depth(&self) -> u16 {
        self.stack_base().wrapping_sub(self.sp())
    }

    /// Push a raw value of the given width
    pub fn push_value(&mut self, value: u32, size: OperandSize) -> Result<(), CpuError> {
        let size = slot_size(size);
        let sp = self.sp().wrapping_sub(size.bytes());
        let ss = self.registers.word(Register::SS);
        self.memory.write(ss, sp, size, value);
        self.set_sp(sp);
        Ok(())
    }

    /// Pop a raw value of the given width
    pub fn pop_value(&mut self, size: OperandSize) -> Result<u32, CpuError> {
        let size = slot_size(size);
        let ss = self.registers.word(Register::SS);
        let sp = self.sp();
        if self.stack_depth() < size.bytes() {
            log(LogCategory::Stack, LogLevel::Error, || {
                format!("stack underflow at {:04X}:{:04X}", ss, sp)
            });
            return Err(CpuError::StackUnderflow { ss, sp });
        }
        let value = self.memory.read(ss, sp, size);
        self.set_sp(sp.wrapping_add(size.bytes()));
        Ok(value)
    }

    /// Push the full width of an operand
    pub fn push(&mut self, operand: &Operand) -> Result<(), CpuError> {
        let size = slot_size(operand.size());
        let value = operand.value_as(self, size);
        self.push_value(value, size)
    }

    /// Pop into an operand, reading its full width
    pub fn pop(&mut self, operand: &Operand) -> Result<(), CpuError> {
        let value = self.pop_value(operand.size())?;
        operand.set(self, value as i64)
    }

    /// PUSHA: AX, CX, DX, BX, original SP, BP, SI, DI
    pub fn pusha(&mut self) -> Result<(), CpuError> {
        self.push_all(&PUSHA_ORDER, OperandSize::Word)
    }

    /// POPA: DI, SI, BP, SP slot, BX, DX, CX, AX; SP ends on the saved value
    pub fn popa(&mut self) -> Result<(), CpuError> {
        self.pop_all(&PUSHA_ORDER, OperandSize::Word)
    }

    pub fn pushad(&mut self) -> Result<(), CpuError> {
        self.push_all(&PUSHAD_ORDER, OperandSize::DoubleWord)
    }

    pub fn popad(&mut self) -> Result<(), CpuError> {
        self.pop_all(&PUSHAD_ORDER, OperandSize::DoubleWord)
    }

    fn push_all(&mut self, order: &[Register; 8], size: OperandSize) -> Result<(), CpuError> {
        let original: Vec<u32> = order.iter().map(|&r| self.registers.get(r)).collect();
        for value in original {
            self.push_value(value, size)?;
        }
        Ok(())
    }

    /// Fail with `StackUnderflow` unless `bytes` can be popped, so
    /// multi-slot pops either complete or leave SP untouched
    pub fn require_stack(&self, bytes: u16) -> Result<(), CpuError> {
        if self.stack_depth() < bytes {
            let (ss, sp) = (self.registers.word(Register::SS), self.sp());
            log(LogCategory::Stack, LogLevel::Error, || {
                format!("stack underflow at {:04X}:{:04X}", ss, sp)
            });
            return Err(CpuError::StackUnderflow { ss, sp });
        }
        Ok(())
    }

    fn pop_all(&mut self, order: &[Register; 8], size: OperandSize) -> Result<(), CpuError> {
        self.require_stack(size.bytes() * 8)?;
        let mut saved_sp = None;
        for &reg in order.iter().rev() {
            let value = self.pop_value(size)?;
            if matches!(reg, Register::SP | Register::ESP) {
                saved_sp = Some(value);
            } else {
                self.registers.set(reg, value);
            }
        }
        if let Some(sp) = saved_sp {
            self.registers.set(order[4], sp);
        }
        Ok(())
    }

    /// ENTER: build a stack frame of `size` bytes at nesting `level`
    pub fn enter(&mut self, size: u16, level: u8) -> Result<(), CpuError> {
        let level = level & 0x1F;
        let bp = self.registers.word(Register::BP);
        self.push_value(bp as u32, OperandSize::Word)?;
        let frame = self.sp();

        if level > 0 {
            let ss = self.registers.word(Register::SS);
            let mut outer = bp;
            for _ in 1..level {
                outer = outer.wrapping_sub(2);
                let display = self.memory.get_word(ss, outer);
                self.push_value(display as u32, OperandSize::Word)?;
            }
            self.push_value(frame as u32, OperandSize::Word)?;
        }

        self.registers.set(Register::BP, frame as u32);
        self.set_sp(self.sp().wrapping_sub(size));
        Ok(())
    }

    /// LEAVE: SP = BP, then pop BP
    pub fn leave(&mut self) -> Result<(), CpuError> {
        let bp = self.registers.word(Register::BP);
        self.set_sp(bp);
        let saved = self.pop_value(OperandSize::Word)?;
        self.registers.set(Register::BP, saved);
        Ok(())
    }

    /// Drop `bytes` of caller-pushed arguments (RET n)
    pub fn release_stack(&mut self, bytes: u16) {
        self.set_sp(self.sp().wrapping_add(bytes));
    }
}
