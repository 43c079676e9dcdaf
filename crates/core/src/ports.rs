//! Hardware I/O port space
//!
//! 64K byte-wide ports. Wider accesses cover consecutive ports in
//! little-endian order, so a word written to port 0x60 lands on 0x60/0x61.
//! No device is attached; the port file simply latches whatever was last
//! written so IN reads back OUT.

use crate::logging::{log, LogCategory, LogLevel};
use crate::operand::OperandSize;

const PORT_COUNT: usize = 0x1_0000;

#[derive(Debug, Clone)]
pub struct HardwarePorts {
    latches: Vec<u8>,
}

impl Default for HardwarePorts {
    fn default() -> Self {
        Self::new()
    }
}

impl HardwarePorts {
    pub fn new() -> Self {
        Self {
            latches: vec![0; PORT_COUNT],
        }
    }

    pub fn in_byte(&self, port: u16) -> u8 {
        self.latches[port as usize]
    }

    pub fn out_byte(&mut self, port: u16, value: u8) {
        self.latches[port as usize] = value;
    }

    pub fn in_word(&self, port: u16) -> u16 {
        u16::from_le_bytes([self.in_byte(port), self.in_byte(port.wrapping_add(1))])
    }

    pub fn out_word(&mut self, port: u16, value: u16) {
        let [low, high] = value.to_le_bytes();
        self.out_byte(port, low);
        self.out_byte(port.wrapping_add(1), high);
    }

    pub fn in_double_word(&self, port: u16) -> u32 {
        (self.in_word(port) as u32) | ((self.in_word(port.wrapping_add(2)) as u32) << 16)
    }

    pub fn out_double_word(&mut self, port: u16, value: u32) {
        self.out_word(port, value as u16);
        self.out_word(port.wrapping_add(2), (value >> 16) as u16);
    }

    /// Sized read used by IN
    pub fn read(&self, port: u16, size: OperandSize) -> u32 {
        let value = match size {
            OperandSize::Byte => self.in_byte(port) as u32,
            OperandSize::Word => self.in_word(port) as u32,
            OperandSize::DoubleWord => self.in_double_word(port),
        };
        log(LogCategory::Ports, LogLevel::Trace, || {
            format!("IN  {:04X} -> {:0width$X}", port, value, width = size.bytes() as usize * 2)
        });
        value
    }

    /// Sized write used by OUT
    pub fn write(&mut self, port: u16, size: OperandSize, value: u32) {
        log(LogCategory::Ports, LogLevel::Trace, || {
            format!("OUT {:04X} <- {:0width$X}", port, value, width = size.bytes() as usize * 2)
        });
        match size {
            OperandSize::Byte => self.out_byte(port, value as u8),
            OperandSize::Word => self.out_word(port, value as u16),
            OperandSize::DoubleWord => self.out_double_word(port, value),
        }
    }

    /// Zero every latch
    pub fn clear(&mut self) {
        self.latches.fill(0);
    }
}
