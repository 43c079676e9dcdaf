//! Real-mode segmented memory
//!
//! A flat 1MB byte array reachable only through `segment:offset` pairs.
//! Physical addresses wrap at the 20-bit boundary the way an 8086 without
//! an A20 gate does, and multi-byte accesses wrap their offset within the
//! segment.

use crate::operand::OperandSize;
use serde::{Deserialize, Serialize};

/// Size of the real-mode address space
pub const MEMORY_SIZE: usize = 0x10_0000;

const ADDRESS_MASK: u32 = (MEMORY_SIZE as u32) - 1;

/// `(segment << 4) + offset`, wrapped to 20 bits
#[inline]
pub const fn compute_physical_address(segment: u16, offset: u16) -> u32 {
    (((segment as u32) << 4) + offset as u32) & ADDRESS_MASK
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memory {
    bytes: Vec<u8>,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    pub fn new() -> Self {
        Self::with_size(MEMORY_SIZE)
    }

    /// Memory of a custom size (rounded up to a power of two so addressing
    /// can still wrap by masking)
    pub fn with_size(size: usize) -> Self {
        Self {
            bytes: vec![0; size.max(1).next_power_of_two()],
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Zero every byte
    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }

    #[inline]
    fn index(&self, physical: u32) -> usize {
        physical as usize & (self.bytes.len() - 1)
    }

    #[inline]
    pub fn read_physical(&self, physical: u32) -> u8 {
        self.bytes[self.index(physical)]
    }

    #[inline]
    pub fn write_physical(&mut self, physical: u32, value: u8) {
        let index = self.index(physical);
        self.bytes[index] = value;
    }

    pub fn get_byte(&self, segment: u16, offset: u16) -> u8 {
        self.read_physical(compute_physical_address(segment, offset))
    }

    pub fn set_byte(&mut self, segment: u16, offset: u16, value: u8) {
        self.write_physical(compute_physical_address(segment, offset), value);
    }

    /// Little-endian word; the high byte comes from `offset + 1` within the segment
    pub fn get_word(&self, segment: u16, offset: u16) -> u16 {
        let low = self.get_byte(segment, offset) as u16;
        let high = self.get_byte(segment, offset.wrapping_add(1)) as u16;
        (high << 8) | low
    }

    pub fn set_word(&mut self, segment: u16, offset: u16, value: u16) {
        self.set_byte(segment, offset, value as u8);
        self.set_byte(segment, offset.wrapping_add(1), (value >> 8) as u8);
    }

    pub fn get_double_word(&self, segment: u16, offset: u16) -> u32 {
        let low = self.get_word(segment, offset) as u32;
        let high = self.get_word(segment, offset.wrapping_add(2)) as u32;
        (high << 16) | low
    }

    pub fn set_double_word(&mut self, segment: u16, offset: u16, value: u32) {
        self.set_word(segment, offset, value as u16);
        self.set_word(segment, offset.wrapping_add(2), (value >> 16) as u16);
    }

    /// Sized read, zero-extended
    pub fn read(&self, segment: u16, offset: u16, size: OperandSize) -> u32 {
        match size {
            OperandSize::Byte => self.get_byte(segment, offset) as u32,
            OperandSize::Word => self.get_word(segment, offset) as u32,
            OperandSize::DoubleWord => self.get_double_word(segment, offset),
        }
    }

    /// Sized write; bits above the width are dropped
    pub fn write(&mut self, segment: u16, offset: u16, size: OperandSize, value: u32) {
        match size {
            OperandSize::Byte => self.set_byte(segment, offset, value as u8),
            OperandSize::Word => self.set_word(segment, offset, value as u16),
            OperandSize::DoubleWord => self.set_double_word(segment, offset, value),
        }
    }

    pub fn get_bytes(&self, segment: u16, offset: u16, len: usize) -> Vec<u8> {
        (0..len)
            .map(|i| self.get_byte(segment, offset.wrapping_add(i as u16)))
            .collect()
    }

    pub fn set_bytes(&mut self, segment: u16, offset: u16, data: &[u8]) {
        for (i, &byte) in data.iter().enumerate() {
            self.set_byte(segment, offset.wrapping_add(i as u16), byte);
        }
    }

    /// Copy `len` bytes between two segmented regions. The source is read in
    /// full first, so overlapping regions copy as if through a buffer.
    pub fn copy_block(
        &mut self,
        src_segment: u16,
        src_offset: u16,
        dst_segment: u16,
        dst_offset: u16,
        len: usize,
    ) {
        let data = self.get_bytes(src_segment, src_offset, len);
        self.set_bytes(dst_segment, dst_offset, &data);
    }

    /// Reverse `len` bytes in place (endian conversion of a block)
    pub fn reverse_block(&mut self, segment: u16, offset: u16, len: usize) {
        let mut data = self.get_bytes(segment, offset, len);
        data.reverse();
        self.set_bytes(segment, offset, &data);
    }

    /// Read bytes up to (not including) `terminator`, at most `limit` bytes
    pub fn read_until(&self, segment: u16, offset: u16, terminator: u8, limit: usize) -> Vec<u8> {
        let mut out = Vec::new();
        for i in 0..limit {
            let byte = self.get_byte(segment, offset.wrapping_add(i as u16));
            if byte == terminator {
                break;
            }
            out.push(byte);
        }
        out
    }
}
