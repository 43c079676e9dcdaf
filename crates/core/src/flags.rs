//! FLAGS register and the condition-code arithmetic
//!
//! `update_add`/`update_sub` compute the ALU result and every arithmetic
//! flag in one pass from the raw operands, mirroring the hardware. Callers
//! that only touch a subset of flags (INC/DEC keep CF, rotates only touch CF
//! and OF) use the narrower helpers so nothing outside the documented set is
//! modified.

use crate::operand::OperandSize;
use serde::{Deserialize, Serialize};

// Flag bit positions in FLAGS register
pub const FLAG_CF: u16 = 0x0001; // Carry Flag
pub const FLAG_PF: u16 = 0x0004; // Parity Flag
pub const FLAG_AF: u16 = 0x0010; // Auxiliary Carry Flag
pub const FLAG_ZF: u16 = 0x0040; // Zero Flag
pub const FLAG_SF: u16 = 0x0080; // Sign Flag
pub const FLAG_TF: u16 = 0x0100; // Trap Flag
pub const FLAG_IF: u16 = 0x0200; // Interrupt Enable Flag
pub const FLAG_DF: u16 = 0x0400; // Direction Flag
pub const FLAG_OF: u16 = 0x0800; // Overflow Flag

/// Bit 1 always reads as set
const FLAG_RESERVED: u16 = 0x0002;

const DEFINED_FLAGS: u16 =
    FLAG_CF | FLAG_PF | FLAG_AF | FLAG_ZF | FLAG_SF | FLAG_TF | FLAG_IF | FLAG_DF | FLAG_OF;

/// Named condition flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Flag {
    Carry,
    Parity,
    Auxiliary,
    Zero,
    Sign,
    Trap,
    Interrupt,
    Direction,
    Overflow,
}

impl Flag {
    pub const fn mask(self) -> u16 {
        match self {
            Flag::Carry => FLAG_CF,
            Flag::Parity => FLAG_PF,
            Flag::Auxiliary => FLAG_AF,
            Flag::Zero => FLAG_ZF,
            Flag::Sign => FLAG_SF,
            Flag::Trap => FLAG_TF,
            Flag::Interrupt => FLAG_IF,
            Flag::Direction => FLAG_DF,
            Flag::Overflow => FLAG_OF,
        }
    }
}

/// FLAGS/EFLAGS (only the 16 architecturally defined real-mode bits)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flags {
    bits: u16,
}

impl Default for Flags {
    fn default() -> Self {
        Self {
            bits: FLAG_RESERVED,
        }
    }
}

/// True if the low byte has an even number of set bits
#[inline]
pub fn parity(val: u32) -> bool {
    (val as u8).count_ones() % 2 == 0
}

impl Flags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Packed FLAGS word
    pub fn bits(&self) -> u16 {
        self.bits
    }

    /// Load from a packed word; undefined bits are dropped and bit 1 forced on
    pub fn set_bits(&mut self, word: u16) {
        self.bits = (word & DEFINED_FLAGS) | FLAG_RESERVED;
    }

    #[inline]
    pub fn get(&self, flag: Flag) -> bool {
        self.bits & flag.mask() != 0
    }

    #[inline]
    pub fn set(&mut self, flag: Flag, on: bool) {
        if on {
            self.bits |= flag.mask();
        } else {
            self.bits &= !flag.mask();
        }
    }

    pub fn carry(&self) -> bool {
        self.get(Flag::Carry)
    }

    pub fn parity(&self) -> bool {
        self.get(Flag::Parity)
    }

    pub fn auxiliary(&self) -> bool {
        self.get(Flag::Auxiliary)
    }

    pub fn zero(&self) -> bool {
        self.get(Flag::Zero)
    }

    pub fn sign(&self) -> bool {
        self.get(Flag::Sign)
    }

    pub fn trap(&self) -> bool {
        self.get(Flag::Trap)
    }

    pub fn interrupt(&self) -> bool {
        self.get(Flag::Interrupt)
    }

    pub fn direction(&self) -> bool {
        self.get(Flag::Direction)
    }

    pub fn overflow(&self) -> bool {
        self.get(Flag::Overflow)
    }

    /// ZF, SF and PF from a result of the given width
    pub fn update_result(&mut self, result: u32, size: OperandSize) {
        let result = result & size.mask();
        self.set(Flag::Zero, result == 0);
        self.set(Flag::Sign, result & size.sign_bit() != 0);
        self.set(Flag::Parity, parity(result));
    }

    /// `a + b + carry_in`; sets CF, OF, AF, ZF, SF, PF and returns the masked sum
    pub fn update_add(&mut self, a: u32, b: u32, carry_in: bool, size: OperandSize) -> u32 {
        let mask = size.mask();
        let (a, b) = (a & mask, b & mask);
        let wide = a as u64 + b as u64 + carry_in as u64;
        let result = (wide as u32) & mask;

        self.set(Flag::Carry, wide > mask as u64);
        self.set(
            Flag::Overflow,
            (a ^ result) & (b ^ result) & size.sign_bit() != 0,
        );
        self.set(Flag::Auxiliary, (a ^ b ^ result) & 0x10 != 0);
        self.update_result(result, size);
        result
    }

    /// `a - b - borrow_in`; sets CF, OF, AF, ZF, SF, PF and returns the masked difference
    pub fn update_sub(&mut self, a: u32, b: u32, borrow_in: bool, size: OperandSize) -> u32 {
        let mask = size.mask();
        let (a, b) = (a & mask, b & mask);
        let subtrahend = b as u64 + borrow_in as u64;
        let result = (a as u64).wrapping_sub(subtrahend) as u32 & mask;

        self.set(Flag::Carry, (a as u64) < subtrahend);
        self.set(
            Flag::Overflow,
            (a ^ b) & (a ^ result) & size.sign_bit() != 0,
        );
        self.set(Flag::Auxiliary, (a ^ b ^ result) & 0x10 != 0);
        self.update_result(result, size);
        result
    }

    /// CMP: the flags of `a - b` with no destination write
    pub fn compare(&mut self, a: u32, b: u32, size: OperandSize) {
        self.update_sub(a, b, false, size);
    }

    /// AND/OR/XOR/TEST: CF and OF cleared, ZF/SF/PF from the result, AF untouched
    pub fn update_logic(&mut self, result: u32, size: OperandSize) {
        self.set(Flag::Carry, false);
        self.set(Flag::Overflow, false);
        self.update_result(result, size);
    }

    /// INC: like ADD 1 but CF is preserved
    pub fn update_inc(&mut self, a: u32, size: OperandSize) -> u32 {
        let carry = self.carry();
        let result = self.update_add(a, 1, false, size);
        self.set(Flag::Carry, carry);
        result
    }

    /// DEC: like SUB 1 but CF is preserved
    pub fn update_dec(&mut self, a: u32, size: OperandSize) -> u32 {
        let carry = self.carry();
        let result = self.update_sub(a, 1, false, size);
        self.set(Flag::Carry, carry);
        result
    }

    /// Low byte as loaded/stored by LAHF/SAHF (SF ZF - AF - PF - CF)
    pub fn low_byte(&self) -> u8 {
        self.bits as u8
    }

    pub fn set_low_byte(&mut self, byte: u8) {
        let low = (byte as u16) & (FLAG_CF | FLAG_PF | FLAG_AF | FLAG_ZF | FLAG_SF);
        self.bits = (self.bits & 0xFF00) | low | FLAG_RESERVED;
    }
}
