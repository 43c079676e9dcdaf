//! Register file of the 80x86 family
//!
//! Leaf storage holds the eight byte halves (AL..BH), the four pointer/index
//! words (SP, BP, SI, DI), the upper words of the 32-bit extensions, the six
//! segment registers and IP. Every other general-purpose register is a
//! composite: AX is AH:AL, EAX is the hidden upper word over AX. Composites
//! own no storage and always go through `get`/`set` of their halves, so the
//! halves can never drift out of sync.

use crate::flags::Flags;
use crate::operand::OperandSize;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Every architecturally visible register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(clippy::upper_case_acronyms)]
pub enum Register {
    AL,
    CL,
    DL,
    BL,
    AH,
    CH,
    DH,
    BH,
    AX,
    CX,
    DX,
    BX,
    SP,
    BP,
    SI,
    DI,
    EAX,
    ECX,
    EDX,
    EBX,
    ESP,
    EBP,
    ESI,
    EDI,
    ES,
    CS,
    SS,
    DS,
    FS,
    GS,
    IP,
    FLAGS,
}

/// The segment registers, usable as override prefixes and memory segments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentRegister {
    ES,
    CS,
    SS,
    DS,
    FS,
    GS,
}

/// Where a register's bits physically live
enum Layout {
    Byte(usize),
    Word(usize),
    Extended { upper: usize, low: Register },
    Composite { high: Register, low: Register },
    Segment(usize),
    InstructionPointer,
    Flags,
}

impl Register {
    /// Width of the register
    pub const fn size(self) -> OperandSize {
        use Register::*;
        match self {
            AL | CL | DL | BL | AH | CH | DH | BH => OperandSize::Byte,
            EAX | ECX | EDX | EBX | ESP | EBP | ESI | EDI => OperandSize::DoubleWord,
            _ => OperandSize::Word,
        }
    }

    /// The 3-bit register number used by the x86 encodings (None for IP/FLAGS)
    pub const fn index(self) -> Option<u8> {
        use Register::*;
        let index = match self {
            AL | AX | EAX | ES => 0,
            CL | CX | ECX | CS => 1,
            DL | DX | EDX | SS => 2,
            BL | BX | EBX | DS => 3,
            AH | SP | ESP | FS => 4,
            CH | BP | EBP | GS => 5,
            DH | SI | ESI => 6,
            BH | DI | EDI => 7,
            IP | FLAGS => return None,
        };
        Some(index)
    }

    pub const fn name(self) -> &'static str {
        use Register::*;
        match self {
            AL => "AL",
            CL => "CL",
            DL => "DL",
            BL => "BL",
            AH => "AH",
            CH => "CH",
            DH => "DH",
            BH => "BH",
            AX => "AX",
            CX => "CX",
            DX => "DX",
            BX => "BX",
            SP => "SP",
            BP => "BP",
            SI => "SI",
            DI => "DI",
            EAX => "EAX",
            ECX => "ECX",
            EDX => "EDX",
            EBX => "EBX",
            ESP => "ESP",
            EBP => "EBP",
            ESI => "ESI",
            EDI => "EDI",
            ES => "ES",
            CS => "CS",
            SS => "SS",
            DS => "DS",
            FS => "FS",
            GS => "GS",
            IP => "IP",
            FLAGS => "FLAGS",
        }
    }

    /// Segment register view of this register, if it is one
    pub const fn as_segment(self) -> Option<SegmentRegister> {
        match self {
            Register::ES => Some(SegmentRegister::ES),
            Register::CS => Some(SegmentRegister::CS),
            Register::SS => Some(SegmentRegister::SS),
            Register::DS => Some(SegmentRegister::DS),
            Register::FS => Some(SegmentRegister::FS),
            Register::GS => Some(SegmentRegister::GS),
            _ => None,
        }
    }

    pub const fn is_segment(self) -> bool {
        self.as_segment().is_some()
    }

    /// General-purpose register of any width (not segment, IP or FLAGS)
    pub const fn is_general(self) -> bool {
        !self.is_segment() && self.index().is_some()
    }

    /// True for the 80386 extensions (32-bit registers, FS and GS)
    pub const fn is_80386_only(self) -> bool {
        use Register::*;
        matches!(
            self,
            EAX | ECX | EDX | EBX | ESP | EBP | ESI | EDI | FS | GS
        )
    }

    /// Accumulator register of the given width
    pub const fn accumulator(size: OperandSize) -> Register {
        match size {
            OperandSize::Byte => Register::AL,
            OperandSize::Word => Register::AX,
            OperandSize::DoubleWord => Register::EAX,
        }
    }

    /// Data register (high half of a widening multiply/divide) for the given width
    pub const fn data(size: OperandSize) -> Register {
        match size {
            OperandSize::Byte => Register::AH,
            OperandSize::Word => Register::DX,
            OperandSize::DoubleWord => Register::EDX,
        }
    }

    /// Count register of the given width (CX, or ECX for 32-bit forms)
    pub const fn counter(size: OperandSize) -> Register {
        match size {
            OperandSize::DoubleWord => Register::ECX,
            _ => Register::CX,
        }
    }

    fn layout(self) -> Layout {
        use Register::*;
        match self {
            AL => Layout::Byte(0),
            CL => Layout::Byte(1),
            DL => Layout::Byte(2),
            BL => Layout::Byte(3),
            AH => Layout::Byte(4),
            CH => Layout::Byte(5),
            DH => Layout::Byte(6),
            BH => Layout::Byte(7),
            AX => Layout::Composite { high: AH, low: AL },
            CX => Layout::Composite { high: CH, low: CL },
            DX => Layout::Composite { high: DH, low: DL },
            BX => Layout::Composite { high: BH, low: BL },
            SP => Layout::Word(0),
            BP => Layout::Word(1),
            SI => Layout::Word(2),
            DI => Layout::Word(3),
            EAX => Layout::Extended { upper: 0, low: AX },
            ECX => Layout::Extended { upper: 1, low: CX },
            EDX => Layout::Extended { upper: 2, low: DX },
            EBX => Layout::Extended { upper: 3, low: BX },
            ESP => Layout::Extended { upper: 4, low: SP },
            EBP => Layout::Extended { upper: 5, low: BP },
            ESI => Layout::Extended { upper: 6, low: SI },
            EDI => Layout::Extended { upper: 7, low: DI },
            ES => Layout::Segment(0),
            CS => Layout::Segment(1),
            SS => Layout::Segment(2),
            DS => Layout::Segment(3),
            FS => Layout::Segment(4),
            GS => Layout::Segment(5),
            IP => Layout::InstructionPointer,
            FLAGS => Layout::Flags,
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl SegmentRegister {
    pub const fn register(self) -> Register {
        match self {
            SegmentRegister::ES => Register::ES,
            SegmentRegister::CS => Register::CS,
            SegmentRegister::SS => Register::SS,
            SegmentRegister::DS => Register::DS,
            SegmentRegister::FS => Register::FS,
            SegmentRegister::GS => Register::GS,
        }
    }
}

impl fmt::Display for SegmentRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.register().name())
    }
}

/// Storage for all registers, including FLAGS
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterFile {
    /// AL, CL, DL, BL, AH, CH, DH, BH
    bytes: [u8; 8],
    /// SP, BP, SI, DI
    words: [u16; 4],
    /// Upper words of EAX..EDI
    upper: [u16; 8],
    /// ES, CS, SS, DS, FS, GS
    segments: [u16; 6],
    ip: u16,
    pub flags: Flags,
}

impl RegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a register, zero-extended to 32 bits
    pub fn get(&self, reg: Register) -> u32 {
        match reg.layout() {
            Layout::Byte(i) => self.bytes[i] as u32,
            Layout::Word(i) => self.words[i] as u32,
            Layout::Segment(i) => self.segments[i] as u32,
            Layout::InstructionPointer => self.ip as u32,
            Layout::Flags => self.flags.bits() as u32,
            Layout::Composite { high, low } => (self.get(high) << 8) | self.get(low),
            Layout::Extended { upper, low } => ((self.upper[upper] as u32) << 16) | self.get(low),
        }
    }

    /// Write a register; the value is masked to the register width
    pub fn set(&mut self, reg: Register, value: u32) {
        let value = value & reg.size().mask();
        match reg.layout() {
            Layout::Byte(i) => self.bytes[i] = value as u8,
            Layout::Word(i) => self.words[i] = value as u16,
            Layout::Segment(i) => self.segments[i] = value as u16,
            Layout::InstructionPointer => self.ip = value as u16,
            Layout::Flags => self.flags.set_bits(value as u16),
            Layout::Composite { high, low } => {
                self.set(high, value >> 8);
                self.set(low, value & 0xFF);
            }
            Layout::Extended { upper, low } => {
                self.upper[upper] = (value >> 16) as u16;
                self.set(low, value & 0xFFFF);
            }
        }
    }

    /// Read a 16-bit register directly
    #[inline]
    pub fn word(&self, reg: Register) -> u16 {
        self.get(reg) as u16
    }

    /// Add a signed delta, wrapping at the register width; returns the new value
    pub fn add(&mut self, reg: Register, delta: i64) -> u32 {
        let value = (self.get(reg) as i64).wrapping_add(delta) as u32;
        self.set(reg, value);
        self.get(reg)
    }

    /// AND the register with `mask`; returns the new value
    pub fn and(&mut self, reg: Register, mask: u32) -> u32 {
        self.set(reg, self.get(reg) & mask);
        self.get(reg)
    }

    /// OR the register with `mask`; returns the new value
    pub fn or(&mut self, reg: Register, mask: u32) -> u32 {
        self.set(reg, self.get(reg) | mask);
        self.get(reg)
    }

    /// Shift left by `bits`; bits shifted past the width are lost
    pub fn lshift(&mut self, reg: Register, bits: u32) -> u32 {
        let shifted = if bits >= 32 { 0 } else { self.get(reg) << bits };
        self.set(reg, shifted);
        self.get(reg)
    }

    /// Logical shift right by `bits`
    pub fn rshift(&mut self, reg: Register, bits: u32) -> u32 {
        let shifted = if bits >= 32 { 0 } else { self.get(reg) >> bits };
        self.set(reg, shifted);
        self.get(reg)
    }

    /// Set or clear bit `n`
    pub fn set_bit(&mut self, reg: Register, n: u32, on: bool) -> u32 {
        let bit = 1u32.checked_shl(n).unwrap_or(0);
        let value = if on {
            self.get(reg) | bit
        } else {
            self.get(reg) & !bit
        };
        self.set(reg, value);
        self.get(reg)
    }

    pub fn is_bit_set(&self, reg: Register, n: u32) -> bool {
        n < 32 && (self.get(reg) >> n) & 1 != 0
    }

    pub fn segment(&self, seg: SegmentRegister) -> u16 {
        self.get(seg.register()) as u16
    }

    pub fn ip(&self) -> u16 {
        self.ip
    }

    pub fn set_ip(&mut self, ip: u16) {
        self.ip = ip;
    }
}
