//! Operand abstraction
//!
//! An operand is a value source and/or destination for an opcode: an
//! immediate constant, a register, a memory location addressed through a
//! segment, or a literal far pointer. All of them share the same
//! `get`/`set`/`size` contract; values are masked to the declared width on
//! construction and on every write.

use crate::cpu_80x86::Intel80x86;
use crate::error::CpuError;
use crate::register::{Register, SegmentRegister};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operand width
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OperandSize {
    Byte,
    Word,
    DoubleWord,
}

impl OperandSize {
    pub const fn bits(self) -> u32 {
        match self {
            OperandSize::Byte => 8,
            OperandSize::Word => 16,
            OperandSize::DoubleWord => 32,
        }
    }

    pub const fn bytes(self) -> u16 {
        match self {
            OperandSize::Byte => 1,
            OperandSize::Word => 2,
            OperandSize::DoubleWord => 4,
        }
    }

    pub const fn mask(self) -> u32 {
        match self {
            OperandSize::Byte => 0xFF,
            OperandSize::Word => 0xFFFF,
            OperandSize::DoubleWord => 0xFFFF_FFFF,
        }
    }

    pub const fn sign_bit(self) -> u32 {
        match self {
            OperandSize::Byte => 0x80,
            OperandSize::Word => 0x8000,
            OperandSize::DoubleWord => 0x8000_0000,
        }
    }

    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            8 => Some(OperandSize::Byte),
            16 => Some(OperandSize::Word),
            32 => Some(OperandSize::DoubleWord),
            _ => None,
        }
    }

    /// Next wider size (the destination width of MUL/DIV)
    pub const fn doubled(self) -> Option<Self> {
        match self {
            OperandSize::Byte => Some(OperandSize::Word),
            OperandSize::Word => Some(OperandSize::DoubleWord),
            OperandSize::DoubleWord => None,
        }
    }

    /// Sign-extend a value of this width to i64
    pub const fn sign_extend(self, value: u32) -> i64 {
        match self {
            OperandSize::Byte => value as u8 as i8 as i64,
            OperandSize::Word => value as u16 as i16 as i64,
            OperandSize::DoubleWord => value as i32 as i64,
        }
    }

    pub const fn pointer_name(self) -> &'static str {
        match self {
            OperandSize::Byte => "BYTE PTR",
            OperandSize::Word => "WORD PTR",
            OperandSize::DoubleWord => "DWORD PTR",
        }
    }
}

/// Format a value as fixed-width hexadecimal (`%02X`/`%04X`/`%08X`)
pub fn hex(value: u32, size: OperandSize) -> String {
    match size {
        OperandSize::Byte => format!("{:02X}", value & 0xFF),
        OperandSize::Word => format!("{:04X}", value & 0xFFFF),
        OperandSize::DoubleWord => format!("{:08X}", value),
    }
}

/// Immediate constant
///
/// The raw bits are stored unsigned and masked; a signed immediate reports
/// the sign-extended interpretation from [`Immediate::value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Immediate {
    raw: u32,
    size: OperandSize,
    signed: bool,
}

impl Immediate {
    pub fn new(value: i64, size: OperandSize, signed: bool) -> Self {
        Self {
            raw: (value as u32) & size.mask(),
            size,
            signed,
        }
    }

    /// Signed interpretation for signed immediates, raw unsigned bits otherwise
    pub fn value(&self) -> i64 {
        if self.signed {
            self.size.sign_extend(self.raw)
        } else {
            self.raw as i64
        }
    }

    /// Stored bits, always unsigned
    pub fn raw(&self) -> u32 {
        self.raw
    }

    pub fn size(&self) -> OperandSize {
        self.size
    }

    pub fn is_signed(&self) -> bool {
        self.signed
    }
}

/// Memory location `segment:[base + index + displacement]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryReference {
    pub size: OperandSize,
    /// Segment written into the operand itself (`ES:[DI]`); beats any prefix
    #[serde(default)]
    pub segment: Option<SegmentRegister>,
    #[serde(default)]
    pub base: Option<Register>,
    #[serde(default)]
    pub index: Option<Register>,
    #[serde(default)]
    pub displacement: i32,
}

impl MemoryReference {
    /// `[offset]`
    pub fn direct(size: OperandSize, offset: u16) -> Self {
        Self {
            size,
            segment: None,
            base: None,
            index: None,
            displacement: offset as i32,
        }
    }

    /// `[base + displacement]`
    pub fn based(size: OperandSize, base: Register, displacement: i32) -> Self {
        Self {
            size,
            segment: None,
            base: Some(base),
            index: None,
            displacement,
        }
    }

    /// `[base + index + displacement]`
    pub fn indexed(size: OperandSize, base: Register, index: Register, displacement: i32) -> Self {
        Self {
            size,
            segment: None,
            base: Some(base),
            index: Some(index),
            displacement,
        }
    }

    pub fn with_segment(mut self, segment: SegmentRegister) -> Self {
        self.segment = Some(segment);
        self
    }

    pub fn with_size(mut self, size: OperandSize) -> Self {
        self.size = size;
        self
    }

    /// Segment used when no prefix or explicit segment applies
    pub fn default_segment(&self) -> SegmentRegister {
        let stack_based = |reg: Option<Register>| {
            matches!(
                reg,
                Some(Register::BP) | Some(Register::EBP) | Some(Register::SP) | Some(Register::ESP)
            )
        };
        if stack_based(self.base) {
            SegmentRegister::SS
        } else {
            SegmentRegister::DS
        }
    }

    /// Effective 16-bit offset
    pub fn offset(&self, cpu: &Intel80x86) -> u16 {
        let base = self.base.map_or(0, |r| cpu.registers.get(r));
        let index = self.index.map_or(0, |r| cpu.registers.get(r));
        base.wrapping_add(index)
            .wrapping_add(self.displacement as u32) as u16
    }

    /// Segment value after applying the explicit segment, then any prefix
    pub fn segment_value(&self, cpu: &Intel80x86) -> u16 {
        match self.segment {
            Some(seg) => cpu.registers.segment(seg),
            None => cpu.effective_segment(self.default_segment()),
        }
    }

    pub fn read(&self, cpu: &Intel80x86) -> u32 {
        let segment = self.segment_value(cpu);
        let offset = self.offset(cpu);
        cpu.memory.read(segment, offset, self.size)
    }

    pub fn write(&self, cpu: &mut Intel80x86, value: u32) {
        let segment = self.segment_value(cpu);
        let offset = self.offset(cpu);
        cpu.memory.write(segment, offset, self.size, value);
    }

    fn registers(&self) -> impl Iterator<Item = Register> {
        self.base.into_iter().chain(self.index)
    }
}

impl fmt::Display for MemoryReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.size.pointer_name())?;
        if let Some(seg) = self.segment {
            write!(f, "{}:", seg)?;
        }
        f.write_str("[")?;
        let mut first = true;
        for reg in self.registers() {
            if !first {
                f.write_str("+")?;
            }
            write!(f, "{}", reg)?;
            first = false;
        }
        if first {
            write!(f, "{:04X}", self.displacement as u16)?;
        } else if self.displacement > 0 {
            write!(f, "+{:04X}", self.displacement)?;
        } else if self.displacement < 0 {
            write!(f, "-{:04X}", self.displacement.unsigned_abs())?;
        }
        f.write_str("]")
    }
}

/// Literal `segment:offset` target of a far JMP/CALL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarPointer {
    pub segment: u16,
    pub offset: u16,
}

/// Operand variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    Immediate(Immediate),
    Register(Register),
    Memory(MemoryReference),
    Far(FarPointer),
}

impl Operand {
    /// Unsigned 8-bit immediate
    pub fn imm8(value: u8) -> Self {
        Operand::Immediate(Immediate::new(value as i64, OperandSize::Byte, false))
    }

    /// Signed 8-bit immediate (sign-extended when consumed by wider operations)
    pub fn simm8(value: i8) -> Self {
        Operand::Immediate(Immediate::new(value as i64, OperandSize::Byte, true))
    }

    pub fn imm16(value: u16) -> Self {
        Operand::Immediate(Immediate::new(value as i64, OperandSize::Word, false))
    }

    pub fn imm32(value: u32) -> Self {
        Operand::Immediate(Immediate::new(value as i64, OperandSize::DoubleWord, false))
    }

    /// Immediate of arbitrary width, masked on construction
    pub fn immediate(value: i64, size: OperandSize) -> Self {
        Operand::Immediate(Immediate::new(value, size, false))
    }

    pub fn reg(register: Register) -> Self {
        Operand::Register(register)
    }

    pub fn mem(reference: MemoryReference) -> Self {
        Operand::Memory(reference)
    }

    pub fn far(segment: u16, offset: u16) -> Self {
        Operand::Far(FarPointer { segment, offset })
    }

    pub fn size(&self) -> OperandSize {
        match self {
            Operand::Immediate(imm) => imm.size(),
            Operand::Register(reg) => reg.size(),
            Operand::Memory(mem) => mem.size,
            Operand::Far(_) => OperandSize::DoubleWord,
        }
    }

    pub fn size_in_bits(&self) -> u32 {
        self.size().bits()
    }

    /// Current value within the declared width (signed immediates sign-extended)
    pub fn get(&self, cpu: &Intel80x86) -> i64 {
        match self {
            Operand::Immediate(imm) => imm.value(),
            Operand::Register(reg) => cpu.registers.get(*reg) as i64,
            Operand::Memory(mem) => mem.read(cpu) as i64,
            Operand::Far(ptr) => (((ptr.segment as u32) << 16) | ptr.offset as u32) as i64,
        }
    }

    /// Value as raw bits of this operand's own width
    pub fn get_unsigned(&self, cpu: &Intel80x86) -> u32 {
        (self.get(cpu) as u32) & self.size().mask()
    }

    /// Value widened (sign-extending signed immediates) and masked to `size`
    pub fn value_as(&self, cpu: &Intel80x86, size: OperandSize) -> u32 {
        (self.get(cpu) as u32) & size.mask()
    }

    /// Store `value` masked to the operand width
    pub fn set(&self, cpu: &mut Intel80x86, value: i64) -> Result<(), CpuError> {
        let value = (value as u32) & self.size().mask();
        match self {
            Operand::Register(reg) => {
                cpu.set_register(*reg, value);
                Ok(())
            }
            Operand::Memory(mem) => {
                mem.write(cpu, value);
                Ok(())
            }
            Operand::Immediate(_) | Operand::Far(_) => {
                Err(CpuError::OperandNotSettable(self.to_string()))
            }
        }
    }

    pub fn is_settable(&self) -> bool {
        matches!(self, Operand::Register(_) | Operand::Memory(_))
    }

    pub fn is_immediate(&self) -> bool {
        matches!(self, Operand::Immediate(_))
    }

    pub fn is_memory(&self) -> bool {
        matches!(self, Operand::Memory(_))
    }

    pub fn as_register(&self) -> Option<Register> {
        match self {
            Operand::Register(reg) => Some(*reg),
            _ => None,
        }
    }

    pub fn as_memory(&self) -> Option<&MemoryReference> {
        match self {
            Operand::Memory(mem) => Some(mem),
            _ => None,
        }
    }

    /// True if this operand needs an 80386 (32-bit width, extended or FS/GS registers)
    pub fn needs_80386(&self) -> bool {
        if self.size() == OperandSize::DoubleWord && !matches!(self, Operand::Far(_)) {
            return true;
        }
        match self {
            Operand::Register(reg) => reg.is_80386_only(),
            Operand::Memory(mem) => {
                mem.registers().any(|r| r.is_80386_only())
                    || matches!(mem.segment, Some(SegmentRegister::FS | SegmentRegister::GS))
            }
            _ => false,
        }
    }
}

impl From<Register> for Operand {
    fn from(register: Register) -> Self {
        Operand::Register(register)
    }
}

impl From<MemoryReference> for Operand {
    fn from(reference: MemoryReference) -> Self {
        Operand::Memory(reference)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Immediate(imm) => f.write_str(&hex(imm.raw(), imm.size())),
            Operand::Register(reg) => write!(f, "{}", reg),
            Operand::Memory(mem) => write!(f, "{}", mem),
            Operand::Far(ptr) => write!(f, "{:04X}:{:04X}", ptr.segment, ptr.offset),
        }
    }
}
