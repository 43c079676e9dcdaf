//! Decoded program stream
//!
//! The CPU never sees bytes: a producer builds a [`Program`] of ready opcodes
//! keyed by physical address, and the fetch loop looks them up by CS:IP.
//! Lengths are bookkeeping only (they decide where IP goes next), so a
//! producer without a real encoder can give every instruction length 1 and
//! still get correct control flow as long as jump targets come from the
//! offsets `push` returns.

use crate::error::CpuError;
use crate::memory::compute_physical_address;
use crate::opcodes::OpCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One ready-to-execute instruction and where it lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedInstruction {
    pub segment: u16,
    pub offset: u16,
    pub length: u16,
    /// Encoded opcode value recorded by the producer (0 when unknown)
    #[serde(default)]
    pub instruction_code: u32,
    pub opcode: OpCode,
}

/// Bytes to place in memory before the program runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataBlock {
    pub segment: u16,
    pub offset: u16,
    pub bytes: Vec<u8>,
}

/// Serialized form of a program
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub instructions: Vec<DecodedInstruction>,
    #[serde(default)]
    pub data: Vec<DataBlock>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    instructions: BTreeMap<u32, DecodedInstruction>,
    data: Vec<DataBlock>,
    entry: Option<(u16, u16)>,
    cursor: (u16, u16),
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the assembly cursor to `segment:offset`
    pub fn org(&mut self, segment: u16, offset: u16) -> &mut Self {
        self.cursor = (segment, offset);
        self
    }

    /// Current cursor position
    pub fn cursor(&self) -> (u16, u16) {
        self.cursor
    }

    /// Append an opcode of length 1 at the cursor; returns its offset
    pub fn push(&mut self, opcode: OpCode) -> u16 {
        self.push_with_length(opcode, 1, 0)
    }

    /// Append an opcode with an explicit length and encoded value
    pub fn push_with_length(&mut self, opcode: OpCode, length: u16, instruction_code: u32) -> u16 {
        let (segment, offset) = self.cursor;
        self.insert(DecodedInstruction {
            segment,
            offset,
            length,
            instruction_code,
            opcode,
        });
        self.cursor = (segment, offset.wrapping_add(length));
        offset
    }

    fn insert(&mut self, instruction: DecodedInstruction) {
        if self.entry.is_none() {
            self.entry = Some((instruction.segment, instruction.offset));
        }
        let address = compute_physical_address(instruction.segment, instruction.offset);
        self.instructions.insert(address, instruction);
    }

    /// Register bytes to be loaded at `segment:offset`
    pub fn add_data(&mut self, segment: u16, offset: u16, bytes: &[u8]) {
        self.data.push(DataBlock {
            segment,
            offset,
            bytes: bytes.to_vec(),
        });
    }

    pub fn data(&self) -> &[DataBlock] {
        &self.data
    }

    /// CS:IP of the first instruction pushed
    pub fn entry(&self) -> Option<(u16, u16)> {
        self.entry
    }

    pub fn set_entry(&mut self, segment: u16, offset: u16) {
        self.entry = Some((segment, offset));
    }

    pub fn fetch(&self, segment: u16, offset: u16) -> Option<&DecodedInstruction> {
        self.instructions
            .get(&compute_physical_address(segment, offset))
    }

    /// Physical address just past the highest instruction
    pub fn end_address(&self) -> Option<u32> {
        self.instructions.values().next_back().map(|last| {
            compute_physical_address(last.segment, last.offset) + last.length as u32
        })
    }

    /// True if CS:IP sits exactly at the end of the program (or there is no program)
    pub fn is_end(&self, segment: u16, offset: u16) -> bool {
        match self.end_address() {
            Some(end) => compute_physical_address(segment, offset) == end,
            None => true,
        }
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Instructions in address order
    pub fn instructions(&self) -> impl Iterator<Item = &DecodedInstruction> {
        self.instructions.values()
    }

    pub fn to_listing(&self) -> Listing {
        Listing {
            instructions: self.instructions.values().cloned().collect(),
            data: self.data.clone(),
        }
    }

    /// Rebuild a program from a listing; every opcode is re-validated and
    /// the entry point is the first listed instruction
    pub fn from_listing(listing: Listing) -> Result<Self, CpuError> {
        let mut program = Program::new();
        for instruction in listing.instructions {
            instruction.opcode.validate()?;
            let next = instruction.offset.wrapping_add(instruction.length);
            program.cursor = (instruction.segment, next);
            program.insert(instruction);
        }
        program.data = listing.data;
        Ok(program)
    }
}
