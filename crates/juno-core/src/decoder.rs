//! Instruction codec for the Juno ISA.
//!
//! Every instruction is a little-endian 32-bit word. Byte 0 is the opcode,
//! byte 1 the first source register, byte 2 the second source register and
//! byte 3 the write register. Jump instructions reuse bytes 2..=3 as a signed
//! word offset; absolute-address instructions reuse bytes 1..=2 as an
//! unsigned literal-pool address.

use crate::encoding::{classify_opcode, OpcodeEncoding};

/// Instruction word with every field view extracted.
///
/// All views are always present; which ones are meaningful depends on the
/// opcode's [`crate::encoding::OperandForm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DecodedInstruction {
    /// Raw instruction word.
    pub word: u32,
    /// Opcode byte.
    pub opcode: u8,
    /// First source register index (byte 1).
    pub reg1: u8,
    /// Second source register index (byte 2).
    pub reg2: u8,
    /// Destination register index (byte 3).
    pub write_reg: u8,
    /// Signed jump offset in instruction words (bytes 2..=3).
    pub jump_offset: i16,
    /// Literal-pool address (bytes 1..=2).
    pub abs_addr: u16,
}

impl DecodedInstruction {
    /// Returns the fixed-table encoding, or `None` for a custom opcode.
    #[must_use]
    pub fn encoding(&self) -> Option<OpcodeEncoding> {
        classify_opcode(self.opcode)
    }
}

/// Stateless instruction decoder.
pub struct Decoder;

impl Decoder {
    /// Splits a 32-bit instruction word into its field views.
    ///
    /// Decoding is total: unassigned opcodes are resolved at dispatch time.
    #[must_use]
    pub const fn decode(word: u32) -> DecodedInstruction {
        let [opcode, reg1, reg2, write_reg] = word.to_le_bytes();
        DecodedInstruction {
            word,
            opcode,
            reg1,
            reg2,
            write_reg,
            jump_offset: i16::from_le_bytes([reg2, write_reg]),
            abs_addr: u16::from_le_bytes([reg1, reg2]),
        }
    }

    /// Reads the instruction word at the start of `bytes`.
    ///
    /// Returns `None` when fewer than four bytes are available.
    #[must_use]
    pub fn decode_bytes(bytes: &[u8]) -> Option<DecodedInstruction> {
        let word: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
        Some(Self::decode(u32::from_le_bytes(word)))
    }
}

/// Encodes a two-source register instruction (`ADD r1, r2, rw`).
#[must_use]
pub const fn encode_alu(opcode: u8, reg1: u8, reg2: u8, write_reg: u8) -> u32 {
    u32::from_le_bytes([opcode, reg1, reg2, write_reg])
}

/// Encodes a one-source register instruction (`NOT r1, rw`).
#[must_use]
pub const fn encode_unary(opcode: u8, reg1: u8, write_reg: u8) -> u32 {
    u32::from_le_bytes([opcode, reg1, 0, write_reg])
}

/// Encodes `LOAD`: address taken from `address_reg`, result written to `write_reg`.
#[must_use]
pub const fn encode_load(address_reg: u8, write_reg: u8) -> u32 {
    u32::from_le_bytes([OpcodeEncoding::Load.opcode(), address_reg, 0, write_reg])
}

/// Encodes `STORE`: value from `value_reg` written to the address in `address_reg`.
#[must_use]
pub const fn encode_store(value_reg: u8, address_reg: u8) -> u32 {
    u32::from_le_bytes([OpcodeEncoding::Store.opcode(), value_reg, address_reg, 0])
}

/// Encodes an absolute-address instruction (`LDA`, `STA`).
#[must_use]
pub const fn encode_absolute(opcode: u8, abs_addr: u16, reg: u8) -> u32 {
    let [low, high] = abs_addr.to_le_bytes();
    u32::from_le_bytes([opcode, low, high, reg])
}

/// Encodes a conditional jump with a signed word offset.
#[must_use]
pub const fn encode_jump(opcode: u8, reg1: u8, offset: i16) -> u32 {
    let [low, high] = offset.to_le_bytes();
    u32::from_le_bytes([opcode, reg1, low, high])
}

/// Encodes an operand-less instruction (`NOOP`, `HALT`).
#[must_use]
pub const fn encode_control(opcode: u8) -> u32 {
    opcode as u32
}
