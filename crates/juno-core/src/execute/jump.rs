//! Conditional jumps.

use crate::encoding::OpcodeEncoding;

/// Width of one instruction word in bytes.
pub const INSTRUCTION_BYTES: u64 = 4;

/// Condition tested against the jump's source register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum JumpCondition {
    /// `JZERO`: taken when the value is zero.
    Zero,
    /// `JLTZ`: taken when the value is negative.
    LessThanZero,
    /// `JGTZ`: taken when the value is positive.
    GreaterThanZero,
}

impl JumpCondition {
    /// Maps a jump opcode to its condition.
    #[must_use]
    pub const fn from_encoding(encoding: OpcodeEncoding) -> Option<Self> {
        match encoding {
            OpcodeEncoding::Jzero => Some(Self::Zero),
            OpcodeEncoding::Jltz => Some(Self::LessThanZero),
            OpcodeEncoding::Jgtz => Some(Self::GreaterThanZero),
            _ => None,
        }
    }

    /// Tests the condition against a register value.
    #[must_use]
    pub const fn holds(self, value: i64) -> bool {
        match self {
            Self::Zero => value == 0,
            Self::LessThanZero => value < 0,
            Self::GreaterThanZero => value > 0,
        }
    }
}

/// Returns the program counter after a conditional jump at `pc`.
///
/// A taken jump moves by `offset` instruction words; otherwise execution
/// falls through to `pc + 4`.
#[must_use]
pub const fn next_pc(condition: JumpCondition, pc: u64, value: i64, offset: i16) -> u64 {
    if condition.holds(value) {
        pc.wrapping_add_signed(offset as i64 * INSTRUCTION_BYTES as i64)
    } else {
        pc.wrapping_add(INSTRUCTION_BYTES)
    }
}
