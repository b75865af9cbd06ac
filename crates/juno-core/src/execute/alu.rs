//! Arithmetic and bitwise operations.
//!
//! All arithmetic is two's-complement wrapping on signed 64-bit values.

use crate::encoding::OpcodeEncoding;
use crate::fault::FaultCode;

/// ALU operations, each with its own configurable latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum AluOp {
    /// Integer add.
    Add,
    /// Integer subtract.
    Sub,
    /// Integer multiply.
    Mul,
    /// Integer divide, truncating toward zero.
    Div,
    /// Integer remainder, sign follows the dividend.
    Mod,
    /// Bitwise and.
    And,
    /// Bitwise or.
    Or,
    /// Bitwise exclusive or.
    Xor,
    /// Bitwise complement of the first operand.
    Not,
}

impl AluOp {
    /// Maps an opcode to its ALU operation. Non-ALU opcodes have none.
    #[must_use]
    pub const fn from_encoding(encoding: OpcodeEncoding) -> Option<Self> {
        match encoding {
            OpcodeEncoding::Add => Some(Self::Add),
            OpcodeEncoding::Sub => Some(Self::Sub),
            OpcodeEncoding::Mul => Some(Self::Mul),
            OpcodeEncoding::Div => Some(Self::Div),
            OpcodeEncoding::Mod => Some(Self::Mod),
            OpcodeEncoding::And => Some(Self::And),
            OpcodeEncoding::Or => Some(Self::Or),
            OpcodeEncoding::Xor => Some(Self::Xor),
            OpcodeEncoding::Not => Some(Self::Not),
            _ => None,
        }
    }

    /// True for operations that read only the first source register.
    #[must_use]
    pub const fn is_unary(self) -> bool {
        matches!(self, Self::Not)
    }
}

/// Computes `op(lhs, rhs)`. `rhs` is ignored for unary operations.
///
/// `i64::MIN / -1` wraps to `i64::MIN` and `i64::MIN % -1` to `0`.
///
/// # Errors
///
/// Returns [`FaultCode::DivideByZero`] for `DIV` or `MOD` with `rhs == 0`.
pub const fn evaluate(op: AluOp, lhs: i64, rhs: i64) -> Result<i64, FaultCode> {
    Ok(match op {
        AluOp::Add => lhs.wrapping_add(rhs),
        AluOp::Sub => lhs.wrapping_sub(rhs),
        AluOp::Mul => lhs.wrapping_mul(rhs),
        AluOp::Div => {
            if rhs == 0 {
                return Err(FaultCode::DivideByZero);
            }
            lhs.wrapping_div(rhs)
        }
        AluOp::Mod => {
            if rhs == 0 {
                return Err(FaultCode::DivideByZero);
            }
            lhs.wrapping_rem(rhs)
        }
        AluOp::And => lhs & rhs,
        AluOp::Or => lhs | rhs,
        AluOp::Xor => lhs ^ rhs,
        AluOp::Not => !lhs,
    })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rstest::rstest;

    use super::{evaluate, AluOp};
    use crate::encoding::{OpcodeClass, OPCODE_ENCODING_TABLE};
    use crate::fault::FaultCode;

    #[rstest]
    #[case(AluOp::Add, 5, 7, 12)]
    #[case(AluOp::Add, i64::MAX, 1, i64::MIN)]
    #[case(AluOp::Sub, 5, 7, -2)]
    #[case(AluOp::Sub, i64::MIN, 1, i64::MAX)]
    #[case(AluOp::Mul, -3, 7, -21)]
    #[case(AluOp::Mul, i64::MAX, 2, -2)]
    #[case(AluOp::Div, 17, 5, 3)]
    #[case(AluOp::Div, -17, 5, -3)]
    #[case(AluOp::Div, i64::MIN, -1, i64::MIN)]
    #[case(AluOp::Mod, 17, 5, 2)]
    #[case(AluOp::Mod, -17, 5, -2)]
    #[case(AluOp::Mod, i64::MIN, -1, 0)]
    #[case(AluOp::And, 0b1100, 0b1010, 0b1000)]
    #[case(AluOp::Or, 0b1100, 0b1010, 0b1110)]
    #[case(AluOp::Xor, 0b1100, 0b1010, 0b0110)]
    #[case(AluOp::Not, 0, 99, -1)]
    fn evaluate_matches_expected(
        #[case] op: AluOp,
        #[case] lhs: i64,
        #[case] rhs: i64,
        #[case] expected: i64,
    ) {
        assert_eq!(evaluate(op, lhs, rhs), Ok(expected));
    }

    #[rstest]
    #[case(AluOp::Div)]
    #[case(AluOp::Mod)]
    fn zero_divisor_is_a_fault(#[case] op: AluOp) {
        assert_eq!(evaluate(op, 42, 0), Err(FaultCode::DivideByZero));
    }

    #[test]
    fn every_arithmetic_and_bitwise_opcode_maps_to_an_operation() {
        for (_, encoding) in OPCODE_ENCODING_TABLE {
            let is_alu = matches!(
                encoding.class(),
                OpcodeClass::Arithmetic | OpcodeClass::Bitwise
            );
            assert_eq!(AluOp::from_encoding(*encoding).is_some(), is_alu);
        }
    }

    proptest! {
        #[test]
        fn evaluate_never_panics(lhs in any::<i64>(), rhs in any::<i64>()) {
            for op in [
                AluOp::Add, AluOp::Sub, AluOp::Mul, AluOp::Div, AluOp::Mod,
                AluOp::And, AluOp::Or, AluOp::Xor, AluOp::Not,
            ] {
                let result = evaluate(op, lhs, rhs);
                prop_assert_eq!(result.is_err(), rhs == 0 && matches!(op, AluOp::Div | AluOp::Mod));
            }
        }
    }
}
