use thiserror::Error;

/// Fault classes used for log grouping and policy decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum FaultClass {
    /// Opcode was claimed by neither the fixed table nor any handler.
    Decode,
    /// Fetch or data access outside the permitted address range.
    Memory,
    /// Register index or write-permission violation.
    Register,
    /// Host or handler broke the completion protocol.
    Protocol,
    /// Arithmetic with no defined result.
    Arithmetic,
}

/// Stable fault taxonomy. Every fault is terminal for the running program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum FaultCode {
    /// Opcode unknown to the fixed table and unclaimed (or rejected) by every handler.
    #[error("unknown instruction")]
    UnknownInstruction = 0x01,
    /// Load, store or fetch address at or beyond the configured maximum.
    #[error("address exceeds the configured maximum address")]
    AddressOutOfRange = 0x02,
    /// Program counter points outside the instruction bytes of the image.
    #[error("instruction fetch outside the program image")]
    FetchOutOfImage = 0x03,
    /// Write attempted to `r0` (PC alias) or `r1` (dynamic data base alias).
    #[error("write to hardware-reserved register")]
    ReservedRegisterWrite = 0x04,
    /// Register index at or beyond the configured register count.
    #[error("register index exceeds register count")]
    InvalidRegister = 0x05,
    /// Memory completion carried an identifier with no pending entry.
    #[error("memory completion for unknown request")]
    UnknownRequest = 0x06,
    /// Handler response named no registered handler, or one that was idle.
    #[error("response for unknown or idle handler")]
    UnknownHandler = 0x07,
    /// `DIV` or `MOD` with a zero divisor.
    #[error("integer division by zero")]
    DivideByZero = 0x08,
    /// Memory returned a request id that is still in flight.
    #[error("memory reused an in-flight request id")]
    DuplicateRequest = 0x09,
}

impl FaultCode {
    /// Converts a fault code to its stable byte value.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Converts a stable byte value back into a fault code.
    #[must_use]
    pub const fn from_u8(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::UnknownInstruction),
            0x02 => Some(Self::AddressOutOfRange),
            0x03 => Some(Self::FetchOutOfImage),
            0x04 => Some(Self::ReservedRegisterWrite),
            0x05 => Some(Self::InvalidRegister),
            0x06 => Some(Self::UnknownRequest),
            0x07 => Some(Self::UnknownHandler),
            0x08 => Some(Self::DivideByZero),
            0x09 => Some(Self::DuplicateRequest),
            _ => None,
        }
    }

    /// Returns the fault class for this fault code.
    #[must_use]
    pub const fn class(self) -> FaultClass {
        match self {
            Self::UnknownInstruction => FaultClass::Decode,
            Self::AddressOutOfRange | Self::FetchOutOfImage => FaultClass::Memory,
            Self::ReservedRegisterWrite | Self::InvalidRegister => FaultClass::Register,
            Self::UnknownRequest | Self::UnknownHandler | Self::DuplicateRequest => {
                FaultClass::Protocol
            }
            Self::DivideByZero => FaultClass::Arithmetic,
        }
    }
}

/// A fault latched by the core, with the program counter it was raised at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[error("{code} (pc={pc})")]
pub struct Fault {
    /// Canonical fault code.
    pub code: FaultCode,
    /// Program counter active when the fault was observed.
    pub pc: u64,
}

impl Fault {
    /// Creates a fault raised at `pc`.
    #[must_use]
    pub const fn new(code: FaultCode, pc: u64) -> Self {
        Self { code, pc }
    }
}
