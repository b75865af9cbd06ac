/// Opcode classes of the fixed instruction table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum OpcodeClass {
    Control,
    Load,
    Store,
    Arithmetic,
    Bitwise,
    Jump,
}

/// Operand layout an opcode uses inside the 32-bit instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandForm {
    /// No operands (`NOOP`, `HALT`).
    None,
    /// Address register in byte 1, destination register in byte 3 (`LOAD`).
    Indirect,
    /// Literal-pool address in bytes 1..=2, register in byte 3 (`LDA`, `STA`).
    Absolute,
    /// Value register in byte 1, address register in byte 2 (`STORE`).
    RegisterPair,
    /// Two source registers and a destination register.
    Binary,
    /// One source register and a destination register (`NOT`).
    Unary,
    /// Condition register in byte 1, signed word offset in bytes 2..=3.
    Jump,
}

/// Opcodes with fixed semantics in the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum OpcodeEncoding {
    Noop,
    Load,
    Lda,
    Store,
    Sta,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Xor,
    Not,
    Jzero,
    Jltz,
    Jgtz,
    Halt,
}

impl OpcodeEncoding {
    /// Returns the opcode byte assigned to this encoding.
    #[must_use]
    pub const fn opcode(self) -> u8 {
        match self {
            Self::Noop => 0,
            Self::Load => 1,
            Self::Lda => 2,
            Self::Store => 8,
            Self::Sta => 9,
            Self::Add => 16,
            Self::Sub => 17,
            Self::Mul => 18,
            Self::Div => 19,
            Self::Mod => 20,
            Self::And => 32,
            Self::Or => 33,
            Self::Xor => 34,
            Self::Not => 35,
            Self::Jzero => 129,
            Self::Jltz => 130,
            Self::Jgtz => 131,
            Self::Halt => 255,
        }
    }

    /// Returns the assembly mnemonic.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Noop => "NOOP",
            Self::Load => "LOAD",
            Self::Lda => "LDA",
            Self::Store => "STORE",
            Self::Sta => "STA",
            Self::Add => "ADD",
            Self::Sub => "SUB",
            Self::Mul => "MUL",
            Self::Div => "DIV",
            Self::Mod => "MOD",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Xor => "XOR",
            Self::Not => "NOT",
            Self::Jzero => "JZERO",
            Self::Jltz => "JLTZ",
            Self::Jgtz => "JGTZ",
            Self::Halt => "HALT",
        }
    }

    /// Returns the opcode class.
    #[must_use]
    pub const fn class(self) -> OpcodeClass {
        match self {
            Self::Noop | Self::Halt => OpcodeClass::Control,
            Self::Load | Self::Lda => OpcodeClass::Load,
            Self::Store | Self::Sta => OpcodeClass::Store,
            Self::Add | Self::Sub | Self::Mul | Self::Div | Self::Mod => OpcodeClass::Arithmetic,
            Self::And | Self::Or | Self::Xor | Self::Not => OpcodeClass::Bitwise,
            Self::Jzero | Self::Jltz | Self::Jgtz => OpcodeClass::Jump,
        }
    }

    /// Returns the operand layout.
    #[must_use]
    pub const fn operand_form(self) -> OperandForm {
        match self {
            Self::Noop | Self::Halt => OperandForm::None,
            Self::Load => OperandForm::Indirect,
            Self::Lda | Self::Sta => OperandForm::Absolute,
            Self::Store => OperandForm::RegisterPair,
            Self::Not => OperandForm::Unary,
            Self::Add
            | Self::Sub
            | Self::Mul
            | Self::Div
            | Self::Mod
            | Self::And
            | Self::Or
            | Self::Xor => OperandForm::Binary,
            Self::Jzero | Self::Jltz | Self::Jgtz => OperandForm::Jump,
        }
    }
}

/// Single source-of-truth opcode table.
///
/// Any opcode byte not present here belongs to the custom handler registry.
pub const OPCODE_ENCODING_TABLE: &[(u8, OpcodeEncoding)] = &[
    (0, OpcodeEncoding::Noop),
    (1, OpcodeEncoding::Load),
    (2, OpcodeEncoding::Lda),
    (8, OpcodeEncoding::Store),
    (9, OpcodeEncoding::Sta),
    (16, OpcodeEncoding::Add),
    (17, OpcodeEncoding::Sub),
    (18, OpcodeEncoding::Mul),
    (19, OpcodeEncoding::Div),
    (20, OpcodeEncoding::Mod),
    (32, OpcodeEncoding::And),
    (33, OpcodeEncoding::Or),
    (34, OpcodeEncoding::Xor),
    (35, OpcodeEncoding::Not),
    (129, OpcodeEncoding::Jzero),
    (130, OpcodeEncoding::Jltz),
    (131, OpcodeEncoding::Jgtz),
    (255, OpcodeEncoding::Halt),
];

/// Returns the fixed encoding for an opcode byte.
///
/// `None` means the opcode is left to custom instruction handlers.
#[must_use]
pub fn classify_opcode(opcode: u8) -> Option<OpcodeEncoding> {
    OPCODE_ENCODING_TABLE
        .iter()
        .find_map(|(entry, encoding)| (*entry == opcode).then_some(*encoding))
}

/// Returns true if no fixed encoding claims `opcode`.
#[must_use]
pub fn is_custom_opcode(opcode: u8) -> bool {
    classify_opcode(opcode).is_none()
}
