use crate::encoding::OpcodeEncoding;
use crate::execute::alu::AluOp;

/// Cycles a `NOOP` occupies.
pub const NOOP_CYCLES: u32 = 1;

/// Default cycle counts for each ALU operation.
pub const DEFAULT_LATENCY_TABLE: &[(AluOp, u32)] = &[
    (AluOp::Add, 1),
    (AluOp::Sub, 1),
    (AluOp::Mul, 2),
    (AluOp::Div, 6),
    (AluOp::Mod, 6),
    (AluOp::And, 1),
    (AluOp::Or, 1),
    (AluOp::Xor, 1),
    (AluOp::Not, 1),
];

/// Looks up the default latency for an ALU operation.
#[must_use]
pub fn default_latency(kind: AluOp) -> Option<u32> {
    DEFAULT_LATENCY_TABLE
        .iter()
        .find_map(|(entry_op, cycles)| (*entry_op == kind).then_some(*cycles))
}

/// Per-operation latency configuration, in cycles.
///
/// An operation of latency `L` occupies the core for `L` ticks including its
/// issue tick. Zero behaves like one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(missing_docs)]
pub struct LatencyTable {
    pub add: u32,
    pub sub: u32,
    pub mul: u32,
    pub div: u32,
    pub modulo: u32,
    pub and: u32,
    pub or: u32,
    pub xor: u32,
    pub not: u32,
}

impl Default for LatencyTable {
    fn default() -> Self {
        Self {
            add: 1,
            sub: 1,
            mul: 2,
            div: 6,
            modulo: 6,
            and: 1,
            or: 1,
            xor: 1,
            not: 1,
        }
    }
}

impl LatencyTable {
    /// Returns the configured latency for an operation.
    #[must_use]
    pub const fn get(&self, kind: AluOp) -> u32 {
        match kind {
            AluOp::Add => self.add,
            AluOp::Sub => self.sub,
            AluOp::Mul => self.mul,
            AluOp::Div => self.div,
            AluOp::Mod => self.modulo,
            AluOp::And => self.and,
            AluOp::Or => self.or,
            AluOp::Xor => self.xor,
            AluOp::Not => self.not,
        }
    }

    /// Overrides the latency for one operation.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn with(mut self, kind: AluOp, cycles: u32) -> Self {
        match kind {
            AluOp::Add => self.add = cycles,
            AluOp::Sub => self.sub = cycles,
            AluOp::Mul => self.mul = cycles,
            AluOp::Div => self.div = cycles,
            AluOp::Mod => self.modulo = cycles,
            AluOp::And => self.and = cycles,
            AluOp::Or => self.or = cycles,
            AluOp::Xor => self.xor = cycles,
            AluOp::Not => self.not = cycles,
        }
        self
    }

    /// Cycles an instruction occupies the core before the next fetch.
    ///
    /// Loads, stores, jumps and custom instructions carry no ALU latency;
    /// their stalls come from memory or handler busy-gating instead.
    #[must_use]
    pub const fn cycles_for(&self, encoding: OpcodeEncoding) -> u32 {
        if matches!(encoding, OpcodeEncoding::Noop) {
            return NOOP_CYCLES;
        }
        match AluOp::from_encoding(encoding) {
            Some(kind) => self.get(kind),
            None => 0,
        }
    }
}
