use crate::fault::Fault;

/// Reason the core declined to fetch on a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum StallReason {
    /// A multi-cycle ALU operation is still occupying the core.
    Latency,
    /// At least one memory request is awaiting completion.
    Memory,
    /// A custom instruction handler reported busy.
    Handler,
}

/// Host-observable execution state of the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum RunState {
    /// Fetching and executing instructions.
    #[default]
    Running,
    /// `HALT` executed; terminal.
    Halted,
    /// A fatal fault is latched; terminal.
    Faulted(Fault),
}

impl RunState {
    /// Returns the latched fault, if any.
    #[must_use]
    pub const fn latched_fault(self) -> Option<Fault> {
        match self {
            Self::Faulted(fault) => Some(fault),
            Self::Running | Self::Halted => None,
        }
    }

    /// Returns true once no further instruction can issue.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}
