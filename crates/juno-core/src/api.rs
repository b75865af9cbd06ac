//! Public host-facing API contracts for embedding the Juno core.
//!
//! The host owns the clock: it calls [`crate::JunoCore::advance`] once per
//! tick and hands asynchronous results back through
//! [`crate::JunoCore::on_completion`].

use crate::custom::{HandlerId, HandlerResponse};
use crate::fault::Fault;
use crate::memory::{RequestId, RequestKind};
use crate::state::{StallReason, DEFAULT_REGISTER_COUNT};
use crate::timing::LatencyTable;

/// Default exclusive upper bound on load, store and fetch addresses.
pub const DEFAULT_MAX_ADDRESS: u64 = u64::MAX;

/// Top-level immutable configuration for a core instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CoreConfig {
    /// Number of register slots, aliases included. Values below
    /// [`crate::MIN_REGISTER_COUNT`] are raised to it.
    pub register_count: usize,
    /// Addresses at or above this bound are faults.
    pub max_address: u64,
    /// Per-operation ALU latencies.
    pub latencies: LatencyTable,
    /// Enables trace callback dispatch.
    pub tracing_enabled: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            register_count: DEFAULT_REGISTER_COUNT,
            max_address: DEFAULT_MAX_ADDRESS,
            latencies: LatencyTable::default(),
            tracing_enabled: false,
        }
    }
}

/// What the core did on one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum TickOutcome {
    /// An instruction was fetched and executed.
    Issued {
        /// Address of the instruction.
        pc: u64,
        /// Its opcode byte.
        opcode: u8,
    },
    /// No instruction was fetched.
    Stalled(StallReason),
    /// The core is halted.
    Halted,
}

/// Asynchronous result delivered to the core by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Completion {
    /// A memory request finished; `data` holds read bytes, empty for writes.
    Memory {
        /// Identifier returned by the memory when the request was sent.
        id: RequestId,
        /// Read payload.
        data: Vec<u8>,
    },
    /// A custom instruction handler's asynchronous work finished.
    Handler {
        /// Handler the response is addressed to.
        handler: HandlerId,
        /// Response payload.
        response: HandlerResponse,
    },
}

/// Something the host clocks alongside the core that produces completions.
pub trait CompletionSource {
    /// Advances one tick and returns completions now due.
    fn tick(&mut self) -> Vec<Completion>;
}

/// Run loop boundary modes for host-facing batched execution.
///
/// Every mode also stops on a halt or a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunBoundary {
    /// Stop after exactly one tick.
    Tick,
    /// Stop after the next tick that issues an instruction.
    Instruction,
    /// Stop once the core halts.
    Halted,
}

/// Aggregated outcome from running until a selected boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunOutcome {
    /// Ticks driven during this run call.
    pub ticks: u64,
    /// Last tick-level status observed before returning.
    pub final_tick: Result<TickOutcome, Fault>,
}

/// Trace events emitted in execution order when tracing is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum TraceEvent {
    /// An instruction was fetched and is about to execute.
    InstructionIssued {
        /// Fetch address.
        pc: u64,
        /// Raw instruction word.
        word: u32,
    },
    /// The load/store unit sent a memory request.
    MemoryIssued {
        /// Request identifier.
        id: RequestId,
        /// Read or write.
        kind: RequestKind,
        /// Target address.
        address: u64,
    },
    /// A memory request was retired.
    MemoryCompleted {
        /// Request identifier.
        id: RequestId,
    },
    /// A general-purpose register changed.
    RegisterWrite {
        /// Register index.
        register: u8,
        /// New value.
        value: i64,
    },
    /// `HALT` executed.
    Halted {
        /// Address of the `HALT` instruction.
        pc: u64,
    },
    /// A fault was latched.
    FaultRaised {
        /// The fault.
        fault: Fault,
    },
}

/// Sink trait for deterministic trace hooks.
pub trait TraceSink {
    /// Records an event in execution order.
    fn on_event(&mut self, event: TraceEvent);
}

impl TraceSink for Vec<TraceEvent> {
    fn on_event(&mut self, event: TraceEvent) {
        self.push(event);
    }
}
