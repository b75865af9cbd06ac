//! Custom instruction extension mechanism.
//!
//! Opcodes outside the fixed table are offered to registered handlers in
//! registration order; the first one whose [`CustomInstructionHandler::can_claim`]
//! accepts the opcode executes it. Any busy handler stalls the whole core.
//!
//! Handlers never mutate core state. They see the register file and the
//! load/store unit read-only and describe their effects in a
//! [`HandlerOutcome`], which the core validates, issues and commits.

use std::fmt;

use log::debug;
use thiserror::Error;

use crate::decoder::DecodedInstruction;
use crate::execute::jump::INSTRUCTION_BYTES;
use crate::fault::FaultCode;
use crate::lsu::LoadStoreUnit;
use crate::state::RegisterFile;

/// External random-number accelerator and its forwarding handler.
pub mod accel;
/// Built-in seeded `RAND`/`RSEED` handler.
pub mod rand;

pub use self::accel::{
    AcceleratorLink, AcceleratorRequest, ExternalRandHandler, RandAccelerator,
    DEFAULT_GENERATION_TICKS,
};
pub use self::rand::{
    RandInstructionHandler, DEFAULT_RAND_SEED, RAND_BUSY_CYCLES, RAND_OPCODE, RSEED_BUSY_CYCLES,
    RSEED_OPCODE,
};

/// Position of a handler in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct HandlerId(pub usize);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler {}", self.0)
    }
}

/// Asynchronous result delivered to a handler through the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum HandlerResponse {
    /// A value for the register the handler is waiting to fill.
    Value(i64),
}

/// Register update a handler asks the core to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RegisterWrite {
    /// Destination register index.
    pub register: u8,
    /// Value to write.
    pub value: i64,
}

/// Failure reported by a handler's `execute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum HandlerError {
    /// Handler-defined non-zero status; treated as an unknown instruction.
    #[error("handler returned status {0}")]
    Status(u32),
    /// Architectural fault raised while executing, e.g. a reserved-register write.
    #[error(transparent)]
    Fault(#[from] FaultCode),
}

impl HandlerError {
    /// Maps the failure onto the core's fault taxonomy.
    #[must_use]
    pub const fn fault_code(self) -> FaultCode {
        match self {
            Self::Status(_) => FaultCode::UnknownInstruction,
            Self::Fault(code) => code,
        }
    }
}

/// Memory access a handler asks the core to issue on its load/store unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum HandlerMemoryOp {
    /// 8-byte read whose data lands in `dest` on completion.
    Load {
        /// Byte address.
        address: u64,
        /// Register awaiting the data.
        dest: u8,
    },
    /// 8-byte little-endian write of register `src`.
    Store {
        /// Byte address.
        address: u64,
        /// Register holding the value.
        src: u8,
    },
}

/// Effects of one custom instruction, applied by the core only if every
/// part of it is legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct HandlerOutcome {
    /// Program counter after the instruction.
    pub next_pc: u64,
    /// Register update to commit.
    pub register_write: Option<RegisterWrite>,
    /// Memory access to issue.
    pub memory: Option<HandlerMemoryOp>,
}

impl HandlerOutcome {
    /// Continues at `next_pc` with no other effect.
    #[must_use]
    pub const fn jump_to(next_pc: u64) -> Self {
        Self {
            next_pc,
            register_write: None,
            memory: None,
        }
    }

    /// Continues at the instruction after `pc`.
    #[must_use]
    pub const fn fall_through(pc: u64) -> Self {
        Self::jump_to(pc.wrapping_add(INSTRUCTION_BYTES))
    }

    /// Adds a register write.
    #[must_use]
    pub const fn with_write(self, register: u8, value: i64) -> Self {
        Self {
            register_write: Some(RegisterWrite { register, value }),
            ..self
        }
    }

    /// Adds a load into `dest`.
    #[must_use]
    pub const fn with_load(self, address: u64, dest: u8) -> Self {
        Self {
            memory: Some(HandlerMemoryOp::Load { address, dest }),
            ..self
        }
    }

    /// Adds a store of register `src`.
    #[must_use]
    pub const fn with_store(self, address: u64, src: u8) -> Self {
        Self {
            memory: Some(HandlerMemoryOp::Store { address, src }),
            ..self
        }
    }
}

/// Read-only view of the core a handler executes against.
#[derive(Debug, Clone, Copy)]
pub struct HandlerContext<'a> {
    /// Registry position of the executing handler.
    pub handler: HandlerId,
    /// Address of the instruction being executed.
    pub pc: u64,
    /// Register file.
    pub registers: &'a RegisterFile,
    /// Load/store unit, for inspecting outstanding requests.
    pub lsu: &'a LoadStoreUnit,
}

/// A pluggable unit that implements otherwise-unassigned opcodes.
pub trait CustomInstructionHandler {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// True if this handler implements `opcode`.
    fn can_claim(&self, opcode: u8) -> bool;

    /// Executes a claimed instruction and describes its effects.
    ///
    /// # Errors
    ///
    /// Any [`HandlerError`] is fatal to the program.
    fn execute(
        &mut self,
        instruction: &DecodedInstruction,
        context: &HandlerContext<'_>,
    ) -> Result<HandlerOutcome, HandlerError>;

    /// Polled once per tick; true while the handler has outstanding work.
    ///
    /// Polling may advance internal countdowns.
    fn is_busy(&mut self) -> bool;

    /// Accepts an asynchronous response and returns the register write it implies.
    ///
    /// # Errors
    ///
    /// The default rejects every response with [`FaultCode::UnknownHandler`],
    /// which is right for handlers that never wait on anything.
    fn on_response(
        &mut self,
        response: HandlerResponse,
    ) -> Result<Option<RegisterWrite>, FaultCode> {
        let _ = response;
        Err(FaultCode::UnknownHandler)
    }
}

/// Ordered list of custom instruction handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: Vec<Box<dyn CustomInstructionHandler>>,
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.handlers.iter().map(|handler| handler.name()))
            .finish()
    }
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handler; earlier registrations win opcode conflicts.
    pub fn register(&mut self, handler: Box<dyn CustomInstructionHandler>) -> HandlerId {
        let id = HandlerId(self.handlers.len());
        debug!("registered {id}: {}", handler.name());
        self.handlers.push(handler);
        id
    }

    /// Builder form of [`HandlerRegistry::register`].
    #[must_use]
    pub fn with(mut self, handler: Box<dyn CustomInstructionHandler>) -> Self {
        self.register(handler);
        self
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// True when no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Polls handlers in order and returns the first busy one.
    ///
    /// Handlers after the first busy one are not polled this round.
    pub fn poll_busy(&mut self) -> Option<HandlerId> {
        self.handlers
            .iter_mut()
            .position(|handler| handler.is_busy())
            .map(HandlerId)
    }

    /// Returns the first handler that claims `opcode`.
    #[must_use]
    pub fn claim(&self, opcode: u8) -> Option<HandlerId> {
        self.handlers
            .iter()
            .position(|handler| handler.can_claim(opcode))
            .map(HandlerId)
    }

    /// Executes a custom instruction on the first claiming handler.
    ///
    /// # Errors
    ///
    /// Returns [`FaultCode::UnknownInstruction`] when no handler claims the
    /// opcode or the handler reports a non-zero status, and passes through
    /// any fault the handler raises.
    pub fn dispatch(
        &mut self,
        instruction: &DecodedInstruction,
        pc: u64,
        registers: &RegisterFile,
        lsu: &LoadStoreUnit,
    ) -> Result<HandlerOutcome, FaultCode> {
        let id = self
            .claim(instruction.opcode)
            .ok_or(FaultCode::UnknownInstruction)?;
        let handler = &mut self.handlers[id.0];
        debug!("{id} ({}) executes opcode {}", handler.name(), instruction.opcode);
        let context = HandlerContext {
            handler: id,
            pc,
            registers,
            lsu,
        };
        handler.execute(instruction, &context).map_err(|err| {
            debug!("{id} rejected opcode {}: {err}", instruction.opcode);
            err.fault_code()
        })
    }

    /// Routes an asynchronous response to the handler it names.
    ///
    /// # Errors
    ///
    /// Returns [`FaultCode::UnknownHandler`] when `id` is not registered, and
    /// whatever the handler returns otherwise.
    pub fn deliver(
        &mut self,
        id: HandlerId,
        response: HandlerResponse,
    ) -> Result<Option<RegisterWrite>, FaultCode> {
        self.handlers
            .get_mut(id.0)
            .ok_or(FaultCode::UnknownHandler)?
            .on_response(response)
    }
}
