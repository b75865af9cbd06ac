//! Tick-driven core emulator for the Juno 64-bit teaching CPU.

/// Instruction-stream and literal-pool program image.
pub mod program;
pub use program::{ImageError, ProgramImage, FORMAT_VERSION, HEADER_BYTES, IMAGE_ALIGNMENT};

/// Memory request contract and reference memory.
pub mod memory;
pub use memory::{
    register_address, validate_data_address, FlatMemory, MemRequest, MemoryInterface, RequestId,
    RequestKind, WORD_ACCESS_BYTES,
};

/// Public host-facing API contract and integration types.
pub mod api;
pub use api::{
    Completion, CompletionSource, CoreConfig, RunBoundary, RunOutcome, TickOutcome, TraceEvent,
    TraceSink, DEFAULT_MAX_ADDRESS,
};

/// Architectural CPU state model primitives.
pub mod state;
pub use state::{
    RegisterFile, RunState, StallReason, DATA_BASE_REGISTER, DEFAULT_REGISTER_COUNT,
    MIN_REGISTER_COUNT, PC_REGISTER,
};

/// Opcode table and classification.
pub mod encoding;
pub use encoding::{
    classify_opcode, is_custom_opcode, OpcodeClass, OpcodeEncoding, OperandForm,
    OPCODE_ENCODING_TABLE,
};

/// Instruction word codec.
pub mod decoder;
pub use decoder::{
    encode_absolute, encode_alu, encode_control, encode_jump, encode_load, encode_store,
    encode_unary, DecodedInstruction, Decoder,
};

/// Fault taxonomy.
pub mod fault;
pub use fault::{Fault, FaultClass, FaultCode};

/// Per-operation latency table.
pub mod timing;
pub use timing::{default_latency, LatencyTable, DEFAULT_LATENCY_TABLE, NOOP_CYCLES};

/// Load/store unit.
pub mod lsu;
pub use lsu::{loaded_value, LoadStoreUnit};

/// Custom instruction handlers.
pub mod custom;
pub use custom::{
    AcceleratorLink, CustomInstructionHandler, ExternalRandHandler, HandlerContext, HandlerError,
    HandlerId, HandlerMemoryOp, HandlerOutcome, HandlerRegistry, HandlerResponse,
    RandAccelerator, RandInstructionHandler, RegisterWrite,
};

/// Fetch-execute state machine.
pub mod execute;
pub use execute::alu::AluOp;
pub use execute::jump::JumpCondition;
pub use execute::{ExecuteState, JunoCore};

/// Host run loop.
pub mod run;
pub use run::{run_until, run_with_sources};

/// Instruction disassembly.
pub mod disasm;
pub use disasm::{
    disassemble, disassemble_program, disassemble_row, disassemble_window, DisassemblyRow,
};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
