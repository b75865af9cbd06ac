//! Fetch-execute state machine for the Juno core.
//!
//! Every tick follows the same sequence:
//! 1. Terminal states (halted, faulted) short-circuit.
//! 2. Custom handlers are polled for busy state, in registration order.
//! 3. A running multi-cycle operation consumes the tick.
//! 4. Outstanding memory requests, then busy handlers, stall the fetch.
//! 5. Otherwise one instruction is fetched, decoded, executed and committed.
//!
//! Faults are precise: the failing instruction commits nothing, the fault is
//! latched with its PC, and every later tick reports the same fault.

use std::fmt;

use log::{debug, info, log_enabled, trace, warn, Level};

/// Arithmetic and bitwise operations.
pub mod alu;
/// Conditional jumps.
pub mod jump;

use self::alu::{evaluate, AluOp};
use self::jump::{next_pc, JumpCondition, INSTRUCTION_BYTES};
use crate::api::{Completion, CoreConfig, TickOutcome, TraceEvent, TraceSink};
use crate::custom::{HandlerMemoryOp, HandlerRegistry, RegisterWrite};
use crate::decoder::{DecodedInstruction, Decoder};
use crate::disasm::disassemble;
use crate::encoding::{OpcodeClass, OpcodeEncoding};
use crate::fault::{Fault, FaultCode};
use crate::lsu::{loaded_value, LoadStoreUnit};
use crate::memory::{register_address, MemoryInterface, RequestId, RequestKind};
use crate::program::ProgramImage;
use crate::state::{RegisterFile, RunState, StallReason, MIN_REGISTER_COUNT};

/// Side effects of one instruction, computed before anything is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecuteState {
    /// Program counter after the instruction.
    pub next_pc: u64,
    /// Cycles the instruction occupies, issue tick included.
    pub cycles: u32,
    /// Register update to apply at commit.
    pub register_write: Option<RegisterWrite>,
    /// Memory request sent by the instruction.
    pub memory_request: Option<(RequestId, RequestKind, u64)>,
    /// True for `HALT`.
    pub halted: bool,
}

impl ExecuteState {
    const fn fall_through(pc: u64, cycles: u32) -> Self {
        Self {
            next_pc: pc.wrapping_add(INSTRUCTION_BYTES),
            cycles,
            register_write: None,
            memory_request: None,
            halted: false,
        }
    }
}

/// The Juno CPU core.
pub struct JunoCore {
    config: CoreConfig,
    image: ProgramImage,
    registers: RegisterFile,
    lsu: LoadStoreUnit,
    handlers: HandlerRegistry,
    latency_remaining: u32,
    run_state: RunState,
    ticks: u64,
    retired: u64,
    trace: Option<Box<dyn TraceSink>>,
}

impl fmt::Debug for JunoCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JunoCore")
            .field("config", &self.config)
            .field("registers", &self.registers)
            .field("lsu", &self.lsu)
            .field("handlers", &self.handlers)
            .field("latency_remaining", &self.latency_remaining)
            .field("run_state", &self.run_state)
            .field("ticks", &self.ticks)
            .field("retired", &self.retired)
            .finish_non_exhaustive()
    }
}

impl JunoCore {
    /// Creates a core positioned at the program's first instruction.
    #[must_use]
    pub fn new(image: ProgramImage, config: CoreConfig, handlers: HandlerRegistry) -> Self {
        if config.register_count < MIN_REGISTER_COUNT {
            warn!(
                "register_count {} raised to {MIN_REGISTER_COUNT}",
                config.register_count
            );
        }
        let mut registers = RegisterFile::new(config.register_count, image.dynamic_data_base());
        registers.set_pc(image.entry_pc());
        info!(
            "core ready: {} registers, entry pc {}, data base {}, {} custom handler(s)",
            registers.len(),
            image.entry_pc(),
            image.dynamic_data_base(),
            handlers.len()
        );
        Self {
            lsu: LoadStoreUnit::new(config.max_address),
            config,
            image,
            registers,
            handlers,
            latency_remaining: 0,
            run_state: RunState::Running,
            ticks: 0,
            retired: 0,
            trace: None,
        }
    }

    /// Attaches a trace sink; events flow only when tracing is enabled.
    pub fn set_trace_sink(&mut self, sink: Box<dyn TraceSink>) {
        self.trace = Some(sink);
    }

    /// Detaches and returns the trace sink.
    pub fn take_trace_sink(&mut self) -> Option<Box<dyn TraceSink>> {
        self.trace.take()
    }

    /// Configuration in effect.
    #[must_use]
    pub const fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Loaded program.
    #[must_use]
    pub const fn image(&self) -> &ProgramImage {
        &self.image
    }

    /// Register file.
    #[must_use]
    pub const fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    /// Mutable register file, for hosts presetting registers before a run.
    pub const fn registers_mut(&mut self) -> &mut RegisterFile {
        &mut self.registers
    }

    /// Current program counter.
    #[must_use]
    pub const fn pc(&self) -> u64 {
        self.registers.pc()
    }

    /// Current run state.
    #[must_use]
    pub const fn run_state(&self) -> RunState {
        self.run_state
    }

    /// True once `HALT` has executed.
    #[must_use]
    pub const fn is_halted(&self) -> bool {
        matches!(self.run_state, RunState::Halted)
    }

    /// Latched fault, if any.
    #[must_use]
    pub const fn latched_fault(&self) -> Option<Fault> {
        self.run_state.latched_fault()
    }

    /// Load/store unit.
    #[must_use]
    pub const fn lsu(&self) -> &LoadStoreUnit {
        &self.lsu
    }

    /// Custom handler registry.
    #[must_use]
    pub const fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    /// Ticks remaining on the current multi-cycle operation.
    #[must_use]
    pub const fn latency_remaining(&self) -> u32 {
        self.latency_remaining
    }

    /// Ticks advanced while running.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Instructions executed, `HALT` included.
    #[must_use]
    pub const fn retired(&self) -> u64 {
        self.retired
    }

    /// Advances the core by one tick.
    ///
    /// # Errors
    ///
    /// Returns the latched [`Fault`] on the tick it is raised and on every
    /// later tick.
    pub fn advance(&mut self, memory: &mut dyn MemoryInterface) -> Result<TickOutcome, Fault> {
        match self.run_state {
            RunState::Halted => return Ok(TickOutcome::Halted),
            RunState::Faulted(fault) => return Err(fault),
            RunState::Running => {}
        }
        self.ticks += 1;

        let busy_handler = self.handlers.poll_busy();

        if self.latency_remaining > 0 {
            self.latency_remaining -= 1;
            trace!(
                "tick {}: latency stall, {} left",
                self.ticks,
                self.latency_remaining
            );
            return Ok(TickOutcome::Stalled(StallReason::Latency));
        }
        if self.lsu.has_pending() {
            trace!(
                "tick {}: memory stall, {} pending",
                self.ticks,
                self.lsu.pending_count()
            );
            return Ok(TickOutcome::Stalled(StallReason::Memory));
        }
        if let Some(id) = busy_handler {
            trace!("tick {}: {id} busy", self.ticks);
            return Ok(TickOutcome::Stalled(StallReason::Handler));
        }

        let pc = self.registers.pc();
        match self.issue(pc, memory) {
            Ok(outcome) => Ok(outcome),
            Err(code) => Err(self.latch(code, pc)),
        }
    }

    /// Delivers an asynchronous completion.
    ///
    /// # Errors
    ///
    /// Latches and returns a fault for an unknown request id, an unknown or
    /// idle handler, or an illegal register write; returns the already
    /// latched fault if the core is faulted.
    pub fn on_completion(&mut self, completion: Completion) -> Result<(), Fault> {
        if let RunState::Faulted(fault) = self.run_state {
            return Err(fault);
        }
        let result = match completion {
            Completion::Memory { id, data } => self.complete_memory(id, &data),
            Completion::Handler { handler, response } => self
                .handlers
                .deliver(handler, response)
                .and_then(|write| write.map_or(Ok(()), |write| self.write_register(write))),
        };
        let pc = self.registers.pc();
        result.map_err(|code| self.latch(code, pc))
    }

    fn complete_memory(&mut self, id: RequestId, data: &[u8]) -> Result<(), FaultCode> {
        let dest = self.lsu.complete(id)?;
        self.emit(TraceEvent::MemoryCompleted { id });
        match dest {
            Some(register) => self.write_register(RegisterWrite {
                register,
                value: loaded_value(data),
            }),
            None => {
                trace!("store {id} acknowledged");
                Ok(())
            }
        }
    }

    fn write_register(&mut self, write: RegisterWrite) -> Result<(), FaultCode> {
        self.registers.write(write.register, write.value)?;
        trace!("r{} <- {}", write.register, write.value);
        self.emit(TraceEvent::RegisterWrite {
            register: write.register,
            value: write.value,
        });
        Ok(())
    }

    fn latch(&mut self, code: FaultCode, pc: u64) -> Fault {
        let fault = Fault::new(code, pc);
        warn!("fault latched: {fault}");
        self.run_state = RunState::Faulted(fault);
        self.emit(TraceEvent::FaultRaised { fault });
        fault
    }

    fn emit(&mut self, event: TraceEvent) {
        if !self.config.tracing_enabled {
            return;
        }
        if let Some(sink) = self.trace.as_mut() {
            sink.on_event(event);
        }
    }

    fn issue(
        &mut self,
        pc: u64,
        memory: &mut dyn MemoryInterface,
    ) -> Result<TickOutcome, FaultCode> {
        let word = self.image.fetch(pc, self.config.max_address)?;
        let instruction = Decoder::decode(word);
        if log_enabled!(Level::Debug) {
            debug!("{pc:>8}: {}", disassemble(word));
        }
        self.emit(TraceEvent::InstructionIssued { pc, word });

        let exec = self.execute_instruction(&instruction, pc, memory)?;
        self.commit(&exec)?;
        self.retired += 1;

        if exec.halted {
            self.run_state = RunState::Halted;
            self.emit(TraceEvent::Halted { pc });
            info!(
                "halted at pc {pc} after {} instructions, {} ticks",
                self.retired, self.ticks
            );
            debug!("registers: {:?}", self.registers.dump());
            return Ok(TickOutcome::Halted);
        }
        Ok(TickOutcome::Issued {
            pc,
            opcode: instruction.opcode,
        })
    }

    fn commit(&mut self, exec: &ExecuteState) -> Result<(), FaultCode> {
        if let Some((id, kind, address)) = exec.memory_request {
            self.emit(TraceEvent::MemoryIssued { id, kind, address });
        }
        if let Some(write) = exec.register_write {
            self.write_register(write)?;
        }
        if !exec.halted {
            self.registers.set_pc(exec.next_pc);
        }
        self.latency_remaining = exec.cycles.saturating_sub(1);
        Ok(())
    }

    fn execute_instruction(
        &mut self,
        instruction: &DecodedInstruction,
        pc: u64,
        memory: &mut dyn MemoryInterface,
    ) -> Result<ExecuteState, FaultCode> {
        let Some(encoding) = instruction.encoding() else {
            return self.execute_custom(instruction, pc, memory);
        };

        match encoding.class() {
            OpcodeClass::Control => Ok(ExecuteState {
                halted: encoding == OpcodeEncoding::Halt,
                ..ExecuteState::fall_through(pc, self.config.latencies.cycles_for(encoding))
            }),
            OpcodeClass::Arithmetic | OpcodeClass::Bitwise => {
                self.execute_alu(instruction, encoding, pc)
            }
            OpcodeClass::Jump => self.execute_jump(instruction, encoding, pc),
            OpcodeClass::Load => self.execute_load(instruction, encoding, pc, memory),
            OpcodeClass::Store => self.execute_store(instruction, encoding, pc, memory),
        }
    }

    fn execute_custom(
        &mut self,
        instruction: &DecodedInstruction,
        pc: u64,
        memory: &mut dyn MemoryInterface,
    ) -> Result<ExecuteState, FaultCode> {
        let outcome = self
            .handlers
            .dispatch(instruction, pc, &self.registers, &self.lsu)?;
        if let Some(write) = outcome.register_write {
            self.registers.check_writable(write.register)?;
        }
        let memory_request = match outcome.memory {
            None => None,
            Some(HandlerMemoryOp::Load { address, dest }) => {
                self.registers.check_writable(dest)?;
                let id = self.lsu.issue_load(memory, address, dest)?;
                Some((id, RequestKind::Read, address))
            }
            Some(HandlerMemoryOp::Store { address, src }) => {
                let id = self
                    .lsu
                    .issue_store(memory, &self.registers, address, src)?;
                Some((id, RequestKind::Write, address))
            }
        };
        Ok(ExecuteState {
            next_pc: outcome.next_pc,
            register_write: outcome.register_write,
            memory_request,
            ..ExecuteState::fall_through(pc, 0)
        })
    }

    fn execute_alu(
        &self,
        instruction: &DecodedInstruction,
        encoding: OpcodeEncoding,
        pc: u64,
    ) -> Result<ExecuteState, FaultCode> {
        let op = AluOp::from_encoding(encoding).ok_or(FaultCode::UnknownInstruction)?;
        let lhs = self.registers.read(instruction.reg1)?;
        let rhs = if op.is_unary() {
            0
        } else {
            self.registers.read(instruction.reg2)?
        };
        let value = evaluate(op, lhs, rhs)?;
        self.registers.check_writable(instruction.write_reg)?;
        Ok(ExecuteState {
            register_write: Some(RegisterWrite {
                register: instruction.write_reg,
                value,
            }),
            ..ExecuteState::fall_through(pc, self.config.latencies.cycles_for(encoding))
        })
    }

    fn execute_jump(
        &self,
        instruction: &DecodedInstruction,
        encoding: OpcodeEncoding,
        pc: u64,
    ) -> Result<ExecuteState, FaultCode> {
        let condition =
            JumpCondition::from_encoding(encoding).ok_or(FaultCode::UnknownInstruction)?;
        let value = self.registers.read(instruction.reg1)?;
        Ok(ExecuteState {
            next_pc: next_pc(condition, pc, value, instruction.jump_offset),
            ..ExecuteState::fall_through(pc, 0)
        })
    }

    fn execute_load(
        &mut self,
        instruction: &DecodedInstruction,
        encoding: OpcodeEncoding,
        pc: u64,
        memory: &mut dyn MemoryInterface,
    ) -> Result<ExecuteState, FaultCode> {
        let address = if encoding == OpcodeEncoding::Lda {
            u64::from(instruction.abs_addr)
        } else {
            register_address(self.registers.read(instruction.reg1)?)
        };
        self.registers.check_writable(instruction.write_reg)?;
        let id = self
            .lsu
            .issue_load(memory, address, instruction.write_reg)?;
        Ok(ExecuteState {
            memory_request: Some((id, RequestKind::Read, address)),
            ..ExecuteState::fall_through(pc, 0)
        })
    }

    fn execute_store(
        &mut self,
        instruction: &DecodedInstruction,
        encoding: OpcodeEncoding,
        pc: u64,
        memory: &mut dyn MemoryInterface,
    ) -> Result<ExecuteState, FaultCode> {
        let (value_reg, address) = if encoding == OpcodeEncoding::Sta {
            (instruction.write_reg, u64::from(instruction.abs_addr))
        } else {
            (
                instruction.reg1,
                register_address(self.registers.read(instruction.reg2)?),
            )
        };
        let id = self
            .lsu
            .issue_store(memory, &self.registers, address, value_reg)?;
        Ok(ExecuteState {
            memory_request: Some((id, RequestKind::Write, address)),
            ..ExecuteState::fall_through(pc, 0)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::{ExecuteState, JunoCore};
    use crate::api::{Completion, CoreConfig, TickOutcome, TraceEvent, TraceSink};
    use crate::custom::HandlerRegistry;
    use crate::decoder::{encode_absolute, encode_alu, encode_control, encode_load};
    use crate::encoding::OpcodeEncoding;
    use crate::fault::{Fault, FaultCode};
    use crate::memory::{MemRequest, MemoryInterface, RequestId};
    use crate::program::ProgramImage;
    use crate::state::{RunState, StallReason};

    #[derive(Default)]
    struct QueueMemory {
        sent: Vec<MemRequest>,
    }

    impl MemoryInterface for QueueMemory {
        fn send_request(&mut self, request: MemRequest) -> RequestId {
            self.sent.push(request);
            RequestId(self.sent.len() as u64)
        }
    }

    fn core(literals: &[u8], program: &[u32]) -> JunoCore {
        let image = ProgramImage::from_parts(literals, program).expect("image");
        JunoCore::new(image, CoreConfig::default(), HandlerRegistry::new())
    }

    const HALT: u32 = 0xFF;

    #[test]
    fn new_core_starts_at_first_instruction() {
        let core = core(&[0; 5], &[HALT]);
        assert_eq!(core.pc(), 5);
        assert_eq!(core.registers().read(0), Ok(5));
        assert_eq!(core.registers().read(1), Ok(16));
        assert_eq!(core.run_state(), RunState::Running);
    }

    #[test]
    fn undersized_register_count_is_raised_to_the_aliases() {
        let image = ProgramImage::from_parts(&[], &[HALT]).expect("image");
        let config = CoreConfig {
            register_count: 0,
            ..CoreConfig::default()
        };
        let core = JunoCore::new(image, config, HandlerRegistry::new());
        assert_eq!(core.registers().len(), 2);
        assert_eq!(core.registers().read(2), Err(FaultCode::InvalidRegister));
    }

    #[test]
    fn halt_is_terminal_and_keeps_pc() {
        let mut core = core(&[], &[HALT]);
        let mut memory = QueueMemory::default();
        assert_eq!(core.advance(&mut memory), Ok(TickOutcome::Halted));
        assert_eq!(core.pc(), 0);
        assert_eq!(core.advance(&mut memory), Ok(TickOutcome::Halted));
        assert_eq!(core.retired(), 1);
        assert_eq!(core.ticks(), 1);
    }

    #[test]
    fn noop_occupies_a_single_cycle() {
        let mut core = core(&[], &[encode_control(0), HALT]);
        let mut memory = QueueMemory::default();
        assert_eq!(
            core.advance(&mut memory),
            Ok(TickOutcome::Issued { pc: 0, opcode: 0 })
        );
        assert_eq!(core.advance(&mut memory), Ok(TickOutcome::Halted));
    }

    #[test]
    fn load_stalls_fetch_until_completion() {
        let mut core = core(&[], &[encode_load(2, 3), HALT]);
        let mut memory = QueueMemory::default();
        core.registers_mut().write(2, 64).expect("address register");

        assert!(matches!(core.advance(&mut memory), Ok(TickOutcome::Issued { .. })));
        assert_eq!(memory.sent, vec![MemRequest::read(64, 8)]);
        assert_eq!(
            core.advance(&mut memory),
            Ok(TickOutcome::Stalled(StallReason::Memory))
        );

        core.on_completion(Completion::Memory {
            id: RequestId(1),
            data: 77i64.to_le_bytes().to_vec(),
        })
        .expect("known request");
        assert_eq!(core.registers().read(3), Ok(77));
        assert_eq!(core.advance(&mut memory), Ok(TickOutcome::Halted));
    }

    #[test]
    fn unknown_completion_latches_fault() {
        let mut core = core(&[], &[HALT]);
        let fault = core
            .on_completion(Completion::Memory {
                id: RequestId(9),
                data: Vec::new(),
            })
            .expect_err("unknown id");
        assert_eq!(fault, Fault::new(FaultCode::UnknownRequest, 0));
        let mut memory = QueueMemory::default();
        assert_eq!(core.advance(&mut memory), Err(fault));
    }

    #[test]
    fn faulting_instruction_commits_nothing() {
        let add_to_r1 = encode_alu(OpcodeEncoding::Add.opcode(), 2, 3, 1);
        let mut core = core(&[], &[add_to_r1, HALT]);
        let mut memory = QueueMemory::default();

        let fault = core.advance(&mut memory).expect_err("reserved write");
        assert_eq!(fault.code, FaultCode::ReservedRegisterWrite);
        assert_eq!(fault.pc, 0);
        assert_eq!(core.pc(), 0);
        assert_eq!(core.retired(), 0);
        assert_eq!(core.latched_fault(), Some(fault));
    }

    #[test]
    fn lda_with_out_of_range_address_sends_nothing() {
        let image = ProgramImage::from_parts(&[], &[encode_absolute(2, 500, 2)]).expect("image");
        let config = CoreConfig {
            max_address: 256,
            ..CoreConfig::default()
        };
        let mut core = JunoCore::new(image, config, HandlerRegistry::new());
        let mut memory = QueueMemory::default();
        assert_eq!(
            core.advance(&mut memory).map_err(|fault| fault.code),
            Err(FaultCode::AddressOutOfRange)
        );
        assert!(memory.sent.is_empty());
    }

    #[derive(Clone, Default)]
    struct SharedSink(Rc<RefCell<Vec<TraceEvent>>>);

    impl TraceSink for SharedSink {
        fn on_event(&mut self, event: TraceEvent) {
            self.0.borrow_mut().push(event);
        }
    }

    #[test]
    fn trace_events_follow_execution_when_enabled() {
        let add = encode_alu(OpcodeEncoding::Add.opcode(), 2, 3, 4);
        let image = ProgramImage::from_parts(&[], &[add, HALT]).expect("image");
        let config = CoreConfig {
            tracing_enabled: true,
            ..CoreConfig::default()
        };
        let mut core = JunoCore::new(image, config, HandlerRegistry::new());
        let sink = SharedSink::default();
        core.set_trace_sink(Box::new(sink.clone()));
        let mut memory = QueueMemory::default();
        core.advance(&mut memory).expect("add");
        core.advance(&mut memory).expect("halt");

        assert_eq!(
            *sink.0.borrow(),
            vec![
                TraceEvent::InstructionIssued { pc: 0, word: add },
                TraceEvent::RegisterWrite {
                    register: 4,
                    value: 0
                },
                TraceEvent::InstructionIssued { pc: 4, word: HALT },
                TraceEvent::Halted { pc: 4 },
            ]
        );
    }

    #[test]
    fn disabled_tracing_emits_nothing() {
        let mut core = core(&[], &[HALT]);
        let sink = SharedSink::default();
        core.set_trace_sink(Box::new(sink.clone()));
        core.advance(&mut QueueMemory::default()).expect("halt");
        assert!(sink.0.borrow().is_empty());
    }

    #[test]
    fn fall_through_advances_one_word() {
        let exec = ExecuteState::fall_through(40, 2);
        assert_eq!(exec.next_pc, 44);
        assert_eq!(exec.cycles, 2);
        assert!(!exec.halted);
    }
}
