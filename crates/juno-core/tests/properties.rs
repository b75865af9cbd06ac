//! Property suites: alias invariants, reserved-register protection, memory
//! ordering and run determinism over generated programs.

#![allow(
    clippy::pedantic,
    clippy::nursery,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    missing_docs
)]

use std::cell::RefCell;
use std::rc::Rc;

use juno_core::{
    encode_alu, encode_control, encode_load, run_until, Completion, CoreConfig, Decoder,
    FaultCode, HandlerRegistry, JunoCore, MemRequest, MemoryInterface, OpcodeEncoding,
    ProgramImage, RandInstructionHandler, RequestId, RunBoundary, StallReason, TickOutcome,
    TraceEvent, TraceSink, FlatMemory,
};
use log as _;
use proptest::prelude::*;
use rand as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

const HALT: u32 = encode_control(OpcodeEncoding::Halt.opcode());

const ALU_OPS: [OpcodeEncoding; 7] = [
    OpcodeEncoding::Add,
    OpcodeEncoding::Sub,
    OpcodeEncoding::Mul,
    OpcodeEncoding::And,
    OpcodeEncoding::Or,
    OpcodeEncoding::Xor,
    OpcodeEncoding::Not,
];

fn alu_word() -> impl Strategy<Value = u32> {
    (0usize..ALU_OPS.len(), 0u8..8, 0u8..8, 2u8..8)
        .prop_map(|(op, r1, r2, rw)| encode_alu(ALU_OPS[op].opcode(), r1, r2, rw))
}

/// Memory that never answers on its own; the test delivers completions.
#[derive(Default)]
struct HeldMemory {
    sent: Vec<MemRequest>,
}

impl MemoryInterface for HeldMemory {
    fn send_request(&mut self, request: MemRequest) -> RequestId {
        self.sent.push(request);
        RequestId(self.sent.len() as u64 - 1)
    }
}

#[derive(Clone, Default)]
struct SharedTrace(Rc<RefCell<Vec<TraceEvent>>>);

impl TraceSink for SharedTrace {
    fn on_event(&mut self, event: TraceEvent) {
        self.0.borrow_mut().push(event);
    }
}

proptest! {
    #[test]
    fn aliases_hold_after_every_tick(
        literals in proptest::collection::vec(any::<u8>(), 0..24),
        body in proptest::collection::vec(alu_word(), 1..24),
    ) {
        let mut program = body;
        program.push(HALT);
        let image = ProgramImage::from_parts(&literals, &program).expect("image");
        let data_base = image.dynamic_data_base();
        let mut memory = FlatMemory::with_image(&image, 64, 1);
        let mut core = JunoCore::new(image, CoreConfig::default(), HandlerRegistry::new());

        for _ in 0..200 {
            let outcome = run_until(&mut core, &mut memory, RunBoundary::Tick, 1);
            prop_assert_eq!(core.registers().read(0), Ok(core.pc() as i64));
            prop_assert_eq!(core.registers().read(1), Ok(data_base as i64));
            if outcome.final_tick == Ok(TickOutcome::Halted) {
                break;
            }
            prop_assert!(outcome.final_tick.is_ok());
        }
        prop_assert!(core.is_halted());
    }

    #[test]
    fn reserved_writes_never_succeed(
        op in 0usize..ALU_OPS.len(),
        reserved in 0u8..2,
        value in any::<i64>(),
    ) {
        let word = encode_alu(ALU_OPS[op].opcode(), 2, 3, reserved);
        let image = ProgramImage::from_parts(&[], &[word, HALT]).expect("image");
        let mut memory = FlatMemory::with_image(&image, 0, 1);
        let mut core = JunoCore::new(image, CoreConfig::default(), HandlerRegistry::new());
        core.registers_mut().write(2, value).expect("r2");

        let outcome = run_until(&mut core, &mut memory, RunBoundary::Halted, 10);
        prop_assert_eq!(
            outcome.final_tick.map_err(|fault| fault.code),
            Err(FaultCode::ReservedRegisterWrite)
        );
        prop_assert_eq!(core.registers().read(0), Ok(0));
    }

    #[test]
    fn no_fetch_until_load_completion_is_delivered(
        idle_ticks in 0usize..50,
        value in any::<i64>(),
    ) {
        let image = ProgramImage::from_parts(&[], &[encode_load(2, 3), HALT]).expect("image");
        let mut core = JunoCore::new(image, CoreConfig::default(), HandlerRegistry::new());
        let mut memory = HeldMemory::default();

        let issued = matches!(core.advance(&mut memory), Ok(TickOutcome::Issued { .. }));
        prop_assert!(issued);
        for _ in 0..idle_ticks {
            prop_assert_eq!(
                core.advance(&mut memory),
                Ok(TickOutcome::Stalled(StallReason::Memory))
            );
        }
        prop_assert_eq!(memory.sent.len(), 1);

        core.on_completion(Completion::Memory {
            id: RequestId(0),
            data: value.to_le_bytes().to_vec(),
        })
        .expect("pending load");
        prop_assert_eq!(core.registers().read(3), Ok(value));
        prop_assert_eq!(core.advance(&mut memory), Ok(TickOutcome::Halted));
    }

    #[test]
    fn identical_runs_leave_identical_traces(
        words in proptest::collection::vec(any::<u32>(), 1..32),
        latency in 0u64..4,
    ) {
        let run = || {
            let image = ProgramImage::from_parts(&[0x5A; 16], &words).expect("image");
            let mut memory = FlatMemory::with_image(&image, 128, latency);
            let config = CoreConfig {
                max_address: 1 << 12,
                tracing_enabled: true,
                ..CoreConfig::default()
            };
            let handlers = HandlerRegistry::new().with(Box::new(RandInstructionHandler::default()));
            let mut core = JunoCore::new(image, config, handlers);
            let trace = SharedTrace::default();
            core.set_trace_sink(Box::new(trace.clone()));
            let outcome = run_until(&mut core, &mut memory, RunBoundary::Halted, 2_000);
            let events = trace.0.borrow().clone();
            (outcome, core.registers().dump(), events)
        };

        prop_assert_eq!(run(), run());
    }

    #[test]
    fn decoded_fields_reassemble_the_word(word in any::<u32>()) {
        let decoded = Decoder::decode(word);
        prop_assert_eq!(
            encode_alu(decoded.opcode, decoded.reg1, decoded.reg2, decoded.write_reg),
            word
        );
    }
}
