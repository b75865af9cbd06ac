//! Deterministic run fingerprint generator used by CI cross-host comparison.

use std::cell::RefCell;
use std::rc::Rc;

use juno_core::{
    encode_absolute, encode_alu, encode_control, encode_jump, encode_load, encode_store,
    run_until, CoreConfig, FlatMemory, HandlerRegistry, JunoCore, OpcodeEncoding, ProgramImage,
    RandInstructionHandler, RunBoundary, TraceEvent, TraceSink,
};
use log as _;
use proptest as _;
use rand as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

#[derive(Clone, Default)]
struct SharedTrace(Rc<RefCell<Vec<TraceEvent>>>);

impl TraceSink for SharedTrace {
    fn on_event(&mut self, event: TraceEvent) {
        self.0.borrow_mut().push(event);
    }
}

fn hash_bytes(hash: &mut u64, bytes: &[u8]) {
    for byte in bytes {
        *hash ^= u64::from(*byte);
        *hash = hash.wrapping_mul(0x1000_0000_01B3);
    }
}

fn program() -> ProgramImage {
    let mut literals = 12i64.to_le_bytes().to_vec();
    literals.extend_from_slice(&1i64.to_le_bytes());
    let instructions = [
        encode_absolute(OpcodeEncoding::Lda.opcode(), 0, 2),
        encode_absolute(OpcodeEncoding::Lda.opcode(), 8, 3),
        encode_alu(200, 0, 0, 4),
        encode_alu(OpcodeEncoding::Xor.opcode(), 4, 2, 5),
        encode_store(5, 1),
        encode_load(1, 6),
        encode_alu(OpcodeEncoding::Sub.opcode(), 2, 3, 2),
        encode_jump(OpcodeEncoding::Jgtz.opcode(), 2, -5),
        encode_control(OpcodeEncoding::Halt.opcode()),
    ];
    ProgramImage::from_parts(&literals, &instructions).expect("fingerprint program is well formed")
}

fn fingerprint() -> String {
    let image = program();
    let mut memory = FlatMemory::with_image(&image, 64, 3);
    let config = CoreConfig {
        tracing_enabled: true,
        ..CoreConfig::default()
    };
    let handlers = HandlerRegistry::new().with(Box::new(RandInstructionHandler::default()));
    let mut core = JunoCore::new(image, config, handlers);
    let trace = SharedTrace::default();
    core.set_trace_sink(Box::new(trace.clone()));

    let outcome = run_until(&mut core, &mut memory, RunBoundary::Halted, 1_000_000);

    let mut hash = 0xcbf2_9ce4_8422_2325_u64;
    hash_bytes(&mut hash, &outcome.ticks.to_le_bytes());
    hash_bytes(&mut hash, format!("{:?}", outcome.final_tick).as_bytes());
    for event in trace.0.borrow().iter() {
        hash_bytes(&mut hash, format!("{event:?}").as_bytes());
    }
    for value in core.registers().dump() {
        hash_bytes(&mut hash, &value.to_le_bytes());
    }
    let data_base = core.registers().data_base();
    hash_bytes(&mut hash, &memory.read_bytes(data_base, 8));

    format!("{hash:016x}")
}

fn main() {
    println!("{}", fingerprint());
}
