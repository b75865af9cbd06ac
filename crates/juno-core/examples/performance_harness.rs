//! Performance harness for juno-core benchmarking.
//!
//! Measures instruction and tick throughput for a few small loop programs.
//!
//! ## Usage
//!
//! ```sh
//! cargo run -p juno-core --release --example performance_harness
//! ```
//!
//! The benchmark runs on multiple threads, one core per thread.

#![allow(clippy::pedantic)]

use juno_core::{
    encode_absolute, encode_alu, encode_control, encode_jump, encode_load, encode_store,
    run_until, CoreConfig, FlatMemory, HandlerRegistry, JunoCore, OpcodeEncoding, ProgramImage,
    RandInstructionHandler, RunBoundary,
};
use log as _;
use proptest as _;
use rand as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

const NUM_THREADS: usize = 4;
const LOOP_COUNT: i64 = 1_000;
const MEMORY_LATENCY: u64 = 2;

#[derive(Debug, Clone, Copy)]
struct BenchmarkResult {
    name: &'static str,
    instructions_per_second: f64,
    ticks_per_second: f64,
}

/// Wraps `body` in a countdown loop over r2 with r3 = 1.
fn counted_loop(body: &[u32]) -> ProgramImage {
    let mut literals = LOOP_COUNT.to_le_bytes().to_vec();
    literals.extend_from_slice(&1i64.to_le_bytes());

    let mut instructions = vec![
        encode_absolute(OpcodeEncoding::Lda.opcode(), 0, 2),
        encode_absolute(OpcodeEncoding::Lda.opcode(), 8, 3),
    ];
    instructions.extend_from_slice(body);
    instructions.push(encode_alu(OpcodeEncoding::Sub.opcode(), 2, 3, 2));
    let back = -(body.len() as i16 + 1);
    instructions.push(encode_jump(OpcodeEncoding::Jgtz.opcode(), 2, back));
    instructions.push(encode_control(OpcodeEncoding::Halt.opcode()));

    ProgramImage::from_parts(&literals, &instructions).expect("benchmark program is well formed")
}

fn noop_loop() -> ProgramImage {
    counted_loop(&[encode_control(OpcodeEncoding::Noop.opcode())])
}

fn alu_loop() -> ProgramImage {
    counted_loop(&[
        encode_alu(OpcodeEncoding::Add.opcode(), 4, 3, 4),
        encode_alu(OpcodeEncoding::Mul.opcode(), 4, 4, 5),
        encode_alu(OpcodeEncoding::Xor.opcode(), 5, 2, 6),
        encode_alu(OpcodeEncoding::Mod.opcode(), 6, 3, 7),
    ])
}

fn memory_loop() -> ProgramImage {
    counted_loop(&[encode_store(2, 1), encode_load(1, 4)])
}

fn custom_loop() -> ProgramImage {
    counted_loop(&[encode_alu(200, 0, 0, 4)])
}

fn benchmark(name: &'static str, program: fn() -> ProgramImage, duration: Duration) -> BenchmarkResult {
    let (tx, rx) = mpsc::channel();

    let handles: Vec<_> = (0..NUM_THREADS)
        .map(|_| {
            let tx = tx.clone();
            thread::spawn(move || {
                let image = program();
                let mut total_instructions = 0u64;
                let mut total_ticks = 0u64;
                let start = Instant::now();

                while start.elapsed() < duration {
                    let mut memory = FlatMemory::with_image(&image, 64, MEMORY_LATENCY);
                    let handlers =
                        HandlerRegistry::new().with(Box::new(RandInstructionHandler::default()));
                    let mut core = JunoCore::new(image.clone(), CoreConfig::default(), handlers);

                    let outcome = run_until(&mut core, &mut memory, RunBoundary::Halted, u64::MAX);
                    total_instructions += core.retired();
                    total_ticks += outcome.ticks;
                }

                tx.send((total_instructions, total_ticks)).ok();
            })
        })
        .collect();

    for h in handles {
        h.join().ok();
    }

    drop(tx);

    let mut total_instructions = 0u64;
    let mut total_ticks = 0u64;
    for (inst, ticks) in rx {
        total_instructions += inst;
        total_ticks += ticks;
    }

    let elapsed_secs = duration.as_secs_f64();
    BenchmarkResult {
        name,
        instructions_per_second: total_instructions as f64 / elapsed_secs,
        ticks_per_second: total_ticks as f64 / elapsed_secs,
    }
}

fn format_number(n: f64) -> String {
    if n >= 1_000_000.0 {
        format!("{:.2}M", n / 1_000_000.0)
    } else if n >= 1_000.0 {
        format!("{:.2}K", n / 1_000.0)
    } else {
        format!("{:.2}", n)
    }
}

fn print_results(results: &[BenchmarkResult]) {
    println!();
    println!("juno-core performance harness ({NUM_THREADS} threads, memory latency {MEMORY_LATENCY})");
    println!("{:12} | {:>15} | {:>15} | {:>8}", "Benchmark", "Instr/sec", "Ticks/sec", "CPI");
    println!("{}", "-".repeat(60));
    for result in results {
        println!(
            "{:12} | {:>15} | {:>15} | {:>8.2}",
            result.name,
            format_number(result.instructions_per_second),
            format_number(result.ticks_per_second),
            result.ticks_per_second / result.instructions_per_second,
        );
    }
}

fn main() {
    let duration = Duration::from_secs(2);
    let results = [
        benchmark("noop_loop", noop_loop, duration),
        benchmark("alu_loop", alu_loop, duration),
        benchmark("memory_loop", memory_loop, duration),
        benchmark("custom_loop", custom_loop, duration),
    ];
    print_results(&results);
}
