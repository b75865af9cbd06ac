//! Host run loop.
//!
//! Each tick delivers completions that are due (memory first, then every extra
//! source in order) and then advances the core once. A fault or halt always
//! ends the run.

use log::debug;

use crate::api::{CompletionSource, RunBoundary, RunOutcome, TickOutcome};
use crate::execute::JunoCore;
use crate::fault::Fault;
use crate::memory::MemoryInterface;

/// Runs the core against `memory` until `boundary` or `max_ticks`.
///
/// At least one tick is always driven.
pub fn run_until<M>(
    core: &mut JunoCore,
    memory: &mut M,
    boundary: RunBoundary,
    max_ticks: u64,
) -> RunOutcome
where
    M: MemoryInterface + CompletionSource,
{
    run_with_sources(core, memory, &mut [], boundary, max_ticks)
}

/// Like [`run_until`], also clocking `sources` such as accelerators.
pub fn run_with_sources<M>(
    core: &mut JunoCore,
    memory: &mut M,
    sources: &mut [&mut dyn CompletionSource],
    boundary: RunBoundary,
    max_ticks: u64,
) -> RunOutcome
where
    M: MemoryInterface + CompletionSource,
{
    let mut ticks = 0;
    loop {
        ticks += 1;
        let final_tick = run_tick(core, memory, sources);
        let done = match final_tick {
            Err(_) | Ok(TickOutcome::Halted) => true,
            Ok(TickOutcome::Issued { .. }) => boundary != RunBoundary::Halted,
            Ok(TickOutcome::Stalled(_)) => boundary == RunBoundary::Tick,
        };
        if done || ticks >= max_ticks {
            debug!("run stopped after {ticks} ticks: {final_tick:?}");
            return RunOutcome { ticks, final_tick };
        }
    }
}

fn run_tick<M>(
    core: &mut JunoCore,
    memory: &mut M,
    sources: &mut [&mut dyn CompletionSource],
) -> Result<TickOutcome, Fault>
where
    M: MemoryInterface + CompletionSource,
{
    for completion in CompletionSource::tick(memory) {
        core.on_completion(completion)?;
    }
    for source in sources.iter_mut() {
        for completion in source.tick() {
            core.on_completion(completion)?;
        }
    }
    core.advance(memory)
}

#[cfg(test)]
mod tests {
    use super::{run_until, run_with_sources};
    use crate::api::{CompletionSource, CoreConfig, RunBoundary, TickOutcome};
    use crate::custom::{AcceleratorLink, ExternalRandHandler, HandlerRegistry, RandAccelerator};
    use crate::decoder::{encode_absolute, encode_alu, encode_control};
    use crate::encoding::OpcodeEncoding;
    use crate::execute::JunoCore;
    use crate::fault::FaultCode;
    use crate::memory::FlatMemory;
    use crate::program::ProgramImage;
    use crate::state::StallReason;

    const HALT: u32 = 0xFF;

    fn setup(literals: &[u8], program: &[u32], handlers: HandlerRegistry) -> (JunoCore, FlatMemory) {
        let image = ProgramImage::from_parts(literals, program).expect("image");
        let memory = FlatMemory::with_image(&image, 64, 1);
        (JunoCore::new(image, CoreConfig::default(), handlers), memory)
    }

    #[test]
    fn tick_boundary_stops_after_one_tick() {
        let (mut core, mut memory) = setup(&[], &[HALT], HandlerRegistry::new());
        let outcome = run_until(&mut core, &mut memory, RunBoundary::Tick, 100);
        assert_eq!(outcome.ticks, 1);
        assert_eq!(outcome.final_tick, Ok(TickOutcome::Halted));
    }

    #[test]
    fn instruction_boundary_skips_stalls() {
        let lda = encode_absolute(OpcodeEncoding::Lda.opcode(), 0, 2);
        let (mut core, mut memory) = setup(&[7, 0, 0, 0, 0, 0, 0, 0], &[lda, HALT], HandlerRegistry::new());

        let first = run_until(&mut core, &mut memory, RunBoundary::Instruction, 100);
        assert_eq!(first.final_tick, Ok(TickOutcome::Issued { pc: 8, opcode: 2 }));
        let tick = run_until(&mut core, &mut memory, RunBoundary::Tick, 100);
        assert_eq!(tick.final_tick, Ok(TickOutcome::Halted));
        assert_eq!(core.registers().read(2), Ok(7));
    }

    #[test]
    fn tick_limit_bounds_the_run() {
        let div = encode_alu(OpcodeEncoding::Div.opcode(), 2, 3, 4);
        let (mut core, mut memory) = setup(&[], &[div, HALT], HandlerRegistry::new());
        core.registers_mut().write(3, 1).expect("divisor");
        let outcome = run_until(&mut core, &mut memory, RunBoundary::Halted, 3);
        assert_eq!(outcome.ticks, 3);
        assert_eq!(
            outcome.final_tick,
            Ok(TickOutcome::Stalled(StallReason::Latency))
        );
    }

    #[test]
    fn faults_end_the_run() {
        let div = encode_alu(OpcodeEncoding::Div.opcode(), 2, 3, 4);
        let (mut core, mut memory) = setup(&[], &[div, HALT], HandlerRegistry::new());
        let outcome = run_until(&mut core, &mut memory, RunBoundary::Halted, 100);
        assert_eq!(outcome.ticks, 1);
        assert_eq!(
            outcome.final_tick.map_err(|fault| fault.code),
            Err(FaultCode::DivideByZero)
        );
    }

    #[test]
    fn extra_sources_feed_handler_completions() {
        let link = AcceleratorLink::new();
        let mut accelerator = RandAccelerator::with_params(link.clone(), 2, 5);
        let handlers = HandlerRegistry::new().with(Box::new(ExternalRandHandler::new(link)));
        let rand = encode_alu(200, 0, 0, 3);
        let (mut core, mut memory) = setup(&[], &[rand, encode_control(0), HALT], handlers);

        let sources: &mut [&mut dyn CompletionSource] = &mut [&mut accelerator];
        let outcome = run_with_sources(&mut core, &mut memory, sources, RunBoundary::Halted, 100);
        assert_eq!(outcome.final_tick, Ok(TickOutcome::Halted));
        assert_ne!(core.registers().read(3), Ok(0));
    }
}
