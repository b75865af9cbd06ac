use ::rand::rngs::StdRng;
use ::rand::{Rng, SeedableRng};
use log::debug;

use super::{CustomInstructionHandler, HandlerContext, HandlerError, HandlerOutcome};
use crate::decoder::DecodedInstruction;

/// Opcode of `RAND rw`: write a pseudo-random value to `rw`.
pub const RAND_OPCODE: u8 = 200;
/// Opcode of `RSEED r1`: reseed the generator from `r1`.
pub const RSEED_OPCODE: u8 = 201;
/// Seed used when none is configured.
pub const DEFAULT_RAND_SEED: u64 = 101_010_101;
/// Cycles `RAND` occupies the core, issue tick included.
pub const RAND_BUSY_CYCLES: u32 = 20;
/// Cycles `RSEED` occupies the core, issue tick included.
pub const RSEED_BUSY_CYCLES: u32 = 10;

/// In-core seeded random-number unit.
#[derive(Debug, Clone)]
pub struct RandInstructionHandler {
    rng: StdRng,
    cycles_left: u32,
    rand_calls: u64,
    seed_calls: u64,
}

impl Default for RandInstructionHandler {
    fn default() -> Self {
        Self::with_seed(DEFAULT_RAND_SEED)
    }
}

impl RandInstructionHandler {
    /// Creates a handler with a fixed seed.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            cycles_left: 0,
            rand_calls: 0,
            seed_calls: 0,
        }
    }

    /// Number of `RAND` instructions executed.
    #[must_use]
    pub const fn rand_calls(&self) -> u64 {
        self.rand_calls
    }

    /// Number of `RSEED` instructions executed.
    #[must_use]
    pub const fn seed_calls(&self) -> u64 {
        self.seed_calls
    }
}

impl CustomInstructionHandler for RandInstructionHandler {
    fn name(&self) -> &str {
        "rand"
    }

    fn can_claim(&self, opcode: u8) -> bool {
        opcode == RAND_OPCODE || opcode == RSEED_OPCODE
    }

    fn execute(
        &mut self,
        instruction: &DecodedInstruction,
        context: &HandlerContext<'_>,
    ) -> Result<HandlerOutcome, HandlerError> {
        let outcome = HandlerOutcome::fall_through(context.pc);
        match instruction.opcode {
            RAND_OPCODE => {
                context.registers.check_writable(instruction.write_reg)?;
                let value: i64 = self.rng.gen();
                debug!("RAND r{} = {value}", instruction.write_reg);
                self.cycles_left = RAND_BUSY_CYCLES;
                self.rand_calls += 1;
                Ok(outcome.with_write(instruction.write_reg, value))
            }
            RSEED_OPCODE => {
                let seed =
                    u64::from_ne_bytes(context.registers.read(instruction.reg1)?.to_ne_bytes());
                debug!("RSEED r{} ({seed})", instruction.reg1);
                self.rng = StdRng::seed_from_u64(seed);
                self.cycles_left = RSEED_BUSY_CYCLES;
                self.seed_calls += 1;
                Ok(outcome)
            }
            other => Err(HandlerError::Status(u32::from(other))),
        }
    }

    fn is_busy(&mut self) -> bool {
        self.cycles_left = self.cycles_left.saturating_sub(1);
        self.cycles_left > 0
    }
}
