use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use ::rand::rngs::StdRng;
use ::rand::{Rng, SeedableRng};
use log::{debug, trace};

use super::rand::{DEFAULT_RAND_SEED, RAND_OPCODE, RSEED_OPCODE};
use super::{
    CustomInstructionHandler, HandlerContext, HandlerError, HandlerId, HandlerOutcome,
    HandlerResponse, RegisterWrite,
};
use crate::api::{Completion, CompletionSource};
use crate::decoder::DecodedInstruction;
use crate::fault::FaultCode;

/// Ticks the accelerator takes to produce a value by default.
pub const DEFAULT_GENERATION_TICKS: u64 = 10;

/// Request to generate one random value for a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AcceleratorRequest {
    /// Sequence number assigned by the sending handler.
    pub id: u64,
    /// Handler the response must be routed back to.
    pub handler: HandlerId,
}

/// Shared request queue from [`ExternalRandHandler`] to [`RandAccelerator`].
#[derive(Debug, Clone, Default)]
pub struct AcceleratorLink {
    queue: Rc<RefCell<VecDeque<AcceleratorRequest>>>,
}

impl AcceleratorLink {
    /// Creates an empty link.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a request.
    pub fn send(&self, request: AcceleratorRequest) {
        self.queue.borrow_mut().push_back(request);
    }

    /// Removes and returns every queued request.
    pub fn drain(&self) -> Vec<AcceleratorRequest> {
        self.queue.borrow_mut().drain(..).collect()
    }

    /// Requests sent but not yet drained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    /// True when nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }
}

/// `RAND`/`RSEED` handler that offloads generation to a [`RandAccelerator`].
///
/// The handler stays busy from `RAND` issue until the accelerator's value is
/// delivered back through the core. `RSEED` is accepted and ignored.
#[derive(Debug, Clone)]
pub struct ExternalRandHandler {
    link: AcceleratorLink,
    target: Option<u8>,
    next_request: u64,
    rand_calls: u64,
}

impl ExternalRandHandler {
    /// Creates a handler sending requests over `link`.
    #[must_use]
    pub const fn new(link: AcceleratorLink) -> Self {
        Self {
            link,
            target: None,
            next_request: 0,
            rand_calls: 0,
        }
    }

    /// Register awaiting a value, if a request is outstanding.
    #[must_use]
    pub const fn target(&self) -> Option<u8> {
        self.target
    }

    /// Number of values received.
    #[must_use]
    pub const fn rand_calls(&self) -> u64 {
        self.rand_calls
    }
}

impl CustomInstructionHandler for ExternalRandHandler {
    fn name(&self) -> &str {
        "external-rand"
    }

    fn can_claim(&self, opcode: u8) -> bool {
        opcode == RAND_OPCODE || opcode == RSEED_OPCODE
    }

    fn execute(
        &mut self,
        instruction: &DecodedInstruction,
        context: &HandlerContext<'_>,
    ) -> Result<HandlerOutcome, HandlerError> {
        match instruction.opcode {
            RAND_OPCODE => {
                context.registers.check_writable(instruction.write_reg)?;
                let request = AcceleratorRequest {
                    id: self.next_request,
                    handler: context.handler,
                };
                self.next_request += 1;
                self.target = Some(instruction.write_reg);
                debug!(
                    "RAND r{} forwarded as accelerator request {}",
                    instruction.write_reg, request.id
                );
                self.link.send(request);
            }
            RSEED_OPCODE => {}
            other => return Err(HandlerError::Status(u32::from(other))),
        }
        Ok(HandlerOutcome::fall_through(context.pc))
    }

    fn is_busy(&mut self) -> bool {
        self.target.is_some()
    }

    fn on_response(
        &mut self,
        response: HandlerResponse,
    ) -> Result<Option<RegisterWrite>, FaultCode> {
        let HandlerResponse::Value(value) = response;
        let register = self.target.take().ok_or(FaultCode::UnknownHandler)?;
        debug!("accelerator value {value} lands in r{register}");
        self.rand_calls += 1;
        Ok(Some(RegisterWrite { register, value }))
    }
}

/// Stand-alone random-number generator answering requests after a delay.
#[derive(Debug, Clone)]
pub struct RandAccelerator {
    link: AcceleratorLink,
    rng: StdRng,
    generation_ticks: u64,
    now: u64,
    generating: VecDeque<(u64, AcceleratorRequest)>,
}

impl RandAccelerator {
    /// Creates an accelerator with the default seed and generation time.
    #[must_use]
    pub fn new(link: AcceleratorLink) -> Self {
        Self::with_params(link, DEFAULT_GENERATION_TICKS, DEFAULT_RAND_SEED)
    }

    /// Creates an accelerator with explicit generation time and seed.
    #[must_use]
    pub fn with_params(link: AcceleratorLink, generation_ticks: u64, seed: u64) -> Self {
        Self {
            link,
            rng: StdRng::seed_from_u64(seed),
            generation_ticks,
            now: 0,
            generating: VecDeque::new(),
        }
    }

    /// Requests accepted but not yet answered.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.generating.len() + self.link.len()
    }

    /// Advances one tick and returns the responses that became ready.
    pub fn tick(&mut self) -> Vec<Completion> {
        self.now += 1;
        for request in self.link.drain() {
            trace!("accelerator: accepted request {}", request.id);
            self.generating
                .push_back((self.now + self.generation_ticks, request));
        }
        let mut ready = Vec::new();
        while self
            .generating
            .front()
            .is_some_and(|(due, _)| *due <= self.now)
        {
            if let Some((_, request)) = self.generating.pop_front() {
                let value: i64 = self.rng.gen();
                trace!("accelerator: request {} -> {value}", request.id);
                ready.push(Completion::Handler {
                    handler: request.handler,
                    response: HandlerResponse::Value(value),
                });
            }
        }
        ready
    }
}

impl CompletionSource for RandAccelerator {
    fn tick(&mut self) -> Vec<Completion> {
        Self::tick(self)
    }
}
