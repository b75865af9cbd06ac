use std::collections::VecDeque;

use log::trace;

use super::{MemRequest, MemoryInterface, RequestId, RequestKind};
use crate::api::{Completion, CompletionSource};
use crate::program::ProgramImage;

#[derive(Debug, Clone)]
struct InFlight {
    id: RequestId,
    due: u64,
    data: Vec<u8>,
}

/// Byte-addressed store that answers every request after a fixed latency.
///
/// Requests take effect in issue order: reads sample the store and writes
/// update it when issued, and completions are released by [`FlatMemory::tick`]
/// once `latency` ticks have passed (at least one). Accesses beyond the
/// store read as zero and writes there are dropped.
#[derive(Debug, Clone)]
pub struct FlatMemory {
    bytes: Vec<u8>,
    latency: u64,
    now: u64,
    next_id: u64,
    in_flight: VecDeque<InFlight>,
}

impl FlatMemory {
    /// Creates a zeroed store of `size` bytes.
    #[must_use]
    pub fn new(size: usize, latency: u64) -> Self {
        Self {
            bytes: vec![0; size],
            latency,
            now: 0,
            next_id: 0,
            in_flight: VecDeque::new(),
        }
    }

    /// Creates a store holding `image` at address 0 with `extra` free bytes after it.
    #[must_use]
    pub fn with_image(image: &ProgramImage, extra: usize, latency: u64) -> Self {
        let mut memory = Self::new(image.as_bytes().len().saturating_add(extra), latency);
        memory.load_image(image);
        memory
    }

    /// Copies the padded program image to address 0, growing the store if needed.
    pub fn load_image(&mut self, image: &ProgramImage) {
        let bytes = image.as_bytes();
        if self.bytes.len() < bytes.len() {
            self.bytes.resize(bytes.len(), 0);
        }
        self.bytes[..bytes.len()].copy_from_slice(bytes);
        trace!("memory: loaded {} image bytes at 0", bytes.len());
    }

    /// Advances one tick and returns completions now due, in issue order.
    pub fn tick(&mut self) -> Vec<Completion> {
        self.now += 1;
        let mut due = Vec::new();
        while self
            .in_flight
            .front()
            .is_some_and(|entry| entry.due <= self.now)
        {
            if let Some(entry) = self.in_flight.pop_front() {
                trace!("memory: completing {}", entry.id);
                due.push(Completion::Memory {
                    id: entry.id,
                    data: entry.data,
                });
            }
        }
        due
    }

    /// Number of requests not yet completed.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Store size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True for a zero-sized store.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Reads `len` bytes, zero-filled past the end of the store.
    #[must_use]
    pub fn read_bytes(&self, address: u64, len: usize) -> Vec<u8> {
        let mut out = vec![0; len];
        if let Ok(start) = usize::try_from(address) {
            for (offset, byte) in out.iter_mut().enumerate() {
                if let Some(value) = start
                    .checked_add(offset)
                    .and_then(|index| self.bytes.get(index))
                {
                    *byte = *value;
                }
            }
        }
        out
    }

    /// Writes bytes, dropping any that fall past the end of the store.
    pub fn write_bytes(&mut self, address: u64, data: &[u8]) {
        let Ok(start) = usize::try_from(address) else {
            return;
        };
        for (offset, value) in data.iter().enumerate() {
            if let Some(byte) = start
                .checked_add(offset)
                .and_then(|index| self.bytes.get_mut(index))
            {
                *byte = *value;
            }
        }
    }

    /// Reads a little-endian signed 64-bit word.
    #[must_use]
    pub fn read_i64(&self, address: u64) -> i64 {
        let mut word = [0; 8];
        word.copy_from_slice(&self.read_bytes(address, 8));
        i64::from_le_bytes(word)
    }

    /// Writes a little-endian signed 64-bit word.
    pub fn write_i64(&mut self, address: u64, value: i64) {
        self.write_bytes(address, &value.to_le_bytes());
    }
}

impl MemoryInterface for FlatMemory {
    fn send_request(&mut self, request: MemRequest) -> RequestId {
        let id = RequestId(self.next_id);
        self.next_id += 1;
        let data = match request.kind {
            RequestKind::Read => {
                trace!("memory: read {id} {} bytes at {}", request.size, request.address);
                self.read_bytes(request.address, request.size)
            }
            RequestKind::Write => {
                trace!("memory: write {id} {} bytes at {}", request.size, request.address);
                self.write_bytes(request.address, &request.payload);
                Vec::new()
            }
        };
        self.in_flight.push_back(InFlight {
            id,
            due: self.now + self.latency.max(1),
            data,
        });
        id
    }
}

impl CompletionSource for FlatMemory {
    fn tick(&mut self) -> Vec<Completion> {
        Self::tick(self)
    }
}

#[cfg(test)]
mod tests {
    use super::FlatMemory;
    use crate::api::Completion;
    use crate::memory::{MemRequest, MemoryInterface, RequestId};
    use crate::program::ProgramImage;

    #[test]
    fn completions_wait_for_latency() {
        let mut memory = FlatMemory::new(64, 3);
        memory.write_i64(8, 99);
        let id = memory.send_request(MemRequest::read(8, 8));

        assert!(memory.tick().is_empty());
        assert!(memory.tick().is_empty());
        let done = memory.tick();
        assert_eq!(
            done,
            vec![Completion::Memory {
                id,
                data: 99i64.to_le_bytes().to_vec()
            }]
        );
        assert_eq!(memory.in_flight(), 0);
    }

    #[test]
    fn zero_latency_still_completes_on_next_tick() {
        let mut memory = FlatMemory::new(16, 0);
        memory.send_request(MemRequest::read(0, 8));
        assert_eq!(memory.tick().len(), 1);
    }

    #[test]
    fn completions_come_back_in_issue_order() {
        let mut memory = FlatMemory::new(64, 1);
        let first = memory.send_request(MemRequest::write(0, 5i64.to_le_bytes().to_vec()));
        let second = memory.send_request(MemRequest::read(0, 8));
        let ids: Vec<RequestId> = memory
            .tick()
            .into_iter()
            .map(|completion| match completion {
                Completion::Memory { id, .. } => id,
                Completion::Handler { .. } => panic!("memory only completes memory requests"),
            })
            .collect();
        assert_eq!(ids, vec![first, second]);
        assert_eq!(memory.read_i64(0), 5);
    }

    #[test]
    fn out_of_store_reads_zero_and_writes_drop() {
        let mut memory = FlatMemory::new(8, 1);
        memory.write_i64(4, -1);
        assert_eq!(memory.read_bytes(4, 8), vec![0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 0]);
        assert_eq!(memory.read_i64(1 << 40), 0);
    }

    #[test]
    fn image_is_loaded_at_address_zero() {
        let image = ProgramImage::from_parts(&42i64.to_le_bytes(), &[0xFF]).expect("image");
        let memory = FlatMemory::with_image(&image, 32, 1);
        assert_eq!(memory.read_i64(0), 42);
        assert_eq!(memory.len(), 16 + 32);
    }
}
