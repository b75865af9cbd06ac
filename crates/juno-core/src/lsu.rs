//! Asynchronous load/store unit.
//!
//! Each issued load or store gets an entry keyed by the memory's request id.
//! Loads remember the register awaiting the data; stores remember nothing.
//! An entry is removed exactly once, when its completion is delivered. A
//! memory that hands out an id still in flight is a protocol fault; the
//! existing entry is kept.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use log::trace;

use crate::fault::FaultCode;
use crate::memory::{
    validate_data_address, MemRequest, MemoryInterface, RequestId, WORD_ACCESS_BYTES,
};
use crate::state::RegisterFile;

/// Pending-request table plus the address bound it enforces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadStoreUnit {
    pending: BTreeMap<RequestId, Option<u8>>,
    max_address: u64,
}

impl LoadStoreUnit {
    /// Creates an idle unit that rejects addresses at or above `max_address`.
    #[must_use]
    pub const fn new(max_address: u64) -> Self {
        Self {
            pending: BTreeMap::new(),
            max_address,
        }
    }

    /// Issues an 8-byte read whose result will be written to `dest`.
    ///
    /// # Errors
    ///
    /// Returns [`FaultCode::AddressOutOfRange`] when `address` is at or above
    /// the maximum address; nothing is sent in that case. Returns
    /// [`FaultCode::DuplicateRequest`] when the memory answers with an id
    /// that is already pending.
    pub fn issue_load(
        &mut self,
        memory: &mut dyn MemoryInterface,
        address: u64,
        dest: u8,
    ) -> Result<RequestId, FaultCode> {
        validate_data_address(address, self.max_address)?;
        let id = memory.send_request(MemRequest::read(address, WORD_ACCESS_BYTES));
        trace!("lsu: load {id} from {address} into r{dest}");
        self.track(id, Some(dest))?;
        Ok(id)
    }

    /// Issues an 8-byte little-endian write of register `src`.
    ///
    /// # Errors
    ///
    /// Returns [`FaultCode::AddressOutOfRange`] for an out-of-range address,
    /// [`FaultCode::InvalidRegister`] for an unreadable source register and
    /// [`FaultCode::DuplicateRequest`] for a reused in-flight id.
    pub fn issue_store(
        &mut self,
        memory: &mut dyn MemoryInterface,
        registers: &RegisterFile,
        address: u64,
        src: u8,
    ) -> Result<RequestId, FaultCode> {
        validate_data_address(address, self.max_address)?;
        let value = registers.read(src)?;
        let id = memory.send_request(MemRequest::write(address, value.to_le_bytes().to_vec()));
        trace!("lsu: store {id} of r{src}={value} to {address}");
        self.track(id, None)?;
        Ok(id)
    }

    fn track(&mut self, id: RequestId, dest: Option<u8>) -> Result<(), FaultCode> {
        match self.pending.entry(id) {
            Entry::Occupied(_) => Err(FaultCode::DuplicateRequest),
            Entry::Vacant(slot) => {
                slot.insert(dest);
                Ok(())
            }
        }
    }

    /// True while any request is awaiting completion.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Number of requests awaiting completion.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Retires a request and returns the register awaiting its data, if any.
    ///
    /// # Errors
    ///
    /// Returns [`FaultCode::UnknownRequest`] when `id` is not pending.
    pub fn complete(&mut self, id: RequestId) -> Result<Option<u8>, FaultCode> {
        self.pending.remove(&id).ok_or(FaultCode::UnknownRequest)
    }
}

/// Interprets a load completion payload as a little-endian `i64`.
///
/// Short payloads are zero-extended; bytes past the eighth are ignored.
#[must_use]
pub fn loaded_value(data: &[u8]) -> i64 {
    let mut word = [0u8; 8];
    for (slot, byte) in word.iter_mut().zip(data) {
        *slot = *byte;
    }
    i64::from_le_bytes(word)
}

#[cfg(test)]
mod tests {
    use super::{loaded_value, LoadStoreUnit};
    use crate::fault::FaultCode;
    use crate::memory::{MemRequest, MemoryInterface, RequestId, RequestKind};
    use crate::state::RegisterFile;

    #[derive(Default)]
    struct RecordingMemory {
        sent: Vec<MemRequest>,
    }

    impl MemoryInterface for RecordingMemory {
        fn send_request(&mut self, request: MemRequest) -> RequestId {
            self.sent.push(request);
            RequestId(self.sent.len() as u64 * 10)
        }
    }

    #[test]
    fn load_records_destination_until_completion() {
        let mut memory = RecordingMemory::default();
        let mut lsu = LoadStoreUnit::new(u64::MAX);

        let id = lsu.issue_load(&mut memory, 24, 5).expect("load issues");
        assert!(lsu.has_pending());
        assert_eq!(memory.sent[0], MemRequest::read(24, 8));

        assert_eq!(lsu.complete(id), Ok(Some(5)));
        assert!(!lsu.has_pending());
    }

    #[test]
    fn store_sends_register_bytes_and_records_no_destination() {
        let mut memory = RecordingMemory::default();
        let mut regs = RegisterFile::default();
        regs.write(3, -2).expect("write");
        let mut lsu = LoadStoreUnit::new(u64::MAX);

        let id = lsu
            .issue_store(&mut memory, &regs, 40, 3)
            .expect("store issues");
        assert_eq!(memory.sent[0].kind, RequestKind::Write);
        assert_eq!(memory.sent[0].payload, (-2i64).to_le_bytes().to_vec());
        assert_eq!(lsu.complete(id), Ok(None));
    }

    #[test]
    fn completion_is_consumed_exactly_once() {
        let mut memory = RecordingMemory::default();
        let mut lsu = LoadStoreUnit::new(u64::MAX);
        let id = lsu.issue_load(&mut memory, 0, 2).expect("load issues");
        assert!(lsu.complete(id).is_ok());
        assert_eq!(lsu.complete(id), Err(FaultCode::UnknownRequest));
    }

    #[test]
    fn unknown_id_is_rejected() {
        let mut lsu = LoadStoreUnit::new(u64::MAX);
        assert_eq!(lsu.complete(RequestId(7)), Err(FaultCode::UnknownRequest));
    }

    #[test]
    fn out_of_range_address_sends_nothing() {
        let mut memory = RecordingMemory::default();
        let regs = RegisterFile::default();
        let mut lsu = LoadStoreUnit::new(128);
        assert_eq!(
            lsu.issue_load(&mut memory, 128, 2),
            Err(FaultCode::AddressOutOfRange)
        );
        assert_eq!(
            lsu.issue_store(&mut memory, &regs, 200, 2),
            Err(FaultCode::AddressOutOfRange)
        );
        assert!(memory.sent.is_empty());
        assert_eq!(lsu.pending_count(), 0);
    }

    /// Memory that hands out the same id for every request.
    struct StuckIdMemory;

    impl MemoryInterface for StuckIdMemory {
        fn send_request(&mut self, _request: MemRequest) -> RequestId {
            RequestId(5)
        }
    }

    #[test]
    fn reused_in_flight_id_is_rejected_and_keeps_first_entry() {
        let mut memory = StuckIdMemory;
        let regs = RegisterFile::default();
        let mut lsu = LoadStoreUnit::new(u64::MAX);

        assert_eq!(lsu.issue_load(&mut memory, 0, 2), Ok(RequestId(5)));
        assert_eq!(
            lsu.issue_load(&mut memory, 8, 3),
            Err(FaultCode::DuplicateRequest)
        );
        assert_eq!(
            lsu.issue_store(&mut memory, &regs, 16, 4),
            Err(FaultCode::DuplicateRequest)
        );
        assert_eq!(lsu.pending_count(), 1);
        assert_eq!(lsu.complete(RequestId(5)), Ok(Some(2)));

        assert_eq!(lsu.issue_load(&mut memory, 8, 3), Ok(RequestId(5)));
    }

    #[test]
    fn loaded_value_zero_extends_short_payloads() {
        assert_eq!(loaded_value(&[0x2A]), 42);
        assert_eq!(loaded_value(&(-9i64).to_le_bytes()), -9);
        assert_eq!(loaded_value(&[]), 0);
    }
}
