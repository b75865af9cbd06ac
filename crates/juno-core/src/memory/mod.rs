//! Memory request contract between the core and the external memory.
//!
//! The core never reads data memory directly. Loads and stores become
//! [`MemRequest`]s handed to a [`MemoryInterface`]; results come back later as
//! [`crate::api::Completion::Memory`] through the core's completion entry point.

use std::fmt;

/// Address validation shared by fetch and the load/store unit.
pub mod access;
/// Zero-initialised reference memory with fixed completion latency.
pub mod flat;

pub use access::{register_address, validate_data_address, WORD_ACCESS_BYTES};
pub use flat::FlatMemory;

/// Opaque identifier the memory assigns to an in-flight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Direction of a memory request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum RequestKind {
    /// Read `size` bytes.
    Read,
    /// Write `payload`.
    Write,
}

/// A single memory request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MemRequest {
    /// Read or write.
    pub kind: RequestKind,
    /// Byte address.
    pub address: u64,
    /// Access width in bytes.
    pub size: usize,
    /// Bytes to write; empty for reads.
    pub payload: Vec<u8>,
}

impl MemRequest {
    /// Builds a read of `size` bytes at `address`.
    #[must_use]
    pub const fn read(address: u64, size: usize) -> Self {
        Self {
            kind: RequestKind::Read,
            address,
            size,
            payload: Vec::new(),
        }
    }

    /// Builds a write of `payload` at `address`.
    #[must_use]
    pub fn write(address: u64, payload: Vec<u8>) -> Self {
        Self {
            kind: RequestKind::Write,
            address,
            size: payload.len(),
            payload,
        }
    }
}

/// External memory as seen by the core.
pub trait MemoryInterface {
    /// Accepts a request and returns the identifier its completion will carry.
    ///
    /// Identifiers must be unique among requests still in flight.
    fn send_request(&mut self, request: MemRequest) -> RequestId;
}

#[cfg(test)]
mod tests {
    use super::{MemRequest, RequestId, RequestKind};

    #[test]
    fn write_request_size_follows_payload() {
        let request = MemRequest::write(64, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(request.kind, RequestKind::Write);
        assert_eq!(request.size, 8);
    }

    #[test]
    fn read_request_carries_no_payload() {
        let request = MemRequest::read(16, 8);
        assert_eq!(request.kind, RequestKind::Read);
        assert!(request.payload.is_empty());
    }

    #[test]
    fn request_id_display_is_compact() {
        assert_eq!(RequestId(17).to_string(), "#17");
    }
}
