//! Binary program image.
//!
//! Layout: a little-endian header (`i64` version, `u64` literal-pool length,
//! `u64` instruction-stream length), the literal pool, the instruction
//! stream, then zero padding up to a multiple of eight bytes. Execution
//! starts at the first instruction, i.e. at `data_len`.

use log::{info, warn};
use thiserror::Error;

use crate::decoder::Decoder;
use crate::fault::FaultCode;

/// Version stamp written by the Juno assembler.
pub const FORMAT_VERSION: i64 = 1_000_000;
/// Size of the file header in bytes.
pub const HEADER_BYTES: usize = 24;
/// Alignment of the in-memory image.
pub const IMAGE_ALIGNMENT: u64 = 8;

/// Errors raised while parsing a binary program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ImageError {
    /// Fewer bytes than a full header.
    #[error("program header truncated: {len} of 24 bytes")]
    TruncatedHeader {
        /// Bytes available.
        len: usize,
    },
    /// Header promises more bytes than the file holds.
    #[error("program body truncated: header declares {expected} bytes, found {actual}")]
    TruncatedBody {
        /// Bytes declared by the header.
        expected: u64,
        /// Bytes present after the header.
        actual: usize,
    },
    /// Declared lengths cannot be addressed on this host.
    #[error("program segment lengths overflow the host address space")]
    LengthOverflow,
}

/// Loaded program: literal pool and instruction stream, padded.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ProgramImage {
    version: i64,
    data_len: u64,
    inst_len: u64,
    bytes: Box<[u8]>,
}

const fn padding_for(len: u64) -> u64 {
    let rem = len % IMAGE_ALIGNMENT;
    if rem == 0 {
        0
    } else {
        IMAGE_ALIGNMENT - rem
    }
}

fn read_header_word(bytes: &[u8], offset: usize) -> Option<[u8; 8]> {
    bytes.get(offset..offset + 8)?.try_into().ok()
}

impl ProgramImage {
    /// Parses a binary program file.
    ///
    /// Trailing bytes past the declared segments are ignored.
    ///
    /// # Errors
    ///
    /// Returns an [`ImageError`] when the header or body is truncated or the
    /// declared lengths do not fit in memory.
    pub fn parse(bytes: &[u8]) -> Result<Self, ImageError> {
        let header = |offset| {
            read_header_word(bytes, offset).ok_or(ImageError::TruncatedHeader { len: bytes.len() })
        };
        let version = i64::from_le_bytes(header(0)?);
        let data_len = u64::from_le_bytes(header(8)?);
        let inst_len = u64::from_le_bytes(header(16)?);

        if version != FORMAT_VERSION {
            warn!("program version {version} differs from expected {FORMAT_VERSION}");
        }

        let body_len = data_len
            .checked_add(inst_len)
            .ok_or(ImageError::LengthOverflow)?;
        let body_usize = usize::try_from(body_len).map_err(|_| ImageError::LengthOverflow)?;
        let body = bytes
            .get(HEADER_BYTES..)
            .and_then(|rest| rest.get(..body_usize))
            .ok_or(ImageError::TruncatedBody {
                expected: body_len,
                actual: bytes.len().saturating_sub(HEADER_BYTES),
            })?;

        let image = Self::from_body(version, data_len, inst_len, body)?;
        info!(
            "loaded program: {data_len} literal bytes, {inst_len} instruction bytes, {} padding",
            image.padding()
        );
        Ok(image)
    }

    /// Builds an image from a literal pool and instruction words.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::LengthOverflow`] if the segments cannot be padded
    /// within the host address space.
    pub fn from_parts(literals: &[u8], instructions: &[u32]) -> Result<Self, ImageError> {
        let mut body = literals.to_vec();
        body.extend(instructions.iter().flat_map(|word| word.to_le_bytes()));
        let data_len = u64::try_from(literals.len()).map_err(|_| ImageError::LengthOverflow)?;
        let inst_len =
            u64::try_from(body.len() - literals.len()).map_err(|_| ImageError::LengthOverflow)?;
        Self::from_body(FORMAT_VERSION, data_len, inst_len, &body)
    }

    fn from_body(
        version: i64,
        data_len: u64,
        inst_len: u64,
        body: &[u8],
    ) -> Result<Self, ImageError> {
        let unpadded = data_len
            .checked_add(inst_len)
            .ok_or(ImageError::LengthOverflow)?;
        let padded = unpadded
            .checked_add(padding_for(unpadded))
            .ok_or(ImageError::LengthOverflow)?;
        let padded = usize::try_from(padded).map_err(|_| ImageError::LengthOverflow)?;
        let mut bytes = body.to_vec();
        bytes.resize(padded, 0);
        Ok(Self {
            version,
            data_len,
            inst_len,
            bytes: bytes.into_boxed_slice(),
        })
    }

    /// Serializes the image back to the binary file format.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_BYTES + self.bytes.len());
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.data_len.to_le_bytes());
        out.extend_from_slice(&self.inst_len.to_le_bytes());
        out.extend_from_slice(self.segments());
        out
    }

    /// Header version stamp.
    #[must_use]
    pub const fn version(&self) -> i64 {
        self.version
    }

    /// Literal-pool length in bytes.
    #[must_use]
    pub const fn data_len(&self) -> u64 {
        self.data_len
    }

    /// Instruction-stream length in bytes.
    #[must_use]
    pub const fn inst_len(&self) -> u64 {
        self.inst_len
    }

    /// Zero bytes appended to reach the image alignment.
    #[must_use]
    pub const fn padding(&self) -> u64 {
        padding_for(self.data_len + self.inst_len)
    }

    /// Initial program counter.
    #[must_use]
    pub const fn entry_pc(&self) -> u64 {
        self.data_len
    }

    /// First address past the instruction stream.
    #[must_use]
    pub const fn instruction_end(&self) -> u64 {
        self.data_len + self.inst_len
    }

    /// First address past the padded image, where runtime data begins.
    #[must_use]
    pub const fn dynamic_data_base(&self) -> u64 {
        self.instruction_end() + self.padding()
    }

    /// Padded image as it is laid out in memory from address 0.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Literal pool bytes.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn literal_pool(&self) -> &[u8] {
        &self.bytes[..self.data_len as usize]
    }

    #[allow(clippy::cast_possible_truncation)]
    fn segments(&self) -> &[u8] {
        &self.bytes[..self.instruction_end() as usize]
    }

    /// Fetches the instruction word at `pc`.
    ///
    /// # Errors
    ///
    /// Returns [`FaultCode::AddressOutOfRange`] when `pc >= max_address` and
    /// [`FaultCode::FetchOutOfImage`] when the word does not lie within the
    /// program segments.
    pub fn fetch(&self, pc: u64, max_address: u64) -> Result<u32, FaultCode> {
        if pc >= max_address {
            return Err(FaultCode::AddressOutOfRange);
        }
        let end = pc.checked_add(4).ok_or(FaultCode::FetchOutOfImage)?;
        if end > self.instruction_end() {
            return Err(FaultCode::FetchOutOfImage);
        }
        let start = usize::try_from(pc).map_err(|_| FaultCode::FetchOutOfImage)?;
        Decoder::decode_bytes(&self.bytes[start..])
            .map(|instruction| instruction.word)
            .ok_or(FaultCode::FetchOutOfImage)
    }

    /// Iterates `(pc, word)` over the instruction stream.
    pub fn instructions(&self) -> impl Iterator<Item = (u64, u32)> + '_ {
        self.bytes[self.literal_pool().len()..self.segments().len()]
            .chunks_exact(4)
            .zip((self.data_len..).step_by(4))
            .map(|(chunk, pc)| (pc, u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])))
    }
}
