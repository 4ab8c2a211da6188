//! Orderer wire format — blocks as they are published to the log, and the
//! envelope/response pair exchanged with broadcast clients.
//!
//! An encoded block is a fixed 24-byte preamble followed by the two header
//! hashes and the length-prefixed payloads:
//!
//!   BlockPreamble | previous_hash | data_hash | (u32 len | payload)*
//!
//! All integers are little-endian. The preamble uses zerocopy derives for
//! allocation-free parsing. There is no unsafe code in this module.

use bytes::Bytes;
use static_assertions::assert_eq_size;
use zerocopy::byteorder::{LittleEndian, U16, U32, U64};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

use crate::crypto;

// ── Constants ─────────────────────────────────────────────────────────────────

/// "OBLK" read as a little-endian u32.
pub const BLOCK_MAGIC: u32 = u32::from_le_bytes(*b"OBLK");

/// Current block format version.
pub const BLOCK_VERSION: u8 = 0x01;

/// Payload carried by block 0 in place of client data.
pub const GENESIS_PAYLOAD: &[u8] = b"genesis";

/// Size of the length prefix in front of every payload.
const PAYLOAD_PREFIX: usize = 4;

// ── Preamble ──────────────────────────────────────────────────────────────────

/// Fixed-size prefix of every encoded block.
///
/// Wire size: 24 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct BlockPreamble {
    /// Always BLOCK_MAGIC. Anything else is not a block.
    pub magic: U32<LittleEndian>,
    /// Format version. Currently 0x01.
    pub version: u8,
    /// Reserved, must be zero.
    pub flags: u8,
    /// Reserved, must be zero.
    pub reserved: U16<LittleEndian>,
    /// Block number, gapless from 0.
    pub number: U64<LittleEndian>,
    /// Length of the previous header hash. 0 for genesis.
    pub prev_hash_len: U16<LittleEndian>,
    /// Length of the data hash.
    pub data_hash_len: U16<LittleEndian>,
    /// Number of length-prefixed payloads following the hashes.
    pub payload_count: U32<LittleEndian>,
}

assert_eq_size!(BlockPreamble, [u8; 24]);

const PREAMBLE_SIZE: usize = std::mem::size_of::<BlockPreamble>();

// ── Block ─────────────────────────────────────────────────────────────────────

/// Sequencing metadata of a block. The next block links to `hash()` of this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub number: u64,
    /// Header hash of the predecessor. Empty for genesis.
    pub previous_hash: Bytes,
    pub data_hash: Bytes,
}

impl BlockHeader {
    pub fn hash(&self) -> [u8; 32] {
        crypto::header_hash(self.number, &self.previous_hash, &self.data_hash)
    }
}

/// The ordered payloads of one cut.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockData {
    pub payloads: Vec<Bytes>,
}

impl BlockData {
    pub fn hash(&self) -> [u8; 32] {
        crypto::data_hash(&self.payloads)
    }
}

/// One unit of chain-linked output. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub header: BlockHeader,
    pub data: BlockData,
}

impl Block {
    pub fn number(&self) -> u64 {
        self.header.number
    }

    /// Serialize to the wire layout described at the top of this module.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let prev_len = hash_len(&self.header.previous_hash)?;
        let data_len = hash_len(&self.header.data_hash)?;
        let count = u32::try_from(self.data.payloads.len())
            .map_err(|_| WireError::TooManyPayloads(self.data.payloads.len()))?;

        let body: usize = self
            .data
            .payloads
            .iter()
            .map(|p| PAYLOAD_PREFIX + p.len())
            .sum();
        let mut out =
            Vec::with_capacity(PREAMBLE_SIZE + prev_len as usize + data_len as usize + body);

        let preamble = BlockPreamble {
            magic: U32::new(BLOCK_MAGIC),
            version: BLOCK_VERSION,
            flags: 0,
            reserved: U16::new(0),
            number: U64::new(self.header.number),
            prev_hash_len: U16::new(prev_len),
            data_hash_len: U16::new(data_len),
            payload_count: U32::new(count),
        };
        out.extend_from_slice(preamble.as_bytes());
        out.extend_from_slice(&self.header.previous_hash);
        out.extend_from_slice(&self.header.data_hash);

        for payload in &self.data.payloads {
            let len =
                u32::try_from(payload.len()).map_err(|_| WireError::PayloadTooLarge(payload.len()))?;
            out.extend_from_slice(&len.to_le_bytes());
            out.extend_from_slice(payload);
        }
        Ok(out)
    }

    /// Parse an encoded block. The whole input must be consumed.
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        let preamble = BlockPreamble::read_from_prefix(bytes).ok_or(WireError::Truncated)?;

        let magic = preamble.magic.get();
        if magic != BLOCK_MAGIC {
            return Err(WireError::BadMagic(magic));
        }
        if preamble.version != BLOCK_VERSION {
            return Err(WireError::UnknownVersion(preamble.version));
        }
        if preamble.flags != 0 {
            return Err(WireError::ReservedFlagsSet(preamble.flags));
        }
        let reserved = preamble.reserved.get();
        if reserved != 0 {
            return Err(WireError::ReservedNonZero(reserved));
        }

        let mut cursor = Cursor::new(&bytes[PREAMBLE_SIZE..]);
        let previous_hash = cursor.take(preamble.prev_hash_len.get() as usize)?;
        let data_hash = cursor.take(preamble.data_hash_len.get() as usize)?;

        let count = preamble.payload_count.get() as usize;
        // Every payload needs at least its prefix; reject absurd counts before allocating.
        if count > cursor.remaining() / PAYLOAD_PREFIX {
            return Err(WireError::Truncated);
        }
        let mut payloads = Vec::with_capacity(count);
        for _ in 0..count {
            let len_bytes = cursor.take(PAYLOAD_PREFIX)?;
            let len = u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]);
            payloads.push(cursor.take(len as usize)?);
        }

        if cursor.remaining() != 0 {
            return Err(WireError::TrailingBytes(cursor.remaining()));
        }

        Ok(Block {
            header: BlockHeader {
                number: preamble.number.get(),
                previous_hash,
                data_hash,
            },
            data: BlockData { payloads },
        })
    }
}

fn hash_len(hash: &[u8]) -> Result<u16, WireError> {
    u16::try_from(hash.len()).map_err(|_| WireError::HashTooLong(hash.len()))
}

struct Cursor<'a> {
    buf: &'a [u8],
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn take(&mut self, n: usize) -> Result<Bytes, WireError> {
        if n > self.buf.len() {
            return Err(WireError::Truncated);
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(Bytes::copy_from_slice(head))
    }

    fn remaining(&self) -> usize {
        self.buf.len()
    }
}

// ── Client messages ───────────────────────────────────────────────────────────

/// One inbound unit on a broadcast stream. The payload is opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub payload: Bytes,
}

impl Envelope {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }
}

/// Result code carried in every broadcast reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Status {
    Success = 200,
    BadRequest = 400,
    Forbidden = 403,
    NotFound = 404,
    ServiceUnavailable = 503,
}

impl TryFrom<u16> for Status {
    type Error = WireError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            200 => Ok(Status::Success),
            400 => Ok(Status::BadRequest),
            403 => Ok(Status::Forbidden),
            404 => Ok(Status::NotFound),
            503 => Ok(Status::ServiceUnavailable),
            other => Err(WireError::UnknownStatus(other)),
        }
    }
}

impl From<Status> for u16 {
    fn from(s: Status) -> u16 {
        s as u16
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Status::Success => "SUCCESS",
            Status::BadRequest => "BAD_REQUEST",
            Status::Forbidden => "FORBIDDEN",
            Status::NotFound => "NOT_FOUND",
            Status::ServiceUnavailable => "SERVICE_UNAVAILABLE",
        };
        f.write_str(name)
    }
}

/// Reply sent for every inbound envelope, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastResponse {
    pub status: Status,
}

impl BroadcastResponse {
    pub fn success() -> Self {
        Self {
            status: Status::Success,
        }
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that can arise when encoding or interpreting wire-format data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("bad block magic: 0x{0:08x}")]
    BadMagic(u32),

    #[error("unknown block version: 0x{0:02x}")]
    UnknownVersion(u8),

    #[error("reserved flags are non-zero: 0x{0:02x}")]
    ReservedFlagsSet(u8),

    #[error("reserved field is non-zero: 0x{0:04x}")]
    ReservedNonZero(u16),

    #[error("block is truncated")]
    Truncated,

    #[error("{0} trailing bytes after block")]
    TrailingBytes(usize),

    #[error("hash length {0} exceeds {}", u16::MAX)]
    HashTooLong(usize),

    #[error("payload length {0} exceeds {}", u32::MAX)]
    PayloadTooLarge(usize),

    #[error("payload count {0} exceeds {}", u32::MAX)]
    TooManyPayloads(usize),

    #[error("unknown status code: {0}")]
    UnknownStatus(u16),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
