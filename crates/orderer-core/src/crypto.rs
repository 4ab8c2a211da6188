//! Hashing primitives for the orderer.
//!
//! Everything the chain commits to is a BLAKE3 digest:
//!   1. the data hash over a block's ordered payloads
//!   2. the header hash that the next block links to
//!
//! Variable-length fields are length-prefixed before hashing so that two
//! different payload lists can never feed the hasher the same byte stream.

/// Hash a byte slice, returning a 32-byte BLAKE3 digest.
pub fn hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Incremental BLAKE3 hasher for inputs that arrive in pieces.
///
/// # Example
/// ```
/// use orderer_core::crypto::Hasher;
/// let mut h = Hasher::new();
/// h.update(b"hello ");
/// h.update(b"world");
/// let digest = h.finalize();
/// assert_eq!(digest, orderer_core::crypto::hash(b"hello world"));
/// ```
pub struct Hasher(blake3::Hasher);

impl Hasher {
    pub fn new() -> Self {
        Self(blake3::Hasher::new())
    }

    pub fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    /// Feed `u32 LE length || bytes`.
    pub fn update_prefixed(&mut self, data: &[u8]) {
        self.0.update(&(data.len() as u32).to_le_bytes());
        self.0.update(data);
    }

    pub fn finalize(self) -> [u8; 32] {
        *self.0.finalize().as_bytes()
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Data hash of a block: BLAKE3 over each payload, length-prefixed, in order.
pub fn data_hash<P: AsRef<[u8]>>(payloads: &[P]) -> [u8; 32] {
    let mut h = Hasher::new();
    for payload in payloads {
        h.update_prefixed(payload.as_ref());
    }
    h.finalize()
}

/// Header hash of a block.
///
///   BLAKE3(number_le || len(prev) || prev || len(data) || data)
pub fn header_hash(number: u64, previous_hash: &[u8], data_hash: &[u8]) -> [u8; 32] {
    let mut h = Hasher::new();
    h.update(&number.to_le_bytes());
    h.update_prefixed(previous_hash);
    h.update_prefixed(data_hash);
    h.finalize()
}
