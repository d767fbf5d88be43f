//! crates/checksums/src/strong/mod.rs
//!
//! Seeded strong checksums.
//!
//! The block checksum appends the session seed *after* the block data while
//! the whole-file checksum prepends it. Both use little-endian seed bytes.

mod md4;

pub use self::md4::{MD4_DIGEST_LEN, Md4};

/// Strong checksum length used in the first phase.
pub const CSUM_LENGTH_PHASE1: usize = 2;

/// Strong checksum length used in the redo phase.
pub const CSUM_LENGTH_PHASE2: usize = MD4_DIGEST_LEN;

/// Full-length strong checksum of one block: `MD4(block ‖ seed)`.
///
/// Callers truncate to the negotiated checksum length.
#[must_use]
pub fn block_digest(block: &[u8], seed: i32) -> [u8; MD4_DIGEST_LEN] {
    let mut hasher = Md4::new();
    hasher.update(block);
    hasher.update(&seed.to_le_bytes());
    hasher.finalize()
}

/// Streaming whole-file checksum: `MD4(seed ‖ data)`.
#[derive(Clone, Debug)]
pub struct FileDigest {
    hasher: Md4,
    bytes: u64,
}

impl FileDigest {
    /// Starts a digest keyed with `seed`.
    #[must_use]
    pub fn new(seed: i32) -> Self {
        let mut hasher = Md4::new();
        hasher.update(&seed.to_le_bytes());
        Self { hasher, bytes: 0 }
    }

    /// Adds file content.
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.bytes += data.len() as u64;
    }

    /// Bytes hashed so far, excluding the seed.
    #[must_use]
    pub const fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Finalises the digest.
    #[must_use]
    pub fn finalize(self) -> [u8; MD4_DIGEST_LEN] {
        self.hasher.finalize()
    }
}

/// One-shot whole-file checksum.
#[must_use]
pub fn file_digest(data: &[u8], seed: i32) -> [u8; MD4_DIGEST_LEN] {
    let mut digest = FileDigest::new(seed);
    digest.update(data);
    digest.finalize()
}
