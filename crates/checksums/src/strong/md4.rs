//! crates/checksums/src/strong/md4.rs
//!
//! Streaming MD4, the strong checksum of the protocol versions this engine
//! speaks (27..=29 family and compatible later peers without negotiation).

use md4::Digest;

/// Length in bytes of an MD4 digest.
pub const MD4_DIGEST_LEN: usize = 16;

/// Streaming MD4 hasher.
#[derive(Clone, Debug, Default)]
pub struct Md4 {
    inner: md4::Md4,
}

impl Md4 {
    /// Creates a hasher with an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds additional bytes into the digest state.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Finalises the digest.
    #[must_use]
    pub fn finalize(self) -> [u8; MD4_DIGEST_LEN] {
        self.inner.finalize().into()
    }

    /// One-shot digest of `data`.
    #[must_use]
    pub fn digest(data: &[u8]) -> [u8; MD4_DIGEST_LEN] {
        let mut hasher = Self::new();
        hasher.update(data);
        hasher.finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    #[test]
    fn rfc1320_vectors() {
        let vectors: [(&[u8], &str); 4] = [
            (b"", "31d6cfe0d16ae931b73c59d7e0c089c0"),
            (b"a", "bde52cb31de33e46245e05fbdbd6fb24"),
            (b"abc", "a448017aaf21d8525fc10ae87aa6729d"),
            (b"message digest", "d9130a8164549fe818874806e1c7014b"),
        ];
        for (input, expected) in vectors {
            assert_eq!(hex(&Md4::digest(input)), expected);
        }
    }

    #[test]
    fn streaming_matches_one_shot() {
        let mut hasher = Md4::new();
        hasher.update(b"message ");
        hasher.update(b"digest");
        assert_eq!(hasher.finalize(), Md4::digest(b"message digest"));
    }
}
