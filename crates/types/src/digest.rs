//! Command digest type.

use std::fmt;

/// 32-byte digest identifying a command.
///
/// Ordering is lexicographic over the raw bytes, which matches the ordering
/// of the lowercase hex form. The free-will engine relies on this to break
/// trusted-timestamp ties deterministically.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Digest([u8; 32]);

impl Digest {
    /// All-zero digest.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Hash arbitrary bytes with blake3.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Wrap raw digest bytes without hashing them.
    pub const fn from_hash_bytes(bytes: &[u8; 32]) -> Self {
        Self(*bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", hex::encode(&self.0[..8]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_form() {
        let digest = Digest::from_bytes(b"command");
        let hex = digest.to_hex();
        assert_eq!(hex.len(), 64);
        assert!(hex.starts_with(&digest.to_string()));
        assert_eq!(format!("{digest:?}"), format!("Digest({digest})"));
    }

    #[test]
    fn test_ordering_follows_raw_bytes() {
        let mut low = [0u8; 32];
        let mut high = [0u8; 32];
        low[0] = 0x01;
        high[0] = 0xF0;
        let low = Digest::from_hash_bytes(&low);
        let high = Digest::from_hash_bytes(&high);

        assert!(low < high);
        assert!(low.to_hex() < high.to_hex());
    }
}
