use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Identifier for a stored blob
///
/// This is the lowercase hex SHA-256 digest of the blob's content: computing
/// it is a pure function of the bytes, so identical content always yields the
/// identical identifier and concurrent saves race harmlessly to the same key.
/// SHA-256 was chosen for collision resistance; a collision would silently
/// alias two distinct messages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlobId {
    hex: String,
}

const DIGEST_HEX_LEN: usize = 64;

impl BlobId {
    /// Compute the identifier for the given content
    #[must_use]
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self {
            hex: hex::encode(hasher.finalize()),
        }
    }

    /// Parse an identifier from its hex form
    ///
    /// Rejects anything that is not exactly 64 lowercase hex characters, so
    /// an identifier can never smuggle path separators or traversal patterns
    /// into a filename.
    pub fn from_hex(s: &str) -> Option<Self> {
        if s.len() != DIGEST_HEX_LEN {
            return None;
        }

        if !s
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            return None;
        }

        Some(Self { hex: s.to_string() })
    }

    /// The identifier's hex form
    #[must_use]
    pub fn as_hex(&self) -> &str {
        &self.hex
    }
}

impl std::fmt::Display for BlobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hex)
    }
}

impl Serialize for BlobId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.hex)
    }
}

impl<'de> Deserialize<'de> for BlobId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid blob id: {s:?}")))
    }
}

/// The pair of blob identifiers referencing one stored mail
///
/// Header and body blocks are addressed separately, so two mails with
/// identical bodies but different headers (or vice versa) share storage for
/// the identical block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobPartsId {
    pub header: BlobId,
    pub body: BlobId,
}
