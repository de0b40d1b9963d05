//! LFS object ID (OID) — the SHA-256 content hash.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("invalid object id: {0}")]
pub struct InvalidOid(pub String);

/// A 64-character lowercase hex SHA-256 digest identifying object content.
///
/// Stored as raw bytes; the wire and database representation is always the
/// lowercase hex string.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Oid {
    bytes: [u8; 32],
}

impl Oid {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Oid { bytes }
    }

    /// Parse an OID from its hex form. Uppercase digits are rejected; the
    /// protocol mandates lowercase and accepting both would let two spellings
    /// of one identity slip past the mapping table's primary key.
    pub fn from_hex(hex: &str) -> Result<Self, InvalidOid> {
        let hex = hex.trim();
        if hex.len() != 64 {
            return Err(InvalidOid(format!(
                "expected 64 hex characters, got {}",
                hex.len()
            )));
        }
        if !hex
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        {
            return Err(InvalidOid(
                "expected lowercase hexadecimal characters".into(),
            ));
        }

        let decoded = hex::decode(hex).map_err(|e| InvalidOid(e.to_string()))?;
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&decoded);
        Ok(Oid { bytes })
    }

    /// Compute the OID of a byte sequence.
    pub fn from_content(content: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content);
        let digest = hasher.finalize();

        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Oid { bytes }
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self.to_hex())
    }
}

impl std::str::FromStr for Oid {
    type Err = InvalidOid;

    fn from_str(s: &str) -> Result<Self, InvalidOid> {
        Oid::from_hex(s)
    }
}

impl Serialize for Oid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Oid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Oid::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}
