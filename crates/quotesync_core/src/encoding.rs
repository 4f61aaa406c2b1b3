//! Canonical CBOR encoding and fingerprints.
//!
//! Every map in the data model is ordered and struct fields are emitted in
//! declaration order, so equal values always encode to identical bytes. Two
//! devices that merge the same inputs can compare fingerprints to confirm
//! they converged.

use crate::error::{MergeError, MergeResult};
use crate::quote::Quote;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// Encodes `value` to canonical CBOR.
///
/// # Errors
///
/// Returns [`MergeError::Encoding`] if serialization fails.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> MergeResult<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::into_writer(value, &mut bytes).map_err(|e| MergeError::Encoding(e.to_string()))?;
    Ok(bytes)
}

/// Decodes a value from CBOR.
///
/// # Errors
///
/// Returns [`MergeError::Encoding`] for malformed input, including clocks
/// with invalid counters.
pub fn from_canonical_bytes<T: DeserializeOwned>(bytes: &[u8]) -> MergeResult<T> {
    ciborium::from_reader(bytes).map_err(|e| MergeError::Encoding(e.to_string()))
}

/// SHA-256 of a canonical encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Hashes raw bytes.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }

    /// Returns the digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First eight hex digits, for log lines.
    pub fn short(&self) -> String {
        self.to_string()[..8].to_string()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Fingerprints a quote.
///
/// # Errors
///
/// Returns [`MergeError::Encoding`] if the quote cannot be encoded.
pub fn fingerprint(quote: &Quote) -> MergeResult<Fingerprint> {
    to_canonical_bytes(quote).map(|bytes| Fingerprint::of_bytes(&bytes))
}
