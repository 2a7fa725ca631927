//! Versioned binary envelope for programs and snapshots
//!
//! ```text
//! offset  size  field
//! 0       4     magic "STSN"
//! 4       2     format version, little-endian
//! 6       1     artifact kind
//! 7       32    SHA-256 of the payload
//! 39      ..    postcard payload
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::DecodeError;

pub const MAGIC: &[u8; 4] = b"STSN";
pub const FORMAT_VERSION: u16 = 1;
pub const HEADER_LEN: usize = 4 + 2 + 1 + 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ArtifactKind {
    Program = 1,
    Snapshot = 2,
    FutureSnapshot = 3,
}

impl ArtifactKind {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(ArtifactKind::Program),
            2 => Some(ArtifactKind::Snapshot),
            3 => Some(ArtifactKind::FutureSnapshot),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ArtifactKind::Program => "program",
            ArtifactKind::Snapshot => "snapshot",
            ArtifactKind::FutureSnapshot => "future-snapshot",
        }
    }
}

/// Wrap a value in the envelope
pub fn encode<T: Serialize>(kind: ArtifactKind, value: &T) -> Result<Vec<u8>, postcard::Error> {
    let payload = postcard::to_allocvec(value)?;
    let digest = Sha256::digest(&payload);

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.push(kind as u8);
    out.extend_from_slice(&digest);
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Check the envelope and decode its payload
pub fn decode<T: DeserializeOwned>(expected: ArtifactKind, bytes: &[u8]) -> Result<T, DecodeError> {
    if bytes.len() < 4 || &bytes[..4] != MAGIC {
        // A short buffer that still starts like ours is reported as truncated
        if bytes.len() < 4 && MAGIC.starts_with(bytes) {
            return Err(DecodeError::Truncated {
                expected: HEADER_LEN,
                actual: bytes.len(),
            });
        }
        return Err(DecodeError::BadMagic);
    }
    if bytes.len() < HEADER_LEN {
        return Err(DecodeError::Truncated {
            expected: HEADER_LEN,
            actual: bytes.len(),
        });
    }

    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != FORMAT_VERSION {
        return Err(DecodeError::UnsupportedVersion {
            found: version,
            supported: FORMAT_VERSION,
        });
    }

    let kind = ArtifactKind::from_byte(bytes[6])
        .ok_or_else(|| DecodeError::Malformed(format!("unknown artifact kind {}", bytes[6])))?;
    if kind != expected {
        return Err(DecodeError::WrongKind {
            expected: expected.name(),
            found: kind.name(),
        });
    }

    let payload = &bytes[HEADER_LEN..];
    if Sha256::digest(payload).as_slice() != &bytes[7..HEADER_LEN] {
        return Err(DecodeError::ChecksumMismatch);
    }

    let (value, rest) = postcard::take_from_bytes::<T>(payload)
        .map_err(|e| DecodeError::Malformed(e.to_string()))?;
    if !rest.is_empty() {
        return Err(DecodeError::Malformed(format!(
            "{} trailing byte(s) after payload",
            rest.len()
        )));
    }
    Ok(value)
}
