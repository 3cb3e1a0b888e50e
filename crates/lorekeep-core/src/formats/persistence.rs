//! # Persistence Format
//!
//! Binary serialization for Lorekeep sessions (registry plus edit history).
//!
//! Format: Header (13 bytes) + postcard-serialized [`SessionState`].
//! - 4 bytes: Magic ("LORE")
//! - 1 byte: Version
//! - 8 bytes: Payload checksum, little-endian
//!
//! Size, header and checksum are all validated before the payload is
//! deserialized.

use crate::session::SessionState;
use crate::{LoreError, Registry, primitives};

/// Maximum accepted file size.
pub const MAX_PERSISTENCE_PAYLOAD_SIZE: usize = 500 * 1024 * 1024; // 500 MB

/// Header length in bytes.
pub const HEADER_LEN: usize = 13;

// =============================================================================
// FILE HEADER
// =============================================================================

/// The persistence header precedes all session data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistenceHeader {
    pub magic: [u8; 4],
    pub version: u8,
    pub checksum: u64,
}

impl PersistenceHeader {
    /// Create a header for a payload with the given checksum.
    #[must_use]
    pub fn new(checksum: u64) -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
            checksum,
        }
    }

    /// Validate magic and version.
    pub fn validate(&self) -> Result<(), LoreError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(LoreError::Serialization("Invalid magic bytes".to_string()));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(LoreError::Serialization(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes[5..].copy_from_slice(&self.checksum.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LoreError> {
        let (Some(magic), Some(version), Some(checksum)) =
            (bytes.get(0..4), bytes.get(4), bytes.get(5..HEADER_LEN))
        else {
            return Err(LoreError::Serialization("Header too short".to_string()));
        };
        let mut magic_bytes = [0u8; 4];
        magic_bytes.copy_from_slice(magic);
        let mut checksum_bytes = [0u8; 8];
        checksum_bytes.copy_from_slice(checksum);
        Ok(Self {
            magic: magic_bytes,
            version: *version,
            checksum: u64::from_le_bytes(checksum_bytes),
        })
    }
}

// =============================================================================
// CHECKSUM
// =============================================================================

/// Order-sensitive rotate-XOR checksum of a byte string.
///
/// Detects accidental corruption only. It is not collision resistant; use
/// `registry_hash` (feature `crypto-hash`) where that matters.
#[must_use]
pub fn payload_checksum(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(0u64, |hash, byte| hash.rotate_left(5) ^ u64::from(*byte))
}

/// Checksum of a registry's canonical encoding.
pub fn registry_checksum(registry: &Registry) -> Result<u64, LoreError> {
    let bytes = postcard::to_stdvec(registry).map_err(|e| LoreError::Serialization(e.to_string()))?;
    Ok(payload_checksum(&bytes))
}

/// BLAKE3 digest (hex) of a registry's canonical encoding.
///
/// Only available with the `crypto-hash` feature.
#[cfg(feature = "crypto-hash")]
pub fn registry_hash(registry: &Registry) -> Result<String, LoreError> {
    let bytes = postcard::to_stdvec(registry).map_err(|e| LoreError::Serialization(e.to_string()))?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a session state to bytes (header + payload).
pub fn state_to_bytes(state: &SessionState) -> Result<Vec<u8>, LoreError> {
    let payload = postcard::to_stdvec(state).map_err(|e| LoreError::Serialization(e.to_string()))?;
    let header = PersistenceHeader::new(payload_checksum(&payload));

    let mut result = Vec::with_capacity(HEADER_LEN.saturating_add(payload.len()));
    result.extend_from_slice(&header.to_bytes());
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Deserialize a session state from bytes.
pub fn state_from_bytes(bytes: &[u8]) -> Result<SessionState, LoreError> {
    if bytes.len() < HEADER_LEN {
        return Err(LoreError::Serialization(format!(
            "Data too short: minimum {} bytes required",
            HEADER_LEN
        )));
    }
    if bytes.len() > MAX_PERSISTENCE_PAYLOAD_SIZE {
        return Err(LoreError::Serialization(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_PERSISTENCE_PAYLOAD_SIZE
        )));
    }

    let header = PersistenceHeader::from_bytes(bytes)?;
    header.validate()?;

    let payload = bytes.get(HEADER_LEN..).unwrap_or_default();
    let actual = payload_checksum(payload);
    if actual != header.checksum {
        return Err(LoreError::Serialization(format!(
            "Checksum mismatch: header {:#018x}, payload {:#018x}",
            header.checksum, actual
        )));
    }

    postcard::from_bytes(payload)
        .map_err(|e| LoreError::Serialization(format!("Failed to deserialize session: {}", e)))
}

// =============================================================================
// TESTS
// =============================================================================
