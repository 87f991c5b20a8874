//! Optional binary envelope in front of a textual configuration payload.
//!
//! Layout (16 bytes, little-endian):
//!
//! | offset | size | field            |
//! |--------|------|------------------|
//! | 0      | 4    | magic 0x4D4C4243 |
//! | 4      | 2    | version          |
//! | 6      | 2    | section bitmask  |
//! | 8      | 4    | payload length   |
//! | 12     | 4    | CRC-32 of payload|
//!
//! Buffers that are too short or do not start with the magic are bare legacy
//! payloads, not errors.

use crc::{Crc, CRC_32_ISO_HDLC};

use crate::error::{EnvelopeError, StoreError, StoreResult};
use crate::section::ConfigSection;

/// Record magic, `"CBLM"` in memory order.
pub const RECORD_MAGIC: u32 = 0x4D4C_4243;
/// The only supported record version.
pub const RECORD_VERSION: u16 = 1;
/// Fixed header size in bytes.
pub const HEADER_LEN: usize = 16;

/// CRC32 algorithm (ISO HDLC / Ethernet / ZIP)
const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Decoded envelope header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Format version, always [`RECORD_VERSION`].
    pub version: u16,
    /// Sections the payload carries.
    pub sections: ConfigSection,
    /// Payload bytes following the header.
    pub payload_length: u32,
    /// CRC-32 of the payload.
    pub checksum: u32,
}

/// CRC-32 of `data`.
pub fn compute_checksum(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}

/// Read the envelope header, if any.
///
/// Returns `Ok(None)` for a bare payload.
pub fn decode_header(bytes: &[u8]) -> Result<Option<RecordHeader>, EnvelopeError> {
    if bytes.len() < HEADER_LEN {
        return Ok(None);
    }
    if read_u32(bytes, 0) != RECORD_MAGIC {
        return Ok(None);
    }

    let version = read_u16(bytes, 4);
    if version != RECORD_VERSION {
        return Err(EnvelopeError::UnsupportedVersion {
            found: version,
            expected: RECORD_VERSION,
        });
    }

    let payload_length = read_u32(bytes, 8);
    let available = bytes.len() - HEADER_LEN;
    if payload_length as usize > available {
        return Err(EnvelopeError::PayloadTooLong {
            claimed: payload_length,
            available,
        });
    }

    Ok(Some(RecordHeader {
        version,
        sections: ConfigSection::from_bits_truncate(read_u16(bytes, 6)),
        payload_length,
        checksum: read_u32(bytes, 12),
    }))
}

/// Serialize a header. The payload is appended by the caller.
pub fn encode_header(header: &RecordHeader) -> [u8; HEADER_LEN] {
    let mut out = [0u8; HEADER_LEN];
    out[0..4].copy_from_slice(&RECORD_MAGIC.to_le_bytes());
    out[4..6].copy_from_slice(&header.version.to_le_bytes());
    out[6..8].copy_from_slice(&header.sections.bits().to_le_bytes());
    out[8..12].copy_from_slice(&header.payload_length.to_le_bytes());
    out[12..16].copy_from_slice(&header.checksum.to_le_bytes());
    out
}

/// Wrap `payload` in an envelope.
pub fn seal(sections: ConfigSection, payload: &[u8]) -> Result<Vec<u8>, EnvelopeError> {
    let payload_length = u32::try_from(payload.len()).map_err(|_| EnvelopeError::PayloadTooLong {
        claimed: u32::MAX,
        available: payload.len(),
    })?;
    let header = RecordHeader {
        version: RECORD_VERSION,
        sections,
        payload_length,
        checksum: compute_checksum(payload),
    };
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&encode_header(&header));
    out.extend_from_slice(payload);
    Ok(out)
}

/// Strip and validate the envelope, returning the payload bytes.
///
/// Bare payloads are returned unchanged. Bytes after `payload_length` are
/// ignored.
pub fn open(bytes: &[u8]) -> StoreResult<&[u8]> {
    let Some(header) = decode_header(bytes)? else {
        return Ok(bytes);
    };
    let end = HEADER_LEN + header.payload_length as usize;
    let payload = &bytes[HEADER_LEN..end];
    let computed = compute_checksum(payload);
    if computed != header.checksum {
        return Err(StoreError::ChecksumMismatch {
            stored: header.checksum,
            computed,
        });
    }
    Ok(payload)
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_known_values() {
        let test_cases = [
            (b"" as &[u8], 0x00000000u32),
            (b"a", 0xE8B7BE43),
            (b"123456789", 0xCBF43926),
        ];
        for (data, expected) in test_cases {
            assert_eq!(compute_checksum(data), expected);
        }
    }

    #[test]
    fn test_bare_payloads_are_not_records() {
        assert_eq!(decode_header(b"{}").unwrap(), None);
        assert_eq!(decode_header(br#"{"nodeId":"labnode0001"}"#).unwrap(), None);
        assert_eq!(open(b"{}").unwrap(), b"{}");
    }

    #[test]
    fn test_header_layout() {
        let header = RecordHeader {
            version: RECORD_VERSION,
            sections: ConfigSection::MODULES | ConfigSection::IO,
            payload_length: 2,
            checksum: 0xDEADBEEF,
        };
        let bytes = encode_header(&header);
        assert_eq!(&bytes[0..4], b"CBLM");
        assert_eq!(&bytes[4..6], &[1, 0]);
        assert_eq!(&bytes[6..8], &[0x06, 0]);
        assert_eq!(&bytes[8..12], &[2, 0, 0, 0]);
        assert_eq!(&bytes[12..16], &[0xEF, 0xBE, 0xAD, 0xDE]);
    }

    #[test]
    fn test_seal_then_open() {
        let sealed = seal(ConfigSection::VIRTUAL, b"{\"channels\":[]}").unwrap();
        let header = decode_header(&sealed).unwrap().unwrap();
        assert_eq!(header.sections, ConfigSection::VIRTUAL);
        assert_eq!(header.payload_length, 15);
        assert_eq!(open(&sealed).unwrap(), b"{\"channels\":[]}");
    }

    #[test]
    fn test_wrong_version_rejected() {
        let mut sealed = seal(ConfigSection::IO, b"{}").unwrap();
        sealed[4] = 2;
        assert_eq!(
            decode_header(&sealed),
            Err(EnvelopeError::UnsupportedVersion {
                found: 2,
                expected: 1
            })
        );
    }

    #[test]
    fn test_truncated_payload_rejected() {
        let mut sealed = seal(ConfigSection::IO, b"{\"inputs\":[]}").unwrap();
        sealed.truncate(sealed.len() - 3);
        assert!(matches!(
            decode_header(&sealed),
            Err(EnvelopeError::PayloadTooLong { claimed: 13, available: 10 })
        ));
    }

    #[test]
    fn test_corrupted_payload_fails_checksum() {
        let mut sealed = seal(ConfigSection::IO, b"{\"inputs\":[]}").unwrap();
        let last = sealed.len() - 2;
        sealed[last] = b'}';
        let err = open(&sealed).unwrap_err();
        assert_eq!(err.kind(), "checksum_mismatch");
    }
}
