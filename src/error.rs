//! Custom error types for the configuration store.
//!
//! This module defines `StoreError`, the single error type returned by every
//! persistence operation. Using the `thiserror` crate, it gives a consistent
//! taxonomy for the ways a configuration can fail to load or save.
//!
//! ## Error Hierarchy
//!
//! - **`Decode`**: the textual payload is malformed, truncated or has a wrong-shaped
//!   section body. During load this only rejects the current source.
//! - **`Envelope`**: the optional binary record header is present but unusable
//!   (unsupported version, payload length past the end of the buffer).
//! - **`ChecksumMismatch`**: the record payload does not match its CRC-32.
//! - **`CapacityExceeded`**: a document could not be built or parsed below the
//!   allocation ceiling. Never retried further.
//! - **`Read`** / **`Write`**: the underlying file primitive failed. A short write is
//!   reported as `Write`.
//! - **`VerificationMismatch`**: the post-write reload disagrees with the intended state.
//!
//! `kind()` returns the stable name used in API error objects.

use std::fmt;

use thiserror::Error;

use crate::section::ConfigSection;

/// Convenience alias for results using the store error type.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Problems with the optional record envelope.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    /// Header version is not [`crate::record::RECORD_VERSION`].
    #[error("unsupported record version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version in the header.
        found: u16,
        /// Version this build reads.
        expected: u16,
    },

    /// Header length runs past the end of the buffer.
    #[error("record claims {claimed} payload bytes but only {available} are available")]
    PayloadTooLong {
        /// Length in the header.
        claimed: u32,
        /// Bytes after the header.
        available: usize,
    },
}

/// Why a verification pass rejected a freshly written file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyFailure {
    /// The file could not be re-opened.
    Unreadable,
    /// Envelope header rejected.
    Envelope,
    /// Envelope checksum did not match.
    Checksum,
    /// Payload could not be parsed back.
    Decode,
    /// Payload parsed but a field differs.
    FieldMismatch,
}

impl fmt::Display for VerifyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreadable => write!(f, "open_failed"),
            Self::Envelope => write!(f, "record_header_invalid"),
            Self::Checksum => write!(f, "checksum_mismatch"),
            Self::Decode => write!(f, "parse_failed"),
            Self::FieldMismatch => write!(f, "field_mismatch"),
        }
    }
}

/// Every way a load, save or verification can fail.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Malformed payload or wrong-shaped section.
    #[error("Decode error in {section}: {detail}")]
    Decode {
        /// Sections being decoded.
        section: ConfigSection,
        /// Parser or shape message.
        detail: String,
    },

    /// Unusable record envelope.
    #[error("Record envelope error: {0}")]
    Envelope(#[from] EnvelopeError),

    /// Payload does not match the envelope CRC.
    #[error("Checksum mismatch: stored={stored:08X} computed={computed:08X}")]
    ChecksumMismatch {
        /// CRC from the header.
        stored: u32,
        /// CRC of the payload as read.
        computed: u32,
    },

    /// Document would not fit under the capacity ceiling.
    #[error("{label} document needs more than the {ceiling} byte ceiling")]
    CapacityExceeded {
        /// Sections of the document.
        label: String,
        /// Ceiling in bytes.
        ceiling: usize,
    },

    /// File read failed.
    #[error("Failed to read {path}: {source}")]
    Read {
        /// File name.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// File write failed or was short.
    #[error("Failed to write {path}: {detail}")]
    Write {
        /// File name.
        path: String,
        /// I/O error or short-write description.
        detail: String,
    },

    /// Reloaded file disagrees with the state just written.
    #[error("Verification of {path} failed ({reason}): {detail}")]
    VerificationMismatch {
        /// File name.
        path: String,
        /// Stage that rejected the file.
        reason: VerifyFailure,
        /// Error text or first differing field.
        detail: String,
    },
}

impl StoreError {
    /// Shorthand for a section-scoped decode failure.
    pub fn decode(section: ConfigSection, detail: impl Into<String>) -> Self {
        Self::Decode {
            section,
            detail: detail.into(),
        }
    }

    /// Stable machine-readable name of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decode { .. } => "invalid_json",
            Self::Envelope(_) => "record_header_invalid",
            Self::ChecksumMismatch { .. } => "checksum_mismatch",
            Self::CapacityExceeded { .. } => "payload_too_large",
            Self::Read { .. } => "read_failed",
            Self::Write { .. } => "save_failed",
            Self::VerificationMismatch { .. } => "verify_failed",
        }
    }

    /// Free-text detail for diagnostics, without the kind prefix.
    pub fn detail(&self) -> String {
        match self {
            Self::Decode { detail, .. } => detail.clone(),
            Self::VerificationMismatch { detail, .. } => detail.clone(),
            Self::Write { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }
}
