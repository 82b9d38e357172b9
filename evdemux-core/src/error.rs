//! Row-level errors.
//!
//! None of these stop a transcode: the offending row is dropped, counted and
//! the next row is processed.

use crate::types::{EventCategory, HEADER_LEN};
use thiserror::Error;

/// Reasons a single row is excluded from every output stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    #[error("Malformed header: expected at least {} bytes, got {len}", HEADER_LEN)]
    MalformedHeader { len: usize },

    #[error("Unknown event category code: {0}")]
    UnknownCategory(u8),

    #[error("Unrecognized frame geometry for declared width {declared}")]
    UnrecognizedFrameGeometry { declared: u32 },

    #[error("Width drift in {category} stream: established {established}, row yields {computed}")]
    CategoryWidthDrift {
        category: EventCategory,
        established: u32,
        computed: u32,
    },

    #[error("Inexact packet size: {len} payload bytes is not a multiple of {width}")]
    InexactPacketSize { len: usize, width: u32 },
}

impl RowError {
    /// Returns the fieldless kind of this error.
    pub fn kind(&self) -> RowErrorKind {
        match self {
            Self::MalformedHeader { .. } => RowErrorKind::MalformedHeader,
            Self::UnknownCategory(_) => RowErrorKind::UnknownCategory,
            Self::UnrecognizedFrameGeometry { .. } => RowErrorKind::UnrecognizedFrameGeometry,
            Self::CategoryWidthDrift { .. } => RowErrorKind::CategoryWidthDrift,
            Self::InexactPacketSize { .. } => RowErrorKind::InexactPacketSize,
        }
    }
}

/// Kind of a [`RowError`], used as a statistics key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowErrorKind {
    MalformedHeader,
    UnknownCategory,
    UnrecognizedFrameGeometry,
    CategoryWidthDrift,
    InexactPacketSize,
}

impl RowErrorKind {
    pub const COUNT: usize = 5;

    pub const ALL: [RowErrorKind; Self::COUNT] = [
        RowErrorKind::MalformedHeader,
        RowErrorKind::UnknownCategory,
        RowErrorKind::UnrecognizedFrameGeometry,
        RowErrorKind::CategoryWidthDrift,
        RowErrorKind::InexactPacketSize,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Short label used in summaries.
    pub fn label(self) -> &'static str {
        match self {
            Self::MalformedHeader => "malformed header",
            Self::UnknownCategory => "unknown category",
            Self::UnrecognizedFrameGeometry => "unrecognized frame geometry",
            Self::CategoryWidthDrift => "category width drift",
            Self::InexactPacketSize => "inexact packet size",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            RowError::MalformedHeader { len: 3 }.kind(),
            RowErrorKind::MalformedHeader
        );
        assert_eq!(
            RowError::CategoryWidthDrift {
                category: EventCategory::Imu6,
                established: 12,
                computed: 16,
            }
            .kind(),
            RowErrorKind::CategoryWidthDrift
        );
        for (i, kind) in RowErrorKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn test_error_messages() {
        let err = RowError::MalformedHeader { len: 3 };
        assert_eq!(
            err.to_string(),
            "Malformed header: expected at least 8 bytes, got 3"
        );
        let err = RowError::InexactPacketSize { len: 20, width: 8 };
        assert!(err.to_string().contains("20 payload bytes"));
    }
}
