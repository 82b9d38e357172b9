//! Transcoder configuration.
//!
//! The only tunable part of the pipeline is the frame geometry heuristic: the
//! list of sensor row widths a frame payload is tested against.

use std::str::FromStr;
use thiserror::Error;

/// Size in bytes of the sub-header included in a frame's declared width.
pub const FRAME_SUBHEADER_LEN: u32 = 36;

/// Bytes per APS pixel sample.
pub const FRAME_BYTES_PER_SAMPLE: u32 = 2;

/// Known sensor row widths in pixels (DVS128, DAVIS240, DAVIS346).
pub const DEFAULT_FRAME_CANDIDATES: [u32; 3] = [128, 240, 346];

/// Errors that can occur while building a configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Frame geometry needs at least one candidate width")]
    EmptyCandidates,

    #[error("Frame candidate width must be non-zero")]
    ZeroCandidate,

    #[error("Duplicate frame candidate width: {0}")]
    DuplicateCandidate(u32),

    #[error("Frame candidate width {0} is too large")]
    CandidateTooLarge(u32),

    #[error("Invalid frame candidate width: {0:?}")]
    InvalidCandidate(String),
}

/// Heuristic used to derive a frame row's record width.
///
/// The declared width minus [`FRAME_SUBHEADER_LEN`] is tested against each
/// candidate in order; the first candidate that divides it evenly wins. Sizes
/// divisible by several candidates resolve to whichever comes first, so the
/// order is part of the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameGeometry {
    subheader_len: u32,
    bytes_per_sample: u32,
    candidates: Vec<u32>,
}

impl Default for FrameGeometry {
    fn default() -> Self {
        Self {
            subheader_len: FRAME_SUBHEADER_LEN,
            bytes_per_sample: FRAME_BYTES_PER_SAMPLE,
            candidates: DEFAULT_FRAME_CANDIDATES.to_vec(),
        }
    }
}

impl FrameGeometry {
    /// Creates a geometry testing `candidates` in the given order.
    pub fn new(candidates: Vec<u32>) -> Result<Self, ConfigError> {
        if candidates.is_empty() {
            return Err(ConfigError::EmptyCandidates);
        }

        for (i, &candidate) in candidates.iter().enumerate() {
            if candidate == 0 {
                return Err(ConfigError::ZeroCandidate);
            }
            if candidate.checked_mul(FRAME_BYTES_PER_SAMPLE).is_none() {
                return Err(ConfigError::CandidateTooLarge(candidate));
            }
            if candidates[..i].contains(&candidate) {
                return Err(ConfigError::DuplicateCandidate(candidate));
            }
        }

        Ok(Self {
            candidates,
            ..Self::default()
        })
    }

    /// Candidate row widths in test order.
    pub fn candidates(&self) -> &[u32] {
        &self.candidates
    }

    pub fn subheader_len(&self) -> u32 {
        self.subheader_len
    }

    /// Resolves a frame row's declared width to its record width.
    ///
    /// Returns `None` when the declared width does not exceed the sub-header
    /// or no candidate divides the remaining size.
    pub fn resolve(&self, declared_width: u32) -> Option<u32> {
        let raw = declared_width.checked_sub(self.subheader_len)?;
        if raw == 0 {
            return None;
        }

        self.candidates
            .iter()
            .find(|&&candidate| raw % candidate == 0)
            .map(|&candidate| candidate * self.bytes_per_sample)
    }
}

impl FromStr for FrameGeometry {
    type Err = ConfigError;

    /// Parses a comma-separated candidate list such as "128,240,346".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let candidates = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<u32>()
                    .map_err(|_| ConfigError::InvalidCandidate(part.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(candidates)
    }
}

/// Configuration for a [`Transcoder`](crate::Transcoder).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscodeConfig {
    /// Frame width heuristic
    pub frame_geometry: FrameGeometry,
}

impl TranscodeConfig {
    pub fn with_frame_geometry(mut self, frame_geometry: FrameGeometry) -> Self {
        self.frame_geometry = frame_geometry;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_geometry() {
        let geometry = FrameGeometry::default();
        assert_eq!(geometry.candidates(), &[128, 240, 346]);
        assert_eq!(geometry.subheader_len(), 36);
    }

    #[test]
    fn test_resolve_first_divisor_wins() {
        let geometry = FrameGeometry::default();
        assert_eq!(geometry.resolve(36 + 128 * 3), Some(256));
        assert_eq!(geometry.resolve(36 + 240), Some(480));
        assert_eq!(geometry.resolve(36 + 346 * 2), Some(692));
        // 3840 is a multiple of both 128 and 240
        assert_eq!(geometry.resolve(36 + 3840), Some(256));
    }

    #[test]
    fn test_resolve_rejects_unknown_sizes() {
        let geometry = FrameGeometry::default();
        assert_eq!(geometry.resolve(36 + 100), None);
        assert_eq!(geometry.resolve(36), None);
        assert_eq!(geometry.resolve(10), None);
        assert_eq!(geometry.resolve(0), None);
    }

    #[test]
    fn test_candidate_order_is_configurable() {
        let geometry = FrameGeometry::new(vec![240, 128]).unwrap();
        assert_eq!(geometry.resolve(36 + 3840), Some(480));
    }

    #[test]
    fn test_geometry_parsing() {
        assert_eq!(
            FrameGeometry::from_str("128,240,346").unwrap(),
            FrameGeometry::default()
        );
        assert_eq!(
            FrameGeometry::from_str(" 346 , 240 ").unwrap().candidates(),
            &[346, 240]
        );
    }

    #[test]
    fn test_geometry_parsing_invalid() {
        assert_eq!(
            FrameGeometry::from_str(""),
            Err(ConfigError::EmptyCandidates)
        );
        assert_eq!(
            FrameGeometry::from_str("128,0"),
            Err(ConfigError::ZeroCandidate)
        );
        assert_eq!(
            FrameGeometry::from_str("128,128"),
            Err(ConfigError::DuplicateCandidate(128))
        );
        assert!(matches!(
            FrameGeometry::from_str("128,abc"),
            Err(ConfigError::InvalidCandidate(_))
        ));
        assert_eq!(
            FrameGeometry::new(vec![u32::MAX]),
            Err(ConfigError::CandidateTooLarge(u32::MAX))
        );
    }
}
