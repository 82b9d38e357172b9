//! Per-category record width normalization.
//!
//! Recordings do not encode event sizes consistently: special and polarity
//! packets sometimes declare sizes other than their fixed 8 bytes, and frame
//! packets declare the size of a whole frame including its sub-header. The
//! normalizer turns a declared size into the width actually used to split the
//! payload and keeps every category on a single width for the whole run.

use crate::config::FrameGeometry;
use crate::error::RowError;
use crate::types::{CategoryMap, EventCategory, PacketHeader, FIXED_EVENT_WIDTH};

/// A declared width that disagreed with its category's fixed width.
///
/// Informational only; the fixed width is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WidthMismatch {
    pub category: EventCategory,
    pub declared: u32,
    pub fixed: u32,
}

/// Outcome of normalizing one row header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Normalized {
    /// Width used to split the row payload
    pub width: u32,
    /// Set when the declared width was overridden by a fixed width
    pub mismatch: Option<WidthMismatch>,
}

/// Computes authoritative record widths and tracks the width established for
/// each category.
#[derive(Debug, Clone, Default)]
pub struct WidthNormalizer {
    geometry: FrameGeometry,
    established: CategoryMap<Option<u32>>,
}

impl WidthNormalizer {
    pub fn new(geometry: FrameGeometry) -> Self {
        Self {
            geometry,
            established: CategoryMap::default(),
        }
    }

    /// Computes the width for a single header without looking at earlier rows.
    pub fn compute(&self, header: PacketHeader) -> Result<Normalized, RowError> {
        let PacketHeader {
            category,
            declared_width,
        } = header;

        match category {
            EventCategory::Special | EventCategory::Polarity => {
                let fixed = FIXED_EVENT_WIDTH;
                let mismatch = (declared_width != fixed).then_some(WidthMismatch {
                    category,
                    declared: declared_width,
                    fixed,
                });
                Ok(Normalized {
                    width: fixed,
                    mismatch,
                })
            }
            EventCategory::Imu6 => Ok(Normalized {
                width: declared_width,
                mismatch: None,
            }),
            EventCategory::Frame => {
                let width = self.geometry.resolve(declared_width).ok_or(
                    RowError::UnrecognizedFrameGeometry {
                        declared: declared_width,
                    },
                )?;
                Ok(Normalized {
                    width,
                    mismatch: None,
                })
            }
        }
    }

    /// Computes the width for a header and checks it against the width already
    /// established for its category.
    pub fn normalize(&self, header: PacketHeader) -> Result<Normalized, RowError> {
        let normalized = self.compute(header)?;

        match self.established[header.category] {
            Some(established) if established != normalized.width => {
                Err(RowError::CategoryWidthDrift {
                    category: header.category,
                    established,
                    computed: normalized.width,
                })
            }
            _ => Ok(normalized),
        }
    }

    /// Records `width` as the category's width if none is established yet.
    ///
    /// Called for every row that passes [`normalize`](Self::normalize), so the
    /// first such row fixes the width even if its payload is later rejected.
    pub fn establish(&mut self, category: EventCategory, width: u32) {
        self.established[category].get_or_insert(width);
    }

    /// Width established for `category`, if any row has been normalized.
    pub fn established_width(&self, category: EventCategory) -> Option<u32> {
        self.established[category]
    }

    pub fn geometry(&self) -> &FrameGeometry {
        &self.geometry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(category: EventCategory, declared_width: u32) -> PacketHeader {
        PacketHeader {
            category,
            declared_width,
        }
    }

    #[test]
    fn test_fixed_width_categories() {
        let normalizer = WidthNormalizer::default();
        for category in [EventCategory::Special, EventCategory::Polarity] {
            let normalized = normalizer.compute(header(category, 8)).unwrap();
            assert_eq!(normalized.width, 8);
            assert_eq!(normalized.mismatch, None);
        }
    }

    #[test]
    fn test_fixed_width_matches_category_table() {
        let normalizer = WidthNormalizer::default();
        for category in EventCategory::ALL {
            if let Some(fixed) = category.fixed_width() {
                let normalized = normalizer.compute(header(category, 3)).unwrap();
                assert_eq!(normalized.width, fixed);
            }
        }
    }

    #[test]
    fn test_fixed_width_mismatch_is_a_warning() {
        let normalizer = WidthNormalizer::default();
        let normalized = normalizer
            .compute(header(EventCategory::Polarity, 16))
            .unwrap();
        assert_eq!(normalized.width, 8);
        assert_eq!(
            normalized.mismatch,
            Some(WidthMismatch {
                category: EventCategory::Polarity,
                declared: 16,
                fixed: 8,
            })
        );
    }

    #[test]
    fn test_imu6_uses_declared_width() {
        let normalizer = WidthNormalizer::default();
        let normalized = normalizer.compute(header(EventCategory::Imu6, 36)).unwrap();
        assert_eq!(normalized.width, 36);
    }

    #[test]
    fn test_frame_width_from_geometry() {
        let normalizer = WidthNormalizer::default();
        for k in 1..32 {
            let declared = 36 + 346 * 2 * k;
            let normalized = normalizer
                .compute(header(EventCategory::Frame, declared))
                .unwrap();
            assert_eq!(normalized.width, 692, "k = {}", k);
        }
    }

    #[test]
    fn test_frame_geometry_ambiguity_follows_candidate_order() {
        // 346 * 2 * 32 is also a multiple of 128.
        let declared = 36 + 346 * 2 * 32;
        let in_order = WidthNormalizer::default();
        assert_eq!(
            in_order.compute(header(EventCategory::Frame, declared)).unwrap().width,
            256
        );

        let largest_first = WidthNormalizer::new(FrameGeometry::new(vec![346, 240, 128]).unwrap());
        assert_eq!(
            largest_first
                .compute(header(EventCategory::Frame, declared))
                .unwrap()
                .width,
            692
        );
    }

    #[test]
    fn test_unrecognized_frame_geometry() {
        let normalizer = WidthNormalizer::default();
        assert_eq!(
            normalizer.compute(header(EventCategory::Frame, 36 + 101)),
            Err(RowError::UnrecognizedFrameGeometry { declared: 137 })
        );
        assert_eq!(
            normalizer.compute(header(EventCategory::Frame, 20)),
            Err(RowError::UnrecognizedFrameGeometry { declared: 20 })
        );
    }

    #[test]
    fn test_drift_after_establish() {
        let mut normalizer = WidthNormalizer::default();
        let first = normalizer.normalize(header(EventCategory::Imu6, 12)).unwrap();
        normalizer.establish(EventCategory::Imu6, first.width);

        assert!(normalizer.normalize(header(EventCategory::Imu6, 12)).is_ok());
        assert_eq!(
            normalizer.normalize(header(EventCategory::Imu6, 16)),
            Err(RowError::CategoryWidthDrift {
                category: EventCategory::Imu6,
                established: 12,
                computed: 16,
            })
        );
        // Other categories are unaffected
        assert!(normalizer.normalize(header(EventCategory::Frame, 36 + 240)).is_ok());
    }

    #[test]
    fn test_polarity_mismatch_never_drifts() {
        let mut normalizer = WidthNormalizer::default();
        normalizer.establish(EventCategory::Polarity, 8);
        let normalized = normalizer
            .normalize(header(EventCategory::Polarity, 12))
            .unwrap();
        assert_eq!(normalized.width, 8);
        assert!(normalized.mismatch.is_some());
    }

    #[test]
    fn test_zero_width_then_nonzero_drifts() {
        let mut normalizer = WidthNormalizer::default();
        normalizer.establish(EventCategory::Imu6, 0);
        assert_eq!(
            normalizer.normalize(header(EventCategory::Imu6, 12)),
            Err(RowError::CategoryWidthDrift {
                category: EventCategory::Imu6,
                established: 0,
                computed: 12,
            })
        );
    }

    #[test]
    fn test_establish_keeps_first_width() {
        let mut normalizer = WidthNormalizer::default();
        normalizer.establish(EventCategory::Imu6, 12);
        normalizer.establish(EventCategory::Imu6, 24);
        assert_eq!(normalizer.established_width(EventCategory::Imu6), Some(12));
        assert_eq!(normalizer.established_width(EventCategory::Frame), None);
    }
}
