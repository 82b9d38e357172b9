//! Payload splitting into fixed-width event records.

use crate::error::RowError;
use crate::types::EventBatch;

/// Splits a row payload into whole records of `width` bytes.
///
/// An absent payload or a zero width yields an empty batch. A payload whose
/// length is not a multiple of `width` is rejected rather than truncated.
pub fn split(payload: Option<&[u8]>, width: u32) -> Result<EventBatch<'_>, RowError> {
    let payload = match payload {
        Some(payload) if width != 0 => payload,
        _ => return Ok(EventBatch::empty(width)),
    };

    if payload.len() % width as usize != 0 {
        return Err(RowError::InexactPacketSize {
            len: payload.len(),
            width,
        });
    }

    if payload.is_empty() {
        return Ok(EventBatch::empty(width));
    }

    Ok(EventBatch::new(payload, width))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_exact_multiple() {
        let payload: Vec<u8> = (0..24).collect();
        let batch = split(Some(&payload[..]), 8).unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.width(), 8);
        let records: Vec<&[u8]> = batch.records().collect();
        assert_eq!(records[0], &payload[0..8]);
        assert_eq!(records[2], &payload[16..24]);
    }

    #[test]
    fn test_split_is_deterministic() {
        let payload: Vec<u8> = (0..64).map(|i| (i * 7) as u8).collect();
        let first = split(Some(&payload[..]), 8).unwrap();
        let second = split(Some(&payload[..]), 8).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.as_bytes(), &payload[..]);
    }

    #[test]
    fn test_split_inexact_size() {
        let payload = [0u8; 20];
        assert_eq!(
            split(Some(&payload[..]), 8),
            Err(RowError::InexactPacketSize { len: 20, width: 8 })
        );
    }

    #[test]
    fn test_split_absent_or_empty_payload() {
        assert!(split(None, 8).unwrap().is_empty());
        assert!(split(Some(&[][..]), 8).unwrap().is_empty());
    }

    #[test]
    fn test_split_zero_width() {
        let batch = split(Some(&[1u8, 2, 3][..]), 0).unwrap();
        assert!(batch.is_empty());
        assert_eq!(batch.width(), 0);
    }
}
