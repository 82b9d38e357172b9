//! Row header classification.
//!
//! A row header starts with the first eight bytes of an AEDAT 3.1 packet
//! header:
//!
//! ```text
//! byte  0      category code (0 special, 1 polarity, 2 frame, 3 imu6)
//! bytes 1..4   source id and flags, ignored
//! bytes 4..8   declared event size, u32 little-endian
//! ```
//!
//! Longer headers are accepted; trailing bytes are not interpreted.

use crate::error::RowError;
use crate::types::{EventCategory, PacketHeader, HEADER_LEN};
use byteorder::{ByteOrder, LittleEndian};

/// Offset of the category code.
pub const CATEGORY_OFFSET: usize = 0;

/// Offset of the declared event size.
pub const DECLARED_WIDTH_OFFSET: usize = 4;

/// Extracts the raw category code from a header of at least [`HEADER_LEN`] bytes.
#[inline]
pub(crate) fn get_category_code(header: &[u8]) -> u8 {
    header[CATEGORY_OFFSET]
}

/// Extracts the declared event size from a header of at least [`HEADER_LEN`] bytes.
#[inline]
pub(crate) fn get_declared_width(header: &[u8]) -> u32 {
    LittleEndian::read_u32(&header[DECLARED_WIDTH_OFFSET..HEADER_LEN])
}

/// Decodes a row header into its category and declared record width.
pub fn classify(header: Option<&[u8]>) -> Result<PacketHeader, RowError> {
    let header = header.unwrap_or_default();
    if header.len() < HEADER_LEN {
        return Err(RowError::MalformedHeader { len: header.len() });
    }

    let code = get_category_code(header);
    let category = EventCategory::from_u8(code).ok_or(RowError::UnknownCategory(code))?;

    Ok(PacketHeader {
        category,
        declared_width: get_declared_width(header),
    })
}
