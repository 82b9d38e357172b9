//! Input rows.
//!
//! A recording is an ordered, random-access collection of rows, each holding a
//! header blob and a payload blob. Either blob may be absent.
//!
//! Row file layout (all integers little-endian):
//!
//! ```text
//! magic    8 bytes  "EVROWS\0\0"
//! version  u32      1
//! count    u64      number of rows
//! rows     count × { header_len u32, header, payload_len u32, payload }
//! ```
//!
//! A length of `u32::MAX` marks an absent blob.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;

/// Magic bytes at the start of a row file.
pub const ROW_MAGIC: &[u8; 8] = b"EVROWS\0\0";

/// Current row file version.
pub const ROW_VERSION: u32 = 1;

/// Length marker for an absent blob.
const ABSENT_BLOB: u32 = u32::MAX;

/// Errors that can occur while reading rows.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid row file: {0}")]
    InvalidFormat(String),

    #[error("Unexpected end of file")]
    UnexpectedEof,

    #[error("Row {index} out of range ({count} rows)")]
    RowOutOfRange { index: usize, count: usize },
}

/// A borrowed input row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Row<'a> {
    /// Packet header blob
    pub header: Option<&'a [u8]>,
    /// Event payload blob
    pub payload: Option<&'a [u8]>,
}

impl<'a> Row<'a> {
    pub fn new(header: Option<&'a [u8]>, payload: Option<&'a [u8]>) -> Self {
        Self { header, payload }
    }

    /// A row with neither header nor payload.
    pub fn null() -> Self {
        Self::default()
    }

    /// Returns true if the row carries no header and therefore no events.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.header.map_or(true, <[u8]>::is_empty)
    }
}

/// An owned input row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnedRow {
    pub header: Option<Vec<u8>>,
    pub payload: Option<Vec<u8>>,
}

impl OwnedRow {
    pub fn new(header: Option<Vec<u8>>, payload: Option<Vec<u8>>) -> Self {
        Self { header, payload }
    }

    pub fn null() -> Self {
        Self::default()
    }

    /// Borrows this row.
    pub fn as_row(&self) -> Row<'_> {
        Row {
            header: self.header.as_deref(),
            payload: self.payload.as_deref(),
        }
    }
}

impl<'a> From<Row<'a>> for OwnedRow {
    fn from(row: Row<'a>) -> Self {
        Self {
            header: row.header.map(<[u8]>::to_vec),
            payload: row.payload.map(<[u8]>::to_vec),
        }
    }
}

/// Ordered, random-access supply of rows with a known count.
pub trait RowSource {
    /// Number of rows.
    fn row_count(&self) -> usize;

    /// Returns row `index`.
    fn row(&self, index: usize) -> Result<Row<'_>, SourceError>;
}

impl RowSource for [OwnedRow] {
    fn row_count(&self) -> usize {
        self.len()
    }

    fn row(&self, index: usize) -> Result<Row<'_>, SourceError> {
        self.get(index)
            .map(OwnedRow::as_row)
            .ok_or(SourceError::RowOutOfRange {
                index,
                count: self.len(),
            })
    }
}

impl RowSource for Vec<OwnedRow> {
    fn row_count(&self) -> usize {
        self.as_slice().row_count()
    }

    fn row(&self, index: usize) -> Result<Row<'_>, SourceError> {
        self.as_slice().row(index)
    }
}

/// Rows loaded from a row file.
#[derive(Debug, Clone, Default)]
pub struct RowFile {
    rows: Vec<OwnedRow>,
}

impl RowFile {
    /// Reads a row file from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file))
    }

    /// Reads a row file from any reader.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, SourceError> {
        let mut magic = [0u8; 8];
        read_exact(&mut reader, &mut magic)?;
        if &magic != ROW_MAGIC {
            return Err(SourceError::InvalidFormat("bad magic".to_string()));
        }

        let version = reader.read_u32::<LittleEndian>().map_err(eof)?;
        if version != ROW_VERSION {
            return Err(SourceError::InvalidFormat(format!(
                "unsupported version {}",
                version
            )));
        }

        let count = reader.read_u64::<LittleEndian>().map_err(eof)?;
        let count = usize::try_from(count)
            .map_err(|_| SourceError::InvalidFormat(format!("row count {} too large", count)))?;

        // The count is untrusted, so grow the vector as rows arrive.
        let mut rows = Vec::new();
        for _ in 0..count {
            let header = read_blob(&mut reader)?;
            let payload = read_blob(&mut reader)?;
            rows.push(OwnedRow { header, payload });
        }

        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[OwnedRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<OwnedRow> {
        self.rows
    }
}

impl RowSource for RowFile {
    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn row(&self, index: usize) -> Result<Row<'_>, SourceError> {
        self.rows.row(index)
    }
}

impl From<Vec<OwnedRow>> for RowFile {
    fn from(rows: Vec<OwnedRow>) -> Self {
        Self { rows }
    }
}

fn eof(err: io::Error) -> SourceError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        SourceError::UnexpectedEof
    } else {
        SourceError::Io(err)
    }
}

fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), SourceError> {
    reader.read_exact(buf).map_err(eof)
}

fn read_blob<R: Read>(reader: &mut R) -> Result<Option<Vec<u8>>, SourceError> {
    let len = reader.read_u32::<LittleEndian>().map_err(eof)?;
    if len == ABSENT_BLOB {
        return Ok(None);
    }

    let mut blob = Vec::new();
    reader.by_ref().take(len as u64).read_to_end(&mut blob)?;
    if blob.len() != len as usize {
        return Err(SourceError::UnexpectedEof);
    }
    Ok(Some(blob))
}

/// Writer for the row file format.
pub struct RowFileWriter<W: Write> {
    writer: BufWriter<W>,
    expected: u64,
    written: u64,
}

impl<W: Write> RowFileWriter<W> {
    /// Creates a writer for exactly `row_count` rows and writes the header.
    pub fn new(writer: W, row_count: u64) -> Result<Self, SourceError> {
        let mut writer = BufWriter::new(writer);
        writer.write_all(ROW_MAGIC)?;
        writer.write_u32::<LittleEndian>(ROW_VERSION)?;
        writer.write_u64::<LittleEndian>(row_count)?;
        Ok(Self {
            writer,
            expected: row_count,
            written: 0,
        })
    }

    /// Writes one row.
    pub fn write_row(&mut self, row: Row<'_>) -> Result<(), SourceError> {
        if self.written == self.expected {
            return Err(SourceError::InvalidFormat(format!(
                "more than {} rows written",
                self.expected
            )));
        }
        self.write_blob(row.header)?;
        self.write_blob(row.payload)?;
        self.written += 1;
        Ok(())
    }

    fn write_blob(&mut self, blob: Option<&[u8]>) -> Result<(), SourceError> {
        match blob {
            None => self.writer.write_u32::<LittleEndian>(ABSENT_BLOB)?,
            Some(bytes) => {
                let len = u32::try_from(bytes.len())
                    .ok()
                    .filter(|&len| len != ABSENT_BLOB)
                    .ok_or_else(|| {
                        SourceError::InvalidFormat(format!("blob of {} bytes too large", bytes.len()))
                    })?;
                self.writer.write_u32::<LittleEndian>(len)?;
                self.writer.write_all(bytes)?;
            }
        }
        Ok(())
    }

    /// Checks the row count and flushes.
    pub fn finish(mut self) -> Result<(), SourceError> {
        if self.written != self.expected {
            return Err(SourceError::InvalidFormat(format!(
                "declared {} rows, wrote {}",
                self.expected, self.written
            )));
        }
        self.writer.flush()?;
        Ok(())
    }
}

/// Writes `rows` to a row file.
pub fn write_row_file<P: AsRef<Path>>(path: P, rows: &[OwnedRow]) -> Result<(), SourceError> {
    let file = File::create(path)?;
    let mut writer = RowFileWriter::new(file, rows.len() as u64)?;
    for row in rows {
        writer.write_row(row.as_row())?;
    }
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_rows() {
        assert!(Row::null().is_null());
        assert!(Row::new(Some(&[][..]), Some(&[1u8, 2, 3][..])).is_null());
        assert!(!Row::new(Some(&[1u8, 0, 0, 0, 8, 0, 0, 0][..]), None).is_null());
    }

    #[test]
    fn test_slice_source() {
        let rows = vec![
            OwnedRow::new(Some(vec![1; 8]), Some(vec![0; 8])),
            OwnedRow::null(),
        ];
        assert_eq!(rows.row_count(), 2);
        assert_eq!(rows.row(0).unwrap().payload, Some(&[0u8; 8][..]));
        assert!(rows.row(1).unwrap().is_null());
        assert!(matches!(
            rows.row(2),
            Err(SourceError::RowOutOfRange { index: 2, count: 2 })
        ));
    }

    #[test]
    fn test_row_file_preserves_absent_and_empty_blobs() {
        let rows = vec![
            OwnedRow::new(Some(vec![1, 0, 0, 0, 8, 0, 0, 0]), Some(vec![7; 16])),
            OwnedRow::new(Some(vec![0; 8]), Some(Vec::new())),
            OwnedRow::new(Some(vec![0; 8]), None),
            OwnedRow::null(),
        ];

        let mut bytes = Vec::new();
        let mut writer = RowFileWriter::new(&mut bytes, rows.len() as u64).unwrap();
        for row in &rows {
            writer.write_row(row.as_row()).unwrap();
        }
        writer.finish().unwrap();

        let file = RowFile::from_reader(&bytes[..]).unwrap();
        assert_eq!(file.rows(), &rows[..]);
    }

    #[test]
    fn test_row_file_truncated() {
        let mut bytes = Vec::new();
        let mut writer = RowFileWriter::new(&mut bytes, 1).unwrap();
        writer
            .write_row(Row::new(Some(&[1u8; 8][..]), Some(&[0u8; 16][..])))
            .unwrap();
        writer.finish().unwrap();
        bytes.truncate(bytes.len() - 4);

        assert!(matches!(
            RowFile::from_reader(&bytes[..]),
            Err(SourceError::UnexpectedEof)
        ));
    }

    #[test]
    fn test_row_file_bad_magic() {
        let bytes = b"NOTROWS\0\x01\0\0\0\0\0\0\0\0\0\0\0".to_vec();
        assert!(matches!(
            RowFile::from_reader(&bytes[..]),
            Err(SourceError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_row_file_writer_checks_count() {
        let mut bytes = Vec::new();
        let writer = RowFileWriter::new(&mut bytes, 2).unwrap();
        assert!(writer.finish().is_err());
    }
}
