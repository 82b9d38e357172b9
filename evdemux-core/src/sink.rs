//! Output stream sinks.
//!
//! A sink owns one append-only stream per [`EventCategory`]. Every stream is a
//! rows × width byte matrix whose width is fixed by the first
//! [`StreamSink::ensure_stream`] call and never changes afterwards.
//!
//! Two sinks are provided: [`MemorySink`], which keeps each stream in a
//! growable buffer, and [`DirectorySink`], which writes one stream file per
//! category.
//!
//! Stream file layout (all integers little-endian):
//!
//! ```text
//! magic    8 bytes  "EVSTRM\0\0"
//! version  u32      1
//! width    u32      record width in bytes
//! flags    u32      bit 0 set once the width is established
//! rows     u64      number of records
//! data     rows * width bytes
//! ```

use crate::types::{CategoryMap, EventBatch, EventCategory};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Magic bytes at the start of a stream file.
pub const STREAM_MAGIC: &[u8; 8] = b"EVSTRM\0\0";

/// Current stream file version.
pub const STREAM_VERSION: u32 = 2;

/// Byte offset of the width field in a stream file header.
const WIDTH_OFFSET: u64 = 12;

/// Header flag: the stream width has been established.
const FLAG_WIDTH_ESTABLISHED: u32 = 1;

/// Errors raised by an output sink.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Width conflict in {category} stream: established {established}, requested {requested}")]
    WidthConflict {
        category: EventCategory,
        established: u32,
        requested: u32,
    },

    #[error("Stream {0} was appended to before it was created")]
    NotCreated(EventCategory),

    #[error("Stream {0} is already closed")]
    Closed(EventCategory),

    #[error("Invalid stream file: {0}")]
    InvalidFormat(String),
}

/// Destination for fixed-width event batches, one stream per category.
pub trait StreamSink {
    /// Fixes the category's stream width on first use; later calls must pass
    /// the same width.
    fn ensure_stream(&mut self, category: EventCategory, width: u32) -> Result<(), StreamError>;

    /// Appends every record of `batch` to the category's stream.
    fn append(&mut self, category: EventCategory, batch: &EventBatch<'_>) -> Result<(), StreamError>;

    /// Flushes all streams. Called once after the last row.
    fn finish(&mut self) -> Result<(), StreamError> {
        Ok(())
    }
}

/// Width and length bookkeeping for one stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamIndex {
    width: Option<u32>,
    rows: u64,
}

impl StreamIndex {
    /// Record width, once established.
    pub fn width(&self) -> Option<u32> {
        self.width
    }

    /// Number of records appended so far.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    fn ensure(&mut self, category: EventCategory, width: u32) -> Result<bool, StreamError> {
        match self.width {
            None => {
                self.width = Some(width);
                Ok(true)
            }
            Some(established) if established == width => Ok(false),
            Some(established) => Err(StreamError::WidthConflict {
                category,
                established,
                requested: width,
            }),
        }
    }

    fn grow(&mut self, category: EventCategory, batch: &EventBatch<'_>) -> Result<(), StreamError> {
        let established = self.width.ok_or(StreamError::NotCreated(category))?;
        if !batch.is_empty() && batch.width() != established {
            return Err(StreamError::WidthConflict {
                category,
                established,
                requested: batch.width(),
            });
        }
        self.rows += batch.len() as u64;
        Ok(())
    }
}

/// In-memory stream: an index plus one contiguous buffer of records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputStream {
    index: StreamIndex,
    data: Vec<u8>,
}

impl OutputStream {
    /// Record width, once established.
    pub fn width(&self) -> Option<u32> {
        self.index.width
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.index.rows as usize
    }

    pub fn is_empty(&self) -> bool {
        self.index.rows == 0
    }

    /// All records as one contiguous byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the stream and returns its record bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Returns record `index`.
    pub fn row(&self, index: usize) -> Option<&[u8]> {
        let width = self.index.width? as usize;
        let start = index.checked_mul(width)?;
        let end = start.checked_add(width)?;
        self.data.get(start..end)
    }

    /// Iterates over all records.
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        let width = self.index.width.unwrap_or(0) as usize;
        self.data.chunks_exact(width.max(1))
    }
}

/// Sink that keeps every stream in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    streams: CategoryMap<OutputStream>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stream for `category`.
    pub fn stream(&self, category: EventCategory) -> &OutputStream {
        &self.streams[category]
    }

    /// Consumes the sink and returns all streams.
    pub fn into_streams(self) -> CategoryMap<OutputStream> {
        self.streams
    }
}

impl StreamSink for MemorySink {
    fn ensure_stream(&mut self, category: EventCategory, width: u32) -> Result<(), StreamError> {
        if self.streams[category].index.ensure(category, width)? {
            debug!(stream = %category, width, "created stream");
        }
        Ok(())
    }

    fn append(&mut self, category: EventCategory, batch: &EventBatch<'_>) -> Result<(), StreamError> {
        let stream = &mut self.streams[category];
        stream.index.grow(category, batch)?;
        stream.data.extend_from_slice(batch.as_bytes());
        Ok(())
    }
}

/// Stream file being written by a [`DirectorySink`].
struct StreamFile {
    index: StreamIndex,
    writer: BufWriter<File>,
}

/// Sink that writes `<dir>/<stream>.bin` for every category.
///
/// All four files are created up front; widths and row counts are patched
/// into the headers by [`StreamSink::finish`].
pub struct DirectorySink {
    dir: PathBuf,
    streams: CategoryMap<Option<StreamFile>>,
}

impl DirectorySink {
    /// Creates `dir` if needed and one empty stream file per category.
    pub fn create<P: AsRef<Path>>(dir: P) -> Result<Self, StreamError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let mut streams = CategoryMap::default();
        for category in EventCategory::ALL {
            let file = File::create(stream_path(&dir, category))?;
            let mut writer = BufWriter::new(file);
            write_stream_header(&mut writer, None, 0)?;
            streams[category] = Some(StreamFile {
                index: StreamIndex::default(),
                writer,
            });
        }

        Ok(Self { dir, streams })
    }

    /// Output directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `category`'s stream.
    pub fn path(&self, category: EventCategory) -> PathBuf {
        stream_path(&self.dir, category)
    }

    fn stream_mut(&mut self, category: EventCategory) -> Result<&mut StreamFile, StreamError> {
        self.streams[category]
            .as_mut()
            .ok_or(StreamError::Closed(category))
    }
}

impl StreamSink for DirectorySink {
    fn ensure_stream(&mut self, category: EventCategory, width: u32) -> Result<(), StreamError> {
        if self.stream_mut(category)?.index.ensure(category, width)? {
            debug!(stream = %category, width, "created stream");
        }
        Ok(())
    }

    fn append(&mut self, category: EventCategory, batch: &EventBatch<'_>) -> Result<(), StreamError> {
        let stream = self.stream_mut(category)?;
        stream.index.grow(category, batch)?;
        stream.writer.write_all(batch.as_bytes())?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), StreamError> {
        for (category, slot) in self.streams.iter_mut() {
            let Some(mut stream) = slot.take() else {
                continue;
            };

            stream.writer.seek(SeekFrom::Start(WIDTH_OFFSET))?;
            write_stream_shape(&mut stream.writer, stream.index.width, stream.index.rows)?;
            stream.writer.flush()?;

            debug!(stream = %category, rows = stream.index.rows, "closed stream file");
        }
        Ok(())
    }
}

/// Path of `category`'s stream file inside `dir`.
pub fn stream_path(dir: &Path, category: EventCategory) -> PathBuf {
    dir.join(format!("{}.bin", category.stream_name()))
}

fn write_stream_header<W: Write>(
    writer: &mut W,
    width: Option<u32>,
    rows: u64,
) -> std::io::Result<()> {
    writer.write_all(STREAM_MAGIC)?;
    writer.write_u32::<LittleEndian>(STREAM_VERSION)?;
    write_stream_shape(writer, width, rows)
}

/// Writes the width, flags and row count fields.
fn write_stream_shape<W: Write>(writer: &mut W, width: Option<u32>, rows: u64) -> std::io::Result<()> {
    let flags = if width.is_some() { FLAG_WIDTH_ESTABLISHED } else { 0 };
    writer.write_u32::<LittleEndian>(width.unwrap_or(0))?;
    writer.write_u32::<LittleEndian>(flags)?;
    writer.write_u64::<LittleEndian>(rows)?;
    Ok(())
}

/// Reads a stream file written by [`DirectorySink`].
pub fn read_stream_file<P: AsRef<Path>>(path: P) -> Result<OutputStream, StreamError> {
    let file = File::open(path.as_ref())?;
    read_stream(BufReader::new(file))
}

/// Reads a stream from any reader positioned at a stream file header.
pub fn read_stream<R: Read>(mut reader: R) -> Result<OutputStream, StreamError> {
    let mut magic = [0u8; 8];
    reader.read_exact(&mut magic)?;
    if &magic != STREAM_MAGIC {
        return Err(StreamError::InvalidFormat("bad magic".to_string()));
    }

    let version = reader.read_u32::<LittleEndian>()?;
    if version != STREAM_VERSION {
        return Err(StreamError::InvalidFormat(format!(
            "unsupported version {}",
            version
        )));
    }

    let width = reader.read_u32::<LittleEndian>()?;
    let flags = reader.read_u32::<LittleEndian>()?;
    let rows = reader.read_u64::<LittleEndian>()?;
    let established = flags & FLAG_WIDTH_ESTABLISHED != 0;
    if !established && (width != 0 || rows != 0) {
        return Err(StreamError::InvalidFormat(
            "rows present without an established width".to_string(),
        ));
    }
    let expected = rows
        .checked_mul(width as u64)
        .ok_or_else(|| StreamError::InvalidFormat("stream size overflows".to_string()))?;

    let mut data = Vec::new();
    reader.take(expected).read_to_end(&mut data)?;
    if data.len() as u64 != expected {
        return Err(StreamError::InvalidFormat(format!(
            "expected {} data bytes, found {}",
            expected,
            data.len()
        )));
    }

    Ok(OutputStream {
        index: StreamIndex {
            width: established.then_some(width),
            rows,
        },
        data,
    })
}
