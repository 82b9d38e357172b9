//! Event demultiplexing transcoder for DVS row recordings.
//!
//! This crate splits a recording stored as variable-length binary rows (one
//! AEDAT 3.1 packet per row) into four independent fixed-width streams, one
//! per event category: special, polarity, frame and IMU6. Declared event sizes
//! in such recordings are not always consistent, so every row's record width
//! is normalized per category before its payload is split into events.
//!
//! # Example
//!
//! ```no_run
//! use evdemux_core::{transcode, DirectorySink, RowFile, EventCategory};
//!
//! let rows = RowFile::open("recording.rows").unwrap();
//! let mut sink = DirectorySink::create("streams").unwrap();
//! let stats = transcode(&rows, &mut sink).unwrap();
//!
//! println!("{} rows", stats.total_rows);
//! println!("{} polarity events", stats.category(EventCategory::Polarity).events);
//! ```
//!
//! # Features
//!
//! - Closed category set with exhaustive dispatch
//! - Configurable frame geometry heuristic
//! - Per-category width consistency for the whole run
//! - Bad rows are counted and skipped, never fatal
//! - In-memory and file-backed output sinks

pub mod classifier;
pub mod config;
pub mod error;
pub mod normalizer;
pub mod sink;
pub mod source;
pub mod splitter;
pub mod stats;
pub mod transcoder;
pub mod types;

// Re-export commonly used types
pub use config::{ConfigError, FrameGeometry, TranscodeConfig};
pub use error::{RowError, RowErrorKind};
pub use normalizer::{WidthMismatch, WidthNormalizer};
pub use sink::{DirectorySink, MemorySink, OutputStream, StreamError, StreamSink};
pub use source::{OwnedRow, Row, RowFile, RowSource, SourceError};
pub use stats::{CategoryTally, TranscodeStats};
pub use transcoder::{transcode, RowOutcome, TranscodeError, Transcoder};
pub use types::{CategoryMap, EventBatch, EventCategory, PacketHeader};
