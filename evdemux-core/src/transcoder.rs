//! Row-by-row transcoding driver.
//!
//! Each row goes through classify → normalize → split → append. A null row
//! short-circuits to the null counter. A row that fails any stage is logged,
//! counted and dropped; the run always continues with the next row. Only
//! I/O failures of the source or the sink end a run early.

use crate::classifier;
use crate::config::TranscodeConfig;
use crate::error::RowError;
use crate::normalizer::{Normalized, WidthNormalizer};
use crate::sink::{StreamError, StreamSink};
use crate::source::{Row, RowSource, SourceError};
use crate::splitter;
use crate::stats::TranscodeStats;
use crate::types::{EventBatch, EventCategory};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Errors that end a transcode run.
#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("Failed to read input: {0}")]
    Source(#[from] SourceError),

    #[error("Failed to write output: {0}")]
    Stream(#[from] StreamError),
}

/// What happened to a single row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    /// Null row, nothing appended
    Skipped,
    /// Row committed to its category's stream
    Appended {
        category: EventCategory,
        width: u32,
        events: usize,
    },
    /// Row dropped
    Rejected(RowError),
}

/// Stateful transcoder.
///
/// Holds the per-category widths established so far and the run statistics.
#[derive(Debug, Clone, Default)]
pub struct Transcoder {
    normalizer: WidthNormalizer,
    stats: TranscodeStats,
}

impl Transcoder {
    /// Creates a transcoder with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TranscodeConfig) -> Self {
        Self {
            normalizer: WidthNormalizer::new(config.frame_geometry),
            stats: TranscodeStats::new(),
        }
    }

    /// Statistics accumulated so far.
    pub fn stats(&self) -> &TranscodeStats {
        &self.stats
    }

    /// Width established for `category` by its first normalized row.
    pub fn established_width(&self, category: EventCategory) -> Option<u32> {
        self.normalizer.established_width(category)
    }

    /// Processes one row, appending its events to `sink`.
    ///
    /// Row content problems are reported through [`RowOutcome::Rejected`];
    /// only sink I/O failures are returned as errors.
    pub fn process_row<S: StreamSink + ?Sized>(
        &mut self,
        row: Row<'_>,
        sink: &mut S,
    ) -> Result<RowOutcome, StreamError> {
        let index = self.stats.total_rows;

        if row.is_null() {
            self.stats.record_null();
            debug!(row = index, "skipped null row");
            return Ok(RowOutcome::Skipped);
        }

        let (category, normalized, batch) = match self.prepare(row, index) {
            Ok(prepared) => prepared,
            Err(err) => return Ok(self.reject(index, err)),
        };

        match sink.ensure_stream(category, normalized.width) {
            Ok(()) => {}
            Err(StreamError::WidthConflict {
                category,
                established,
                requested,
            }) => {
                let err = RowError::CategoryWidthDrift {
                    category,
                    established,
                    computed: requested,
                };
                return Ok(self.reject(index, err));
            }
            Err(err) => return Err(err),
        }

        sink.append(category, &batch)?;
        self.stats.record_committed(category, batch.len());

        debug!(
            row = index,
            %category,
            width = normalized.width,
            events = batch.len(),
            "appended row"
        );

        Ok(RowOutcome::Appended {
            category,
            width: normalized.width,
            events: batch.len(),
        })
    }

    /// Classifies, normalizes and splits a non-null row.
    fn prepare<'a>(
        &mut self,
        row: Row<'a>,
        index: u64,
    ) -> Result<(EventCategory, Normalized, EventBatch<'a>), RowError> {
        let header = classifier::classify(row.header)?;
        let normalized = self.normalizer.normalize(header)?;
        self.normalizer.establish(header.category, normalized.width);

        if let Some(mismatch) = normalized.mismatch {
            self.stats.record_mismatch();
            warn!(
                row = index,
                category = %mismatch.category,
                declared = mismatch.declared,
                fixed = mismatch.fixed,
                "declared width differs from fixed width, using fixed width"
            );
        }

        let batch = splitter::split(row.payload, normalized.width)?;
        Ok((header.category, normalized, batch))
    }

    fn reject(&mut self, index: u64, err: RowError) -> RowOutcome {
        self.stats.record_rejected(err.kind());
        match err {
            RowError::CategoryWidthDrift { .. } => error!(row = index, "dropped row: {}", err),
            _ => warn!(row = index, "dropped row: {}", err),
        }
        RowOutcome::Rejected(err)
    }

    /// Finishes the run: flushes the sink and returns the final statistics.
    pub fn finish<S: StreamSink + ?Sized>(self, sink: &mut S) -> Result<TranscodeStats, StreamError> {
        sink.finish()?;

        let stats = self.stats;
        info!(
            rows = stats.total_rows,
            null = stats.null_rows,
            events = stats.total_events(),
            rejected = stats.rejected_rows(),
            "transcode finished"
        );
        Ok(stats)
    }

    /// Processes every row of `source` in order, then finishes the run.
    pub fn run<R, S>(mut self, source: &R, sink: &mut S) -> Result<TranscodeStats, TranscodeError>
    where
        R: RowSource + ?Sized,
        S: StreamSink + ?Sized,
    {
        let count = source.row_count();
        debug!(rows = count, "starting transcode");

        for index in 0..count {
            let row = source.row(index)?;
            self.process_row(row, sink)?;
        }

        Ok(self.finish(sink)?)
    }
}

/// Transcodes `source` into `sink` with the default configuration.
pub fn transcode<R, S>(source: &R, sink: &mut S) -> Result<TranscodeStats, TranscodeError>
where
    R: RowSource + ?Sized,
    S: StreamSink + ?Sized,
{
    Transcoder::new().run(source, sink)
}
