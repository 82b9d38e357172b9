//! Transcode statistics.

use crate::error::RowErrorKind;
use crate::types::{CategoryMap, EventCategory};
use std::fmt;
use std::ops::Index;

/// Rows and events committed to one category's stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryTally {
    /// Rows appended, including rows that contributed no events
    pub rows: u64,
    /// Event records appended
    pub events: u64,
}

/// Rejected rows per [`RowErrorKind`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RejectionTally([u64; RowErrorKind::COUNT]);

impl RejectionTally {
    /// Total number of rejected rows.
    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }

    /// Iterates over `(kind, count)` pairs with a non-zero count.
    pub fn iter(&self) -> impl Iterator<Item = (RowErrorKind, u64)> + '_ {
        RowErrorKind::ALL
            .into_iter()
            .zip(self.0.iter().copied())
            .filter(|&(_, count)| count > 0)
    }
}

impl Index<RowErrorKind> for RejectionTally {
    type Output = u64;

    fn index(&self, kind: RowErrorKind) -> &u64 {
        &self.0[kind.index()]
    }
}

/// Counters for one transcode run.
///
/// Every row lands in exactly one of three buckets: null, committed to a
/// category, or rejected. `total_rows` is the sum of the three.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscodeStats {
    /// Rows seen
    pub total_rows: u64,
    /// Rows without a header
    pub null_rows: u64,
    /// Committed rows and events per category
    pub categories: CategoryMap<CategoryTally>,
    /// Rows whose declared width was overridden by a fixed width
    pub width_mismatches: u64,
    /// Rows dropped, by reason
    pub rejected: RejectionTally,
}

impl TranscodeStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_null(&mut self) {
        self.total_rows += 1;
        self.null_rows += 1;
    }

    pub(crate) fn record_committed(&mut self, category: EventCategory, events: usize) {
        self.total_rows += 1;
        let tally = &mut self.categories[category];
        tally.rows += 1;
        tally.events += events as u64;
    }

    pub(crate) fn record_rejected(&mut self, kind: RowErrorKind) {
        self.total_rows += 1;
        self.rejected.0[kind.index()] += 1;
    }

    pub(crate) fn record_mismatch(&mut self) {
        self.width_mismatches += 1;
    }

    /// Tally for one category.
    pub fn category(&self, category: EventCategory) -> CategoryTally {
        self.categories[category]
    }

    /// Number of rows rejected for `kind`.
    pub fn rejected(&self, kind: RowErrorKind) -> u64 {
        self.rejected[kind]
    }

    /// Total number of rejected rows.
    pub fn rejected_rows(&self) -> u64 {
        self.rejected.total()
    }

    /// Total number of rows committed to any stream.
    pub fn committed_rows(&self) -> u64 {
        self.categories.iter().map(|(_, tally)| tally.rows).sum()
    }

    /// Total number of events committed to any stream.
    pub fn total_events(&self) -> u64 {
        self.categories.iter().map(|(_, tally)| tally.events).sum()
    }

    /// Returns true if no row was rejected.
    pub fn is_clean(&self) -> bool {
        self.rejected_rows() == 0
    }
}

impl fmt::Display for TranscodeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Rows:         {}", self.total_rows)?;
        writeln!(f, "  Null rows:    {}", self.null_rows)?;
        for (category, tally) in self.categories.iter() {
            writeln!(
                f,
                "  {:<13} {} rows, {} events",
                format!("{}:", category),
                tally.rows,
                tally.events
            )?;
        }
        writeln!(f, "  Mismatches:   {}", self.width_mismatches)?;
        write!(f, "  Rejected:     {}", self.rejected_rows())?;
        for (kind, count) in self.rejected.iter() {
            write!(f, "\n    {:<28} {}", kind.label(), count)?;
        }
        Ok(())
    }
}
