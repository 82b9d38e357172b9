//! Core types for demultiplexed event data.
//!
//! This module defines the closed set of event categories found in a DVS row
//! recording, the decoded packet header, the category-keyed map used for
//! per-stream state, and the fixed-width event batch handed to a sink.

use std::fmt;
use std::ops::{Index, IndexMut};

/// Minimum number of header bytes needed to classify a row.
pub const HEADER_LEN: usize = 8;

/// Record width in bytes of special and polarity events.
pub const FIXED_EVENT_WIDTH: u32 = 8;

/// Number of event categories.
pub const CATEGORY_COUNT: usize = 4;

/// Event category of a row, decoded from byte 0 of its header.
///
/// Each category owns exactly one output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum EventCategory {
    /// Special events: timestamp wraps, resets, external inputs (0)
    Special = 0,
    /// Polarity (change detection) events (1)
    Polarity = 1,
    /// APS frame events (2)
    Frame = 2,
    /// 6-axis IMU samples (3)
    Imu6 = 3,
}

impl EventCategory {
    /// All categories in code order.
    pub const ALL: [EventCategory; CATEGORY_COUNT] = [
        EventCategory::Special,
        EventCategory::Polarity,
        EventCategory::Frame,
        EventCategory::Imu6,
    ];

    /// Attempts to parse a category from its header code.
    #[inline]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Special),
            1 => Some(Self::Polarity),
            2 => Some(Self::Frame),
            3 => Some(Self::Imu6),
            _ => None,
        }
    }

    /// Position of this category in [`EventCategory::ALL`].
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Name of the output stream that receives this category's events.
    pub fn stream_name(self) -> &'static str {
        match self {
            Self::Special => "special",
            Self::Polarity => "polarity",
            Self::Frame => "frame",
            Self::Imu6 => "imu6",
        }
    }

    /// Returns the record width the category always uses, if it has one.
    pub fn fixed_width(self) -> Option<u32> {
        match self {
            Self::Special | Self::Polarity => Some(FIXED_EVENT_WIDTH),
            Self::Frame | Self::Imu6 => None,
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stream_name())
    }
}

/// Category and declared record width decoded from a row header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Event category of the row
    pub category: EventCategory,
    /// Record width the file claims, in bytes
    pub declared_width: u32,
}

/// A value per event category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryMap<T>([T; CATEGORY_COUNT]);

impl<T> CategoryMap<T> {
    /// Builds a map by calling `f` for every category.
    pub fn from_fn(mut f: impl FnMut(EventCategory) -> T) -> Self {
        Self(std::array::from_fn(|i| f(EventCategory::ALL[i])))
    }

    /// Iterates over `(category, value)` pairs in category order.
    pub fn iter(&self) -> impl Iterator<Item = (EventCategory, &T)> {
        EventCategory::ALL.into_iter().zip(self.0.iter())
    }

    /// Iterates mutably over `(category, value)` pairs in category order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EventCategory, &mut T)> {
        EventCategory::ALL.into_iter().zip(self.0.iter_mut())
    }
}

impl<T> Index<EventCategory> for CategoryMap<T> {
    type Output = T;

    #[inline]
    fn index(&self, category: EventCategory) -> &T {
        &self.0[category.index()]
    }
}

impl<T> IndexMut<EventCategory> for CategoryMap<T> {
    #[inline]
    fn index_mut(&mut self, category: EventCategory) -> &mut T {
        &mut self.0[category.index()]
    }
}

/// Whole number of fixed-width event records taken from one row.
///
/// The batch borrows the row payload; records keep their original byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventBatch<'a> {
    data: &'a [u8],
    width: u32,
}

impl<'a> EventBatch<'a> {
    /// Creates a batch over `data`, which must be a multiple of `width` bytes.
    pub(crate) fn new(data: &'a [u8], width: u32) -> Self {
        debug_assert!(width != 0 && data.len() % width as usize == 0);
        Self { data, width }
    }

    /// Creates a batch with no records.
    pub fn empty(width: u32) -> Self {
        Self { data: &[], width }
    }

    /// Record width in bytes.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Number of records in the batch.
    #[inline]
    pub fn len(&self) -> usize {
        if self.width == 0 {
            0
        } else {
            self.data.len() / self.width as usize
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// All records as one contiguous byte slice.
    #[inline]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// Iterates over the individual records.
    pub fn records(&self) -> std::slice::ChunksExact<'a, u8> {
        // An empty batch may carry width 0.
        self.data.chunks_exact((self.width as usize).max(1))
    }
}
