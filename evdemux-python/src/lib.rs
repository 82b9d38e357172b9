//! Python bindings for the evdemux transcoder with numpy stream arrays.
//!
//! Each output stream is exposed as a 2-D `uint8` numpy array of shape
//! `(events, width)`.

use evdemux_core::{
    EventCategory, FrameGeometry, MemorySink, OutputStream, OwnedRow, RowErrorKind, RowFile,
    TranscodeConfig, TranscodeStats, Transcoder,
};
use numpy::{IntoPyArray, PyArray2};
use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyBytes, PyDict};
use std::str::FromStr;

/// One demultiplexed event stream.
#[pyclass]
pub struct Stream {
    /// Stream name ("special", "polarity", "frame", "imu6")
    name: &'static str,
    /// Record width in bytes, 0 if never established
    width: u32,
    /// Number of records
    rows: usize,
    /// Record bytes, row-major
    data: Vec<u8>,
}

#[pymethods]
impl Stream {
    /// Returns the number of events.
    fn __len__(&self) -> usize {
        self.rows
    }

    /// Returns a string representation.
    fn __repr__(&self) -> String {
        format!(
            "Stream(name={:?}, events={}, width={})",
            self.name, self.rows, self.width
        )
    }

    /// Returns the stream name.
    #[getter]
    fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the record width in bytes.
    #[getter]
    fn width(&self) -> u32 {
        self.width
    }

    /// Returns the events as a (events, width) uint8 numpy array.
    #[getter]
    fn data<'py>(&self, py: Python<'py>) -> PyResult<&'py PyArray2<u8>> {
        self.data
            .clone()
            .into_pyarray(py)
            .reshape([self.rows, self.width as usize])
    }
}

impl Stream {
    fn from_output(category: EventCategory, stream: OutputStream) -> Self {
        let width = stream.width().unwrap_or(0);
        let rows = stream.len();
        Self {
            name: category.stream_name(),
            width,
            rows,
            data: stream.into_bytes(),
        }
    }
}

/// Result of a transcode: four streams and the run statistics.
#[pyclass]
pub struct TranscodeResult {
    #[pyo3(get)]
    special: Py<Stream>,
    #[pyo3(get)]
    polarity: Py<Stream>,
    #[pyo3(get)]
    frame: Py<Stream>,
    #[pyo3(get)]
    imu6: Py<Stream>,
    stats: TranscodeStats,
}

#[pymethods]
impl TranscodeResult {
    /// Returns the run statistics as a dictionary.
    ///
    /// Keys: total_rows, null_rows, width_mismatches, rejected_rows,
    /// rows/events per stream, and one rejected_* entry per error kind.
    fn stats<'py>(&self, py: Python<'py>) -> PyResult<&'py PyDict> {
        let dict = PyDict::new(py);
        dict.set_item("total_rows", self.stats.total_rows)?;
        dict.set_item("null_rows", self.stats.null_rows)?;
        dict.set_item("width_mismatches", self.stats.width_mismatches)?;
        dict.set_item("rejected_rows", self.stats.rejected_rows())?;

        for (category, tally) in self.stats.categories.iter() {
            let name = category.stream_name();
            dict.set_item(format!("{}_rows", name), tally.rows)?;
            dict.set_item(format!("{}_events", name), tally.events)?;
        }

        for kind in RowErrorKind::ALL {
            let key = format!("rejected_{}", kind.label().replace(' ', "_"));
            dict.set_item(key, self.stats.rejected(kind))?;
        }
        Ok(dict)
    }

    /// Returns all streams as a dictionary keyed by stream name.
    fn streams<'py>(&self, py: Python<'py>) -> PyResult<&'py PyDict> {
        let dict = PyDict::new(py);
        dict.set_item("special", self.special.clone_ref(py))?;
        dict.set_item("polarity", self.polarity.clone_ref(py))?;
        dict.set_item("frame", self.frame.clone_ref(py))?;
        dict.set_item("imu6", self.imu6.clone_ref(py))?;
        Ok(dict)
    }
}

fn build_result(
    py: Python<'_>,
    sink: MemorySink,
    stats: TranscodeStats,
) -> PyResult<TranscodeResult> {
    let mut streams = sink.into_streams();
    let mut take = |category: EventCategory| {
        Py::new(
            py,
            Stream::from_output(category, std::mem::take(&mut streams[category])),
        )
    };

    Ok(TranscodeResult {
        special: take(EventCategory::Special)?,
        polarity: take(EventCategory::Polarity)?,
        frame: take(EventCategory::Frame)?,
        imu6: take(EventCategory::Imu6)?,
        stats,
    })
}

fn config_from(frame_widths: Option<&str>) -> PyResult<TranscodeConfig> {
    let mut config = TranscodeConfig::default();
    if let Some(widths) = frame_widths {
        let geometry = FrameGeometry::from_str(widths)
            .map_err(|e| PyValueError::new_err(format!("Invalid frame widths: {}", e)))?;
        config = config.with_frame_geometry(geometry);
    }
    Ok(config)
}

/// Transcodes in-memory rows.
///
/// Args:
///     rows: list of (header, payload) tuples; either may be None
///     frame_widths: optional candidate list such as "128,240,346"
///
/// Returns:
///     TranscodeResult: streams and statistics
///
/// Example:
///     >>> import evdemux
///     >>> result = evdemux.transcode_rows([(header, payload)])
///     >>> result.polarity.data.shape
///     (3, 8)
#[pyfunction]
#[pyo3(signature = (rows, frame_widths=None))]
fn transcode_rows(
    py: Python<'_>,
    rows: Vec<(Option<&PyBytes>, Option<&PyBytes>)>,
    frame_widths: Option<&str>,
) -> PyResult<Py<TranscodeResult>> {
    let config = config_from(frame_widths)?;
    let rows: Vec<OwnedRow> = rows
        .into_iter()
        .map(|(header, payload)| {
            OwnedRow::new(
                header.map(|h| h.as_bytes().to_vec()),
                payload.map(|p| p.as_bytes().to_vec()),
            )
        })
        .collect();

    let mut sink = MemorySink::new();
    let stats = Transcoder::with_config(config)
        .run(&rows, &mut sink)
        .map_err(|e| PyIOError::new_err(format!("Failed to transcode rows: {}", e)))?;

    Py::new(py, build_result(py, sink, stats)?)
}

/// Transcodes a row file.
///
/// Args:
///     path: Path to the row file
///     frame_widths: optional candidate list such as "128,240,346"
///
/// Returns:
///     TranscodeResult: streams and statistics
#[pyfunction]
#[pyo3(signature = (path, frame_widths=None))]
fn transcode_file(
    py: Python<'_>,
    path: &str,
    frame_widths: Option<&str>,
) -> PyResult<Py<TranscodeResult>> {
    let config = config_from(frame_widths)?;
    let source = RowFile::open(path)
        .map_err(|e| PyIOError::new_err(format!("Failed to read row file: {}", e)))?;

    let mut sink = MemorySink::new();
    let stats = Transcoder::with_config(config)
        .run(&source, &mut sink)
        .map_err(|e| PyIOError::new_err(format!("Failed to transcode file: {}", e)))?;

    Py::new(py, build_result(py, sink, stats)?)
}

/// evdemux module for Python.
#[pymodule]
fn _evdemux(_py: Python<'_>, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(transcode_rows, m)?)?;
    m.add_function(wrap_pyfunction!(transcode_file, m)?)?;
    m.add_class::<Stream>()?;
    m.add_class::<TranscodeResult>()?;
    Ok(())
}
