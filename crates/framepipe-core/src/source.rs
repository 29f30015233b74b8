//! Demux-side types and the media source seam.
//!
//! A [`MediaSource`] is an already-opened, demultiplexed container: it
//! enumerates its streams and yields interleaved compressed units one at a
//! time. Opening and parsing the container belongs to the collaborator that
//! implements the trait, not to this crate.

use crate::video::{PixelFormat, VideoError};

/// Kind of media carried by a container stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
    Subtitle,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Subtitle => write!(f, "subtitle"),
        }
    }
}

/// Rational conversion factor from decoder-native timestamp units to seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timebase {
    pub num: u32,
    pub den: u32,
}

impl Timebase {
    /// Creates a new timebase. A zero denominator yields a zero factor
    /// rather than dividing by zero downstream.
    pub fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    /// Returns the timebase as a fractional number of seconds per unit.
    pub fn as_secs_f64(&self) -> f64 {
        if self.den == 0 {
            return 0.0;
        }
        self.num as f64 / self.den as f64
    }

    /// Converts a non-negative decoder-native timestamp to milliseconds,
    /// truncated to an integer.
    pub fn to_millis(&self, ts: i64) -> u64 {
        (ts as f64 * self.as_secs_f64() * 1000.0) as u64
    }
}

/// Description of one stream within an opened container.
#[derive(Debug, Clone)]
pub struct StreamInfo {
    /// Index of the stream in the container
    pub index: usize,
    /// Kind of media the stream carries
    pub kind: MediaKind,
    /// Codec name, as reported by the container
    pub codec: String,
    /// Width in pixels (zero for non-video streams)
    pub width: u32,
    /// Height in pixels (zero for non-video streams)
    pub height: u32,
    /// Pixel format declared by the stream
    pub pixel_format: PixelFormat,
    /// Conversion factor for the stream's native timestamps
    pub timebase: Timebase,
}

/// One compressed unit read from the container, tagged with its stream.
#[derive(Debug, Clone)]
pub struct CompressedUnit {
    /// Index of the stream this unit belongs to
    pub stream_index: usize,
    /// Compressed payload, opaque to this crate
    pub data: Vec<u8>,
    /// Container-attached timestamp in stream timebase units, if any
    pub pts: Option<i64>,
}

/// An opened, demultiplexed media container.
pub trait MediaSource {
    /// Streams present in the container, in container order.
    fn streams(&self) -> &[StreamInfo];

    /// Reads the next interleaved unit. `Ok(None)` is end of stream;
    /// units from any stream may appear, not just the selected one.
    fn read_next_unit(&mut self) -> Result<Option<CompressedUnit>, VideoError>;
}
