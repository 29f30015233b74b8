//! Core frame types and the playback error taxonomy.
//!
//! Everything here is plain owned data: a frame popped from the queue carries
//! its pixel buffers with it and shares nothing with the decode side.

use std::time::Duration;

use crate::source::MediaKind;

/// Pixel format for decoded video frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUV 4:2:0 planar (the canonical layout for rendering)
    Yuv420p,
    /// NV12 (Y plane + interleaved UV, common for hardware decoders)
    Nv12,
    /// RGB 24-bit
    Rgb24,
    /// RGBA 32-bit
    Rgba,
    /// BGRA 32-bit
    Bgra,
}

impl PixelFormat {
    /// Returns the number of planes for this format.
    pub fn num_planes(&self) -> usize {
        match self {
            PixelFormat::Yuv420p => 3,
            PixelFormat::Nv12 => 2,
            PixelFormat::Rgb24 | PixelFormat::Rgba | PixelFormat::Bgra => 1,
        }
    }

    /// Returns true if this is a YUV-based format.
    pub fn is_yuv(&self) -> bool {
        matches!(self, PixelFormat::Yuv420p | PixelFormat::Nv12)
    }
}

/// A single plane of pixel data.
#[derive(Debug, Clone)]
pub struct Plane {
    /// Raw pixel data
    pub data: Vec<u8>,
    /// Stride (bytes per row, may include padding)
    pub stride: usize,
}

/// A decoded frame in the canonical planar layout.
///
/// Width, height, and strides are fixed at stream-open time by the
/// normalizer. Pixel contents are never mutated after the frame is built.
#[derive(Debug, Clone)]
pub struct CanonicalFrame {
    /// Pixel format of the frame
    pub format: PixelFormat,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Pixel data planes
    pub planes: Vec<Plane>,
}

impl CanonicalFrame {
    /// Creates a new frame from its parts.
    pub fn new(format: PixelFormat, width: u32, height: u32, planes: Vec<Plane>) -> Self {
        Self {
            format,
            width,
            height,
            planes,
        }
    }

    /// Returns the plane at `index`, if present.
    pub fn plane(&self, index: usize) -> Option<&Plane> {
        self.planes.get(index)
    }
}

/// A raw decoder-output frame, before normalization.
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Pixel format as produced by the decoder
    pub format: PixelFormat,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Pixel data planes
    pub planes: Vec<Plane>,
    /// Decoder-native timestamp in stream timebase units.
    /// `None` when the decoder could not attach one.
    pub pts: Option<i64>,
}

/// A normalized frame with presentation timestamp.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Presentation timestamp (when this frame should be displayed),
    /// truncated to whole milliseconds.
    pub pts: Duration,
    /// The normalized frame data
    pub frame: CanonicalFrame,
}

impl VideoFrame {
    /// Creates a new VideoFrame.
    pub fn new(pts: Duration, frame: CanonicalFrame) -> Self {
        Self { pts, frame }
    }

    /// Returns the presentation timestamp in milliseconds.
    pub fn pts_ms(&self) -> u64 {
        self.pts.as_millis() as u64
    }

    /// Returns the frame dimensions.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.frame.width, self.frame.height)
    }
}

/// Errors that can occur while opening or driving playback.
#[derive(Debug, Clone, PartialEq)]
pub enum VideoError {
    /// Failed to open or read from the media source
    Source(String),
    /// The container carries no stream of the requested kind
    NoMatchingStream(MediaKind),
    /// No decoder is available for the stream's codec
    DecoderUnavailable(String),
    /// The pixel conversion context could not be built
    NormalizerInit(String),
    /// A single unit failed to decode; safe to skip
    TransientDecode(String),
    /// Unrecoverable decode failure
    Decode(String),
    /// Allocation failure reported by a collaborator; never retried
    ResourceExhausted(String),
}

impl VideoError {
    /// Returns true if the driver may skip the offending unit and continue.
    pub fn is_transient(&self) -> bool {
        matches!(self, VideoError::TransientDecode(_))
    }
}

impl std::fmt::Display for VideoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VideoError::Source(msg) => write!(f, "source error: {msg}"),
            VideoError::NoMatchingStream(kind) => {
                write!(f, "container has no {kind} stream")
            }
            VideoError::DecoderUnavailable(codec) => {
                write!(f, "no decoder available for codec {codec}")
            }
            VideoError::NormalizerInit(msg) => {
                write!(f, "failed to build pixel conversion context: {msg}")
            }
            VideoError::TransientDecode(msg) => write!(f, "transient decode error: {msg}"),
            VideoError::Decode(msg) => write!(f, "decode failed: {msg}"),
            VideoError::ResourceExhausted(msg) => write!(f, "resource exhausted: {msg}"),
        }
    }
}

impl std::error::Error for VideoError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_format_planes() {
        assert_eq!(PixelFormat::Yuv420p.num_planes(), 3);
        assert_eq!(PixelFormat::Nv12.num_planes(), 2);
        assert_eq!(PixelFormat::Rgba.num_planes(), 1);
        assert!(PixelFormat::Nv12.is_yuv());
        assert!(!PixelFormat::Bgra.is_yuv());
    }

    #[test]
    fn test_video_frame_pts_ms() {
        let frame = CanonicalFrame::new(PixelFormat::Yuv420p, 4, 4, Vec::new());
        let frame = VideoFrame::new(Duration::from_millis(66), frame);
        assert_eq!(frame.pts_ms(), 66);
        assert_eq!(frame.dimensions(), (4, 4));
    }

    #[test]
    fn test_error_classification() {
        assert!(VideoError::TransientDecode("bad unit".into()).is_transient());
        assert!(!VideoError::Decode("broken".into()).is_transient());
        assert!(!VideoError::Source("eof mid-read".into()).is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = VideoError::NoMatchingStream(MediaKind::Video);
        assert_eq!(err.to_string(), "container has no video stream");
    }
}
