//! Decoder and normalizer seams.
//!
//! These traits abstract the codec collaborator so the driver and its tests
//! never touch a real bitstream. Implementations move onto the producer
//! thread with the playback context, hence the `Send` bounds.

use crate::source::{CompressedUnit, StreamInfo};
use crate::video::{CanonicalFrame, RawFrame, VideoError};

/// A decoder bound to one stream's codec.
///
/// A single submitted unit may yield zero, one, or several output frames;
/// internal reordering and buffering are legal. The driver drains all
/// available output between submissions.
pub trait StreamDecoder: Send {
    /// Submits one compressed unit for decoding.
    fn submit(&mut self, unit: CompressedUnit) -> Result<(), VideoError>;

    /// Returns the next decoded frame, or `Ok(None)` when no more output is
    /// available for what has been submitted so far.
    fn receive_frame(&mut self) -> Result<Option<RawFrame>, VideoError>;

    /// Signals end of input. Frames the decoder buffered internally become
    /// available through [`receive_frame`](Self::receive_frame) afterwards.
    fn flush(&mut self) -> Result<(), VideoError>;
}

/// Converts raw decoder output to the canonical planar layout.
pub trait PixelNormalizer: Send {
    fn convert(&mut self, raw: &RawFrame) -> Result<CanonicalFrame, VideoError>;
}

/// Constructs decoders and normalizers for a selected stream.
pub trait MediaBackend {
    type Decoder: StreamDecoder + 'static;
    type Normalizer: PixelNormalizer + 'static;

    /// Finds a decoder for the stream's codec.
    /// Fails with [`VideoError::DecoderUnavailable`] when none exists.
    fn find_decoder(&self, stream: &StreamInfo) -> Result<Self::Decoder, VideoError>;

    /// Builds a conversion context for the stream's declared dimensions and
    /// format. Fails with [`VideoError::NormalizerInit`] when it cannot.
    fn normalizer(&self, stream: &StreamInfo) -> Result<Self::Normalizer, VideoError>;
}
