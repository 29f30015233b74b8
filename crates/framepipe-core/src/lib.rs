//! framepipe-core: decode-loop driver and frame queue for timed presentation.
//!
//! This crate owns the producer/consumer plumbing between a media decoder and
//! a presentation layer. It contains:
//!
//! - Core frame types and errors: [`video`]
//! - Demux-side stream types and the source seam: [`source`]
//! - Decoder and normalizer seams: [`decode`]
//! - Threading primitives: [`frame_queue`]
//! - The playback state machine and decode driver: [`playback`]
//!
//! The crate has **zero codec dependency**. Container parsing, bitstream
//! decoding, and pixel conversion are reached through the traits in
//! [`source`] and [`decode`]; the embedding application supplies the
//! implementations and owns any process-wide library bring-up.

pub mod decode;
pub mod frame_queue;
pub mod playback;
pub mod source;
pub mod video;
