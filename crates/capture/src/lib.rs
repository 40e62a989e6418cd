//! Capture and export pipeline for the crossfade engine.
//!
//! Two independent capabilities layered on the same rendered frames:
//!
//! - [`snapshot`] turns a single RGBA frame into a PNG on disk.
//! - [`recorder::RecordingSession`] accumulates raw RGBA frame chunks while
//!   recording and, on stop, either hands the assembled blob to a
//!   [`transcode::Transcoder`] on a worker thread or writes it out directly.
//!
//! The session is polled from the render loop each frame; nothing in this
//! crate blocks the caller.

mod error;
pub mod recorder;
pub mod snapshot;
pub mod transcode;

pub use error::CaptureError;
pub use recorder::{FrameSpec, RawRecording, RecordingSession, RecordingState, ToggleOutcome};
pub use snapshot::{encode_png, write_snapshot};
pub use transcode::{FfmpegTranscoder, Transcoder};
