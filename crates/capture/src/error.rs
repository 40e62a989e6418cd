use std::path::PathBuf;

/// Errors surfaced by the capture pipeline. All of them are recoverable:
/// the render loop keeps running and the recording state machine reverts to
/// `Idle` or `Failed`.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("recording already in progress")]
    AlreadyRecording,
    #[error("no recording in progress")]
    NotRecording,
    #[error("previous recording is still finalizing")]
    Finalizing,
    #[error("frame buffer size mismatch: {width}x{height} needs {expected} bytes, got {actual}")]
    FrameSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("transcode failed: {message}")]
    Transcode { message: String },
    #[error("failed to write capture output {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Encode(#[from] image::ImageError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CaptureError {
    pub fn transcode(message: impl Into<String>) -> Self {
        Self::Transcode {
            message: message.into(),
        }
    }
}
