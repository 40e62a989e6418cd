//! Transcode collaborator: raw RGBA frames in, a compatible video file out.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;

use crate::error::CaptureError;
use crate::recorder::{FrameSpec, RawRecording};

/// Converts an assembled raw recording into an encoded file.
///
/// The render loop never blocks on this: production code runs the
/// implementation on a [`TranscodeJob`] worker thread.
pub trait Transcoder: Send + Sync {
    fn transcode(&self, raw: &RawRecording, output_dir: &Path) -> Result<PathBuf, CaptureError>;
}

/// Pipes the raw frames into an external `ffmpeg` process over stdin and
/// emits an H.264 MP4 with a streaming-friendly moov atom.
pub struct FfmpegTranscoder {
    binary: PathBuf,
}

impl FfmpegTranscoder {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

fn ffmpeg_args(spec: &FrameSpec, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-y",
        "-loglevel",
        "error",
        "-f",
        "rawvideo",
        "-pixel_format",
        "rgba",
        "-video_size",
    ]
    .iter()
    .map(OsString::from)
    .collect();
    args.push(format!("{}x{}", spec.width, spec.height).into());
    args.push("-framerate".into());
    args.push(spec.fps.to_string().into());
    for arg in [
        "-i",
        "-",
        "-c:v",
        "libx264",
        "-preset",
        "fast",
        "-movflags",
        "+faststart",
        "-pix_fmt",
        "yuv420p",
    ] {
        args.push(arg.into());
    }
    args.push(output.into());
    args
}

impl Transcoder for FfmpegTranscoder {
    fn transcode(&self, raw: &RawRecording, output_dir: &Path) -> Result<PathBuf, CaptureError> {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let output = output_dir.join(format!("recording_{stamp}.mp4"));

        let mut child = Command::new(&self.binary)
            .args(ffmpeg_args(&raw.spec, &output))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                CaptureError::transcode(format!(
                    "failed to launch {}: {err}",
                    self.binary.display()
                ))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| CaptureError::transcode("ffmpeg stdin unavailable"))?;
        let write_result = stdin.write_all(&raw.data);
        drop(stdin);

        let result = child
            .wait_with_output()
            .map_err(|err| CaptureError::transcode(format!("failed to wait for ffmpeg: {err}")))?;
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(CaptureError::transcode(format!(
                "ffmpeg exited with {}: {}",
                result.status,
                stderr.trim()
            )));
        }
        // A broken pipe with a zero exit status would mean ffmpeg stopped
        // reading early; surface the write error only when the exit status
        // did not already explain it.
        write_result
            .map_err(|err| CaptureError::transcode(format!("failed to feed ffmpeg: {err}")))?;

        Ok(output)
    }
}

pub(crate) struct TranscodeFailure {
    pub error: CaptureError,
    /// The assembled blob, handed back so the caller can keep a raw
    /// fallback artifact. Absent only when the worker died without replying.
    pub raw: Option<RawRecording>,
}

/// One in-flight transcode on a worker thread, polled from the frame loop.
pub struct TranscodeJob {
    receiver: Receiver<Result<PathBuf, TranscodeFailure>>,
}

impl TranscodeJob {
    pub(crate) fn spawn(
        transcoder: Arc<dyn Transcoder>,
        raw: RawRecording,
        output_dir: PathBuf,
    ) -> Self {
        let (sender, receiver) = mpsc::channel();
        thread::spawn(move || {
            let result = transcoder
                .transcode(&raw, &output_dir)
                .map_err(|error| TranscodeFailure {
                    error,
                    raw: Some(raw),
                });
            let _ = sender.send(result);
        });
        Self { receiver }
    }

    pub(crate) fn poll(&mut self) -> Option<Result<PathBuf, TranscodeFailure>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(TranscodeFailure {
                error: CaptureError::transcode("transcode worker disconnected before replying"),
                raw: None,
            })),
        }
    }
}
