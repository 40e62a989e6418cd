//! Recording session management.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::CaptureError;
use crate::transcode::{TranscodeJob, Transcoder};

/// Dimensions and pacing of the captured frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSpec {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl FrameSpec {
    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// State of a recording session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Recording,
    Finalizing,
    Done,
    Failed,
}

/// Assembled raw media blob: the captured chunks concatenated in arrival
/// order, one tightly packed RGBA frame per chunk.
#[derive(Debug)]
pub struct RawRecording {
    pub spec: FrameSpec,
    pub data: Vec<u8>,
    pub frames: usize,
}

impl RawRecording {
    /// Writes the blob as-is, with the geometry encoded in the file name so
    /// the raw stream stays self-describing (`ffplay -f rawvideo` friendly).
    pub fn write_fallback(&self, output_dir: &Path) -> Result<PathBuf, CaptureError> {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = output_dir.join(format!(
            "recording_{stamp}_{}x{}_{}fps.rgba",
            self.spec.width, self.spec.height, self.spec.fps
        ));
        std::fs::write(&path, &self.data).map_err(|source| CaptureError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

/// Result of a start/stop toggle request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Started,
    Stopped,
    Rejected,
}

/// Recording state machine: `Idle -> Recording -> Finalizing -> Done|Failed`.
///
/// At most one session is active at a time; `begin` while `Recording` or
/// `Finalizing` is refused. `Done` and `Failed` are restartable.
pub struct RecordingSession {
    state: RecordingState,
    spec: Option<FrameSpec>,
    chunks: Vec<Vec<u8>>,
    job: Option<TranscodeJob>,
    output: Option<PathBuf>,
    transcoder: Option<Arc<dyn Transcoder>>,
    output_dir: PathBuf,
}

impl RecordingSession {
    pub fn new(output_dir: PathBuf, transcoder: Option<Arc<dyn Transcoder>>) -> Self {
        Self {
            state: RecordingState::Idle,
            spec: None,
            chunks: Vec::new(),
            job: None,
            output: None,
            transcoder,
            output_dir,
        }
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecordingState::Recording
    }

    /// Path of the most recently produced artifact, if any.
    pub fn output(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    /// Starts capturing. Clears any chunks left over from a previous run.
    pub fn begin(&mut self, spec: FrameSpec) -> Result<(), CaptureError> {
        match self.state {
            RecordingState::Recording => Err(CaptureError::AlreadyRecording),
            RecordingState::Finalizing => Err(CaptureError::Finalizing),
            _ => {
                self.chunks.clear();
                self.spec = Some(spec);
                self.output = None;
                self.state = RecordingState::Recording;
                tracing::info!(
                    width = spec.width,
                    height = spec.height,
                    fps = spec.fps,
                    "recording started"
                );
                Ok(())
            }
        }
    }

    /// Appends one captured chunk. An empty chunk is an anomaly worth
    /// logging, never an error.
    pub fn push_chunk(&mut self, chunk: Vec<u8>) {
        if self.state != RecordingState::Recording {
            return;
        }
        if chunk.is_empty() {
            tracing::warn!("empty media chunk received; skipping");
            return;
        }
        if let Some(spec) = self.spec {
            if chunk.len() != spec.frame_bytes() {
                tracing::debug!(
                    expected = spec.frame_bytes(),
                    actual = chunk.len(),
                    "chunk size differs from the frame spec"
                );
            }
        }
        self.chunks.push(chunk);
    }

    /// Stops capturing and assembles the raw blob. With a transcoder
    /// configured the blob goes to a worker thread and the session stays
    /// `Finalizing` until [`poll`](Self::poll) observes the result;
    /// otherwise the blob is written out directly.
    pub fn finish(&mut self) -> Result<(), CaptureError> {
        if self.state != RecordingState::Recording {
            return Err(CaptureError::NotRecording);
        }
        let spec = self.spec.expect("recording session has a frame spec");
        let frames = self.chunks.len();
        let mut data = Vec::with_capacity(self.chunks.iter().map(Vec::len).sum());
        for chunk in self.chunks.drain(..) {
            data.extend_from_slice(&chunk);
        }
        let raw = RawRecording { spec, data, frames };
        tracing::info!(frames, bytes = raw.data.len(), "recording stopped");

        match self.transcoder.clone() {
            Some(transcoder) => {
                self.state = RecordingState::Finalizing;
                self.job = Some(TranscodeJob::spawn(
                    transcoder,
                    raw,
                    self.output_dir.clone(),
                ));
            }
            None => match raw.write_fallback(&self.output_dir) {
                Ok(path) => {
                    tracing::info!(path = %path.display(), "raw recording written");
                    self.output = Some(path);
                    self.state = RecordingState::Done;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "failed to write raw recording");
                    self.state = RecordingState::Failed;
                }
            },
        }
        Ok(())
    }

    /// Drives a pending transcode forward; call once per frame.
    pub fn poll(&mut self) {
        if self.state != RecordingState::Finalizing {
            return;
        }
        let Some(job) = self.job.as_mut() else {
            self.state = RecordingState::Failed;
            return;
        };
        match job.poll() {
            None => {}
            Some(Ok(path)) => {
                tracing::info!(path = %path.display(), "transcode complete");
                self.output = Some(path);
                self.state = RecordingState::Done;
                self.job = None;
            }
            Some(Err(failure)) => {
                tracing::warn!(error = %failure.error, "transcode failed; keeping raw fallback");
                if let Some(raw) = failure.raw {
                    match raw.write_fallback(&self.output_dir) {
                        Ok(path) => {
                            tracing::info!(path = %path.display(), "raw fallback written");
                            self.output = Some(path);
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, "failed to write raw fallback")
                        }
                    }
                }
                self.state = RecordingState::Failed;
                self.job = None;
            }
        }
    }

    /// Single-button semantics: starts when idle (or after a finished run),
    /// stops while recording, and refuses while a transcode is in flight.
    pub fn toggle(&mut self, spec: FrameSpec) -> ToggleOutcome {
        match self.state {
            RecordingState::Recording => {
                // finish() only fails when not recording, which this arm excludes.
                let _ = self.finish();
                ToggleOutcome::Stopped
            }
            RecordingState::Finalizing => {
                tracing::warn!("recording still finalizing; toggle ignored");
                ToggleOutcome::Rejected
            }
            _ => match self.begin(spec) {
                Ok(()) => ToggleOutcome::Started,
                Err(err) => {
                    tracing::warn!(error = %err, "failed to start recording");
                    ToggleOutcome::Rejected
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::{self, Receiver, Sender};
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    fn spec() -> FrameSpec {
        FrameSpec {
            width: 2,
            height: 2,
            fps: 30,
        }
    }

    struct MockTranscoder {
        fail: bool,
    }

    impl Transcoder for MockTranscoder {
        fn transcode(
            &self,
            _raw: &RawRecording,
            output_dir: &Path,
        ) -> Result<PathBuf, CaptureError> {
            if self.fail {
                Err(CaptureError::transcode("mock failure"))
            } else {
                let path = output_dir.join("mock.mp4");
                std::fs::write(&path, b"mock").unwrap();
                Ok(path)
            }
        }
    }

    /// Blocks inside transcode() until the test drops the gate sender.
    struct GatedTranscoder {
        gate: Mutex<Receiver<()>>,
    }

    impl GatedTranscoder {
        fn new() -> (Arc<Self>, Sender<()>) {
            let (sender, receiver) = mpsc::channel();
            (
                Arc::new(Self {
                    gate: Mutex::new(receiver),
                }),
                sender,
            )
        }
    }

    impl Transcoder for GatedTranscoder {
        fn transcode(
            &self,
            _raw: &RawRecording,
            output_dir: &Path,
        ) -> Result<PathBuf, CaptureError> {
            // Returns Err once the sender is dropped; either way we proceed.
            let _ = self.gate.lock().unwrap().recv();
            Ok(output_dir.join("gated.mp4"))
        }
    }

    fn poll_until(session: &mut RecordingSession, target: RecordingState) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while session.state() != target {
            assert!(Instant::now() < deadline, "timed out waiting for {target:?}");
            session.poll();
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn chunks_concatenate_in_arrival_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = RecordingSession::new(dir.path().to_path_buf(), None);
        session.begin(spec()).unwrap();
        session.push_chunk(vec![1, 1]);
        session.push_chunk(vec![2, 2]);
        session.push_chunk(vec![3, 3]);
        session.finish().unwrap();
        assert_eq!(session.state(), RecordingState::Done);
        let written = std::fs::read(session.output().unwrap()).unwrap();
        assert_eq!(written, vec![1, 1, 2, 2, 3, 3]);
    }

    #[test]
    fn empty_chunks_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = RecordingSession::new(dir.path().to_path_buf(), None);
        session.begin(spec()).unwrap();
        session.push_chunk(vec![9]);
        session.push_chunk(Vec::new());
        session.push_chunk(vec![7]);
        session.finish().unwrap();
        let written = std::fs::read(session.output().unwrap()).unwrap();
        assert_eq!(written, vec![9, 7]);
    }

    #[test]
    fn begin_while_recording_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = RecordingSession::new(dir.path().to_path_buf(), None);
        session.begin(spec()).unwrap();
        assert!(matches!(
            session.begin(spec()),
            Err(CaptureError::AlreadyRecording)
        ));
    }

    #[test]
    fn toggle_starts_stops_and_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = RecordingSession::new(dir.path().to_path_buf(), None);
        assert_eq!(session.toggle(spec()), ToggleOutcome::Started);
        session.push_chunk(vec![1]);
        assert_eq!(session.toggle(spec()), ToggleOutcome::Stopped);
        assert_eq!(session.state(), RecordingState::Done);
        assert_eq!(session.toggle(spec()), ToggleOutcome::Started);
        assert_eq!(session.state(), RecordingState::Recording);
    }

    #[test]
    fn toggle_while_finalizing_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (transcoder, gate) = GatedTranscoder::new();
        let mut session = RecordingSession::new(dir.path().to_path_buf(), Some(transcoder));
        session.begin(spec()).unwrap();
        session.push_chunk(vec![1]);
        session.finish().unwrap();
        assert_eq!(session.state(), RecordingState::Finalizing);
        assert_eq!(session.toggle(spec()), ToggleOutcome::Rejected);
        drop(gate);
        poll_until(&mut session, RecordingState::Done);
    }

    #[test]
    fn transcode_success_reaches_done() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = Arc::new(MockTranscoder { fail: false });
        let mut session = RecordingSession::new(dir.path().to_path_buf(), Some(transcoder));
        session.begin(spec()).unwrap();
        session.push_chunk(vec![5; 16]);
        session.finish().unwrap();
        poll_until(&mut session, RecordingState::Done);
        assert!(session.output().unwrap().ends_with("mock.mp4"));
    }

    #[test]
    fn transcode_failure_keeps_raw_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = Arc::new(MockTranscoder { fail: true });
        let mut session = RecordingSession::new(dir.path().to_path_buf(), Some(transcoder));
        session.begin(spec()).unwrap();
        session.push_chunk(vec![5; 16]);
        session.finish().unwrap();
        poll_until(&mut session, RecordingState::Failed);
        let fallback = session.output().expect("fallback artifact");
        let written = std::fs::read(fallback).unwrap();
        assert_eq!(written, vec![5; 16]);
        assert!(fallback.extension().is_some_and(|ext| ext == "rgba"));
    }
}
