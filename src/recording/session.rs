use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::clip::AudioClip;
use super::config::RecordingConfig;
use super::state::{RecordingError, RecordingState};
use crate::audio::{CaptureDevice, CaptureStream, RecorderEvent};

/// Statistics about the current recording
#[derive(Debug, Clone, Serialize)]
pub struct RecordingStats {
    /// Session identifier (changes on every start)
    pub session_id: Uuid,

    /// Current state name
    pub state: &'static str,

    /// When the current capture started, if one is live
    pub started_at: Option<DateTime<Utc>>,

    /// Number of chunks received so far
    pub chunks_count: usize,

    /// Total bytes received so far
    pub bytes: usize,
}

/// Voice recording state machine
///
/// Wraps a capture device: acquires a stream, arms its recorder, collects
/// chunks and finalizes them into an `AudioClip`. The capture stream is held
/// by a guard that releases it exactly once, whichever way the capture ends.
pub struct RecordingSession {
    session_id: Uuid,
    config: RecordingConfig,
    device: Arc<dyn CaptureDevice>,
    state: RecordingState,
    capture: Option<ActiveCapture>,
}

impl RecordingSession {
    pub fn new(device: Arc<dyn CaptureDevice>, config: RecordingConfig) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            config,
            device,
            state: RecordingState::Idle,
            capture: None,
        }
    }

    pub fn state(&self) -> &RecordingState {
        &self.state
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn config(&self) -> &RecordingConfig {
        &self.config
    }

    /// Start recording
    ///
    /// Accepted from `Idle` or `Error`; anything else is rejected with
    /// `RecordingError::Busy` and leaves the state untouched.
    pub async fn start(&mut self) -> Result<(), RecordingError> {
        if !self.state.can_start() {
            warn!("Recording already started ({})", self.state.name());
            return Err(RecordingError::Busy(self.state.name()));
        }

        self.session_id = Uuid::new_v4();
        self.state = RecordingState::Preparing;
        info!(
            "Starting recording session {} on {}",
            self.session_id,
            self.device.name()
        );

        let stream = match self.device.acquire(&self.config.constraints()).await {
            Ok(stream) => stream,
            Err(e) => return Err(self.fail(e.into())),
        };
        let mut stream = StreamGuard::new(stream);

        let events = match stream.start_recorder(self.config.timeslice()) {
            Ok(events) => events,
            Err(e) => {
                stream.release();
                return Err(self.fail(e.into()));
            }
        };

        let mime_type = stream.mime_type();
        info!("Recording started ({})", mime_type);

        self.capture = Some(ActiveCapture {
            stream,
            events,
            chunks: Vec::new(),
            mime_type,
            started_at: Utc::now(),
            recorder_stopped: false,
        });
        self.state = RecordingState::Recording;

        Ok(())
    }

    /// Collect recorder events that are already queued, without waiting
    ///
    /// A recorder error ends the capture right away. Returns the number of
    /// chunks collected so far.
    pub fn pump(&mut self) -> Result<usize, RecordingError> {
        let Some(capture) = self.capture.as_mut() else {
            return Ok(0);
        };

        match capture.collect_pending() {
            Ok(()) => Ok(capture.chunks.len()),
            Err(reason) => Err(self.fail(RecordingError::Recorder(reason))),
        }
    }

    /// Stop recording and finalize the clip
    ///
    /// Returns `Ok(None)` when there is nothing to stop. On success the
    /// session moves to `Transcribing` and waits for `finish_transcription`.
    /// Dropping the future mid-drain keeps the capture and its stream.
    pub async fn stop(&mut self) -> Result<Option<AudioClip>, RecordingError> {
        match self.state {
            RecordingState::Recording => {}
            RecordingState::Preparing => {
                self.abort();
                return Ok(None);
            }
            _ => {
                debug!("No active recording to stop ({})", self.state.name());
                return Ok(None);
            }
        }

        let Some(capture) = self.capture.as_mut() else {
            self.state = RecordingState::Idle;
            return Ok(None);
        };

        info!("Stopping recording session {}", self.session_id);
        capture.stream.stop_recorder();

        let drained = tokio::time::timeout(self.config.stop_timeout(), capture.drain()).await;
        let Some(mut capture) = self.capture.take() else {
            self.state = RecordingState::Idle;
            return Ok(None);
        };
        capture.stream.release();

        match drained {
            Ok(Ok(())) => {}
            Ok(Err(reason)) => return Err(self.fail(RecordingError::Recorder(reason))),
            Err(_) => {
                return Err(self.fail(RecordingError::Recorder(
                    "recorder did not stop in time".to_string(),
                )))
            }
        }

        let chunks = capture.chunks.len();
        let bytes = capture.bytes();
        info!("Recording stopped: {} chunks, {} bytes", chunks, bytes);

        if chunks == 0 || bytes < self.config.min_clip_bytes {
            return Err(self.fail(RecordingError::EmptyClip { chunks, bytes }));
        }

        let clip = AudioClip::assemble(std::mem::take(&mut capture.chunks), capture.mime_type.clone());
        self.state = RecordingState::Transcribing;

        Ok(Some(clip))
    }

    /// Record the outcome of the transcription handoff
    pub fn finish_transcription(&mut self, outcome: Result<(), RecordingError>) {
        if self.state != RecordingState::Transcribing {
            warn!(
                "Transcription finished while {}, ignoring",
                self.state.name()
            );
            return;
        }

        match outcome {
            Ok(()) => {
                debug!("Transcription handed off, session {} idle", self.session_id);
                self.state = RecordingState::Idle;
            }
            Err(e) => {
                self.fail(e);
            }
        }
    }

    /// Drop any capture in progress and return to `Idle`
    ///
    /// Also recovers a session whose `start` future was dropped mid-grant.
    pub fn abort(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            info!("Aborting recording session {}", self.session_id);
            capture.stream.release();
        }
        self.state = RecordingState::Idle;
    }

    /// Acknowledge an error so the state reads `Idle` again
    pub fn clear_error(&mut self) {
        if matches!(self.state, RecordingState::Error(_)) {
            self.state = RecordingState::Idle;
        }
    }

    pub fn stats(&self) -> RecordingStats {
        RecordingStats {
            session_id: self.session_id,
            state: self.state.name(),
            started_at: self.capture.as_ref().map(|c| c.started_at),
            chunks_count: self.capture.as_ref().map_or(0, |c| c.chunks.len()),
            bytes: self.capture.as_ref().map_or(0, ActiveCapture::bytes),
        }
    }

    fn fail(&mut self, err: RecordingError) -> RecordingError {
        warn!("Recording session {} failed: {}", self.session_id, err);
        if let Some(mut capture) = self.capture.take() {
            capture.stream.release();
        }
        self.state = RecordingState::Error(err.clone());
        err
    }
}

struct ActiveCapture {
    stream: StreamGuard,
    events: mpsc::UnboundedReceiver<RecorderEvent>,
    chunks: Vec<Vec<u8>>,
    mime_type: String,
    started_at: DateTime<Utc>,
    recorder_stopped: bool,
}

impl ActiveCapture {
    fn bytes(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }

    fn accept(&mut self, event: RecorderEvent) -> Result<(), String> {
        match event {
            RecorderEvent::Data(chunk) => {
                if !chunk.is_empty() {
                    self.chunks.push(chunk);
                }
                Ok(())
            }
            RecorderEvent::Error(reason) => Err(reason),
            RecorderEvent::Stopped => {
                self.recorder_stopped = true;
                Ok(())
            }
        }
    }

    fn collect_pending(&mut self) -> Result<(), String> {
        while !self.recorder_stopped {
            match self.events.try_recv() {
                Ok(event) => self.accept(event)?,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.recorder_stopped = true;
                }
            }
        }
        Ok(())
    }

    /// Wait for the recorder's final data
    async fn drain(&mut self) -> Result<(), String> {
        while !self.recorder_stopped {
            match self.events.recv().await {
                Some(event) => self.accept(event)?,
                None => self.recorder_stopped = true,
            }
        }
        Ok(())
    }
}

/// Owns a capture stream and releases it exactly once
struct StreamGuard {
    stream: Option<Box<dyn CaptureStream>>,
}

impl StreamGuard {
    fn new(stream: Box<dyn CaptureStream>) -> Self {
        Self {
            stream: Some(stream),
        }
    }

    fn mime_type(&self) -> String {
        self.stream
            .as_ref()
            .map(|s| s.mime_type().to_string())
            .unwrap_or_default()
    }

    fn start_recorder(
        &mut self,
        timeslice: std::time::Duration,
    ) -> Result<mpsc::UnboundedReceiver<RecorderEvent>, crate::audio::CaptureError> {
        match self.stream.as_mut() {
            Some(stream) => stream.start_recorder(timeslice),
            None => Err(crate::audio::CaptureError::Unavailable(
                "stream already released".to_string(),
            )),
        }
    }

    fn stop_recorder(&mut self) {
        if let Some(stream) = self.stream.as_mut() {
            stream.stop_recorder();
        }
    }

    fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.release();
        }
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.release();
    }
}
