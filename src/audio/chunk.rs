use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::backend::{AudioFrame, RecorderEvent};

/// Media type of the raw PCM chunks produced by `ChunkedRecorder`
pub fn pcm_mime_type(sample_rate: u32, channels: u16) -> String {
    format!("audio/L16;rate={};channels={}", sample_rate, channels)
}

/// Chunk configuration
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Length of one emitted chunk in milliseconds (default: 200)
    pub timeslice_ms: u64,
}

impl ChunkConfig {
    pub fn new(timeslice: Duration) -> Self {
        Self {
            timeslice_ms: (timeslice.as_millis() as u64).max(1),
        }
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self { timeslice_ms: 200 }
    }
}

/// Summary of a finished recording run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkSummary {
    /// Number of `Data` events emitted
    pub chunks: usize,
    /// Total PCM bytes emitted
    pub bytes: usize,
    /// Whether the run ended with `Error` instead of `Stopped`
    pub failed: bool,
}

/// Chunked audio recorder
///
/// Receives audio frames from a capture stream and emits them as raw
/// little-endian PCM chunks, one per timeslice of frame time.
pub struct ChunkedRecorder {
    config: ChunkConfig,
    current_chunk: Option<ChunkBuffer>,
    format: Option<(u32, u16)>,
    summary: ChunkSummary,
}

impl ChunkedRecorder {
    pub fn new(config: ChunkConfig) -> Self {
        debug!("Chunked recorder initialized ({}ms timeslice)", config.timeslice_ms);

        Self {
            config,
            current_chunk: None,
            format: None,
            summary: ChunkSummary::default(),
        }
    }

    /// Record until `stop` fires, the frame source ends, or a frame is rejected
    ///
    /// Frames already queued when `stop` fires are still recorded. The last
    /// event sent is always `Stopped` or `Error`.
    pub async fn record(
        mut self,
        mut frames: mpsc::Receiver<AudioFrame>,
        mut stop: oneshot::Receiver<()>,
        events: mpsc::UnboundedSender<RecorderEvent>,
    ) -> ChunkSummary {
        loop {
            tokio::select! {
                biased;
                _ = &mut stop => {
                    debug!("Recorder stop requested");
                    while let Ok(frame) = frames.try_recv() {
                        if let Err(reason) = self.push_frame(frame, &events) {
                            return self.fail(reason, &events);
                        }
                    }
                    break;
                }
                frame = frames.recv() => match frame {
                    Some(frame) => {
                        if let Err(reason) = self.push_frame(frame, &events) {
                            return self.fail(reason, &events);
                        }
                    }
                    None => {
                        info!("Capture source ended, stopping recorder");
                        break;
                    }
                },
            }
        }

        self.flush(&events);
        let _ = events.send(RecorderEvent::Stopped);

        info!(
            "Chunked recording complete: {} chunks, {} bytes",
            self.summary.chunks, self.summary.bytes
        );

        self.summary
    }

    fn push_frame(
        &mut self,
        frame: AudioFrame,
        events: &mpsc::UnboundedSender<RecorderEvent>,
    ) -> Result<(), String> {
        let format = (frame.sample_rate, frame.channels);
        match self.format {
            None => self.format = Some(format),
            Some(expected) if expected != format => {
                return Err(format!(
                    "audio format changed mid-recording ({}Hz/{}ch -> {}Hz/{}ch)",
                    expected.0, expected.1, format.0, format.1
                ));
            }
            Some(_) => {}
        }

        if self.should_start_new_chunk(&frame) {
            self.flush(events);
            self.current_chunk = Some(ChunkBuffer::new(frame.timestamp_ms));
        }

        if let Some(chunk) = &mut self.current_chunk {
            chunk.write_frame(&frame);
        }

        Ok(())
    }

    fn should_start_new_chunk(&self, frame: &AudioFrame) -> bool {
        match &self.current_chunk {
            None => true, // No current chunk, start one
            Some(chunk) => {
                let elapsed_ms = frame.timestamp_ms.saturating_sub(chunk.start_ms);
                elapsed_ms >= self.config.timeslice_ms
            }
        }
    }

    fn flush(&mut self, events: &mpsc::UnboundedSender<RecorderEvent>) {
        let Some(chunk) = self.current_chunk.take() else {
            return;
        };
        if chunk.bytes.is_empty() {
            return;
        }

        self.summary.chunks += 1;
        self.summary.bytes += chunk.bytes.len();
        debug!(
            "Chunk {} ready: {} bytes from {}ms",
            self.summary.chunks,
            chunk.bytes.len(),
            chunk.start_ms
        );

        if events.send(RecorderEvent::Data(chunk.bytes)).is_err() {
            debug!("Recorder listener dropped, discarding chunk");
        }
    }

    fn fail(mut self, reason: String, events: &mpsc::UnboundedSender<RecorderEvent>) -> ChunkSummary {
        warn!("Recorder error: {}", reason);
        self.current_chunk = None;
        self.summary.failed = true;
        let _ = events.send(RecorderEvent::Error(reason));
        self.summary
    }
}

/// PCM bytes collected for one timeslice
struct ChunkBuffer {
    start_ms: u64,
    bytes: Vec<u8>,
}

impl ChunkBuffer {
    fn new(start_ms: u64) -> Self {
        Self {
            start_ms,
            bytes: Vec::new(),
        }
    }

    fn write_frame(&mut self, frame: &AudioFrame) {
        self.bytes.reserve(frame.samples.len() * 2);
        for sample in &frame.samples {
            self.bytes.extend_from_slice(&sample.to_le_bytes());
        }
    }
}
