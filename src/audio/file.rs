use anyhow::{Context, Result};
use hound::WavReader;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::backend::{AudioFrame, CaptureConstraints, CaptureDevice, CaptureError, CaptureStream, RecorderEvent};
use super::chunk::{pcm_mime_type, ChunkConfig, ChunkedRecorder};

pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path)
            .context("Failed to open WAV file")?;

        let spec = reader.spec();
        if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
            anyhow::bail!(
                "Unsupported WAV encoding: {} bit {:?} (expected 16 bit PCM)",
                spec.bits_per_sample,
                spec.sample_format
            );
        }

        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_seconds = samples.len() as f64 /
            (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Average all channels into one
    pub fn to_mono(&self) -> Vec<i16> {
        if self.channels <= 1 {
            return self.samples.clone();
        }

        let channels = self.channels as usize;
        self.samples
            .chunks_exact(channels)
            .map(|frame| {
                let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                (sum / channels as i32) as i16
            })
            .collect()
    }
}

/// Capture device that replays a WAV file
///
/// With `realtime` the frames are paced at their own duration, so stopping
/// early yields a partial clip exactly like a live microphone would.
pub struct WavFileDevice {
    path: PathBuf,
    name: String,
    realtime: bool,
    frame_ms: u64,
}

impl WavFileDevice {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = format!("wav:{}", path.display());
        Self {
            path,
            name,
            realtime: true,
            frame_ms: 100, // 100ms frames
        }
    }

    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }
}

#[async_trait::async_trait]
impl CaptureDevice for WavFileDevice {
    async fn acquire(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn CaptureStream>, CaptureError> {
        if !self.path.exists() {
            return Err(CaptureError::NoDevice);
        }

        let path = self.path.clone();
        let audio = tokio::task::spawn_blocking(move || AudioFile::open(path))
            .await
            .map_err(|e| CaptureError::Unavailable(e.to_string()))?
            .map_err(|e| CaptureError::Unavailable(format!("{:#}", e)))?;

        let (samples, channels) = if constraints.channel_count == 1 {
            (audio.to_mono(), 1)
        } else {
            (audio.samples.clone(), audio.channels)
        };

        if audio.sample_rate != constraints.sample_rate {
            debug!(
                "{} delivers {}Hz instead of requested {}Hz",
                self.name, audio.sample_rate, constraints.sample_rate
            );
        }

        Ok(Box::new(WavFileStream {
            label: self.name.clone(),
            mime_type: pcm_mime_type(audio.sample_rate, channels),
            source: Some(PcmSource {
                samples,
                sample_rate: audio.sample_rate,
                channels,
            }),
            realtime: self.realtime,
            frame_ms: self.frame_ms,
            stop_tx: None,
            feeder: None,
            released: false,
        }))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

struct PcmSource {
    samples: Vec<i16>,
    sample_rate: u32,
    channels: u16,
}

struct WavFileStream {
    label: String,
    mime_type: String,
    source: Option<PcmSource>,
    realtime: bool,
    frame_ms: u64,
    stop_tx: Option<oneshot::Sender<()>>,
    feeder: Option<JoinHandle<()>>,
    released: bool,
}

impl CaptureStream for WavFileStream {
    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn start_recorder(
        &mut self,
        timeslice: Duration,
    ) -> Result<mpsc::UnboundedReceiver<RecorderEvent>, CaptureError> {
        if self.released {
            return Err(CaptureError::Unavailable("stream already released".to_string()));
        }
        let source = self
            .source
            .take()
            .ok_or_else(|| CaptureError::Unavailable("recorder already started".to_string()))?;

        let (frame_tx, frame_rx) = mpsc::channel(64);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel();

        self.feeder = Some(tokio::spawn(feed_frames(
            source,
            self.frame_ms,
            self.realtime,
            frame_tx,
        )));

        let recorder = ChunkedRecorder::new(ChunkConfig::new(timeslice));
        tokio::spawn(recorder.record(frame_rx, stop_rx, event_tx));

        self.stop_tx = Some(stop_tx);
        info!("Recorder armed on {} ({})", self.label, self.mime_type);

        Ok(event_rx)
    }

    fn stop_recorder(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        info!("Stopping track: {}", self.label);
        if let Some(feeder) = self.feeder.take() {
            feeder.abort();
        }
    }
}

impl Drop for WavFileStream {
    fn drop(&mut self) {
        if let Some(feeder) = self.feeder.take() {
            feeder.abort();
        }
    }
}

async fn feed_frames(
    source: PcmSource,
    frame_ms: u64,
    realtime: bool,
    frame_tx: mpsc::Sender<AudioFrame>,
) {
    let samples_per_frame =
        (source.sample_rate as u64 * frame_ms / 1000) as usize * source.channels as usize;
    let samples_per_frame = samples_per_frame.max(source.channels as usize).max(1);

    for (index, samples) in source.samples.chunks(samples_per_frame).enumerate() {
        let frame = AudioFrame {
            samples: samples.to_vec(),
            sample_rate: source.sample_rate,
            channels: source.channels,
            timestamp_ms: index as u64 * frame_ms,
        };

        if frame_tx.send(frame).await.is_err() {
            debug!("Recorder gone, stopping file capture");
            return;
        }

        if realtime {
            tokio::time::sleep(Duration::from_millis(frame_ms)).await;
        }
    }

    debug!("File capture reached end of input");
}
