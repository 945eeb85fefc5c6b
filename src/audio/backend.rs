use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Frame duration derived from its sample count
    pub fn duration_ms(&self) -> u64 {
        let per_channel = self.samples.len() as u64 / u64::from(self.channels.max(1));
        per_channel * 1000 / u64::from(self.sample_rate.max(1))
    }
}

/// What the client asks of the capture device
#[derive(Debug, Clone)]
pub struct CaptureConstraints {
    /// Desired channel count (1 = mono)
    pub channel_count: u16,
    /// Desired sample rate in Hz
    pub sample_rate: u32,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            channel_count: 1,   // Mono
            sample_rate: 16000, // 16kHz for Whisper
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

/// Why the platform refused or lost a capture stream
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("microphone access denied")]
    PermissionDenied,
    #[error("no capture device found")]
    NoDevice,
    #[error("capture unavailable: {0}")]
    Unavailable(String),
}

/// Notifications from an armed recorder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderEvent {
    /// Encoded audio collected during one timeslice
    Data(Vec<u8>),
    /// The recorder failed; no further data follows
    Error(String),
    /// The recorder flushed its last data and stopped
    Stopped,
}

/// Capture device (permission + stream API)
///
/// Implementations:
/// - `WavFileDevice`: replays a WAV file as if it were a microphone
/// - test doubles in `tests/`
#[async_trait::async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Ask the platform for a capture stream
    ///
    /// Suspends until access is granted or refused.
    async fn acquire(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn CaptureStream>, CaptureError>;

    /// Get device name for logging
    fn name(&self) -> &str;
}

/// A live capture stream with an attached chunked recorder
pub trait CaptureStream: Send {
    /// Media type the recorder negotiated for its data
    fn mime_type(&self) -> &str;

    /// Arm the recorder; data arrives once per `timeslice`
    fn start_recorder(
        &mut self,
        timeslice: Duration,
    ) -> Result<mpsc::UnboundedReceiver<RecorderEvent>, CaptureError>;

    /// Ask the recorder to flush its buffered data and send `Stopped`
    fn stop_recorder(&mut self);

    /// Stop every track of the stream
    fn release(&mut self);
}

/// Capture device factory
pub struct CaptureDeviceFactory;

impl CaptureDeviceFactory {
    /// Create a capture device for the requested source
    pub fn create(source: CaptureSource) -> Result<Box<dyn CaptureDevice>, CaptureError> {
        match source {
            CaptureSource::File { path, realtime } => {
                let device = super::file::WavFileDevice::new(path).realtime(realtime);
                Ok(Box::new(device))
            }

            // No native microphone backend is built into this crate
            CaptureSource::Microphone => Err(CaptureError::NoDevice),
        }
    }
}

/// Audio source type
#[derive(Debug, Clone)]
pub enum CaptureSource {
    /// System microphone
    Microphone,
    /// WAV file input (for the CLI and tests)
    File { path: PathBuf, realtime: bool },
}
