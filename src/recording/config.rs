use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::audio::CaptureConstraints;

/// Configuration for voice recording
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Recorder timeslice in milliseconds
    /// Default: 200
    pub timeslice_ms: u64,

    /// Clips smaller than this are rejected as too short
    /// Default: 1000 bytes
    pub min_clip_bytes: usize,

    /// How long a stop request waits for the recorder's final data
    /// Default: 2000 ms
    pub stop_timeout_ms: u64,

    /// Sample rate requested from the device (Whisper expects 16kHz)
    pub sample_rate: u32,

    /// Number of audio channels requested (1 = mono)
    pub channels: u16,

    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            timeslice_ms: 200,
            min_clip_bytes: 1000,
            stop_timeout_ms: 2000,
            sample_rate: 16000,
            channels: 1,
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

impl RecordingConfig {
    pub fn constraints(&self) -> CaptureConstraints {
        CaptureConstraints {
            channel_count: self.channels,
            sample_rate: self.sample_rate,
            echo_cancellation: self.echo_cancellation,
            noise_suppression: self.noise_suppression,
            auto_gain_control: self.auto_gain_control,
        }
    }

    pub fn timeslice(&self) -> Duration {
        Duration::from_millis(self.timeslice_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}
