pub mod backend;
pub mod chunk;
pub mod file;

pub use backend::{
    AudioFrame, CaptureConstraints, CaptureDevice, CaptureDeviceFactory, CaptureError, CaptureSource,
    CaptureStream, RecorderEvent,
};
pub use chunk::{pcm_mime_type, ChunkConfig, ChunkSummary, ChunkedRecorder};
pub use file::{AudioFile, WavFileDevice};
