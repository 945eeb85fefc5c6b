use anyhow::{Context, Result};
use std::io::Cursor;

/// A finalized recording, ready for transcription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    /// Concatenated recorder chunks
    pub bytes: Vec<u8>,
    /// Media type negotiated by the recorder
    pub mime_type: String,
    /// Number of chunks the clip was assembled from
    pub chunk_count: usize,
}

/// The file sent to the transcription endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl AudioClip {
    /// Concatenate chunks in capture order
    pub fn assemble(chunks: Vec<Vec<u8>>, mime_type: impl Into<String>) -> Self {
        let chunk_count = chunks.len();
        Self {
            bytes: chunks.concat(),
            mime_type: mime_type.into(),
            chunk_count,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Prepare the clip for upload
    ///
    /// Raw L16 PCM has no container, so it is wrapped into a WAV file.
    /// Everything else is sent as recorded.
    pub fn into_upload(self) -> Result<ClipUpload> {
        let essence = media_essence(&self.mime_type);

        if essence.eq_ignore_ascii_case("audio/l16") {
            let (sample_rate, channels) = pcm_params(&self.mime_type);
            let bytes = wrap_pcm_as_wav(&self.bytes, sample_rate, channels)?;
            return Ok(ClipUpload {
                file_name: "recording.wav".to_string(),
                mime_type: "audio/wav".to_string(),
                bytes,
            });
        }

        Ok(ClipUpload {
            file_name: format!("recording.{}", extension_for_mime(&self.mime_type)),
            mime_type: self.mime_type,
            bytes: self.bytes,
        })
    }
}

/// File extension for an audio media type, `webm` when unknown
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match media_essence(mime_type).to_ascii_lowercase().as_str() {
        "audio/webm" => "webm",
        "audio/ogg" => "ogg",
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        "audio/mpeg" => "mp3",
        "audio/mp4" => "m4a",
        _ => "webm",
    }
}

fn media_essence(mime_type: &str) -> &str {
    mime_type.split(';').next().unwrap_or_default().trim()
}

/// `rate` and `channels` parameters, defaulting to 8kHz mono as RFC 2586 does
fn pcm_params(mime_type: &str) -> (u32, u16) {
    let mut sample_rate = 8000;
    let mut channels = 1;

    for param in mime_type.split(';').skip(1) {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "rate" => sample_rate = value.trim().parse().unwrap_or(sample_rate),
            "channels" => channels = value.trim().parse().unwrap_or(channels),
            _ => {}
        }
    }

    (sample_rate, channels)
}

fn wrap_pcm_as_wav(pcm: &[u8], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(pcm.len() + 44));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .context("Failed to create WAV writer")?;
        for pair in pcm.chunks_exact(2) {
            writer
                .write_sample(i16::from_le_bytes([pair[0], pair[1]]))
                .context("Failed to write sample to WAV")?;
        }
        writer.finalize().context("Failed to finalize WAV clip")?;
    }

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_keeps_chunk_order() {
        let clip = AudioClip::assemble(vec![vec![1, 2], vec![3], vec![4, 5]], "audio/webm");
        assert_eq!(clip.bytes, vec![1, 2, 3, 4, 5]);
        assert_eq!(clip.chunk_count, 3);
        assert_eq!(clip.len(), 5);
    }

    #[test]
    fn test_pcm_upload_is_valid_wav() {
        let samples: Vec<i16> = (0..1600).map(|i| (i % 200) as i16).collect();
        let pcm: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        let clip = AudioClip::assemble(vec![pcm], "audio/L16;rate=16000;channels=1");

        let upload = clip.into_upload().unwrap();
        assert_eq!(upload.file_name, "recording.wav");
        assert_eq!(upload.mime_type, "audio/wav");

        let reader = hound::WavReader::new(Cursor::new(upload.bytes)).unwrap();
        assert_eq!(reader.spec().sample_rate, 16000);
        assert_eq!(reader.spec().channels, 1);
        let decoded: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn test_encoded_upload_keeps_bytes() {
        let clip = AudioClip::assemble(vec![vec![7; 2000]], "audio/webm;codecs=opus");
        let upload = clip.into_upload().unwrap();
        assert_eq!(upload.file_name, "recording.webm");
        assert_eq!(upload.mime_type, "audio/webm;codecs=opus");
        assert_eq!(upload.bytes.len(), 2000);
    }

    #[test]
    fn test_extension_table() {
        assert_eq!(extension_for_mime("audio/ogg;codecs=opus"), "ogg");
        assert_eq!(extension_for_mime("audio/mp4"), "m4a");
        assert_eq!(extension_for_mime("audio/mpeg"), "mp3");
        assert_eq!(extension_for_mime("application/octet-stream"), "webm");
    }
}
