use anyhow::{anyhow, Context, Result};
use base64::Engine;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::info;

/// Binary payload decoded from a `data:` URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl Artifact {
    /// Decode `data:<mime>;base64,<payload>`
    pub fn from_data_uri(uri: &str) -> Result<Self> {
        let rest = uri
            .trim()
            .strip_prefix("data:")
            .ok_or_else(|| anyhow!("not a data URI"))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| anyhow!("data URI has no payload"))?;

        let mut params = header.split(';');
        let mime_type = match params.next().map(str::trim) {
            Some(mime) if !mime.is_empty() => mime.to_string(),
            _ => "application/octet-stream".to_string(),
        };
        if !params.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
            return Err(anyhow!("unsupported data URI encoding (expected base64)"));
        }

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .context("Failed to decode base64 payload")?;

        Ok(Self { mime_type, bytes })
    }

    pub fn extension(&self) -> &'static str {
        match self.mime_type.to_ascii_lowercase().as_str() {
            "image/png" => "png",
            "image/jpeg" | "image/jpg" => "jpg",
            "image/gif" => "gif",
            "image/svg+xml" => "svg",
            "image/webp" => "webp",
            _ => "bin",
        }
    }

    /// `<prefix>-<unix millis>.<ext>`
    pub fn suggested_name(&self, prefix: &str, at: DateTime<Utc>) -> String {
        format!("{}-{}.{}", prefix, at.timestamp_millis(), self.extension())
    }
}

/// Host capability that receives downloadable artifacts
pub trait ArtifactSink: Send + Sync {
    fn emit(&self, bytes: &[u8], suggested_name: &str) -> Result<()>;
}

/// Writes artifacts as files into a directory
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ArtifactSink for DirectorySink {
    fn emit(&self, bytes: &[u8], suggested_name: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create directory: {}", self.dir.display()))?;

        // Only the final component of the suggested name is honoured
        let file_name = Path::new(suggested_name)
            .file_name()
            .ok_or_else(|| anyhow!("invalid file name: {}", suggested_name))?;
        let path = self.dir.join(file_name);

        std::fs::write(&path, bytes)
            .with_context(|| format!("Failed to write artifact: {}", path.display()))?;
        info!("Saved {} bytes to {}", bytes.len(), path.display());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_decode_png_uri() {
        let artifact = Artifact::from_data_uri("data:image/png;base64,iVBORw0K").unwrap();
        assert_eq!(artifact.mime_type, "image/png");
        assert_eq!(artifact.bytes, vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a]);
        assert_eq!(artifact.extension(), "png");
    }

    #[test]
    fn test_rejects_malformed_uris() {
        assert!(Artifact::from_data_uri("https://example.com/a.png").is_err());
        assert!(Artifact::from_data_uri("data:image/png;base64").is_err());
        assert!(Artifact::from_data_uri("data:image/svg+xml,<svg/>").is_err());
        assert!(Artifact::from_data_uri("data:image/png;base64,***").is_err());
    }

    #[test]
    fn test_suggested_name() {
        let artifact = Artifact {
            mime_type: "image/png".to_string(),
            bytes: vec![],
        };
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(
            artifact.suggested_name("visualization", at),
            "visualization-1700000000123.png"
        );
    }

    #[test]
    fn test_directory_sink_strips_paths() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path().join("out"));
        sink.emit(b"abc", "../escape.png").unwrap();

        assert_eq!(std::fs::read(dir.path().join("out/escape.png")).unwrap(), b"abc");
        assert!(!dir.path().join("escape.png").exists());
    }
}
