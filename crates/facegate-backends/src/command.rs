//! Embedding extraction through an external program.
//!
//! Each call writes the upload into its own temporary directory, runs the
//! configured extractor with the file path as its last argument, and reads
//! a JSON array of face encodings (`[[f32; 128], ...]`) from stdout. The
//! directory is removed when the call returns, fails, or is cancelled.

use async_trait::async_trait;
use facegate_core::{EmbeddingExtractor, ExtractionError, ImageUpload, Signature};
use image::ImageFormat;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

const TEMP_PREFIX: &str = "facegate-";

pub struct CommandExtractor {
    program: String,
    args: Vec<String>,
    /// Parent for per-call temp dirs; the system temp dir if unset.
    temp_root: Option<PathBuf>,
}

impl CommandExtractor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            temp_root: None,
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(root.into());
        self
    }

    fn temp_dir(&self) -> std::io::Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_PREFIX);
        match &self.temp_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
    }
}

#[async_trait]
impl EmbeddingExtractor for CommandExtractor {
    async fn face_encodings(&self, image: &ImageUpload) -> Result<Vec<Signature>, ExtractionError> {
        let format = sniff(&image.data)?;

        // Dropped on every return path, including cancellation by timeout.
        let dir = self.temp_dir()?;
        let path = dir
            .path()
            .join(upload_filename(image.filename.as_deref(), format));
        tokio::fs::write(&path, &image.data).await?;

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(&path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ExtractionError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ExtractionError::CommandFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_encodings(&output.stdout)
    }
}

/// Identify and fully decode the upload so corrupt files fail here rather
/// than inside the extractor.
fn sniff(data: &[u8]) -> Result<ImageFormat, ExtractionError> {
    let format =
        image::guess_format(data).map_err(|e| ExtractionError::UnsupportedImage(e.to_string()))?;
    let decoded = image::load_from_memory_with_format(data, format)
        .map_err(|e| ExtractionError::UnsupportedImage(e.to_string()))?;
    tracing::debug!(
        ?format,
        width = decoded.width(),
        height = decoded.height(),
        "decoded upload"
    );
    Ok(format)
}

/// Reduce a client-supplied filename to a safe basename, falling back to
/// `upload.<ext>` when nothing usable is left.
fn upload_filename(original: Option<&str>, format: ImageFormat) -> String {
    let cleaned: String = original
        .and_then(|name| name.rsplit(['/', '\\']).next())
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        let ext = format.extensions_str().first().copied().unwrap_or("img");
        format!("upload.{ext}")
    } else {
        cleaned.to_string()
    }
}

fn parse_encodings(stdout: &[u8]) -> Result<Vec<Signature>, ExtractionError> {
    let encodings: Vec<Vec<f32>> = serde_json::from_slice(stdout)
        .map_err(|e| ExtractionError::MalformedOutput(e.to_string()))?;
    Ok(encodings.into_iter().map(Signature::new).collect())
}
