use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use rand::Rng;
use tracing::debug;

/// Uploads above this size are rejected before touching the disk.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("Only image files are allowed!")]
    NotAnImage,
    #[error("File too large")]
    TooLarge,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Writes uploaded images under a single directory and hands back the
/// public URL they will be served from.
#[derive(Clone)]
pub struct ImageStore {
    dir: PathBuf,
    public_prefix: String,
}

#[derive(Debug)]
pub struct StoredImage {
    pub filename: String,
    pub url: String,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>, public_prefix: &str) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            public_prefix: public_prefix.trim_end_matches('/').to_string(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persists one uploaded file. Only `image/*` content types are
    /// accepted. The generated name is not checked for existence on disk;
    /// the millisecond timestamp plus random suffix is collision-resistant
    /// enough for this service.
    pub async fn store(
        &self,
        bytes: Bytes,
        original_filename: &str,
        content_type: &str,
    ) -> Result<StoredImage, ImageError> {
        if !content_type.starts_with("image/") {
            return Err(ImageError::NotAnImage);
        }
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(ImageError::TooLarge);
        }

        let filename = unique_name(original_filename);
        tokio::fs::write(self.dir.join(&filename), &bytes).await?;
        debug!(%filename, size = bytes.len(), "image written");

        let url = format!("{}/{}", self.public_prefix, filename);
        Ok(StoredImage { filename, url })
    }
}

fn unique_name(original: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let suffix: u32 = rand::thread_rng().gen();
    match extension(original) {
        Some(ext) => format!("{millis}-{suffix}.{ext}"),
        None => format!("{millis}-{suffix}"),
    }
}

fn extension(name: &str) -> Option<&str> {
    Path::new(name).extension().and_then(|e| e.to_str())
}
