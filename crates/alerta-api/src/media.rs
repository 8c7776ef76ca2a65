use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};

/// 25 MB upload limit per attachment
pub const MAX_MEDIA_BYTES: usize = 25 * 1024 * 1024;

/// URL prefix the static file service mounts the media directory under.
pub const MEDIA_URL_PREFIX: &str = "/uploads";

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("attachment is {size} bytes, limit is {MAX_MEDIA_BYTES}")]
    TooLarge { size: usize },
    #[error("attachment is empty")]
    Empty,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Content-addressed attachment storage.
///
/// Each attachment is written once to `{dir}/{sha256}.{ext}` and referenced
/// from reports as `/uploads/{sha256}.{ext}`. Identical uploads share a file.
pub struct MediaStore {
    dir: PathBuf,
}

impl MediaStore {
    /// Open the media directory, creating it if needed.
    pub async fn new(dir: PathBuf) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(&dir).await?;
        info!("Media storage directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Store one attachment and return its public reference.
    pub async fn store(&self, original_name: Option<&str>, bytes: &[u8]) -> Result<String, MediaError> {
        if bytes.is_empty() {
            return Err(MediaError::Empty);
        }
        if bytes.len() > MAX_MEDIA_BYTES {
            return Err(MediaError::TooLarge { size: bytes.len() });
        }

        let digest = hex::encode(Sha256::digest(bytes));
        let file_name = match original_name.and_then(sanitized_extension) {
            Some(ext) => format!("{digest}.{ext}"),
            None => digest,
        };

        let path = self.dir.join(&file_name);
        if tokio::fs::try_exists(&path).await? {
            debug!("Attachment {} already stored", file_name);
        } else {
            // Write under a temporary name so a concurrent reader never
            // sees a partial file.
            let tmp = self.dir.join(format!(".{file_name}.{}", uuid::Uuid::new_v4()));
            tokio::fs::write(&tmp, bytes).await?;
            tokio::fs::rename(&tmp, &path).await?;
            debug!("Stored attachment {} ({} bytes)", file_name, bytes.len());
        }

        Ok(format!("{MEDIA_URL_PREFIX}/{file_name}"))
    }
}

/// Lowercased extension of an uploaded file name, if it is short and plain
/// alphanumeric. Anything else is dropped rather than trusted on disk.
fn sanitized_extension(name: &str) -> Option<String> {
    let ext = Path::new(name).extension()?.to_str()?;
    if ext.is_empty() || ext.len() > 8 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
