//! Content-addressed image store
//!
//! Objects live under `<root>/images/<sha256 hex>`. Uploading identical bytes
//! twice is a no-op that returns the same key.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shelf_common::{Error, Result};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// URL prefix under which stored images are served
pub const IMAGE_URL_PREFIX: &str = "/images";

/// Result of an upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredImage {
    /// SHA-256 of the content (lowercase hex)
    pub hash: String,
    /// Retrieval URL
    pub url: String,
    /// True when the object was already present
    pub exists: bool,
}

/// Filesystem-backed image store
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    /// Store rooted at `<root_folder>/images`
    pub fn new(root_folder: &Path) -> Self {
        Self {
            dir: root_folder.join("images"),
        }
    }

    /// Directory holding stored objects
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the backing directory if missing
    pub async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Store bytes under their content hash
    ///
    /// Writes go to a temporary sibling first and are renamed into place, so
    /// a reader never observes a partially written object.
    pub async fn upload(&self, bytes: &[u8]) -> Result<StoredImage> {
        let hash = hash_bytes(bytes);
        let path = self.object_path(&hash)?;
        let url = image_url(&hash);

        if tokio::fs::try_exists(&path).await? {
            tracing::debug!(hash = %hash, "Image already stored");
            return Ok(StoredImage {
                hash,
                url,
                exists: true,
            });
        }

        self.ensure_dir().await?;
        let tmp_path = self.temp_path(&hash);
        tokio::fs::write(&tmp_path, bytes).await?;
        commit(&tmp_path, &path).await?;

        tracing::info!(hash = %hash, size = bytes.len(), "Stored image");

        Ok(StoredImage {
            hash,
            url,
            exists: false,
        })
    }

    /// Store a file from disk under its content hash
    ///
    /// The file is hashed in chunks first; one already in the store is never
    /// copied.
    pub async fn upload_file(&self, file_path: &Path) -> Result<StoredImage> {
        let hash = hash_file(file_path).await?;
        let path = self.object_path(&hash)?;
        let url = image_url(&hash);

        if tokio::fs::try_exists(&path).await? {
            tracing::debug!(hash = %hash, file = %file_path.display(), "Image already stored");
            return Ok(StoredImage {
                hash,
                url,
                exists: true,
            });
        }

        self.ensure_dir().await?;
        let tmp_path = self.temp_path(&hash);
        let size = tokio::fs::copy(file_path, &tmp_path).await?;
        commit(&tmp_path, &path).await?;

        tracing::info!(hash = %hash, size, file = %file_path.display(), "Stored image");

        Ok(StoredImage {
            hash,
            url,
            exists: false,
        })
    }

    /// Read a stored object back
    pub async fn read(&self, hash: &str) -> Result<Vec<u8>> {
        let path = self.object_path(hash)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("Image {}", hash)))
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn temp_path(&self, hash: &str) -> PathBuf {
        self.dir.join(format!(".{}.{}.tmp", hash, Uuid::new_v4()))
    }

    fn object_path(&self, hash: &str) -> Result<PathBuf> {
        if !is_valid_hash(hash) {
            return Err(Error::InvalidInput(format!("Malformed image hash: {}", hash)));
        }
        Ok(self.dir.join(hash))
    }
}

/// Rename a fully written temp file into place
async fn commit(tmp_path: &Path, path: &Path) -> Result<()> {
    if let Err(e) = tokio::fs::rename(tmp_path, path).await {
        let _ = tokio::fs::remove_file(tmp_path).await;
        return Err(Error::Io(e));
    }
    Ok(())
}

/// SHA-256 of a byte slice as lowercase hex
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Retrieval URL for a content hash
pub fn image_url(hash: &str) -> String {
    format!("{}/{}", IMAGE_URL_PREFIX, hash)
}

fn is_valid_hash(hash: &str) -> bool {
    hash.len() == 64 && hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
}

/// Calculate SHA-256 of a file on disk
///
/// Reads in 1 MiB chunks on the blocking pool.
pub async fn hash_file(file_path: &Path) -> Result<String> {
    let path_buf = file_path.to_path_buf();

    let hash = tokio::task::spawn_blocking(move || -> Result<String> {
        use std::fs::File;
        use std::io::Read;

        let mut file = File::open(&path_buf)?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; 1024 * 1024];

        loop {
            let bytes_read = file.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(format!("{:x}", hasher.finalize()))
    })
    .await
    .map_err(|e| Error::Internal(format!("Hash calculation task failed: {}", e)))??;

    Ok(hash)
}
