use anyhow::Result;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

use sack_types::error::{MarketError, MarketResult};

/// 10 MiB cap on a single toy photo.
pub const MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;

/// Public route prefix the image directory is served under.
pub const IMAGE_ROUTE: &str = "/images";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
}

impl ImageFormat {
    /// Identifies the format from the file signature. The declared content
    /// type is not trusted.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(ImageFormat::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageFormat::Jpeg)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(ImageFormat::Gif)
        } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(ImageFormat::Webp)
        } else {
            None
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Gif => "gif",
            ImageFormat::Webp => "webp",
        }
    }
}

/// On-disk storage for toy photos.
///
/// Each image is a flat file `{dir}/{uuid}.{ext}`, served publicly at
/// `{public_url}/images/{uuid}.{ext}`.
pub struct ImageStore {
    dir: PathBuf,
    public_url: String,
}

impl ImageStore {
    pub async fn new(dir: PathBuf, public_url: &str) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Image storage directory: {}", dir.display());
        Ok(Self {
            dir,
            public_url: public_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn url_for(&self, file_name: &str) -> String {
        format!("{}{}/{}", self.public_url, IMAGE_ROUTE, file_name)
    }

    /// Maps a public URL back to a file name in this store. URLs that point
    /// elsewhere, or try to escape the directory, yield `None`.
    pub fn file_name_of<'a>(&self, url: &'a str) -> Option<&'a str> {
        let name = url
            .strip_prefix(self.public_url.as_str())?
            .strip_prefix(IMAGE_ROUTE)?
            .strip_prefix('/')?;
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.starts_with('.') {
            return None;
        }
        Some(name)
    }

    /// Validates and writes an upload, returning its public URL.
    pub async fn save(&self, bytes: &[u8]) -> MarketResult<String> {
        if bytes.is_empty() {
            return Err(MarketError::validation("image file is empty"));
        }
        if bytes.len() > MAX_IMAGE_SIZE {
            return Err(MarketError::validation("image must be at most 10 MiB"));
        }
        let format = ImageFormat::sniff(bytes).ok_or_else(|| {
            MarketError::validation("image must be a PNG, JPEG, GIF or WebP file")
        })?;

        let file_name = format!("{}.{}", Uuid::new_v4(), format.extension());
        self.write(&file_name, bytes)
            .await
            .map_err(|e| MarketError::Backend(format!("failed to store image {file_name}: {e:#}")))?;

        Ok(self.url_for(&file_name))
    }

    async fn write(&self, file_name: &str, bytes: &[u8]) -> Result<()> {
        let mut file = fs::File::create(self.dir.join(file_name)).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        Ok(())
    }

    /// Deletes the image behind a public URL. Missing files are not an error.
    pub async fn delete(&self, url: &str) -> Result<()> {
        let Some(file_name) = self.file_name_of(url) else {
            warn!("Image URL {} is not managed by this store", url);
            return Ok(());
        };
        match fs::remove_file(self.dir.join(file_name)).await {
            Ok(()) => {
                info!("Deleted image {}", file_name);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Image {} already gone", file_name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
