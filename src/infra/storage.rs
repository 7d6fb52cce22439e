use anyhow::{anyhow, bail, Result};
use image::ImageFormat;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Local file area for uploaded images. Entities only ever hold the
/// returned reference string, never image bytes.
#[derive(Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Sniff the image format from the bytes (the original filename is not
    /// trusted) and persist under a fresh UUID name. Returns the reference.
    pub async fn save(&self, bytes: &[u8]) -> Result<String> {
        let format = image::guess_format(bytes)
            .map_err(|_| anyhow!("unrecognized image data"))?;
        let extension = match format {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Gif => "gif",
            other => bail!("unsupported image format: {:?}", other),
        };
        let name = format!("{}.{}", Uuid::new_v4(), extension);
        tokio::fs::write(self.root.join(&name), bytes).await?;
        Ok(name)
    }

    pub async fn remove(&self, name: &str) -> Result<()> {
        if name.contains('/') || name.contains('\\') {
            bail!("invalid media reference: {}", name);
        }
        match tokio::fs::remove_file(self.root.join(name)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
