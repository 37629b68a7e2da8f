// SPDX-License-Identifier: GPL-3.0-or-later
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use async_trait::async_trait;
use image::RgbImage;
use tokio::fs;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, trace};

use super::composite::with_alpha;
use super::Overlay;

/// Writes the overlay as raw RGBA bytes, row by row, for an external compositor to pick up.
///
/// The file is rewritten in place on every update so a reader never sees it shrink.
#[derive(Debug)]
pub(crate) struct FileOverlay {
    path: PathBuf,
    alpha: u8,
    file: Option<fs::File>,
}

impl FileOverlay {
    pub(crate) fn new(path: &Path, alpha: u8) -> Self {
        Self {
            path: path.to_path_buf(),
            alpha,
            file: None,
        }
    }

    async fn open(&mut self) -> anyhow::Result<&mut fs::File> {
        let file = match self.file.take() {
            Some(file) => file,
            None => {
                let file = fs::OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(&self.path)
                    .await
                    .with_context(|| {
                        format!("Unable to create overlay file {}", self.path.display())
                    })?;
                debug!(path = ?self.path, "Created overlay file");
                file
            }
        };
        Ok(self.file.insert(file))
    }
}

#[async_trait]
impl Overlay for FileOverlay {
    async fn update(&mut self, image: &RgbImage) -> anyhow::Result<()> {
        let layer = with_alpha(image, self.alpha);
        let file = self.open().await?;
        file.seek(SeekFrom::Start(0)).await?;
        file.write_all(layer.as_raw()).await?;
        file.flush().await?;
        trace!(bytes = layer.as_raw().len(), "Wrote overlay file");
        Ok(())
    }

    async fn remove(&mut self) -> anyhow::Result<()> {
        if self.file.take().is_none() {
            return Ok(());
        }
        match fs::remove_file(&self.path).await {
            Ok(_) => {
                debug!(path = ?self.path, "Removed overlay file");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| {
                format!("Unable to remove overlay file {}", self.path.display())
            }),
        }
    }
}
