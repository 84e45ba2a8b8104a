use std::path::{Path, PathBuf};

use tokio::fs;

use crate::types::{Category, PostMetadata, ScrapeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaWrite {
    Written,
    AlreadyPresent,
    NoPayload,
}

#[derive(Debug)]
pub struct SaveOutcome {
    pub media: MediaWrite,
    pub media_path: PathBuf,
    pub metadata: Result<PathBuf, ScrapeError>,
}

/// Files for one profile: `<base>/<profile>/imagenes|videos/<id>.{jpg,mp4,json}`.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
    target: String,
}

impl MediaStore {
    pub fn new(base_dir: &Path, profile: &str, target: &str) -> Self {
        MediaStore {
            root: base_dir.join(profile),
            target: target.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn category_dir(&self, category: Category) -> PathBuf {
        self.root.join(category.dir_name())
    }

    pub async fn prepare(&self) -> Result<(), ScrapeError> {
        for category in [Category::Photo, Category::Video] {
            let dir = self.category_dir(category);
            fs::create_dir_all(&dir).await?;
            debug!(target: self.target.as_str(), "directory ready {:?}", dir);
        }
        Ok(())
    }

    pub fn media_path(&self, id: &str, category: Category) -> PathBuf {
        self.category_dir(category)
            .join(format!("{}.{}", id, category.extension()))
    }

    pub fn metadata_path(&self, id: &str, category: Category) -> PathBuf {
        self.category_dir(category).join(format!("{}.json", id))
    }

    pub async fn media_exists(&self, id: &str, category: Category) -> bool {
        fs::metadata(self.media_path(id, category)).await.is_ok()
    }

    /// Writes the payload unless the media file is already there, then
    /// always (re)writes the sidecar. A sidecar failure is reported in the
    /// outcome, it does not fail the save.
    pub async fn save(
        &self,
        id: &str,
        category: Category,
        payload: Option<&[u8]>,
        metadata: &PostMetadata,
    ) -> Result<SaveOutcome, ScrapeError> {
        let media_path = self.media_path(id, category);
        let exists = self.media_exists(id, category).await;
        let media = match payload {
            _ if exists => {
                info!(target: self.target.as_str(), "already present {:?}", media_path);
                MediaWrite::AlreadyPresent
            }
            Some(bytes) => {
                fs::write(&media_path, bytes).await?;
                info!(
                    target: self.target.as_str(),
                    "saved {:?} ({} bytes)",
                    media_path,
                    bytes.len()
                );
                MediaWrite::Written
            }
            None => MediaWrite::NoPayload,
        };

        let metadata = self.write_metadata(id, category, metadata).await;
        Ok(SaveOutcome {
            media,
            media_path,
            metadata,
        })
    }

    pub async fn write_metadata(
        &self,
        id: &str,
        category: Category,
        metadata: &PostMetadata,
    ) -> Result<PathBuf, ScrapeError> {
        let path = self.metadata_path(id, category);
        let json = serde_json::to_vec_pretty(metadata).map_err(|e| ScrapeError::MetadataWrite {
            path: path.clone(),
            source: e.into(),
        })?;
        fs::write(&path, json)
            .await
            .map_err(|e| ScrapeError::MetadataWrite {
                path: path.clone(),
                source: e,
            })?;
        debug!(target: self.target.as_str(), "metadata written {:?}", path);
        Ok(path)
    }
}
