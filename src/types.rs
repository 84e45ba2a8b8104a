use std::{fmt, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrowserError {
    #[error("timeout: {0}")]
    Timeout(String),
    #[error("browser: {0}")]
    Failed(String),
}

impl BrowserError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, BrowserError::Timeout(_))
    }
}

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("navigation to {url} failed after {attempts} attempts: {source}")]
    Navigation {
        url: String,
        attempts: usize,
        #[source]
        source: BrowserError,
    },
    #[error("no element found for {0}")]
    ElementNotFound(String),
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("transport: {0}")]
    Transport(String),
    #[error("metadata write for {path:?}: {source}")]
    MetadataWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Browser(#[from] BrowserError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Photo,
    Video,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Photo => "photo",
            Category::Video => "video",
        }
    }

    /// Directory under the profile folder holding this category's files.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Category::Photo => "imagenes",
            Category::Video => "videos",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Category::Photo => "jpg",
            Category::Video => "mp4",
        }
    }

    /// Content-type prefix a retrieved payload must carry.
    pub fn media_class(&self) -> &'static str {
        match self {
            Category::Photo => "image/",
            Category::Video => "video/",
        }
    }

    /// Path segment of the profile tab listing this category.
    pub fn tab_path(&self) -> &'static str {
        match self {
            Category::Photo => "photos",
            Category::Video => "videos",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateLink {
    pub url: String,
    pub category: Category,
}

/// Post metadata as persisted in the JSON sidecar.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostMetadata {
    pub url: String,
    #[serde(rename = "descripcion")]
    pub description: String,
    #[serde(rename = "fecha")]
    pub timestamp: String,
    pub hashtags: Vec<String>,
    #[serde(rename = "autor")]
    pub author: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    Pending,
    Downloaded,
    SkippedExists,
    FailedNoMedia,
    FailedDownload,
}

impl RecordStatus {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            RecordStatus::FailedNoMedia | RecordStatus::FailedDownload
        )
    }
}

#[derive(Debug, Clone)]
pub struct ResourceRecord {
    pub id: String,
    pub category: Category,
    pub source_url: String,
    pub media_url: Option<String>,
    pub metadata: PostMetadata,
    pub local_path: Option<PathBuf>,
    pub status: RecordStatus,
}

impl ResourceRecord {
    pub fn new(id: String, link: &CandidateLink) -> Self {
        ResourceRecord {
            id,
            category: link.category,
            source_url: link.url.clone(),
            media_url: None,
            metadata: PostMetadata::default(),
            local_path: None,
            status: RecordStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub photos: usize,
    pub videos: usize,
    pub skipped_existing: usize,
    pub errors: usize,
}

impl SessionStats {
    pub fn record(&mut self, record: &ResourceRecord) {
        match record.status {
            RecordStatus::Downloaded => match record.category {
                Category::Photo => self.photos += 1,
                Category::Video => self.videos += 1,
            },
            RecordStatus::SkippedExists => self.skipped_existing += 1,
            status if status.is_failure() => self.errors += 1,
            _ => {}
        }
    }

    pub fn downloaded(&self) -> usize {
        self.photos + self.videos
    }
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "photos={} videos={} skipped={} errors={}",
            self.photos, self.videos, self.skipped_existing, self.errors
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileInfo {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "descripcion")]
    pub description: String,
    pub url: String,
}
