use std::time::Duration;

use tokio::time::sleep;

use crate::{
    identifier::assign_id,
    navigation::NavigationGuard,
    page::{Element, HttpClient, Page},
    retrieval::RetrievalChain,
    storage::{MediaStore, MediaWrite},
    types::{CandidateLink, Category, PostMetadata, RecordStatus, ResourceRecord, ScrapeError},
    utils::to_https,
};

const DESCRIPTION_SELECTOR: &str = "[data-testid=\"post_message\"]";
const TIMESTAMP_SELECTOR: &str = "[data-testid=\"post_timestamp\"]";
const HASHTAG_SELECTOR: &str = "a[href*=\"/hashtag/\"]";
const AUTHOR_SELECTOR: &str = "[data-testid=\"post_author\"]";

/// Where to look for the post's main media element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSelector {
    pub selector: String,
    pub in_frames: bool,
}

impl MediaSelector {
    fn document(selector: &str) -> Self {
        MediaSelector {
            selector: selector.into(),
            in_frames: false,
        }
    }

    fn frames(selector: &str) -> Self {
        MediaSelector {
            selector: selector.into(),
            in_frames: true,
        }
    }

    pub fn name(&self) -> String {
        if self.in_frames {
            format!("iframe {}", self.selector)
        } else {
            self.selector.clone()
        }
    }

    fn find<P: Page>(&self, page: &P) -> Option<Element> {
        let found = if self.in_frames {
            page.query_selector_in_frames(&self.selector)
        } else {
            page.query_selector(&self.selector)
        };
        found.unwrap_or(None)
    }
}

pub fn media_selectors(category: Category, cdn_marker: &str) -> Vec<MediaSelector> {
    match category {
        Category::Photo => vec![
            MediaSelector::document(&format!("img[src*=\"{}\"]", cdn_marker)),
            MediaSelector::document("img[data-testid=\"post_image\"]"),
            MediaSelector::document("img[class*=\"photo\"]"),
            MediaSelector::document("img[src*=\"facebook\"]"),
            MediaSelector::document("div[data-testid=\"post_image\"] img"),
            MediaSelector::document("div[class*=\"photo\"] img"),
        ],
        Category::Video => vec![
            MediaSelector::document("video[src]"),
            MediaSelector::document("video[data-testid=\"post_video\"]"),
            MediaSelector::document("div[data-testid=\"post_video\"] video"),
            MediaSelector::document("video[class*=\"video\"]"),
            MediaSelector::document("div[class*=\"video\"] video"),
            MediaSelector::document("video source[src]"),
            MediaSelector::document("video"),
            MediaSelector::frames("video"),
        ],
    }
}

/// `src` when it is a fetchable url, `data-src` otherwise.
pub fn resolve_src(element: &Element) -> Option<String> {
    element
        .attribute("src")
        .and_then(to_https)
        .or_else(|| element.attribute("data-src").and_then(to_https))
}

pub struct ResourceExtractor<'a, H: HttpClient> {
    guard: &'a NavigationGuard,
    retrieval: &'a RetrievalChain<H>,
    store: &'a MediaStore,
    selectors: Vec<MediaSelector>,
    profile: String,
    settle: Duration,
    target: String,
}

impl<'a, H: HttpClient> ResourceExtractor<'a, H> {
    pub fn new(
        guard: &'a NavigationGuard,
        retrieval: &'a RetrievalChain<H>,
        store: &'a MediaStore,
        selectors: Vec<MediaSelector>,
        profile: &str,
        settle: Duration,
        target: &str,
    ) -> Self {
        ResourceExtractor {
            guard,
            retrieval,
            store,
            selectors,
            profile: profile.into(),
            settle,
            target: target.into(),
        }
    }

    fn text_of<P: Page>(&self, page: &P, selector: &str) -> Option<String> {
        match page.query_selector(selector) {
            Ok(Some(el)) => Some(el.inner_text),
            Ok(None) => None,
            Err(e) => {
                debug!(target: self.target.as_str(), "could not read {}: {}", selector, e);
                None
            }
        }
    }

    /// Each field is read on its own; a missing one falls back to its default.
    pub fn extract_metadata<P: Page>(&self, page: &P, source_url: &str) -> PostMetadata {
        let hashtags = match page.query_selector_all(HASHTAG_SELECTOR) {
            Ok(els) => els
                .into_iter()
                .map(|el| el.inner_text.trim().to_string())
                .filter(|t| t.starts_with('#'))
                .collect(),
            Err(e) => {
                debug!(target: self.target.as_str(), "could not read hashtags: {}", e);
                vec![]
            }
        };
        PostMetadata {
            url: source_url.into(),
            description: self.text_of(page, DESCRIPTION_SELECTOR).unwrap_or_default(),
            timestamp: self.text_of(page, TIMESTAMP_SELECTOR).unwrap_or_default(),
            hashtags,
            author: self
                .text_of(page, AUTHOR_SELECTOR)
                .filter(|a| !a.trim().is_empty())
                .unwrap_or_else(|| self.profile.clone()),
        }
    }

    /// Walks the selector chain, stopping at the first match.
    pub fn locate_media<P: Page>(&self, page: &P) -> Result<(&MediaSelector, Element), ScrapeError> {
        for selector in &self.selectors {
            if let Some(el) = selector.find(page) {
                info!(
                    target: self.target.as_str(),
                    "media found with selector {}",
                    selector.name()
                );
                return Ok((selector, el));
            }
        }
        Err(ScrapeError::ElementNotFound(format!(
            "{} selectors exhausted",
            self.selectors.len()
        )))
    }

    pub async fn extract<P: Page>(&self, page: &P, link: &CandidateLink) -> ResourceRecord {
        let mut record = ResourceRecord::new(assign_id(&link.url, link.category), link);

        if let Err(e) = self.guard.goto(page, &link.url).await {
            warn!(target: self.target.as_str(), "skipping {}: {}", link.url, e);
            record.status = RecordStatus::FailedDownload;
            return record;
        }
        sleep(self.settle).await;

        record.metadata = self.extract_metadata(page, &link.url);

        let element = match self.locate_media(page) {
            Ok((_, el)) => el,
            Err(e) => {
                warn!(
                    target: self.target.as_str(),
                    "no {} found for {}: {}",
                    link.category,
                    link.url,
                    e
                );
                record.status = RecordStatus::FailedNoMedia;
                return record;
            }
        };

        record.media_url = resolve_src(&element);
        let exists = self.store.media_exists(&record.id, link.category).await;
        let mut payload = None;
        match &record.media_url {
            None => {
                warn!(target: self.target.as_str(), "no usable media src on {}", link.url);
                record.status = RecordStatus::FailedDownload;
            }
            // already on disk, only the sidecar gets refreshed
            Some(_) if exists => {}
            Some(media_url) => match self.retrieval.retrieve(page, media_url, link.category).await {
                Ok(p) => payload = Some(p.bytes),
                Err(e) => {
                    error!(
                        target: self.target.as_str(),
                        "could not download {} for {}: {}",
                        media_url,
                        record.id,
                        e
                    );
                    record.status = RecordStatus::FailedDownload;
                }
            },
        }

        // the sidecar is written whenever a media element was located
        match self
            .store
            .save(&record.id, link.category, payload.as_deref(), &record.metadata)
            .await
        {
            Ok(outcome) => {
                if let Err(e) = outcome.metadata {
                    warn!(target: self.target.as_str(), "{}", e);
                }
                match outcome.media {
                    MediaWrite::Written => {
                        record.status = RecordStatus::Downloaded;
                        record.local_path = Some(outcome.media_path);
                    }
                    MediaWrite::AlreadyPresent => {
                        record.status = RecordStatus::SkippedExists;
                        record.local_path = Some(outcome.media_path);
                    }
                    MediaWrite::NoPayload => {}
                }
            }
            Err(e) => {
                error!(
                    target: self.target.as_str(),
                    "could not save {}: {}",
                    record.id,
                    e
                );
                record.status = RecordStatus::FailedDownload;
            }
        }
        record
    }
}
