use std::collections::HashSet;

use crate::{
    page::Page,
    types::{BrowserError, CandidateLink, Category},
    utils::{is_target_domain, normalize_url},
};

/// One way of finding post links in the feed DOM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStrategy {
    HrefContains(String),
    TestAttribute(String),
    ClassContains(String),
    /// Nearest `<a>` ancestor of every element matching the media selector.
    MediaAncestor(String),
}

impl LinkStrategy {
    pub fn name(&self) -> String {
        match self {
            LinkStrategy::HrefContains(p) => format!("href*={}", p),
            LinkStrategy::TestAttribute(p) => format!("data-testid*={}", p),
            LinkStrategy::ClassContains(p) => format!("class*={}", p),
            LinkStrategy::MediaAncestor(sel) => format!("ancestor-of({})", sel),
        }
    }

    fn anchor_selector(&self) -> Option<String> {
        match self {
            LinkStrategy::HrefContains(p) => Some(format!("a[href*=\"{}\"]", p)),
            LinkStrategy::TestAttribute(p) => Some(format!("a[data-testid*=\"{}\"]", p)),
            LinkStrategy::ClassContains(p) => Some(format!("a[class*=\"{}\"]", p)),
            LinkStrategy::MediaAncestor(_) => None,
        }
    }

    pub fn collect<P: Page>(&self, page: &P) -> Result<Vec<String>, BrowserError> {
        match self {
            LinkStrategy::MediaAncestor(sel) => {
                let v = page.evaluate(&media_ancestor_script(sel))?;
                let raw = match v.as_str() {
                    Some(s) => s.to_string(),
                    None => return Ok(vec![]),
                };
                serde_json::from_str::<Vec<String>>(&raw)
                    .map_err(|e| BrowserError::Failed(format!("bad ancestor list: {}", e)))
            }
            _ => {
                let selector = self.anchor_selector().unwrap_or_default();
                Ok(page
                    .query_selector_all(&selector)?
                    .into_iter()
                    .filter_map(|el| el.attribute("href").map(|h| h.to_string()))
                    .collect())
            }
        }
    }
}

fn media_ancestor_script(media_selector: &str) -> String {
    let sel = serde_json::Value::String(media_selector.to_string()).to_string();
    format!(
        r#"JSON.stringify(Array.from(document.querySelectorAll({}))
            .map((m) => m.closest('a'))
            .filter((a) => a && a.getAttribute('href'))
            .map((a) => a.getAttribute('href')))"#,
        sel
    )
}

pub fn link_strategies(category: Category, cdn_marker: &str) -> Vec<LinkStrategy> {
    use LinkStrategy::*;
    match category {
        Category::Photo => vec![
            HrefContains("/photo/".into()),
            HrefContains("photo.php".into()),
            TestAttribute("photo".into()),
            ClassContains("photo".into()),
            MediaAncestor(format!("img[src*=\"{}\"]", cdn_marker)),
        ],
        Category::Video => vec![
            HrefContains("/videos/".into()),
            HrefContains("/video/".into()),
            HrefContains("/watch".into()),
            HrefContains("/reel/".into()),
            TestAttribute("video".into()),
            ClassContains("video".into()),
            MediaAncestor("video".into()),
        ],
    }
}

/// Collects post links from the feed, reporting each url only the first
/// time it is seen during the session.
pub struct LinkHarvester {
    category: Category,
    base_url: String,
    domain: String,
    strategies: Vec<LinkStrategy>,
    seen: HashSet<String>,
    target: String,
}

impl LinkHarvester {
    pub fn new(
        category: Category,
        base_url: &str,
        domain: &str,
        strategies: Vec<LinkStrategy>,
        target: &str,
    ) -> Self {
        LinkHarvester {
            category,
            base_url: base_url.into(),
            domain: domain.into(),
            strategies,
            seen: HashSet::new(),
            target: target.into(),
        }
    }

    /// Marks a url as already seen so it is never reported.
    pub fn seed(&mut self, url: &str) {
        if let Some(u) = normalize_url(&self.base_url, url) {
            self.seen.insert(u);
        }
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    pub fn harvest<P: Page>(&mut self, page: &P) -> Vec<CandidateLink> {
        let mut fresh: Vec<CandidateLink> = vec![];
        let mut batch: HashSet<String> = HashSet::new();

        // every strategy runs, results are unioned in strategy order
        for strategy in &self.strategies {
            let hrefs = match strategy.collect(page) {
                Ok(h) => h,
                Err(e) => {
                    debug!(
                        target: self.target.as_str(),
                        "strategy {} failed: {}",
                        strategy.name(),
                        e
                    );
                    continue;
                }
            };
            let mut added = 0;
            for href in hrefs {
                let url = match normalize_url(&self.base_url, &href) {
                    Some(u) => u,
                    None => continue,
                };
                if !is_target_domain(&url, &self.domain) {
                    continue;
                }
                if self.seen.contains(&url) || !batch.insert(url.clone()) {
                    continue;
                }
                added += 1;
                fresh.push(CandidateLink {
                    url,
                    category: self.category,
                });
            }
            if added > 0 {
                debug!(
                    target: self.target.as_str(),
                    "strategy {} found {} new {} links",
                    strategy.name(),
                    added,
                    self.category
                );
            }
        }

        self.seen.extend(batch);
        fresh
    }
}
