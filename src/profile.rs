use std::time::Duration;

use tokio::time::sleep;

use crate::{
    navigation::NavigationGuard,
    page::Page,
    types::{Category, ProfileInfo, ScrapeError},
    utils::profile_url,
};

const LOGIN_INDICATORS: [&str; 4] = [
    "[data-testid=\"login_button\"]",
    ".login-button",
    "form[action*=\"login\"]",
    "input[name=\"pass\"]",
];

const NAME_SELECTOR: &str = "h1";
const DESCRIPTION_SELECTOR: &str = "[data-testid=\"profile_tab_container\"] p";
const MISSING_DESCRIPTION: &str = "No disponible";

fn tab_selectors(category: Category) -> [&'static str; 2] {
    match category {
        Category::Photo => ["a[href*=\"/photos\"]", "[data-testid=\"photos_tab\"]"],
        Category::Video => ["a[href*=\"/videos\"]", "[data-testid=\"videos_tab\"]"],
    }
}

/// The profile landing page and the category tabs reachable from it.
pub struct ProfilePage<'a> {
    guard: &'a NavigationGuard,
    profile: String,
    url: String,
    settle: Duration,
    target: String,
}

impl<'a> ProfilePage<'a> {
    pub fn new(
        guard: &'a NavigationGuard,
        base_url: &str,
        profile: &str,
        settle: Duration,
        target: &str,
    ) -> Self {
        ProfilePage {
            guard,
            profile: profile.into(),
            url: profile_url(base_url, profile),
            settle,
            target: target.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn open<P: Page>(&self, page: &P) -> Result<(), ScrapeError> {
        self.guard.goto(page, &self.url).await
    }

    /// First login indicator present on the page, if any.
    pub fn login_wall<P: Page>(&self, page: &P) -> Option<&'static str> {
        let found = LOGIN_INDICATORS
            .iter()
            .find(|sel| matches!(page.query_selector(sel), Ok(Some(_))))
            .copied();
        if let Some(sel) = found {
            warn!(
                target: self.target.as_str(),
                "{} looks like a login wall ({}), content may be limited",
                self.url,
                sel
            );
        }
        found
    }

    /// Opens the category tab and returns the url the feed ended up on.
    /// Never fails: whatever page is loaded becomes the feed.
    pub async fn open_category<P: Page>(&self, page: &P, category: Category) -> String {
        for sel in tab_selectors(category) {
            match page.click(sel) {
                Ok(true) => {
                    sleep(self.settle).await;
                    let feed = page.current_url();
                    info!(target: self.target.as_str(), "opened {} tab via {} at {}", category, sel, feed);
                    return feed;
                }
                Ok(false) => {}
                Err(e) => debug!(target: self.target.as_str(), "could not click {}: {}", sel, e),
            }
        }

        let fallback = format!("{}/{}", self.url, category.tab_path());
        debug!(target: self.target.as_str(), "no {} tab found, loading {}", category, fallback);
        if let Err(e) = self.guard.goto(page, &fallback).await {
            warn!(
                target: self.target.as_str(),
                "could not open {} tab, staying on {}: {}",
                category,
                page.current_url(),
                e
            );
        }
        page.current_url()
    }

    /// Name and description read from the currently loaded profile page.
    pub fn read_info<P: Page>(&self, page: &P) -> ProfileInfo {
        let text = |sel: &str| match page.query_selector(sel) {
            Ok(Some(el)) => Some(el.inner_text.trim().to_string()).filter(|t| !t.is_empty()),
            _ => None,
        };
        ProfileInfo {
            name: text(NAME_SELECTOR).unwrap_or_else(|| self.profile.clone()),
            description: text(DESCRIPTION_SELECTOR).unwrap_or_else(|| MISSING_DESCRIPTION.into()),
            url: self.url.clone(),
        }
    }
}

pub async fn profile_info<P: Page>(
    page: &P,
    guard: &NavigationGuard,
    base_url: &str,
    profile: &str,
    target: &str,
) -> Result<ProfileInfo, ScrapeError> {
    let p = ProfilePage::new(guard, base_url, profile, Duration::ZERO, target);
    p.open(page).await?;
    p.login_wall(page);
    Ok(p.read_info(page))
}
