use std::time::Duration;

use tokio::time::sleep;

use crate::page::Page;

pub const SCROLL_TO_BOTTOM_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight)";
pub const SMOOTH_SCROLL_SCRIPT: &str =
    "window.scrollTo({ top: document.body.scrollHeight, behavior: 'smooth' })";
pub const DOCUMENT_HEIGHT_SCRIPT: &str = "document.body.scrollHeight";

fn scroll_by_script(step: i64) -> String {
    format!("window.scrollBy(0, {})", step)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrollState {
    pub last_height: i64,
    pub no_growth_streak: usize,
    pub no_new_links_streak: usize,
    pub attempts: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    MaxAttempts,
    NoNewContent,
    LimitReached,
}

pub fn limit_reached(processed: usize, limit: usize) -> bool {
    limit > 0 && processed >= limit
}

/// Drives the infinite-scroll feed for one category pass.
pub struct ScrollPager {
    state: ScrollState,
    max_attempts: usize,
    max_no_new_content: usize,
    settle: Duration,
    step: i64,
    target: String,
}

impl ScrollPager {
    pub fn new(
        max_attempts: usize,
        max_no_new_content: usize,
        settle: Duration,
        step: i64,
        target: &str,
    ) -> Self {
        ScrollPager {
            state: ScrollState::default(),
            max_attempts,
            max_no_new_content,
            settle,
            step,
            target: target.into(),
        }
    }

    pub fn state(&self) -> &ScrollState {
        &self.state
    }

    async fn run_script<P: Page>(&self, page: &P, script: &str) {
        if let Err(e) = page.evaluate(script) {
            debug!(target: self.target.as_str(), "scroll script failed: {}", e);
        }
        sleep(self.settle).await;
    }

    fn sample_height<P: Page>(&self, page: &P) -> Option<i64> {
        match page.evaluate(DOCUMENT_HEIGHT_SCRIPT) {
            Ok(v) => v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)),
            Err(e) => {
                debug!(target: self.target.as_str(), "could not read document height: {}", e);
                None
            }
        }
    }

    /// One composite scroll followed by a height sample. Never fails: a
    /// script error or unreadable height counts as no growth.
    pub async fn scroll<P: Page>(&mut self, page: &P) {
        self.run_script(page, &scroll_by_script(self.step)).await;
        self.run_script(page, SCROLL_TO_BOTTOM_SCRIPT).await;
        if let Err(e) = page.press_key("End") {
            debug!(target: self.target.as_str(), "End key failed: {}", e);
        }
        sleep(self.settle).await;
        self.run_script(page, SMOOTH_SCROLL_SCRIPT).await;

        self.state.attempts += 1;
        match self.sample_height(page) {
            Some(h) if h != self.state.last_height => {
                self.state.no_growth_streak = 0;
                self.state.last_height = h;
            }
            _ => self.state.no_growth_streak += 1,
        }
        debug!(
            target: self.target.as_str(),
            "scroll {}/{}: height={} no_growth={} no_new_links={}",
            self.state.attempts,
            self.max_attempts,
            self.state.last_height,
            self.state.no_growth_streak,
            self.state.no_new_links_streak
        );
    }

    pub fn record_harvest(&mut self, new_links: usize) {
        if new_links > 0 {
            self.state.no_new_links_streak = 0;
        } else {
            self.state.no_new_links_streak += 1;
        }
    }

    /// First matching end condition, checked in a fixed order.
    pub fn termination(&self, processed: usize, limit: usize) -> Option<Termination> {
        if self.state.attempts >= self.max_attempts {
            return Some(Termination::MaxAttempts);
        }
        if self.state.no_new_links_streak >= self.max_no_new_content {
            return Some(Termination::NoNewContent);
        }
        if limit_reached(processed, limit) {
            return Some(Termination::LimitReached);
        }
        None
    }

    /// Scrolls a freshly reloaded feed back down to the depth reached before
    /// leaving it. Leaves the scroll state untouched.
    pub async fn restore<P: Page>(&self, page: &P) {
        let wanted = self.state.last_height;
        for _ in 0..=self.state.attempts {
            self.run_script(page, SCROLL_TO_BOTTOM_SCRIPT).await;
            match self.sample_height(page) {
                Some(h) if h >= wanted => return,
                _ => {}
            }
        }
        debug!(
            target: self.target.as_str(),
            "feed did not grow back to height {}",
            wanted
        );
    }
}
