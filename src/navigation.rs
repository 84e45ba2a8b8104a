use std::{cell::Cell, time::Duration};

use tokio::time::sleep;
use tokio_retry::RetryIf;

use crate::{
    page::Page,
    types::{BrowserError, ScrapeError},
};

/// Every page load in a run goes through here. Timeouts are retried with a
/// linear backoff (`backoff * attempt`); anything else fails straight away.
pub struct NavigationGuard {
    retries: usize,
    backoff: Duration,
    timeout: Duration,
    settle: Duration,
    domain: String,
    target: String,
}

impl NavigationGuard {
    pub fn new(
        retries: usize,
        backoff: Duration,
        timeout: Duration,
        settle: Duration,
        domain: &str,
        target: &str,
    ) -> Self {
        NavigationGuard {
            retries: retries.max(1),
            backoff,
            timeout,
            settle,
            domain: domain.into(),
            target: target.into(),
        }
    }

    fn backoff_strategy(&self) -> impl Iterator<Item = Duration> {
        let backoff = self.backoff;
        (1..self.retries).map(move |attempt| backoff * attempt as u32)
    }

    pub async fn goto<P: Page>(&self, page: &P, url: &str) -> Result<(), ScrapeError> {
        if url.trim().is_empty() {
            return Err(ScrapeError::Navigation {
                url: url.into(),
                attempts: 0,
                source: BrowserError::Failed("empty url".into()),
            });
        }

        let attempts = Cell::new(0usize);
        let result = RetryIf::spawn(
            self.backoff_strategy(),
            || {
                attempts.set(attempts.get() + 1);
                debug!(
                    target: self.target.as_str(),
                    "loading {} (attempt {}/{})",
                    url,
                    attempts.get(),
                    self.retries
                );
                let res = page.navigate(url, self.timeout);
                async move { res }
            },
            |e: &BrowserError| {
                if e.is_timeout() && attempts.get() < self.retries {
                    warn!(
                        target: self.target.as_str(),
                        "timeout loading {}, attempt {}/{}, retrying in {:?}",
                        url,
                        attempts.get(),
                        self.retries,
                        self.backoff * attempts.get() as u32
                    );
                }
                e.is_timeout()
            },
        )
        .await;

        if let Err(e) = result {
            error!(
                target: self.target.as_str(),
                "could not load {} after {} attempts: {}",
                url,
                attempts.get(),
                e
            );
            return Err(ScrapeError::Navigation {
                url: url.into(),
                attempts: attempts.get(),
                source: e,
            });
        }

        sleep(self.settle).await;

        let landed = page.current_url();
        if !landed.contains(&self.domain) {
            // a landing outside the domain is not a failure
            warn!(
                target: self.target.as_str(),
                "{} landed on {} which is outside {}, continuing",
                url,
                landed,
                self.domain
            );
        }
        Ok(())
    }
}
