use std::{path::PathBuf, time::Duration};

use anyhow::{anyhow, Context};

use crate::{
    extractor::{media_selectors, ResourceExtractor},
    harvester::{link_strategies, LinkHarvester},
    navigation::NavigationGuard,
    page::{HttpClient, Page},
    pager::{limit_reached, ScrollPager, Termination},
    profile::{profile_info, ProfilePage},
    retrieval::{RetrievalChain, DEFAULT_MIN_PAYLOAD_BYTES},
    storage::MediaStore,
    types::{Category, ProfileInfo, RecordStatus, SessionStats},
    utils::{target_domain, BASE_URL, DEFAULT_OUTPUT_DIR},
};

#[derive(Builder, Debug, Clone)]
#[builder(setter(into))]
pub struct RunnerOptions {
    // files land in <output_dir>/<profile>/imagenes|videos
    #[builder(default = "self.default_output_dir()")]
    output_dir: PathBuf,
    // per category caps, 0 means unlimited
    #[builder(default = "0")]
    max_photos: usize,
    #[builder(default = "0")]
    max_videos: usize,
    #[builder(default = "30")]
    max_scroll_attempts: usize,
    // consecutive harvests without a new link before a pass ends
    #[builder(default = "8")]
    max_no_new_content: usize,
    #[builder(default = "3")]
    navigation_retries: usize,
    #[builder(default = "Duration::from_secs(3)")]
    navigation_backoff: Duration,
    #[builder(default = "Duration::from_secs(30)")]
    navigation_timeout: Duration,
    // wait after every successful page load
    #[builder(default = "Duration::from_secs(3)")]
    navigation_settle: Duration,
    // extra wait on a post page before reading it
    #[builder(default = "Duration::from_secs(5)")]
    post_settle: Duration,
    #[builder(default = "Duration::from_secs(2)")]
    scroll_settle: Duration,
    #[builder(default = "800")]
    scroll_step: i64,
    #[builder(default = "DEFAULT_MIN_PAYLOAD_BYTES")]
    min_payload_bytes: usize,
    // hostname fragment of the image cdn
    #[builder(default = "self.default_cdn_marker()")]
    cdn_marker: String,
    #[builder(default = "self.default_base_url()")]
    base_url: String,
}

impl RunnerOptions {
    pub fn default_builder() -> RunnerOptionsBuilder {
        RunnerOptionsBuilder::default()
    }

    fn limit(&self, category: Category) -> usize {
        match category {
            Category::Photo => self.max_photos,
            Category::Video => self.max_videos,
        }
    }
}

impl RunnerOptionsBuilder {
    fn default_output_dir(&self) -> PathBuf {
        PathBuf::from(DEFAULT_OUTPUT_DIR)
    }
    fn default_cdn_marker(&self) -> String {
        String::from("scontent")
    }
    fn default_base_url(&self) -> String {
        BASE_URL.clone()
    }
}

/// How one category pass ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub category: Category,
    pub termination: Termination,
    pub scroll_attempts: usize,
    pub saved: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    pub stats: SessionStats,
    pub passes: Vec<PassReport>,
}

// everything a pass needs that lives for the whole run
struct Session<'a> {
    guard: &'a NavigationGuard,
    store: &'a MediaStore,
    profile_page: &'a ProfilePage<'a>,
    profile: &'a str,
    domain: &'a str,
    target: &'a str,
}

/// Runs the discovery and download pipeline for a profile on a single page.
pub struct Runner<P: Page, H: HttpClient> {
    page: P,
    retrieval: RetrievalChain<H>,
    options: RunnerOptions,
}

impl<P: Page, H: HttpClient> Runner<P, H> {
    pub fn new(page: P, http: H, options: RunnerOptions) -> Self {
        let retrieval = RetrievalChain::new(http, options.min_payload_bytes, "feedgrab::retrieval");
        Runner {
            page,
            retrieval,
            options,
        }
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    fn guard(&self, domain: &str, target: &str) -> NavigationGuard {
        NavigationGuard::new(
            self.options.navigation_retries,
            self.options.navigation_backoff,
            self.options.navigation_timeout,
            self.options.navigation_settle,
            domain,
            target,
        )
    }

    fn domain(&self) -> anyhow::Result<String> {
        target_domain(&self.options.base_url)
            .ok_or_else(|| anyhow!("base url {} has no host", self.options.base_url))
    }

    pub async fn info(&self, profile: &str) -> anyhow::Result<ProfileInfo> {
        let profile = validate_profile(profile)?;
        let target = format!("feedgrab::{}", profile);
        let guard = self.guard(&self.domain()?, &target);
        profile_info(&self.page, &guard, &self.options.base_url, profile, &target)
            .await
            .context(format!("could not load profile {}", profile))
    }

    pub async fn run(&self, profile: &str) -> anyhow::Result<CrawlReport> {
        let profile = validate_profile(profile)?;
        let target = format!("feedgrab::{}", profile);
        let domain = self.domain()?;
        let guard = self.guard(&domain, &target);

        let store = MediaStore::new(&self.options.output_dir, profile, &target);
        store
            .prepare()
            .await
            .context(format!("could not create directories under {:?}", store.root()))?;

        let profile_page = ProfilePage::new(
            &guard,
            &self.options.base_url,
            profile,
            self.options.navigation_settle,
            &target,
        );

        info!(
            target: target.as_str(),
            "starting {} into {:?} (max photos: {}, max videos: {}, {} scrolls, {} retries)",
            profile_page.url(),
            store.root(),
            self.options.max_photos,
            self.options.max_videos,
            self.options.max_scroll_attempts,
            self.options.navigation_retries
        );

        // the only fatal navigation
        profile_page
            .open(&self.page)
            .await
            .context(format!("could not load profile {}", profile_page.url()))?;
        profile_page.login_wall(&self.page);

        let session = Session {
            guard: &guard,
            store: &store,
            profile_page: &profile_page,
            profile,
            domain: &domain,
            target: &target,
        };

        let mut report = CrawlReport::default();
        for category in [Category::Photo, Category::Video] {
            let pass = self.run_category(&session, category, &mut report.stats).await;
            report.passes.push(pass);
        }

        info!(target: target.as_str(), "finished {}: {}", profile, report.stats);
        Ok(report)
    }

    async fn run_category(
        &self,
        session: &Session<'_>,
        category: Category,
        stats: &mut SessionStats,
    ) -> PassReport {
        let page = &self.page;
        let target = session.target;
        let limit = self.options.limit(category);

        if page.current_url() != session.profile_page.url() {
            if let Err(e) = session.profile_page.open(page).await {
                warn!(target: target, "could not return to the profile: {}", e);
            }
        }
        let feed = session.profile_page.open_category(page, category).await;

        let mut harvester = LinkHarvester::new(
            category,
            &self.options.base_url,
            session.domain,
            link_strategies(category, &self.options.cdn_marker),
            target,
        );
        harvester.seed(session.profile_page.url());
        harvester.seed(&feed);

        let mut pager = ScrollPager::new(
            self.options.max_scroll_attempts,
            self.options.max_no_new_content,
            self.options.scroll_settle,
            self.options.scroll_step,
            target,
        );

        let extractor = ResourceExtractor::new(
            session.guard,
            &self.retrieval,
            session.store,
            media_selectors(category, &self.options.cdn_marker),
            session.profile,
            self.options.post_settle,
            target,
        );

        info!(target: target, "{} pass on {}", category, feed);
        let mut saved = 0;
        let termination = loop {
            let links = harvester.harvest(page);
            pager.record_harvest(links.len());
            if !links.is_empty() {
                info!(target: target, "{} new {} links", links.len(), category);
            }

            let mut left_feed = false;
            for link in links {
                if limit_reached(saved, limit) {
                    break;
                }
                left_feed = true;
                let record = extractor.extract(page, &link).await;
                stats.record(&record);
                if matches!(
                    record.status,
                    RecordStatus::Downloaded | RecordStatus::SkippedExists
                ) {
                    saved += 1;
                }
            }

            if left_feed {
                match session.guard.goto(page, &feed).await {
                    Ok(()) => pager.restore(page).await,
                    Err(e) => warn!(target: target, "could not return to the feed: {}", e),
                }
            }

            pager.scroll(page).await;
            if let Some(t) = pager.termination(saved, limit) {
                break t;
            }
        };

        info!(
            target: target,
            "{} pass ended ({:?}) after {} scrolls, {} saved, {} links seen",
            category,
            termination,
            pager.state().attempts,
            saved,
            harvester.seen_count()
        );
        PassReport {
            category,
            termination,
            scroll_attempts: pager.state().attempts,
            saved,
        }
    }
}

fn validate_profile(profile: &str) -> anyhow::Result<&str> {
    let profile = profile.trim().trim_matches('/');
    if profile.is_empty() {
        return Err(anyhow!("profile must not be empty"));
    }
    Ok(profile)
}
