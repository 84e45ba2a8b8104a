use std::{path::PathBuf, time::Duration};

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use feedgrab::{
    browser_controller::BrowserController,
    retrieval::SessionClient,
    runner::{Runner, RunnerOptions},
    utils::{BASE_URL, DEFAULT_OUTPUT_DIR, USER_AGENT},
};
use log::debug;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Facebook profile photo and video downloader", long_about = None)]
struct Args {
    /// Show the browser window instead of running headless
    #[arg(long, global = true)]
    headful: bool,
    /// Maximum time the browser waits for a page load, in seconds
    #[arg(long, global = true, default_value_t = 30)]
    browser_timeout: u64,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Download the photos and videos of a profile
    Download {
        /// Profile username or id
        profile: String,
        /// Directory the profile folder is created in
        #[arg(short = 'o', long, default_value = DEFAULT_OUTPUT_DIR)]
        output: PathBuf,
        /// Maximum number of photos to save (0 = unlimited)
        #[arg(long, default_value_t = 0)]
        max_photos: usize,
        /// Maximum number of videos to save (0 = unlimited)
        #[arg(long, default_value_t = 0)]
        max_videos: usize,
        /// Scroll attempts per category before giving up
        #[arg(long, default_value_t = 30)]
        max_scrolls: usize,
        /// Consecutive scrolls without new links before giving up
        #[arg(long, default_value_t = 8)]
        max_no_new: usize,
        /// Number of attempts per page load
        #[arg(short = 'r', long, default_value_t = 3)]
        retries: usize,
    },
    /// Print the name and description of a profile
    Info {
        /// Profile username or id
        profile: String,
    },
}

impl Command {
    fn profile(&self) -> &str {
        match self {
            Command::Download { profile, .. } | Command::Info { profile } => profile,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();

    if args.command.profile().trim().is_empty() {
        return Err(anyhow!("profile must not be empty"));
    }

    debug!("starting feedgrab with {:#?}", args.clone());

    let timeout = Duration::from_secs(args.browser_timeout);
    let mut builder = RunnerOptions::default_builder();
    builder.navigation_timeout(timeout);
    if let Command::Download {
        output,
        max_photos,
        max_videos,
        max_scrolls,
        max_no_new,
        retries,
        ..
    } = &args.command
    {
        builder
            .output_dir(output.clone())
            .max_photos(*max_photos)
            .max_videos(*max_videos)
            .max_scroll_attempts(*max_scrolls)
            .max_no_new_content(*max_no_new)
            .navigation_retries(*retries);
    }
    let options = builder.build()?;

    let browser = BrowserController::new(!args.headful, timeout * 4)?;
    let page = browser.new_page(&USER_AGENT)?;
    let http = SessionClient::new(&USER_AGENT, &format!("{}/", BASE_URL.as_str()), timeout)
        .context("could not build http client")?;
    let runner = Runner::new(page, http, options);

    match &args.command {
        Command::Download { profile, .. } => {
            let report = runner.run(profile).await?;
            println!("{}", report.stats);
        }
        Command::Info { profile } => {
            let info = runner.info(profile).await?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
    }

    Ok(())
}
