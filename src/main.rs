use std::{path::PathBuf, process::ExitCode, time::Duration};

use clap::Parser;
use log::{error, info};
use sermon_archiver::{
    config::DEFAULT_CONFIG_FILES,
    controller::{self, RunSettings, DEFAULT_DATA_DIR},
    fetcher::{DirectPayloadClient, LadderFetcher, TrackResolver},
    innertube::{ClientIdentity, InnertubeResolver},
    listing::BrowseLister,
    policy::{RequestPolicy, DEFAULT_MAX_DELAY, DEFAULT_MIN_DELAY},
};

const LISTING_RETRIES: u32 = 3;
const LISTING_PAGE_DELAY: Duration = Duration::from_secs(1);

/// Append new channel transcripts to their archive files
#[derive(Parser, Debug)]
#[command(name = "sermon-archiver", version, about)]
struct Cli {
    /// Videos to request per listing tab per channel
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..))]
    limit: u32,

    /// Configuration file to try; repeat to give several, first existing wins
    #[arg(long = "config", value_name = "FILE")]
    config_files: Vec<PathBuf>,

    /// Directory holding the archive files
    #[arg(long, default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// Shortest pause before each transcript fetch, in milliseconds
    #[arg(long, default_value_t = DEFAULT_MIN_DELAY.as_millis() as u64)]
    min_delay_ms: u64,

    /// Longest pause before each transcript fetch, in milliseconds
    #[arg(long, default_value_t = DEFAULT_MAX_DELAY.as_millis() as u64)]
    max_delay_ms: u64,

    /// Date entries with the video's publish date when it is known
    #[arg(long)]
    publish_date: bool,
}

fn build_fetcher(policy: &RequestPolicy) -> reqwest::Result<LadderFetcher> {
    let resolvers: Vec<Box<dyn TrackResolver>> = vec![
        Box::new(InnertubeResolver::new(ClientIdentity::Web)?),
        Box::new(InnertubeResolver::new(ClientIdentity::Android)?),
    ];
    let payload = DirectPayloadClient::new(policy.clone())?;

    Ok(LadderFetcher::new(resolvers, Box::new(payload)))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config_files = if cli.config_files.is_empty() {
        DEFAULT_CONFIG_FILES.iter().map(PathBuf::from).collect()
    } else {
        cli.config_files
    };
    let settings = RunSettings {
        config_files,
        data_dir: cli.data_dir,
        limit: cli.limit as usize,
        use_publish_date: cli.publish_date,
        ..Default::default()
    };
    let policy = RequestPolicy::default().with_delay_bounds(
        Duration::from_millis(cli.min_delay_ms),
        Duration::from_millis(cli.max_delay_ms),
    );

    let lister = match BrowseLister::new(policy.user_agent(), LISTING_RETRIES, LISTING_PAGE_DELAY)
    {
        Ok(lister) => lister,
        Err(e) => {
            error!("Could not create HTTP client: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let fetcher = match build_fetcher(&policy) {
        Ok(fetcher) => fetcher,
        Err(e) => {
            error!("Could not create HTTP client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match controller::run(&settings, &lister, &fetcher, &policy).await {
        Ok(summary) => {
            info!(
                "Done: {} channels, {} new entries, {} videos skipped, {} channels failed",
                summary.reports.len(),
                summary.appended(),
                summary.skipped(),
                summary.failed_channels.len()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
