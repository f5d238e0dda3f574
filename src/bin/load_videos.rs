#![forbid(unsafe_code)]

//! Imports the channel's uploads into the video library. Acts as the
//! first-run backfill and is safe to re-run: videos already stored are
//! skipped, so only the gap since the last run is fetched.

use anyhow::{Context, Result, bail};
use dailytube_tools::channel::{ChannelClient, YtDlpChannel, ensure_program_available};
use dailytube_tools::config::{RuntimeConfig, RuntimeOverrides, resolve_runtime_config};
use dailytube_tools::ingest;
use dailytube_tools::security::ensure_not_root;
use dailytube_tools::store::VideoStore;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
struct LoadArgs {
    config: RuntimeConfig,
    limit: Option<usize>,
}

impl LoadArgs {
    fn parse() -> Result<Self> {
        Self::from_iter(env::args().skip(1))
    }

    #[cfg(test)]
    fn from_slice(values: &[&str]) -> Result<Self> {
        Self::from_iter(values.iter().map(|value| value.to_string()))
    }

    fn from_iter<I>(iter: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut data_root_override: Option<PathBuf> = None;
        let mut channel_url_override: Option<String> = None;
        let mut env_path_override: Option<PathBuf> = None;
        let mut limit: Option<usize> = None;
        let mut args = iter.into_iter();

        while let Some(arg) = args.next() {
            if let Some(value) = arg.strip_prefix("--data-root=") {
                data_root_override = Some(PathBuf::from(value));
                continue;
            }
            if let Some(value) = arg.strip_prefix("--channel-url=") {
                channel_url_override = Some(value.to_owned());
                continue;
            }
            if let Some(value) = arg.strip_prefix("--env=") {
                env_path_override = Some(PathBuf::from(value));
                continue;
            }
            if let Some(value) = arg.strip_prefix("--limit=") {
                limit = Some(parse_limit(value)?);
                continue;
            }

            match arg.as_str() {
                "--data-root" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--data-root requires a value"))?;
                    data_root_override = Some(PathBuf::from(value));
                }
                "--channel-url" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--channel-url requires a value"))?;
                    channel_url_override = Some(value);
                }
                "--env" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--env requires a value"))?;
                    env_path_override = Some(PathBuf::from(value));
                }
                "--limit" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--limit requires a value"))?;
                    limit = Some(parse_limit(&value)?);
                }
                _ => {
                    bail!("unknown argument: {arg}");
                }
            }
        }

        let config = resolve_runtime_config(RuntimeOverrides {
            data_root: data_root_override,
            channel_url: channel_url_override,
            env_path: env_path_override,
        })?;

        Ok(Self { config, limit })
    }
}

fn parse_limit(value: &str) -> Result<usize> {
    value
        .parse()
        .with_context(|| format!("parsing --limit value {value:?}"))
}

#[derive(Debug, Default, PartialEq, Eq)]
struct LoadSummary {
    listed: usize,
    added: usize,
    skipped: usize,
    failed: usize,
}

/// Walks the channel listing and stores every video not yet in the library.
/// A failure on one video is reported and the import moves on; `limit` caps
/// how many new videos are added in this run.
async fn load_videos(
    store: &VideoStore,
    channel: &dyn ChannelClient,
    limit: Option<usize>,
) -> Result<LoadSummary> {
    let urls = channel.list_video_urls()?;
    if urls.is_empty() {
        bail!("the channel listed no videos");
    }

    let total = urls.len();
    println!("Channel lists {total} videos.");

    let mut summary = LoadSummary {
        listed: total,
        ..LoadSummary::default()
    };

    for (index, url) in urls.iter().enumerate() {
        if let Some(limit) = limit
            && summary.added >= limit
        {
            break;
        }

        let current = index + 1;
        if store.get_video_by_url(url).await?.is_some() {
            summary.skipped += 1;
            continue;
        }

        match ingest::add_video(store, channel, url).await {
            Ok(video) => {
                summary.added += 1;
                println!("[{current}/{total}] Added {}", video.title);
            }
            Err(err) => {
                summary.failed += 1;
                eprintln!("  Warning: failed to add {url}: {err:#}");
            }
        }
    }

    Ok(summary)
}

#[tokio::main]
async fn main() -> Result<()> {
    ensure_not_root("load_videos")?;

    let LoadArgs { config, limit } = LoadArgs::parse()?;

    ensure_program_available("yt-dlp")?;

    let store = VideoStore::open(&config.database_path())
        .await
        .context("initializing video database")?;
    let channel = YtDlpChannel::new(config.channel_url.clone());

    println!("===================================");
    println!("Channel Library Import");
    println!("===================================");
    println!("Channel: {}", config.channel_url);

    let summary = load_videos(&store, &channel, limit).await?;

    println!();
    println!(
        "Added {} new videos ({} already present, {} failed).",
        summary.added, summary.skipped, summary.failed
    );
    let stored = store.count_videos().await?;
    println!("{stored} videos are in the library.");
    if summary.failed == 0 && summary.added + summary.skipped == summary.listed {
        println!("The channel is fully mirrored.");
    }

    Ok(())
}
