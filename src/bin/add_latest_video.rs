#![forbid(unsafe_code)]

//! Stores the channel's most recent upload unless the library already has
//! it. Meant to run from cron shortly after the creator's usual upload time.

use anyhow::{Context, Result, bail};
use dailytube_tools::channel::{YtDlpChannel, ensure_program_available};
use dailytube_tools::config::{RuntimeConfig, RuntimeOverrides, resolve_runtime_config};
use dailytube_tools::ingest::add_latest_if_new;
use dailytube_tools::security::ensure_not_root;
use dailytube_tools::store::VideoStore;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
struct LatestArgs {
    config: RuntimeConfig,
}

impl LatestArgs {
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

        Ok(Self { config })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    ensure_not_root("add_latest_video")?;

    let LatestArgs { config } = LatestArgs::parse()?;

    ensure_program_available("yt-dlp")?;

    let store = VideoStore::open(&config.database_path())
        .await
        .context("initializing video database")?;
    let channel = YtDlpChannel::new(config.channel_url.clone());

    match add_latest_if_new(&store, &channel).await? {
        Some(video) => {
            println!(
                "Added latest video: {} (published {})",
                video.title, video.publish_date
            );
        }
        None => {
            println!("Latest video is already in the library.");
        }
    }

    Ok(())
}
