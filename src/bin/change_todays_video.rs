#![forbid(unsafe_code)]

//! Rotates today's video to a fresh random pick. The previous pick goes back
//! into the pool, so it can come up again another day.

use anyhow::{Context, Result, bail};
use dailytube_tools::config::{RuntimeConfig, RuntimeOverrides, resolve_runtime_config};
use dailytube_tools::rotation::change_todays_video;
use dailytube_tools::security::ensure_not_root;
use dailytube_tools::store::VideoStore;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
struct RotateArgs {
    config: RuntimeConfig,
}

impl RotateArgs {
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
        let mut env_path_override: Option<PathBuf> = None;
        let mut args = iter.into_iter();

        while let Some(arg) = args.next() {
            if let Some(value) = arg.strip_prefix("--data-root=") {
                data_root_override = Some(PathBuf::from(value));
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
            env_path: env_path_override,
            ..RuntimeOverrides::default()
        })?;

        Ok(Self { config })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    ensure_not_root("change_todays_video")?;

    let RotateArgs { config } = RotateArgs::parse()?;

    let store = VideoStore::open(&config.database_path())
        .await
        .context("initializing video database")?;

    let video = change_todays_video(&store).await?;
    println!(
        "Today's video is now: {} (published {})",
        video.title, video.publish_date
    );
    println!("  {}", video.url);

    Ok(())
}
