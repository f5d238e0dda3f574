#![forbid(unsafe_code)]

//! Prints today's video. When the library has no current pick, a random
//! video is flagged first so the answer is stable until the next rotation.

use anyhow::{Context, Result, bail};
use dailytube_tools::config::{RuntimeConfig, RuntimeOverrides, resolve_runtime_config};
use dailytube_tools::rotation::get_todays_video;
use dailytube_tools::security::ensure_not_root;
use dailytube_tools::store::VideoStore;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
struct TodaysArgs {
    config: RuntimeConfig,
}

impl TodaysArgs {
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
    ensure_not_root("todays_video")?;

    let TodaysArgs { config } = TodaysArgs::parse()?;

    let store = VideoStore::open(&config.database_path())
        .await
        .context("initializing video database")?;

    let video = get_todays_video(&store).await?;
    println!("Today's video: {}", video.title);
    println!("  {}", video.url);
    println!("  published {}", video.publish_date);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::tempdir;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn with_env_file(vars: &[(&str, &str)], f: impl FnOnce()) {
        let _lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let mut contents = String::new();
        for (key, value) in vars {
            contents.push_str(&format!("{key}=\"{value}\"\n"));
        }
        fs::write(dir.path().join(".env"), contents).unwrap();
        let cwd = env::current_dir().unwrap();
        env::set_current_dir(dir.path()).unwrap();
        f();
        env::set_current_dir(cwd).unwrap();
    }

    #[test]
    fn todays_args_read_env_file() {
        let mut parsed = None;
        with_env_file(&[("DATA_ROOT", "/var/lib/dailytube")], || {
            parsed = Some(TodaysArgs::from_slice(&[]).unwrap());
        });
        let args = parsed.unwrap();
        assert_eq!(args.config.data_root, PathBuf::from("/var/lib/dailytube"));
        assert_eq!(
            args.config.database_path(),
            PathBuf::from("/var/lib/dailytube/library.db")
        );
    }

    #[test]
    fn todays_args_accept_data_root_override() {
        let mut parsed = None;
        with_env_file(&[("DATA_ROOT", "/var/lib/dailytube")], || {
            parsed = Some(TodaysArgs::from_slice(&["--data-root", "/tmp/library"]).unwrap());
        });
        let args = parsed.unwrap();
        assert_eq!(args.config.data_root, PathBuf::from("/tmp/library"));
    }

    #[test]
    fn todays_args_reject_unknown_flags() {
        with_env_file(&[("DATA_ROOT", "/var/lib/dailytube")], || {
            assert!(TodaysArgs::from_slice(&["--whatever"]).is_err());
        });
    }
}
