#![forbid(unsafe_code)]

//! Runtime configuration shared by every command.
//!
//! Values come from a `.env` file in the working directory, with process
//! environment variables taking precedence. Only two keys matter here:
//! `DATA_ROOT` (required, the directory holding the video database) and
//! `CHANNEL_URL` (optional, which channel the scraper follows).

use anyhow::{Context, Result, anyhow};
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DATABASE_FILE_NAME: &str = "library.db";
pub const DEFAULT_CHANNEL_URL: &str = "https://www.youtube.com/channel/UCtVy1X-hcxAL2ZlS6TqMQFw";

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub data_root: PathBuf,
    pub channel_url: String,
}

impl RuntimeConfig {
    /// Location of the SQLite database under the data root.
    pub fn database_path(&self) -> PathBuf {
        self.data_root.join(DATABASE_FILE_NAME)
    }
}

pub fn load_runtime_config() -> Result<RuntimeConfig> {
    resolve_runtime_config(RuntimeOverrides::default())
}

#[derive(Debug, Clone, Default)]
pub struct RuntimeOverrides {
    pub data_root: Option<PathBuf>,
    pub channel_url: Option<String>,
    pub env_path: Option<PathBuf>,
}

pub fn resolve_runtime_config(overrides: RuntimeOverrides) -> Result<RuntimeConfig> {
    let env_path = overrides
        .env_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(env_path)?;
    build_runtime_config_with_overrides(&file_vars, env_var_string, overrides)
}

#[cfg(test)]
fn build_runtime_config(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
) -> Result<RuntimeConfig> {
    build_runtime_config_with_overrides(file_vars, env_lookup, RuntimeOverrides::default())
}

fn build_runtime_config_with_overrides(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: RuntimeOverrides,
) -> Result<RuntimeConfig> {
    let data_root = overrides
        .data_root
        .map(|path| path.to_string_lossy().into_owned())
        .or_else(|| lookup_value("DATA_ROOT", file_vars, &env_lookup))
        .ok_or_else(|| anyhow!("DATA_ROOT not set"))?;
    let channel_url = overrides
        .channel_url
        .and_then(|value| {
            let trimmed = value.trim().to_string();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed)
            }
        })
        .or_else(|| lookup_value("CHANNEL_URL", file_vars, &env_lookup))
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CHANNEL_URL.to_string());
    Ok(RuntimeConfig {
        data_root: PathBuf::from(data_root),
        channel_url,
    })
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key).or_else(|| file_vars.get(key).cloned())
}

pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value_raw.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|value| value.strip_suffix('"'))
            .or_else(|| {
                value
                    .strip_prefix('\'')
                    .and_then(|value| value.strip_suffix('\''))
            })
            .unwrap_or(value);
        vars.insert(key.to_string(), value.to_string());
    }
    Ok(vars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn make_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    fn runtime_from(contents: &str) -> RuntimeConfig {
        let cfg = make_config(contents);
        let vars = read_env_file(cfg.path()).unwrap();
        build_runtime_config(&vars, |_| None).unwrap()
    }

    #[test]
    fn load_runtime_config_reads_data_root() {
        let runtime = runtime_from("DATA_ROOT=\"/srv/dailytube\"\n");
        assert_eq!(runtime.data_root, PathBuf::from("/srv/dailytube"));
        assert_eq!(
            runtime.database_path(),
            PathBuf::from("/srv/dailytube").join(DATABASE_FILE_NAME)
        );
    }

    #[test]
    fn load_runtime_config_defaults_channel_url() {
        let runtime = runtime_from("DATA_ROOT=\"/data\"\n");
        assert_eq!(runtime.channel_url, DEFAULT_CHANNEL_URL);
    }

    #[test]
    fn load_runtime_config_reads_channel_url() {
        let runtime = runtime_from(
            "DATA_ROOT=\"/data\"\nCHANNEL_URL=\"https://www.youtube.com/channel/abc\"\n",
        );
        assert_eq!(runtime.channel_url, "https://www.youtube.com/channel/abc");
    }

    #[test]
    fn missing_data_root_is_an_error() {
        let cfg = make_config("CHANNEL_URL=\"https://www.youtube.com/channel/abc\"\n");
        let vars = read_env_file(cfg.path()).unwrap();
        let err = build_runtime_config(&vars, |_| None).unwrap_err();
        assert!(err.to_string().contains("DATA_ROOT"));
    }

    #[test]
    fn build_runtime_config_prefers_env_over_file() {
        let vars = read_env_file(make_config("DATA_ROOT=\"/file\"\n").path()).unwrap();
        let runtime = build_runtime_config(&vars, |key| {
            if key == "DATA_ROOT" {
                Some("/env".to_string())
            } else {
                None
            }
        })
        .unwrap();
        assert_eq!(runtime.data_root, PathBuf::from("/env"));
    }

    #[test]
    fn read_env_file_handles_export_and_quotes() {
        let cfg = make_config(
            r#"
            export DATA_ROOT="/data"
            CHANNEL_URL='https://www.youtube.com/channel/abc'
            EXTRA =  "kept"
            # comment
            INVALID_LINE
            "#,
        );
        let vars = read_env_file(cfg.path()).unwrap();
        assert_eq!(vars.get("DATA_ROOT").unwrap(), "/data");
        assert_eq!(
            vars.get("CHANNEL_URL").unwrap(),
            "https://www.youtube.com/channel/abc"
        );
        assert_eq!(vars.get("EXTRA").unwrap(), "kept");
        assert!(!vars.contains_key("INVALID_LINE"));
    }

    #[test]
    fn read_env_file_missing_file_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let vars = read_env_file(&dir.path().join("missing.env")).unwrap();
        assert!(vars.is_empty());
    }

    #[test]
    fn build_runtime_config_override_precedence() {
        let mut vars = HashMap::new();
        vars.insert("DATA_ROOT".to_string(), "/file-data".to_string());
        vars.insert("CHANNEL_URL".to_string(), "file-channel".to_string());

        let overrides = RuntimeOverrides {
            data_root: Some(PathBuf::from("/override-data")),
            channel_url: Some("override-channel".into()),
            env_path: None,
        };

        let runtime = build_runtime_config_with_overrides(
            &vars,
            |key| {
                if key == "CHANNEL_URL" {
                    Some("env-channel".to_string())
                } else {
                    None
                }
            },
            overrides,
        )
        .unwrap();

        assert_eq!(runtime.data_root, PathBuf::from("/override-data"));
        assert_eq!(runtime.channel_url, "override-channel");
    }

    #[test]
    fn build_runtime_config_ignores_blank_channel_url() {
        let vars = read_env_file(make_config("DATA_ROOT=\"/data\"\n").path()).unwrap();
        let runtime = build_runtime_config_with_overrides(
            &vars,
            |_| None,
            RuntimeOverrides {
                channel_url: Some("   ".into()),
                ..RuntimeOverrides::default()
            },
        )
        .unwrap();
        assert_eq!(runtime.channel_url, DEFAULT_CHANNEL_URL);
    }
}
