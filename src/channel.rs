#![forbid(unsafe_code)]

//! Talking to the creator's channel through yt-dlp.
//!
//! The rest of the crate only sees the `ChannelClient` trait, so tests swap in
//! scripted stand-ins and nothing outside this module shells out to yt-dlp.

#[cfg(test)]
use std::path::PathBuf;
use std::process::{Command, Stdio};
#[cfg(test)]
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, Utc};
use parking_lot::RwLock;
use serde::Deserialize;

/// Skips live streams and Shorts when listing a channel. The library only
/// tracks regular uploads.
const LISTING_FILTER: &str = "!is_live & original_url!*=/shorts/";

#[cfg(test)]
static YT_DLP_STUB: Mutex<Option<PathBuf>> = Mutex::new(None);
#[cfg(test)]
static STUB_USE_LOCK: Mutex<()> = Mutex::new(());

fn yt_dlp_command() -> Command {
    #[cfg(test)]
    {
        if let Some(path) = YT_DLP_STUB.lock().unwrap().clone() {
            return Command::new(path);
        }
    }
    Command::new("yt-dlp")
}

#[cfg(test)]
fn set_ytdlp_stub_path(path: PathBuf) -> YtDlpStubGuard {
    let guard = STUB_USE_LOCK.lock().unwrap();
    {
        let mut lock = YT_DLP_STUB.lock().unwrap();
        *lock = Some(path);
    }
    YtDlpStubGuard { lock: Some(guard) }
}

#[cfg(test)]
struct YtDlpStubGuard {
    lock: Option<MutexGuard<'static, ()>>,
}

#[cfg(test)]
impl Drop for YtDlpStubGuard {
    fn drop(&mut self) {
        *YT_DLP_STUB.lock().unwrap() = None;
        self.lock.take();
    }
}

/// Checks that an external program responds to `--version` before any command
/// relies on it.
pub fn ensure_program_available(name: &str) -> Result<()> {
    let status = Command::new(name)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match status {
        Ok(status) if status.success() => Ok(()),
        Ok(_) => bail!("{} is installed but returned a failure status", name),
        Err(err) => bail!("{} is not installed or not in PATH: {}", name, err),
    }
}

/// What the channel knows about one video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoMetadata {
    pub title: String,
    pub thumbnail_url: String,
    pub publish_date: NaiveDate,
}

/// Source of channel listings and per-video metadata.
///
/// Implementations are opaque to the callers: any error they return travels up
/// unchanged, without being wrapped or reinterpreted along the way.
pub trait ChannelClient {
    /// Video URLs for the channel, most recently published first.
    fn list_video_urls(&self) -> Result<Vec<String>>;

    /// Metadata for a single video URL.
    fn fetch_metadata(&self, url: &str) -> Result<VideoMetadata>;
}

/// `ChannelClient` backed by the yt-dlp executable.
pub struct YtDlpChannel {
    channel_url: String,
    listing: RwLock<Option<Vec<String>>>,
}

impl YtDlpChannel {
    pub fn new(channel_url: impl Into<String>) -> Self {
        Self {
            channel_url: channel_url.into(),
            listing: RwLock::new(None),
        }
    }
}

impl ChannelClient for YtDlpChannel {
    /// Listing a channel is the slowest yt-dlp call, so the result is cached
    /// for the lifetime of the client.
    fn list_video_urls(&self) -> Result<Vec<String>> {
        if let Some(cached) = self.listing.read().clone() {
            return Ok(cached);
        }

        let urls = list_channel_video_urls(&self.channel_url)?;
        *self.listing.write() = Some(urls.clone());
        Ok(urls)
    }

    fn fetch_metadata(&self, url: &str) -> Result<VideoMetadata> {
        fetch_video_metadata(url)
    }
}

/// Points the listing at the channel's videos tab, preserving any query or
/// fragment the configured URL carries.
fn channel_videos_url(channel_url: &str) -> String {
    let (without_fragment, fragment) = match channel_url.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (channel_url, None),
    };
    let (base, query) = match without_fragment.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (without_fragment, None),
    };

    let base = base.trim_end_matches('/');
    let mut result = if base.ends_with("/videos") {
        base.to_string()
    } else {
        format!("{base}/videos")
    };

    if let Some(query) = query {
        result.push('?');
        result.push_str(query);
    }
    if let Some(fragment) = fragment {
        result.push('#');
        result.push_str(fragment);
    }

    result
}

/// Lists the video ids on the channel's videos tab. yt-dlp prints them most
/// recent first, one per line.
fn get_video_ids(list_url: &str) -> Result<Vec<String>> {
    let mut command = yt_dlp_command();
    command
        .arg("--flat-playlist")
        .arg("--get-id")
        .arg("--ignore-errors")
        .arg("--match-filter")
        .arg(LISTING_FILTER)
        .arg(list_url);

    let output = command
        .output()
        .with_context(|| format!("retrieving playlist from {}", list_url))?;

    if !output.status.success() {
        bail!(
            "failed to list videos for {} (status: {})",
            list_url,
            output.status
        );
    }

    let content = String::from_utf8_lossy(&output.stdout);
    let ids = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|id| id.to_owned())
        .collect();

    Ok(ids)
}

fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

fn list_channel_video_urls(channel_url: &str) -> Result<Vec<String>> {
    let list_url = channel_videos_url(channel_url);
    let ids = get_video_ids(&list_url)?;
    Ok(ids.iter().map(|id| watch_url(id)).collect())
}

/// `yt-dlp --dump-single-json` payload. Only a handful of fields are read and
/// every one is optional because older videos may lack metadata.
#[derive(Debug, Deserialize)]
struct VideoInfo {
    title: Option<String>,
    fulltitle: Option<String>,
    upload_date: Option<String>,
    #[serde(default)]
    release_timestamp: Option<i64>,
    thumbnail: Option<String>,
    #[serde(default)]
    thumbnails: Vec<ThumbnailInfo>,
}

#[derive(Debug, Deserialize)]
struct ThumbnailInfo {
    url: Option<String>,
}

/// Converts yt-dlp's `YYYYMMDD` upload date into a date.
fn parse_upload_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y%m%d").ok()
}

/// Converts epoch seconds into the calendar date they fall on in UTC.
fn timestamp_to_date(timestamp: i64) -> Option<NaiveDate> {
    chrono::DateTime::<Utc>::from_timestamp(timestamp, 0).map(|datetime| datetime.date_naive())
}

/// Best thumbnail yt-dlp offers. The `thumbnails` array is ordered worst to
/// best, so the fallback walks it from the end.
fn pick_thumbnail(info: &VideoInfo) -> Option<String> {
    if let Some(url) = &info.thumbnail
        && !url.is_empty()
    {
        return Some(url.clone());
    }
    info.thumbnails
        .iter()
        .rev()
        .find_map(|thumbnail| thumbnail.url.clone())
}

fn fetch_video_metadata(video_url: &str) -> Result<VideoMetadata> {
    let mut command = yt_dlp_command();
    command
        .arg("--dump-single-json")
        .arg("--skip-download")
        .arg("--no-warnings")
        .arg("--no-progress")
        .arg(video_url);

    let output = command
        .output()
        .with_context(|| format!("fetching metadata for {}", video_url))?;

    if !output.status.success() {
        bail!(
            "metadata command failed for {} (status {})",
            video_url,
            output.status
        );
    }

    let raw_json =
        String::from_utf8(output.stdout).context("parsing metadata JSON response as UTF-8")?;
    let info: VideoInfo = serde_json::from_str(&raw_json).context("deserializing metadata JSON")?;

    video_metadata_from_info(&info, video_url)
}

fn video_metadata_from_info(info: &VideoInfo, video_url: &str) -> Result<VideoMetadata> {
    let title = info
        .fulltitle
        .as_deref()
        .or(info.title.as_deref())
        .filter(|t| !t.is_empty())
        .with_context(|| format!("metadata for {} is missing a title", video_url))?;

    let publish_date = info
        .upload_date
        .as_deref()
        .and_then(parse_upload_date)
        .or_else(|| info.release_timestamp.and_then(timestamp_to_date))
        .with_context(|| format!("metadata for {} is missing an upload date", video_url))?;

    Ok(VideoMetadata {
        title: title.to_owned(),
        thumbnail_url: pick_thumbnail(info).unwrap_or_default(),
        publish_date,
    })
}
