#![forbid(unsafe_code)]

//! Getting channel videos into the store.

use anyhow::{Result, bail};
use url::Url;

use crate::channel::ChannelClient;
use crate::error::InvalidInputError;
use crate::store::{NewVideo, Video, VideoStore};

/// Fetches metadata for `url` from the channel and stores it as a new video.
///
/// The URL is validated up front; anything that is not an absolute http(s)
/// URL is rejected with [`InvalidInputError`] before the channel is asked.
/// Errors from the channel client travel through unchanged. Duplicates are
/// not checked here; a second insert of the same URL fails on the store's
/// UNIQUE constraint.
pub async fn add_video(
    store: &VideoStore,
    channel: &dyn ChannelClient,
    url: &str,
) -> Result<Video> {
    ensure_valid_video_url(url)?;

    let metadata = channel.fetch_metadata(url)?;
    let video = NewVideo {
        title: metadata.title,
        url: url.to_owned(),
        thumbnail_url: metadata.thumbnail_url,
        publish_date: metadata.publish_date,
    };

    store.insert_video(&video).await
}

/// Stores the channel's most recent upload unless it is already known.
///
/// Returns the newly stored video, or `None` when the latest upload is
/// already in the library.
pub async fn add_latest_if_new(
    store: &VideoStore,
    channel: &dyn ChannelClient,
) -> Result<Option<Video>> {
    let urls = channel.list_video_urls()?;
    let Some(latest) = urls.first() else {
        bail!("channel listing came back empty");
    };

    if store.get_video_by_url(latest).await?.is_some() {
        return Ok(None);
    }

    Ok(Some(add_video(store, channel, latest).await?))
}

/// A video URL must be absolute and use http or https. The original string
/// is stored as given; parsing is only for validation.
fn ensure_valid_video_url(url: &str) -> Result<()> {
    let parsed = Url::parse(url).map_err(|_| InvalidInputError(url.to_owned()))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(InvalidInputError(url.to_owned()).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::VideoMetadata;
    use anyhow::Context;
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    async fn create_store() -> Result<(tempfile::TempDir, VideoStore)> {
        let dir = tempdir()?;
        let store = VideoStore::open(&dir.path().join("library.db")).await?;
        Ok((dir, store))
    }

    /// Scripted channel that serves a fixed listing and canned metadata.
    struct StubChannel {
        urls: Vec<String>,
        metadata: HashMap<String, VideoMetadata>,
    }

    impl StubChannel {
        fn new(urls: &[&str]) -> Self {
            Self {
                urls: urls.iter().map(|url| url.to_string()).collect(),
                metadata: HashMap::new(),
            }
        }

        fn with_video(mut self, url: &str, title: &str, publish_date: NaiveDate) -> Self {
            self.metadata.insert(
                url.to_owned(),
                VideoMetadata {
                    title: title.to_owned(),
                    thumbnail_url: format!("{url}/thumb.jpg"),
                    publish_date,
                },
            );
            self
        }
    }

    impl ChannelClient for StubChannel {
        fn list_video_urls(&self) -> Result<Vec<String>> {
            Ok(self.urls.clone())
        }

        fn fetch_metadata(&self, url: &str) -> Result<VideoMetadata> {
            self.metadata
                .get(url)
                .cloned()
                .with_context(|| format!("no stub metadata for {url}"))
        }
    }

    /// Channel whose every call fails, for checking error passthrough.
    struct FailingChannel;

    impl ChannelClient for FailingChannel {
        fn list_video_urls(&self) -> Result<Vec<String>> {
            bail!("listing blew up")
        }

        fn fetch_metadata(&self, _url: &str) -> Result<VideoMetadata> {
            bail!("the channel is unreachable")
        }
    }

    /// Garbage input is rejected before the channel is consulted and the
    /// store stays empty.
    #[tokio::test]
    async fn add_video_rejects_wrongly_typed_input() -> Result<()> {
        let (_temp, store) = create_store().await?;
        let channel = StubChannel::new(&[]);

        let err = add_video(&store, &channel, "not-a-url-object-but-wrong-type")
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<InvalidInputError>().is_some());
        assert_eq!(store.count_videos().await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn add_video_rejects_non_http_schemes() -> Result<()> {
        let (_temp, store) = create_store().await?;
        let channel = StubChannel::new(&[]);

        for url in ["ftp://example.com/video", "file:///tmp/video.mp4"] {
            let err = add_video(&store, &channel, url).await.unwrap_err();
            assert!(
                err.downcast_ref::<InvalidInputError>().is_some(),
                "{url} should be invalid"
            );
        }
        assert_eq!(store.count_videos().await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn add_video_stores_fetched_metadata() -> Result<()> {
        let (_temp, store) = create_store().await?;
        let url = "https://www.youtube.com/watch?v=alpha";
        let channel = StubChannel::new(&[url]).with_video(url, "Alpha Title", date(2023, 3, 7));

        let video = add_video(&store, &channel, url).await?;
        assert_eq!(video.title, "Alpha Title");
        assert_eq!(video.url, url);
        assert_eq!(video.publish_date, date(2023, 3, 7));
        assert!(!video.todays);

        let stored = store.get_video_by_url(url).await?.expect("video stored");
        assert_eq!(stored, video);
        Ok(())
    }

    /// Channel failures surface exactly as the client produced them, with no
    /// wrapping layered on top.
    #[tokio::test]
    async fn add_video_passes_client_errors_through() -> Result<()> {
        let (_temp, store) = create_store().await?;

        let err = add_video(&store, &FailingChannel, "https://www.youtube.com/watch?v=a")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "the channel is unreachable");
        assert_eq!(store.count_videos().await?, 0);
        Ok(())
    }

    /// A second insert of the same URL is stopped by the store, not by an
    /// up-front check here.
    #[tokio::test]
    async fn add_video_fails_on_second_insert_of_same_url() -> Result<()> {
        let (_temp, store) = create_store().await?;
        let url = "https://www.youtube.com/watch?v=alpha";
        let channel = StubChannel::new(&[url]).with_video(url, "Alpha Title", date(2023, 3, 7));

        add_video(&store, &channel, url).await?;
        assert!(add_video(&store, &channel, url).await.is_err());
        assert_eq!(store.count_videos().await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn add_latest_adds_a_new_video() -> Result<()> {
        let (_temp, store) = create_store().await?;
        let latest = "https://www.youtube.com/watch?v=new";
        let channel = StubChannel::new(&[latest, "https://www.youtube.com/watch?v=old"])
            .with_video(latest, "Fresh Upload", date(2024, 6, 1));

        let added = add_latest_if_new(&store, &channel)
            .await?
            .expect("latest video is new");
        assert_eq!(added.url, latest);
        assert_eq!(store.count_videos().await?, 1);
        Ok(())
    }

    /// When the newest upload is already stored, nothing changes and the
    /// caller gets `None`.
    #[tokio::test]
    async fn add_latest_skips_a_known_video() -> Result<()> {
        let (_temp, store) = create_store().await?;
        let latest = "https://www.youtube.com/watch?v=new";
        let channel =
            StubChannel::new(&[latest]).with_video(latest, "Fresh Upload", date(2024, 6, 1));

        add_video(&store, &channel, latest).await?;
        let outcome = add_latest_if_new(&store, &channel).await?;

        assert!(outcome.is_none());
        assert_eq!(store.count_videos().await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn add_latest_fails_on_an_empty_listing() -> Result<()> {
        let (_temp, store) = create_store().await?;
        let channel = StubChannel::new(&[]);

        let err = add_latest_if_new(&store, &channel).await.unwrap_err();
        assert!(err.to_string().contains("listing"));
        Ok(())
    }
}
