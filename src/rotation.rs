#![forbid(unsafe_code)]

//! Picks which video is today's video.
//!
//! Only one video should carry the today flag at a time. Reads tolerate
//! leftovers from an interrupted rotation by preferring the most recently
//! published flagged video; the next rotation clears the extras.

use anyhow::{Context, Result};
use rand::Rng;

use crate::error::NoVideosError;
use crate::store::{Video, VideoStore};

/// Picks a uniformly random video from the store.
///
/// Selection draws a position among the live rows rather than guessing at
/// ids, so gaps left by deletions never skew the odds or force a retry.
pub async fn pick_random(store: &VideoStore) -> Result<Video> {
    let count = store.count_videos().await?;
    if count == 0 {
        return Err(NoVideosError.into());
    }

    // The rng handle must not live across an await, so draw first.
    let offset = {
        let mut rng = rand::thread_rng();
        rng.gen_range(0..count)
    };

    store
        .video_at_offset(offset)
        .await?
        .context("video row vanished during selection")
}

/// Returns today's video, establishing one first if none is flagged.
///
/// If several videos are flagged, the most recently published one wins and
/// the rest are left alone until the next rotation cleans them up.
pub async fn get_todays_video(store: &VideoStore) -> Result<Video> {
    let flagged = store.todays_videos().await?;
    if let Some(video) = flagged.into_iter().next() {
        return Ok(video);
    }

    set_random_as_todays(store).await
}

/// Flags one random video as today's video and returns it.
pub async fn set_random_as_todays(store: &VideoStore) -> Result<Video> {
    let video = pick_random(store).await?;
    store.set_todays_flag(video.id, true).await?;
    Ok(Video {
        todays: true,
        ..video
    })
}

/// Rotates the today flag to a fresh random pick and returns it.
///
/// The previous pick stays in the pool, so the same video can come up again.
pub async fn change_todays_video(store: &VideoStore) -> Result<Video> {
    let video = pick_random(store).await?;
    store.rotate_todays(video.id).await?;
    Ok(Video {
        todays: true,
        ..video
    })
}
