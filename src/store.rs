//! Persistence layer for the dailytube library.
//!
//! One local SQLite database holds the scraped channel videos, the users, and
//! the collection rows tying users to the videos they saved. Row identifiers
//! come from AUTOINCREMENT columns: deletions leave gaps behind and an id is
//! never handed out twice, which the selection logic in `rotation` relies on.

use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, Utc};
use libsql::{Builder, Connection, Row, params};
use serde::{Deserialize, Serialize};

/// Row stored in the `videos` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub thumbnail_url: String,
    pub publish_date: NaiveDate,
    pub todays: bool,
}

/// Payload for inserting a new video; the store assigns the id and the today
/// flag starts out unset.
#[derive(Debug, Clone)]
pub struct NewVideo {
    pub title: String,
    pub url: String,
    pub thumbnail_url: String,
    pub publish_date: NaiveDate,
}

/// Row stored in the `users` table.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub date_joined: NaiveDate,
}

async fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;
        PRAGMA foreign_keys=ON;
        "#,
    )
    .await?;
    Ok(())
}

async fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS videos (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            url TEXT NOT NULL UNIQUE,
            thumbnail_url TEXT NOT NULL DEFAULT '',
            publish_date TEXT NOT NULL,
            todays INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL UNIQUE,
            username TEXT NOT NULL,
            date_joined TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS collection (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            video_id INTEGER NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
            collected TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_videos_todays ON videos(todays);
        CREATE INDEX IF NOT EXISTS idx_collection_user ON collection(user_id);
        CREATE INDEX IF NOT EXISTS idx_collection_video ON collection(video_id);
        "#,
    )
    .await?;

    Ok(())
}

/// Wrapper around the SQLite connection that performs every read and write.
pub struct VideoStore {
    conn: Connection,
}

impl VideoStore {
    /// Opens (and if necessary creates) the database and ensures the expected
    /// schema exists.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating data directory {}", parent.display()))?;
        }

        let db = Builder::new_local(path)
            .build()
            .await
            .with_context(|| format!("opening video DB {}", path.display()))?;

        let conn = db.connect()?;
        configure_connection(&conn).await?;

        let store = Self { conn };
        store.ensure_tables().await?;
        Ok(store)
    }

    /// Runs the SQL required to create the tables if they do not already exist.
    async fn ensure_tables(&self) -> Result<()> {
        ensure_schema(&self.conn).await
    }

    /// The rowid SQLite assigned to the most recent insert on this connection.
    async fn last_insert_id(&self) -> Result<i64> {
        let mut rows = self
            .conn
            .query("SELECT last_insert_rowid()", params![])
            .await?;
        let row = rows.next().await?.context("missing last_insert_rowid row")?;
        Ok(row.get(0)?)
    }

    /// Inserts a new video. The UNIQUE constraint on `url` makes racing
    /// inserts of the same video fail loudly instead of leaving a duplicate
    /// row behind.
    pub async fn insert_video(&self, video: &NewVideo) -> Result<Video> {
        self.conn
            .execute(
                r#"
                INSERT INTO videos (title, url, thumbnail_url, publish_date, todays)
                VALUES (:title, :url, :thumbnail_url, :publish_date, 0)
                "#,
                params![
                    video.title.as_str(),
                    video.url.as_str(),
                    video.thumbnail_url.as_str(),
                    video.publish_date.to_string(),
                ],
            )
            .await
            .with_context(|| format!("inserting video {}", video.url))?;

        let id = self.last_insert_id().await?;
        self.get_video(id)
            .await?
            .context("fetching video just inserted")
    }

    pub async fn get_video(&self, id: i64) -> Result<Option<Video>> {
        let mut stmt = self
            .conn
            .prepare(
                r#"
                SELECT id, title, url, thumbnail_url, publish_date, todays
                FROM videos
                WHERE id = ?1
                "#,
            )
            .await?;

        let mut rows = stmt.query(params![id]).await?;
        if let Some(row) = rows.next().await? {
            Ok(Some(row_to_video(&row)?))
        } else {
            Ok(None)
        }
    }

    pub async fn get_video_by_url(&self, url: &str) -> Result<Option<Video>> {
        let mut stmt = self
            .conn
            .prepare(
                r#"
                SELECT id, title, url, thumbnail_url, publish_date, todays
                FROM videos
                WHERE url = ?1
                "#,
            )
            .await?;

        let mut rows = stmt.query([url]).await?;
        if let Some(row) = rows.next().await? {
            Ok(Some(row_to_video(&row)?))
        } else {
            Ok(None)
        }
    }

    /// Every stored video, most recently published first.
    pub async fn list_videos(&self) -> Result<Vec<Video>> {
        let mut stmt = self
            .conn
            .prepare(
                r#"
                SELECT id, title, url, thumbnail_url, publish_date, todays
                FROM videos
                ORDER BY publish_date DESC, id DESC
                "#,
            )
            .await?;

        let mut rows = stmt.query(params![]).await?;
        let mut videos = Vec::new();
        while let Some(row) = rows.next().await? {
            videos.push(row_to_video(&row)?);
        }
        Ok(videos)
    }

    pub async fn count_videos(&self) -> Result<i64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM videos", params![])
            .await?;
        let row = rows.next().await?.context("missing count row")?;
        Ok(row.get(0)?)
    }

    /// The video at position `offset` in ascending id order, if any. Offsets
    /// count live rows only, so id gaps from deletions do not matter.
    pub async fn video_at_offset(&self, offset: i64) -> Result<Option<Video>> {
        let mut stmt = self
            .conn
            .prepare(
                r#"
                SELECT id, title, url, thumbnail_url, publish_date, todays
                FROM videos
                ORDER BY id
                LIMIT 1 OFFSET ?1
                "#,
            )
            .await?;

        let mut rows = stmt.query(params![offset]).await?;
        if let Some(row) = rows.next().await? {
            Ok(Some(row_to_video(&row)?))
        } else {
            Ok(None)
        }
    }

    /// Videos currently flagged as today's pick, most recently published
    /// first. More than one row here means a past rotation was interrupted;
    /// the rotation logic decides what to do about it.
    pub async fn todays_videos(&self) -> Result<Vec<Video>> {
        let mut stmt = self
            .conn
            .prepare(
                r#"
                SELECT id, title, url, thumbnail_url, publish_date, todays
                FROM videos
                WHERE todays = 1
                ORDER BY publish_date DESC, id DESC
                "#,
            )
            .await?;

        let mut rows = stmt.query(params![]).await?;
        let mut videos = Vec::new();
        while let Some(row) = rows.next().await? {
            videos.push(row_to_video(&row)?);
        }
        Ok(videos)
    }

    pub async fn set_todays_flag(&self, id: i64, todays: bool) -> Result<()> {
        self.conn
            .execute(
                "UPDATE videos SET todays = ?1 WHERE id = ?2",
                params![todays as i64, id],
            )
            .await?;
        Ok(())
    }

    /// Clears every today flag and raises it on `video_id` in one transaction
    /// so no reader ever observes zero flagged rows mid-rotation.
    pub async fn rotate_todays(&self, video_id: i64) -> Result<()> {
        let tx = self.conn.transaction().await?;
        tx.execute("UPDATE videos SET todays = 0 WHERE todays = 1", params![])
            .await?;
        tx.execute(
            "UPDATE videos SET todays = 1 WHERE id = ?1",
            params![video_id],
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Removes a video; collection rows pointing at it disappear through the
    /// cascade. The freed id is never reassigned.
    pub async fn delete_video(&self, id: i64) -> Result<()> {
        self.conn
            .execute("DELETE FROM videos WHERE id = ?1", params![id])
            .await?;
        Ok(())
    }

    /// Creates a user, rejecting blank fields and lowercasing the domain part
    /// of the email. A duplicate email fails on the UNIQUE constraint.
    pub async fn create_user(&self, email: &str, username: &str) -> Result<User> {
        let email = normalize_email(email)?;
        let username = username.trim();
        if username.is_empty() {
            bail!("username must not be empty");
        }
        let date_joined = Utc::now().date_naive();

        self.conn
            .execute(
                r#"
                INSERT INTO users (email, username, date_joined)
                VALUES (:email, :username, :date_joined)
                "#,
                params![email.as_str(), username, date_joined.to_string()],
            )
            .await
            .with_context(|| format!("creating user {email}"))?;

        Ok(User {
            id: self.last_insert_id().await?,
            email,
            username: username.to_owned(),
            date_joined,
        })
    }

    /// Records that `user_id` saved `video_id` to their collection on the
    /// given date.
    pub async fn collect_video(
        &self,
        user_id: i64,
        video_id: i64,
        collected: NaiveDate,
    ) -> Result<()> {
        self.conn
            .execute(
                r#"
                INSERT INTO collection (user_id, video_id, collected)
                VALUES (:user_id, :video_id, :collected)
                "#,
                params![user_id, video_id, collected.to_string()],
            )
            .await
            .context("recording collected video")?;
        Ok(())
    }

    /// The videos a user collected, most recently collected first.
    pub async fn videos_for_user(&self, user_id: i64) -> Result<Vec<Video>> {
        let mut stmt = self
            .conn
            .prepare(
                r#"
                SELECT v.id, v.title, v.url, v.thumbnail_url, v.publish_date, v.todays
                FROM videos v
                JOIN collection c ON c.video_id = v.id
                WHERE c.user_id = ?1
                ORDER BY c.collected DESC, c.id DESC
                "#,
            )
            .await?;

        let mut rows = stmt.query(params![user_id]).await?;
        let mut videos = Vec::new();
        while let Some(row) = rows.next().await? {
            videos.push(row_to_video(&row)?);
        }
        Ok(videos)
    }
}

/// Converts a SQL row into a `Video`, parsing the date column and normalizing
/// the flag stored as an INTEGER in SQLite.
fn row_to_video(row: &Row) -> Result<Video> {
    let publish_date: String = row.get(4)?;
    Ok(Video {
        id: row.get(0)?,
        title: row.get(1)?,
        url: row.get(2)?,
        thumbnail_url: row.get(3)?,
        publish_date: publish_date
            .parse()
            .context("parsing stored publish date")?,
        todays: row.get::<i64>(5).map(|value| value != 0)?,
    })
}

/// Lowercases the domain part of an email address, leaving the local part as
/// typed. Inputs without an `@` are kept unchanged.
fn normalize_email(email: &str) -> Result<String> {
    let trimmed = email.trim();
    if trimmed.is_empty() {
        bail!("user email must not be empty");
    }
    Ok(match trimmed.rsplit_once('@') {
        Some((local, domain)) => format!("{local}@{}", domain.to_lowercase()),
        None => trimmed.to_owned(),
    })
}
