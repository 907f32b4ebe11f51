//! Learning-progress repository
//!
//! The store holds at most one `UserProgress` record at a time: the device
//! tracks a single current user. `load` verifies the requested identity
//! against the resident record so a stale record for a previous user reads
//! as "not found" instead of leaking across accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use storage::SharedStore;

use crate::repository::{Result, PROGRESS_KEY};

/// A user's reading and study progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    /// Identity of the owning user, set at creation
    pub user_id: String,
    /// Display name, set at creation
    pub username: String,
    /// Email, set at creation
    pub email: String,
    /// Chapter numbers the user has completed
    #[serde(default)]
    pub chapters_completed: BTreeSet<u32>,
    /// Verse identifiers the user has read
    #[serde(default)]
    pub verses_read: BTreeSet<String>,
    /// Bookmarked verse identifiers
    #[serde(default)]
    pub bookmarked_verses: BTreeSet<String>,
    /// Favorited verse identifiers
    #[serde(default)]
    pub favorite_verses: BTreeSet<String>,
    /// Consecutive-day streak; maintained by external streak logic and
    /// stored/exported verbatim here
    #[serde(default)]
    pub daily_streak: u32,
    /// When the user last read a verse
    pub last_read_date: Option<DateTime<Utc>>,
    /// Accumulated reading time in minutes
    #[serde(default)]
    pub total_reading_time: u64,
    /// Creation timestamp, immutable after
    pub created_at: DateTime<Utc>,
    /// Stamped on every save
    pub last_updated: DateTime<Utc>,
}

impl UserProgress {
    /// Build a zero-valued record for a new user
    pub fn new(
        user_id: impl Into<String>,
        username: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            username: username.into(),
            email: email.into(),
            chapters_completed: BTreeSet::new(),
            verses_read: BTreeSet::new(),
            bookmarked_verses: BTreeSet::new(),
            favorite_verses: BTreeSet::new(),
            daily_streak: 0,
            last_read_date: None,
            total_reading_time: 0,
            created_at: now,
            last_updated: now,
        }
    }
}

/// Repository for the single resident progress record
#[derive(Clone)]
pub struct ProgressRepository {
    store: SharedStore,
}

impl ProgressRepository {
    /// Create a repository over the given store
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Persist `progress`, stamping `last_updated`
    ///
    /// Fully overwrites any prior record; there is no merge. Returns the
    /// record as written.
    pub async fn save(&self, mut progress: UserProgress) -> Result<UserProgress> {
        progress.last_updated = Utc::now();
        self.save_raw(&progress).await?;
        Ok(progress)
    }

    /// Persist `progress` exactly as given, without restamping `last_updated`
    ///
    /// This is the snapshot-import replay path.
    pub async fn save_raw(&self, progress: &UserProgress) -> Result<()> {
        let json = serde_json::to_string(progress)?;
        self.store.set(PROGRESS_KEY, &json).await?;
        tracing::debug!(user_id = %progress.user_id, "saved user progress");
        Ok(())
    }

    /// Load the progress record for `user_id`
    ///
    /// Returns `Ok(None)` when no record exists or when the resident
    /// record belongs to a different user. A record that fails to
    /// deserialize surfaces as a `Serialization` error; callers choose
    /// whether to degrade that to "not found".
    pub async fn load(&self, user_id: &str) -> Result<Option<UserProgress>> {
        let Some(progress) = self.load_any().await? else {
            return Ok(None);
        };

        if progress.user_id != user_id {
            tracing::debug!(
                requested = user_id,
                resident = %progress.user_id,
                "resident progress belongs to a different user"
            );
            return Ok(None);
        }

        Ok(Some(progress))
    }

    /// Load whatever record is resident, regardless of identity
    ///
    /// Used by the export path, which snapshots the slot as-is.
    pub async fn load_any(&self) -> Result<Option<UserProgress>> {
        match self.store.get(PROGRESS_KEY).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Create and immediately persist a zero-valued record
    pub async fn create_default(
        &self,
        user_id: &str,
        username: &str,
        email: &str,
    ) -> Result<UserProgress> {
        let progress = UserProgress::new(user_id, username, email);
        self.save_raw(&progress).await?;
        Ok(progress)
    }

    /// Record a completed chapter
    pub async fn mark_chapter_completed(
        &self,
        user_id: &str,
        chapter: u32,
    ) -> Result<Option<UserProgress>> {
        self.modify(user_id, |p| {
            p.chapters_completed.insert(chapter);
        })
        .await
    }

    /// Record a read verse and stamp `last_read_date`
    pub async fn mark_verse_read(
        &self,
        user_id: &str,
        verse_id: &str,
    ) -> Result<Option<UserProgress>> {
        let verse_id = verse_id.to_string();
        self.modify(user_id, move |p| {
            p.verses_read.insert(verse_id);
            p.last_read_date = Some(Utc::now());
        })
        .await
    }

    /// Toggle a bookmark on a verse
    pub async fn toggle_bookmark(
        &self,
        user_id: &str,
        verse_id: &str,
    ) -> Result<Option<UserProgress>> {
        let verse_id = verse_id.to_string();
        self.modify(user_id, move |p| {
            if !p.bookmarked_verses.remove(&verse_id) {
                p.bookmarked_verses.insert(verse_id);
            }
        })
        .await
    }

    /// Toggle a favorite on a verse
    pub async fn toggle_favorite(
        &self,
        user_id: &str,
        verse_id: &str,
    ) -> Result<Option<UserProgress>> {
        let verse_id = verse_id.to_string();
        self.modify(user_id, move |p| {
            if !p.favorite_verses.remove(&verse_id) {
                p.favorite_verses.insert(verse_id);
            }
        })
        .await
    }

    /// Accumulate reading time in minutes
    pub async fn add_reading_time(
        &self,
        user_id: &str,
        minutes: u64,
    ) -> Result<Option<UserProgress>> {
        self.modify(user_id, move |p| {
            p.total_reading_time += minutes;
        })
        .await
    }

    /// Remove the resident record, returning whether one existed
    pub async fn clear(&self) -> Result<bool> {
        Ok(self.store.remove(PROGRESS_KEY).await?)
    }

    /// Load-modify-save cycle, serialized on the progress key
    ///
    /// Returns `Ok(None)` when no record for `user_id` is resident.
    async fn modify<F>(&self, user_id: &str, f: F) -> Result<Option<UserProgress>>
    where
        F: FnOnce(&mut UserProgress) + Send,
    {
        let _guard = self.store.lock(PROGRESS_KEY).await;

        let Some(mut progress) = self.load(user_id).await? else {
            return Ok(None);
        };

        f(&mut progress);
        progress.last_updated = Utc::now();
        self.save_raw(&progress).await?;

        Ok(Some(progress))
    }
}
