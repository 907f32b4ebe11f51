//! Study-notes repository
//!
//! Notes are stored as one JSON array under a single key, so every mutation
//! rewrites the whole collection. That is O(n) serialization per write and
//! is acceptable only because these are personal notes (tens, not
//! thousands); a larger collection would want per-note keys instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storage::SharedStore;
use uuid::Uuid;

use crate::repository::{Result, NOTES_KEY};

/// A free-text study note attached to a verse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyNote {
    /// Unique note id
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Verse the note is attached to
    pub verse_id: String,
    /// Note text
    pub note: String,
    /// Creation timestamp; preserved across edits
    pub created_at: DateTime<Utc>,
    /// Refreshed on every upsert
    pub updated_at: DateTime<Utc>,
    /// Persisted but not currently consumed downstream
    #[serde(default)]
    pub is_private: bool,
}

impl StudyNote {
    /// Create a new note with a generated id
    pub fn new(
        user_id: impl Into<String>,
        verse_id: impl Into<String>,
        note: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            verse_id: verse_id.into(),
            note: note.into(),
            created_at: now,
            updated_at: now,
            is_private: false,
        }
    }
}

/// Repository for the study-notes collection
#[derive(Clone)]
pub struct NotesRepository {
    store: SharedStore,
}

impl NotesRepository {
    /// Create a repository over the given store
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Insert or update a note by id
    ///
    /// An existing id is updated in place with a refreshed `updated_at`
    /// (the original `created_at` is preserved); a new id is appended.
    /// Returns the note as written.
    pub async fn upsert(&self, mut note: StudyNote) -> Result<StudyNote> {
        let _guard = self.store.lock(NOTES_KEY).await;

        let mut notes = self.read_all().await?;
        note.updated_at = Utc::now();

        if let Some(existing) = notes.iter_mut().find(|n| n.id == note.id) {
            note.created_at = existing.created_at;
            *existing = note.clone();
        } else {
            notes.push(note.clone());
        }

        self.write_all(&notes).await?;
        Ok(note)
    }

    /// All notes, in insertion order
    pub async fn list_all(&self) -> Result<Vec<StudyNote>> {
        self.read_all().await
    }

    /// All notes belonging to `user_id`
    pub async fn list_by_user(&self, user_id: &str) -> Result<Vec<StudyNote>> {
        let notes = self.read_all().await?;
        Ok(notes.into_iter().filter(|n| n.user_id == user_id).collect())
    }

    /// A user's notes on a specific verse
    pub async fn list_by_verse(&self, user_id: &str, verse_id: &str) -> Result<Vec<StudyNote>> {
        let notes = self.read_all().await?;
        Ok(notes
            .into_iter()
            .filter(|n| n.user_id == user_id && n.verse_id == verse_id)
            .collect())
    }

    /// Delete a note by id, returning whether it existed
    pub async fn delete(&self, note_id: &str) -> Result<bool> {
        let _guard = self.store.lock(NOTES_KEY).await;

        let mut notes = self.read_all().await?;
        let before = notes.len();
        notes.retain(|n| n.id != note_id);

        if notes.len() == before {
            return Ok(false);
        }

        self.write_all(&notes).await?;
        Ok(true)
    }

    /// Replace the entire collection (snapshot-import replay path)
    pub async fn replace_all(&self, notes: &[StudyNote]) -> Result<()> {
        let _guard = self.store.lock(NOTES_KEY).await;
        self.write_all(notes).await
    }

    /// Remove the whole collection, returning whether one existed
    pub async fn clear(&self) -> Result<bool> {
        Ok(self.store.remove(NOTES_KEY).await?)
    }

    async fn read_all(&self) -> Result<Vec<StudyNote>> {
        match self.store.get(NOTES_KEY).await? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    async fn write_all(&self, notes: &[StudyNote]) -> Result<()> {
        let json = serde_json::to_string(notes)?;
        self.store.set(NOTES_KEY, &json).await?;
        tracing::debug!(count = notes.len(), "saved study notes");
        Ok(())
    }
}
