//! Snapshot export/import and shareable text digests
//!
//! The snapshot document is the only round-trippable backup format: one
//! versioned JSON bundle holding every repository's data. Export writes it
//! to a file and offers it to the share sheet; import picks a file,
//! validates the format tag before touching anything, then replays each
//! category through the repositories' raw write paths (replace-all, no
//! merge).
//!
//! The notes digest and progress summary are derived text for sharing with
//! other people; they have no import counterpart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use app_platform::{FilePicker, PlatformError, ShareSheet};
use storage::SharedStore;

use crate::analytics::{AnalyticsRepository, UsageAnalytics};
use crate::notes::{NotesRepository, StudyNote};
use crate::preferences::{PreferencesRepository, UserPreferences};
use crate::progress::{ProgressRepository, UserProgress};
use crate::repository::{RepositoryError, ALL_KEYS};

/// Prefix every recognized snapshot format tag starts with
pub const FORMAT_PREFIX: &str = "bhagavad-gita-backup";

/// Format tag written by this build
pub const CURRENT_FORMAT: &str = "bhagavad-gita-backup-v1";

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Backup error types
#[derive(Debug, Error)]
pub enum BackupError {
    /// Repository read/write failure
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// The chosen file is not a recognized snapshot document
    #[error("Invalid backup format: {0}")]
    InvalidFormat(String),

    /// Export file IO failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Platform share/picker failure
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),
}

/// Result type for backup operations
pub type Result<T> = std::result::Result<T, BackupError>;

/// The versioned JSON bundle produced by export and consumed by import
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDocument {
    /// The resident progress record, if any
    pub user_progress: Option<UserProgress>,

    /// The full notes collection
    #[serde(default)]
    pub study_notes: Vec<StudyNote>,

    /// The preferences record
    pub preferences: UserPreferences,

    /// Usage counters
    #[serde(default)]
    pub analytics: UsageAnalytics,

    /// When the snapshot was taken
    pub exported_at: DateTime<Utc>,

    /// App version that wrote the snapshot
    pub app_version: String,

    /// Format tag; must start with [`FORMAT_PREFIX`] to be importable
    pub format: String,
}

impl SnapshotDocument {
    /// Whether the format tag is a recognized version
    pub fn is_recognized_format(&self) -> bool {
        self.format.starts_with(FORMAT_PREFIX)
    }
}

/// Outcome of an interactive import
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    /// A snapshot was validated and replayed into the repositories
    Restored,
    /// The user dismissed the file picker
    Cancelled,
}

/// Parse a snapshot document from JSON
///
/// Unparseable input is an [`BackupError::InvalidFormat`], same as an
/// unrecognized format tag: from the user's point of view both mean "this
/// is not a backup file".
pub fn parse_snapshot(json: &str) -> Result<SnapshotDocument> {
    serde_json::from_str(json).map_err(|e| BackupError::InvalidFormat(e.to_string()))
}

/// Export/import service over all repositories
///
/// Owns no data itself; export fans out reads across the repositories and
/// import fans writes back out. The share step of an export is best-effort
/// and never fails the export.
pub struct BackupService {
    store: SharedStore,
    progress: ProgressRepository,
    notes: NotesRepository,
    preferences: PreferencesRepository,
    analytics: AnalyticsRepository,
    share_sheet: Arc<dyn ShareSheet>,
    file_picker: Arc<dyn FilePicker>,
    export_dir: PathBuf,
}

impl BackupService {
    /// Create a backup service
    ///
    /// `export_dir` is the app-private directory snapshot files are
    /// written into; it is created on first export.
    pub fn new(
        store: SharedStore,
        share_sheet: Arc<dyn ShareSheet>,
        file_picker: Arc<dyn FilePicker>,
        export_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            progress: ProgressRepository::new(store.clone()),
            notes: NotesRepository::new(store.clone()),
            preferences: PreferencesRepository::new(store.clone()),
            analytics: AnalyticsRepository::new(store.clone()),
            store,
            share_sheet,
            file_picker,
            export_dir: export_dir.into(),
        }
    }

    /// Assemble a snapshot from the current repository contents
    ///
    /// Category reads are issued concurrently. A category that fails to
    /// read degrades to empty/default with a warning, so one corrupt
    /// record cannot block backing up the rest; the snapshot is not a
    /// point-in-time view if a write lands mid-export.
    pub async fn build_snapshot(&self) -> Result<SnapshotDocument> {
        let (progress, notes, preferences, analytics) = tokio::join!(
            self.progress.load_any(),
            self.notes.list_all(),
            self.preferences.get(),
            self.analytics.get(),
        );

        let user_progress = progress.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "progress unreadable, exporting without it");
            None
        });
        let study_notes = notes.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "notes unreadable, exporting empty collection");
            Vec::new()
        });
        let preferences = preferences.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "preferences unreadable, exporting defaults");
            UserPreferences::default()
        });
        let analytics = analytics.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "analytics unreadable, exporting zero counters");
            UsageAnalytics::default()
        });

        Ok(SnapshotDocument {
            user_progress,
            study_notes,
            preferences,
            analytics,
            exported_at: Utc::now(),
            app_version: APP_VERSION.to_string(),
            format: CURRENT_FORMAT.to_string(),
        })
    }

    /// Export a snapshot to a file and offer it to the share sheet
    ///
    /// Returns the path of the written file. A share-sheet failure is
    /// logged and otherwise ignored; the file is already on disk.
    pub async fn export_snapshot(&self) -> Result<PathBuf> {
        let document = self.build_snapshot().await?;
        let json =
            serde_json::to_string_pretty(&document).map_err(RepositoryError::Serialization)?;

        tokio::fs::create_dir_all(&self.export_dir).await?;
        let file_name = format!(
            "gita-backup-{}.json",
            document.exported_at.format("%Y%m%d-%H%M%S")
        );
        let path = self.export_dir.join(file_name);
        write_atomic(&path, &json).await?;
        tracing::debug!(path = %path.display(), "wrote snapshot file");

        if let Err(e) = self.share_sheet.share_file(&path).await {
            tracing::warn!(error = %e, "share sheet failed, snapshot file kept");
        }

        Ok(path)
    }

    /// Pick a snapshot file and restore it
    ///
    /// Returns [`ImportOutcome::Cancelled`] when the picker is dismissed.
    pub async fn import_snapshot(&self) -> Result<ImportOutcome> {
        let Some(path) = self.file_picker.pick_file().await? else {
            return Ok(ImportOutcome::Cancelled);
        };

        let contents = tokio::fs::read_to_string(&path).await?;
        let document = parse_snapshot(&contents)?;
        self.restore(&document).await?;

        Ok(ImportOutcome::Restored)
    }

    /// Validate a snapshot and replay it into the repositories
    ///
    /// Validation happens before any write, so a rejected document leaves
    /// every repository untouched. Replay is replace-all through the raw
    /// write paths: timestamps come from the document, not from now.
    pub async fn restore(&self, document: &SnapshotDocument) -> Result<()> {
        if !document.is_recognized_format() {
            return Err(BackupError::InvalidFormat(document.format.clone()));
        }

        match &document.user_progress {
            Some(progress) => self.progress.save_raw(progress).await?,
            None => {
                self.progress.clear().await?;
            }
        }
        self.notes.replace_all(&document.study_notes).await?;
        self.preferences.save(&document.preferences).await?;
        self.analytics.save_raw(&document.analytics).await?;

        tracing::debug!(
            notes = document.study_notes.len(),
            exported_at = %document.exported_at,
            "restored snapshot"
        );
        Ok(())
    }

    /// Render a human-readable digest of one user's progress and notes
    pub async fn notes_digest(&self, user_id: &str) -> Result<String> {
        let progress = self.progress.load(user_id).await?;
        let notes = self.notes.list_by_user(user_id).await?;

        let mut out = String::from("Bhagavad Gita Study Notes\n=========================\n\n");

        if let Some(p) = progress {
            out.push_str(&format!("Progress for {}\n", p.username));
            out.push_str(&format!("- Chapters completed: {}\n", p.chapters_completed.len()));
            out.push_str(&format!("- Verses read: {}\n", p.verses_read.len()));
            out.push_str(&format!("- Bookmarked verses: {}\n", p.bookmarked_verses.len()));
            out.push_str(&format!("- Reading time: {} min\n", p.total_reading_time));
            out.push_str(&format!("- Daily streak: {} days\n\n", p.daily_streak));
        }

        if notes.is_empty() {
            out.push_str("No notes yet.\n");
        } else {
            out.push_str(&format!("Notes ({})\n", notes.len()));
            for note in &notes {
                out.push_str(&format!(
                    "- [{}] {} ({})\n",
                    note.verse_id,
                    note.note,
                    note.updated_at.format("%Y-%m-%d")
                ));
            }
        }

        Ok(out)
    }

    /// Render a short shareable blurb of aggregate stats
    pub async fn progress_summary(&self, user_id: &str) -> Result<String> {
        match self.progress.load(user_id).await? {
            Some(p) => Ok(format!(
                "I've read {} verses and completed {} chapters of the Bhagavad Gita, \
                 with {} minutes of study time!",
                p.verses_read.len(),
                p.chapters_completed.len(),
                p.total_reading_time
            )),
            None => Ok("Just started my Bhagavad Gita journey!".to_string()),
        }
    }

    /// Render the notes digest and hand it to the share sheet
    pub async fn share_notes_digest(&self, user_id: &str) -> Result<()> {
        let text = self.notes_digest(user_id).await?;
        self.share_sheet.share_text(&text).await?;
        Ok(())
    }

    /// Render the progress summary and hand it to the share sheet
    pub async fn share_progress_summary(&self, user_id: &str) -> Result<()> {
        let text = self.progress_summary(user_id).await?;
        self.share_sheet.share_text(&text).await?;
        Ok(())
    }

    /// Remove every key owned by the persistence layer
    ///
    /// Returns how many keys existed. Not atomic; a failure partway
    /// through leaves earlier categories wiped.
    pub async fn wipe_all(&self) -> Result<usize> {
        let removed = self
            .store
            .remove_many(&ALL_KEYS)
            .await
            .map_err(RepositoryError::Storage)?;
        tracing::debug!(removed, "wiped all persisted data");
        Ok(removed)
    }
}

/// Write via temp file + rename so a crash never leaves a torn file
async fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    let temp_path = path.with_extension("tmp");

    let mut file = tokio::fs::File::create(&temp_path).await?;
    file.write_all(contents.as_bytes()).await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(&temp_path, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use app_platform::{FixedFilePicker, RecordingShareSheet};
    use async_trait::async_trait;
    use mockall::mock;
    use tempfile::TempDir;

    mock! {
        Sheet {}

        #[async_trait]
        impl ShareSheet for Sheet {
            async fn share_file(&self, path: &Path) -> app_platform::Result<()>;
            async fn share_text(&self, text: &str) -> app_platform::Result<()>;
        }
    }

    struct Fixture {
        store: SharedStore,
        share_sheet: Arc<RecordingShareSheet>,
        _temp_dir: TempDir,
        export_dir: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let temp_dir = TempDir::new().unwrap();
            let export_dir = temp_dir.path().join("exports");
            Self {
                store: SharedStore::in_memory(),
                share_sheet: Arc::new(RecordingShareSheet::new()),
                export_dir,
                _temp_dir: temp_dir,
            }
        }

        fn service(&self, picker: FixedFilePicker) -> BackupService {
            BackupService::new(
                self.store.clone(),
                self.share_sheet.clone(),
                Arc::new(picker),
                &self.export_dir,
            )
        }

        async fn populate(&self) {
            let progress = ProgressRepository::new(self.store.clone());
            progress
                .create_default("u1", "Arjuna", "arjuna@example.com")
                .await
                .unwrap();
            progress.mark_verse_read("u1", "2.47").await.unwrap();
            progress.mark_chapter_completed("u1", 1).await.unwrap();

            let notes = NotesRepository::new(self.store.clone());
            notes
                .upsert(StudyNote::new("u1", "2.47", "Duty without attachment"))
                .await
                .unwrap();

            let analytics = AnalyticsRepository::new(self.store.clone());
            analytics.record_app_open().await.unwrap();
            analytics.record_feature_used("chat").await.unwrap();

            let preferences = PreferencesRepository::new(self.store.clone());
            let mut prefs = preferences.get().await.unwrap();
            prefs.theme = crate::preferences::Theme::Dark;
            preferences.save(&prefs).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_build_snapshot_contents() {
        let fixture = Fixture::new();
        fixture.populate().await;
        let service = fixture.service(FixedFilePicker::cancelled());

        let document = service.build_snapshot().await.unwrap();

        assert_eq!(document.format, CURRENT_FORMAT);
        assert!(document.is_recognized_format());
        assert_eq!(document.study_notes.len(), 1);
        assert_eq!(document.analytics.app_opens, 1);

        let progress = document.user_progress.unwrap();
        assert_eq!(progress.user_id, "u1");
        assert!(progress.verses_read.contains("2.47"));
    }

    #[tokio::test]
    async fn test_export_writes_file_and_shares() {
        let fixture = Fixture::new();
        fixture.populate().await;
        let service = fixture.service(FixedFilePicker::cancelled());

        let path = service.export_snapshot().await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let document = parse_snapshot(&contents).unwrap();
        assert!(document.is_recognized_format());

        // Temp file cleaned up by the atomic write
        assert!(!path.with_extension("tmp").exists());

        assert_eq!(fixture.share_sheet.shared_files().await, vec![path]);
    }

    #[tokio::test]
    async fn test_export_survives_share_failure() {
        let fixture = Fixture::new();
        fixture.populate().await;

        let mut sheet = MockSheet::new();
        sheet
            .expect_share_file()
            .returning(|_| Err(PlatformError::ShareFailed("no share target".to_string())));

        let service = BackupService::new(
            fixture.store.clone(),
            Arc::new(sheet),
            Arc::new(FixedFilePicker::cancelled()),
            &fixture.export_dir,
        );

        let path = service.export_snapshot().await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_export_import_round_trip() {
        let fixture = Fixture::new();
        fixture.populate().await;
        let service = fixture.service(FixedFilePicker::cancelled());

        let before = service.build_snapshot().await.unwrap();
        let path = service.export_snapshot().await.unwrap();

        // Wipe and restore through the interactive path
        service.wipe_all().await.unwrap();
        let service = fixture.service(FixedFilePicker::new(&path));
        let outcome = service.import_snapshot().await.unwrap();
        assert_eq!(outcome, ImportOutcome::Restored);

        let after = service.build_snapshot().await.unwrap();
        assert_eq!(after.user_progress, before.user_progress);
        assert_eq!(after.study_notes, before.study_notes);
        assert_eq!(after.preferences, before.preferences);
        assert_eq!(after.analytics, before.analytics);
    }

    #[tokio::test]
    async fn test_import_cancelled() {
        let fixture = Fixture::new();
        let service = fixture.service(FixedFilePicker::cancelled());

        let outcome = service.import_snapshot().await.unwrap();
        assert_eq!(outcome, ImportOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_restore_rejects_unrecognized_format() {
        let fixture = Fixture::new();
        fixture.populate().await;
        let service = fixture.service(FixedFilePicker::cancelled());

        let before = service.build_snapshot().await.unwrap();

        let mut document = before.clone();
        document.format = "not-a-backup".to_string();

        let result = service.restore(&document).await;
        assert!(matches!(result, Err(BackupError::InvalidFormat(_))));

        // Nothing was written
        let after = service.build_snapshot().await.unwrap();
        assert_eq!(after.user_progress, before.user_progress);
        assert_eq!(after.study_notes, before.study_notes);
        assert_eq!(after.analytics, before.analytics);
    }

    #[tokio::test]
    async fn test_parse_snapshot_rejects_garbage() {
        let result = parse_snapshot("this is not json");
        assert!(matches!(result, Err(BackupError::InvalidFormat(_))));
    }

    #[tokio::test]
    async fn test_restore_defaults_missing_optional_sections() {
        let fixture = Fixture::new();
        let service = fixture.service(FixedFilePicker::cancelled());

        // A document written by a build that predates notes and analytics
        let json = format!(
            r#"{{
                "userProgress": null,
                "preferences": {{}},
                "exportedAt": "2025-01-01T00:00:00Z",
                "appVersion": "0.0.1",
                "format": "{FORMAT_PREFIX}-v0"
            }}"#
        );
        let document = parse_snapshot(&json).unwrap();
        assert!(document.study_notes.is_empty());
        assert_eq!(document.analytics, UsageAnalytics::default());

        service.restore(&document).await.unwrap();
    }

    #[tokio::test]
    async fn test_restore_is_replace_all() {
        let fixture = Fixture::new();
        fixture.populate().await;
        let service = fixture.service(FixedFilePicker::cancelled());

        let mut document = service.build_snapshot().await.unwrap();
        document.study_notes = vec![StudyNote::new("u2", "1.1", "replacement")];
        document.user_progress = None;

        service.restore(&document).await.unwrap();

        let after = service.build_snapshot().await.unwrap();
        assert!(after.user_progress.is_none());
        assert_eq!(after.study_notes.len(), 1);
        assert_eq!(after.study_notes[0].note, "replacement");
    }

    #[tokio::test]
    async fn test_notes_digest() {
        let fixture = Fixture::new();
        fixture.populate().await;
        let service = fixture.service(FixedFilePicker::cancelled());

        let digest = service.notes_digest("u1").await.unwrap();
        assert!(digest.contains("Progress for Arjuna"));
        assert!(digest.contains("Verses read: 1"));
        assert!(digest.contains("[2.47] Duty without attachment"));
    }

    #[tokio::test]
    async fn test_progress_summary() {
        let fixture = Fixture::new();
        fixture.populate().await;
        let service = fixture.service(FixedFilePicker::cancelled());

        let summary = service.progress_summary("u1").await.unwrap();
        assert!(summary.contains("1 verses"));
        assert!(summary.contains("1 chapters"));

        let empty = service.progress_summary("nobody").await.unwrap();
        assert!(empty.contains("Just started"));
    }

    #[tokio::test]
    async fn test_share_text_variants() {
        let fixture = Fixture::new();
        fixture.populate().await;
        let service = fixture.service(FixedFilePicker::cancelled());

        service.share_notes_digest("u1").await.unwrap();
        service.share_progress_summary("u1").await.unwrap();

        let texts = fixture.share_sheet.shared_texts().await;
        assert_eq!(texts.len(), 2);
        assert!(texts[0].contains("Study Notes"));
    }

    #[tokio::test]
    async fn test_wipe_all() {
        let fixture = Fixture::new();
        fixture.populate().await;
        let service = fixture.service(FixedFilePicker::cancelled());

        let removed = service.wipe_all().await.unwrap();
        assert!(removed >= 3);

        let after = service.build_snapshot().await.unwrap();
        assert!(after.user_progress.is_none());
        assert!(after.study_notes.is_empty());
        assert_eq!(after.analytics, UsageAnalytics::default());
    }
}
