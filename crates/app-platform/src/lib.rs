//! Platform-specific collaborators for Gita Companion
//!
//! The core never talks to a native share sheet or file picker directly;
//! it goes through the traits in this crate. Real mobile/desktop backends
//! implement them elsewhere. The implementations here are headless: a
//! logging no-op share sheet, a recording share sheet for assertions, and
//! a file picker with a preconfigured answer.

#![warn(missing_docs)]
#![warn(clippy::all)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;

/// Platform interaction error types
#[derive(Debug, Error)]
pub enum PlatformError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The native share sheet could not be invoked or was rejected
    #[error("Share failed: {0}")]
    ShareFailed(String),

    /// No file picker is available on this platform
    #[error("File picker unavailable")]
    PickerUnavailable,
}

/// Result type for platform operations
pub type Result<T> = std::result::Result<T, PlatformError>;

/// Native share sheet
#[async_trait]
pub trait ShareSheet: Send + Sync {
    /// Offer a file to the platform share mechanism
    async fn share_file(&self, path: &Path) -> Result<()>;

    /// Offer a piece of text to the platform share mechanism
    async fn share_text(&self, text: &str) -> Result<()>;
}

/// Native file picker
#[async_trait]
pub trait FilePicker: Send + Sync {
    /// Ask the user to choose a file
    ///
    /// Returns `None` when the user cancels the dialog.
    async fn pick_file(&self) -> Result<Option<PathBuf>>;
}

/// Share sheet that logs and succeeds
///
/// Used on headless platforms and in CI, where there is nothing to share to.
#[derive(Debug, Default)]
pub struct NullShareSheet;

#[async_trait]
impl ShareSheet for NullShareSheet {
    async fn share_file(&self, path: &Path) -> Result<()> {
        tracing::info!(path = %path.display(), "share sheet unavailable, skipping file share");
        Ok(())
    }

    async fn share_text(&self, text: &str) -> Result<()> {
        tracing::info!(len = text.len(), "share sheet unavailable, skipping text share");
        Ok(())
    }
}

/// Share sheet that records everything it is handed (test double)
#[derive(Debug, Default)]
pub struct RecordingShareSheet {
    files: Mutex<Vec<PathBuf>>,
    texts: Mutex<Vec<String>>,
}

impl RecordingShareSheet {
    /// Create an empty recording share sheet
    pub fn new() -> Self {
        Self::default()
    }

    /// Files shared so far
    pub async fn shared_files(&self) -> Vec<PathBuf> {
        self.files.lock().await.clone()
    }

    /// Texts shared so far
    pub async fn shared_texts(&self) -> Vec<String> {
        self.texts.lock().await.clone()
    }
}

#[async_trait]
impl ShareSheet for RecordingShareSheet {
    async fn share_file(&self, path: &Path) -> Result<()> {
        self.files.lock().await.push(path.to_path_buf());
        Ok(())
    }

    async fn share_text(&self, text: &str) -> Result<()> {
        self.texts.lock().await.push(text.to_string());
        Ok(())
    }
}

/// File picker that always returns a preconfigured answer
#[derive(Debug, Default)]
pub struct FixedFilePicker {
    choice: Option<PathBuf>,
}

impl FixedFilePicker {
    /// Picker that returns the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { choice: Some(path.into()) }
    }

    /// Picker that behaves as if the user cancelled
    pub fn cancelled() -> Self {
        Self { choice: None }
    }
}

#[async_trait]
impl FilePicker for FixedFilePicker {
    async fn pick_file(&self) -> Result<Option<PathBuf>> {
        Ok(self.choice.clone())
    }
}
