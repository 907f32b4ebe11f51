//! User-preferences repository
//!
//! A singleton record, not keyed by user. The first read with nothing in
//! the store materializes the defaults and persists them before returning.
//! There is no numeric schema version: every field carries a serde default,
//! so a record written by an older build deserializes with the new fields
//! filled in.

use serde::{Deserialize, Serialize};
use storage::SharedStore;

use crate::repository::{Result, PREFERENCES_KEY};

/// Reading font size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum FontSize {
    /// Compact text
    Small,
    /// Standard text
    #[default]
    Medium,
    /// Enlarged text
    Large,
    /// Accessibility size
    ExtraLarge,
}

/// Color theme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Always light
    #[default]
    Light,
    /// Always dark
    Dark,
    /// Follow the system color scheme
    System,
}

/// User preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    /// UI and content language code
    #[serde(default = "default_language")]
    pub language: String,

    /// Reading font size
    #[serde(default)]
    pub font_size: FontSize,

    /// Color theme
    #[serde(default)]
    pub theme: Theme,

    /// Send a daily reading reminder
    #[serde(default)]
    pub daily_reminder_enabled: bool,

    /// Reminder time of day, "HH:MM"
    #[serde(default = "default_reminder_time")]
    pub reminder_time: String,

    /// Play interface sounds
    #[serde(default = "default_true")]
    pub sound_enabled: bool,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            language: default_language(),
            font_size: FontSize::default(),
            theme: Theme::default(),
            daily_reminder_enabled: false,
            reminder_time: default_reminder_time(),
            sound_enabled: true,
        }
    }
}

fn default_language() -> String {
    "en".to_string()
}

fn default_reminder_time() -> String {
    "08:00".to_string()
}

fn default_true() -> bool {
    true
}

/// Repository for the singleton preferences record
#[derive(Clone)]
pub struct PreferencesRepository {
    store: SharedStore,
}

impl PreferencesRepository {
    /// Create a repository over the given store
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Get the current preferences
    ///
    /// When nothing is stored yet, the defaults are persisted and then
    /// returned, so a subsequent raw read of the key sees a value.
    pub async fn get(&self) -> Result<UserPreferences> {
        let _guard = self.store.lock(PREFERENCES_KEY).await;

        match self.store.get(PREFERENCES_KEY).await? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => {
                let prefs = UserPreferences::default();
                self.write(&prefs).await?;
                tracing::debug!("materialized default preferences");
                Ok(prefs)
            }
        }
    }

    /// Overwrite the preferences record
    pub async fn save(&self, prefs: &UserPreferences) -> Result<()> {
        self.write(prefs).await
    }

    /// Remove the record, returning whether one existed
    pub async fn clear(&self) -> Result<bool> {
        Ok(self.store.remove(PREFERENCES_KEY).await?)
    }

    async fn write(&self, prefs: &UserPreferences) -> Result<()> {
        let json = serde_json::to_string(prefs)?;
        self.store.set(PREFERENCES_KEY, &json).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_defaults() {
        let prefs = UserPreferences::default();

        assert_eq!(prefs.language, "en");
        assert_eq!(prefs.font_size, FontSize::Medium);
        assert_eq!(prefs.theme, Theme::Light);
        assert!(!prefs.daily_reminder_enabled);
        assert_eq!(prefs.reminder_time, "08:00");
        assert!(prefs.sound_enabled);
    }

    #[tokio::test]
    async fn test_get_materializes_and_persists_defaults() {
        let store = SharedStore::in_memory();
        let repo = PreferencesRepository::new(store.clone());

        assert!(store.get(PREFERENCES_KEY).await.unwrap().is_none());

        let prefs = repo.get().await.unwrap();
        assert_eq!(prefs, UserPreferences::default());

        // Defaults were written through, not just returned
        let raw = store.get(PREFERENCES_KEY).await.unwrap();
        assert!(raw.is_some_and(|json| !json.is_empty()));
    }

    #[tokio::test]
    async fn test_save_round_trip() {
        let repo = PreferencesRepository::new(SharedStore::in_memory());

        let prefs = UserPreferences {
            language: "hi".to_string(),
            font_size: FontSize::Large,
            theme: Theme::Dark,
            daily_reminder_enabled: true,
            reminder_time: "06:30".to_string(),
            sound_enabled: false,
        };

        repo.save(&prefs).await.unwrap();
        assert_eq!(repo.get().await.unwrap(), prefs);
    }

    #[tokio::test]
    async fn test_partial_record_fills_missing_fields() {
        // A record written before new fields existed
        let store = SharedStore::in_memory();
        store
            .set(PREFERENCES_KEY, r#"{"language":"hi","theme":"dark"}"#)
            .await
            .unwrap();

        let repo = PreferencesRepository::new(store);
        let prefs = repo.get().await.unwrap();

        assert_eq!(prefs.language, "hi");
        assert_eq!(prefs.theme, Theme::Dark);
        assert_eq!(prefs.font_size, FontSize::Medium);
        assert_eq!(prefs.reminder_time, "08:00");
        assert!(prefs.sound_enabled);
    }

    #[tokio::test]
    async fn test_clear() {
        let repo = PreferencesRepository::new(SharedStore::in_memory());

        repo.get().await.unwrap();
        assert!(repo.clear().await.unwrap());
        assert!(!repo.clear().await.unwrap());
    }

    #[tokio::test]
    async fn test_serialization_shape() {
        let json = serde_json::to_value(UserPreferences::default()).unwrap();

        assert_eq!(json["language"], "en");
        assert_eq!(json["fontSize"], "medium");
        assert_eq!(json["theme"], "light");
        assert_eq!(json["dailyReminderEnabled"], false);
    }
}
