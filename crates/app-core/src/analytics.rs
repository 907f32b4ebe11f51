//! Usage-analytics repository
//!
//! A singleton record of app opens and per-feature usage counts. Both
//! recording operations are read-modify-write cycles on the same key, so
//! they take the key's mutation lock; without it, two feature events firing
//! close together would drop an increment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use storage::SharedStore;

use crate::repository::{Result, ANALYTICS_KEY};

/// Local usage counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UsageAnalytics {
    /// Number of app launches
    #[serde(default)]
    pub app_opens: u64,

    /// When the app was last opened
    pub last_opened: Option<DateTime<Utc>>,

    /// Occurrence count per feature name; keys appear on first use
    #[serde(default)]
    pub features_used: BTreeMap<String, u64>,
}

/// Repository for the singleton analytics record
#[derive(Clone)]
pub struct AnalyticsRepository {
    store: SharedStore,
}

impl AnalyticsRepository {
    /// Create a repository over the given store
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Current counters; an empty store reads as all-zero
    pub async fn get(&self) -> Result<UsageAnalytics> {
        self.read().await
    }

    /// Count an app launch and stamp `last_opened`
    pub async fn record_app_open(&self) -> Result<UsageAnalytics> {
        let _guard = self.store.lock(ANALYTICS_KEY).await;

        let mut analytics = self.read().await?;
        analytics.app_opens += 1;
        analytics.last_opened = Some(Utc::now());
        self.write(&analytics).await?;

        Ok(analytics)
    }

    /// Count one use of the named feature, returning the new total
    pub async fn record_feature_used(&self, name: &str) -> Result<u64> {
        let _guard = self.store.lock(ANALYTICS_KEY).await;

        let mut analytics = self.read().await?;
        let count = analytics.features_used.entry(name.to_string()).or_insert(0);
        *count += 1;
        let count = *count;
        self.write(&analytics).await?;

        Ok(count)
    }

    /// Overwrite the record as-is (snapshot-import replay path)
    pub async fn save_raw(&self, analytics: &UsageAnalytics) -> Result<()> {
        self.write(analytics).await
    }

    /// Remove the record (privacy wipe), returning whether one existed
    pub async fn clear(&self) -> Result<bool> {
        Ok(self.store.remove(ANALYTICS_KEY).await?)
    }

    async fn read(&self) -> Result<UsageAnalytics> {
        match self.store.get(ANALYTICS_KEY).await? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(UsageAnalytics::default()),
        }
    }

    async fn write(&self, analytics: &UsageAnalytics) -> Result<()> {
        let json = serde_json::to_string(analytics)?;
        self.store.set(ANALYTICS_KEY, &json).await?;
        Ok(())
    }
}
