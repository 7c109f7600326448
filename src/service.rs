use crate::analytics::{AggregationError, Aggregator, SiteDirectory};
use crate::cache::{snapshot_key, Snapshot, SnapshotCache};
use crate::settings::{Settings, SettingsError, SettingsStore};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Aggregation(#[from] AggregationError),
}

/// Analytics as handed to the presentation layer.
#[derive(Debug, Clone)]
pub struct CurrentAnalytics {
    pub snapshot: Arc<Snapshot>,
    /// Set when the refresh failed and an older snapshot is served instead.
    pub stale_reason: Option<String>,
}

/// Loads settings, lists the account's sites and aggregates their analytics.
pub struct AnalyticsService {
    directory: Arc<dyn SiteDirectory>,
    aggregator: Aggregator,
    settings: SettingsStore,
    cache: SnapshotCache,
}

impl AnalyticsService {
    pub fn new(
        directory: Arc<dyn SiteDirectory>,
        aggregator: Aggregator,
        settings: SettingsStore,
        cache: SnapshotCache,
    ) -> Self {
        Self {
            directory,
            aggregator,
            settings,
            cache,
        }
    }

    pub const fn settings_store(&self) -> &SettingsStore {
        &self.settings
    }

    pub const fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    pub const fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// Fetch fresh analytics and store them as the latest snapshot.
    pub async fn refresh(&self) -> Result<Arc<Snapshot>, RefreshError> {
        let settings = self.settings.load()?;
        self.refresh_with(&settings).await
    }

    async fn refresh_with(&self, settings: &Settings) -> Result<Arc<Snapshot>, RefreshError> {
        let config = settings.aggregation_config();
        config.validate()?;

        let sites = self
            .directory
            .list_sites(&config.token, &config.account_id)
            .await
            .map_err(AggregationError::Directory)?;
        let fetched_at = Utc::now();
        let sites = self.aggregator.aggregate_at(&sites, &config, fetched_at).await?;

        let snapshot = Arc::new(Snapshot {
            sites,
            period: config.period,
            fetched_at,
        });
        self.cache
            .insert(snapshot_key(&config), Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// Serve a fresh cached snapshot, or refresh.
    ///
    /// When the refresh fails after credentials were accepted, the last
    /// snapshot for the same settings is returned marked stale. `force`
    /// skips the freshness check.
    pub async fn current(&self, force: bool) -> Result<CurrentAnalytics, RefreshError> {
        let settings = self.settings.load()?;
        let key = snapshot_key(&settings.aggregation_config());

        if !force {
            if let Some(snapshot) = self.cache.fresh(&key) {
                return Ok(CurrentAnalytics {
                    snapshot,
                    stale_reason: None,
                });
            }
        }

        match self.refresh_with(&settings).await {
            Ok(snapshot) => Ok(CurrentAnalytics {
                snapshot,
                stale_reason: None,
            }),
            Err(RefreshError::Aggregation(e))
                if !matches!(e, AggregationError::ConfigurationInvalid(_)) =>
            {
                match self.cache.latest(&key) {
                    Some(snapshot) => {
                        tracing::warn!(error = %e, "Refresh failed, serving previous snapshot");
                        Ok(CurrentAnalytics {
                            snapshot,
                            stale_reason: Some(e.to_string()),
                        })
                    }
                    None => Err(e.into()),
                }
            }
            Err(e) => Err(e),
        }
    }
}
