use super::{
    normalize, AggregationConfig, AggregationError, BucketGrid, FetchRequest, SampleFetcher,
    Site, SiteAnalytics, SiteError,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;
use uuid::Uuid;

/// Fans one fetch out per site, joins them all, and assembles the result in
/// input order.
///
/// Sites whose fetch or normalization fails are dropped from the result. The
/// call itself only fails when no site succeeds. Dropping the returned future
/// aborts every outstanding per-site task.
#[derive(Clone)]
pub struct Aggregator {
    fetcher: Arc<dyn SampleFetcher>,
    max_concurrent: usize,
}

impl Aggregator {
    /// `max_concurrent` bounds in-flight fetches; 0 means unbounded.
    pub fn new(fetcher: Arc<dyn SampleFetcher>, max_concurrent: usize) -> Self {
        Self {
            fetcher,
            max_concurrent,
        }
    }

    pub const fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub async fn aggregate(
        &self,
        sites: &[Site],
        config: &AggregationConfig,
    ) -> Result<Vec<SiteAnalytics>, AggregationError> {
        self.aggregate_at(sites, config, Utc::now()).await
    }

    /// Same as [`Self::aggregate`] with an explicit clock.
    pub async fn aggregate_at(
        &self,
        sites: &[Site],
        config: &AggregationConfig,
        now: DateTime<Utc>,
    ) -> Result<Vec<SiteAnalytics>, AggregationError> {
        config.validate()?;
        if sites.is_empty() {
            return Ok(Vec::new());
        }

        let span = tracing::info_span!(
            "aggregate",
            run_id = %Uuid::new_v4(),
            sites = sites.len(),
            period = %config.period,
        );
        self.run(sites, config, now).instrument(span).await
    }

    async fn run(
        &self,
        sites: &[Site],
        config: &AggregationConfig,
        now: DateTime<Utc>,
    ) -> Result<Vec<SiteAnalytics>, AggregationError> {
        let grid = Arc::new(BucketGrid::generate(config.period, now));
        let config = Arc::new(config.clone());
        let limiter =
            (self.max_concurrent > 0).then(|| Arc::new(Semaphore::new(self.max_concurrent)));

        let mut tasks = JoinSet::new();
        for (index, site) in sites.iter().enumerate() {
            let fetcher = Arc::clone(&self.fetcher);
            let grid = Arc::clone(&grid);
            let config = Arc::clone(&config);
            let limiter = limiter.clone();
            let site = site.clone();
            tasks.spawn(
                async move {
                    let _permit = match limiter {
                        Some(sem) => sem.acquire_owned().await.ok(),
                        None => None,
                    };
                    let outcome = fetch_site(fetcher.as_ref(), &site, &config, &grid).await;
                    (index, outcome)
                }
                .in_current_span(),
            );
        }

        // One slot per input site; completion order never reaches the output.
        let mut slots: Vec<Option<Result<SiteAnalytics, SiteError>>> =
            (0..sites.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                Err(e) => tracing::error!(error = %e, "Site task did not complete"),
            }
        }

        let mut results = Vec::with_capacity(sites.len());
        let mut failures = Vec::new();
        for (site, slot) in sites.iter().zip(slots) {
            let outcome = slot.unwrap_or_else(|| {
                Err(SiteError::Task {
                    site_id: site.id.clone(),
                    message: "task panicked or was cancelled".to_string(),
                })
            });
            match outcome {
                Ok(analytics) => results.push(analytics),
                Err(e) => {
                    tracing::warn!(
                        site = %site.name,
                        site_id = %site.id,
                        error = %e,
                        "Dropping site from aggregation"
                    );
                    failures.push(e);
                }
            }
        }

        let failed_count = failures.len();
        if results.is_empty() {
            let failed = failed_count;
            if let Some(first) = failures.into_iter().next() {
                tracing::error!(failed, error = %first, "All sites failed");
                return Err(AggregationError::AllSitesFailed {
                    failed,
                    first: Box::new(first),
                });
            }
        }

        tracing::info!(
            succeeded = results.len(),
            failed = failed_count,
            "Aggregation completed"
        );
        Ok(results)
    }
}

async fn fetch_site(
    fetcher: &dyn SampleFetcher,
    site: &Site,
    config: &AggregationConfig,
    grid: &BucketGrid,
) -> Result<SiteAnalytics, SiteError> {
    let samples = fetcher
        .fetch_samples(FetchRequest {
            site_id: &site.id,
            period: config.period,
            exclude_bots: config.exclude_bots,
            token: &config.token,
            account_id: &config.account_id,
            grid,
        })
        .await?;

    let normalized =
        normalize(&samples, grid).map_err(|source| SiteError::MalformedSampleSet {
            site_id: site.id.clone(),
            source,
        })?;

    Ok(SiteAnalytics {
        name: site.name.clone(),
        visits: normalized.visits,
        page_views: normalized.page_views,
        series: normalized.series,
    })
}
