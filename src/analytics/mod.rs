//! Analytics aggregation engine.
//!
//! Fetches sparse per-site samples from a remote source, aligns them onto a
//! fixed bucket grid and returns per-site series and totals.

pub mod aggregate;
pub mod error;
pub mod grid;
pub mod normalize;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use aggregate::Aggregator;
pub use error::{AggregationError, FetchError, MalformedSampleSet, SiteError};
pub use grid::{BucketGrid, Granularity};
pub use normalize::{normalize, NormalizedSeries};

/// Reporting period selected by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Period {
    #[default]
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
}

impl Period {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Day => "24h",
            Self::Week => "7d",
            Self::Month => "30d",
        }
    }

    /// Number of buckets in the grid for this period.
    pub const fn bucket_count(self) -> usize {
        match self {
            Self::Day => 24,
            Self::Week => 7,
            Self::Month => 30,
        }
    }

    pub const fn granularity(self) -> Granularity {
        match self {
            Self::Day => Granularity::Hour,
            Self::Week | Self::Month => Granularity::Day,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "24h" => Ok(Self::Day),
            "7d" => Ok(Self::Week),
            "30d" => Ok(Self::Month),
            other => Err(format!("Invalid period: {other}. Use '24h', '7d' or '30d'.")),
        }
    }
}

/// Per-call inputs to an aggregation. Never mutated by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationConfig {
    pub token: String,
    pub account_id: String,
    pub period: Period,
    pub exclude_bots: bool,
}

impl AggregationConfig {
    /// Reject empty credentials before any network call is made.
    pub fn validate(&self) -> Result<(), AggregationError> {
        if self.token.trim().is_empty() {
            return Err(AggregationError::ConfigurationInvalid(
                "API token must not be empty".to_string(),
            ));
        }
        if self.account_id.trim().is_empty() {
            return Err(AggregationError::ConfigurationInvalid(
                "account ID must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// A site as listed by the account directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub name: String,
    /// Opaque identifier (Cloudflare site tag) used to query analytics.
    pub id: String,
}

impl Site {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }
}

/// One raw data point for a single bucket, as returned by the remote source.
///
/// Counts are signed so that bad upstream data stays visible instead of
/// being clamped away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub bucket: String,
    pub visits: i64,
    pub page_views: i64,
}

impl Sample {
    pub fn new(bucket: impl Into<String>, visits: i64, page_views: i64) -> Self {
        Self {
            bucket: bucket.into(),
            visits,
            page_views,
        }
    }
}

/// A single entry of a gap-free series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub timestamp: String,
    pub visits: i64,
    pub page_views: i64,
}

/// Aggregated analytics for one site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteAnalytics {
    pub name: String,
    pub visits: i64,
    pub page_views: i64,
    pub series: Vec<SeriesPoint>,
}

/// Parameters for one per-site sample query.
#[derive(Debug, Clone)]
pub struct FetchRequest<'a> {
    pub site_id: &'a str,
    pub period: Period,
    pub exclude_bots: bool,
    pub token: &'a str,
    pub account_id: &'a str,
    pub grid: &'a BucketGrid,
}

/// Source of raw per-site samples. One attempt per call, no retries.
#[async_trait]
pub trait SampleFetcher: Send + Sync {
    async fn fetch_samples(&self, request: FetchRequest<'_>) -> Result<Vec<Sample>, FetchError>;
}

/// Lists the sites that belong to an account, in display order.
#[async_trait]
pub trait SiteDirectory: Send + Sync {
    async fn list_sites(&self, token: &str, account_id: &str) -> Result<Vec<Site>, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(token: &str, account_id: &str) -> AggregationConfig {
        AggregationConfig {
            token: token.to_string(),
            account_id: account_id.to_string(),
            period: Period::Day,
            exclude_bots: true,
        }
    }

    #[test]
    fn test_period_round_trips_through_str() {
        for period in [Period::Day, Period::Week, Period::Month] {
            assert_eq!(period.as_str().parse::<Period>().unwrap(), period);
        }
    }

    #[test]
    fn test_period_rejects_unknown() {
        let err = "90d".parse::<Period>().unwrap_err();
        assert!(err.contains("90d"));
    }

    #[test]
    fn test_period_default_is_24h() {
        assert_eq!(Period::default(), Period::Day);
    }

    #[test]
    fn test_period_serde_uses_short_names() {
        assert_eq!(serde_json::to_string(&Period::Week).unwrap(), "\"7d\"");
        let p: Period = serde_json::from_str("\"30d\"").unwrap();
        assert_eq!(p, Period::Month);
    }

    #[test]
    fn test_validate_accepts_credentials() {
        assert!(config("tok", "acct").validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_token() {
        let err = config("", "acct").validate().unwrap_err();
        assert!(matches!(err, AggregationError::ConfigurationInvalid(_)));
    }

    #[test]
    fn test_validate_rejects_blank_account() {
        let err = config("tok", "   ").validate().unwrap_err();
        assert!(matches!(err, AggregationError::ConfigurationInvalid(_)));
    }
}
