use thiserror::Error;

/// Failure of a single remote call for one site.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("request for site {site_id} failed: {message}")]
    Transport { site_id: String, message: String },
    #[error("request for site {site_id} timed out")]
    Timeout { site_id: String },
    #[error("analytics API returned {status} for site {site_id}: {body}")]
    Status {
        site_id: String,
        status: u16,
        body: String,
    },
    #[error("analytics API reported errors for site {site_id}: {message}")]
    GraphQl { site_id: String, message: String },
    #[error("malformed analytics response for site {site_id}: {reason}")]
    Malformed { site_id: String, reason: String },
}

impl FetchError {
    pub fn site_id(&self) -> &str {
        match self {
            Self::Transport { site_id, .. }
            | Self::Timeout { site_id }
            | Self::Status { site_id, .. }
            | Self::GraphQl { site_id, .. }
            | Self::Malformed { site_id, .. } => site_id,
        }
    }
}

/// Two samples were reported for the same bucket.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("duplicate samples for bucket {bucket}")]
pub struct MalformedSampleSet {
    pub bucket: String,
}

/// Why one site was dropped from an aggregation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SiteError {
    #[error(transparent)]
    PerSiteFetchFailed(#[from] FetchError),
    #[error("malformed sample set for site {site_id}: {source}")]
    MalformedSampleSet {
        site_id: String,
        #[source]
        source: MalformedSampleSet,
    },
    /// The per-site task panicked or was aborted.
    #[error("task for site {site_id} did not complete: {message}")]
    Task { site_id: String, message: String },
}

impl SiteError {
    pub fn site_id(&self) -> &str {
        match self {
            Self::PerSiteFetchFailed(e) => e.site_id(),
            Self::MalformedSampleSet { site_id, .. } | Self::Task { site_id, .. } => site_id,
        }
    }
}

/// Failure of a whole aggregation call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AggregationError {
    #[error("configuration invalid: {0}")]
    ConfigurationInvalid(String),
    #[error("all {failed} sites failed; first error: {first}")]
    AllSitesFailed { failed: usize, first: Box<SiteError> },
    #[error("could not list sites: {0}")]
    Directory(FetchError),
}
