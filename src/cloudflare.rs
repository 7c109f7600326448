//! Cloudflare Web Analytics adapter: site directory over the REST API and
//! per-site samples over the GraphQL Analytics API.

use crate::analytics::{FetchError, FetchRequest, Sample, SampleFetcher, Site, SiteDirectory};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "https://api.cloudflare.com/client/v4";

/// Maximum number of groups requested per site. A 30-day daily series needs
/// 30, a 24-hour series 24.
const SERIES_LIMIT: u32 = 5000;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// HTTP client for the Cloudflare API. Cheap to clone.
#[derive(Clone)]
pub struct CloudflareClient {
    client: Client,
    base_url: String,
}

impl CloudflareClient {
    /// Build a client whose every request is bounded by `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(concat!("flarestats/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[derive(Debug, Deserialize)]
struct SiteListResponse {
    result: Option<Vec<SiteInfo>>,
}

#[derive(Debug, Deserialize)]
struct SiteInfo {
    site_tag: Option<String>,
    ruleset: Option<Ruleset>,
}

#[derive(Debug, Deserialize)]
struct Ruleset {
    zone_name: Option<String>,
}

#[async_trait]
impl SiteDirectory for CloudflareClient {
    /// Errors carry the account id in their `site_id` field.
    async fn list_sites(&self, token: &str, account_id: &str) -> Result<Vec<Site>, FetchError> {
        let url = format!("{}/accounts/{account_id}/rum/site_info/list", self.base_url);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| transport_error(account_id, &e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                site_id: account_id.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let body: SiteListResponse = resp.json().await.map_err(|e| FetchError::Malformed {
            site_id: account_id.to_string(),
            reason: e.to_string(),
        })?;
        let entries = body.result.ok_or_else(|| FetchError::Malformed {
            site_id: account_id.to_string(),
            reason: "missing result array".to_string(),
        })?;

        let sites: Vec<Site> = entries
            .into_iter()
            .filter_map(|entry| {
                let name = entry.ruleset?.zone_name?;
                let id = entry.site_tag?;
                Some(Site { name, id })
            })
            .collect();
        tracing::debug!(count = sites.len(), "Listed sites");
        Ok(sites)
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<GraphQlData>,
    errors: Option<Vec<GraphQlErrorEntry>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorEntry {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GraphQlData {
    viewer: Viewer,
}

#[derive(Debug, Deserialize)]
struct Viewer {
    accounts: Vec<AccountGroups>,
}

#[derive(Debug, Deserialize)]
struct AccountGroups {
    #[serde(default)]
    series: Vec<SeriesGroup>,
}

#[derive(Debug, Deserialize)]
struct SeriesGroup {
    #[serde(default)]
    count: i64,
    sum: Option<VisitSum>,
    dimensions: Option<Dimensions>,
}

#[derive(Debug, Deserialize)]
struct VisitSum {
    #[serde(default)]
    visits: i64,
}

#[derive(Debug, Deserialize)]
struct Dimensions {
    ts: Option<String>,
}

/// Build the GraphQL request body for one site's series.
fn series_query(request: &FetchRequest<'_>) -> serde_json::Value {
    let dimension = request.grid.granularity().dimension();
    let query = format!(
        "query SiteSeries($accountTag: string!, $filter: AccountRumPageloadEventsAdaptiveGroupsFilter_InputObject) {{
  viewer {{
    accounts(filter: {{ accountTag: $accountTag }}) {{
      series: rumPageloadEventsAdaptiveGroups(limit: {SERIES_LIMIT}, filter: $filter) {{
        count
        sum {{ visits }}
        dimensions {{ ts: {dimension} }}
      }}
    }}
  }}
}}"
    );

    let mut filters = vec![
        serde_json::json!({
            "datetime_geq": request.grid.start().format(TIMESTAMP_FORMAT).to_string(),
            "datetime_leq": request.grid.end().format(TIMESTAMP_FORMAT).to_string(),
        }),
        serde_json::json!({ "siteTag": request.site_id }),
    ];
    if request.exclude_bots {
        filters.push(serde_json::json!({ "bot": 0 }));
    }

    serde_json::json!({
        "query": query,
        "variables": {
            "accountTag": request.account_id,
            "filter": { "AND": filters },
        },
    })
}

#[async_trait]
impl SampleFetcher for CloudflareClient {
    async fn fetch_samples(&self, request: FetchRequest<'_>) -> Result<Vec<Sample>, FetchError> {
        let site_id = request.site_id;
        let body = series_query(&request);

        let resp = self
            .client
            .post(format!("{}/graphql", self.base_url))
            .bearer_auth(request.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(site_id, &e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                site_id: site_id.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GraphQlResponse = resp.json().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    site_id: site_id.to_string(),
                }
            } else {
                FetchError::Malformed {
                    site_id: site_id.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        if let Some(errors) = parsed.errors.filter(|errs| !errs.is_empty()) {
            let message = errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(FetchError::GraphQl {
                site_id: site_id.to_string(),
                message,
            });
        }

        let account = parsed
            .data
            .and_then(|d| d.viewer.accounts.into_iter().next())
            .ok_or_else(|| FetchError::Malformed {
                site_id: site_id.to_string(),
                reason: "missing data.viewer.accounts[0]".to_string(),
            })?;

        let samples: Vec<Sample> = account
            .series
            .into_iter()
            .filter_map(|group| {
                let bucket = group.dimensions?.ts?;
                let visits = group.sum.map_or(0, |s| s.visits);
                Some(Sample {
                    bucket,
                    visits,
                    page_views: group.count,
                })
            })
            .collect();
        tracing::debug!(site_id, samples = samples.len(), "Fetched samples");
        Ok(samples)
    }
}

fn transport_error(site_id: &str, e: &reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            site_id: site_id.to_string(),
        }
    } else {
        FetchError::Transport {
            site_id: site_id.to_string(),
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{BucketGrid, Period};
    use chrono::{TimeZone, Utc};

    fn request<'a>(grid: &'a BucketGrid, exclude_bots: bool) -> FetchRequest<'a> {
        FetchRequest {
            site_id: "tag123",
            period: Period::Day,
            exclude_bots,
            token: "secret",
            account_id: "acct",
            grid,
        }
    }

    #[test]
    fn test_series_query_hourly_uses_datetime_hour() {
        let grid = BucketGrid::generate(
            Period::Day,
            Utc.with_ymd_and_hms(2024, 1, 15, 10, 37, 5).unwrap(),
        );
        let body = series_query(&request(&grid, true));
        let query = body["query"].as_str().unwrap();
        assert!(query.contains("ts: datetimeHour"));
        assert!(query.contains("limit: 5000"));

        let filters = body["variables"]["filter"]["AND"].as_array().unwrap();
        assert_eq!(filters.len(), 3);
        assert_eq!(filters[0]["datetime_geq"], "2024-01-14T11:00:00Z");
        assert_eq!(filters[0]["datetime_leq"], "2024-01-15T10:37:05Z");
        assert_eq!(filters[1]["siteTag"], "tag123");
        assert_eq!(filters[2]["bot"], 0);
        assert_eq!(body["variables"]["accountTag"], "acct");
    }

    #[test]
    fn test_series_query_daily_without_bot_filter() {
        let grid = BucketGrid::generate(
            Period::Week,
            Utc.with_ymd_and_hms(2024, 1, 21, 8, 0, 0).unwrap(),
        );
        let body = series_query(&request(&grid, false));
        assert!(body["query"].as_str().unwrap().contains("ts: date"));
        let filters = body["variables"]["filter"]["AND"].as_array().unwrap();
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[0]["datetime_geq"], "2024-01-15T00:00:00Z");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = CloudflareClient::new("http://localhost:1234/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:1234");
    }
}
