//! In-process stand-in for the Cloudflare REST and GraphQL endpoints.
#![allow(dead_code)]

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const GOOD_TOKEN: &str = "good-token";
pub const ACCOUNT: &str = "acct-1";

#[derive(Clone, Default)]
pub struct MockCloudflare {
    pub fail_all: Arc<AtomicBool>,
    pub graphql_calls: Arc<AtomicUsize>,
    pub bodies: Arc<Mutex<Vec<Value>>>,
    pub sites: Arc<Mutex<Vec<(&'static str, &'static str)>>>,
}

impl MockCloudflare {
    pub fn with_sites(sites: &[(&'static str, &'static str)]) -> Self {
        let mock = Self::default();
        *mock.sites.lock() = sites.to_vec();
        mock
    }

    /// Serve on an ephemeral port and return the base URL.
    pub async fn start(&self) -> String {
        let app = Router::new()
            .route("/accounts/{account}/rum/site_info/list", get(site_list))
            .route("/graphql", post(graphql))
            .with_state(self.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    pub fn last_body(&self) -> Value {
        self.bodies.lock().last().cloned().unwrap()
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {GOOD_TOKEN}"))
}

async fn site_list(
    State(mock): State<MockCloudflare>,
    Path(account): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) || account != ACCOUNT {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "success": false, "errors": [{ "message": "Authentication error" }] })),
        )
            .into_response();
    }
    let mut result: Vec<Value> = mock
        .sites
        .lock()
        .iter()
        .map(|(tag, zone)| json!({ "site_tag": tag, "ruleset": { "zone_name": zone } }))
        .collect();
    // Entries without a zone name are skipped by the client.
    result.push(json!({ "site_tag": "orphan" }));
    Json(json!({ "success": true, "result": result })).into_response()
}

async fn graphql(
    State(mock): State<MockCloudflare>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    mock.graphql_calls.fetch_add(1, Ordering::SeqCst);
    mock.bodies.lock().push(body.clone());

    if !authorized(&headers) {
        return StatusCode::FORBIDDEN.into_response();
    }

    let filters = &body["variables"]["filter"]["AND"];
    let tag = filters[1]["siteTag"].as_str().unwrap_or_default().to_string();
    let start = filters[0]["datetime_geq"].as_str().unwrap_or_default();
    let hourly = body["query"]
        .as_str()
        .is_some_and(|q| q.contains("ts: datetimeHour"));
    let first_key = if hourly {
        start.to_string()
    } else {
        start.chars().take(10).collect()
    };

    if mock.fail_all.load(Ordering::SeqCst) {
        return (StatusCode::SERVICE_UNAVAILABLE, "maintenance").into_response();
    }

    match tag.as_str() {
        "tag-500" => (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response(),
        "tag-gqlerr" => Json(json!({
            "data": null,
            "errors": [{ "message": "quota exceeded" }, { "message": "try later" }],
        }))
        .into_response(),
        "tag-noaccount" => {
            Json(json!({ "data": { "viewer": { "accounts": [] } }, "errors": null })).into_response()
        }
        "tag-slow" => {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Json(json!({ "data": { "viewer": { "accounts": [{ "series": [] }] } } })).into_response()
        }
        "tag-dup" => Json(json!({
            "data": { "viewer": { "accounts": [{ "series": [
                { "count": 1, "sum": { "visits": 1 }, "dimensions": { "ts": first_key } },
                { "count": 2, "sum": { "visits": 2 }, "dimensions": { "ts": first_key } },
            ] }] } },
            "errors": null,
        }))
        .into_response(),
        _ => Json(json!({
            "data": { "viewer": { "accounts": [{ "series": [
                { "count": 9, "sum": { "visits": 5 }, "dimensions": { "ts": first_key } },
                { "count": 4, "sum": { "visits": 1 } },
            ] }] } },
            "errors": null,
        }))
        .into_response(),
    }
}
