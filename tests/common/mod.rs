//! In-process stand-in for the EIA region-data endpoint.

#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use gridpulse::eia::{EiaClient, RetryPolicy, TimeWindow};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Canned answer for one metric facet
#[derive(Clone, Debug)]
pub enum Reply {
    Hourly { start: DateTime<Utc>, values: Vec<f64> },
    Body(String),
    Status(u16),
    /// Answer the first request with `status`, later ones with `then`
    FailOnce { status: u16, then: Box<Reply> },
    /// Hold every request for `delay` before answering with `then`
    Delay { delay: std::time::Duration, then: Box<Reply> },
}

struct MockState {
    replies: HashMap<String, Reply>,
    hits: AtomicUsize,
    failed: Mutex<HashSet<String>>,
    queries: Mutex<Vec<HashMap<String, String>>>,
}

pub struct MockUpstream {
    pub base_url: String,
    state: Arc<MockState>,
}

impl MockUpstream {
    pub async fn start(replies: HashMap<String, Reply>) -> Self {
        let state = Arc::new(MockState {
            replies,
            hits: AtomicUsize::new(0),
            failed: Mutex::new(HashSet::new()),
            queries: Mutex::new(Vec::new()),
        });
        let app = Router::new()
            .route("/data/", get(region_data))
            .with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}/data/"),
            state,
        }
    }

    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<HashMap<String, String>> {
        self.state.queries.lock().unwrap().clone()
    }

    pub fn client(&self) -> EiaClient {
        client_for(&self.base_url, std::time::Duration::from_secs(5))
    }

    pub fn client_with_timeout(&self, timeout: std::time::Duration) -> EiaClient {
        client_for(&self.base_url, timeout)
    }
}

pub fn client_for(base_url: &str, timeout: std::time::Duration) -> EiaClient {
    EiaClient::builder("test-key")
        .base_url(base_url)
        .timeout(timeout)
        .retry(RetryPolicy {
            retries: 1,
            backoff: std::time::Duration::from_millis(10),
        })
        .build()
        .unwrap()
}

async fn region_data(
    State(state): State<Arc<MockState>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    state.queries.lock().unwrap().push(query.clone());

    let facet = query.get("facets[metric][]").cloned().unwrap_or_default();
    match state.replies.get(&facet) {
        Some(Reply::Delay { delay, then }) => {
            tokio::time::sleep(*delay).await;
            render(then, &facet, &state)
        }
        Some(reply) => render(reply, &facet, &state),
        None => Json(json!({"response": {"data": []}})).into_response(),
    }
}

fn render(reply: &Reply, facet: &str, state: &MockState) -> Response {
    match reply {
        Reply::Hourly { start, values } => {
            let data: Vec<_> = values
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    let ts = *start + Duration::hours(i as i64);
                    json!({
                        "period": ts.format("%Y-%m-%dT%H").to_string(),
                        "respondent": "CISO",
                        "value": v,
                        "value-units": "megawatthours"
                    })
                })
                .collect();
            Json(json!({"response": {"total": data.len(), "data": data}})).into_response()
        }
        Reply::Body(body) => (StatusCode::OK, body.clone()).into_response(),
        Reply::Status(code) => StatusCode::from_u16(*code).unwrap().into_response(),
        Reply::Delay { then, .. } => render(then, facet, state),
        Reply::FailOnce { status, then } => {
            let first = state.failed.lock().unwrap().insert(facet.to_string());
            if first {
                StatusCode::from_u16(*status).unwrap().into_response()
            } else {
                render(then, facet, state)
            }
        }
    }
}

pub fn week_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap()
}

pub fn week_window() -> TimeWindow {
    TimeWindow::new(week_start(), week_start() + Duration::hours(167))
}

/// Daily-shaped load values
pub fn load_curve(hours: usize, base: f64, swing: f64) -> Vec<f64> {
    (0..hours)
        .map(|h| {
            let phase = (h % 24) as f64 / 24.0 * std::f64::consts::TAU;
            let jitter = ((h * 7919) % 11) as f64 * 20.0;
            base + swing * phase.sin() + jitter
        })
        .collect()
}

pub fn hourly(values: Vec<f64>) -> Reply {
    Reply::Hourly {
        start: week_start(),
        values,
    }
}
