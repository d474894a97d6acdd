//! Tickets By Day Lambda - Handles GET /tickets-by-day.
//!
//! Fetches open tickets from Jira and returns, for every day covered by at
//! least one ticket, the number of active tickets per priority:
//!
//! `{ "YYYY-MM-DD": { "p1": 1, "p2": 0, "p3": 2, "total": 3 } }`
//!
//! Optional `from` / `to` query parameters (`YYYY-MM-DD`) restrict the days returned.

use chrono::NaiveDate;
use lambda_http::{run, service_fn, Body, Error, Request, RequestExt, Response};
use shared::http::{error_from, error_response, json_response};
use shared::occupancy::{clip_to_window, first_over_capacity, to_day_map};
use shared::{Config, JiraClient, OccupancyCounter, TicketMapping};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Application state
struct AppState {
    jira: JiraClient,
    jql: String,
    mapping: TicketMapping,
    counter: OccupancyCounter,
}

impl AppState {
    async fn new() -> Result<Self, Error> {
        let config = Config::from_env()?;
        let token = shared::resolve_jira_token(&config.jira).await?;
        let jira = JiraClient::new(config.http_client()?, &config.jira, token)?;

        Ok(Self {
            jira,
            jql: config.jira.jql.clone(),
            mapping: config.jira.mapping.clone(),
            counter: config.occupancy.counter(),
        })
    }
}

/// Parse an optional `YYYY-MM-DD` query parameter.
fn parse_day_param(value: Option<&str>, name: &str) -> Result<Option<NaiveDate>, String> {
    value
        .map(|raw| {
            NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                .map_err(|_| format!("Invalid '{}' date '{}', expected YYYY-MM-DD", name, raw))
        })
        .transpose()
}

async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    let params = event.query_string_parameters();

    let window = parse_day_param(params.first("from"), "from")
        .and_then(|from| Ok((from, parse_day_param(params.first("to"), "to")?)));
    let (from, to) = match window {
        Ok((Some(from), Some(to))) if from > to => {
            return error_response(400, "'from' must not be after 'to'");
        }
        Ok(window) => window,
        Err(message) => return error_response(400, message),
    };

    let tickets = match state.jira.fetch_tickets(&state.jql, &state.mapping).await {
        Ok(tickets) => tickets,
        Err(e) => {
            error!(error = %e, "Failed to fetch tickets from Jira");
            return error_from(&e);
        }
    };

    let buckets = clip_to_window(state.counter.compute(&tickets), from, to);

    if let Some(bucket) = first_over_capacity(&buckets) {
        warn!(
            day = %bucket.day,
            total = bucket.total,
            threshold = state.counter.capacity_threshold(),
            "Ticket load exceeds capacity"
        );
    }

    info!(
        tickets = tickets.len(),
        days = buckets.len(),
        "Tickets grouped by day"
    );

    json_response(200, &to_day_map(&buckets))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let state = Arc::new(AppState::new().await?);

    run(service_fn(move |event: Request| {
        let state = state.clone();
        async move { handler(state, event).await }
    }))
    .await
}
