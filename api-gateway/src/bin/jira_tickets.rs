//! Jira Tickets Lambda - Handles GET /jira-tickets.
//!
//! Returns how many of the currently open tickets fall in each priority class,
//! plus the total reported by Jira.

use lambda_http::{run, service_fn, Body, Error, Request, Response};
use shared::http::{error_from, json_response};
use shared::jira::summarize_priorities;
use shared::{Config, JiraClient};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Application state
struct AppState {
    jira: JiraClient,
    jql: String,
}

impl AppState {
    async fn new() -> Result<Self, Error> {
        let config = Config::from_env()?;
        let token = shared::resolve_jira_token(&config.jira).await?;

        Ok(Self {
            jira: JiraClient::new(config.http_client()?, &config.jira, token)?,
            jql: config.jira.jql,
        })
    }
}

async fn handler(state: Arc<AppState>, _event: Request) -> Result<Response<Body>, Error> {
    let result = match state.jira.search_all(&state.jql).await {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "Failed to query Jira");
            return error_from(&e);
        }
    };

    let summary = summarize_priorities(&result.issues, result.total);
    info!(
        p1 = summary.p1,
        p2 = summary.p2,
        p3 = summary.p3,
        total = summary.total,
        "Ticket counts"
    );

    json_response(200, &summary)
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
