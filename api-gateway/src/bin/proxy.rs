//! Proxy Lambda - Handles POST /proxy.
//!
//! Forwards a vehicle specification lookup to the remote eim2spec API and
//! relays its status code and JSON body back to the caller.

use lambda_http::http::Method;
use lambda_http::{run, service_fn, Body, Error, Request, Response};
use shared::http::{error_from, error_response, json_response};
use shared::{parse_body, Config, VehicleSpecClient, VehicleSpecLookup};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Application state
struct AppState {
    client: VehicleSpecClient,
}

impl AppState {
    async fn new() -> Result<Self, Error> {
        let config = Config::from_env()?;

        Ok(Self {
            client: VehicleSpecClient::new(config.http_client()?, config.vehicle_spec_url),
        })
    }
}

async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    if event.method() != Method::POST {
        return error_response(405, "Method not allowed");
    }

    let request: VehicleSpecLookup = parse_body!(event.body());

    match state.client.lookup(&request).await {
        Ok(reply) => {
            info!(status = reply.status, "Vehicle spec lookup complete");
            json_response(reply.status, &reply.body)
        }
        Err(e) => {
            error!(error = %e, "Vehicle spec lookup failed");
            error_from(&e)
        }
    }
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
