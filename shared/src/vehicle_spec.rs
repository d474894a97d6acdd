//! Vehicle specification lookup client.

use reqwest::StatusCode;
use serde_json::Value;
use tracing::{info, warn};
use validator::Validate;

use crate::models::VehicleSpecLookup;
use crate::{Error, Result};

/// Upstream answer relayed to the caller.
#[derive(Debug)]
pub struct VehicleSpecReply {
    pub status: u16,
    pub body: Value,
}

/// Forwards lookups to the remote eim2spec endpoint.
#[derive(Debug, Clone)]
pub struct VehicleSpecClient {
    http_client: reqwest::Client,
    endpoint: String,
}

impl VehicleSpecClient {
    pub fn new(http_client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http_client,
            endpoint: endpoint.into(),
        }
    }

    /// Validate and forward a lookup, returning the upstream status and JSON body.
    pub async fn lookup(&self, request: &VehicleSpecLookup) -> Result<VehicleSpecReply> {
        request.validate()?;
        info!(eims = request.eims.len(), "Forwarding vehicle spec lookup");

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        decode_reply(status, &text)
    }
}

fn decode_reply(status: StatusCode, text: &str) -> Result<VehicleSpecReply> {
    match serde_json::from_str(text) {
        Ok(body) => Ok(VehicleSpecReply {
            status: status.as_u16(),
            body,
        }),
        Err(_) if !status.is_success() => {
            warn!(status = status.as_u16(), "Vehicle spec API returned a non-JSON error");
            Err(Error::Upstream {
                status: status.as_u16(),
                body: text.to_string(),
            })
        }
        Err(e) => Err(e.into()),
    }
}
