//! Capacity Monitor Lambda - Flags days where open tickets exceed team capacity.
//!
//! This Lambda runs daily via EventBridge and:
//! 1. Fetches open tickets from Jira
//! 2. Counts active tickets per day and priority
//! 3. Publishes an alert to SNS when any day is over the capacity threshold

use aws_sdk_sns::Client as SnsClient;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde::{Deserialize, Serialize};
use shared::occupancy::first_over_capacity;
use shared::{Config, DayBucket, JiraClient, OccupancyCounter, TicketMapping};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Alerts list at most this many days.
const MAX_ALERT_DAYS: usize = 10;

#[derive(Debug, Deserialize)]
struct ScheduledEvent {
    #[serde(default, rename = "detail-type")]
    detail_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MonitorResponse {
    tickets_fetched: usize,
    days_counted: usize,
    over_capacity_days: usize,
    first_over_capacity: Option<String>,
    alert_published: bool,
}

struct AppState {
    jira: JiraClient,
    jql: String,
    mapping: TicketMapping,
    counter: OccupancyCounter,
    sns_client: SnsClient,
    capacity_topic_arn: Option<String>,
}

impl AppState {
    async fn new() -> Result<Self, Error> {
        let config = Config::from_env()?;
        let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.aws_region.clone()))
            .load()
            .await;

        let token = shared::resolve_jira_token(&config.jira).await?;
        let jira = JiraClient::new(config.http_client()?, &config.jira, token)?;

        if config.occupancy.capacity_threshold.is_none() {
            warn!("CAPACITY_THRESHOLD not set, no day will be flagged");
        }

        Ok(Self {
            jira,
            jql: config.jira.jql.clone(),
            mapping: config.jira.mapping.clone(),
            counter: config.occupancy.counter(),
            sns_client: SnsClient::new(&aws_config),
            capacity_topic_arn: config.capacity_topic_arn,
        })
    }
}

/// Human-readable alert body listing the first over-capacity days.
fn alert_message(over: &[&DayBucket], threshold: Option<u32>) -> String {
    let mut lines = vec![format!(
        "{} day(s) exceed the capacity of {} active tickets:",
        over.len(),
        threshold.unwrap_or_default()
    )];

    lines.extend(over.iter().take(MAX_ALERT_DAYS).map(|bucket| {
        format!(
            "{}: {} tickets (P1 {}, P2 {}, P3 {})",
            bucket.day.format("%Y-%m-%d"),
            bucket.total,
            bucket.counts.p1,
            bucket.counts.p2,
            bucket.counts.p3
        )
    }));

    if over.len() > MAX_ALERT_DAYS {
        lines.push(format!("... and {} more", over.len() - MAX_ALERT_DAYS));
    }

    lines.join("\n")
}

async fn publish_alert(state: &AppState, topic_arn: &str, message: String) -> Result<(), Error> {
    state
        .sns_client
        .publish()
        .topic_arn(topic_arn)
        .subject("Ticket capacity exceeded")
        .message(message)
        .send()
        .await
        .map_err(|e| format!("Failed to publish to SNS: {}", e))?;

    Ok(())
}

async fn handler(
    state: Arc<AppState>,
    event: LambdaEvent<ScheduledEvent>,
) -> Result<MonitorResponse, Error> {
    info!(detail_type = %event.payload.detail_type, "Starting capacity check");

    let tickets = state.jira.fetch_tickets(&state.jql, &state.mapping).await?;
    let buckets = state.counter.compute(&tickets);
    let over: Vec<&DayBucket> = buckets.iter().filter(|b| b.over_capacity).collect();
    let first = first_over_capacity(&buckets).map(|b| b.day.format("%Y-%m-%d").to_string());

    let mut alert_published = false;
    if !over.is_empty() {
        warn!(
            days = over.len(),
            first_day = first.as_deref().unwrap_or_default(),
            "Ticket load exceeds capacity"
        );

        if let Some(topic_arn) = &state.capacity_topic_arn {
            let message = alert_message(&over, state.counter.capacity_threshold());
            match publish_alert(&state, topic_arn, message).await {
                Ok(()) => alert_published = true,
                Err(e) => error!(error = %e, "Failed to publish capacity alert"),
            }
        }
    }

    let response = MonitorResponse {
        tickets_fetched: tickets.len(),
        days_counted: buckets.len(),
        over_capacity_days: over.len(),
        first_over_capacity: first,
        alert_published,
    };

    info!(
        tickets_fetched = response.tickets_fetched,
        over_capacity_days = response.over_capacity_days,
        "Capacity check complete"
    );

    Ok(response)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let state = Arc::new(AppState::new().await?);
    let state_clone = state.clone();

    run(service_fn(move |event| {
        let state = state_clone.clone();
        async move { handler(state, event).await }
    }))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use shared::occupancy::DayCounts;

    fn bucket(day: u32, p1: u32) -> DayBucket {
        DayBucket::new(
            NaiveDate::from_ymd_opt(2025, 3, day).unwrap(),
            DayCounts { p1, p2: 1, p3: 0 },
            Some(2),
        )
    }

    #[test]
    fn test_alert_message_lists_days() {
        let days = [bucket(3, 2), bucket(4, 5)];
        let over: Vec<&DayBucket> = days.iter().collect();
        let message = alert_message(&over, Some(2));

        assert!(message.starts_with("2 day(s) exceed the capacity of 2"));
        assert!(message.contains("2025-03-03: 3 tickets (P1 2, P2 1, P3 0)"));
        assert!(message.contains("2025-03-04: 6 tickets"));
        assert!(!message.contains("more"));
    }

    #[test]
    fn test_alert_message_truncates_long_lists() {
        let days: Vec<DayBucket> = (1..=15).map(|d| bucket(d, 4)).collect();
        let over: Vec<&DayBucket> = days.iter().collect();
        let message = alert_message(&over, Some(2));

        assert_eq!(message.lines().count(), MAX_ALERT_DAYS + 2);
        assert!(message.ends_with("... and 5 more"));
    }

    #[test]
    fn test_scheduled_event_parses() {
        let event: ScheduledEvent =
            serde_json::from_str(r#"{"detail-type": "Scheduled Event", "source": "aws.events"}"#)
                .unwrap();
        assert_eq!(event.detail_type, "Scheduled Event");
    }
}
