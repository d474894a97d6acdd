//! Configuration management for Lambda functions.

use std::env;
use std::time::Duration;

use crate::jira::TicketMapping;
use crate::models::PriorityClass;
use crate::occupancy::{DurationTable, OccupancyCounter};
use crate::{Error, Result};

const DEFAULT_JQL: &str =
    r#"status in (Open, "In Testing", Scheduled, Blocked) ORDER BY key ASC"#;
const DEFAULT_VEHICLE_SPEC_URL: &str =
    "https://gpas-ws-eu-prod.autodatadirect.com/gpas-ws/api/v1/eim2spec";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// AWS region
    pub aws_region: String,
    pub jira: JiraConfig,
    pub occupancy: OccupancyConfig,
    /// Remote vehicle specification endpoint
    pub vehicle_spec_url: String,
    /// Timeout applied to every outbound request
    pub http_timeout: Duration,
    /// SNS topic for capacity alerts
    pub capacity_topic_arn: Option<String>,
}

/// Jira connection and query settings.
#[derive(Debug, Clone)]
pub struct JiraConfig {
    pub base_url: String,
    pub jql: String,
    /// Bearer token given directly
    pub token: Option<String>,
    /// ARN of the secret holding the bearer token
    pub token_secret_arn: Option<String>,
    pub page_size: u32,
    /// Skip TLS certificate verification (self-signed corporate instances)
    pub accept_invalid_certs: bool,
    pub mapping: TicketMapping,
}

impl Default for JiraConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            jql: DEFAULT_JQL.to_string(),
            token: None,
            token_secret_arn: None,
            page_size: 50,
            accept_invalid_certs: false,
            mapping: TicketMapping::default(),
        }
    }
}

/// Occupancy counting settings.
#[derive(Debug, Clone)]
pub struct OccupancyConfig {
    pub durations: DurationTable,
    pub capacity_threshold: Option<u32>,
}

impl OccupancyConfig {
    pub fn counter(&self) -> OccupancyCounter {
        OccupancyCounter::new(self.durations.clone(), self.capacity_threshold)
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mapping = match var("TICKET_DATE_MAPPING") {
            Some(raw) => raw.parse()?,
            None => TicketMapping::default(),
        };

        let jira = JiraConfig {
            base_url: var("JIRA_BASE_URL").unwrap_or_default(),
            jql: var("JIRA_JQL").unwrap_or_else(|| DEFAULT_JQL.to_string()),
            token: var("JIRA_TOKEN"),
            token_secret_arn: var("JIRA_TOKEN_SECRET_ARN"),
            page_size: parse_number(var("JIRA_PAGE_SIZE"), "JIRA_PAGE_SIZE")?.unwrap_or(50),
            accept_invalid_certs: var("JIRA_ACCEPT_INVALID_CERTS")
                .is_some_and(|v| matches!(v.trim(), "1" | "true" | "yes")),
            mapping,
        };

        if jira.page_size == 0 {
            return Err(Error::Config("JIRA_PAGE_SIZE must be positive".to_string()));
        }

        let durations = match var("PRIORITY_DURATIONS") {
            Some(raw) => DurationTable::parse(&raw)?,
            None => DurationTable::default(),
        };
        durations.require(&PriorityClass::ALL)?;

        let occupancy = OccupancyConfig {
            durations,
            capacity_threshold: parse_threshold(var("CAPACITY_THRESHOLD"))?,
        };

        let http_timeout = Duration::from_secs(
            parse_number(var("HTTP_TIMEOUT_SECS"), "HTTP_TIMEOUT_SECS")?.unwrap_or(30),
        );

        Ok(Self {
            aws_region: var("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            jira,
            occupancy,
            vehicle_spec_url: var("VEHICLE_SPEC_URL")
                .unwrap_or_else(|| DEFAULT_VEHICLE_SPEC_URL.to_string()),
            http_timeout,
            capacity_topic_arn: var("CAPACITY_TOPIC_ARN"),
        })
    }

    /// Build the outbound HTTP client shared by a Lambda's handlers.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        Ok(reqwest::Client::builder()
            .timeout(self.http_timeout)
            .danger_accept_invalid_certs(self.jira.accept_invalid_certs)
            .build()?)
    }
}

fn parse_number<T: std::str::FromStr>(value: Option<String>, key: &str) -> Result<Option<T>> {
    value
        .map(|v| {
            v.trim()
                .parse()
                .map_err(|_| Error::Config(format!("{} must be a non-negative integer", key)))
        })
        .transpose()
}

fn parse_threshold(value: Option<String>) -> Result<Option<u32>> {
    let Some(raw) = value else {
        return Ok(None);
    };
    let threshold: i64 = raw.trim().parse().map_err(|_| {
        Error::Config(format!("CAPACITY_THRESHOLD '{}' is not an integer", raw.trim()))
    })?;
    u32::try_from(threshold)
        .map(Some)
        .map_err(|_| Error::Config("CAPACITY_THRESHOLD must be non-negative".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("JIRA_BASE_URL", "https://jira.example.com")]).unwrap();
        assert_eq!(config.jira.page_size, 50);
        assert_eq!(config.jira.mapping, TicketMapping::default());
        assert!(!config.jira.accept_invalid_certs);
        assert_eq!(config.occupancy.durations, DurationTable::default());
        assert_eq!(config.occupancy.capacity_threshold, None);
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.vehicle_spec_url, DEFAULT_VEHICLE_SPEC_URL);
        assert!(config.capacity_topic_arn.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("JIRA_BASE_URL", "https://jira.example.com"),
            ("JIRA_TOKEN", "abc"),
            ("JIRA_PAGE_SIZE", "100"),
            ("JIRA_ACCEPT_INVALID_CERTS", "true"),
            ("TICKET_DATE_MAPPING", "created"),
            ("PRIORITY_DURATIONS", "P1=1,P2=3,P3=7"),
            ("CAPACITY_THRESHOLD", "14"),
            ("CAPACITY_TOPIC_ARN", "arn:aws:sns:us-east-1:123:capacity"),
        ])
        .unwrap();

        assert_eq!(config.jira.token.as_deref(), Some("abc"));
        assert_eq!(config.jira.page_size, 100);
        assert!(config.jira.accept_invalid_certs);
        assert_eq!(config.jira.mapping, TicketMapping::Created);
        assert_eq!(config.occupancy.durations.get(PriorityClass::P3), Some(7));
        assert_eq!(config.occupancy.capacity_threshold, Some(14));
        assert!(config.capacity_topic_arn.is_some());
    }

    #[test]
    fn test_jira_settings_are_optional() {
        let config = load(&[]).unwrap();
        assert!(config.jira.base_url.is_empty());
        assert!(config.jira.token.is_none());
    }

    #[test]
    fn test_configuration_errors() {
        let base = ("JIRA_BASE_URL", "https://jira.example.com");
        assert!(matches!(
            load(&[base, ("CAPACITY_THRESHOLD", "-1")]),
            Err(Error::Config(ref msg)) if msg.contains("non-negative")
        ));
        assert!(matches!(
            load(&[base, ("CAPACITY_THRESHOLD", "lots")]),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            load(&[base, ("PRIORITY_DURATIONS", "P1=2,P2=5")]),
            Err(Error::Config(ref msg)) if msg.contains("P3")
        ));
        assert!(matches!(
            load(&[base, ("TICKET_DATE_MAPPING", "resolved")]),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            load(&[base, ("JIRA_PAGE_SIZE", "0")]),
            Err(Error::Config(_))
        ));
    }
}
