//! Jira search client and issue-to-ticket mapping.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::JiraConfig;
use crate::models::{PriorityClass, PrioritySummary, Ticket};
use crate::{Error, Result};

/// One page of `/rest/api/2/search` results.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    #[serde(default)]
    pub start_at: u32,
    #[serde(default)]
    pub max_results: u32,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub issues: Vec<Issue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    pub key: String,
    #[serde(default)]
    pub fields: IssueFields,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssueFields {
    pub priority: Option<IssuePriority>,
    /// Every other field, including `created` and custom date fields
    #[serde(flatten)]
    pub other: HashMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssuePriority {
    pub name: Option<String>,
}

impl Issue {
    pub fn priority_label(&self) -> &str {
        self.fields
            .priority
            .as_ref()
            .and_then(|p| p.name.as_deref())
            .unwrap_or("")
    }

    fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.other.get(name).and_then(Value::as_str)
    }

    /// Read a date-valued field as a calendar day.
    pub fn field_day(&self, name: &str) -> Option<NaiveDate> {
        let raw = self.field_str(name)?;
        let day = parse_day(raw);
        if day.is_none() {
            debug!(issue = %self.key, field = name, value = raw, "Ignoring unparsable date");
        }
        day
    }
}

/// All issues matched by a query.
#[derive(Debug, Default)]
pub struct SearchResult {
    pub issues: Vec<Issue>,
    /// Total reported by the server
    pub total: u32,
}

/// Parse a Jira date or timestamp into a UTC calendar day.
///
/// Accepts `YYYY-MM-DD`, RFC 3339, and Jira's `2025-02-01T10:00:00.000+0000`.
pub fn parse_day(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(day) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(day);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc).date_naive());
    }
    DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z")
        .ok()
        .map(|ts| ts.with_timezone(&Utc).date_naive())
}

/// How an issue's dates become a ticket's occupancy window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketMapping {
    /// Start on the creation day; end derived from the priority duration.
    Created,
    /// Explicit start and end fields; a missing end falls back to the duration.
    FieldRange { start_field: String, end_field: String },
    /// Start from a custom field; end always derived from the duration.
    StartField { field: String },
}

impl Default for TicketMapping {
    fn default() -> Self {
        TicketMapping::FieldRange {
            start_field: "startDate".to_string(),
            end_field: "finalDate".to_string(),
        }
    }
}

impl FromStr for TicketMapping {
    type Err = Error;

    /// `created`, `fields`, `fields:<start>,<end>` or `start:<field>`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || Error::Config(format!("invalid ticket date mapping '{}'", s));

        match s.split_once(':') {
            None if s == "created" => Ok(TicketMapping::Created),
            None if s == "fields" => Ok(TicketMapping::default()),
            Some(("fields", fields)) => {
                let (start, end) = fields.split_once(',').ok_or_else(invalid)?;
                let (start, end) = (start.trim(), end.trim());
                if start.is_empty() || end.is_empty() {
                    return Err(invalid());
                }
                Ok(TicketMapping::FieldRange {
                    start_field: start.to_string(),
                    end_field: end.to_string(),
                })
            }
            Some(("start", field)) if !field.trim().is_empty() => Ok(TicketMapping::StartField {
                field: field.trim().to_string(),
            }),
            _ => Err(invalid()),
        }
    }
}

impl TicketMapping {
    pub fn to_ticket(&self, issue: &Issue) -> Ticket {
        let (start_day, end_day) = match self {
            TicketMapping::Created => (issue.field_day("created"), None),
            TicketMapping::FieldRange {
                start_field,
                end_field,
            } => (issue.field_day(start_field), issue.field_day(end_field)),
            TicketMapping::StartField { field } => (issue.field_day(field), None),
        };
        Ticket::new(issue.key.clone(), issue.priority_label(), start_day, end_day)
    }
}

/// Count issues per priority class; `total` is the server-reported total.
pub fn summarize_priorities(issues: &[Issue], total: u32) -> PrioritySummary {
    issues.iter().fold(
        PrioritySummary {
            total,
            ..Default::default()
        },
        |mut summary, issue| {
            match PriorityClass::classify(issue.priority_label()) {
                Some(PriorityClass::P1) => summary.p1 += 1,
                Some(PriorityClass::P2) => summary.p2 += 1,
                Some(PriorityClass::P3) => summary.p3 += 1,
                None => {}
            }
            summary
        },
    )
}

/// Offset of the next page, or `None` once every issue has been read.
fn next_start(start_at: u32, page_len: usize, total: u32) -> Option<u32> {
    if page_len == 0 {
        return None;
    }
    let next = start_at.saturating_add(u32::try_from(page_len).unwrap_or(u32::MAX));
    (next < total).then_some(next)
}

/// Jira REST client authenticated with a bearer token.
#[derive(Debug, Clone)]
pub struct JiraClient {
    http_client: reqwest::Client,
    base_url: String,
    token: String,
    page_size: u32,
}

impl JiraClient {
    pub fn new(http_client: reqwest::Client, config: &JiraConfig, token: String) -> Result<Self> {
        let base_url = config.base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(Error::Config("JIRA_BASE_URL not set".to_string()));
        }

        Ok(Self {
            http_client,
            base_url: base_url.to_string(),
            token,
            page_size: config.page_size,
        })
    }

    fn search_url(&self, jql: &str, start_at: u32) -> String {
        format!(
            "{}/rest/api/2/search?jql={}&startAt={}&maxResults={}",
            self.base_url,
            urlencoding::encode(jql),
            start_at,
            self.page_size
        )
    }

    /// Fetch a single page of search results.
    pub async fn search_page(&self, jql: &str, start_at: u32) -> Result<SearchResponse> {
        let url = self.search_url(jql, start_at);
        debug!(url = %url, "Querying Jira");

        let response = self
            .http_client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Content-Type", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    /// Fetch every issue matching `jql`, following pagination.
    pub async fn search_all(&self, jql: &str) -> Result<SearchResult> {
        let mut result = SearchResult::default();
        let mut start_at = 0u32;

        loop {
            let page = self.search_page(jql, start_at).await?;
            let page_len = page.issues.len();
            result.total = page.total;
            result.issues.extend(page.issues);

            match next_start(start_at, page_len, page.total) {
                Some(next) => start_at = next,
                None => break,
            }
        }

        info!(
            issues = result.issues.len(),
            total = result.total,
            "Fetched issues from Jira"
        );
        Ok(result)
    }

    /// Fetch matching issues and map them into tickets.
    pub async fn fetch_tickets(&self, jql: &str, mapping: &TicketMapping) -> Result<Vec<Ticket>> {
        let result = self.search_all(jql).await?;
        Ok(result.issues.iter().map(|issue| mapping.to_ticket(issue)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_PAGE: &str = r#"{
        "startAt": 0,
        "maxResults": 50,
        "total": 4,
        "issues": [
            {"key": "PNCR-1", "fields": {"priority": {"name": "P1 - Critical"}, "created": "2025-02-01T09:15:00.000+0000", "startDate": "2025-02-01", "finalDate": "2025-02-03"}},
            {"key": "PNCR-2", "fields": {"priority": {"name": "P2"}, "created": "2025-02-02T23:30:00.000-0300", "startDate": "2025-02-02", "finalDate": null}},
            {"key": "PNCR-3", "fields": {"priority": {"name": "Trivial"}, "startDate": "not a date"}},
            {"key": "PNCR-4", "fields": {}}
        ]
    }"#;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn issues() -> Vec<Issue> {
        let page: SearchResponse = serde_json::from_str(SEARCH_PAGE).unwrap();
        page.issues
    }

    #[test]
    fn test_parse_search_response() {
        let page: SearchResponse = serde_json::from_str(SEARCH_PAGE).unwrap();
        assert_eq!(page.total, 4);
        assert_eq!(page.issues.len(), 4);
        assert_eq!(page.issues[0].priority_label(), "P1 - Critical");
        assert_eq!(page.issues[3].priority_label(), "");
    }

    #[test]
    fn test_parse_day_formats() {
        assert_eq!(parse_day("2025-02-01"), Some(day("2025-02-01")));
        assert_eq!(parse_day("2025-02-01T10:00:00Z"), Some(day("2025-02-01")));
        assert_eq!(parse_day("2025-02-01T10:00:00.000+0000"), Some(day("2025-02-01")));
        // Normalized to the UTC day
        assert_eq!(parse_day("2025-02-01T23:30:00.000-0300"), Some(day("2025-02-02")));
        assert_eq!(parse_day("01/02/2025"), None);
        assert_eq!(parse_day(""), None);
    }

    #[test]
    fn test_field_range_mapping() {
        let tickets: Vec<Ticket> = issues()
            .iter()
            .map(|i| TicketMapping::default().to_ticket(i))
            .collect();

        assert_eq!(tickets[0].start_day, Some(day("2025-02-01")));
        assert_eq!(tickets[0].end_day, Some(day("2025-02-03")));
        assert_eq!(tickets[1].start_day, Some(day("2025-02-02")));
        assert_eq!(tickets[1].end_day, None);
        assert_eq!(tickets[2].start_day, None);
        assert_eq!(tickets[3], Ticket::new("PNCR-4", "", None, None));
    }

    #[test]
    fn test_created_and_start_field_mapping() {
        let issues = issues();

        let created = TicketMapping::Created.to_ticket(&issues[1]);
        assert_eq!(created.start_day, Some(day("2025-02-03")));
        assert_eq!(created.end_day, None);

        let start_only = TicketMapping::StartField {
            field: "startDate".to_string(),
        }
        .to_ticket(&issues[0]);
        assert_eq!(start_only.start_day, Some(day("2025-02-01")));
        assert_eq!(start_only.end_day, None);
    }

    #[test]
    fn test_mapping_from_str() {
        assert_eq!("created".parse::<TicketMapping>().unwrap(), TicketMapping::Created);
        assert_eq!("fields".parse::<TicketMapping>().unwrap(), TicketMapping::default());
        assert_eq!(
            "fields:customfield_1, customfield_2".parse::<TicketMapping>().unwrap(),
            TicketMapping::FieldRange {
                start_field: "customfield_1".to_string(),
                end_field: "customfield_2".to_string(),
            }
        );
        assert_eq!(
            "start:customfield_13001".parse::<TicketMapping>().unwrap(),
            TicketMapping::StartField {
                field: "customfield_13001".to_string(),
            }
        );
        assert!("fields:only_one".parse::<TicketMapping>().is_err());
        assert!("start:".parse::<TicketMapping>().is_err());
        assert!("resolved".parse::<TicketMapping>().is_err());
    }

    #[test]
    fn test_summarize_priorities() {
        let summary = summarize_priorities(&issues(), 4);
        assert_eq!(
            summary,
            PrioritySummary {
                p1: 1,
                p2: 1,
                p3: 0,
                total: 4,
            }
        );
    }

    #[test]
    fn test_next_start() {
        assert_eq!(next_start(0, 50, 120), Some(50));
        assert_eq!(next_start(100, 20, 120), None);
        assert_eq!(next_start(0, 0, 120), None);
        assert_eq!(next_start(0, 10, 0), None);
    }

    #[test]
    fn test_search_url_encodes_jql() {
        let config = JiraConfig {
            base_url: "https://jira.example.com/".to_string(),
            ..JiraConfig::default()
        };
        let client = JiraClient::new(reqwest::Client::new(), &config, "token".to_string()).unwrap();
        let url = client.search_url("project = PNCR AND status in (Open)", 50);
        assert_eq!(
            url,
            "https://jira.example.com/rest/api/2/search?jql=project%20%3D%20PNCR%20AND%20status%20in%20%28Open%29&startAt=50&maxResults=50"
        );
    }

    #[test]
    fn test_client_requires_base_url() {
        let result = JiraClient::new(reqwest::Client::new(), &JiraConfig::default(), "token".to_string());
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
