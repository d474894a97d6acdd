//! Shared library for Ticket Pulse Lambda functions.
//!
//! This crate provides the ticket occupancy counter plus the common clients,
//! configuration, and HTTP helpers used across all Lambda functions.

pub mod config;
pub mod error;
pub mod http;
pub mod jira;
pub mod models;
pub mod occupancy;
pub mod secrets;
pub mod vehicle_spec;

pub use config::{Config, JiraConfig, OccupancyConfig};
pub use error::{Error, Result};
pub use jira::{JiraClient, TicketMapping};
pub use models::{PriorityClass, PrioritySummary, Ticket, VehicleSpecLookup};
pub use occupancy::{DayBucket, DurationTable, OccupancyCounter};
pub use secrets::{get_secret, resolve_jira_token};
pub use vehicle_spec::{VehicleSpecClient, VehicleSpecReply};
