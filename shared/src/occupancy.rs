//! Interval occupancy counting.
//!
//! Counts, for every calendar day, the tickets of each priority class whose
//! inclusive `[start, end]` interval covers that day. Each counted ticket adds
//! a +1 event on its start day and a -1 event on the day after its end day;
//! a single sweep over the ordered events yields the running counts, so the
//! cost depends on the number of tickets and not on how long they last.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use serde::Serialize;
use tracing::debug;

use crate::models::{PriorityClass, Ticket};
use crate::{Error, Result};

/// Fixed active duration, in days, per priority class.
///
/// Classes missing from the table are not counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurationTable {
    days: BTreeMap<PriorityClass, u32>,
}

impl DurationTable {
    /// Build a table, rejecting zero durations.
    pub fn new(entries: impl IntoIterator<Item = (PriorityClass, u32)>) -> Result<Self> {
        let mut days = BTreeMap::new();
        for (class, duration) in entries {
            if duration == 0 {
                return Err(Error::Config(format!(
                    "duration for {} must be a positive number of days",
                    class
                )));
            }
            days.insert(class, duration);
        }
        Ok(Self { days })
    }

    /// Parse a table written as `P1=2,P2=5,P3=10`.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut entries = Vec::new();
        for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (class, days) = pair
                .split_once('=')
                .ok_or_else(|| Error::Config(format!("invalid duration entry '{}'", pair)))?;
            let class: PriorityClass = class.parse().map_err(Error::Config)?;
            let days: u32 = days.trim().parse().map_err(|_| {
                Error::Config(format!("invalid duration '{}' for {}", days.trim(), class))
            })?;
            entries.push((class, days));
        }
        Self::new(entries)
    }

    pub fn get(&self, class: PriorityClass) -> Option<u32> {
        self.days.get(&class).copied()
    }

    /// Fail if any of `classes` has no duration entry.
    pub fn require(&self, classes: &[PriorityClass]) -> Result<()> {
        let missing: Vec<&str> = classes
            .iter()
            .filter(|class| !self.days.contains_key(*class))
            .map(PriorityClass::as_str)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(format!(
                "missing duration for priority class(es): {}",
                missing.join(", ")
            )))
        }
    }
}

impl Default for DurationTable {
    fn default() -> Self {
        Self {
            days: BTreeMap::from([
                (PriorityClass::P1, 2),
                (PriorityClass::P2, 5),
                (PriorityClass::P3, 10),
            ]),
        }
    }
}

/// The inclusive span of days during which a ticket counts as active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveInterval {
    pub class: PriorityClass,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Maps a ticket to the interval it occupies, or `None` to exclude it.
pub trait IntervalPolicy {
    fn interval(&self, ticket: &Ticket) -> Option<ActiveInterval>;
}

impl<F> IntervalPolicy for F
where
    F: Fn(&Ticket) -> Option<ActiveInterval>,
{
    fn interval(&self, ticket: &Ticket) -> Option<ActiveInterval> {
        self(ticket)
    }
}

/// Uses the explicit end day when present, otherwise `start + duration - 1`.
#[derive(Debug, Clone, Copy)]
pub struct DurationPolicy<'a> {
    durations: &'a DurationTable,
}

impl<'a> DurationPolicy<'a> {
    pub fn new(durations: &'a DurationTable) -> Self {
        Self { durations }
    }
}

impl IntervalPolicy for DurationPolicy<'_> {
    fn interval(&self, ticket: &Ticket) -> Option<ActiveInterval> {
        let class = ticket.priority_class()?;
        let duration = self.durations.get(class)?;
        let start = ticket.start_day?;

        let end = match ticket.end_day {
            Some(end) => end,
            None => start.checked_add_days(Days::new(u64::from(duration - 1)))?,
        };

        if start > end {
            debug!(ticket = %ticket.id, %start, %end, "Skipping ticket with inverted date range");
            return None;
        }

        Some(ActiveInterval { class, start, end })
    }
}

/// Active ticket counts for one day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DayCounts {
    pub p1: u32,
    pub p2: u32,
    pub p3: u32,
}

impl DayCounts {
    pub fn total(&self) -> u32 {
        self.p1 + self.p2 + self.p3
    }

    fn from_running(running: &[i64; 3]) -> Self {
        let count = |c: i64| {
            debug_assert!(c >= 0, "running count went negative");
            u32::try_from(c).unwrap_or(0)
        };
        Self {
            p1: count(running[0]),
            p2: count(running[1]),
            p3: count(running[2]),
        }
    }
}

/// Occupancy of a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBucket {
    pub day: NaiveDate,
    pub counts: DayCounts,
    pub total: u32,
    pub over_capacity: bool,
}

impl DayBucket {
    pub fn new(day: NaiveDate, counts: DayCounts, capacity_threshold: Option<u32>) -> Self {
        let total = counts.total();
        Self {
            day,
            counts,
            total,
            over_capacity: capacity_threshold.is_some_and(|limit| total > limit),
        }
    }
}

/// Counts active tickets per day using the duration table as interval policy.
#[derive(Debug, Clone)]
pub struct OccupancyCounter {
    durations: DurationTable,
    capacity_threshold: Option<u32>,
}

impl OccupancyCounter {
    pub fn new(durations: DurationTable, capacity_threshold: Option<u32>) -> Self {
        Self {
            durations,
            capacity_threshold,
        }
    }

    pub fn capacity_threshold(&self) -> Option<u32> {
        self.capacity_threshold
    }

    pub fn compute(&self, tickets: &[Ticket]) -> Vec<DayBucket> {
        compute(tickets, &self.durations, self.capacity_threshold)
    }
}

/// Per-day occupancy, sorted by day, for tickets mapped through the duration table.
pub fn compute(
    tickets: &[Ticket],
    durations: &DurationTable,
    capacity_threshold: Option<u32>,
) -> Vec<DayBucket> {
    compute_with(tickets, &DurationPolicy::new(durations), capacity_threshold)
}

/// Per-day occupancy, sorted by day, for tickets mapped through `policy`.
///
/// Only days covered by at least one counted ticket are returned.
pub fn compute_with<P>(
    tickets: &[Ticket],
    policy: &P,
    capacity_threshold: Option<u32>,
) -> Vec<DayBucket>
where
    P: IntervalPolicy + ?Sized,
{
    let mut events: BTreeMap<NaiveDate, [i64; 3]> = BTreeMap::new();
    let mut skipped = 0usize;

    for ticket in tickets {
        let interval = match policy.interval(ticket) {
            Some(interval) if interval.start <= interval.end => interval,
            _ => {
                skipped += 1;
                continue;
            }
        };

        let slot = interval.class.index();
        events.entry(interval.start).or_default()[slot] += 1;
        // An interval ending on the last representable day never closes.
        if let Some(after) = interval.end.succ_opt() {
            events.entry(after).or_default()[slot] -= 1;
        }
    }

    debug!(
        tickets = tickets.len(),
        skipped,
        event_days = events.len(),
        "Sweeping occupancy events"
    );

    sweep(&events, capacity_threshold)
}

fn sweep(events: &BTreeMap<NaiveDate, [i64; 3]>, capacity_threshold: Option<u32>) -> Vec<DayBucket> {
    let mut buckets = Vec::new();
    let mut running = [0i64; 3];
    let mut points = events.iter().peekable();

    while let Some((&run_start, deltas)) = points.next() {
        for (count, delta) in running.iter_mut().zip(deltas) {
            *count += delta;
        }
        if running.iter().all(|&count| count == 0) {
            continue;
        }

        // Counts hold until the next event day (exclusive).
        let run_end = points.peek().map(|(&day, _)| day);
        let counts = DayCounts::from_running(&running);
        let mut day = run_start;
        loop {
            buckets.push(DayBucket::new(day, counts, capacity_threshold));
            match day.succ_opt() {
                Some(next) if Some(next) != run_end => day = next,
                _ => break,
            }
        }
    }

    buckets
}

/// The earliest day whose total exceeds the capacity threshold.
pub fn first_over_capacity(buckets: &[DayBucket]) -> Option<&DayBucket> {
    buckets.iter().find(|bucket| bucket.over_capacity)
}

/// Keep only the buckets inside the inclusive `[from, to]` window.
pub fn clip_to_window(
    buckets: Vec<DayBucket>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Vec<DayBucket> {
    buckets
        .into_iter()
        .filter(|bucket| from.map_or(true, |from| bucket.day >= from))
        .filter(|bucket| to.map_or(true, |to| bucket.day <= to))
        .collect()
}

/// Wire shape of a single day in the day-keyed report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaySummary {
    pub p1: u32,
    pub p2: u32,
    pub p3: u32,
    pub total: u32,
    #[serde(rename = "overCapacity", skip_serializing_if = "std::ops::Not::not")]
    pub over_capacity: bool,
}

impl From<&DayBucket> for DaySummary {
    fn from(bucket: &DayBucket) -> Self {
        Self {
            p1: bucket.counts.p1,
            p2: bucket.counts.p2,
            p3: bucket.counts.p3,
            total: bucket.total,
            over_capacity: bucket.over_capacity,
        }
    }
}

/// Key buckets by `YYYY-MM-DD` for the report endpoint.
pub fn to_day_map(buckets: &[DayBucket]) -> BTreeMap<String, DaySummary> {
    buckets
        .iter()
        .map(|bucket| (bucket.day.format("%Y-%m-%d").to_string(), DaySummary::from(bucket)))
        .collect()
}
