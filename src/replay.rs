//! Replays recorded error events through a handler.
//!
//! Input is JSON Lines, one event per line:
//!
//! ```text
//! {"message": "not found", "statusCode": 404, "atMs": 0}
//! {"message": "not found", "statusCode": 404, "atMs": 800}
//! {"message": "db down", "fatal": true, "groupKey": "db", "atMs": 1200}
//! ```
//!
//! `atMs` is an offset from the start of the replay and drives a manual
//! clock, so rate-limit windows behave as they would have live. Offsets above
//! [`MAX_AT_MS`] are rejected.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ErrorOptions;
use crate::handler::{ErrorHandler, Outcome};
use crate::ratelimit::ManualClock;

/// Largest accepted `atMs`, one hundred years.
pub const MAX_AT_MS: u64 = 100 * 365 * 24 * 60 * 60 * 1000;

/// One recorded error.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayEvent {
    pub message: String,
    #[serde(default)]
    pub at_ms: u64,
    #[serde(flatten)]
    pub options: ErrorOptions,
}

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Failed to read events: {0}")]
    Io(#[from] std::io::Error),

    #[error("Line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Line {line}: atMs {at_ms} is earlier than the previous event")]
    OutOfOrder { line: usize, at_ms: u64 },

    #[error("Line {line}: atMs {at_ms} exceeds the maximum offset of {max}", max = MAX_AT_MS)]
    OffsetOutOfRange { line: usize, at_ms: u64 },
}

/// Parses JSON Lines. Blank lines and lines starting with `#` are skipped.
pub fn parse_events(input: &str) -> Result<Vec<ReplayEvent>, ReplayError> {
    let mut events = Vec::new();
    let mut last_at = 0;

    for (idx, raw) in input.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let event: ReplayEvent = serde_json::from_str(line).map_err(|source| {
            ReplayError::Parse {
                line: idx + 1,
                source,
            }
        })?;
        if event.at_ms > MAX_AT_MS {
            return Err(ReplayError::OffsetOutOfRange {
                line: idx + 1,
                at_ms: event.at_ms,
            });
        }
        if event.at_ms < last_at {
            return Err(ReplayError::OutOfOrder {
                line: idx + 1,
                at_ms: event.at_ms,
            });
        }
        last_at = event.at_ms;
        events.push(event);
    }

    Ok(events)
}

pub fn read_events<P: AsRef<Path>>(path: P) -> Result<Vec<ReplayEvent>, ReplayError> {
    let input = std::fs::read_to_string(path)?;
    parse_events(&input)
}

/// Tallies of what a replay produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub events: usize,
    /// Outcome label to number of events that ended that way.
    pub outcomes: BTreeMap<String, usize>,
}

impl ReplaySummary {
    pub fn count(&self, label: &str) -> usize {
        self.outcomes.get(label).copied().unwrap_or(0)
    }
}

/// Short stable label for an outcome.
pub fn outcome_label(outcome: &Outcome) -> &'static str {
    match outcome {
        Outcome::AlreadyHandled => "already_handled",
        Outcome::Nested => "nested",
        Outcome::Silent => "silent",
        Outcome::Reported { toast_shown: true } => "toast",
        Outcome::Reported { toast_shown: false } => "toast_suppressed",
        Outcome::Navigated(_) => "navigated",
        Outcome::AlreadyOnErrorRoute => "already_on_error_route",
    }
}

/// Feeds `events` through `handler`, moving `clock` to each event's offset
/// from `start`. Offsets past the representable range pin the clock to the
/// latest representable instant.
pub async fn run(
    handler: &ErrorHandler,
    clock: &ManualClock,
    start: DateTime<Utc>,
    events: Vec<ReplayEvent>,
) -> ReplaySummary {
    let mut summary = ReplaySummary::default();

    for event in events {
        clock.set(offset_from(start, event.at_ms));

        let error = handler.create_error(event.message, event.options.clone());
        let label = match handler.handle_error(error, event.options).await {
            Ok(handled) => outcome_label(&handled.outcome),
            Err(err) => {
                tracing::info!(group_key = %err.group_key, "fatal error handed back");
                "rethrown"
            }
        };

        summary.events += 1;
        *summary.outcomes.entry(label.to_string()).or_insert(0) += 1;
    }

    summary
}

fn offset_from(start: DateTime<Utc>, at_ms: u64) -> DateTime<Utc> {
    i64::try_from(at_ms)
        .ok()
        .and_then(Duration::try_milliseconds)
        .and_then(|offset| start.checked_add_signed(offset))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
