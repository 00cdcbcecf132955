//! Incident status state machine.
//!
//! ```text
//!  [open] --> [in-progress] --> [resolved]  (terminal)
//!  [open] ------------------------------> [resolved]  (terminal)
//! ```

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::{Incident, Status};
use crate::error::AppError;

/// Status assigned at creation. Not user-selectable.
pub const INITIAL_STATUS: Status = Status::Open;

pub fn is_terminal(status: Status) -> bool {
    matches!(status, Status::Resolved)
}

pub fn can_transition(from: Status, to: Status) -> bool {
    matches!(
        (from, to),
        (Status::Open, Status::InProgress)
            | (Status::InProgress, Status::Resolved)
            | (Status::Open, Status::Resolved)
    )
}

/// Targets reachable from `from`, in display order.
pub fn available_transitions(from: Status) -> Vec<Status> {
    Status::ALL
        .iter()
        .copied()
        .filter(|to| can_transition(from, *to))
        .collect()
}

/// The write produced by an accepted transition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusChange {
    pub from: Status,
    pub to: Status,
    #[serde(with = "time::serde::rfc3339::option")]
    pub end_time: Option<OffsetDateTime>,
    /// True when this change populated `end_time`.
    pub end_time_set: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Decide whether `incident` may move to `target` at instant `now`.
///
/// Entering `Resolved` fills `end_time` with `now` only if it is empty; it is never overwritten
/// or cleared.
pub fn plan_transition(
    incident: &Incident,
    target: Status,
    now: OffsetDateTime,
) -> Result<StatusChange, AppError> {
    let from = incident.status;

    if is_terminal(from) {
        return Err(AppError::new(
            "TRANSITION_FROM_TERMINAL",
            "Incident is resolved; its status can no longer change",
        )
        .with_details(format!("from={from}; to={target}")));
    }
    if !can_transition(from, target) {
        return Err(AppError::new(
            "TRANSITION_NOT_ALLOWED",
            format!("Cannot change status from {from} to {target}"),
        )
        .with_details(format!("from={from}; to={target}")));
    }

    let (end_time, end_time_set) = match (target, incident.end_time) {
        (Status::Resolved, None) => (Some(now), true),
        (_, existing) => (existing, false),
    };

    Ok(StatusChange {
        from,
        to: target,
        end_time,
        end_time_set,
        updated_at: now,
    })
}

/// Parse a requested target status from presentation input. Malformed values are
/// `VALIDATION_INVALID_STATUS`.
pub fn parse_target(raw: &str) -> Result<Status, AppError> {
    raw.parse()
}

/// Apply an accepted change to an in-memory copy.
pub fn apply(incident: &mut Incident, change: &StatusChange) {
    incident.status = change.to;
    if incident.end_time.is_none() {
        incident.end_time = change.end_time;
    }
    incident.updated_at = change.updated_at;
}
