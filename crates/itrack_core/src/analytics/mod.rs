use serde::{Deserialize, Serialize};
// Every number here is a pure reduction over an already scope-filtered slice.

use crate::domain::{Incident, Severity, Status};
use crate::metrics::compute_incident_metrics;

pub const DASHBOARD_PAYLOAD_VERSION: u32 = 1;
pub const DEFAULT_RECENT_LIMIT: usize = 3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct IncidentAggregates {
    pub active_count: i64,
    pub critical_count: i64,
    pub total_impacted: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeverityCount {
    pub severity: Severity,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusCount {
    pub status: Status,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DashboardPayload {
    pub version: u32,
    pub incident_count: i64,
    pub aggregates: IncidentAggregates,
    pub severity_counts: Vec<SeverityCount>,
    pub status_counts: Vec<StatusCount>,
    pub avg_resolution_seconds: Option<i64>,
    pub recent: Vec<Incident>,
}

/// Order-independent counters for the dashboard cards.
pub fn aggregate(incidents: &[Incident]) -> IncidentAggregates {
    incidents
        .iter()
        .fold(IncidentAggregates::default(), |mut acc, inc| {
            if inc.is_active() {
                acc.active_count += 1;
            }
            if inc.severity == Severity::Critical {
                acc.critical_count += 1;
            }
            acc.total_impacted = acc.total_impacted.saturating_add(inc.impact_count);
            acc
        })
}

pub fn severity_counts(incidents: &[Incident]) -> Vec<SeverityCount> {
    Severity::ALL
        .iter()
        .map(|s| SeverityCount {
            severity: *s,
            count: incidents.iter().filter(|i| i.severity == *s).count() as i64,
        })
        .collect()
}

pub fn status_counts(incidents: &[Incident]) -> Vec<StatusCount> {
    Status::ALL
        .iter()
        .map(|s| StatusCount {
            status: *s,
            count: incidents.iter().filter(|i| i.status == *s).count() as i64,
        })
        .collect()
}

/// Mean start-to-end duration over resolved incidents with a usable duration.
pub fn average_resolution_seconds(incidents: &[Incident]) -> Option<i64> {
    let durations = incidents
        .iter()
        .filter(|i| i.status == Status::Resolved)
        .filter_map(|i| compute_incident_metrics(i).0.duration_seconds)
        .collect::<Vec<_>>();
    if durations.is_empty() {
        return None;
    }
    let sum: i128 = durations.iter().map(|d| *d as i128).sum();
    Some((sum / durations.len() as i128) as i64)
}

/// Most recently created first; ties broken by id for determinism.
pub fn recent_incidents(incidents: &[Incident], limit: usize) -> Vec<Incident> {
    let mut sorted = incidents.to_vec();
    sorted.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    sorted.truncate(limit);
    sorted
}

pub fn build_dashboard_payload(incidents: &[Incident], recent_limit: usize) -> DashboardPayload {
    DashboardPayload {
        version: DASHBOARD_PAYLOAD_VERSION,
        incident_count: incidents.len() as i64,
        aggregates: aggregate(incidents),
        severity_counts: severity_counts(incidents),
        status_counts: status_counts(incidents),
        avg_resolution_seconds: average_resolution_seconds(incidents),
        recent: recent_incidents(incidents, recent_limit),
    }
}
