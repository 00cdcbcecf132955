use crate::domain::{Incident, ValidationWarning};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct IncidentMetrics {
    /// Seconds between start and end, when the incident has ended.
    pub duration_seconds: Option<i64>,
    /// "In progress" for incidents without an end time.
    pub duration_label: String,
}

fn plural(n: i64, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

/// Human-readable duration truncated to whole minutes.
pub fn format_duration(seconds: i64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    if hours == 0 {
        plural(minutes, "minute", "minutes")
    } else if minutes == 0 {
        plural(hours, "hour", "hours")
    } else {
        format!(
            "{} and {}",
            plural(hours, "hour", "hours"),
            plural(minutes, "minute", "minutes")
        )
    }
}

/// Compute per-incident metrics.
///
/// A negative duration (end before start) produces a warning and no metric, never a silent
/// correction.
pub fn compute_incident_metrics(incident: &Incident) -> (IncidentMetrics, Vec<ValidationWarning>) {
    let mut warnings = Vec::new();

    let duration_seconds = match incident.end_time {
        None => None,
        Some(end) => {
            let secs = (end - incident.start_time).whole_seconds();
            if secs < 0 {
                warnings.push(
                    ValidationWarning::new(
                        "METRICS_TS_ORDER_VIOLATION",
                        "Cannot compute duration: start_time must be <= end_time",
                    )
                    .with_details(format!(
                        "start_time={}; end_time={end}",
                        incident.start_time
                    )),
                );
                None
            } else {
                Some(secs)
            }
        }
    };

    let duration_label = match (incident.end_time, duration_seconds) {
        (None, _) => "In progress".to_string(),
        (Some(_), Some(s)) => format_duration(s),
        (Some(_), None) => "Unknown".to_string(),
    };

    (
        IncidentMetrics {
            duration_seconds,
            duration_label,
        },
        warnings,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_read_naturally() {
        assert_eq!(format_duration(0), "0 minutes");
        assert_eq!(format_duration(60), "1 minute");
        assert_eq!(format_duration(3600), "1 hour");
        assert_eq!(format_duration(2 * 3600 + 5 * 60 + 59), "2 hours and 5 minutes");
        assert_eq!(format_duration(3600 + 60), "1 hour and 1 minute");
    }
}
