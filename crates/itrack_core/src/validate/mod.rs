use time::OffsetDateTime;

use crate::domain::{Incident, NewIncidentInput, Sector, Severity, Status, ValidationWarning};
use crate::error::AppError;
use crate::normalize::timestamps::normalize_timestamp;

/// Creation input after validation: typed, trimmed, timestamps canonical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedIncident {
    pub company: String,
    pub system: String,
    pub description: String,
    pub resolution_actions: Option<String>,
    pub severity: Severity,
    pub impact_count: i64,
    pub start_time: OffsetDateTime,
    pub end_time: Option<OffsetDateTime>,
    pub requested_sector: Option<Sector>,
    /// Non-blocking notes (e.g. assumed timezone) for the caller to surface.
    pub warnings: Vec<ValidationWarning>,
}

fn required_text(field: &str, value: &str, problems: &mut Vec<String>) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        problems.push(format!("{field} is required"));
    }
    trimmed.to_string()
}

fn optional_text(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Validate a creation form. Every problem is collected so the form can show them together;
/// any problem rejects the submission with `VALIDATION_FAILED`.
pub fn validate_new_incident(input: &NewIncidentInput) -> Result<ValidatedIncident, AppError> {
    let mut problems = Vec::new();
    let mut warnings = Vec::new();

    let company = required_text("company", &input.company, &mut problems);
    let system = required_text("system", &input.system, &mut problems);
    let description = required_text("description", &input.description, &mut problems);

    let severity = match input.severity.parse::<Severity>() {
        Ok(s) => Some(s),
        Err(_) => {
            problems.push(format!("severity '{}' is not recognised", input.severity.trim()));
            None
        }
    };

    if input.impact_count < 0 {
        problems.push(format!(
            "impact_count must be >= 0 (got {})",
            input.impact_count
        ));
    }

    let start = normalize_timestamp("start_time", &input.start_time, &mut warnings);
    if start.canonical_utc.is_none() {
        if start.raw.is_some() {
            problems.push("start_time could not be parsed".to_string());
        } else {
            problems.push("start_time is required".to_string());
        }
    }

    let end = input
        .end_time
        .as_deref()
        .map(|raw| normalize_timestamp("end_time", raw, &mut warnings));
    let end_time = match &end {
        Some(n) if n.canonical_utc.is_none() && n.raw.is_some() => {
            problems.push("end_time could not be parsed".to_string());
            None
        }
        Some(n) => n.canonical_utc,
        None => None,
    };

    if let (Some(s), Some(e)) = (start.canonical_utc, end_time) {
        if e < s {
            problems.push("end_time must not be before start_time".to_string());
        }
    }

    // Parse failures are already reported as problems; keep only the informational warnings.
    warnings.retain(|w| w.code != "INPUT_TS_UNPARSEABLE");

    match (severity, start.canonical_utc) {
        (Some(severity), Some(start_time)) if problems.is_empty() => Ok(ValidatedIncident {
            company,
            system,
            description,
            resolution_actions: optional_text(&input.resolution_actions),
            severity,
            impact_count: input.impact_count,
            start_time,
            end_time,
            requested_sector: input.sector,
            warnings,
        }),
        _ => Err(AppError::validation("Incident form has invalid fields")
            .with_details(problems.join("; "))),
    }
}

/// Data-quality checks on a stored incident. Warnings only; nothing is corrected.
pub fn validate_incident(incident: &Incident) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if incident.status == Status::Resolved && incident.end_time.is_none() {
        warnings.push(ValidationWarning::new(
            "VALIDATION_RESOLVED_WITHOUT_END",
            "Resolved incident has no end_time",
        ));
    }

    if let Some(end) = incident.end_time {
        if end < incident.start_time {
            warnings.push(
                ValidationWarning::new(
                    "VALIDATION_TS_ORDER_VIOLATION",
                    "Timestamp order violation: start_time must be <= end_time",
                )
                .with_details(format!(
                    "start_time={}; end_time={end}",
                    incident.start_time
                )),
            );
        }
    }

    if incident.impact_count < 0 {
        warnings.push(
            ValidationWarning::new("VALIDATION_IMPACT_NEGATIVE", "impact_count is negative")
                .with_details(format!("value={}", incident.impact_count)),
        );
    }

    warnings
}
