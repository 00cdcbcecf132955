use time::format_description::well_known::Rfc3339;
use std::ops::RangeInclusive;

use time::{format_description, OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::domain::ValidationWarning;
use crate::error::AppError;

/// Outcome of normalizing a user-provided timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedTimestamp {
    /// Canonical UTC instant, if deterministically parseable.
    pub canonical_utc: Option<OffsetDateTime>,
    /// Raw input, kept when the value was not RFC3339 (or could not be parsed).
    pub raw: Option<String>,
}

/// UTC years the stored form can hold and read back.
pub const STORABLE_YEARS: RangeInclusive<i32> = 0..=9999;

/// `dt` in UTC, or `None` when the UTC instant is outside `STORABLE_YEARS`.
pub fn to_storable_utc(dt: OffsetDateTime) -> Option<OffsetDateTime> {
    dt.checked_to_offset(UtcOffset::UTC)
        .filter(|utc| STORABLE_YEARS.contains(&utc.year()))
}

/// Stored form: fixed-width UTC with millisecond precision so text ordering matches time ordering.
pub fn format_stored(dt: OffsetDateTime) -> Result<String, AppError> {
    let utc = to_storable_utc(dt).ok_or_else(|| {
        AppError::new("VALIDATION_TS_OUT_OF_RANGE", "Timestamp is outside the storable range")
            .with_details(format!("value={dt}"))
    })?;
    utc.format(time::macros::format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
        ))
        .map_err(|e| {
            AppError::new("DB_TIME_FORMAT_FAILED", "Failed to format timestamp")
                .with_details(e.to_string())
        })
}

pub fn parse_stored(raw: &str) -> Result<OffsetDateTime, time::error::Parse> {
    OffsetDateTime::parse(raw, &Rfc3339).map(|dt| dt.to_offset(UtcOffset::UTC))
}

/// Truncate to the precision the store keeps, so in-memory values equal re-read values.
pub fn truncate_to_millis(dt: OffsetDateTime) -> OffsetDateTime {
    let millis = dt.millisecond();
    dt.replace_nanosecond(u32::from(millis) * 1_000_000)
        .unwrap_or(dt)
}

fn parse_primitive_assume_utc(
    raw: &str,
    fmt: &str,
    field: &str,
    warnings: &mut Vec<ValidationWarning>,
) -> Option<OffsetDateTime> {
    let items = match format_description::parse(fmt) {
        Ok(i) => i,
        Err(e) => {
            warnings.push(
                ValidationWarning::new(
                    "INPUT_TS_FORMAT_CONFIG_FAILED",
                    format!("Timestamp format config error for {field}"),
                )
                .with_details(format!("fmt={fmt}; err={e}")),
            );
            return None;
        }
    };

    let pdt = PrimitiveDateTime::parse(raw, &items).ok()?;

    // No timezone in the input. UTC is assumed and the caller is told so.
    warnings.push(
        ValidationWarning::new(
            "INPUT_TS_TZ_ASSUMED_UTC",
            format!("Assumed UTC timezone for {field}"),
        )
        .with_details(format!("value={raw}; fmt={fmt}")),
    );

    Some(pdt.assume_utc())
}

fn parse_allowlist(
    raw: &str,
    field: &str,
    warnings: &mut Vec<ValidationWarning>,
) -> Option<OffsetDateTime> {
    // Deterministic allowlist only (no fuzzy parsing). The `T` + minutes form is what browser
    // datetime-local inputs submit.
    for fmt in [
        "[year]-[month]-[day]T[hour]:[minute]",
        "[year]-[month]-[day]T[hour]:[minute]:[second]",
        "[year]-[month]-[day] [hour]:[minute]:[second]",
        "[year]-[month]-[day] [hour]:[minute]",
    ] {
        if let Some(dt) = parse_primitive_assume_utc(raw, fmt, field, warnings) {
            return Some(dt);
        }
    }

    None
}

fn out_of_range(
    field: &str,
    trimmed: &str,
    warnings: &mut Vec<ValidationWarning>,
) -> NormalizedTimestamp {
    warnings.push(
        ValidationWarning::new(
            "INPUT_TS_UNPARSEABLE",
            format!("Timestamp for {field} is outside the supported years"),
        )
        .with_details(format!("raw={trimmed}")),
    );
    NormalizedTimestamp {
        canonical_utc: None,
        raw: Some(trimmed.to_string()),
    }
}

/// Normalize a user-provided timestamp into a canonical UTC instant.
///
/// Contract:
/// - RFC3339 input: canonical only, `raw=None`.
/// - Allowlisted zone-less input: canonical plus `raw`, with an explicit warning.
/// - Unparseable input: `raw` only, canonical `None`, with an explicit warning.
/// - Blank input: both `None`, no warning.
pub fn normalize_timestamp(
    field: &str,
    raw_input: &str,
    warnings: &mut Vec<ValidationWarning>,
) -> NormalizedTimestamp {
    let trimmed = raw_input.trim();
    if trimmed.is_empty() {
        return NormalizedTimestamp {
            canonical_utc: None,
            raw: None,
        };
    }

    if let Ok(dt) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        if let Some(utc) = to_storable_utc(dt) {
            return NormalizedTimestamp {
                canonical_utc: Some(truncate_to_millis(utc)),
                raw: None,
            };
        }
        return out_of_range(field, trimmed, warnings);
    }

    if let Some(dt) = parse_allowlist(trimmed, field, warnings) {
        if to_storable_utc(dt).is_none() {
            return out_of_range(field, trimmed, warnings);
        }
        return NormalizedTimestamp {
            canonical_utc: Some(dt),
            raw: Some(trimmed.to_string()),
        };
    }

    warnings.push(
        ValidationWarning::new(
            "INPUT_TS_UNPARSEABLE",
            format!("Unparseable timestamp for {field}"),
        )
        .with_details(format!("raw={trimmed}")),
    );

    NormalizedTimestamp {
        canonical_utc: None,
        raw: Some(trimmed.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn rfc3339_is_canonicalized_to_utc_without_warnings() {
        let mut warnings = Vec::new();
        let n = normalize_timestamp("start_time", "2026-01-01T03:00:00+03:00", &mut warnings);
        assert_eq!(n.canonical_utc, Some(datetime!(2026-01-01 00:00:00 UTC)));
        assert_eq!(n.raw, None);
        assert!(warnings.is_empty());
    }

    #[test]
    fn datetime_local_assumes_utc_and_warns() {
        let mut warnings = Vec::new();
        let n = normalize_timestamp("start_time", "2026-02-03T10:30", &mut warnings);
        assert_eq!(n.canonical_utc, Some(datetime!(2026-02-03 10:30:00 UTC)));
        assert_eq!(n.raw.as_deref(), Some("2026-02-03T10:30"));
        assert!(warnings.iter().any(|w| w.code == "INPUT_TS_TZ_ASSUMED_UTC"));
    }

    #[test]
    fn garbage_is_preserved_raw() {
        let mut warnings = Vec::new();
        let n = normalize_timestamp("end_time", "yesterday-ish", &mut warnings);
        assert_eq!(n.canonical_utc, None);
        assert_eq!(n.raw.as_deref(), Some("yesterday-ish"));
        assert_eq!(warnings[0].code, "INPUT_TS_UNPARSEABLE");
    }

    #[test]
    fn stored_format_is_fixed_width_and_reparses() {
        let dt = datetime!(2026-01-05 07:08:09.5 UTC);
        let s = format_stored(dt).unwrap();
        assert_eq!(s, "2026-01-05T07:08:09.500Z");
        assert_eq!(parse_stored(&s).unwrap(), dt);
    }

    #[test]
    fn instants_outside_storable_years_are_unparseable() {
        for raw in [
            "9999-12-31T23:30:00-01:00",
            "0000-01-01T00:00:00+01:00",
        ] {
            let mut warnings = Vec::new();
            let n = normalize_timestamp("start_time", raw, &mut warnings);
            assert_eq!(n.canonical_utc, None, "{raw}");
            assert_eq!(n.raw.as_deref(), Some(raw));
            assert_eq!(warnings[0].code, "INPUT_TS_UNPARSEABLE");
        }

        let mut warnings = Vec::new();
        let edge = normalize_timestamp("start_time", "9999-12-31T23:59:59Z", &mut warnings);
        assert!(edge.canonical_utc.is_some());
    }

    #[test]
    fn format_stored_rejects_negative_years() {
        let err = format_stored(datetime!(0000-01-01 00:00:00 +01:00)).unwrap_err();
        assert_eq!(err.code, "VALIDATION_TS_OUT_OF_RANGE");
    }
}
