use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AppError;

macro_rules! text_enum {
    ($name:ident, $what:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($text => Ok($name::$variant),)+
                    other => Err(AppError::new(
                        concat!("VALIDATION_INVALID_", $what),
                        concat!("Unknown ", $what, " value"),
                    )
                    .with_details(format!("value={other}"))),
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let s = value.as_str()?;
                s.parse().map_err(|e: AppError| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

text_enum!(Severity, "SEVERITY", {
    Critical => "critical",
    High => "high",
    Medium => "medium",
    Low => "low",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Open,
    InProgress,
    Resolved,
}

text_enum!(Status, "STATUS", {
    Open => "open",
    InProgress => "in-progress",
    Resolved => "resolved",
});

/// Organizational team owning an incident. `PrimaryTeam` is the privileged, cross-sector team.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum Sector {
    PrimaryTeam,
    SecondaryTeam,
}

text_enum!(Sector, "SECTOR", {
    PrimaryTeam => "primary-team",
    SecondaryTeam => "secondary-team",
});

impl Sector {
    pub fn is_privileged(self) -> bool {
        matches!(self, Sector::PrimaryTeam)
    }
}

/// Persisted incident record.
///
/// Timestamps are UTC and serialize as RFC3339. `end_time` is never cleared once set, and is
/// always present when `status` is `Resolved`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Incident {
    pub id: Uuid,
    pub company: String,
    pub system: String,
    pub description: String,
    pub resolution_actions: Option<String>,
    pub severity: Severity,
    pub status: Status,
    pub impact_count: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub end_time: Option<OffsetDateTime>,
    pub sector: Sector,
    pub created_by: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Incident {
    pub fn is_active(&self) -> bool {
        self.status != Status::Resolved
    }
}

/// Raw creation input as submitted by a form. Text fields are validated and normalized by
/// `validate::validate_new_incident` before anything is written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct NewIncidentInput {
    pub company: String,
    pub system: String,
    pub description: String,
    pub resolution_actions: Option<String>,
    pub severity: String,
    pub impact_count: i64,
    pub start_time: String,
    pub end_time: Option<String>,
    /// Only honored for privileged-sector creators.
    pub sector: Option<Sector>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub sector: Sector,
    pub role: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl UserProfile {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Profile fields supplied at sign-up.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileFields {
    pub first_name: String,
    pub last_name: String,
    pub sector: Sector,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationWarning {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

impl ValidationWarning {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_round_trip_through_text() {
        for s in Severity::ALL {
            assert_eq!(s.as_str().parse::<Severity>().unwrap(), *s);
        }
        for s in Status::ALL {
            assert_eq!(s.as_str().parse::<Status>().unwrap(), *s);
        }
        assert_eq!(
            "in-progress".parse::<Status>().unwrap(),
            Status::InProgress
        );
        assert_eq!(
            serde_json::to_string(&Sector::SecondaryTeam).unwrap(),
            "\"secondary-team\""
        );
    }

    #[test]
    fn unknown_values_are_validation_errors() {
        let err = "closed".parse::<Status>().unwrap_err();
        assert_eq!(err.code, "VALIDATION_INVALID_STATUS");
        assert_eq!(err.details.as_deref(), Some("value=closed"));
        assert!("urgent".parse::<Severity>().is_err());
    }

    #[test]
    fn only_primary_team_is_privileged() {
        assert!(Sector::PrimaryTeam.is_privileged());
        assert!(!Sector::SecondaryTeam.is_privileged());
    }
}
