use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;
use crate::normalize::timestamps::format_stored;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    IncidentCreated,
    StatusChanged,
    DemoSeeded,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::IncidentCreated => "incident_created",
            AuditAction::StatusChanged => "status_changed",
            AuditAction::DemoSeeded => "demo_seeded",
        }
    }
}

/// Append one audit row. Callers pass their open transaction so the row commits (or rolls
/// back) with the mutation it describes.
pub fn record(
    conn: &Connection,
    action: AuditAction,
    incident_id: Option<Uuid>,
    user_id: Option<Uuid>,
    details: &serde_json::Value,
    now: OffsetDateTime,
) -> Result<Uuid, AppError> {
    let id = Uuid::new_v4();
    let details = serde_json::to_string(details).map_err(|e| {
        AppError::new("AUDIT_SERIALIZE_FAILED", "Failed to serialize audit details")
            .with_details(e.to_string())
    })?;
    conn.execute(
        r#"
      INSERT INTO audit_logs(id, action, incident_id, user_id, details, created_at)
      VALUES (?1, ?2, ?3, ?4, ?5, ?6)
      "#,
        params![
            id.to_string(),
            action.as_str(),
            incident_id.map(|u| u.to_string()),
            user_id.map(|u| u.to_string()),
            details,
            format_stored(now)?,
        ],
    )
    .map_err(|e| AppError::db("DB_WRITE_FAILED", "Failed to write audit log", e))?;

    debug!(action = action.as_str(), incident_id = ?incident_id, "audit row written");
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn record_stores_action_and_json_details() {
        let mut conn = db::open_in_memory().unwrap();
        db::migrate(&mut conn).unwrap();
        let user = Uuid::new_v4();
        record(
            &conn,
            AuditAction::DemoSeeded,
            None,
            Some(user),
            &json!({"incidents": 4}),
            datetime!(2026-01-01 00:00:00 UTC),
        )
        .unwrap();

        let (action, user_id, details): (String, String, String) = conn
            .query_row(
                "SELECT action, user_id, details FROM audit_logs",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!(action, "demo_seeded");
        assert_eq!(user_id, user.to_string());
        assert_eq!(details, r#"{"incidents":4}"#);
    }
}
