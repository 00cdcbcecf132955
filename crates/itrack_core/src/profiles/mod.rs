use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::domain::{ProfileFields, UserProfile};
use crate::error::AppError;
use crate::normalize::timestamps::format_stored;
use crate::repo::{get_ts, get_uuid};

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<UserProfile> {
    Ok(UserProfile {
        id: get_uuid(row, 0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        sector: row.get(3)?,
        role: row.get(4)?,
        created_at: get_ts(row, 5)?,
        updated_at: get_ts(row, 6)?,
    })
}

pub fn get_profile(conn: &Connection, id: Uuid) -> Result<Option<UserProfile>, AppError> {
    conn.query_row(
        r#"
      SELECT id, first_name, last_name, sector, role, created_at, updated_at
      FROM profiles WHERE id = ?1
      "#,
        [id.to_string()],
        profile_from_row,
    )
    .optional()
    .map_err(|e| AppError::db("DB_QUERY_FAILED", "Failed to query profile", e))
}

pub fn validate_profile_fields(fields: &ProfileFields) -> Result<(), AppError> {
    let mut missing = Vec::new();
    if fields.first_name.trim().is_empty() {
        missing.push("first_name");
    }
    if fields.last_name.trim().is_empty() {
        missing.push("last_name");
    }
    if fields.role.trim().is_empty() {
        missing.push("role");
    }
    if missing.is_empty() {
        return Ok(());
    }
    Err(AppError::new(
        "VALIDATION_PROFILE_INVALID",
        "Profile fields are required",
    )
    .with_details(format!("missing={}", missing.join(","))))
}

/// Insert a profile for a freshly created identity.
pub fn insert_profile(
    conn: &Connection,
    id: Uuid,
    fields: &ProfileFields,
    now: time::OffsetDateTime,
) -> Result<UserProfile, AppError> {
    validate_profile_fields(fields)?;
    let ts = format_stored(now)?;
    conn.execute(
        r#"
      INSERT INTO profiles(id, first_name, last_name, sector, role, created_at, updated_at)
      VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
      "#,
        params![
            id.to_string(),
            fields.first_name.trim(),
            fields.last_name.trim(),
            fields.sector,
            fields.role.trim(),
            ts,
        ],
    )
    .map_err(|e| AppError::db("DB_WRITE_FAILED", "Failed to create profile", e))?;

    get_profile(conn, id)?.ok_or_else(|| {
        AppError::new("DB_WRITE_FAILED", "Profile missing after insert")
            .with_details(format!("id={id}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::domain::Sector;
    use time::macros::datetime;

    #[test]
    fn insert_and_read_back_trimmed_profile() {
        let mut conn = db::open_in_memory().unwrap();
        db::migrate(&mut conn).unwrap();
        let id = Uuid::new_v4();
        let fields = ProfileFields {
            first_name: " Ana ".to_string(),
            last_name: "Souza".to_string(),
            sector: Sector::SecondaryTeam,
            role: "Support analyst".to_string(),
        };
        let p = insert_profile(&conn, id, &fields, datetime!(2026-01-01 00:00:00 UTC)).unwrap();
        assert_eq!(p.first_name, "Ana");
        assert_eq!(p.display_name(), "Ana Souza");
        assert_eq!(get_profile(&conn, id).unwrap(), Some(p));
    }

    #[test]
    fn blank_fields_are_rejected() {
        let fields = ProfileFields {
            first_name: "".to_string(),
            last_name: "Souza".to_string(),
            sector: Sector::PrimaryTeam,
            role: " ".to_string(),
        };
        let err = validate_profile_fields(&fields).unwrap_err();
        assert_eq!(err.code, "VALIDATION_PROFILE_INVALID");
        assert_eq!(err.details.as_deref(), Some("missing=first_name,role"));
    }
}
