use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{Incident, Sector, Severity, Status};
use crate::error::AppError;
use crate::normalize::timestamps::{format_stored, parse_stored};

const INCIDENT_COLUMNS: &str = r#"
        id, company, system, description, resolution_actions,
        severity, status, impact_count,
        start_time, end_time, sector, created_by, created_at, updated_at
"#;

/// Store-side filter. `sector` carries the access scope and is always bound in SQL.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IncidentQuery {
    pub sector: Option<Sector>,
    pub severity: Option<Severity>,
    pub status: Option<Status>,
    pub limit: Option<u32>,
}

/// Partial update. `end_time` can only fill an empty column; the store never clears it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncidentPatch {
    pub status: Option<Status>,
    pub end_time: Option<OffsetDateTime>,
    pub updated_at: OffsetDateTime,
}

fn text_err(idx: usize, e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

pub(crate) fn get_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<OffsetDateTime> {
    let raw: String = row.get(idx)?;
    parse_stored(&raw).map_err(|e| text_err(idx, e))
}

fn get_opt_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<OffsetDateTime>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| parse_stored(&s).map_err(|e| text_err(idx, e)))
        .transpose()
}

pub(crate) fn get_uuid(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| text_err(idx, e))
}

fn incident_from_row(row: &Row<'_>) -> rusqlite::Result<Incident> {
    Ok(Incident {
        id: get_uuid(row, 0)?,
        company: row.get(1)?,
        system: row.get(2)?,
        description: row.get(3)?,
        resolution_actions: row.get(4)?,
        severity: row.get(5)?,
        status: row.get(6)?,
        impact_count: row.get(7)?,
        start_time: get_ts(row, 8)?,
        end_time: get_opt_ts(row, 9)?,
        sector: row.get(10)?,
        created_by: get_uuid(row, 11)?,
        created_at: get_ts(row, 12)?,
        updated_at: get_ts(row, 13)?,
    })
}

/// Filtered listing, newest first (ties by id).
pub fn query_incidents(conn: &Connection, query: &IncidentQuery) -> Result<Vec<Incident>, AppError> {
    let sql = format!(
        r#"
      SELECT {INCIDENT_COLUMNS}
      FROM incidents
      WHERE (?1 IS NULL OR sector = ?1)
        AND (?2 IS NULL OR severity = ?2)
        AND (?3 IS NULL OR status = ?3)
      ORDER BY created_at DESC, id ASC
      LIMIT ?4
      "#
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| AppError::db("DB_QUERY_FAILED", "Failed to prepare incidents query", e))?;

    // SQLite treats a negative LIMIT as "no limit".
    let limit = query.limit.map(i64::from).unwrap_or(-1);
    let rows = stmt
        .query_map(
            params![query.sector, query.severity, query.status, limit],
            incident_from_row,
        )
        .map_err(|e| AppError::db("DB_QUERY_FAILED", "Failed to query incidents", e))?;

    let mut out = Vec::new();
    for r in rows {
        out.push(
            r.map_err(|e| AppError::db("DB_QUERY_FAILED", "Failed to decode incident row", e))?,
        );
    }

    debug!(
        sector = ?query.sector,
        severity = ?query.severity,
        status = ?query.status,
        rows = out.len(),
        "queried incidents"
    );
    Ok(out)
}

pub fn count_incidents(conn: &Connection) -> Result<i64, AppError> {
    conn.query_row("SELECT COUNT(*) FROM incidents", [], |row| row.get(0))
        .map_err(|e| AppError::db("DB_QUERY_FAILED", "Failed to count incidents", e))
}

/// Unscoped lookup. Callers apply the access policy to the returned row.
pub fn get_incident(conn: &Connection, id: Uuid) -> Result<Option<Incident>, AppError> {
    let sql = format!("SELECT {INCIDENT_COLUMNS} FROM incidents WHERE id = ?1");
    conn.query_row(&sql, [id.to_string()], incident_from_row)
        .optional()
        .map_err(|e| AppError::db("DB_QUERY_FAILED", "Failed to query incident", e))
}

pub fn require_incident(conn: &Connection, id: Uuid) -> Result<Incident, AppError> {
    get_incident(conn, id)?.ok_or_else(|| {
        AppError::new("NOT_FOUND_INCIDENT", "Incident not found").with_details(format!("id={id}"))
    })
}

pub fn insert_incident(conn: &Connection, incident: &Incident) -> Result<(), AppError> {
    let end_time = incident.end_time.map(format_stored).transpose()?;
    conn.execute(
        r#"
      INSERT INTO incidents(
        id, company, system, description, resolution_actions,
        severity, status, impact_count,
        start_time, end_time, sector, created_by, created_at, updated_at
      ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
      "#,
        params![
            incident.id.to_string(),
            incident.company,
            incident.system,
            incident.description,
            incident.resolution_actions,
            incident.severity,
            incident.status,
            incident.impact_count,
            format_stored(incident.start_time)?,
            end_time,
            incident.sector,
            incident.created_by.to_string(),
            format_stored(incident.created_at)?,
            format_stored(incident.updated_at)?,
        ],
    )
    .map_err(|e| AppError::db("DB_WRITE_FAILED", "Failed to insert incident", e))?;
    Ok(())
}

/// Apply a partial update and return the stored row. Last write wins.
pub fn update_incident(
    conn: &Connection,
    id: Uuid,
    patch: &IncidentPatch,
) -> Result<Incident, AppError> {
    let end_time = patch.end_time.map(format_stored).transpose()?;
    let changed = conn
        .execute(
            r#"
      UPDATE incidents SET
        status = COALESCE(?2, status),
        end_time = COALESCE(end_time, ?3),
        updated_at = ?4
      WHERE id = ?1
      "#,
            params![
                id.to_string(),
                patch.status,
                end_time,
                format_stored(patch.updated_at)?,
            ],
        )
        .map_err(|e| AppError::db("DB_WRITE_FAILED", "Failed to update incident", e))?;

    if changed == 0 {
        return Err(AppError::new("NOT_FOUND_INCIDENT", "Incident not found")
            .with_details(format!("id={id}")));
    }
    require_incident(conn, id)
}
