use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::audit::{self, AuditAction};
use crate::domain::{Incident, ProfileFields, Sector, Severity, Status, UserProfile};
use crate::error::AppError;
use crate::profiles::insert_profile;
use crate::repo;

const DEMO_INCIDENTS_CSV: &str = include_str!("incidents.csv");

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DemoSeedSummary {
    /// False when the store already held incidents and nothing was written.
    pub seeded: bool,
    pub profiles: usize,
    pub incidents: usize,
}

#[derive(Debug, Deserialize)]
struct DemoRow {
    company: String,
    system: String,
    description: String,
    resolution_actions: Option<String>,
    severity: Severity,
    status: Status,
    impact_count: i64,
    start_time: String,
    end_time: Option<String>,
    sector: Sector,
    created_at: String,
    updated_at: String,
}

fn demo_owner(sector: Sector) -> ProfileFields {
    match sector {
        Sector::PrimaryTeam => ProfileFields {
            first_name: "Demo".to_string(),
            last_name: "Lead".to_string(),
            sector,
            role: "Incident lead".to_string(),
        },
        Sector::SecondaryTeam => ProfileFields {
            first_name: "Demo".to_string(),
            last_name: "Support".to_string(),
            sector,
            role: "Support analyst".to_string(),
        },
    }
}

fn parse_ts(row_idx: usize, field: &str, raw: &str) -> Result<OffsetDateTime, AppError> {
    OffsetDateTime::parse(raw.trim(), &Rfc3339).map_err(|e| {
        AppError::new("DEMO_FIXTURE_INVALID", "Demo fixture has an invalid timestamp")
            .with_details(format!("row={}; field={field}; error={e}", row_idx + 1))
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_fixture(owners: &[UserProfile]) -> Result<Vec<Incident>, AppError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(DEMO_INCIDENTS_CSV.as_bytes());

    let mut out = Vec::new();
    for (row_idx, result) in rdr.deserialize::<DemoRow>().enumerate() {
        let row = result.map_err(|e| {
            AppError::new("DEMO_FIXTURE_INVALID", "Failed to read demo fixture row")
                .with_details(format!("row={}; error={e}", row_idx + 1))
        })?;
        let owner = owners
            .iter()
            .find(|p| p.sector == row.sector)
            .ok_or_else(|| {
                AppError::new("DEMO_FIXTURE_INVALID", "No demo owner for sector")
                    .with_details(format!("sector={}", row.sector))
            })?;

        let end_time = non_empty(row.end_time)
            .map(|raw| parse_ts(row_idx, "end_time", &raw))
            .transpose()?;
        out.push(Incident {
            id: Uuid::new_v4(),
            company: row.company,
            system: row.system,
            description: row.description,
            resolution_actions: non_empty(row.resolution_actions),
            severity: row.severity,
            status: row.status,
            impact_count: row.impact_count,
            start_time: parse_ts(row_idx, "start_time", &row.start_time)?,
            end_time,
            sector: row.sector,
            created_by: owner.id,
            created_at: parse_ts(row_idx, "created_at", &row.created_at)?,
            updated_at: parse_ts(row_idx, "updated_at", &row.updated_at)?,
        });
    }
    Ok(out)
}

/// Load the sample incidents into an empty store, with one owner profile per sector.
/// A store that already has incidents is left untouched.
pub fn seed_demo_dataset(
    conn: &mut Connection,
    now: OffsetDateTime,
) -> Result<DemoSeedSummary, AppError> {
    let existing = repo::count_incidents(conn)?;
    if existing > 0 {
        info!(existing, "store not empty; demo seed skipped");
        return Ok(DemoSeedSummary {
            seeded: false,
            profiles: 0,
            incidents: 0,
        });
    }

    let tx = conn
        .transaction()
        .map_err(|e| AppError::db("DB_TX_FAILED", "Failed to start demo seed transaction", e))?;

    let owners = Sector::ALL
        .iter()
        .map(|s| insert_profile(&tx, Uuid::new_v4(), &demo_owner(*s), now))
        .collect::<Result<Vec<_>, _>>()?;

    let incidents = parse_fixture(&owners)?;
    for incident in &incidents {
        repo::insert_incident(&tx, incident)?;
    }

    audit::record(
        &tx,
        AuditAction::DemoSeeded,
        None,
        None,
        &json!({ "profiles": owners.len(), "incidents": incidents.len() }),
        now,
    )?;
    tx.commit()
        .map_err(|e| AppError::db("DB_TX_FAILED", "Failed to commit demo seed", e))?;

    info!(
        profiles = owners.len(),
        incidents = incidents.len(),
        "demo dataset seeded"
    );
    Ok(DemoSeedSummary {
        seeded: true,
        profiles: owners.len(),
        incidents: incidents.len(),
    })
}
