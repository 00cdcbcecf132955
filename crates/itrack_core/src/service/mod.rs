use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::access::{resolve_creation_sector, AccessScope};
use crate::analytics::{build_dashboard_payload, DashboardPayload};
use crate::audit::{self, AuditAction};
use crate::domain::{
    Incident, NewIncidentInput, Severity, Status, UserProfile, ValidationWarning,
};
use crate::error::AppError;
use crate::lifecycle::{self, INITIAL_STATUS};
use crate::metrics::{compute_incident_metrics, IncidentMetrics};
use crate::profiles::get_profile;
use crate::repo::{self, IncidentPatch, IncidentQuery};
use crate::search::filter_incidents;
use crate::validate::{validate_incident, validate_new_incident};

/// Listing request. Severity, status and limit go to the store; `search` runs over the fetched
/// page.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IncidentListQuery {
    pub severity: Option<Severity>,
    pub status: Option<Status>,
    pub search: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IncidentDetail {
    pub incident: Incident,
    pub creator_name: Option<String>,
    pub metrics: IncidentMetrics,
    pub warnings: Vec<ValidationWarning>,
    pub available_transitions: Vec<Status>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreatedIncident {
    pub incident: Incident,
    pub warnings: Vec<ValidationWarning>,
}

pub fn list_incidents(
    conn: &Connection,
    actor: &UserProfile,
    query: &IncidentListQuery,
) -> Result<Vec<Incident>, AppError> {
    let scope = AccessScope::for_profile(actor);
    let page = repo::query_incidents(
        conn,
        &IncidentQuery {
            sector: scope.sector_filter(),
            severity: query.severity,
            status: query.status,
            limit: query.limit,
        },
    )?;
    Ok(match query.search.as_deref() {
        Some(term) => filter_incidents(&page, term),
        None => page,
    })
}

fn load_in_scope(conn: &Connection, scope: &AccessScope, id: Uuid) -> Result<Incident, AppError> {
    let incident = repo::require_incident(conn, id)?;
    if let Err(e) = scope.ensure_can_act_on(&incident) {
        warn!(incident_id = %id, scope = ?scope, "access to incident rejected");
        return Err(e);
    }
    Ok(incident)
}

pub fn get_incident_detail(
    conn: &Connection,
    actor: &UserProfile,
    id: Uuid,
) -> Result<IncidentDetail, AppError> {
    let scope = AccessScope::for_profile(actor);
    let incident = load_in_scope(conn, &scope, id)?;

    let creator_name = get_profile(conn, incident.created_by)?.map(|p| p.display_name());
    let (metrics, metric_warnings) = compute_incident_metrics(&incident);

    let mut warnings = validate_incident(&incident);
    // The order violation is already reported by the quality checks.
    warnings.extend(
        metric_warnings
            .into_iter()
            .filter(|w| w.code != "METRICS_TS_ORDER_VIOLATION"),
    );

    Ok(IncidentDetail {
        available_transitions: lifecycle::available_transitions(incident.status),
        incident,
        creator_name,
        metrics,
        warnings,
    })
}

pub fn create_incident(
    conn: &mut Connection,
    actor: &UserProfile,
    input: &NewIncidentInput,
    now: OffsetDateTime,
) -> Result<CreatedIncident, AppError> {
    let valid = validate_new_incident(input)?;
    let sector = resolve_creation_sector(actor, valid.requested_sector)?;

    let incident = Incident {
        id: Uuid::new_v4(),
        company: valid.company,
        system: valid.system,
        description: valid.description,
        resolution_actions: valid.resolution_actions,
        severity: valid.severity,
        status: INITIAL_STATUS,
        impact_count: valid.impact_count,
        start_time: valid.start_time,
        end_time: valid.end_time,
        sector,
        created_by: actor.id,
        created_at: now,
        updated_at: now,
    };

    let tx = conn
        .transaction()
        .map_err(|e| AppError::db("DB_TX_FAILED", "Failed to start create transaction", e))?;
    repo::insert_incident(&tx, &incident)?;
    audit::record(
        &tx,
        AuditAction::IncidentCreated,
        Some(incident.id),
        Some(actor.id),
        &json!({
            "severity": incident.severity,
            "sector": incident.sector,
            "impact_count": incident.impact_count,
        }),
        now,
    )?;
    let stored = repo::require_incident(&tx, incident.id)?;
    tx.commit()
        .map_err(|e| AppError::db("DB_TX_FAILED", "Failed to commit create transaction", e))?;

    info!(
        incident_id = %stored.id,
        severity = %stored.severity,
        sector = %stored.sector,
        "incident created"
    );
    Ok(CreatedIncident {
        incident: stored,
        warnings: valid.warnings,
    })
}

/// Move an incident to `target_raw`. Checks run in order: target parses, incident exists,
/// caller may act on it, transition is legal.
pub fn set_incident_status(
    conn: &mut Connection,
    actor: &UserProfile,
    id: Uuid,
    target_raw: &str,
    now: OffsetDateTime,
) -> Result<Incident, AppError> {
    let target = lifecycle::parse_target(target_raw)?;
    let scope = AccessScope::for_profile(actor);

    let tx = conn
        .transaction()
        .map_err(|e| AppError::db("DB_TX_FAILED", "Failed to start status transaction", e))?;
    let incident = load_in_scope(&tx, &scope, id)?;

    let change = match lifecycle::plan_transition(&incident, target, now) {
        Ok(c) => c,
        Err(e) => {
            warn!(incident_id = %id, from = %incident.status, to = %target, code = %e.code, "status change rejected");
            return Err(e);
        }
    };

    let updated = repo::update_incident(
        &tx,
        id,
        &IncidentPatch {
            status: Some(change.to),
            end_time: change.end_time.filter(|_| change.end_time_set),
            updated_at: change.updated_at,
        },
    )?;
    audit::record(
        &tx,
        AuditAction::StatusChanged,
        Some(id),
        Some(actor.id),
        &json!({
            "from": change.from,
            "to": change.to,
            "end_time_set": change.end_time_set,
        }),
        now,
    )?;
    tx.commit()
        .map_err(|e| AppError::db("DB_TX_FAILED", "Failed to commit status transaction", e))?;

    info!(incident_id = %id, from = %change.from, to = %change.to, "incident status changed");
    Ok(updated)
}

pub fn dashboard(
    conn: &Connection,
    actor: &UserProfile,
    recent_limit: usize,
) -> Result<DashboardPayload, AppError> {
    let scope = AccessScope::for_profile(actor);
    let incidents = repo::query_incidents(
        conn,
        &IncidentQuery {
            sector: scope.sector_filter(),
            ..IncidentQuery::default()
        },
    )?;
    Ok(build_dashboard_payload(&incidents, recent_limit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::domain::{ProfileFields, Sector};
    use crate::profiles::insert_profile;
    use time::macros::datetime;

    fn setup() -> (Connection, UserProfile, UserProfile) {
        let mut conn = db::open_in_memory().unwrap();
        db::migrate(&mut conn).unwrap();
        let now = datetime!(2026-02-01 09:00:00 UTC);
        let lead = insert_profile(
            &conn,
            Uuid::new_v4(),
            &ProfileFields {
                first_name: "Lia".to_string(),
                last_name: "Costa".to_string(),
                sector: Sector::PrimaryTeam,
                role: "Incident lead".to_string(),
            },
            now,
        )
        .unwrap();
        let agent = insert_profile(
            &conn,
            Uuid::new_v4(),
            &ProfileFields {
                first_name: "Rui".to_string(),
                last_name: "Alves".to_string(),
                sector: Sector::SecondaryTeam,
                role: "Support".to_string(),
            },
            now,
        )
        .unwrap();
        (conn, lead, agent)
    }

    fn input(company: &str, severity: &str) -> NewIncidentInput {
        NewIncidentInput {
            company: company.to_string(),
            system: "ERP".to_string(),
            description: "Login failures".to_string(),
            severity: severity.to_string(),
            impact_count: 10,
            start_time: "2026-02-01T08:00:00Z".to_string(),
            ..NewIncidentInput::default()
        }
    }

    #[test]
    fn create_defaults_sector_and_writes_audit_row() {
        let (mut conn, _lead, agent) = setup();
        let created = create_incident(
            &mut conn,
            &agent,
            &input("Acme Corp", "high"),
            datetime!(2026-02-01 09:30:00 UTC),
        )
        .unwrap();
        assert_eq!(created.incident.status, Status::Open);
        assert_eq!(created.incident.sector, Sector::SecondaryTeam);
        assert_eq!(created.incident.created_by, agent.id);

        let n: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM audit_logs WHERE action = 'incident_created' AND incident_id = ?1",
                [created.incident.id.to_string()],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn secondary_user_cannot_touch_other_sector() {
        let (mut conn, lead, agent) = setup();
        let created = create_incident(
            &mut conn,
            &lead,
            &input("Global Logistics", "low"),
            datetime!(2026-02-01 09:30:00 UTC),
        )
        .unwrap();
        let id = created.incident.id;

        assert_eq!(
            get_incident_detail(&conn, &agent, id).unwrap_err().code,
            "FORBIDDEN_SECTOR"
        );
        assert_eq!(
            set_incident_status(&mut conn, &agent, id, "resolved", datetime!(2026-02-01 10:00:00 UTC))
                .unwrap_err()
                .code,
            "FORBIDDEN_SECTOR"
        );
        assert!(list_incidents(&conn, &agent, &IncidentListQuery::default())
            .unwrap()
            .is_empty());
        assert_eq!(
            get_incident_detail(&conn, &agent, Uuid::new_v4())
                .unwrap_err()
                .code,
            "NOT_FOUND_INCIDENT"
        );
    }

    #[test]
    fn detail_reports_duration_and_remaining_transitions() {
        let (mut conn, lead, _agent) = setup();
        let created = create_incident(
            &mut conn,
            &lead,
            &input("Acme Corp", "critical"),
            datetime!(2026-02-01 09:30:00 UTC),
        )
        .unwrap();
        let id = created.incident.id;

        let detail = get_incident_detail(&conn, &lead, id).unwrap();
        assert_eq!(detail.creator_name.as_deref(), Some("Lia Costa"));
        assert_eq!(detail.metrics.duration_label, "In progress");
        assert_eq!(
            detail.available_transitions,
            vec![Status::InProgress, Status::Resolved]
        );

        set_incident_status(&mut conn, &lead, id, "resolved", datetime!(2026-02-01 10:05:00 UTC))
            .unwrap();
        let detail = get_incident_detail(&conn, &lead, id).unwrap();
        assert_eq!(detail.metrics.duration_label, "2 hours and 5 minutes");
        assert!(detail.available_transitions.is_empty());
        assert!(detail.warnings.is_empty());
    }
}
