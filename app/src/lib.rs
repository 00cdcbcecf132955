use std::fs;
use std::path::Path;

use itrack_core::access::{check_route, RouteDecision};
use itrack_core::analytics::DashboardPayload;
use itrack_core::auth::{LocalIdentityProvider, Session};
use itrack_core::badge::BadgeTable;
use itrack_core::demo::{seed_demo_dataset as core_seed_demo_dataset, DemoSeedSummary};
use itrack_core::domain::{Incident, NewIncidentInput, ProfileFields, Sector};
use itrack_core::error::AppError;
use itrack_core::service::{self, CreatedIncident, IncidentDetail, IncidentListQuery};
use itrack_core::session::SessionContext;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

pub mod config;
pub mod telemetry;

use config::AppConfig;

/// Process-wide state shared by every command.
pub struct AppState {
    pub config: AppConfig,
    pub session: SessionContext,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            session: SessionContext::new(),
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct InitDbResponse {
    pub db_path: String,
    pub demo: Option<DemoSeedSummary>,
}

#[derive(Debug, serde::Serialize)]
pub struct SignOutResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub sector: Sector,
    pub role: String,
}

fn open_and_migrate(db_path: &Path) -> Result<rusqlite::Connection, AppError> {
    if let Some(dir) = db_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| {
            AppError::new("DB_PATH_FAILED", "Failed to create database directory")
                .with_details(e.to_string())
        })?;
    }
    let mut conn = itrack_core::db::open(db_path)?;
    itrack_core::db::migrate(&mut conn)?;
    Ok(conn)
}

fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|e| {
        AppError::new("VALIDATION_INVALID_ID", "Incident id is not valid")
            .with_details(format!("value={raw}; error={e}"))
    })
}

/// Load config, install logging and prepare the store.
pub fn bootstrap() -> Result<AppState, AppError> {
    let config = AppConfig::load()?;
    telemetry::init_tracing(&config);
    let state = AppState::new(config);
    init_db(&state)?;
    Ok(state)
}

pub fn init_db(state: &AppState) -> Result<InitDbResponse, AppError> {
    let mut conn = open_and_migrate(&state.config.db_path)?;
    let demo = if state.config.seed_demo {
        Some(core_seed_demo_dataset(&mut conn, now())?)
    } else {
        None
    };
    info!(db_path = %state.config.db_path.display(), "database ready");
    Ok(InitDbResponse {
        db_path: state.config.db_path.to_string_lossy().to_string(),
        demo,
    })
}

pub fn auth_sign_up(state: &AppState, req: SignUpRequest) -> Result<Session, AppError> {
    let conn = open_and_migrate(&state.config.db_path)?;
    let provider = LocalIdentityProvider::new(&conn);
    let fields = ProfileFields {
        first_name: req.first_name,
        last_name: req.last_name,
        sector: req.sector,
        role: req.role,
    };
    state
        .session
        .sign_up(&provider, &req.email, &req.password, &fields, now())
}

pub fn auth_sign_in(state: &AppState, email: &str, password: &str) -> Result<Session, AppError> {
    let conn = open_and_migrate(&state.config.db_path)?;
    let provider = LocalIdentityProvider::new(&conn);
    state.session.sign_in(&provider, email, password, now())
}

pub fn auth_sign_out(state: &AppState) -> SignOutResponse {
    state.session.sign_out();
    SignOutResponse { ok: true }
}

pub fn session_current(state: &AppState) -> Option<Session> {
    state.session.current()
}

pub fn route_check(state: &AppState, required: Option<Sector>) -> RouteDecision {
    let session = state.session.current();
    check_route(session.as_ref().map(|s| &s.profile), required)
}

pub fn incidents_list(
    state: &AppState,
    query: &IncidentListQuery,
) -> Result<Vec<Incident>, AppError> {
    let session = state.session.require()?;
    let conn = open_and_migrate(&state.config.db_path)?;
    service::list_incidents(&conn, &session.profile, query)
}

pub fn incident_detail(state: &AppState, id: &str) -> Result<IncidentDetail, AppError> {
    let session = state.session.require()?;
    let id = parse_id(id)?;
    let conn = open_and_migrate(&state.config.db_path)?;
    service::get_incident_detail(&conn, &session.profile, id)
}

pub fn incident_create(
    state: &AppState,
    input: &NewIncidentInput,
) -> Result<CreatedIncident, AppError> {
    let session = state.session.require()?;
    let mut conn = open_and_migrate(&state.config.db_path)?;
    service::create_incident(&mut conn, &session.profile, input, now())
}

pub fn incident_set_status(state: &AppState, id: &str, status: &str) -> Result<Incident, AppError> {
    let session = state.session.require()?;
    let id = parse_id(id)?;
    let mut conn = open_and_migrate(&state.config.db_path)?;
    service::set_incident_status(&mut conn, &session.profile, id, status, now())
}

pub fn get_dashboard(state: &AppState) -> Result<DashboardPayload, AppError> {
    let session = state.session.require()?;
    let conn = open_and_migrate(&state.config.db_path)?;
    service::dashboard(&conn, &session.profile, state.config.recent_limit)
}

/// Signed-in seeding. `init_db` with `seed_demo` is the unauthenticated bootstrap path.
pub fn seed_demo_dataset(state: &AppState) -> Result<DemoSeedSummary, AppError> {
    state.session.require()?;
    let mut conn = open_and_migrate(&state.config.db_path)?;
    core_seed_demo_dataset(&mut conn, now())
}

pub fn badge_table() -> BadgeTable {
    itrack_core::badge::badge_table()
}
