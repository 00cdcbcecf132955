use std::path::{Path, PathBuf};
use std::{env, fs};

use itrack_core::analytics::DEFAULT_RECENT_LIMIT;
use itrack_core::error::AppError;
use serde::{Deserialize, Serialize};

pub const CONFIG_PATH_VAR: &str = "INCIDENTTRACKER_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "incidenttracker.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub db_path: PathBuf,
    /// `EnvFilter` directive; `RUST_LOG` wins when set.
    pub log_filter: String,
    pub log_json: bool,
    pub recent_limit: usize,
    /// Seed the sample dataset into an empty store on `init_db`.
    pub seed_demo: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("incidenttracker.sqlite"),
            log_filter: "info".to_string(),
            log_json: false,
            recent_limit: DEFAULT_RECENT_LIMIT,
            seed_demo: false,
        }
    }
}

fn invalid(var: &str, value: &str, why: impl std::fmt::Display) -> AppError {
    AppError::new("CONFIG_INVALID", format!("Invalid value for {var}"))
        .with_details(format!("value={value}; error={why}"))
}

fn parse_bool(var: &str, value: &str) -> Result<bool, AppError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(var, value, "expected a boolean")),
    }
}

impl AppConfig {
    /// File named by `INCIDENTTRACKER_CONFIG` (missing file means defaults), then environment
    /// overrides.
    pub fn load() -> Result<Self, AppError> {
        let path = env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_with(Path::new(&path), |k| env::var(k).ok())
    }

    pub fn load_with(
        path: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, AppError> {
        let file_cfg: Option<AppConfig> = fs::read_to_string(path)
            .ok()
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(|e| {
                AppError::new("CONFIG_INVALID", "Failed to parse config file")
                    .with_details(format!("path={}; error={e}", path.display()))
            })?;

        let mut cfg = file_cfg.unwrap_or_default();
        cfg.apply_overrides(lookup)?;
        Ok(cfg)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), AppError> {
        if let Some(v) = lookup("INCIDENTTRACKER_DB_PATH") {
            if v.trim().is_empty() {
                return Err(invalid("INCIDENTTRACKER_DB_PATH", &v, "empty path"));
            }
            self.db_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("INCIDENTTRACKER_LOG") {
            self.log_filter = v;
        }
        if let Some(v) = lookup("INCIDENTTRACKER_LOG_JSON") {
            self.log_json = parse_bool("INCIDENTTRACKER_LOG_JSON", &v)?;
        }
        if let Some(v) = lookup("INCIDENTTRACKER_RECENT_LIMIT") {
            self.recent_limit = v
                .trim()
                .parse()
                .map_err(|e| invalid("INCIDENTTRACKER_RECENT_LIMIT", &v, e))?;
        }
        if let Some(v) = lookup("INCIDENTTRACKER_SEED_DEMO") {
            self.seed_demo = parse_bool("INCIDENTTRACKER_SEED_DEMO", &v)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = AppConfig::load_with(&dir.path().join("nope.json"), env_of(&[])).unwrap();
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn file_values_then_env_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        fs::write(&path, r#"{"db_path":"/tmp/a.sqlite","recent_limit":5}"#).unwrap();

        let cfg = AppConfig::load_with(
            &path,
            env_of(&[
                ("INCIDENTTRACKER_RECENT_LIMIT", "7"),
                ("INCIDENTTRACKER_SEED_DEMO", "yes"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.db_path, PathBuf::from("/tmp/a.sqlite"));
        assert_eq!(cfg.recent_limit, 7);
        assert!(cfg.seed_demo);
        assert_eq!(cfg.log_filter, "info");
    }

    #[test]
    fn bad_override_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::load_with(
            &dir.path().join("nope.json"),
            env_of(&[("INCIDENTTRACKER_LOG_JSON", "maybe")]),
        )
        .unwrap_err();
        assert_eq!(err.code, "CONFIG_INVALID");
    }
}
