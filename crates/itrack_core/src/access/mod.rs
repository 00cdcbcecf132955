use serde::{Deserialize, Serialize};

use crate::domain::{Incident, Sector, UserProfile};
use crate::error::AppError;

/// Visibility scope of a caller, derived once per request from the session profile.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "sector", rename_all = "snake_case")]
pub enum AccessScope {
    /// Privileged sector: every incident.
    AllSectors,
    /// Non-privileged sector: only incidents owned by that sector.
    Sector(Sector),
}

impl AccessScope {
    pub fn for_sector(sector: Sector) -> Self {
        if sector.is_privileged() {
            AccessScope::AllSectors
        } else {
            AccessScope::Sector(sector)
        }
    }

    pub fn for_profile(profile: &UserProfile) -> Self {
        Self::for_sector(profile.sector)
    }

    pub fn can_view_sector(&self, sector: Sector) -> bool {
        match self {
            AccessScope::AllSectors => true,
            AccessScope::Sector(own) => *own == sector,
        }
    }

    pub fn can_view(&self, incident: &Incident) -> bool {
        self.can_view_sector(incident.sector)
    }

    /// View and act rights are identical in this model.
    pub fn can_act_on(&self, incident: &Incident) -> bool {
        self.can_view(incident)
    }

    /// The sector the store must filter on, if any. Listing queries bind this in SQL so rows
    /// outside the scope never leave the store.
    pub fn sector_filter(&self) -> Option<Sector> {
        match self {
            AccessScope::AllSectors => None,
            AccessScope::Sector(s) => Some(*s),
        }
    }

    pub fn ensure_can_act_on(&self, incident: &Incident) -> Result<(), AppError> {
        if self.can_act_on(incident) {
            return Ok(());
        }
        Err(AppError::forbidden("You do not have access to this incident")
            .with_details(format!("incident_sector={}", incident.sector)))
    }
}

/// Sector assigned to a new incident: the creator's own unless a privileged creator asks for
/// another one.
pub fn resolve_creation_sector(
    creator: &UserProfile,
    requested: Option<Sector>,
) -> Result<Sector, AppError> {
    match requested {
        None => Ok(creator.sector),
        Some(s) if s == creator.sector => Ok(s),
        Some(s) if creator.sector.is_privileged() => Ok(s),
        Some(s) => Err(AppError::new(
            "FORBIDDEN_SECTOR_OVERRIDE",
            "Only the privileged sector can create incidents for another sector",
        )
        .with_details(format!("creator_sector={}; requested={s}", creator.sector))),
    }
}

/// Outcome of checking a navigable section.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RouteDecision {
    Allow,
    /// No session: send to the sign-in view.
    RedirectToSignIn,
    /// Signed in but outside the required sector: send to the access-denied view, not a 404.
    AccessDenied,
}

pub fn check_route(profile: Option<&UserProfile>, required: Option<Sector>) -> RouteDecision {
    let Some(profile) = profile else {
        return RouteDecision::RedirectToSignIn;
    };
    match required {
        Some(required) if profile.sector != required && !profile.sector.is_privileged() => {
            RouteDecision::AccessDenied
        }
        _ => RouteDecision::Allow,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;
    use uuid::Uuid;

    fn profile(sector: Sector) -> UserProfile {
        UserProfile {
            id: Uuid::new_v4(),
            first_name: "Ana".to_string(),
            last_name: "Souza".to_string(),
            sector,
            role: "Analyst".to_string(),
            created_at: datetime!(2026-01-01 00:00:00 UTC),
            updated_at: datetime!(2026-01-01 00:00:00 UTC),
        }
    }

    #[test]
    fn scope_follows_privilege() {
        assert_eq!(
            AccessScope::for_sector(Sector::PrimaryTeam),
            AccessScope::AllSectors
        );
        let secondary = AccessScope::for_sector(Sector::SecondaryTeam);
        assert!(secondary.can_view_sector(Sector::SecondaryTeam));
        assert!(!secondary.can_view_sector(Sector::PrimaryTeam));
        assert_eq!(secondary.sector_filter(), Some(Sector::SecondaryTeam));
        assert_eq!(AccessScope::AllSectors.sector_filter(), None);
    }

    #[test]
    fn creation_sector_defaults_and_overrides() {
        let primary = profile(Sector::PrimaryTeam);
        let secondary = profile(Sector::SecondaryTeam);
        assert_eq!(
            resolve_creation_sector(&secondary, None).unwrap(),
            Sector::SecondaryTeam
        );
        assert_eq!(
            resolve_creation_sector(&primary, Some(Sector::SecondaryTeam)).unwrap(),
            Sector::SecondaryTeam
        );
        let err = resolve_creation_sector(&secondary, Some(Sector::PrimaryTeam)).unwrap_err();
        assert_eq!(err.code, "FORBIDDEN_SECTOR_OVERRIDE");
    }

    #[test]
    fn route_gate_distinguishes_denied_from_signed_out() {
        let secondary = profile(Sector::SecondaryTeam);
        let primary = profile(Sector::PrimaryTeam);
        assert_eq!(
            check_route(None, None),
            RouteDecision::RedirectToSignIn
        );
        assert_eq!(
            check_route(Some(&secondary), Some(Sector::PrimaryTeam)),
            RouteDecision::AccessDenied
        );
        assert_eq!(
            check_route(Some(&primary), Some(Sector::SecondaryTeam)),
            RouteDecision::Allow
        );
        assert_eq!(
            check_route(Some(&secondary), Some(Sector::SecondaryTeam)),
            RouteDecision::Allow
        );
        assert_eq!(check_route(Some(&secondary), None), RouteDecision::Allow);
    }
}
