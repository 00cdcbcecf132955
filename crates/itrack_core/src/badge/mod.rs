use serde::Serialize;

use crate::domain::{Sector, Severity, Status};

/// Display label and style token for an enum variant.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Badge {
    pub label: &'static str,
    pub style_token: &'static str,
}

const fn badge(label: &'static str, style_token: &'static str) -> Badge {
    Badge { label, style_token }
}

pub fn severity_badge(severity: Severity) -> Badge {
    match severity {
        Severity::Critical => badge("Critical", "severity-critical"),
        Severity::High => badge("High", "severity-high"),
        Severity::Medium => badge("Medium", "severity-medium"),
        Severity::Low => badge("Low", "severity-low"),
    }
}

pub fn status_badge(status: Status) -> Badge {
    match status {
        Status::Open => badge("Open", "status-open"),
        Status::InProgress => badge("In Progress", "status-in-progress"),
        Status::Resolved => badge("Resolved", "status-resolved"),
    }
}

pub fn sector_badge(sector: Sector) -> Badge {
    match sector {
        Sector::PrimaryTeam => badge("Primary team", "sector-primary"),
        Sector::SecondaryTeam => badge("Secondary team", "sector-secondary"),
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BadgeEntry<K> {
    pub key: K,
    #[serde(flatten)]
    pub badge: Badge,
}

/// Full lookup table, for presentation layers that want to cache it once.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BadgeTable {
    pub severities: Vec<BadgeEntry<Severity>>,
    pub statuses: Vec<BadgeEntry<Status>>,
    pub sectors: Vec<BadgeEntry<Sector>>,
}

pub fn badge_table() -> BadgeTable {
    BadgeTable {
        severities: Severity::ALL
            .iter()
            .map(|s| BadgeEntry {
                key: *s,
                badge: severity_badge(*s),
            })
            .collect(),
        statuses: Status::ALL
            .iter()
            .map(|s| BadgeEntry {
                key: *s,
                badge: status_badge(*s),
            })
            .collect(),
        sectors: Sector::ALL
            .iter()
            .map(|s| BadgeEntry {
                key: *s,
                badge: sector_badge(*s),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_covers_every_variant_with_unique_tokens() {
        let table = badge_table();
        assert_eq!(table.severities.len(), Severity::ALL.len());
        assert_eq!(table.statuses.len(), Status::ALL.len());
        assert_eq!(status_badge(Status::InProgress).label, "In Progress");

        let mut tokens = table
            .severities
            .iter()
            .map(|e| e.badge.style_token)
            .chain(table.statuses.iter().map(|e| e.badge.style_token))
            .chain(table.sectors.iter().map(|e| e.badge.style_token))
            .collect::<Vec<_>>();
        let total = tokens.len();
        tokens.sort();
        tokens.dedup();
        assert_eq!(tokens.len(), total);
    }
}
