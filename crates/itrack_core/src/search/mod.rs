use crate::domain::Incident;

/// Case-insensitive substring match over company, system and description.
pub fn matches_term(incident: &Incident, term: &str) -> bool {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    [
        incident.company.as_str(),
        incident.system.as_str(),
        incident.description.as_str(),
    ]
    .iter()
    .any(|field| field.to_lowercase().contains(&needle))
}

/// Filter an already-fetched page. Not indexed; linear in the page size.
pub fn filter_incidents(incidents: &[Incident], term: &str) -> Vec<Incident> {
    incidents
        .iter()
        .filter(|i| matches_term(i, term))
        .cloned()
        .collect()
}
