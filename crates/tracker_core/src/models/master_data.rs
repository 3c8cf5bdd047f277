use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use time::OffsetDateTime;

// ---------------------------------------------------------------------------
// Reference tables: funders, clusters, implementation statuses, currencies.
// Entries are never deleted, only deactivated, so historical activities keep
// resolving to the entry they were created with.
// ---------------------------------------------------------------------------
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum MasterKind {
    Funder,
    Cluster,
    Status,
    Currency,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterEntry {
    pub id: i64,
    pub kind: MasterKind,
    /// Short code (cluster short name, funder code, currency ISO code).
    pub code: String,
    pub name: String,
    pub active: bool,
    pub is_default: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMasterEntry {
    pub kind: MasterKind,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub is_default: bool,
}

/// Collapses whitespace (including non-breaking spaces) and lowercases, so
/// `" Ministry  of\u{a0}Health "` and `"ministry of health"` compare equal.
pub fn normalize_key(raw: &str) -> String {
    raw.replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Lookup table over the active master data, as of one moment.
///
/// Built once per upload (or per create request) so that every row is checked
/// against the same snapshot.
#[derive(Debug, Default, Clone)]
pub struct MasterIndex {
    by_key: HashMap<(MasterKind, String), MasterEntry>,
    defaults: HashMap<MasterKind, MasterEntry>,
}

impl MasterIndex {
    /// Inactive entries are skipped: they cannot be chosen for new records.
    pub fn from_entries<I: IntoIterator<Item = MasterEntry>>(entries: I) -> Self {
        let mut index = Self::default();
        for entry in entries.into_iter().filter(|e| e.active) {
            if entry.is_default {
                index.defaults.entry(entry.kind).or_insert_with(|| entry.clone());
            }
            // Names are registered first so a code that happens to equal
            // another entry's name still wins.
            index
                .by_key
                .entry((entry.kind, normalize_key(&entry.name)))
                .or_insert_with(|| entry.clone());
            index
                .by_key
                .insert((entry.kind, normalize_key(&entry.code)), entry);
        }
        index
    }

    /// Resolves by code or name, case- and whitespace-insensitively.
    pub fn resolve(&self, kind: MasterKind, raw: &str) -> Option<&MasterEntry> {
        self.by_key.get(&(kind, normalize_key(raw)))
    }

    pub fn default_for(&self, kind: MasterKind) -> Option<&MasterEntry> {
        self.defaults.get(&kind)
    }

    pub fn entry_by_id(&self, id: i64) -> Option<&MasterEntry> {
        self.by_key.values().find(|e| e.id == id)
    }

    /// Makes the entry `raw` resolves to the default of its kind. Left
    /// unchanged when `raw` does not resolve to an active entry.
    pub fn with_default(mut self, kind: MasterKind, raw: &str) -> Self {
        if let Some(entry) = self.resolve(kind, raw).cloned() {
            self.defaults.insert(kind, entry);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: i64, kind: MasterKind, code: &str, name: &str, active: bool) -> MasterEntry {
        MasterEntry {
            id,
            kind,
            code: code.into(),
            name: name.into(),
            active,
            is_default: false,
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn resolves_by_code_or_name_ignoring_case_and_spacing() {
        let index = MasterIndex::from_entries(vec![entry(1, MasterKind::Funder, "GRZ", "Government  of Zambia", true)]);
        assert_eq!(index.resolve(MasterKind::Funder, "grz").map(|e| e.id), Some(1));
        assert_eq!(index.resolve(MasterKind::Funder, " government of\u{a0}zambia ").map(|e| e.id), Some(1));
        assert!(index.resolve(MasterKind::Cluster, "GRZ").is_none());
    }

    #[test]
    fn inactive_entries_are_not_resolvable() {
        let index = MasterIndex::from_entries(vec![entry(2, MasterKind::Cluster, "OLD", "Retired cluster", false)]);
        assert!(index.resolve(MasterKind::Cluster, "OLD").is_none());
    }

    #[test]
    fn configured_default_overrides_stored_default() {
        let mut zmw = entry(3, MasterKind::Currency, "ZMW", "Zambian Kwacha", true);
        zmw.is_default = true;
        let usd = entry(4, MasterKind::Currency, "USD", "US Dollar", true);
        let index = MasterIndex::from_entries(vec![zmw, usd]);
        assert_eq!(index.default_for(MasterKind::Currency).map(|e| e.id), Some(3));

        let index = index.with_default(MasterKind::Currency, "usd");
        assert_eq!(index.default_for(MasterKind::Currency).map(|e| e.id), Some(4));

        let index = index.with_default(MasterKind::Currency, "EUR");
        assert_eq!(index.default_for(MasterKind::Currency).map(|e| e.id), Some(4));
    }

    #[test]
    fn kind_parses_from_route_segments() {
        assert_eq!("funder".parse::<MasterKind>().unwrap(), MasterKind::Funder);
        assert_eq!("Currency".parse::<MasterKind>().unwrap(), MasterKind::Currency);
        assert!("procurement".parse::<MasterKind>().is_err());
    }
}
