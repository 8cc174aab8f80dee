use std::collections::HashMap;

use tracechain_core::Address;

use super::entry::{DisplayLabel, RoleDirectoryEntry};
use super::http::{DirectoryError, RolesSource};

/// Resolves addresses to display labels.
pub trait LabelResolver {
    fn resolve(&self, address: &Address) -> DisplayLabel;
}

/// Snapshot of the roles directory for one panel session.
///
/// Loaded once; there is no invalidation within a session. A failed load is
/// remembered and every address resolves to [`DisplayLabel::UNKNOWN`].
#[derive(Debug, Clone, Default)]
pub struct DirectoryCache {
    entries: HashMap<Address, RoleDirectoryEntry>,
    load_error: Option<DirectoryError>,
}

impl DirectoryCache {
    pub async fn load<S>(source: &S) -> Self
    where
        S: RolesSource + ?Sized,
    {
        match source.fetch_roles().await {
            Ok(entries) => {
                let cache = Self::from_entries(entries);
                tracing::debug!(entries = cache.len(), "roles directory loaded");
                cache
            }
            Err(error) => {
                tracing::warn!("roles directory unavailable, labels degrade to placeholders: {error}");
                Self::failed(error)
            }
        }
    }

    pub fn from_entries(entries: impl IntoIterator<Item = RoleDirectoryEntry>) -> Self {
        let mut map = HashMap::new();
        for entry in entries {
            let address = entry.address_registered.clone();
            if map.contains_key(&address) {
                tracing::warn!(address = %address, "duplicate directory entry ignored");
                continue;
            }
            map.insert(address, entry);
        }
        Self {
            entries: map,
            load_error: None,
        }
    }

    pub fn failed(error: DirectoryError) -> Self {
        Self {
            entries: HashMap::new(),
            load_error: Some(error),
        }
    }

    pub fn entry(&self, address: &Address) -> Option<&RoleDirectoryEntry> {
        self.entries.get(address)
    }

    /// Entries with the given role, ordered by address.
    pub fn by_role(&self, role: &str) -> Vec<&RoleDirectoryEntry> {
        let mut out: Vec<_> = self.entries.values().filter(|e| e.has_role(role)).collect();
        out.sort_by(|a, b| a.address_registered.cmp(&b.address_registered));
        out
    }

    pub fn load_error(&self) -> Option<&DirectoryError> {
        self.load_error.as_ref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl LabelResolver for DirectoryCache {
    fn resolve(&self, address: &Address) -> DisplayLabel {
        self.entries
            .get(address)
            .map(RoleDirectoryEntry::label)
            .unwrap_or_else(DisplayLabel::unknown)
    }
}
