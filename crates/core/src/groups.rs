//! Group name resolution
//!
//! Notifications are configured with a human-readable group name while the
//! transport addresses groups by id. The first resolution fetches every group
//! once and caches a case-insensitive index for the rest of the process.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bdaybot_domain::{GroupSummary, RelayError, Result};
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::ports::MessagingTransport;

#[derive(Debug, Default)]
struct GroupIndex {
    by_name: HashMap<String, Vec<String>>,
    ids: HashSet<String>,
    display_names: Vec<String>,
}

impl GroupIndex {
    fn build(groups: Vec<GroupSummary>) -> Self {
        let mut index = Self::default();
        for group in groups {
            index.by_name.entry(group.name.to_lowercase()).or_default().push(group.id.clone());
            index.ids.insert(group.id);
            index.display_names.push(group.name);
        }
        index.display_names.sort();
        index.display_names.dedup();
        index
    }

    fn lookup(&self, name: &str) -> Result<String> {
        match self.by_name.get(&name.to_lowercase()).map(Vec::as_slice) {
            Some([id]) => Ok(id.clone()),
            Some(ids) if !ids.is_empty() => {
                Err(RelayError::AmbiguousGroup { name: name.to_string(), ids: ids.to_vec() })
            }
            _ => Err(RelayError::GroupNotFound {
                name: name.to_string(),
                known_names: self.display_names.clone(),
            }),
        }
    }
}

/// Resolves group names to transport ids.
pub struct GroupResolver {
    transport: Arc<dyn MessagingTransport>,
    primary_name: Option<String>,
    index: Mutex<Option<Arc<GroupIndex>>>,
    primary_id: RwLock<Option<String>>,
}

impl GroupResolver {
    pub fn new(transport: Arc<dyn MessagingTransport>, primary_name: Option<String>) -> Self {
        Self {
            transport,
            primary_name: primary_name.filter(|name| !name.trim().is_empty()),
            index: Mutex::new(None),
            primary_id: RwLock::new(None),
        }
    }

    pub fn primary_name(&self) -> Option<&str> {
        self.primary_name.as_deref()
    }

    /// Id of the primary group once [`resolve_primary`](Self::resolve_primary)
    /// has succeeded.
    pub fn primary_id(&self) -> Option<String> {
        self.primary_id.read().clone()
    }

    /// Resolve a display name (case-insensitive) to a group id.
    pub async fn resolve_group_id(&self, name: &str) -> Result<String> {
        self.index().await?.lookup(name)
    }

    /// Resolve either a literal group id or a display name.
    pub async fn resolve_target(&self, name_or_id: &str) -> Result<String> {
        let index = self.index().await?;
        if index.ids.contains(name_or_id) {
            return Ok(name_or_id.to_string());
        }
        index.lookup(name_or_id)
    }

    /// Resolve and remember the configured primary group.
    pub async fn resolve_primary(&self) -> Result<String> {
        let name = self.primary_name.as_deref().ok_or_else(|| {
            RelayError::Configuration("primary group name is not configured".into())
        })?;
        let id = self.resolve_group_id(name).await?;
        info!(group = name, group_id = %id, "groups.primary.resolved");
        *self.primary_id.write() = Some(id.clone());
        Ok(id)
    }

    async fn index(&self) -> Result<Arc<GroupIndex>> {
        let mut cached = self.index.lock().await;
        if let Some(index) = cached.as_ref() {
            return Ok(Arc::clone(index));
        }

        let groups = self.transport.list_groups().await?;
        debug!(count = groups.len(), "groups.cache.loaded");
        let index = Arc::new(GroupIndex::build(groups));
        *cached = Some(Arc::clone(&index));
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> GroupIndex {
        GroupIndex::build(vec![
            GroupSummary::new("g1@g.us", "Family"),
            GroupSummary::new("g2@g.us", "Work"),
            GroupSummary::new("g3@g.us", "work"),
        ])
    }

    #[test]
    fn lookup_ignores_case() {
        assert_eq!(index().lookup("FAMILY").unwrap(), "g1@g.us");
    }

    #[test]
    fn duplicate_names_are_ambiguous() {
        match index().lookup("Work") {
            Err(RelayError::AmbiguousGroup { name, ids }) => {
                assert_eq!(name, "Work");
                assert_eq!(ids, vec!["g2@g.us".to_string(), "g3@g.us".to_string()]);
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }

    #[test]
    fn missing_name_lists_known_groups() {
        match index().lookup("Friends") {
            Err(RelayError::GroupNotFound { known_names, .. }) => {
                assert_eq!(known_names, vec!["Family", "Work", "work"]);
            }
            other => panic!("expected not found, got {other:?}"),
        }
    }
}
