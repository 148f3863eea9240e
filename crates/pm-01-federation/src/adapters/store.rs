//! In-memory instance table.

use crate::domain::{InstanceRecord, StoreError, Timestamp};
use crate::ports::InstanceStore;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// `InstanceStore` over a map keyed by id.
///
/// Used by the runtime binary when no database is attached, and by tests.
#[derive(Debug, Default)]
pub struct MemoryInstanceStore {
    rows: RwLock<BTreeMap<String, InstanceRecord>>,
}

impl MemoryInstanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    pub fn all(&self) -> Vec<InstanceRecord> {
        self.rows.read().values().cloned().collect()
    }
}

impl InstanceStore for MemoryInstanceStore {
    fn find_by_domain(&self, domain: &str) -> Result<Option<InstanceRecord>, StoreError> {
        Ok(self
            .rows
            .read()
            .values()
            .find(|row| row.domain == domain)
            .cloned())
    }

    fn find_by_id(&self, id: &str) -> Result<Option<InstanceRecord>, StoreError> {
        Ok(self.rows.read().get(id).cloned())
    }

    fn upsert(&self, record: &InstanceRecord) -> Result<(), StoreError> {
        if record.id.is_empty() {
            return Err(StoreError::Backend("instance id is empty".into()));
        }
        self.rows.write().insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn replace_for_domain(&self, record: &InstanceRecord) -> Result<Vec<String>, StoreError> {
        if record.id.is_empty() {
            return Err(StoreError::Backend("instance id is empty".into()));
        }
        let mut rows = self.rows.write();
        let displaced: Vec<String> = rows
            .values()
            .filter(|row| row.domain == record.domain && row.id != record.id)
            .map(|row| row.id.clone())
            .collect();
        for id in &displaced {
            rows.remove(id);
        }
        rows.insert(record.id.clone(), record.clone());
        Ok(displaced)
    }

    fn updated_since(&self, since: Timestamp) -> Result<Vec<InstanceRecord>, StoreError> {
        Ok(self
            .rows
            .read()
            .values()
            .filter(|row| row.last_update_time.is_some_and(|t| t >= since.as_secs()))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_replaces_by_id() {
        let store = MemoryInstanceStore::new();
        let mut record = InstanceRecord {
            id: "a".into(),
            domain: "one.example".into(),
            last_update_time: Some(5),
            ..Default::default()
        };
        store.upsert(&record).unwrap();
        record.last_update_time = Some(9);
        store.upsert(&record).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.find_by_id("a").unwrap().unwrap().last_update_time, Some(9));
        assert_eq!(store.updated_since(Timestamp::new(10)).unwrap(), vec![]);
    }

    #[test]
    fn test_replace_for_domain_drops_rows_with_other_ids() {
        let store = MemoryInstanceStore::new();
        let row = |id: &str, domain: &str| InstanceRecord {
            id: id.into(),
            domain: domain.into(),
            ..Default::default()
        };
        store.upsert(&row("old", "peer.example")).unwrap();
        store.upsert(&row("other", "other.example")).unwrap();

        let displaced = store.replace_for_domain(&row("new", "peer.example")).unwrap();

        assert_eq!(displaced, vec!["old".to_string()]);
        assert_eq!(store.find_by_domain("peer.example").unwrap().unwrap().id, "new");
        assert_eq!(store.len(), 2);
        assert!(store.replace_for_domain(&row("new", "peer.example")).unwrap().is_empty());
    }

    #[test]
    fn test_empty_id_is_rejected() {
        let store = MemoryInstanceStore::new();
        assert!(store.upsert(&InstanceRecord::default()).is_err());
    }
}
