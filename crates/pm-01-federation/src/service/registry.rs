//! Instance table writes and the public listing.

use crate::domain::{InstanceRecord, StoreError, Timestamp};
use crate::ports::InstanceStore;
use std::time::Duration;
use tracing::{debug, info};

/// Upsert `record`, deleting any other row that already holds its domain.
///
/// Domain wins over id. The reverse conflict (same id, new domain) is a
/// plain update of that row.
pub fn persist_instance(store: &dyn InstanceStore, record: &InstanceRecord) -> Result<(), StoreError> {
    for old_id in store.replace_for_domain(record)? {
        info!(
            domain = %record.domain,
            %old_id,
            new_id = %record.id,
            "replaced instance row with conflicting id"
        );
    }
    debug!(domain = %record.domain, id = %record.id, "instance persisted");
    Ok(())
}

/// Records a peer may fetch: public and updated within `window`.
pub fn public_instances(
    store: &dyn InstanceStore,
    now: Timestamp,
    window: Duration,
) -> Result<Vec<InstanceRecord>, StoreError> {
    let since = now.sub_secs(window.as_secs());
    Ok(store
        .updated_since(since)?
        .into_iter()
        .filter(|record| !record.is_private() && record.signature.is_some())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryInstanceStore;

    fn record(id: &str, domain: &str, updated: u64) -> InstanceRecord {
        InstanceRecord {
            id: id.into(),
            domain: domain.into(),
            pubkey: "PEM".into(),
            last_update_time: Some(updated),
            signature: Some("sig".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_domain_wins_over_id() {
        let store = MemoryInstanceStore::new();
        persist_instance(&store, &record("X", "foo.example", 10)).unwrap();
        persist_instance(&store, &record("Y", "foo.example", 20)).unwrap();

        assert_eq!(store.find_by_id("X").unwrap(), None);
        let kept = store.find_by_domain("foo.example").unwrap().unwrap();
        assert_eq!(kept.id, "Y");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_same_id_new_domain_updates_in_place() {
        let store = MemoryInstanceStore::new();
        persist_instance(&store, &record("X", "old.example", 10)).unwrap();
        persist_instance(&store, &record("X", "new.example", 20)).unwrap();

        assert_eq!(store.find_by_domain("old.example").unwrap(), None);
        assert_eq!(store.find_by_id("X").unwrap().unwrap().domain, "new.example");
    }

    #[test]
    fn test_concurrent_writers_keep_domain_unique() {
        use std::sync::{Arc, Barrier};
        use std::thread;

        for round in 0..50 {
            let store = Arc::new(MemoryInstanceStore::new());
            let barrier = Arc::new(Barrier::new(2));
            let writers: Vec<_> = ["X", "Y"]
                .into_iter()
                .map(|id| {
                    let store = store.clone();
                    let barrier = barrier.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        persist_instance(store.as_ref(), &record(id, "foo.example", 10)).unwrap();
                    })
                })
                .collect();
            for writer in writers {
                writer.join().unwrap();
            }

            let ids: Vec<_> = store.all().into_iter().map(|r| r.id).collect();
            assert_eq!(ids.len(), 1, "round {round}: rows for foo.example: {ids:?}");
        }
    }

    #[test]
    fn test_public_listing_filters_private_and_old() {
        let store = MemoryInstanceStore::new();
        persist_instance(&store, &record("a", "fresh.example", 1_000)).unwrap();
        persist_instance(&store, &record("b", "old.example", 10)).unwrap();
        let mut hidden = record("c", "hidden.example", 1_000);
        hidden.is_private = Some(true);
        persist_instance(&store, &hidden).unwrap();

        let listed = public_instances(&store, Timestamp::new(1_000), Duration::from_secs(100)).unwrap();
        let domains: Vec<_> = listed.iter().map(|r| r.domain.as_str()).collect();
        assert_eq!(domains, vec!["fresh.example"]);
    }
}
