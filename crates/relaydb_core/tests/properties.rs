//! Property tests for store counts and state transitions.

use proptest::prelude::*;
use relaydb_codec::Entry;
use relaydb_core::{RecordStore, StoreConfig};
use relaydb_storage::InMemoryBackend;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
enum Op {
    Append,
    /// Acknowledge the records at these positions among those appended so far.
    Ack(Vec<usize>),
    DeleteStored,
    DeleteAll,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => Just(Op::Append),
        3 => prop::collection::vec(0usize..64, 0..8).prop_map(Op::Ack),
        1 => Just(Op::DeleteStored),
        1 => Just(Op::DeleteAll),
    ]
}

proptest! {
    #[test]
    fn counts_match_model(ops in prop::collection::vec(op_strategy(), 1..80)) {
        let config = StoreConfig::new().max_items_per_transaction(3);
        let store = RecordStore::open_with_backend(Box::new(InMemoryBackend::new()), config).unwrap();
        let all_rx = store.observe_count_all();
        let unsent_rx = store.observe_count_unsent();

        // uuid -> stored, for live records
        let mut model = BTreeMap::new();
        let mut appended = Vec::new();

        for op in ops {
            match op {
                Op::Append => {
                    let record = store.append(Entry::new().with("i", appended.len() as i64)).unwrap();
                    model.insert(record.uuid, false);
                    appended.push(record.uuid);
                }
                Op::Ack(positions) => {
                    let uuids: Vec<_> = positions
                        .iter()
                        .filter_map(|p| appended.get(*p).copied())
                        .collect();
                    let mut expected = 0;
                    for uuid in &uuids {
                        if let Some(stored) = model.get_mut(uuid) {
                            if !*stored {
                                *stored = true;
                                expected += 1;
                            }
                        }
                    }
                    prop_assert_eq!(store.mark_stored(&uuids).unwrap(), expected);
                }
                Op::DeleteStored => {
                    let before = model.len();
                    model.retain(|_, stored| !*stored);
                    prop_assert_eq!(store.delete_stored().unwrap(), before - model.len());
                }
                Op::DeleteAll => {
                    let before = model.len();
                    model.clear();
                    prop_assert_eq!(store.delete_all().unwrap(), before);
                }
            }

            let unsent = model.values().filter(|stored| !**stored).count() as u64;
            prop_assert_eq!(store.count_all(), model.len() as u64);
            prop_assert_eq!(store.count_unsent(), unsent);
            prop_assert_eq!(*all_rx.borrow(), model.len() as u64);
            prop_assert_eq!(*unsent_rx.borrow(), unsent);
        }
    }

    #[test]
    fn mark_stored_twice_equals_once(count in 1usize..40, picks in prop::collection::vec(0usize..40, 0..20)) {
        let store = RecordStore::open_in_memory().unwrap();
        let records: Vec<_> = (0..count).map(|_| store.append(Entry::new()).unwrap()).collect();
        let uuids: Vec<_> = picks.iter().filter_map(|p| records.get(*p)).map(|r| r.uuid).collect();

        store.mark_stored(&uuids).unwrap();
        let once: Vec<_> = records.iter().map(|r| store.get(r.sequence).unwrap().stored).collect();
        prop_assert_eq!(store.mark_stored(&uuids).unwrap(), 0);
        let twice: Vec<_> = records.iter().map(|r| store.get(r.sequence).unwrap().stored).collect();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn delete_stored_never_touches_pending(count in 1usize..30, picks in prop::collection::vec(0usize..30, 0..15)) {
        let store = RecordStore::open_in_memory().unwrap();
        let records: Vec<_> = (0..count).map(|_| store.append(Entry::new()).unwrap()).collect();
        let uuids: Vec<_> = picks.iter().filter_map(|p| records.get(*p)).map(|r| r.uuid).collect();
        store.mark_stored(&uuids).unwrap();

        let pending_before = store.range_unsent(None, usize::MAX).unwrap();
        store.delete_stored().unwrap();
        let pending_after = store.range_unsent(None, usize::MAX).unwrap();
        prop_assert_eq!(&pending_before, &pending_after);
        prop_assert_eq!(store.count_all(), pending_after.len() as u64);
    }

    #[test]
    fn replay_rebuilds_identical_state(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let backend = InMemoryBackend::new();
        let store = RecordStore::open_with_backend(Box::new(backend.clone()), StoreConfig::new()).unwrap();
        let mut appended = Vec::new();
        for op in ops {
            match op {
                Op::Append => appended.push(store.append(Entry::new().with("k", "v")).unwrap().uuid),
                Op::Ack(positions) => {
                    let uuids: Vec<_> = positions.iter().filter_map(|p| appended.get(*p).copied()).collect();
                    store.mark_stored(&uuids).unwrap();
                }
                Op::DeleteStored => { store.delete_stored().unwrap(); }
                Op::DeleteAll => { store.delete_all().unwrap(); }
            }
        }
        let expected = store.range_unsent(None, usize::MAX).unwrap();
        let stats = store.stats().unwrap();
        drop(store);

        let reopened = RecordStore::open_with_backend(Box::new(backend), StoreConfig::new()).unwrap();
        prop_assert_eq!(reopened.range_unsent(None, usize::MAX).unwrap(), expected);
        prop_assert_eq!(reopened.stats().unwrap(), stats);
    }
}
