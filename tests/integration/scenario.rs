//! The reference scenario: one statement added, then removed.

use crate::common::*;
use quadmem::{StoreChange, INITIAL_SNAPSHOT};
use parking_lot::Mutex;
use std::sync::Arc;

fn scan_ap(store: &Store) -> Vec<Term> {
    store
        .scan(&StatementPattern::any().with_subject(ex("a")).with_predicate(ex("p")))
        .unwrap()
        .map(|st| st.quad.object)
        .collect()
}

#[test]
fn add_then_remove_across_snapshots() {
    let store = Store::in_memory().unwrap();
    assert_eq!(store.current_snapshot(), INITIAL_SNAPSHOT);

    let changes = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&changes);
    store.add_change_listener(Arc::new(move |change: &StoreChange| {
        sink.lock().push(*change);
    }));

    let mut txn = store.begin_transaction().unwrap();
    assert!(txn.add(&triple("a", "p", "b")).unwrap().is_some());
    let outcome = txn.commit().unwrap();
    assert_eq!(outcome.snapshot, 2);
    assert_eq!(scan_ap(&store), vec![ex("b")]);

    let at_two = store.read_view().unwrap();

    let mut txn = store.begin_transaction().unwrap();
    assert!(txn.remove(&triple("a", "p", "b")).unwrap());
    assert_eq!(txn.commit().unwrap().snapshot, 3);

    let pinned: Vec<Term> = at_two
        .scan(&StatementPattern::any().with_subject(ex("a")))
        .map(|st| st.quad.object)
        .collect();
    assert_eq!(pinned, vec![ex("b")]);
    assert!(scan_ap(&store).is_empty());

    let removed = at_two
        .scan(&StatementPattern::for_quad(&triple("a", "p", "b")))
        .next()
        .unwrap();
    assert_eq!((removed.since, removed.till), (2, 3));

    assert_eq!(
        *changes.lock(),
        vec![
            StoreChange {
                statements_added: true,
                statements_removed: false
            },
            StoreChange {
                statements_added: false,
                statements_removed: true
            },
        ]
    );
}

#[test]
fn scenario_survives_reopen() {
    let mut fixture = TestStore::new();
    fixture
        .store
        .transaction(|txn| txn.add(&triple("a", "p", "b")).map(|_| ()))
        .unwrap();
    fixture.reopen();

    assert_eq!(fixture.store.current_snapshot(), 2);
    assert_eq!(scan_ap(&fixture.store), vec![ex("b")]);

    fixture
        .store
        .transaction(|txn| txn.remove(&triple("a", "p", "b")).map(|_| ()))
        .unwrap();
    assert!(scan_ap(&fixture.store).is_empty());
}
