//! Persistence through the root crate's re-exports

use crate::common::*;
use quadmem::durability::{read_image, IMAGE_FORMAT_VERSION};
use quadmem::{Literal, StoreConfig};

#[test]
fn flags_contexts_and_namespaces_round_trip() {
    let mut fixture = TestStore::new();
    fixture.store.set_namespace("ex", "http://example.org/").unwrap();
    fixture
        .store
        .transaction(|txn| {
            txn.add(&triple("a", "p", "b"))?;
            txn.add_inferred(&triple("a", "q", "b"))?;
            txn.add(&Quad::new(
                ex("a"),
                ex("label"),
                Term::from(Literal::typed("7", "http://www.w3.org/2001/XMLSchema#integer")),
                Some(ex("g1")),
            ))?;
            Ok(())
        })
        .unwrap();

    let loaded = read_image(fixture.dir.path()).unwrap().unwrap();
    assert_eq!(loaded.header.format_version, IMAGE_FORMAT_VERSION);
    assert_eq!(loaded.image.len(), 3);

    fixture.reopen();
    let store = &fixture.store;
    assert_eq!(store.namespaces(), vec![("ex".to_string(), "http://example.org/".to_string())]);
    assert_eq!(store.context_ids().unwrap(), vec![ex("g1")]);
    let explicit = StatementPattern::any().explicit_only(true);
    assert_eq!(store.size_matching(&explicit).unwrap(), 2);
    let inferred: Vec<_> = store
        .scan(&StatementPattern::any().with_predicate(ex("q")))
        .unwrap()
        .collect();
    assert_eq!(inferred.len(), 1);
    assert!(!inferred[0].explicit);
}

#[test]
fn debounced_store_flushes_on_shutdown() {
    let mut fixture = TestStore::with_config(StoreConfig {
        sync_delay_ms: 60_000,
        ..StoreConfig::default()
    });
    fixture
        .store
        .transaction(|txn| txn.add(&triple("a", "p", "b")).map(|_| ()))
        .unwrap();
    assert!(read_image(fixture.dir.path()).unwrap().is_none());

    fixture.reopen();
    assert_eq!(fixture.store.size().unwrap(), 1);
}
