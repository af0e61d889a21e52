//! Random explicit-only workloads checked against a set model

use std::collections::BTreeSet;

use crate::common::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SUBJECTS: usize = 6;
const OBJECTS: usize = 4;

fn random_quad(rng: &mut StdRng) -> Quad {
    triple(
        &format!("s{}", rng.gen_range(0..SUBJECTS)),
        "p",
        &format!("o{}", rng.gen_range(0..OBJECTS)),
    )
}

fn run_workload(seed: u64, store: &Store) -> BTreeSet<String> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut committed: BTreeSet<String> = BTreeSet::new();

    for _ in 0..60 {
        let mut model = committed.clone();
        let mut txn = store.begin_transaction().unwrap();
        for _ in 0..rng.gen_range(1..6) {
            let quad = random_quad(&mut rng);
            if rng.gen_bool(0.6) {
                let added = txn.add(&quad).unwrap().is_some();
                assert_eq!(added, model.insert(quad.to_string()));
            } else {
                let removed = txn.remove(&quad).unwrap();
                assert_eq!(removed, model.remove(&quad.to_string()));
            }
        }
        assert_eq!(txn.size().unwrap(), model.len());

        if rng.gen_bool(0.75) {
            txn.commit().unwrap();
            committed = model;
        } else {
            txn.rollback();
        }
        assert_eq!(quads(store.scan(&StatementPattern::any()).unwrap()), committed);
        assert_eq!(store.size().unwrap(), committed.len());
    }
    committed
}

#[test]
fn random_workloads_match_model() {
    for seed in [1, 7, 42, 2024] {
        let store = Store::in_memory().unwrap();
        run_workload(seed, &store);
    }
}

#[test]
fn random_workload_survives_reopen() {
    let mut fixture = TestStore::new();
    let expected = run_workload(99, &fixture.store);
    fixture.reopen();
    assert_eq!(
        quads(fixture.store.scan(&StatementPattern::any()).unwrap()),
        expected
    );
}

#[test]
fn random_workload_with_background_compaction() {
    let store = Store::in_memory().unwrap();
    let expected = run_workload(5, &store);
    store.clean_snapshots().unwrap();
    assert_eq!(store.current_snapshot(), 1);
    assert_eq!(quads(store.scan(&StatementPattern::any()).unwrap()), expected);
    assert_eq!(store.size().unwrap(), expected.len());
}
