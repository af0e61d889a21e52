//! Snapshot visibility under arbitrary transaction sequences
//!
//! A view taken right after a commit must keep returning exactly what the
//! transaction saw just before committing, no matter what later
//! transactions do.

use std::collections::BTreeSet;

use crate::common::*;
use proptest::prelude::*;
use quadmem::{ReadView, Transaction};

#[derive(Debug, Clone)]
enum Op {
    Add { quad: usize, explicit: bool },
    Remove { quad: usize, explicit: bool },
    RemoveSubject { subject: usize, explicit: bool },
}

#[derive(Debug, Clone)]
struct Batch {
    ops: Vec<Op>,
    commit: bool,
}

fn universe() -> Vec<Quad> {
    let mut quads = Vec::new();
    for s in 0..3 {
        for o in 0..2 {
            quads.push(triple(&format!("s{}", s), "p", &format!("o{}", o)));
        }
        quads.push(Quad::new(
            ex(&format!("s{}", s)),
            ex("p"),
            Term::literal("x"),
            Some(ex("g")),
        ));
    }
    quads
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0usize..9, any::<bool>()).prop_map(|(quad, explicit)| Op::Add { quad, explicit }),
        2 => (0usize..9, any::<bool>()).prop_map(|(quad, explicit)| Op::Remove { quad, explicit }),
        1 => (0usize..3, any::<bool>())
            .prop_map(|(subject, explicit)| Op::RemoveSubject { subject, explicit }),
    ]
}

fn batch() -> impl Strategy<Value = Batch> {
    (prop::collection::vec(op(), 1..8), prop::bool::weighted(0.8))
        .prop_map(|(ops, commit)| Batch { ops, commit })
}

fn apply(txn: &mut Transaction, universe: &[Quad], op: &Op) {
    match *op {
        Op::Add { quad, explicit } => {
            txn.add_statement(&universe[quad], explicit).unwrap();
        }
        Op::Remove { quad, explicit } => {
            txn.remove_statement(&universe[quad], explicit).unwrap();
        }
        Op::RemoveSubject { subject, explicit } => {
            let pattern = StatementPattern::any().with_subject(ex(&format!("s{}", subject)));
            txn.remove_matching(&pattern, explicit).unwrap();
        }
    }
}

type Contents = (BTreeSet<String>, BTreeSet<String>);

fn all_and_explicit() -> (StatementPattern, StatementPattern) {
    let all = StatementPattern::any();
    let explicit = all.clone().explicit_only(true);
    (all, explicit)
}

fn view_contents(view: &ReadView) -> Contents {
    let (all, explicit) = all_and_explicit();
    (quads(view.scan(&all)), quads(view.scan(&explicit)))
}

fn txn_contents(txn: &Transaction) -> Contents {
    let (all, explicit) = all_and_explicit();
    (
        quads(txn.scan(&all).unwrap()),
        quads(txn.scan(&explicit).unwrap()),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_views_keep_their_snapshot(batches in prop::collection::vec(batch(), 1..10)) {
        let universe = universe();
        let store = Store::in_memory().unwrap();
        // Pinning the initial snapshot keeps the janitor from renumbering
        // snapshots while the sequence runs
        let anchor = store.read_view().unwrap();
        let mut views: Vec<(ReadView, Contents)> =
            vec![(anchor, (BTreeSet::new(), BTreeSet::new()))];
        let mut last_snapshot = store.current_snapshot();

        for batch in &batches {
            let before = quads(store.scan(&StatementPattern::any()).unwrap());
            let mut txn = store.begin_transaction().unwrap();
            for op in &batch.ops {
                apply(&mut txn, &universe, op);
            }
            let pending = txn_contents(&txn);

            if batch.commit {
                let outcome = txn.commit().unwrap();
                prop_assert!(outcome.snapshot >= last_snapshot);
                last_snapshot = outcome.snapshot;
                let view = store.read_view().unwrap();
                prop_assert_eq!(view.snapshot(), outcome.snapshot);
                prop_assert_eq!(&view_contents(&view), &pending);
                prop_assert_eq!(view.size(), pending.0.len());
                views.push((view, pending));
            } else {
                txn.rollback();
                let after = quads(store.scan(&StatementPattern::any()).unwrap());
                prop_assert_eq!(after, before);
            }

            for (view, expected) in &views {
                prop_assert_eq!(&view_contents(view), expected);
            }
        }

        // Releasing the views lets compaction renumber; contents must not change
        let latest = quads(store.scan(&StatementPattern::any()).unwrap());
        drop(views);
        store.clean_snapshots().unwrap();
        prop_assert_eq!(store.current_snapshot(), 1);
        prop_assert_eq!(quads(store.scan(&StatementPattern::any()).unwrap()), latest);
    }
}
