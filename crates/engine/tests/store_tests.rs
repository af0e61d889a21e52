//! Store-level transaction semantics
//!
//! Exercises the public `Store` API end to end on in-memory stores.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use quadmem_engine::{
    Literal, LockPolicy, Quad, QuadError, StatementPattern, Store, StoreChange,
    StoreChangeListener, StoreConfig, Term,
};

fn ex(local: &str) -> Term {
    Term::iri(format!("http://example.org/{}", local))
}

fn wait_for(mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done() {
        if Instant::now() > deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    true
}

mod scenario {
    use super::*;

    #[test]
    fn insert_scan_remove_across_snapshots() {
        let store = Store::in_memory().unwrap();
        let quad = Quad::triple(ex("a"), ex("p"), ex("b"));
        let pattern = StatementPattern::any()
            .with_subject(ex("a"))
            .with_predicate(ex("p"));

        let mut txn = store.begin_transaction().unwrap();
        assert_eq!(txn.snapshot(), 2);
        txn.add(&quad).unwrap();
        let outcome = txn.commit().unwrap();
        assert_eq!(outcome.snapshot, 2);
        assert_eq!(store.current_snapshot(), 2);

        let at_two = store.read_view().unwrap();
        let found: Vec<_> = at_two.scan(&pattern).collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].object(), &ex("b"));

        let mut txn = store.begin_transaction().unwrap();
        assert!(txn.remove(&quad).unwrap());
        assert_eq!(txn.commit().unwrap().snapshot, 3);
        assert_eq!(store.current_snapshot(), 3);

        // The pinned view still reads snapshot 2
        let still: Vec<_> = at_two.scan(&pattern).collect();
        assert_eq!(still.len(), 1);
        assert_eq!(still[0].object(), &ex("b"));
        assert_eq!(still[0].till, 3);

        assert_eq!(store.scan(&pattern).unwrap().count(), 0);
        assert_eq!(store.size().unwrap(), 0);
    }

    #[test]
    fn empty_commit_keeps_snapshot() {
        let store = Store::in_memory().unwrap();
        let outcome = store.begin_transaction().unwrap().commit().unwrap();
        assert_eq!(outcome.snapshot, 1);
        assert!(outcome.change().is_empty());
        assert_eq!(store.current_snapshot(), 1);
    }
}

mod semantics {
    use super::*;

    #[test]
    fn snapshots_increase_by_one_per_commit() {
        let store = Store::in_memory().unwrap();
        let mut previous = store.current_snapshot();
        for i in 0..10 {
            let snapshot = store
                .transaction(|txn| {
                    txn.add(&Quad::triple(ex("s"), ex("p"), Term::literal(i.to_string())))?;
                    Ok(txn.snapshot())
                })
                .unwrap();
            assert_eq!(snapshot, previous + 1);
            assert_eq!(store.current_snapshot(), snapshot);
            previous = snapshot;
        }
    }

    #[test]
    fn re_adding_is_idempotent() {
        let store = Store::in_memory().unwrap();
        let quad = Quad::triple(ex("a"), ex("p"), ex("b"));
        store.transaction(|txn| txn.add(&quad).map(|_| ())).unwrap();

        let mut txn = store.begin_transaction().unwrap();
        assert!(txn.add(&quad).unwrap().is_none());
        assert_eq!(txn.pending_count(), 0);
        let outcome = txn.commit().unwrap();
        assert_eq!(outcome.snapshot, 2, "nothing pending, no new snapshot");
        assert_eq!(store.size().unwrap(), 1);
    }

    #[test]
    fn re_adding_within_one_transaction() {
        let store = Store::in_memory().unwrap();
        let quad = Quad::triple(ex("a"), ex("p"), ex("b"));
        let mut txn = store.begin_transaction().unwrap();
        assert!(txn.add(&quad).unwrap().is_some());
        assert!(txn.add(&quad).unwrap().is_none());
        txn.commit().unwrap();
        assert_eq!(store.size().unwrap(), 1);
    }

    #[test]
    fn upgrade_inferred_to_explicit() {
        let store = Store::in_memory().unwrap();
        let quad = Quad::triple(ex("a"), ex("p"), ex("b"));
        store
            .transaction(|txn| txn.add_inferred(&quad).map(|_| ()))
            .unwrap();
        let before = store.read_view().unwrap();

        let outcome = store
            .transaction(|txn| {
                assert!(txn.add(&quad)?.is_some());
                Ok(())
            })
            .map(|_| store.current_snapshot())
            .unwrap();
        assert_eq!(outcome, 3);

        let old: Vec<_> = before.scan(&StatementPattern::for_quad(&quad)).collect();
        assert_eq!(old.len(), 1);
        assert!(!old[0].explicit);
        assert_eq!(old[0].till, 3);

        let new: Vec<_> = store
            .scan(&StatementPattern::for_quad(&quad))
            .unwrap()
            .collect();
        assert_eq!(new.len(), 1);
        assert!(new[0].explicit);
        assert_eq!(new[0].since, 3);
    }

    #[test]
    fn downgrade_explicit_to_inferred() {
        let store = Store::in_memory().unwrap();
        let quad = Quad::triple(ex("a"), ex("p"), ex("b"));
        store.transaction(|txn| txn.add(&quad).map(|_| ())).unwrap();

        store
            .transaction(|txn| {
                assert!(txn.remove(&quad)?);
                assert!(txn.add_inferred(&quad)?.is_some());
                Ok(())
            })
            .unwrap();

        let explicit_only = StatementPattern::for_quad(&quad).explicit_only(true);
        assert_eq!(store.size_matching(&explicit_only).unwrap(), 0);
        assert_eq!(store.size().unwrap(), 1);
    }

    #[test]
    fn zombie_entries_never_become_visible() {
        let store = Store::in_memory().unwrap();
        let quad = Quad::triple(ex("a"), ex("p"), ex("b"));
        let outcome = {
            let mut txn = store.begin_transaction().unwrap();
            txn.add(&quad).unwrap();
            assert!(txn.remove(&quad).unwrap());
            assert_eq!(txn.size().unwrap(), 0);
            txn.commit().unwrap()
        };
        assert!(!outcome.statements_added);
        assert!(outcome.needs_cleanup());
        assert_eq!(store.size().unwrap(), 0);
        assert_eq!(store.scan(&StatementPattern::any()).unwrap().count(), 0);
    }

    #[test]
    fn remove_with_wrong_flag_is_refused() {
        let store = Store::in_memory().unwrap();
        let quad = Quad::triple(ex("a"), ex("p"), ex("b"));
        store.transaction(|txn| txn.add(&quad).map(|_| ())).unwrap();
        let mut txn = store.begin_transaction().unwrap();
        assert!(!txn.remove_inferred(&quad).unwrap());
        assert!(!txn.remove(&Quad::triple(ex("a"), ex("p"), ex("c"))).unwrap());
        txn.commit().unwrap();
        assert_eq!(store.size().unwrap(), 1);
    }

    #[test]
    fn remove_matching_pattern() {
        let store = Store::in_memory().unwrap();
        store
            .transaction(|txn| {
                for o in ["x", "y", "z"] {
                    txn.add(&Quad::triple(ex("a"), ex("p"), ex(o)))?;
                }
                txn.add(&Quad::triple(ex("b"), ex("p"), ex("x")))?;
                Ok(())
            })
            .unwrap();
        store
            .transaction(|txn| {
                assert!(txn.remove_matching(&StatementPattern::any().with_subject(ex("a")), true)?);
                Ok(())
            })
            .unwrap();
        assert_eq!(store.size().unwrap(), 1);
    }

    #[test]
    fn uncommitted_changes_are_private() {
        let store = Store::in_memory().unwrap();
        let quad = Quad::triple(ex("a"), ex("p"), ex("b"));
        let mut txn = store.begin_transaction().unwrap();
        txn.add(&quad).unwrap();
        assert_eq!(txn.size().unwrap(), 1);
        assert_eq!(store.size().unwrap(), 0);
        assert_eq!(store.scan(&StatementPattern::any()).unwrap().count(), 0);
        txn.rollback();
        assert_eq!(store.size().unwrap(), 0);
    }

    #[test]
    fn dropping_a_transaction_rolls_back() {
        let store = Store::in_memory().unwrap();
        {
            let mut txn = store.begin_transaction().unwrap();
            txn.add(&Quad::triple(ex("a"), ex("p"), ex("b"))).unwrap();
        }
        assert!(!store.is_transaction_active());
        assert_eq!(store.size().unwrap(), 0);
        assert_eq!(store.current_snapshot(), 1);
    }

    #[test]
    fn literal_subject_is_rejected() {
        let store = Store::in_memory().unwrap();
        let err = store
            .transaction(|txn| {
                txn.add(&Quad::triple(Term::literal("x"), ex("p"), ex("b")))?;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, QuadError::InvalidInput(_)));
        assert_eq!(store.current_snapshot(), 1);
    }
}

mod queries {
    use super::*;

    fn populated() -> Arc<Store> {
        let store = Store::in_memory().unwrap();
        store
            .transaction(|txn| {
                txn.add(&Quad::triple(ex("a"), ex("name"), Term::from(Literal::lang("Ann", "en"))))?;
                txn.add(&Quad::new(ex("a"), ex("knows"), ex("b"), Some(ex("g1"))))?;
                txn.add(&Quad::new(ex("b"), ex("knows"), ex("c"), Some(ex("g2"))))?;
                txn.add_inferred(&Quad::new(ex("a"), ex("knows"), ex("c"), Some(ex("g2"))))?;
                Ok(())
            })
            .unwrap();
        store
    }

    #[test]
    fn size_and_size_matching() {
        let store = populated();
        assert_eq!(store.size().unwrap(), 4);
        let knows = StatementPattern::any().with_predicate(ex("knows"));
        assert_eq!(store.size_matching(&knows).unwrap(), 3);
        assert_eq!(store.size_matching(&knows.clone().explicit_only(true)).unwrap(), 2);
        assert!(store.count_candidates(&knows).unwrap() >= 3);
    }

    #[test]
    fn context_restrictions() {
        let store = populated();
        let default_graph = StatementPattern::any().in_context(None);
        assert_eq!(store.size_matching(&default_graph).unwrap(), 1);

        let g2 = StatementPattern::any().in_context(Some(ex("g2")));
        assert_eq!(store.size_matching(&g2).unwrap(), 2);

        let unknown = StatementPattern::any().in_context(Some(ex("nowhere")));
        assert_eq!(store.size_matching(&unknown).unwrap(), 0);

        let mut contexts = store.context_ids().unwrap();
        contexts.sort();
        assert_eq!(contexts, vec![ex("g1"), ex("g2")]);
    }

    #[test]
    fn unknown_term_scan_is_empty_not_error() {
        let store = populated();
        let mut cursor = store
            .scan(&StatementPattern::any().with_object(Term::literal("missing")))
            .unwrap();
        assert!(cursor.next().is_none());
        assert!(cursor.is_closed());
    }

    #[test]
    fn emptied_context_disappears_from_context_ids() {
        let store = populated();
        store
            .transaction(|txn| {
                txn.remove(&Quad::new(ex("a"), ex("knows"), ex("b"), Some(ex("g1"))))?;
                Ok(())
            })
            .unwrap();
        assert_eq!(store.context_ids().unwrap(), vec![ex("g2")]);
    }

    #[test]
    fn namespaces_are_not_transactional() {
        let store = Store::in_memory().unwrap();
        let txn = store.begin_transaction().unwrap();
        store.set_namespace("ex", "http://example.org/").unwrap();
        txn.rollback();
        assert_eq!(store.namespace("ex").as_deref(), Some("http://example.org/"));
        assert_eq!(store.remove_namespace("ex").unwrap().as_deref(), Some("http://example.org/"));
        store.set_namespace("a", "http://a/").unwrap();
        store.clear_namespaces().unwrap();
        assert!(store.namespaces().is_empty());
    }
}

mod listeners {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        changes: Mutex<Vec<StoreChange>>,
    }

    impl StoreChangeListener for Recorder {
        fn store_changed(&self, change: &StoreChange) {
            self.changes.lock().push(*change);
        }
    }

    #[test]
    fn listeners_see_added_and_removed() {
        let store = Store::in_memory().unwrap();
        let recorder = Arc::new(Recorder::default());
        store.add_change_listener(recorder.clone());
        let quad = Quad::triple(ex("a"), ex("p"), ex("b"));

        store.transaction(|txn| txn.add(&quad).map(|_| ())).unwrap();
        store.transaction(|txn| txn.remove(&quad).map(|_| ())).unwrap();
        store.begin_transaction().unwrap().commit().unwrap();
        let mut txn = store.begin_transaction().unwrap();
        txn.add(&quad).unwrap();
        txn.rollback();

        let changes = recorder.changes.lock().clone();
        assert_eq!(
            changes,
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
    fn closure_listener_can_read_the_store() {
        let store = Store::in_memory().unwrap();
        let seen = Arc::new(AtomicUsize::new(0));
        let weak = Arc::downgrade(&store);
        let counter = Arc::clone(&seen);
        store.add_change_listener(Arc::new(move |_: &StoreChange| {
            if let Some(store) = weak.upgrade() {
                counter.store(store.size().unwrap(), Ordering::SeqCst);
            }
        }));
        store
            .transaction(|txn| txn.add(&Quad::triple(ex("a"), ex("p"), ex("b"))).map(|_| ()))
            .unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn removed_listener_is_silent() {
        let store = Store::in_memory().unwrap();
        let recorder = Arc::new(Recorder::default());
        let listener: Arc<dyn StoreChangeListener> = recorder.clone();
        store.add_change_listener(Arc::clone(&listener));
        assert!(store.remove_change_listener(&listener));
        store
            .transaction(|txn| txn.add(&Quad::triple(ex("a"), ex("p"), ex("b"))).map(|_| ()))
            .unwrap();
        assert!(recorder.changes.lock().is_empty());
    }
}

mod janitor {
    use super::*;

    #[test]
    fn background_pass_resets_snapshots() {
        let store = Store::in_memory().unwrap();
        let keep = Quad::triple(ex("a"), ex("p"), ex("keep"));
        let drop_me = Quad::triple(ex("a"), ex("p"), ex("drop"));
        store
            .transaction(|txn| {
                txn.add(&keep)?;
                txn.add(&drop_me)?;
                Ok(())
            })
            .unwrap();
        store.transaction(|txn| txn.remove(&drop_me).map(|_| ())).unwrap();

        assert!(wait_for(|| store.current_snapshot() == 1));
        assert_eq!(store.size().unwrap(), 1);
        let survivors: Vec<_> = store.scan(&StatementPattern::any()).unwrap().collect();
        assert_eq!(survivors[0].since, 1);
        assert_eq!(
            store
                .count_candidates(&StatementPattern::any().with_subject(ex("a")))
                .unwrap(),
            1
        );
    }

    #[test]
    fn read_view_holds_the_janitor_off() {
        let store = Store::in_memory().unwrap();
        let quad = Quad::triple(ex("a"), ex("p"), ex("b"));
        store.transaction(|txn| txn.add(&quad).map(|_| ())).unwrap();
        let view = store.read_view().unwrap();
        store.transaction(|txn| txn.remove(&quad).map(|_| ())).unwrap();

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(store.current_snapshot(), 3);
        assert!(view.contains(&quad));
        assert_eq!(view.size(), 1);

        drop(view);
        assert!(wait_for(|| store.current_snapshot() == 1));
        assert_eq!(store.size().unwrap(), 0);
    }

    #[test]
    fn view_keeps_reading_while_the_janitor_waits_write_preferring() {
        let store = Store::in_memory_with_config(StoreConfig {
            lock_policy: LockPolicy::WritePreferring,
            ..StoreConfig::in_memory()
        })
        .unwrap();
        let keep = Quad::triple(ex("a"), ex("p"), ex("keep"));
        let gone = Quad::triple(ex("a"), ex("p"), ex("gone"));
        store
            .transaction(|txn| {
                txn.add(&keep)?;
                txn.add(&gone)?;
                Ok(())
            })
            .unwrap();
        let view = store.read_view().unwrap();
        store.transaction(|txn| txn.remove(&gone).map(|_| ())).unwrap();

        // The janitor now queues for the write side behind the view; reads
        // through the guard the view already holds still proceed
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(store.current_snapshot(), 3);
        assert_eq!(view.scan(&StatementPattern::any()).count(), 2);
        assert!(view.contains(&gone));
        assert_eq!(view.size_matching(&StatementPattern::for_quad(&keep)), 1);
        assert_eq!(store.size().unwrap(), 1);

        drop(view);
        assert!(wait_for(|| store.current_snapshot() == 1));
        assert_eq!(store.size_matching(&StatementPattern::any()).unwrap(), 1);
    }

    #[test]
    fn clean_snapshots_runs_synchronously() {
        let store = Store::in_memory().unwrap();
        store
            .transaction(|txn| txn.add(&Quad::triple(ex("a"), ex("p"), ex("b"))).map(|_| ()))
            .unwrap();
        let stats = store.clean_snapshots().unwrap();
        assert_eq!(stats.reclaimed, 0);
        assert_eq!(stats.retained, 1);
        assert_eq!(store.current_snapshot(), 1);
        assert_eq!(store.size().unwrap(), 1);
    }
}

mod shutdown {
    use super::*;
    use std::sync::Barrier;

    #[test]
    fn open_transaction_cannot_commit_after_shutdown() {
        let store = Store::in_memory().unwrap();
        let mut txn = store.begin_transaction().unwrap();
        txn.add(&Quad::triple(ex("a"), ex("p"), ex("b"))).unwrap();
        store.shutdown().unwrap();

        assert!(matches!(
            txn.add(&Quad::triple(ex("a"), ex("p"), ex("c"))),
            Err(QuadError::TransactionNotActive(_))
        ));
        assert!(matches!(txn.commit(), Err(QuadError::TransactionNotActive(_))));
    }

    #[test]
    fn shutdown_releases_blocked_begin() {
        let store = Store::in_memory().unwrap();
        let txn = store.begin_transaction().unwrap();
        let barrier = Arc::new(Barrier::new(2));

        let waiter = {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                store.begin_transaction().map(|_| ())
            })
        };
        barrier.wait();
        std::thread::sleep(Duration::from_millis(50));
        store.shutdown().unwrap();
        drop(txn);

        let result = waiter.join().unwrap();
        assert!(matches!(
            result,
            Err(QuadError::ShutDown) | Err(QuadError::LockInterrupted { .. })
        ));
    }

    #[test]
    fn tracked_guards_are_listed() {
        let config = StoreConfig {
            track_locks: true,
            ..StoreConfig::in_memory()
        };
        let store = Store::in_memory_with_config(config).unwrap();
        let view = store.read_view().unwrap();
        let open = store.open_lock_guards();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].alias, "statements");
        assert!(open[0].backtrace.is_some());
        drop(view);
        assert!(store.open_lock_guards().is_empty());
    }
}
