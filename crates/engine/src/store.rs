//! The quad store
//!
//! `Store` ties the layers together: the statement store and namespace
//! table, the transaction manager, the janitor, commit listeners and, for
//! persistent stores, the data file, the sync schedule and the directory
//! lock.
//!
//! # Lock order
//!
//! 1. structural read guard (transactions, read views, cursors)
//! 2. transaction lock
//! 3. statement store inner lock (never held across calls)
//!
//! The janitor takes the structural write guard. A thread holding a read
//! view must not wait on the janitor, e.g. via [`Store::clean_snapshots`].
//!
//! Transactions, read views and open cursors each hold a structural read
//! guard. Under the writer-preferring lock policy a thread holding one of
//! them must not ask the store for another ([`Store::scan`],
//! [`Store::size_matching`], [`Store::read_view`],
//! [`Store::begin_transaction`]): once the janitor waits for the write
//! side, the new request queues behind it and the thread deadlocks. Read
//! through the guard already held instead (`Transaction::scan`,
//! [`ReadView::scan`]).

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use quadmem_concurrency::{
    CommitOutcome, GuardedCursor, LockTracker, OpenGuard, RollbackOutcome, Transaction,
    TransactionManager, TransactionObserver, STRUCTURAL_LOCK_ALIAS,
};
use quadmem_core::{QuadError, ReadMode, Result, Term, INITIAL_SNAPSHOT};
use quadmem_durability::{read_image, ImageInfo, ImageStatement, ImageWriter, StoreImage};
use quadmem_storage::{CompactionStats, NamespaceStore, StatementPattern, StatementStore};
use tracing::{debug, error, info, warn};

use crate::config::{StoreConfig, SyncMode, CONFIG_FILE_NAME};
use crate::janitor::Janitor;
use crate::listener::{ChangeListeners, StoreChangeListener};
use crate::scheduler::SyncScheduler;
use crate::view::ReadView;

/// Lock file name placed in the store's data directory.
pub const LOCK_FILE_NAME: &str = "lock";

/// An in-memory RDF quad store with snapshot isolation
///
/// Created with [`Store::in_memory`] or [`Store::open`] and shared as an
/// `Arc<Store>`. All methods take `&self`.
pub struct Store {
    statements: Arc<StatementStore>,
    namespaces: NamespaceStore,
    manager: TransactionManager,
    tracker: Arc<LockTracker>,
    janitor: Janitor,
    listeners: ChangeListeners,
    config: StoreConfig,

    /// Data directory; `None` for in-memory stores
    data_dir: Option<PathBuf>,
    /// Data file writer; `None` when nothing is persisted
    writer: Option<ImageWriter>,
    /// Debounced sync timer, only for a positive `sync_delay_ms`
    scheduler: Option<SyncScheduler>,
    /// Exclusive lock on `<dir>/lock`, released at shutdown
    dir_lock: Mutex<Option<File>>,
    read_only: bool,

    /// Contents changed since the last successful sync
    dirty: AtomicBool,
    /// Serializes data file writes
    sync_lock: Mutex<()>,
    shut_down: AtomicBool,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("data_dir", &self.data_dir)
            .field("read_only", &self.read_only)
            .field("snapshot", &self.statements.current_snapshot())
            .field("shut_down", &self.shut_down.load(Ordering::Relaxed))
            .finish()
    }
}

/// Everything `assemble` needs besides the configuration
struct Parts {
    statements: StatementStore,
    namespaces: NamespaceStore,
    data_dir: Option<PathBuf>,
    writer: Option<ImageWriter>,
    dir_lock: Option<File>,
    read_only: bool,
}

impl Store {
    // ========================================================================
    // Opening
    // ========================================================================

    /// Create a volatile store with default settings
    pub fn in_memory() -> Result<Arc<Self>> {
        Self::in_memory_with_config(StoreConfig::in_memory())
    }

    /// Create a volatile store
    ///
    /// `persist` and `sync_delay_ms` are ignored.
    pub fn in_memory_with_config(config: StoreConfig) -> Result<Arc<Self>> {
        let store = Self::assemble(
            config,
            Parts {
                statements: StatementStore::new(),
                namespaces: NamespaceStore::new(),
                data_dir: None,
                writer: None,
                dir_lock: None,
                read_only: false,
            },
        )?;
        info!(target: "quadmem::store", "Opened in-memory store");
        Ok(store)
    }

    /// Open a persistent store in `path`
    ///
    /// Reads `quadmem.toml` from the directory, creating it with defaults
    /// if missing, then restores the data file if there is one.
    ///
    /// If another process holds the directory lock the store opens
    /// read-only: it restores and serves reads, but refuses transactions
    /// and never writes.
    ///
    /// # Errors
    /// - `InvalidInput` for a malformed config file
    /// - `Corruption` / `Serialization` for a damaged data file
    /// - `Io` if the directory cannot be used
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Arc<Self>> {
        let dir = path.as_ref();
        fs::create_dir_all(dir)?;
        let config_path = dir.join(CONFIG_FILE_NAME);
        StoreConfig::write_default_if_missing(&config_path)?;
        let config = StoreConfig::from_file(&config_path)?;
        Self::open_dir(dir, config, false)
    }

    /// Open a persistent store in `path` with an explicit configuration
    ///
    /// The configuration is written to `quadmem.toml` so a later
    /// [`Store::open`] picks up the same settings.
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: StoreConfig) -> Result<Arc<Self>> {
        let dir = path.as_ref();
        fs::create_dir_all(dir)?;
        Self::open_dir(dir, config, true)
    }

    fn open_dir(dir: &Path, config: StoreConfig, write_config: bool) -> Result<Arc<Self>> {
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(dir.join(LOCK_FILE_NAME))?;
        let (dir_lock, read_only) = match fs2::FileExt::try_lock_exclusive(&lock_file) {
            Ok(()) => (Some(lock_file), false),
            Err(e) => {
                warn!(
                    target: "quadmem::store",
                    path = %dir.display(),
                    error = %e,
                    "Data directory is locked by another process, opening read-only"
                );
                (None, true)
            }
        };

        if write_config && !read_only {
            config.write_to_file(&dir.join(CONFIG_FILE_NAME))?;
        }

        let writer = if config.persist && !read_only {
            let writer = ImageWriter::new(dir)?;
            if writer.cleanup_sync_file()? {
                warn!(
                    target: "quadmem::store",
                    path = %dir.display(),
                    "Removed sync file left by an interrupted write"
                );
            }
            Some(writer)
        } else {
            None
        };

        let statements = StatementStore::new();
        let namespaces = NamespaceStore::new();
        if config.persist {
            restore(dir, &statements, &namespaces)?;
        }

        let store = Self::assemble(
            config,
            Parts {
                statements,
                namespaces,
                data_dir: Some(dir.to_path_buf()),
                writer,
                dir_lock,
                read_only,
            },
        )?;
        info!(
            target: "quadmem::store",
            path = %dir.display(),
            read_only,
            snapshot = store.current_snapshot(),
            statements = store.statements.read().visible_count(store.current_snapshot()),
            "Opened store"
        );
        Ok(store)
    }

    fn assemble(config: StoreConfig, parts: Parts) -> Result<Arc<Self>> {
        let tracker = Arc::new(LockTracker::new(config.tracks_locks(), config.track_locks));
        let structural = config
            .lock_policy
            .build(STRUCTURAL_LOCK_ALIAS, Arc::clone(&tracker));
        let statements = Arc::new(parts.statements);
        let mut spawn_error = None;

        let store = Arc::new_cyclic(|weak: &Weak<Store>| {
            let observer: Weak<dyn TransactionObserver> = weak.clone();
            let manager = TransactionManager::new(
                Arc::clone(&statements),
                Arc::clone(&structural),
                Arc::clone(&tracker),
            )
            .with_observer(observer);

            let scheduler = match (config.sync_mode(), &parts.writer) {
                (SyncMode::Debounced(delay), Some(_)) => {
                    let target = weak.clone();
                    match SyncScheduler::spawn(delay, move || {
                        if let Some(store) = target.upgrade() {
                            store.background_sync();
                        }
                    }) {
                        Ok(scheduler) => Some(scheduler),
                        Err(e) => {
                            spawn_error = Some(e);
                            None
                        }
                    }
                }
                _ => None,
            };

            Store {
                janitor: Janitor::new(Arc::clone(&statements), structural),
                statements,
                namespaces: parts.namespaces,
                manager,
                tracker,
                listeners: ChangeListeners::default(),
                config,
                data_dir: parts.data_dir,
                writer: parts.writer,
                scheduler,
                dir_lock: Mutex::new(parts.dir_lock),
                read_only: parts.read_only,
                dirty: AtomicBool::new(false),
                sync_lock: Mutex::new(()),
                shut_down: AtomicBool::new(false),
            }
        });

        match spawn_error {
            Some(e) => {
                store.shut_down.store(true, Ordering::SeqCst);
                store.manager.close();
                Err(e)
            }
            None => Ok(store),
        }
    }

    // ========================================================================
    // State
    // ========================================================================

    /// Last committed snapshot
    pub fn current_snapshot(&self) -> u64 {
        self.statements.current_snapshot()
    }

    /// Check whether the store still accepts work
    pub fn is_open(&self) -> bool {
        !self.shut_down.load(Ordering::Acquire)
    }

    /// Check whether the store refuses writes
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Check whether the store writes a data file
    pub fn is_persistent(&self) -> bool {
        self.writer.is_some()
    }

    /// Data directory, `None` for in-memory stores
    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    /// Active configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Lock guards currently open, when tracking is enabled
    pub fn open_lock_guards(&self) -> Vec<OpenGuard> {
        self.tracker.open_guards()
    }

    fn check_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(QuadError::ShutDown)
        }
    }

    fn check_writable(&self) -> Result<()> {
        self.check_open()?;
        if self.read_only {
            return Err(QuadError::ReadOnly(
                "data directory is locked by another process".to_string(),
            ));
        }
        Ok(())
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Start a write transaction, waiting for the running one to finish
    ///
    /// A pending debounced sync is cancelled; the next commit schedules a
    /// new one.
    ///
    /// The transaction holds a structural read guard until it ends. Under
    /// the writer-preferring policy, do not call this while the same thread
    /// holds a read view or open cursor; see the module docs.
    ///
    /// # Errors
    /// - `ShutDown` once the store is shut down
    /// - `ReadOnly` for a read-only store
    /// - `LockInterrupted` if shutdown interrupts the wait
    pub fn begin_transaction(&self) -> Result<Transaction> {
        self.check_writable()?;
        if let Some(scheduler) = &self.scheduler {
            scheduler.cancel();
        }
        self.manager.begin()
    }

    /// Run `f` in a transaction
    ///
    /// Commits if `f` returns `Ok`, rolls back if it returns `Err`.
    ///
    /// ```text
    /// store.transaction(|txn| {
    ///     txn.add(&quad)?;
    ///     Ok(())
    /// })?;
    /// ```
    pub fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Transaction) -> Result<T>,
    {
        let mut txn = self.begin_transaction()?;
        match f(&mut txn) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(e) => {
                txn.rollback();
                Err(e)
            }
        }
    }

    /// Check whether a transaction is in flight
    pub fn is_transaction_active(&self) -> bool {
        self.manager.is_transaction_active()
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Scan the current snapshot
    ///
    /// The cursor keeps reading the snapshot that was current when it was
    /// opened. Holding it open holds the janitor off.
    ///
    /// Takes a fresh structural read guard. Under the writer-preferring
    /// policy a thread already holding a transaction, read view or cursor
    /// must read through that instead; see the module docs.
    pub fn scan(&self, pattern: &StatementPattern) -> Result<GuardedCursor> {
        self.check_open()?;
        let guard = self.manager.structural_lock().acquire_read()?;
        let snapshot = self.statements.current_snapshot();
        let cursor = self
            .statements
            .scan(pattern, snapshot, ReadMode::Committed);
        Ok(GuardedCursor::new(cursor, Arc::new(guard)))
    }

    /// Pin the current snapshot for several reads
    pub fn read_view(&self) -> Result<ReadView> {
        self.check_open()?;
        let guard = self.manager.structural_lock().acquire_read()?;
        Ok(ReadView::new(Arc::clone(&self.statements), guard))
    }

    /// Number of statements visible at the current snapshot
    pub fn size(&self) -> Result<usize> {
        self.check_open()?;
        let state = self.statements.read();
        Ok(state.visible_count(state.current_snapshot()))
    }

    /// Number of statements matching `pattern` at the current snapshot
    pub fn size_matching(&self, pattern: &StatementPattern) -> Result<usize> {
        Ok(self.scan(pattern)?.count())
    }

    /// Cardinality estimate for `pattern`
    ///
    /// Counts the candidates a scan would walk, so it is an upper bound.
    pub fn count_candidates(&self, pattern: &StatementPattern) -> Result<usize> {
        self.check_open()?;
        Ok(self.statements.count_candidates(pattern))
    }

    /// Named contexts with at least one statement at the current snapshot
    pub fn context_ids(&self) -> Result<Vec<Term>> {
        self.check_open()?;
        let state = self.statements.read();
        Ok(state.context_ids(state.current_snapshot()))
    }

    // ========================================================================
    // Namespaces
    // ========================================================================

    /// Namespace bound to `prefix`
    pub fn namespace(&self, prefix: &str) -> Option<String> {
        self.namespaces.get(prefix)
    }

    /// All prefix bindings, ordered by prefix
    pub fn namespaces(&self) -> Vec<(String, String)> {
        self.namespaces.list()
    }

    /// Bind `prefix` to `namespace`, returning the previous binding
    ///
    /// Not transactional: visible to every reader at once.
    pub fn set_namespace(&self, prefix: &str, namespace: &str) -> Result<Option<String>> {
        self.check_writable()?;
        let previous = self.namespaces.set(prefix, namespace);
        if previous.as_deref() != Some(namespace) {
            self.mark_dirty();
        }
        Ok(previous)
    }

    /// Remove the binding for `prefix`
    pub fn remove_namespace(&self, prefix: &str) -> Result<Option<String>> {
        self.check_writable()?;
        let previous = self.namespaces.remove(prefix);
        if previous.is_some() {
            self.mark_dirty();
        }
        Ok(previous)
    }

    /// Remove every prefix binding
    pub fn clear_namespaces(&self) -> Result<()> {
        self.check_writable()?;
        if !self.namespaces.is_empty() {
            self.namespaces.clear();
            self.mark_dirty();
        }
        Ok(())
    }

    // ========================================================================
    // Listeners
    // ========================================================================

    /// Register a listener for commits that change the store
    pub fn add_change_listener(&self, listener: Arc<dyn StoreChangeListener>) {
        self.listeners.add(listener);
    }

    /// Unregister a listener; returns whether it was registered
    pub fn remove_change_listener(&self, listener: &Arc<dyn StoreChangeListener>) -> bool {
        self.listeners.remove(listener)
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Write the data file if the contents changed since the last sync
    ///
    /// Returns `None` when there was nothing to write or the store is not
    /// persistent.
    pub fn sync(&self) -> Result<Option<ImageInfo>> {
        self.sync_inner()
    }

    fn sync_inner(&self) -> Result<Option<ImageInfo>> {
        let Some(writer) = &self.writer else {
            return Ok(None);
        };
        let _serial = self.sync_lock.lock();
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(None);
        }

        let (snapshot, image) = self.capture_image();
        match writer.write(snapshot, &image) {
            Ok(info) => {
                debug!(
                    target: "quadmem::sync",
                    snapshot,
                    statements = info.statements,
                    "Synced data file"
                );
                Ok(Some(info))
            }
            Err(e) => {
                self.dirty.store(true, Ordering::Release);
                error!(target: "quadmem::sync", error = %e, "Failed to write data file");
                Err(e.into())
            }
        }
    }

    fn background_sync(&self) {
        if let Err(e) = self.sync_inner() {
            warn!(target: "quadmem::sync", error = %e, "Background sync failed");
        }
    }

    fn capture_image(&self) -> (u64, StoreImage) {
        let state = self.statements.read();
        let snapshot = state.current_snapshot();
        let statements = state
            .visible_quads(snapshot)
            .into_iter()
            .map(|(quad, explicit)| ImageStatement::new(quad, explicit))
            .collect();
        drop(state);
        let image = StoreImage {
            namespaces: self.namespaces.list(),
            statements,
        };
        (snapshot, image)
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
        self.schedule_sync();
    }

    fn schedule_sync(&self) {
        if self.writer.is_none() {
            return;
        }
        match self.config.sync_mode() {
            SyncMode::Immediate => self.background_sync(),
            SyncMode::Debounced(_) => {
                if let Some(scheduler) = &self.scheduler {
                    scheduler.schedule();
                }
            }
            SyncMode::AtShutdown => {}
        }
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Run a janitor pass on the calling thread
    ///
    /// Waits for every open transaction, read view and cursor.
    pub fn clean_snapshots(&self) -> Result<CompactionStats> {
        self.check_open()?;
        self.janitor.clean_now()
    }

    /// Stop the store
    ///
    /// Refuses new work, interrupts threads blocked on store locks, stops
    /// the background threads, writes the data file one last time and
    /// releases the directory lock. Calling it again does nothing.
    ///
    /// An open transaction can no longer commit; dropping it rolls it back.
    pub fn shutdown(&self) -> Result<()> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.manager.close();
        if let Some(scheduler) = &self.scheduler {
            scheduler.shutdown();
        }
        self.janitor.shutdown();
        if let Some(stats) = self.janitor.try_clean_now() {
            debug!(
                target: "quadmem::store",
                reclaimed = stats.reclaimed,
                "Final janitor pass"
            );
        }

        for guard in self.tracker.open_guards() {
            warn!(
                target: "quadmem::store",
                id = guard.id,
                lock = %guard.alias,
                mode = ?guard.mode,
                thread = %guard.thread,
                backtrace = guard.backtrace.as_deref().unwrap_or("<not captured>"),
                "Lock guard still open at shutdown"
            );
        }

        let synced = self.sync_inner();

        if let Some(lock_file) = self.dir_lock.lock().take() {
            if let Err(e) = fs2::FileExt::unlock(&lock_file) {
                warn!(target: "quadmem::store", error = %e, "Failed to release directory lock");
            }
        }

        info!(
            target: "quadmem::store",
            path = ?self.data_dir,
            snapshot = self.current_snapshot(),
            "Store shut down"
        );
        synced.map(|_| ())
    }
}

impl TransactionObserver for Store {
    fn committed(&self, outcome: &CommitOutcome) {
        let change = outcome.change();
        // Flag flips close a version without adding or removing a statement
        if !change.is_empty() || outcome.needs_cleanup() {
            self.dirty.store(true, Ordering::Release);
            self.schedule_sync();
        }
        self.listeners.notify(&change);
        if outcome.needs_cleanup() {
            self.janitor.trigger();
        }
    }

    fn rolled_back(&self, outcome: &RollbackOutcome) {
        // Re-arm a debounced sync cancelled by `begin_transaction`
        if self.dirty.load(Ordering::Acquire) {
            self.schedule_sync();
        }
        if outcome.needs_cleanup() {
            self.janitor.trigger();
        }
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(target: "quadmem::store", error = %e, "Shutdown during drop failed");
        }
    }
}

/// Load the data file in `dir`, if any, into empty stores
fn restore(dir: &Path, statements: &StatementStore, namespaces: &NamespaceStore) -> Result<()> {
    let Some(loaded) = read_image(dir)? else {
        return Ok(());
    };
    let snapshot = loaded.snapshot();
    let count = loaded.image.len();
    {
        let mut state = statements.write();
        for statement in loaded.image.statements {
            let (quad, explicit) = statement.into_parts();
            state.insert_quad(&quad, explicit, INITIAL_SNAPSHOT)?;
        }
        state.restore_snapshot(snapshot);
    }
    namespaces.replace_all(loaded.image.namespaces);
    info!(
        target: "quadmem::store",
        path = %dir.display(),
        snapshot,
        statements = count,
        "Restored data file"
    );
    Ok(())
}
