//! Partitioned prompt storage with live change subscriptions.
//!
//! [`RemoteStore`] is the adapter every client talks to. It owns the
//! identity session of one client (device) and a handle to the shared
//! backend, which is either configured (an open [`LocalDb`] plus its
//! listener registry) or unconfigured, in which case every operation fails
//! fast with [`StoreError::StoreUnavailable`].
//!
//! Several clients can share one backend through [`RemoteStore::attach_device`];
//! a write made by any of them is pushed to every subscriber of the written
//! partition as a full, newest-first snapshot.
//!
//! ```no_run
//! use prompt_shelf::config::StoreConfig;
//! use prompt_shelf::prompt_model::{Category, PromptRecord};
//! use prompt_shelf::remote_store::RemoteStore;
//!
//! let store = RemoteStore::open(Some(StoreConfig::new("prompts.lmdb")));
//! store.sign_in()?;
//! let partition = store.resolve_partition(None)?;
//!
//! let _subscription = store.subscribe(&partition, |items| {
//!     println!("{} prompts", items.len());
//! })?;
//!
//! let mut record = PromptRecord::new(Category::Style);
//! record.versions[0].prompt = "oil painting, {{var}}".to_string();
//! let id = store.save(&partition, record)?;
//! store.delete(&partition, &id)?;
//! # Ok::<(), prompt_shelf::error::StoreError>(())
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};

use chrono::Utc;
use log::{debug, info, warn};
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::identity::{self, Identity, DEFAULT_DEVICE};
use crate::local_db_state::{Collection, LocalDb};
use crate::partition::{user_state_key, Partition};
use crate::prompt_model::{PromptRecord, Settings, UserState};

type Listener = Arc<dyn Fn(&[PromptRecord]) + Send + Sync>;

struct ListenerEntry {
    id: u64,
    partition: Partition,
    callback: Listener,
}

struct Backend {
    db: LocalDb,
    listeners: Mutex<Vec<ListenerEntry>>,
    next_listener: AtomicU64,
    // Serializes writes with their fan-out so snapshots reach listeners in
    // commit order.
    write_lock: Mutex<()>,
}

impl Backend {
    fn new(db: LocalDb) -> Self {
        Self {
            db,
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
            write_lock: Mutex::new(()),
        }
    }

    fn snapshot(&self, partition: &Partition) -> StoreResult<Vec<PromptRecord>> {
        let mut items: Vec<PromptRecord> =
            self.db.list(Collection::Prompts, &partition.prompts_prefix())?;
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    fn listeners_for(&self, partition: &Partition) -> Vec<Listener> {
        lock(&self.listeners)
            .iter()
            .filter(|entry| &entry.partition == partition)
            .map(|entry| Arc::clone(&entry.callback))
            .collect()
    }

    /// Pushes the current snapshot of `partition` to its listeners. Must be
    /// called with `write_lock` held.
    fn notify(&self, partition: &Partition) {
        let listeners = self.listeners_for(partition);
        if listeners.is_empty() {
            return;
        }
        match self.snapshot(partition) {
            Ok(items) => {
                debug!("Notifying {} listener(s) of {partition}", listeners.len());
                for listener in listeners {
                    listener(items.as_slice());
                }
            }
            Err(e) => warn!("Could not read snapshot of {partition} for listeners: {e}"),
        }
    }

    fn remove_listener(&self, id: u64) {
        lock(&self.listeners).retain(|entry| entry.id != id);
    }
}

enum StoreHandle {
    Configured(Arc<Backend>),
    Unconfigured(String),
}

/// Handle returned by [`RemoteStore::subscribe`]. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    partition: Partition,
    backend: Weak<Backend>,
}

impl Subscription {
    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    pub fn unsubscribe(self) {
        // Drop does the work.
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(backend) = self.backend.upgrade() {
            backend.remove_listener(self.id);
            debug!("Listener {} on {} removed", self.id, self.partition);
        }
    }
}

pub struct RemoteStore {
    handle: RwLock<StoreHandle>,
    session: Mutex<Option<Identity>>,
    device: String,
}

impl RemoteStore {
    /// Opens the backend described by `config`.
    ///
    /// Never fails: a missing configuration or an environment that cannot be
    /// opened leaves the store unconfigured.
    pub fn open(config: Option<StoreConfig>) -> Self {
        let handle = match config {
            None => StoreHandle::Unconfigured("store configuration is missing".to_string()),
            Some(config) => match LocalDb::open(&config) {
                Ok(db) => StoreHandle::Configured(Arc::new(Backend::new(db))),
                Err(e) => {
                    warn!("Failed to open prompt store at {}: {e}", config.path.display());
                    StoreHandle::Unconfigured(format!("could not open store: {e}"))
                }
            },
        };
        Self::with_handle(handle, DEFAULT_DEVICE)
    }

    pub fn unconfigured(reason: impl Into<String>) -> Self {
        Self::with_handle(StoreHandle::Unconfigured(reason.into()), DEFAULT_DEVICE)
    }

    fn with_handle(handle: StoreHandle, device: &str) -> Self {
        Self {
            handle: RwLock::new(handle),
            session: Mutex::new(None),
            device: device.to_string(),
        }
    }

    /// Another client of the same backend with its own identity slot and no
    /// session yet.
    pub fn attach_device(&self, device: &str) -> RemoteStore {
        let handle = match &*read(&self.handle) {
            StoreHandle::Configured(backend) => StoreHandle::Configured(Arc::clone(backend)),
            StoreHandle::Unconfigured(reason) => StoreHandle::Unconfigured(reason.clone()),
        };
        Self::with_handle(handle, device)
    }

    pub fn is_configured(&self) -> bool {
        matches!(&*read(&self.handle), StoreHandle::Configured(_))
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    fn backend(&self) -> StoreResult<Arc<Backend>> {
        match &*read(&self.handle) {
            StoreHandle::Configured(backend) => Ok(Arc::clone(backend)),
            StoreHandle::Unconfigured(reason) => Err(StoreError::unavailable(reason.clone())),
        }
    }

    /// Backend and signed-in identity, checked in that order.
    fn authorized(&self) -> StoreResult<(Arc<Backend>, Identity)> {
        let backend = self.backend()?;
        let identity = lock(&self.session)
            .clone()
            .ok_or(StoreError::NotAuthenticated)?;
        Ok((backend, identity))
    }

    fn authorized_for(&self, partition: &Partition) -> StoreResult<(Arc<Backend>, Identity)> {
        let (backend, identity) = self.authorized()?;
        if let Partition::Private(owner) = partition {
            if owner != &identity.uid {
                return Err(StoreError::NotAuthenticated);
            }
        }
        Ok((backend, identity))
    }

    // Auth

    /// Silent anonymous sign-on. Returns the existing session when there is one.
    pub fn sign_in(&self) -> StoreResult<Identity> {
        let backend = self.backend()?;
        let mut session = lock(&self.session);
        if let Some(identity) = session.as_ref() {
            return Ok(identity.clone());
        }
        let identity = identity::sign_in_anonymously(&backend.db, &self.device)?;
        *session = Some(identity.clone());
        Ok(identity)
    }

    pub fn sign_out(&self) {
        if lock(&self.session).take().is_some() {
            info!("Signed out device '{}'", self.device);
        }
    }

    /// Drops the session and deletes the persisted device identity.
    pub fn forget_identity(&self) -> StoreResult<()> {
        let backend = self.backend()?;
        lock(&self.session).take();
        identity::forget(&backend.db, &self.device)?;
        info!("Forgot identity of device '{}'", self.device);
        Ok(())
    }

    pub fn current_identity(&self) -> Option<Identity> {
        lock(&self.session).clone()
    }

    /// Partition for the signed-in identity and an optional sync passphrase.
    pub fn resolve_partition(&self, sync_id: Option<&str>) -> StoreResult<Partition> {
        let (_, identity) = self.authorized()?;
        Ok(Partition::resolve(&identity.uid, sync_id))
    }

    // Prompts

    /// Registers `on_change` for `partition`.
    ///
    /// The callback receives the current snapshot before this returns, then
    /// a full snapshot after every write to the partition, in commit order.
    /// It runs on the writer's thread and must not write to the store.
    pub fn subscribe<F>(&self, partition: &Partition, on_change: F) -> StoreResult<Subscription>
    where
        F: Fn(&[PromptRecord]) + Send + Sync + 'static,
    {
        let (backend, _) = self.authorized_for(partition)?;
        let _guard = lock(&backend.write_lock);

        let initial = backend.snapshot(partition)?;
        let id = backend.next_listener.fetch_add(1, Ordering::Relaxed);
        let callback: Listener = Arc::new(on_change);
        lock(&backend.listeners).push(ListenerEntry {
            id,
            partition: partition.clone(),
            callback: Arc::clone(&callback),
        });
        debug!("Listener {id} subscribed to {partition}");

        callback(initial.as_slice());

        Ok(Subscription {
            id,
            partition: partition.clone(),
            backend: Arc::downgrade(&backend),
        })
    }

    /// One-shot read of the partition, newest first.
    pub fn fetch_prompts(&self, partition: &Partition) -> StoreResult<Vec<PromptRecord>> {
        let (backend, _) = self.authorized_for(partition)?;
        backend.snapshot(partition)
    }

    /// Upserts `record` and returns its id.
    ///
    /// An empty id gets a fresh one and a zero `created_at` gets the current
    /// time. Updating an existing document keeps its stored `created_at`.
    pub fn save(&self, partition: &Partition, mut record: PromptRecord) -> StoreResult<String> {
        record.validate()?;
        let (backend, _) = self.authorized_for(partition)?;
        let _guard = lock(&backend.write_lock);

        if record.id.trim().is_empty() {
            record.id = Uuid::new_v4().to_string();
        }
        let key = partition.prompt_key(&record.id);

        match backend.db.get::<PromptRecord>(Collection::Prompts, &key)? {
            Some(existing) => {
                if existing.created_at != 0 {
                    record.created_at = existing.created_at;
                }
                if existing == record {
                    debug!("Prompt {} unchanged in {partition}", record.id);
                    return Ok(record.id);
                }
            }
            None => {
                if record.created_at == 0 {
                    record.created_at = Utc::now().timestamp_millis();
                }
            }
        }

        backend.db.put(Collection::Prompts, &key, &record)?;
        info!("Saved prompt {} in {partition}", record.id);
        backend.notify(partition);
        Ok(record.id)
    }

    /// Removes the record `id`. Unknown ids are not an error.
    pub fn delete(&self, partition: &Partition, id: &str) -> StoreResult<()> {
        let (backend, _) = self.authorized_for(partition)?;
        let _guard = lock(&backend.write_lock);

        if backend.db.delete(Collection::Prompts, &partition.prompt_key(id))? {
            info!("Deleted prompt {id} from {partition}");
            backend.notify(partition);
        } else {
            debug!("Delete of unknown prompt {id} in {partition} ignored");
        }
        Ok(())
    }

    // Settings

    /// Overwrites the caller's private settings document. The sync
    /// passphrase never redirects settings into a shared partition.
    pub fn save_settings(&self, settings: &Settings, variable: &str) -> StoreResult<()> {
        let (backend, identity) = self.authorized()?;
        let state = UserState {
            variable: variable.to_string(),
            settings: settings.clone(),
        };
        backend
            .db
            .put(Collection::UserState, &user_state_key(&identity.uid), &state)
    }

    /// The caller's settings and variable, or defaults when none were saved.
    pub fn get_initial_state(&self) -> StoreResult<UserState> {
        let (backend, identity) = self.authorized()?;
        Ok(backend
            .db
            .get::<UserState>(Collection::UserState, &user_state_key(&identity.uid))?
            .unwrap_or_default())
    }

    /// Detaches this client from the backend. Later calls fail with
    /// `StoreUnavailable`.
    pub fn close(&self) {
        let mut handle = write(&self.handle);
        if matches!(&*handle, StoreHandle::Configured(_)) {
            *handle = StoreHandle::Unconfigured("store is closed".to_string());
            info!("Prompt store closed for device '{}'", self.device);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
