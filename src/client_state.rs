//! In-memory view of one client: session variable, settings and the prompt
//! collection, kept in step with the store through a live subscription.
//!
//! The container is driven from a single UI thread. Store writes are never
//! applied locally; the collection only changes when [`ClientState::pump`]
//! applies a snapshot delivered by the subscription.

use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver};
use log::{info, warn};

use crate::error::StoreError;
use crate::partition::Partition;
use crate::prompt_model::{PromptRecord, Settings, SettingsPatch, UserState};
use crate::remote_store::{RemoteStore, Subscription};
use crate::search::{self, Page, ViewQuery};
use crate::template::{self, Clipboard};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    /// Waiting for the first snapshot of the current partition.
    Loading,
    Ready,
    /// Startup failed; the message is also queued as a notice.
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    StartupFailed,
    SaveFailed,
    DeleteFailed,
    SettingsSaveFailed,
    SubscribeFailed,
    PromptNotFound,
    ClipboardWriteFailed,
}

/// A non-fatal, user-visible failure report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

struct LiveFeed {
    partition: Partition,
    // Held for its Drop, which unsubscribes.
    _subscription: Subscription,
    updates: Receiver<Vec<PromptRecord>>,
}

pub struct ClientState {
    store: Arc<RemoteStore>,
    variable: String,
    settings: Settings,
    items: Vec<PromptRecord>,
    load_state: LoadState,
    feed: Option<LiveFeed>,
    // Settings or variable changed while loading; written on the first snapshot.
    settings_dirty: bool,
    notices: Vec<Notice>,
}

impl ClientState {
    pub fn new(store: Arc<RemoteStore>) -> Self {
        Self {
            store,
            variable: String::new(),
            settings: Settings::default(),
            items: Vec::new(),
            load_state: LoadState::Loading,
            feed: None,
            settings_dirty: false,
            notices: Vec::new(),
        }
    }

    /// Signs in, loads settings and the variable, then opens the live
    /// subscription. The container stays `Loading` until [`Self::pump`]
    /// applies the first snapshot.
    pub fn start(&mut self) -> bool {
        self.load_state = LoadState::Loading;

        let identity = match self.store.sign_in() {
            Ok(identity) => identity,
            Err(e) => return self.startup_failed(e),
        };

        match self.store.get_initial_state() {
            Ok(UserState { variable, settings }) => {
                self.variable = variable;
                self.settings = settings;
            }
            Err(e) => return self.startup_failed(e),
        }

        if let Err(e) = self.open_feed() {
            return self.startup_failed(e);
        }

        info!("Client started for identity {}", identity.uid);
        true
    }

    fn startup_failed(&mut self, err: StoreError) -> bool {
        warn!("Client startup failed: {err}");
        self.load_state = LoadState::Failed(err.to_string());
        self.notify(NoticeKind::StartupFailed, err.to_string());
        false
    }

    /// Replaces the live feed with one on the partition selected by the
    /// current settings. The previous feed is dropped only once the new one
    /// is subscribed, together with any snapshots still queued for it. On
    /// failure the previous feed stays in place.
    fn open_feed(&mut self) -> Result<(), StoreError> {
        let partition = self
            .store
            .resolve_partition(self.settings.sync_id.as_deref())?;
        let (tx, rx) = unbounded();
        let subscription = self.store.subscribe(&partition, move |items| {
            // A send error means the feed was torn down.
            let _ = tx.send(items.to_vec());
        })?;

        self.feed = Some(LiveFeed {
            partition,
            _subscription: subscription,
            updates: rx,
        });
        self.load_state = LoadState::Loading;
        Ok(())
    }

    /// Applies the newest queued snapshot, if any. Returns whether the
    /// collection was replaced.
    ///
    /// The first snapshot after loading also writes out settings changed in
    /// the meantime.
    pub fn pump(&mut self) -> bool {
        let latest = match &self.feed {
            Some(feed) => feed.updates.try_iter().last(),
            None => None,
        };
        let Some(items) = latest else {
            return false;
        };

        let was_loading = self.is_loading();
        self.items = items;
        self.load_state = LoadState::Ready;
        if was_loading && self.settings_dirty {
            self.persist_settings();
        }
        true
    }

    /// Stops listening. Later snapshots are dropped.
    pub fn shutdown(&mut self) {
        if let Some(feed) = self.feed.take() {
            info!("Closing live feed on {}", feed.partition);
        }
    }

    // Accessors

    pub fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    pub fn is_loading(&self) -> bool {
        self.load_state == LoadState::Loading
    }

    pub fn items(&self) -> &[PromptRecord] {
        &self.items
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn partition(&self) -> Option<&Partition> {
        self.feed.as_ref().map(|feed| &feed.partition)
    }

    pub fn visible(&self, query: &ViewQuery) -> Page<'_> {
        search::page(&self.items, query)
    }

    /// Drains queued notices.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn notify(&mut self, kind: NoticeKind, message: impl Into<String>) {
        self.notices.push(Notice {
            kind,
            message: message.into(),
        });
    }

    // Mutations

    fn target_partition(&self) -> Result<Partition, StoreError> {
        match &self.feed {
            Some(feed) => Ok(feed.partition.clone()),
            None => self
                .store
                .resolve_partition(self.settings.sync_id.as_deref()),
        }
    }

    /// Saves `record` remotely. The collection updates when the resulting
    /// snapshot is pumped; on failure it is left untouched.
    pub fn save_record(&mut self, record: PromptRecord) -> Option<String> {
        let result = self
            .target_partition()
            .and_then(|partition| self.store.save(&partition, record));
        match result {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("Failed to save prompt: {e}");
                self.notify(NoticeKind::SaveFailed, format!("Saving failed: {e}"));
                None
            }
        }
    }

    pub fn delete_record(&mut self, id: &str) -> bool {
        let result = self
            .target_partition()
            .and_then(|partition| self.store.delete(&partition, id));
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to delete prompt {id}: {e}");
                self.notify(NoticeKind::DeleteFailed, format!("Deleting failed: {e}"));
                false
            }
        }
    }

    pub fn set_variable(&mut self, variable: impl Into<String>) {
        self.variable = variable.into();
        self.persist_settings();
    }

    /// Applies `patch` and persists the settings. Changing the effective
    /// sync passphrase moves the live feed to the new partition.
    pub fn update_settings(&mut self, patch: SettingsPatch) {
        let previous_sync = effective_sync_id(&self.settings);
        self.settings.apply(patch);
        self.persist_settings();

        if self.feed.is_some() && effective_sync_id(&self.settings) != previous_sync {
            if let Err(e) = self.open_feed() {
                warn!("Failed to switch partition: {e}");
                self.notify(
                    NoticeKind::SubscribeFailed,
                    format!("Switching sync group failed: {e}"),
                );
            }
        }
    }

    fn persist_settings(&mut self) {
        if self.is_loading() {
            self.settings_dirty = true;
            return;
        }
        self.settings_dirty = false;
        if let Err(e) = self.store.save_settings(&self.settings, &self.variable) {
            warn!("Failed to save settings: {e}");
            self.notify(NoticeKind::SettingsSaveFailed, format!("Saving settings failed: {e}"));
        }
    }

    /// Renders a variant against the current variable and settings and
    /// writes it to `clipboard`.
    pub fn copy_variant<C: Clipboard + ?Sized>(
        &mut self,
        record_id: &str,
        variant_id: &str,
        clipboard: &mut C,
    ) -> bool {
        let template = self
            .items
            .iter()
            .find(|item| item.id == record_id)
            .and_then(|item| item.variant(variant_id))
            .map(|variant| variant.prompt.clone());

        let Some(template) = template else {
            self.notify(
                NoticeKind::PromptNotFound,
                format!("No variant {variant_id} in prompt {record_id}"),
            );
            return false;
        };

        if template::copy_prompt(&template, &self.variable, &self.settings, clipboard) {
            true
        } else {
            self.notify(NoticeKind::ClipboardWriteFailed, "Copying to the clipboard failed");
            false
        }
    }
}

fn effective_sync_id(settings: &Settings) -> Option<String> {
    settings
        .sync_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}
