//! Data model definitions for prompt storage.
//!
//! This module defines the documents persisted by the store: the
//! [`PromptRecord`] with its [`PromptVariant`]s, and the per-user
//! [`UserState`] document holding [`Settings`] and the session variable.
//!
//! Field names serialize in camelCase so the stored JSON documents keep the
//! shape shared with every other client of the same store
//! (`createdAt`, `autoInsertPosition`, `syncId`).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

/// Number of characters of the first variant shown when a record has no title.
const TITLE_FALLBACK_CHARS: usize = 20;

/// The two top-level groupings of prompt records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Style,
    Subject,
}

/// One named text template within a record.
///
/// The `prompt` may contain the placeholder token `{{var}}` any number of
/// times; see [`crate::template::render`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptVariant {
    pub id: String,
    pub name: String,
    pub prompt: String,
}

impl PromptVariant {
    /// Creates a variant with a fresh identifier.
    pub fn new(name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            prompt: prompt.into(),
        }
    }
}

/// A stored prompt snippet.
///
/// # Invariants
///
/// - `versions` always holds at least one entry. [`PromptRecord::new`] seeds
///   one and [`PromptRecord::remove_variant`] refuses to drop the last one.
///   The store rejects records that break this rule.
/// - `created_at` is assigned once by the store and never changes.
///
/// # Examples
///
/// ```rust
/// use prompt_shelf::prompt_model::{Category, PromptRecord};
///
/// let mut record = PromptRecord::new(Category::Style);
/// record.title = "Watercolor".to_string();
/// record.tags = PromptRecord::parse_tags("soft, pastel, ");
/// record.versions[0].prompt = "watercolor painting of {{var}}".to_string();
///
/// assert_eq!(record.tags, vec!["soft", "pastel"]);
/// assert!(record.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptRecord {
    /// Store-assigned identifier. Empty until the first save.
    #[serde(default)]
    pub id: String,
    pub category: Category,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Self-contained data string (e.g. a `data:image/jpeg;base64,...` URL).
    #[serde(default)]
    pub thumbnail: String,
    pub versions: Vec<PromptVariant>,
    /// Creation instant in epoch milliseconds. Zero until the first save.
    #[serde(default)]
    pub created_at: i64,
}

impl PromptRecord {
    /// Creates an unsaved record seeded with a single empty `v1` variant.
    pub fn new(category: Category) -> Self {
        Self {
            id: String::new(),
            category,
            title: String::new(),
            tags: Vec::new(),
            thumbnail: String::new(),
            versions: vec![PromptVariant::new("v1", "")],
            created_at: 0,
        }
    }

    /// Checks the record invariants before it is written.
    pub fn validate(&self) -> StoreResult<()> {
        if self.versions.is_empty() {
            return Err(StoreError::invalid("a prompt record needs at least one variant"));
        }
        Ok(())
    }

    /// Appends a new empty variant named `v<N+1>` and returns its id.
    pub fn add_variant(&mut self) -> String {
        let variant = PromptVariant::new(format!("v{}", self.versions.len() + 1), "");
        let id = variant.id.clone();
        self.versions.push(variant);
        id
    }

    /// Removes a variant by id. Returns `false` when the id is unknown or the
    /// variant is the last one left.
    pub fn remove_variant(&mut self, id: &str) -> bool {
        if self.versions.len() <= 1 {
            return false;
        }
        let before = self.versions.len();
        self.versions.retain(|v| v.id != id);
        self.versions.len() != before
    }

    pub fn variant(&self, id: &str) -> Option<&PromptVariant> {
        self.versions.iter().find(|v| v.id == id)
    }

    /// Splits comma separated tag input, trimming and dropping empty entries.
    pub fn parse_tags(input: &str) -> Vec<String> {
        input
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect()
    }

    /// Tags joined back into editable text.
    pub fn tags_text(&self) -> String {
        self.tags.join(", ")
    }

    /// The label shown for the record: its title, or the start of its first
    /// prompt when the title is empty.
    pub fn display_title(&self) -> String {
        if !self.title.is_empty() {
            return self.title.clone();
        }
        let head: String = self
            .versions
            .first()
            .map(|v| v.prompt.chars().take(TITLE_FALLBACK_CHARS).collect())
            .unwrap_or_default();
        format!("{head}...")
    }
}

/// Where the variable is spliced when a template has no `{{var}}` token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InsertPosition {
    #[default]
    Start,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

/// Per-user settings. Never shared across a sync group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub auto_insert_position: InsertPosition,
    #[serde(default)]
    pub theme: Theme,
    /// Shared-partition passphrase. Empty or absent selects the private partition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_id: Option<String>,
}

/// Partial settings update, applied field by field onto the current settings.
///
/// `sync_id: Some(None)` clears the passphrase.
#[derive(Debug, Clone, Default)]
pub struct SettingsPatch {
    pub auto_insert_position: Option<InsertPosition>,
    pub theme: Option<Theme>,
    pub sync_id: Option<Option<String>>,
}

impl Settings {
    pub fn apply(&mut self, patch: SettingsPatch) {
        if let Some(position) = patch.auto_insert_position {
            self.auto_insert_position = position;
        }
        if let Some(theme) = patch.theme {
            self.theme = theme;
        }
        if let Some(sync_id) = patch.sync_id {
            self.sync_id = sync_id;
        }
    }
}

/// The singleton per-user document: settings plus the session variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UserState {
    #[serde(default)]
    pub variable: String,
    #[serde(default)]
    pub settings: Settings,
}
