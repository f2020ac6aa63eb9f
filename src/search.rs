//! Displayed-subset derivation: category filter, text search, ordering and
//! paging. Pure functions, recomputed on every change.

use crate::prompt_model::{Category, PromptRecord};

/// Records shown per page, and the step used by [`ViewQuery::show_more`].
pub const PAGE_SIZE: usize = 10;

/// Records of `category` matching `query` (case-insensitive substring of the
/// title, any tag or any variant prompt), newest first.
pub fn filter_records<'a>(
    items: &'a [PromptRecord],
    category: Category,
    query: &str,
) -> Vec<&'a PromptRecord> {
    let needle = query.to_lowercase();
    let mut matched: Vec<&PromptRecord> = items
        .iter()
        .filter(|item| item.category == category)
        .filter(|item| matches_query(item, &needle))
        .collect();
    matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    matched
}

fn matches_query(item: &PromptRecord, needle: &str) -> bool {
    item.title.to_lowercase().contains(needle)
        || item.tags.iter().any(|t| t.to_lowercase().contains(needle))
        || item
            .versions
            .iter()
            .any(|v| v.prompt.to_lowercase().contains(needle))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewQuery {
    pub category: Category,
    pub text: String,
    pub limit: usize,
}

impl Default for ViewQuery {
    fn default() -> Self {
        Self {
            category: Category::Style,
            text: String::new(),
            limit: PAGE_SIZE,
        }
    }
}

impl ViewQuery {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            ..Self::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn show_more(&mut self) {
        self.limit += PAGE_SIZE;
    }
}

/// One page of the displayed subset.
#[derive(Debug, Clone)]
pub struct Page<'a> {
    pub items: Vec<&'a PromptRecord>,
    /// Number of records matching before the limit applies.
    pub total: usize,
    pub has_more: bool,
}

pub fn page<'a>(items: &'a [PromptRecord], query: &ViewQuery) -> Page<'a> {
    let mut matched = filter_records(items, query.category, &query.text);
    let total = matched.len();
    matched.truncate(query.limit);
    Page {
        items: matched,
        total,
        has_more: total > query.limit,
    }
}
