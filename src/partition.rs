//! Storage partition selection.
//!
//! A partition is the namespace a prompt collection lives in: either the
//! caller's private space, keyed by identity, or a shared space keyed by a
//! sync passphrase that any client may join by supplying the same string.

use std::fmt::{Display, Formatter};

const USERS_ROOT: &str = "users";
const SYNC_GROUPS_ROOT: &str = "sync_groups";
const PROMPTS_COLLECTION: &str = "prompts";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Partition {
    /// Keyed by the caller's identity.
    Private(String),
    /// Keyed by a trimmed, non-empty sync passphrase.
    Shared(String),
}

impl Partition {
    /// Selects the partition for `identity`, preferring the shared one when
    /// `sync_id` is non-empty after trimming. Pure: equal inputs always give
    /// equal partitions.
    pub fn resolve(identity: &str, sync_id: Option<&str>) -> Partition {
        match sync_id.map(str::trim) {
            Some(shared) if !shared.is_empty() => Partition::Shared(shared.to_string()),
            _ => Partition::Private(identity.to_string()),
        }
    }

    /// The document path of the partition root.
    pub fn path(&self) -> String {
        match self {
            Partition::Private(uid) => format!("{USERS_ROOT}/{}", encode_segment(uid)),
            Partition::Shared(sync_id) => {
                format!("{SYNC_GROUPS_ROOT}/{}", encode_segment(sync_id))
            }
        }
    }

    /// Key prefix shared by every prompt document in the partition.
    pub fn prompts_prefix(&self) -> String {
        format!("{}/{PROMPTS_COLLECTION}/", self.path())
    }

    pub fn prompt_key(&self, id: &str) -> String {
        format!("{}{}", self.prompts_prefix(), encode_segment(id))
    }

    pub fn is_shared(&self) -> bool {
        matches!(self, Partition::Shared(_))
    }
}

/// Path of the private user-state document for `identity`.
pub fn user_state_key(identity: &str) -> String {
    format!("{USERS_ROOT}/{}", encode_segment(identity))
}

/// Escapes `/` so a passphrase or id can never reach into another path.
fn encode_segment(segment: &str) -> String {
    segment.replace('%', "%25").replace('/', "%2F")
}

impl Display for Partition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path())
    }
}
