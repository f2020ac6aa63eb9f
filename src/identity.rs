//! Anonymous device-local identity.
//!
//! Sign-on is silent: the first call on a device mints a UUID and persists
//! it, later calls (including after a restart) reuse it until the host
//! clears it.

use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreResult;
use crate::local_db_state::{Collection, LocalDb};

/// Identity slot used when the host does not name a device.
pub const DEFAULT_DEVICE: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub uid: String,
    pub created_at: i64,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self {
            uid: Uuid::new_v4().to_string(),
            created_at: Utc::now().timestamp_millis(),
        }
    }
}

/// Loads the identity persisted for `device`, minting and storing a new one
/// if none exists.
pub fn sign_in_anonymously(db: &LocalDb, device: &str) -> StoreResult<Identity> {
    if let Some(existing) = db.get::<Identity>(Collection::Identity, device)? {
        info!("Restored anonymous identity {} for device '{device}'", existing.uid);
        return Ok(existing);
    }

    let identity = Identity::anonymous();
    db.put(Collection::Identity, device, &identity)?;
    info!("Created anonymous identity {} for device '{device}'", identity.uid);
    Ok(identity)
}

/// Removes the identity persisted for `device`.
pub fn forget(db: &LocalDb, device: &str) -> StoreResult<bool> {
    db.delete(Collection::Identity, device)
}
