//! LMDB document engine.
//!
//! [`LocalDb`] stores JSON documents under slash separated keys in three
//! named databases:
//!
//! - `prompts`: `users/<uid>/prompts/<id>` and `sync_groups/<sync>/prompts/<id>`
//! - `user_state`: `users/<uid>`
//! - `identity`: one entry per device slot
//!
//! It knows nothing about partitions or sessions; that lives in
//! [`crate::remote_store`].

use std::fs;
use std::path::PathBuf;

use lmdb::{Cursor, Database, DatabaseFlags, Environment, Transaction, WriteFlags};
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::StoreConfig;
use crate::error::StoreResult;

const PROMPTS_DB: &str = "prompts";
const USER_STATE_DB: &str = "user_state";
const IDENTITY_DB: &str = "identity";
const MAX_DBS: u32 = 3;

/// The named database a document lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Prompts,
    UserState,
    Identity,
}

pub struct LocalDb {
    env: Environment,
    prompts: Database,
    user_state: Database,
    identity: Database,
    path: PathBuf,
}

impl LocalDb {
    /// Opens (or creates) the environment described by `config`.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        let path = config.path.clone();
        if !path.exists() {
            info!("Creating LMDB directory at: {}", path.display());
            fs::create_dir_all(&path)?;
        }

        let env = Environment::new()
            .set_max_dbs(MAX_DBS)
            .set_map_size(config.map_size)
            .set_max_readers(config.max_readers)
            .open(&path)?;

        let prompts = env.create_db(Some(PROMPTS_DB), DatabaseFlags::empty())?;
        let user_state = env.create_db(Some(USER_STATE_DB), DatabaseFlags::empty())?;
        let identity = env.create_db(Some(IDENTITY_DB), DatabaseFlags::empty())?;

        info!("LMDB environment opened at: {}", path.display());

        Ok(Self {
            env,
            prompts,
            user_state,
            identity,
            path,
        })
    }

    fn database(&self, collection: Collection) -> Database {
        match collection {
            Collection::Prompts => self.prompts,
            Collection::UserState => self.user_state,
            Collection::Identity => self.identity,
        }
    }

    /// Reads one document. `Ok(None)` when the key is absent.
    pub fn get<T: DeserializeOwned>(
        &self,
        collection: Collection,
        key: &str,
    ) -> StoreResult<Option<T>> {
        let txn = self.env.begin_ro_txn()?;
        let value = match txn.get(self.database(collection), &key) {
            Ok(bytes) => Some(serde_json::from_slice(bytes)?),
            Err(lmdb::Error::NotFound) => None,
            Err(e) => return Err(e.into()),
        };
        txn.commit()?;
        Ok(value)
    }

    /// Inserts or replaces one document.
    pub fn put<T: Serialize>(
        &self,
        collection: Collection,
        key: &str,
        value: &T,
    ) -> StoreResult<()> {
        let bytes = serde_json::to_vec(value)?;
        let mut txn = self.env.begin_rw_txn()?;
        txn.put(self.database(collection), &key, &bytes, WriteFlags::empty())?;
        txn.commit()?;
        debug!("Stored document {key}");
        Ok(())
    }

    /// Removes one document. Returns whether anything was removed.
    pub fn delete(&self, collection: Collection, key: &str) -> StoreResult<bool> {
        let mut txn = self.env.begin_rw_txn()?;
        match txn.del(self.database(collection), &key, None) {
            Ok(()) => {
                txn.commit()?;
                debug!("Deleted document {key}");
                Ok(true)
            }
            Err(lmdb::Error::NotFound) => {
                txn.abort();
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Every document whose key starts with `prefix`, in key order. An empty
    /// database or a prefix past the last key yields an empty list.
    pub fn list<T: DeserializeOwned>(
        &self,
        collection: Collection,
        prefix: &str,
    ) -> StoreResult<Vec<T>> {
        let prefix = prefix.as_bytes();
        let txn = self.env.begin_ro_txn()?;
        let mut raw: Vec<Vec<u8>> = Vec::new();
        {
            let mut cursor = txn.open_ro_cursor(self.database(collection))?;
            // `iter_from` and `iter_start` panic on an empty range, so walk
            // from an unpositioned cursor instead.
            for (key, value) in cursor.iter() {
                if key < prefix {
                    continue;
                }
                if !key.starts_with(prefix) {
                    break;
                }
                raw.push(value.to_vec());
            }
        }
        txn.commit()?;

        raw.iter()
            .map(|bytes| serde_json::from_slice(bytes).map_err(Into::into))
            .collect()
    }
}

impl Drop for LocalDb {
    fn drop(&mut self) {
        info!("Closing LMDB environment at: {}", self.path.display());
    }
}
