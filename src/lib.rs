//! # Prompt Shelf
//!
//! A prompt snippet library for AI image generation workflows. Prompts are
//! grouped into two categories, carry named variants, tags and a thumbnail,
//! and are copied to the clipboard with a user variable substituted in.
//!
//! ## Features
//!
//! - **Variable templating**: `{{var}}` substitution, or positional insertion
//!   when a template has no placeholder ([`template::render`])
//! - **Partitioned storage**: a private partition per anonymous identity, or a
//!   shared partition selected by a sync passphrase ([`partition::Partition`])
//! - **Live subscriptions**: every write pushes a full, newest-first snapshot
//!   to the partition's listeners ([`remote_store::RemoteStore::subscribe`])
//! - **LMDB-backed**: documents are stored as JSON in an LMDB environment
//! - **FFI-ready**: C-compatible functions returning JSON [`AppResponse`]s
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use prompt_shelf::client_state::ClientState;
//! use prompt_shelf::config::StoreConfig;
//! use prompt_shelf::prompt_model::{Category, PromptRecord};
//! use prompt_shelf::remote_store::RemoteStore;
//!
//! let store = Arc::new(RemoteStore::open(StoreConfig::from_env()));
//! let mut client = ClientState::new(store);
//! client.start();
//! client.pump();
//!
//! let mut record = PromptRecord::new(Category::Subject);
//! record.versions[0].prompt = "a portrait of {{var}}".to_string();
//! client.save_record(record);
//! client.pump();
//! ```
//!
//! ## FFI Functions
//!
//! - [`create_store`] / [`create_store_from_env`] - Open a store handle
//! - [`sign_in`] - Silent anonymous sign-on
//! - [`save_prompt`] / [`delete_prompt`] / [`get_prompts`] - Prompt records
//! - [`subscribe_prompts`] / [`unsubscribe_prompts`] - Live snapshots
//! - [`save_settings`] / [`get_initial_state`] - Per-user settings
//! - [`render_prompt`] / [`copy_prompt`] - Templating and clipboard copy
//! - [`free_response`] - Release strings returned by this library
//! - [`close_store`] - Release a store handle

pub mod client_state;
pub mod config;
pub mod error;
pub mod identity;
pub mod local_db_state;
pub mod partition;
pub mod prompt_model;
pub mod remote_store;
pub mod search;
pub mod template;
mod app_response;

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_void};

use log::{info, warn};

use crate::config::StoreConfig;
use crate::prompt_model::{InsertPosition, PromptRecord, Settings, UserState};
use crate::remote_store::{RemoteStore, Subscription};

pub use crate::app_response::AppResponse;

/// Callback receiving a JSON array of prompt records, plus the opaque
/// context pointer given at subscription time.
pub type PromptsCallback = extern "C" fn(json: *const c_char, context: *mut c_void);

/// Host clipboard writer. Returns `true` when the text was written.
pub type ClipboardWriter = extern "C" fn(text: *const c_char) -> bool;

/// Opens a store backed by the LMDB directory at `path`.
///
/// Returns a pointer to the store, or null when `path` is null or not
/// UTF-8. A directory that cannot be opened still yields a handle; every
/// call on it then answers `StoreUnavailable`. Release with [`close_store`].
///
/// # Examples
///
/// ```no_run
/// use std::ffi::CString;
/// use prompt_shelf::{create_store, close_store};
///
/// let path = CString::new("prompts.lmdb").unwrap();
/// let store = create_store(path.as_ptr());
/// assert!(!store.is_null());
/// close_store(store);
/// ```
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn create_store(path: *const c_char) -> *mut RemoteStore {
    if path.is_null() {
        warn!("Null path pointer passed to create_store");
        return std::ptr::null_mut();
    }

    let path_str = match unsafe { CStr::from_ptr(path).to_str() } {
        Ok(s) => s,
        Err(e) => {
            warn!("Invalid UTF-8 in path parameter: {e}");
            return std::ptr::null_mut();
        }
    };

    info!("Opening prompt store at: {path_str}");
    Box::into_raw(Box::new(RemoteStore::open(Some(StoreConfig::new(path_str)))))
}

/// Opens a store configured from `PROMPT_SHELF_*` environment variables.
///
/// Never returns null: missing configuration yields an unconfigured store.
#[no_mangle]
pub extern "C" fn create_store_from_env() -> *mut RemoteStore {
    Box::into_raw(Box::new(RemoteStore::open(StoreConfig::from_env())))
}

/// Releases a store handle created by [`create_store`].
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn close_store(store: *mut RemoteStore) {
    if store.is_null() {
        return;
    }
    let store = unsafe { Box::from_raw(store) };
    store.close();
}

/// Signs in anonymously. `Ok` carries the identity as JSON.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn sign_in(store: *mut RemoteStore) -> *const c_char {
    let store = match store_ref(store, "sign_in") {
        Ok(s) => s,
        Err(err) => return err,
    };

    match store.sign_in() {
        Ok(identity) => json_ok(&identity),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Upserts a prompt record given as JSON. `Ok` carries the record id.
///
/// `sync_id` may be null or empty to target the private partition.
///
/// # JSON Format
///
/// ```json
/// {
///   "id": "",
///   "category": "style",
///   "title": "Watercolor",
///   "tags": ["soft"],
///   "thumbnail": "data:image/jpeg;base64,...",
///   "versions": [{ "id": "a1", "name": "v1", "prompt": "watercolor, {{var}}" }],
///   "createdAt": 0
/// }
/// ```
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn save_prompt(
    store: *mut RemoteStore,
    json_ptr: *const c_char,
    sync_id: *const c_char,
) -> *const c_char {
    let store = match store_ref(store, "save_prompt") {
        Ok(s) => s,
        Err(err) => return err,
    };

    let json_str = match c_ptr_to_string(json_ptr, "JSON") {
        Ok(json) => json,
        Err(err) => return err,
    };

    let sync_id = match optional_c_string(sync_id, "sync_id") {
        Ok(s) => s,
        Err(err) => return err,
    };

    let record: PromptRecord = match serde_json::from_str(&json_str) {
        Ok(r) => r,
        Err(e) => {
            let error = AppResponse::SerializationError(format!("Invalid JSON: {e}"));
            return response_to_c_string(&error);
        }
    };

    let result = store
        .resolve_partition(sync_id.as_deref())
        .and_then(|partition| store.save(&partition, record));

    match result {
        Ok(id) => response_to_c_string(&AppResponse::success(id)),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Deletes a prompt record by id. Unknown ids still answer `Ok`.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn delete_prompt(
    store: *mut RemoteStore,
    id: *const c_char,
    sync_id: *const c_char,
) -> *const c_char {
    let store = match store_ref(store, "delete_prompt") {
        Ok(s) => s,
        Err(err) => return err,
    };

    let id_str = match c_ptr_to_string(id, "id") {
        Ok(id) => id,
        Err(err) => return err,
    };

    let sync_id = match optional_c_string(sync_id, "sync_id") {
        Ok(s) => s,
        Err(err) => return err,
    };

    let result = store
        .resolve_partition(sync_id.as_deref())
        .and_then(|partition| store.delete(&partition, &id_str));

    match result {
        Ok(()) => response_to_c_string(&AppResponse::success(format!("Prompt {id_str} deleted"))),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Reads the whole partition, newest first. `Ok` carries a JSON array.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_prompts(store: *mut RemoteStore, sync_id: *const c_char) -> *const c_char {
    let store = match store_ref(store, "get_prompts") {
        Ok(s) => s,
        Err(err) => return err,
    };

    let sync_id = match optional_c_string(sync_id, "sync_id") {
        Ok(s) => s,
        Err(err) => return err,
    };

    let result = store
        .resolve_partition(sync_id.as_deref())
        .and_then(|partition| store.fetch_prompts(&partition));

    match result {
        Ok(items) => json_ok(&items),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Registers `callback` for live snapshots of the partition.
///
/// The callback receives a JSON array owned by this library, valid only for
/// the duration of the call. It runs on the writing thread and must not call
/// back into the store. Returns null on failure; release the handle with
/// [`unsubscribe_prompts`].
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn subscribe_prompts(
    store: *mut RemoteStore,
    sync_id: *const c_char,
    callback: PromptsCallback,
    context: *mut c_void,
) -> *mut Subscription {
    let store = match unsafe { store.as_ref() } {
        Some(s) => s,
        None => {
            warn!("Null store pointer passed to subscribe_prompts");
            return std::ptr::null_mut();
        }
    };

    let sync_id = match optional_c_string(sync_id, "sync_id") {
        Ok(s) => s,
        Err(err) => {
            free_response(err as *mut c_char);
            return std::ptr::null_mut();
        }
    };

    // Raw pointers are not Send; the host owns the context and its thread safety.
    let context = context as usize;
    let result = store
        .resolve_partition(sync_id.as_deref())
        .and_then(|partition| {
            store.subscribe(&partition, move |items| {
                let json = match serde_json::to_string(items) {
                    Ok(j) => j,
                    Err(e) => {
                        warn!("Error serializing snapshot: {e}");
                        return;
                    }
                };
                match CString::new(json) {
                    Ok(c_json) => callback(c_json.as_ptr(), context as *mut c_void),
                    Err(e) => warn!("Error creating CString for snapshot: {e}"),
                }
            })
        });

    match result {
        Ok(subscription) => Box::into_raw(Box::new(subscription)),
        Err(e) => {
            warn!("subscribe_prompts failed: {e}");
            std::ptr::null_mut()
        }
    }
}

/// Stops a subscription created by [`subscribe_prompts`].
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn unsubscribe_prompts(subscription: *mut Subscription) {
    if subscription.is_null() {
        return;
    }
    let subscription = unsafe { Box::from_raw(subscription) };
    subscription.unsubscribe();
}

/// Overwrites the caller's settings and variable.
///
/// `settings_json` has the shape
/// `{"autoInsertPosition":"start","theme":"dark","syncId":"..."}`.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn save_settings(
    store: *mut RemoteStore,
    settings_json: *const c_char,
    variable: *const c_char,
) -> *const c_char {
    let store = match store_ref(store, "save_settings") {
        Ok(s) => s,
        Err(err) => return err,
    };

    let settings_str = match c_ptr_to_string(settings_json, "settings") {
        Ok(s) => s,
        Err(err) => return err,
    };

    let variable = match optional_c_string(variable, "variable") {
        Ok(v) => v.unwrap_or_default(),
        Err(err) => return err,
    };

    let settings: Settings = match serde_json::from_str(&settings_str) {
        Ok(s) => s,
        Err(e) => {
            let error = AppResponse::SerializationError(format!("Invalid settings JSON: {e}"));
            return response_to_c_string(&error);
        }
    };

    match store.save_settings(&settings, &variable) {
        Ok(()) => response_to_c_string(&AppResponse::success("Settings saved")),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Reads the caller's settings and variable. `Ok` carries
/// `{"variable": "...", "settings": {...}}`, with defaults when nothing was saved.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_initial_state(store: *mut RemoteStore) -> *const c_char {
    let store = match store_ref(store, "get_initial_state") {
        Ok(s) => s,
        Err(err) => return err,
    };

    match store.get_initial_state() {
        Ok(state) => json_ok::<UserState>(&state),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Renders `template` with `variable`. `position` is `0` for start and any
/// other value for end. Never fails for valid strings.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn render_prompt(
    template: *const c_char,
    variable: *const c_char,
    position: u8,
) -> *const c_char {
    let template = match c_ptr_to_string(template, "template") {
        Ok(t) => t,
        Err(err) => return err,
    };

    let variable = match optional_c_string(variable, "variable") {
        Ok(v) => v.unwrap_or_default(),
        Err(err) => return err,
    };

    let position = insert_position_from_u8(position);
    let rendered = template::render(&template, &variable, position);
    response_to_c_string(&AppResponse::success(rendered))
}

/// Renders `template` and hands the result to the host clipboard `writer`.
///
/// Returns `false` when any argument is invalid or the writer reports a
/// failure.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn copy_prompt(
    template: *const c_char,
    variable: *const c_char,
    position: u8,
    writer: ClipboardWriter,
) -> bool {
    let template = match c_ptr_to_string(template, "template") {
        Ok(t) => t,
        Err(err) => {
            free_response(err as *mut c_char);
            return false;
        }
    };

    let variable = match optional_c_string(variable, "variable") {
        Ok(v) => v.unwrap_or_default(),
        Err(err) => {
            free_response(err as *mut c_char);
            return false;
        }
    };

    let settings = Settings {
        auto_insert_position: insert_position_from_u8(position),
        ..Settings::default()
    };

    let mut clipboard = |text: &str| -> Result<(), String> {
        let c_text = CString::new(text).map_err(|e| format!("text contains NUL: {e}"))?;
        if writer(c_text.as_ptr()) {
            Ok(())
        } else {
            Err("host clipboard rejected the write".to_string())
        }
    };

    template::copy_prompt(&template, &variable, &settings, &mut clipboard)
}

/// Releases a string returned by any function of this library.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn free_response(ptr: *mut c_char) {
    if ptr.is_null() {
        return;
    }
    unsafe {
        drop(CString::from_raw(ptr));
    }
}

fn insert_position_from_u8(position: u8) -> InsertPosition {
    if position == 0 {
        InsertPosition::Start
    } else {
        InsertPosition::End
    }
}

fn store_ref<'a>(store: *mut RemoteStore, caller: &str) -> Result<&'a RemoteStore, *const c_char> {
    match unsafe { store.as_ref() } {
        Some(s) => Ok(s),
        None => {
            let error = AppResponse::BadRequest(format!("Null store pointer passed to {caller}"));
            Err(response_to_c_string(&error))
        }
    }
}

fn json_ok<T: serde::Serialize + ?Sized>(value: &T) -> *const c_char {
    match serde_json::to_string(value) {
        Ok(json) => response_to_c_string(&AppResponse::Ok(json)),
        Err(e) => {
            let error = AppResponse::SerializationError(format!("Failed to serialize result: {e}"));
            response_to_c_string(&error)
        }
    }
}

/// Converts an [`AppResponse`] to a C string owned by the caller.
///
/// Returns a null pointer if serialization or C string creation fails.
fn response_to_c_string(response: &AppResponse) -> *const c_char {
    let json = match serde_json::to_string(response) {
        Ok(j) => j,
        Err(e) => {
            warn!("Error serializing response: {e}");
            return std::ptr::null();
        }
    };

    match CString::new(json) {
        Ok(c_str) => c_str.into_raw(),
        Err(e) => {
            warn!("Error creating CString: {e}");
            std::ptr::null()
        }
    }
}

/// Converts a C string pointer to a Rust String.
///
/// On failure the `Err` holds a ready-made `BadRequest` response.
fn c_ptr_to_string(ptr: *const c_char, field_name: &str) -> Result<String, *const c_char> {
    if ptr.is_null() {
        let error = AppResponse::BadRequest(format!("Null {field_name} pointer"));
        return Err(response_to_c_string(&error));
    }

    match unsafe { CStr::from_ptr(ptr).to_str() } {
        Ok(s) => Ok(s.to_string()),
        Err(e) => {
            let error = AppResponse::BadRequest(format!("Invalid UTF-8 in {field_name}: {e}"));
            Err(response_to_c_string(&error))
        }
    }
}

/// Like [`c_ptr_to_string`], but a null pointer means "absent".
fn optional_c_string(
    ptr: *const c_char,
    field_name: &str,
) -> Result<Option<String>, *const c_char> {
    if ptr.is_null() {
        return Ok(None);
    }
    c_ptr_to_string(ptr, field_name).map(Some)
}
