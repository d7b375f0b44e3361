//! C-compatible exports called by the loader

use std::borrow::Cow;
use std::ffi::{c_char, CStr};
use std::path::PathBuf;

use tracing::instrument;

use xivmod_core::collections::RenderParameter;
use xivmod_core::config::{self, ConfigError, CoreConfig};
use xivmod_core::runtime;
use xivmod_engine::{init_host, load_host, try_host, ObjectTable};
use xivmod_sdk::GameObject;

// Plugin metadata - static strings with null terminators for C compatibility
static AUTHOR: &[u8] = b"xivmod contributors\0";
static NAME: &[u8] = b"xivmod\0";
static DESCRIPTION: &[u8] = b"Runtime mod collections for the host client\0";
static URL: &[u8] = b"https://github.com/xivmod/xivmod\0";
static LICENSE: &[u8] = b"MIT\0";
static VERSION: &[u8] = b"0.1.0\0";
static LOG_TAG: &[u8] = b"XIVMOD\0";

/// Called when the loader injects the plugin
///
/// Hook installation failures are fatal: the loader receives `false` and the
/// reason in `error`.
///
/// # Safety
/// - `base_dir` must be a valid null-terminated UTF-8 path or null
/// - `module_base` must point to the host executable's mapped image of `module_size` bytes
/// - `error` must be a valid pointer to a buffer of at least `maxlen` bytes, or null
#[no_mangle]
#[instrument(skip_all)]
pub unsafe extern "C" fn xivmod_load(
    base_dir: *const c_char,
    module_base: *const u8,
    module_size: usize,
    error: *mut c_char,
    maxlen: usize,
) -> bool {
    if let Some(dir) = c_str(base_dir) {
        config::set_base_dir(PathBuf::from(dir.as_ref()));
    }

    let (config, config_error) = match CoreConfig::load() {
        Ok(config) => (config, None),
        Err(ConfigError::NoConfigDirectory) => (CoreConfig::default(), None),
        Err(e) => (CoreConfig::default(), Some(e)),
    };

    crate::logging::init(config::logs_dir().ok().as_deref(), &config);
    tracing::info!("xivmod loading...");

    if let Some(e) = config_error {
        tracing::error!("Failed to load core config: {}", e);
        write_error(error, maxlen, &format!("Config error: {}", e));
        return false;
    }

    let globals = match load_host(module_base, module_size) {
        Ok(g) => g,
        Err(e) => {
            tracing::error!("Failed to describe host module: {}", e);
            write_error(error, maxlen, &format!("Host error: {}", e));
            return false;
        }
    };

    if let Err(e) = init_host(globals) {
        tracing::error!("Failed to init host: {}", e);
        write_error(error, maxlen, &e.to_string());
        return false;
    }

    if let Err(e) = runtime::init(&config) {
        tracing::error!("Failed to initialize runtime: {}", e);
        write_error(error, maxlen, &e.to_string());
        return false;
    }

    tracing::info!("xivmod loaded successfully!");
    tracing::info!("Main thread ID: {:?}", std::thread::current().id());

    true
}

/// Called when the loader unloads the plugin
///
/// # Safety
/// - `error` must be a valid pointer to a buffer of at least `maxlen` bytes, or null
#[no_mangle]
#[instrument(skip_all)]
pub unsafe extern "C" fn xivmod_unload(error: *mut c_char, maxlen: usize) -> bool {
    tracing::info!("xivmod unloading...");

    match std::panic::catch_unwind(crate::shutdown) {
        Ok(()) => true,
        Err(_) => {
            write_error(error, maxlen, "Panic during shutdown");
            false
        }
    }
}

// === Host state ===

/// Hand over the host object table once the client has created it
///
/// # Safety
/// - `entries` must point to `len` game object pointers that stay valid while registered
#[no_mangle]
pub unsafe extern "C" fn xivmod_set_object_table(entries: *const *mut GameObject, len: usize) -> bool {
    let Some(host) = try_host() else {
        return false;
    };
    match ObjectTable::from_raw(entries, len) {
        Ok(table) => {
            host.set_object_table(table);
            runtime::invalidate_caches();
            true
        }
        Err(e) => {
            tracing::error!("Rejected object table: {}", e);
            false
        }
    }
}

/// Forget the object table, e.g. on logout
#[no_mangle]
pub extern "C" fn xivmod_clear_object_table() {
    if let Some(host) = try_host() {
        host.clear_object_table();
        runtime::invalidate_caches();
    }
}

// === Collections ===

/// Create an empty collection
///
/// # Safety
/// - `name` must be a valid null-terminated string or null
#[no_mangle]
pub unsafe extern "C" fn xivmod_create_collection(name: *const c_char) -> bool {
    let Some(name) = c_str(name) else {
        return false;
    };
    runtime::update_collections(|registry| registry.create(&name)).is_some()
}

/// Set a collection's override for a render parameter; `value == 0` clears it
///
/// Parameters: 0 = racial scaling, 1 = primary decal, 2 = secondary decal.
///
/// # Safety
/// - `name` must be a valid null-terminated string or null
#[no_mangle]
pub unsafe extern "C" fn xivmod_set_collection_override(name: *const c_char, parameter: u32, value: usize) -> bool {
    let Some(name) = c_str(name) else {
        return false;
    };
    let Some(parameter) = RenderParameter::from_raw(parameter) else {
        tracing::warn!("Unknown render parameter {}", parameter);
        return false;
    };
    let value = (value != 0).then_some(value);
    runtime::update_collections(|registry| registry.set_override(&name, parameter, value)).unwrap_or(false)
}

/// Assign a collection to an actor by name; a null collection clears the assignment
///
/// # Safety
/// - `actor` and `collection` must be valid null-terminated strings or null
#[no_mangle]
pub unsafe extern "C" fn xivmod_assign_collection(actor: *const c_char, collection: *const c_char) -> bool {
    let Some(actor) = c_str(actor) else {
        return false;
    };
    let collection = c_str(collection);
    runtime::update_collections(|registry| registry.assign(&actor, collection.as_deref())).unwrap_or(false)
}

/// Choose the default collection; null selects the empty collection
///
/// # Safety
/// - `name` must be a valid null-terminated string or null
#[no_mangle]
pub unsafe extern "C" fn xivmod_set_default_collection(name: *const c_char) -> bool {
    let name = c_str(name);
    runtime::update_collections(|registry| registry.set_default(name.as_deref())).unwrap_or(false)
}

/// Enable or disable every override without unhooking
#[no_mangle]
pub extern "C" fn xivmod_set_mods_enabled(enabled: bool) -> bool {
    runtime::set_mods_enabled(enabled)
}

// Metadata exports - static strings for the loader to display

#[no_mangle]
pub extern "C" fn xivmod_get_author() -> *const c_char {
    AUTHOR.as_ptr() as *const c_char
}

#[no_mangle]
pub extern "C" fn xivmod_get_name() -> *const c_char {
    NAME.as_ptr() as *const c_char
}

#[no_mangle]
pub extern "C" fn xivmod_get_description() -> *const c_char {
    DESCRIPTION.as_ptr() as *const c_char
}

#[no_mangle]
pub extern "C" fn xivmod_get_url() -> *const c_char {
    URL.as_ptr() as *const c_char
}

#[no_mangle]
pub extern "C" fn xivmod_get_license() -> *const c_char {
    LICENSE.as_ptr() as *const c_char
}

#[no_mangle]
pub extern "C" fn xivmod_get_version() -> *const c_char {
    VERSION.as_ptr() as *const c_char
}

#[no_mangle]
pub extern "C" fn xivmod_get_log_tag() -> *const c_char {
    LOG_TAG.as_ptr() as *const c_char
}

/// Borrow a C string, lossily decoded
///
/// # Safety
/// - `ptr` must be a valid null-terminated string or null
unsafe fn c_str<'a>(ptr: *const c_char) -> Option<Cow<'a, str>> {
    if ptr.is_null() {
        return None;
    }
    Some(CStr::from_ptr(ptr).to_string_lossy())
}

/// Helper to write an error message to a C buffer
///
/// # Safety
/// - `error` must be a valid pointer or null
/// - `maxlen` must accurately reflect the buffer size
unsafe fn write_error(error: *mut c_char, maxlen: usize, msg: &str) {
    if !error.is_null() && maxlen > 0 {
        let bytes = msg.as_bytes();
        let len = bytes.len().min(maxlen - 1);
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), error as *mut u8, len);
        *error.add(len) = 0;
    }
}
