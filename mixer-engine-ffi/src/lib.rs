//! FFI bindings for the Volume Mixer engine.
//!
//! This crate provides C ABI functions for use from C# via P/Invoke.
//! All functions use panic::catch_unwind to prevent Rust panics from
//! unwinding across the FFI boundary. Structured results are returned as
//! JSON strings that the caller frees with mixer_engine_free_string().

use serde::Serialize;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::ffi::{c_char, c_void, CStr, CString};
use std::panic;
use std::ptr;
use std::sync::Arc;
use tracing::warn;
use volume_mixer_rs::{
    init_logging, ActionInstance, ActionKind, ConfigError, DataFlow, DeviceRole, EngineConfig,
    MixerService, RefreshOutcome, SessionSnapshot, VariableValue,
};

// ============================================================================
// Error Handling
// ============================================================================

/// Error codes returned by FFI functions.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Success = 0,
    InvalidHandle = -1,
    InvalidArgument = -2,
    JsonError = -5,
    InvalidConfig = -6,
    RefreshFailed = -7,
    Panic = -99,
}

impl From<&ConfigError> for ErrorCode {
    fn from(err: &ConfigError) -> Self {
        match err {
            ConfigError::Json(_) => ErrorCode::JsonError,
            _ => ErrorCode::InvalidConfig,
        }
    }
}

/// Thread-local storage for the last error.
thread_local! {
    static LAST_ERROR: RefCell<Option<(ErrorCode, String)>> = const { RefCell::new(None) };
}

fn set_last_error(code: ErrorCode, message: impl Into<String>) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = Some((code, message.into()));
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

type FfiResult<T> = Result<T, (ErrorCode, String)>;

// ============================================================================
// Data Types for JSON Serialization
// ============================================================================

/// An active device for configuration forms.
#[derive(Debug, Serialize)]
pub struct DeviceDto {
    pub id: String,
    pub name: String,
    pub is_default: bool,
    pub is_default_communication: bool,
}

/// Response containing a list of devices.
#[derive(Debug, Serialize)]
pub struct DeviceListResponse {
    pub devices: Vec<DeviceDto>,
}

/// Response containing application names with audio sessions.
#[derive(Debug, Serialize)]
pub struct AppListResponse {
    pub apps: Vec<String>,
}

/// Response containing per-application session state.
#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionSnapshot>,
}

/// Response after saving an action configuration.
#[derive(Debug, Serialize)]
pub struct ConfigureResponse {
    pub summary: String,
}

/// An action kind the host can instantiate.
#[derive(Debug, Serialize)]
pub struct ActionKindDto {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub can_configure: bool,
}

// ============================================================================
// Handle Types
// ============================================================================

/// Opaque handle to the engine. Actually points to a MixerEngine struct.
pub type MixerEngineHandle = *mut c_void;

/// Opaque handle to a configured button action.
pub type MixerActionHandle = *mut c_void;

struct MixerEngine {
    service: Arc<MixerService>,
}

impl MixerEngine {
    fn new(config: EngineConfig) -> Self {
        let service = Arc::new(MixerService::new(config));
        service.enable();
        Self { service }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Allocate a C string from a Rust string. Caller must free with mixer_engine_free_string.
fn alloc_c_string(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cs) => cs.into_raw(),
        // Interior NUL; hand back an empty string instead
        Err(_) => CString::default().into_raw(),
    }
}

/// Parse a C string to a Rust string slice.
unsafe fn parse_c_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok()
}

unsafe fn engine_ref<'a>(handle: MixerEngineHandle) -> FfiResult<&'a MixerEngine> {
    (handle as *const MixerEngine)
        .as_ref()
        .ok_or((ErrorCode::InvalidHandle, "Null engine handle".to_string()))
}

unsafe fn action_ref<'a>(handle: MixerActionHandle) -> FfiResult<&'a ActionInstance> {
    (handle as *const ActionInstance)
        .as_ref()
        .ok_or((ErrorCode::InvalidHandle, "Null action handle".to_string()))
}

fn to_json<T: Serialize>(value: &T) -> FfiResult<String> {
    serde_json::to_string(value).map_err(|e| (ErrorCode::JsonError, e.to_string()))
}

/// Parse engine configuration; null or blank input means defaults.
fn parse_engine_config(json: Option<&str>) -> Result<EngineConfig, ConfigError> {
    match json.filter(|j| !j.trim().is_empty()) {
        Some(json) => EngineConfig::from_json(json),
        None => Ok(EngineConfig::default()),
    }
}

/// Finish a call returning a JSON string.
fn string_result(
    result: std::thread::Result<FfiResult<String>>,
    context: &str,
) -> *mut c_char {
    match result {
        Ok(Ok(json)) => alloc_c_string(&json),
        Ok(Err((code, message))) => {
            set_last_error(code, message);
            ptr::null_mut()
        }
        Err(_) => {
            set_last_error(ErrorCode::Panic, format!("Panic during {context}"));
            ptr::null_mut()
        }
    }
}

/// Finish a call returning a status code.
fn code_result(result: std::thread::Result<FfiResult<()>>, context: &str) -> i32 {
    match result {
        Ok(Ok(())) => ErrorCode::Success as i32,
        Ok(Err((code, message))) => {
            set_last_error(code, message);
            code as i32
        }
        Err(_) => {
            set_last_error(ErrorCode::Panic, format!("Panic during {context}"));
            ErrorCode::Panic as i32
        }
    }
}

fn flow_from_raw(flow: u32) -> FfiResult<DataFlow> {
    match flow {
        0 => Ok(DataFlow::Render),
        1 => Ok(DataFlow::Capture),
        _ => Err((ErrorCode::InvalidArgument, format!("Invalid flow: {flow}"))),
    }
}

// ============================================================================
// FFI Functions - Engine Lifecycle
// ============================================================================

/// Create a new engine instance and start its refresh timer.
///
/// # Arguments
/// * `config_json` - JSON configuration string (can be null for defaults).
///   Invalid configuration is logged and replaced by defaults.
///
/// # Returns
/// Handle to the engine, or null on failure. Check mixer_engine_last_error_code() on failure.
///
/// # Safety
/// The returned handle must be freed with mixer_engine_destroy().
#[no_mangle]
pub extern "C" fn mixer_engine_create(config_json: *const c_char) -> MixerEngineHandle {
    clear_last_error();

    let result = panic::catch_unwind(|| {
        let config = match parse_engine_config(unsafe { parse_c_str(config_json) }) {
            Ok(config) => {
                init_logging(config.log_level.as_deref());
                config
            }
            Err(e) => {
                init_logging(None);
                warn!("Ignoring engine configuration: {}", e);
                EngineConfig::default()
            }
        };

        let engine = Box::new(MixerEngine::new(config));
        Box::into_raw(engine) as MixerEngineHandle
    });

    match result {
        Ok(handle) => handle,
        Err(_) => {
            set_last_error(ErrorCode::Panic, "Panic during engine creation");
            ptr::null_mut()
        }
    }
}

/// Stop the refresh timer. The handle stays valid; calling twice is harmless.
///
/// # Returns
/// 0 on success, negative error code on failure.
#[no_mangle]
pub extern "C" fn mixer_engine_shutdown(handle: MixerEngineHandle) -> i32 {
    clear_last_error();

    let result = panic::catch_unwind(|| {
        let engine = unsafe { engine_ref(handle)? };
        engine.service.shutdown();
        Ok(())
    });
    code_result(result, "engine shutdown")
}

/// Destroy an engine instance.
///
/// # Safety
/// The handle must have been created by mixer_engine_create() and must not be used after
/// this call. Actions created from it keep the engine's state alive until they are destroyed.
#[no_mangle]
pub extern "C" fn mixer_engine_destroy(handle: MixerEngineHandle) {
    if handle.is_null() {
        return;
    }

    let _ = panic::catch_unwind(|| {
        let engine = unsafe { Box::from_raw(handle as *mut MixerEngine) };
        engine.service.shutdown();
    });
}

// ============================================================================
// FFI Functions - Engine Queries
// ============================================================================

/// Run a refresh cycle now.
///
/// # Returns
/// 0 when the cycle ran or one was already running, negative error code otherwise.
#[no_mangle]
pub extern "C" fn mixer_engine_refresh(handle: MixerEngineHandle) -> i32 {
    clear_last_error();

    let result = panic::catch_unwind(|| {
        let engine = unsafe { engine_ref(handle)? };
        match engine.service.refresh() {
            RefreshOutcome::Completed | RefreshOutcome::Skipped => Ok(()),
            RefreshOutcome::Failed => Err((
                ErrorCode::RefreshFailed,
                "Refresh cycle failed".to_string(),
            )),
        }
    });
    code_result(result, "refresh")
}

/// Get every published variable.
///
/// # Returns
/// JSON object mapping variable names to string, integer or boolean values.
/// Caller must free with mixer_engine_free_string(). Returns null on failure.
#[no_mangle]
pub extern "C" fn mixer_engine_variables(handle: MixerEngineHandle) -> *mut c_char {
    clear_last_error();

    let result = panic::catch_unwind(|| {
        let engine = unsafe { engine_ref(handle)? };
        let variables: BTreeMap<String, VariableValue> = engine.service.variables().snapshot();
        to_json(&variables)
    });
    string_result(result, "variable snapshot")
}

/// Get the active devices for a direction.
///
/// # Arguments
/// * `handle` - Engine handle
/// * `flow` - 0 = playback, 1 = recording
///
/// # Returns
/// JSON string containing the device list. Caller must free with mixer_engine_free_string().
/// Returns null on failure.
#[no_mangle]
pub extern "C" fn mixer_engine_get_devices(handle: MixerEngineHandle, flow: u32) -> *mut c_char {
    clear_last_error();

    let result = panic::catch_unwind(|| {
        let engine = unsafe { engine_ref(handle)? };
        let flow = flow_from_raw(flow)?;

        let service = &engine.service;
        let default_id = service
            .default_device(flow, DeviceRole::Multimedia)
            .map(|d| d.id);
        let comm_id = service
            .default_device(flow, DeviceRole::Communications)
            .map(|d| d.id);

        let devices = service
            .list_devices(flow)
            .into_iter()
            .map(|d| DeviceDto {
                is_default: default_id.as_deref() == Some(d.id.as_str()),
                is_default_communication: comm_id.as_deref() == Some(d.id.as_str()),
                id: d.id,
                name: d.name,
            })
            .collect();

        to_json(&DeviceListResponse { devices })
    });
    string_result(result, "device enumeration")
}

/// Get the names of applications with an audio session.
///
/// # Returns
/// JSON string `{"apps": [...]}`. Caller must free with mixer_engine_free_string().
#[no_mangle]
pub extern "C" fn mixer_engine_get_apps(handle: MixerEngineHandle) -> *mut c_char {
    clear_last_error();

    let result = panic::catch_unwind(|| {
        let engine = unsafe { engine_ref(handle)? };
        to_json(&AppListResponse {
            apps: engine.service.list_apps(),
        })
    });
    string_result(result, "app enumeration")
}

/// Get volume and mute state of every application with a session.
///
/// # Returns
/// JSON string `{"sessions": [...]}`. Caller must free with mixer_engine_free_string().
#[no_mangle]
pub extern "C" fn mixer_engine_get_sessions(handle: MixerEngineHandle) -> *mut c_char {
    clear_last_error();

    let result = panic::catch_unwind(|| {
        let engine = unsafe { engine_ref(handle)? };
        to_json(&SessionListResponse {
            sessions: engine.service.snapshot_sessions(),
        })
    });
    string_result(result, "session snapshot")
}

// ============================================================================
// FFI Functions - Actions
// ============================================================================

/// List the action kinds.
///
/// # Returns
/// JSON array of `{id, name, description, can_configure}`. Caller must free with
/// mixer_engine_free_string().
#[no_mangle]
pub extern "C" fn mixer_action_kinds() -> *mut c_char {
    clear_last_error();

    let result = panic::catch_unwind(|| {
        let kinds: Vec<ActionKindDto> = ActionKind::ALL
            .into_iter()
            .map(|k| ActionKindDto {
                id: k.id(),
                name: k.display_name(),
                description: k.description(),
                can_configure: k.can_configure(),
            })
            .collect();
        to_json(&kinds)
    });
    string_result(result, "action kind listing")
}

/// Create an action bound to an engine and mark it loaded.
///
/// # Arguments
/// * `engine` - Engine handle
/// * `kind` - Action kind id, e.g. "set_app_volume"
/// * `config_json` - Stored configuration (can be null for an unconfigured action)
///
/// # Returns
/// Handle to the action, or null on failure.
///
/// # Safety
/// The returned handle must be freed with mixer_action_destroy().
#[no_mangle]
pub extern "C" fn mixer_action_create(
    engine: MixerEngineHandle,
    kind: *const c_char,
    config_json: *const c_char,
) -> MixerActionHandle {
    clear_last_error();

    let result = panic::catch_unwind(|| {
        let engine = unsafe { engine_ref(engine)? };
        let kind: ActionKind = unsafe { parse_c_str(kind) }
            .ok_or((ErrorCode::InvalidArgument, "Invalid action kind".to_string()))?
            .parse()
            .map_err(|e| (ErrorCode::InvalidArgument, e))?;
        let configuration = unsafe { parse_c_str(config_json) }.map(str::to_string);

        let action = ActionInstance::new(engine.service.clone(), kind, configuration);
        action.on_loaded();
        Ok(Box::into_raw(Box::new(action)) as MixerActionHandle)
    });

    match result {
        Ok(Ok(handle)) => handle,
        Ok(Err((code, message))) => {
            set_last_error(code, message);
            ptr::null_mut()
        }
        Err(_) => {
            set_last_error(ErrorCode::Panic, "Panic during action creation");
            ptr::null_mut()
        }
    }
}

/// Validate and save a new configuration.
///
/// # Returns
/// JSON string `{"summary": "..."}`, or null if the configuration was rejected
/// (the previous configuration is kept). Caller must free with mixer_engine_free_string().
#[no_mangle]
pub extern "C" fn mixer_action_configure(
    action: MixerActionHandle,
    config_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let result = panic::catch_unwind(|| {
        let action = unsafe { action_ref(action)? };
        let json = unsafe { parse_c_str(config_json) }
            .ok_or((ErrorCode::InvalidArgument, "Invalid configuration".to_string()))?;

        let summary = action
            .configure(json)
            .map_err(|e| (ErrorCode::from(&e), e.to_string()))?;
        to_json(&ConfigureResponse { summary })
    });
    string_result(result, "action configuration")
}

/// Get the configuration summary of an action.
///
/// # Returns
/// Summary string. Caller must free with mixer_engine_free_string().
#[no_mangle]
pub extern "C" fn mixer_action_summary(action: MixerActionHandle) -> *mut c_char {
    clear_last_error();

    let result = panic::catch_unwind(|| {
        let action = unsafe { action_ref(action)? };
        Ok(action.summary())
    });
    string_result(result, "action summary")
}

/// Run an action. Unconfigured actions do nothing and still succeed.
///
/// # Returns
/// 0 on success, negative error code on failure.
#[no_mangle]
pub extern "C" fn mixer_action_trigger(action: MixerActionHandle) -> i32 {
    clear_last_error();

    let result = panic::catch_unwind(|| {
        let action = unsafe { action_ref(action)? };
        action.trigger();
        Ok(())
    });
    code_result(result, "action trigger")
}

/// The button was deleted by the user; release its tracked app.
///
/// # Returns
/// 0 on success, negative error code on failure.
#[no_mangle]
pub extern "C" fn mixer_action_delete(action: MixerActionHandle) -> i32 {
    clear_last_error();

    let result = panic::catch_unwind(|| {
        let action = unsafe { action_ref(action)? };
        action.on_deleted();
        Ok(())
    });
    code_result(result, "action delete")
}

/// Free an action handle.
///
/// # Safety
/// The handle must have been created by mixer_action_create() and must not be used after
/// this call.
#[no_mangle]
pub extern "C" fn mixer_action_destroy(action: MixerActionHandle) {
    if action.is_null() {
        return;
    }

    let _ = panic::catch_unwind(|| unsafe {
        let _ = Box::from_raw(action as *mut ActionInstance);
    });
}

// ============================================================================
// FFI Functions - Memory Management
// ============================================================================

/// Free a string allocated by this library.
///
/// # Safety
/// The pointer must have been returned by one of the mixer_* functions.
/// Do not call this on strings from other sources.
#[no_mangle]
pub extern "C" fn mixer_engine_free_string(ptr: *mut c_char) {
    if ptr.is_null() {
        return;
    }

    let _ = panic::catch_unwind(|| unsafe {
        let _ = CString::from_raw(ptr);
    });
}

// ============================================================================
// FFI Functions - Error Handling
// ============================================================================

/// Get the last error code.
///
/// # Returns
/// The error code from the last failed operation, or 0 if no error.
#[no_mangle]
pub extern "C" fn mixer_engine_last_error_code() -> i32 {
    LAST_ERROR.with(|e| {
        e.borrow()
            .as_ref()
            .map(|(code, _)| *code as i32)
            .unwrap_or(0)
    })
}

/// Get the last error message.
///
/// # Returns
/// Error message string. Caller must free with mixer_engine_free_string().
/// Returns null if no error.
#[no_mangle]
pub extern "C" fn mixer_engine_last_error_message() -> *mut c_char {
    LAST_ERROR.with(|e| {
        e.borrow()
            .as_ref()
            .map(|(_, msg)| alloc_c_string(msg))
            .unwrap_or(ptr::null_mut())
    })
}

// ============================================================================
// FFI Functions - Utility
// ============================================================================

/// Get the library version.
///
/// # Returns
/// Version string. Caller must free with mixer_engine_free_string().
#[no_mangle]
pub extern "C" fn mixer_engine_version() -> *mut c_char {
    alloc_c_string(env!("CARGO_PKG_VERSION"))
}

// ============================================================================
// Tests
// ============================================================================
