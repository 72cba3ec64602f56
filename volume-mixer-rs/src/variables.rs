//! Published variables.
//!
//! The engine writes name/value pairs into a [`VariableSink`]; the host
//! reads them from its own thread and shows them on buttons.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Mutex;

pub const DEFAULT_DEVICE: &str = "volumemixer_default_device";
pub const DEFAULT_DEVICE_ID: &str = "volumemixer_default_device_id";
pub const COMM_DEVICE: &str = "volumemixer_comm_device";
pub const DEFAULT_MIC: &str = "volumemixer_default_mic";
pub const COMM_MIC: &str = "volumemixer_comm_mic";
pub const DEVICES: &str = "volumemixer_devices";

/// Variable holding an application's volume (0-100).
pub fn app_volume_variable(app_name: &str) -> String {
    format!("volumemixer_app_{}_volume", sanitize_variable_name(app_name))
}

/// Variable holding an application's mute state.
pub fn app_muted_variable(app_name: &str) -> String {
    format!("volumemixer_app_{}_muted", sanitize_variable_name(app_name))
}

/// Turn a process name into a valid variable name fragment.
///
/// "My App!!" becomes `my_app`, "123Tool" becomes `app_123tool`.
pub fn sanitize_variable_name(name: &str) -> String {
    let lower = name.to_lowercase();

    let mut cleaned = String::with_capacity(lower.len());
    let mut in_run = false;
    for c in lower.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
            cleaned.push(c);
            in_run = false;
        } else if !in_run {
            cleaned.push('_');
            in_run = true;
        }
    }

    let cleaned = cleaned.trim_matches('_');
    if cleaned.is_empty() {
        return "unknown".to_string();
    }
    if cleaned.starts_with(|c: char| c.is_ascii_lowercase()) {
        cleaned.to_string()
    } else {
        format!("app_{cleaned}")
    }
}

/// A published value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum VariableValue {
    String(String),
    Integer(i64),
    Bool(bool),
}

impl From<&str> for VariableValue {
    fn from(value: &str) -> Self {
        VariableValue::String(value.to_string())
    }
}

impl From<String> for VariableValue {
    fn from(value: String) -> Self {
        VariableValue::String(value)
    }
}

impl From<u8> for VariableValue {
    fn from(value: u8) -> Self {
        VariableValue::Integer(value.into())
    }
}

impl From<bool> for VariableValue {
    fn from(value: bool) -> Self {
        VariableValue::Bool(value)
    }
}

/// Destination for published variables.
pub trait VariableSink: Send + Sync {
    fn set(&self, name: &str, value: VariableValue);
    fn delete(&self, name: &str);
}

/// Thread-safe in-memory variable table the host polls.
#[derive(Debug, Default)]
pub struct VariableStore {
    values: Mutex<BTreeMap<String, VariableValue>>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<VariableValue> {
        self.lock().get(name).cloned()
    }

    /// Copy of every variable, ordered by name.
    pub fn snapshot(&self) -> BTreeMap<String, VariableValue> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, VariableValue>> {
        // A panicking writer cannot leave a half-written map entry behind
        self.values.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl VariableSink for VariableStore {
    fn set(&self, name: &str, value: VariableValue) {
        self.lock().insert(name.to_string(), value);
    }

    fn delete(&self, name: &str) {
        self.lock().remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_examples() {
        assert_eq!(sanitize_variable_name("My App!!"), "my_app");
        assert_eq!(sanitize_variable_name("123Tool"), "app_123tool");
        assert_eq!(sanitize_variable_name("Spotify"), "spotify");
    }

    #[test]
    fn test_sanitize_collapses_runs_and_trims() {
        assert_eq!(sanitize_variable_name("  Foo -- Bar  "), "foo_bar");
        assert_eq!(sanitize_variable_name("a__b"), "a__b");
        assert_eq!(sanitize_variable_name("Überlauf.exe"), "berlauf_exe");
    }

    #[test]
    fn test_sanitize_empty_and_symbol_only() {
        assert_eq!(sanitize_variable_name(""), "unknown");
        assert_eq!(sanitize_variable_name("!!!"), "unknown");
        assert_eq!(sanitize_variable_name("_"), "unknown");
    }

    #[test]
    fn test_app_variable_names() {
        assert_eq!(app_volume_variable("Spotify"), "volumemixer_app_spotify_volume");
        assert_eq!(app_muted_variable("My App!!"), "volumemixer_app_my_app_muted");
    }

    #[test]
    fn test_store_set_and_delete() {
        let store = VariableStore::new();
        store.set(DEFAULT_DEVICE, "Speakers".into());
        store.set("volumemixer_app_spotify_volume", 70u8.into());
        store.set("volumemixer_app_spotify_muted", true.into());

        assert_eq!(store.len(), 3);
        assert_eq!(store.get("volumemixer_app_spotify_volume"), Some(VariableValue::Integer(70)));

        store.delete("volumemixer_app_spotify_volume");
        assert!(store.get("volumemixer_app_spotify_volume").is_none());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_values_serialize_untagged() {
        let json = serde_json::to_string(&vec![
            VariableValue::from("x"),
            VariableValue::from(5u8),
            VariableValue::from(false),
        ])
        .unwrap();
        assert_eq!(json, r#"["x",5,false]"#);
    }
}
