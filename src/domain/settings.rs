use crate::domain::transport::GAMEPAD_DEVICE_CLASS;
use crate::infrastructure::bluetooth::protocol::{DEFAULT_COMMAND_TIMEOUT_MS, DEFAULT_SOCKET_NAME};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_false")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_false(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_false(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "deck_pad".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Platform bridge daemon over a local socket
    Bridge,
    /// In-process recorder, no radio
    Simulated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportSettings {
    #[serde(default = "default_transport_kind")]
    pub kind: TransportKind,
    #[serde(default = "default_socket_name")]
    pub socket_name: String,
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            kind: default_transport_kind(),
            socket_name: default_socket_name(),
            command_timeout_ms: default_command_timeout_ms(),
        }
    }
}

fn default_transport_kind() -> TransportKind {
    TransportKind::Bridge
}
fn default_socket_name() -> String {
    DEFAULT_SOCKET_NAME.to_string()
}
fn default_command_timeout_ms() -> u64 {
    DEFAULT_COMMAND_TIMEOUT_MS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaySettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            bind_address: default_bind_address(),
            max_line_bytes: default_max_line_bytes(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0:8888".to_string()
}
fn default_max_line_bytes() -> usize {
    4096
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // Identity advertised to the host
    #[serde(default = "default_device_alias")]
    pub device_alias: String,
    #[serde(default = "default_device_class")]
    pub device_class: u32,

    // Logging Settings
    #[serde(default)]
    pub log_settings: LogSettings,

    #[serde(default)]
    pub transport: TransportSettings,

    // Network input source
    #[serde(default)]
    pub relay: RelaySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device_alias: default_device_alias(),
            device_class: default_device_class(),
            log_settings: LogSettings::default(),
            transport: TransportSettings::default(),
            relay: RelaySettings::default(),
        }
    }
}

fn default_device_alias() -> String {
    "Steam Deck Controller".to_string()
}
fn default_device_class() -> u32 {
    GAMEPAD_DEVICE_CLASS
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Ok(Self::with_path(settings_path))
    }

    /// Load from an explicit path, falling back to defaults.
    pub fn with_path(settings_path: PathBuf) -> Self {
        let settings = Self::load_from_file(&settings_path).unwrap_or_default();
        Self {
            settings,
            settings_path,
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("deck-pad");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    pub fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.device_alias, "Steam Deck Controller");
        assert_eq!(settings.device_class, 0x002508);
        assert_eq!(settings.transport.kind, TransportKind::Bridge);
        assert_eq!(settings.relay.bind_address, "0.0.0.0:8888");
        assert_eq!(settings.relay.max_line_bytes, 4096);
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"transport":{"kind":"simulated"},"relay":{"enabled":false}}"#)
                .unwrap();
        assert_eq!(settings.transport.kind, TransportKind::Simulated);
        assert_eq!(settings.transport.command_timeout_ms, 5000);
        assert!(!settings.relay.enabled);
        assert_eq!(settings.log_settings.level, "info");
    }

    #[test]
    fn save_and_reload() {
        let path = std::env::temp_dir().join(format!(
            "deck_pad_settings_{}.json",
            std::process::id()
        ));
        let mut service = SettingsService::with_path(path.clone());
        service.get_mut().device_alias = "Test Pad".to_string();
        service.save().unwrap();

        let reloaded = SettingsService::with_path(path.clone());
        assert_eq!(reloaded.get().device_alias, "Test Pad");
        let _ = fs::remove_file(path);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let service = SettingsService::with_path(PathBuf::from("/nonexistent/deck_pad.json"));
        assert_eq!(service.get().device_alias, "Steam Deck Controller");
    }
}
