//! Store settings loaded with Figment.
//!
//! Settings are read from an optional TOML file and then overridden by
//! environment variables carrying the `LABNODE_` prefix. Nested tables use a
//! double underscore as separator:
//!
//! ```text
//! LABNODE_DEFAULT_NODE_ID=bench-07
//! LABNODE_WRITE_ENVELOPE=true
//! LABNODE_CAPACITY__CEILING=16384
//! LABNODE_FILES__LEGACY=old_config.json
//! ```
//!
//! Every field has a serde default, so an empty figment yields a usable
//! configuration identical to the firmware constants.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capacity::CapacityPlanner;
use crate::limits;
use crate::model::Config;
use crate::section::SectionGroup;

/// Settings error types
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A provider failed to read or extract.
    #[error("Settings load error: {0}")]
    LoadError(#[from] Box<figment::Error>),
    /// Values parsed but are inconsistent.
    #[error("Settings validation error: {0}")]
    ValidationError(String),
}

/// Top-level store settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Directory holding the configuration files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Node identity used by the factory defaults
    #[serde(default = "default_node_id")]
    pub default_node_id: String,
    /// Station MAC; when set, the factory node id is derived from it
    #[serde(default)]
    pub mac_address: Option<String>,
    /// Firmware version reported by the section API
    #[serde(default = "default_fw_version")]
    pub fw_version: String,
    /// Emit the binary record envelope in front of saved payloads
    #[serde(default)]
    pub write_envelope: bool,
    /// Maximum size of the save journal before it is compacted
    #[serde(default = "default_journal_max_bytes")]
    pub journal_max_bytes: usize,
    /// Document buffer sizing
    #[serde(default)]
    pub capacity: CapacitySettings,
    /// File names inside `data_dir`
    #[serde(default)]
    pub files: FileNames,
}

/// Document buffer sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacitySettings {
    /// Smallest buffer ever allocated
    #[serde(default = "default_min_capacity")]
    pub min_capacity: usize,
    /// Bytes added on top of the payload size
    #[serde(default = "default_safety_margin")]
    pub safety_margin: usize,
    /// Hard upper bound on any buffer
    #[serde(default = "default_ceiling")]
    pub ceiling: usize,
    /// Growth step after a failed attempt
    #[serde(default = "default_grow_increment")]
    pub grow_increment: usize,
}

/// File names, relative to the data directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNames {
    /// Interface and peer sections
    #[serde(default = "default_interface_primary")]
    pub interface_primary: String,
    /// Read-only fallback for the interface group
    #[serde(default = "default_interface_backup")]
    pub interface_backup: String,
    /// Module and IO channel sections
    #[serde(default = "default_io_primary")]
    pub io_primary: String,
    /// Read-only fallback for the IO group
    #[serde(default = "default_io_backup")]
    pub io_backup: String,
    /// Virtual multimeter section
    #[serde(default = "default_virtual_primary")]
    pub virtual_primary: String,
    /// Read-only fallback for the virtual group
    #[serde(default = "default_virtual_backup")]
    pub virtual_backup: String,
    /// Combined file from older firmware
    #[serde(default = "default_legacy")]
    pub legacy: String,
    /// Save journal
    #[serde(default = "default_journal")]
    pub journal: String,
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_node_id() -> String {
    "labnode0001".to_string()
}

fn default_fw_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_journal_max_bytes() -> usize {
    16 * 1024
}

fn default_min_capacity() -> usize {
    limits::MIN_DOCUMENT_CAPACITY
}

fn default_safety_margin() -> usize {
    limits::DOCUMENT_SAFETY_MARGIN
}

fn default_ceiling() -> usize {
    limits::MAX_DOCUMENT_CAPACITY
}

fn default_grow_increment() -> usize {
    limits::DOCUMENT_GROW_INCREMENT
}

fn default_interface_primary() -> String {
    "interface_config.json".to_string()
}

fn default_interface_backup() -> String {
    "interface_config.bak".to_string()
}

fn default_io_primary() -> String {
    "io_config.json".to_string()
}

fn default_io_backup() -> String {
    "io_config.bak".to_string()
}

fn default_virtual_primary() -> String {
    "virtual_config.json".to_string()
}

fn default_virtual_backup() -> String {
    "virtual_config.bak".to_string()
}

fn default_legacy() -> String {
    "config.json".to_string()
}

fn default_journal() -> String {
    "config_save.log".to_string()
}

impl Default for CapacitySettings {
    fn default() -> Self {
        Self {
            min_capacity: default_min_capacity(),
            safety_margin: default_safety_margin(),
            ceiling: default_ceiling(),
            grow_increment: default_grow_increment(),
        }
    }
}

impl Default for FileNames {
    fn default() -> Self {
        Self {
            interface_primary: default_interface_primary(),
            interface_backup: default_interface_backup(),
            io_primary: default_io_primary(),
            io_backup: default_io_backup(),
            virtual_primary: default_virtual_primary(),
            virtual_backup: default_virtual_backup(),
            legacy: default_legacy(),
            journal: default_journal(),
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            default_node_id: default_node_id(),
            mac_address: None,
            fw_version: default_fw_version(),
            write_envelope: false,
            journal_max_bytes: default_journal_max_bytes(),
            capacity: CapacitySettings::default(),
            files: FileNames::default(),
        }
    }
}

impl FileNames {
    /// Primary file of a group.
    pub fn primary(&self, group: SectionGroup) -> &str {
        match group {
            SectionGroup::Interface => &self.interface_primary,
            SectionGroup::Io => &self.io_primary,
            SectionGroup::Virtual => &self.virtual_primary,
        }
    }

    /// Backup file of a group.
    pub fn backup(&self, group: SectionGroup) -> &str {
        match group {
            SectionGroup::Interface => &self.interface_backup,
            SectionGroup::Io => &self.io_backup,
            SectionGroup::Virtual => &self.virtual_backup,
        }
    }

    fn all(&self) -> [(&'static str, &str); 8] {
        [
            ("interface_primary", &self.interface_primary),
            ("interface_backup", &self.interface_backup),
            ("io_primary", &self.io_primary),
            ("io_backup", &self.io_backup),
            ("virtual_primary", &self.virtual_primary),
            ("virtual_backup", &self.virtual_backup),
            ("legacy", &self.legacy),
            ("journal", &self.journal),
        ]
    }
}

// ============================================================================
// Loading and Validation
// ============================================================================

impl StoreSettings {
    /// Environment variable prefix for overrides.
    pub const ENV_PREFIX: &'static str = "LABNODE_";

    /// Load settings from an optional TOML file merged with the environment.
    ///
    /// Precedence, highest first: `LABNODE_*` variables, the TOML file, the
    /// compiled-in defaults. A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns a `SettingsError` if extraction or validation fails.
    pub fn load_from<P: AsRef<Path>>(path: Option<P>) -> Result<Self, SettingsError> {
        let mut figment = Figment::from(Serialized::defaults(StoreSettings::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path.as_ref()));
        }
        let settings: Self = figment
            .merge(Env::prefixed(Self::ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| SettingsError::LoadError(Box::new(e)))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Check cross-field constraints.
    ///
    /// - capacities are ordered: `0 < min_capacity <= ceiling`
    /// - the growth increment is non-zero
    /// - every file name is non-empty and distinct
    /// - the default node id is non-empty
    pub fn validate(&self) -> Result<(), SettingsError> {
        let cap = &self.capacity;
        if cap.min_capacity == 0 || cap.min_capacity > cap.ceiling {
            return Err(SettingsError::ValidationError(format!(
                "Invalid capacity bounds: min_capacity {} must be non-zero and <= ceiling {}",
                cap.min_capacity, cap.ceiling
            )));
        }
        if cap.grow_increment == 0 {
            return Err(SettingsError::ValidationError(
                "capacity.grow_increment must be greater than zero".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for (key, name) in self.files.all() {
            if name.trim().is_empty() {
                return Err(SettingsError::ValidationError(format!(
                    "files.{} cannot be empty",
                    key
                )));
            }
            if !seen.insert(name) {
                return Err(SettingsError::ValidationError(format!(
                    "Duplicate file name '{}' (files.{})",
                    name, key
                )));
            }
        }

        if self.default_node_id.trim().is_empty() {
            return Err(SettingsError::ValidationError(
                "default_node_id cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Node id used by the factory configuration.
    pub fn factory_node_id(&self) -> String {
        match self.mac_address.as_deref() {
            Some(mac) if mac.chars().any(|c| c.is_ascii_hexdigit()) => {
                Config::node_id_from_mac(mac)
            }
            _ => self.default_node_id.clone(),
        }
    }

    /// Capacity planner configured from these settings.
    pub fn planner(&self) -> CapacityPlanner {
        CapacityPlanner::new(
            self.capacity.min_capacity,
            self.capacity.safety_margin,
            self.capacity.ceiling,
            self.capacity.grow_increment,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = StoreSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.capacity.ceiling, 28672);
        assert_eq!(settings.files.primary(SectionGroup::Io), "io_config.json");
        assert_eq!(
            settings.files.backup(SectionGroup::Interface),
            "interface_config.bak"
        );
        assert!(!settings.write_envelope);
    }

    #[test]
    fn test_invalid_capacity_order() {
        let mut settings = StoreSettings::default();
        settings.capacity.min_capacity = 4096;
        settings.capacity.ceiling = 2048;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("min_capacity"));
    }

    #[test]
    fn test_duplicate_file_names() {
        let mut settings = StoreSettings::default();
        settings.files.io_backup = settings.files.io_primary.clone();
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("Duplicate file name 'io_config.json'"));
    }

    #[test]
    fn test_factory_node_id_prefers_mac() {
        let mut settings = StoreSettings::default();
        assert_eq!(settings.factory_node_id(), "labnode0001");
        settings.mac_address = Some("5C:CF:7F:00:1a:2b".into());
        assert_eq!(settings.factory_node_id(), "labnode1A2B");
    }

    #[test]
    fn test_empty_node_id() {
        let mut settings = StoreSettings::default();
        settings.default_node_id = "  ".into();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_load_from_toml_and_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "labnode.toml",
                r#"
                default_node_id = "bench07"
                write_envelope = true

                [capacity]
                ceiling = 16384
                "#,
            )?;
            jail.set_env("LABNODE_FILES__LEGACY", "old.json");

            let settings = StoreSettings::load_from(Some("labnode.toml"))
                .map_err(|e| e.to_string())?;
            assert_eq!(settings.default_node_id, "bench07");
            assert!(settings.write_envelope);
            assert_eq!(settings.capacity.ceiling, 16384);
            assert_eq!(settings.capacity.min_capacity, 1024);
            assert_eq!(settings.files.legacy, "old.json");
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("LABNODE_CAPACITY__GROW_INCREMENT", "0");
            let result = StoreSettings::load_from(None::<&str>);
            assert!(matches!(result, Err(SettingsError::ValidationError(_))));
            Ok(())
        });
    }
}
