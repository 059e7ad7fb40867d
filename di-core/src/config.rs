//! JSON configuration file
//!
//! Optional on-disk configuration with the same shape the CLI builds: a
//! default idle threshold, per-disk overrides, and the spin-down command
//! choice. CLI flags are applied after the file, so flags win.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use di_error::{DiskIdleError, Result};

use crate::constants::idle;
use crate::port::SpinDownCommand;
use crate::rules::RuleTable;

/// A per-disk threshold override in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskRule {
    /// Device path, e.g. `\\.\PhysicalDrive1`.
    pub name: String,
    /// Idle threshold in seconds; zero means never spin down.
    pub idle_secs: u64,
}

/// Daemon configuration, loadable from a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Fallback idle threshold in seconds for disks without a specific rule.
    #[serde(default = "default_idle_secs")]
    pub default_idle_secs: u64,
    /// Which power transition to issue on spin-down.
    #[serde(default)]
    pub command: SpinDownCommand,
    /// Per-disk overrides, evaluated in order before the default.
    #[serde(default)]
    pub disks: Vec<DiskRule>,
}

fn default_idle_secs() -> u64 {
    idle::SHIPPED_DEFAULT_IDLE_SECS
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            default_idle_secs: default_idle_secs(),
            command: SpinDownCommand::default(),
            disks: Vec::new(),
        }
    }
}

impl DaemonConfig {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| DiskIdleError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: DaemonConfig = serde_json::from_str(&content)?;
        config.validate()?;
        debug!(path = %path.display(), rules = config.disks.len(), "loaded config");
        Ok(config)
    }

    /// Reject empty disk names and duplicate entries. Duplicates would be
    /// silently shadowed by first-match-wins resolution, which is almost
    /// certainly a typo in the file.
    pub fn validate(&self) -> Result<()> {
        for (i, rule) in self.disks.iter().enumerate() {
            if rule.name.trim().is_empty() {
                return Err(DiskIdleError::InvalidConfig {
                    field: format!("disks[{i}].name"),
                    reason: "disk name must not be empty".to_string(),
                });
            }
            if self.disks[..i].iter().any(|other| other.name == rule.name) {
                return Err(DiskIdleError::InvalidConfig {
                    field: format!("disks[{i}].name"),
                    reason: format!("duplicate entry for {}", rule.name),
                });
            }
        }
        Ok(())
    }

    /// Build the rule table this configuration describes.
    pub fn to_rule_table(&self) -> RuleTable {
        let mut table = RuleTable::new(Duration::from_secs(self.default_idle_secs));
        for rule in &self.disks {
            table.add_rule(rule.name.clone(), Duration::from_secs(rule.idle_secs));
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_full_config() {
        let file = write_config(
            r#"{
                "default_idle_secs": 300,
                "command": "idle_immediate",
                "disks": [
                    { "name": "\\\\.\\PhysicalDrive1", "idle_secs": 120 },
                    { "name": "\\\\.\\PhysicalDrive2", "idle_secs": 0 }
                ]
            }"#,
        );

        let config = DaemonConfig::load(file.path()).unwrap();
        assert_eq!(config.default_idle_secs, 300);
        assert_eq!(config.command, SpinDownCommand::IdleImmediate);
        assert_eq!(config.disks.len(), 2);

        let table = config.to_rule_table();
        assert_eq!(
            table.resolve(r"\\.\PhysicalDrive1"),
            Duration::from_secs(120)
        );
        assert_eq!(
            table.resolve(r"\\.\PhysicalDrive2"),
            Duration::from_secs(0)
        );
        assert_eq!(
            table.resolve(r"\\.\PhysicalDrive0"),
            Duration::from_secs(300)
        );
    }

    #[test]
    fn missing_fields_take_defaults() {
        let file = write_config("{}");
        let config = DaemonConfig::load(file.path()).unwrap();
        assert_eq!(config.default_idle_secs, idle::SHIPPED_DEFAULT_IDLE_SECS);
        assert_eq!(config.command, SpinDownCommand::StandbyImmediate);
        assert!(config.disks.is_empty());
    }

    #[test]
    fn rejects_empty_disk_name() {
        let file = write_config(r#"{ "disks": [ { "name": "  ", "idle_secs": 60 } ] }"#);
        assert!(matches!(
            DaemonConfig::load(file.path()),
            Err(DiskIdleError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn rejects_duplicate_disk_names() {
        let file = write_config(
            r#"{ "disks": [
                { "name": "d0", "idle_secs": 60 },
                { "name": "d0", "idle_secs": 120 }
            ] }"#,
        );
        assert!(matches!(
            DaemonConfig::load(file.path()),
            Err(DiskIdleError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn rejects_malformed_json() {
        let file = write_config("{ not json");
        assert!(matches!(
            DaemonConfig::load(file.path()),
            Err(DiskIdleError::JsonParse(_))
        ));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        assert!(matches!(
            DaemonConfig::load(Path::new("/nonexistent/diskidle.json")),
            Err(DiskIdleError::FileRead { .. })
        ));
    }
}
