//! Optional TOML configuration for the `pack` operation.
//!
//! ```toml
//! version = "1.3.4.2"
//! alignment = 16
//! prefix = "res://"
//! exclude = ["*.import"]
//! remove_backup = false
//! ```

use crate::archive::{PackOptions, PackVersion, DEFAULT_ALIGNMENT};
use crate::error::{PckError, Result};
use crate::scan::{ScanOptions, DEFAULT_PREFIX};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackConfig {
    pub version: Option<String>,
    pub alignment: Option<u64>,
    pub prefix: Option<String>,
    pub exclude: Vec<String>,
    pub remove_backup: Option<bool>,
}

impl PackConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| PckError::on_open(path, e))?;
        toml::from_str(&text).map_err(|e| PckError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Pack options from this config; a version is required
    pub fn pack_options(&self) -> Result<PackOptions> {
        let version = self
            .version
            .as_deref()
            .ok_or_else(|| PckError::InvalidArgument("no pack version configured".to_string()))?;

        Ok(PackOptions::new(PackVersion::parse(version)?)
            .with_alignment(self.alignment.unwrap_or(DEFAULT_ALIGNMENT))
            .with_remove_backup(self.remove_backup.unwrap_or(false)))
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            prefix: self
                .prefix
                .clone()
                .unwrap_or_else(|| DEFAULT_PREFIX.to_string()),
            exclude: self.exclude.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config() {
        let config = PackConfig::from_toml_str(
            r#"
            version = "1.3.4.2"
            alignment = 16
            prefix = "res://mods/"
            exclude = ["*.import", "*.tmp"]
            remove_backup = true
            "#,
        )
        .unwrap();

        let options = config.pack_options().unwrap();
        assert_eq!(options.version, PackVersion::new(1, 3, 4, 2));
        assert_eq!(options.alignment, 16);
        assert!(options.remove_backup);

        let scan = config.scan_options();
        assert_eq!(scan.prefix, "res://mods/");
        assert_eq!(scan.exclude.len(), 2);
    }

    #[test]
    fn test_defaults() {
        let config = PackConfig::from_toml_str(r#"version = "2.4.2""#).unwrap();
        let options = config.pack_options().unwrap();
        assert_eq!(options.alignment, DEFAULT_ALIGNMENT);
        assert!(!options.remove_backup);
        assert_eq!(config.scan_options().prefix, "res://");
    }

    #[test]
    fn test_invalid_configs() {
        assert!(matches!(
            PackConfig::from_toml_str("colour = 1"),
            Err(PckError::Config(_))
        ));
        assert!(matches!(
            PackConfig::default().pack_options(),
            Err(PckError::InvalidArgument(_))
        ));
        assert!(matches!(
            PackConfig::from_toml_str(r#"version = "1234""#)
                .unwrap()
                .pack_options(),
            Err(PckError::VersionInvalid(_))
        ));
    }
}
