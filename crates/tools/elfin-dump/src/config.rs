//! Defaults loaded from `elfin.toml`.
//!
//! Every field is optional. A value given on the command line wins over the
//! file, and the file wins over the built-in default.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::filter::{BindingFilter, TableKind, TypeFilter};
use crate::output::OutputFormat;

/// Config file looked up in the current directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "elfin.toml";

/// Top-level configuration.
#[derive(Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// `[symbols]` table.
    pub symbols: SymbolDefaults,
    /// `[output]` table.
    pub output: OutputDefaults,
}

/// Defaults for the `symbols` and `lookup` subcommands.
#[derive(Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SymbolDefaults {
    /// Symbol tables to walk.
    pub tables: Vec<TableKind>,
    /// Symbol type to keep.
    pub kind: TypeFilter,
    /// Symbol binding to keep.
    pub binding: BindingFilter,
    /// Demangle names.
    pub demangle: bool,
}

impl Default for SymbolDefaults {
    fn default() -> Self {
        Self {
            tables: vec![TableKind::Dynsym],
            kind: TypeFilter::default(),
            binding: BindingFilter::default(),
            demangle: false,
        }
    }
}

/// Defaults for every subcommand's output.
#[derive(Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputDefaults {
    /// Output format.
    pub format: OutputFormat,
}

impl Config {
    /// Load the configuration.
    ///
    /// With `explicit` set, that file must exist. Otherwise
    /// [`DEFAULT_CONFIG_FILE`] is read if present and built-in defaults are
    /// used if not.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let (path, required) = match explicit {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if !required && err.kind() == io::ErrorKind::NotFound => {
                log::debug!("no {} found, using built-in defaults", path.display());
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to read {}", path.display()));
            }
        };
        let config = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        log::debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.symbols.tables, [TableKind::Dynsym]);
        assert_eq!(config.symbols.kind, TypeFilter::Func);
        assert_eq!(config.symbols.binding, BindingFilter::Global);
        assert_eq!(config.output.format, OutputFormat::Text);
    }

    #[test]
    fn partial_tables() {
        let config = Config::from_toml(
            r#"
            [symbols]
            tables = ["symtab", "dynsym"]
            binding = "any"
            demangle = true

            [output]
            format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.symbols.tables, [TableKind::Symtab, TableKind::Dynsym]);
        assert_eq!(config.symbols.kind, TypeFilter::Func);
        assert_eq!(config.symbols.binding, BindingFilter::Any);
        assert!(config.symbols.demangle);
        assert_eq!(config.output.format, OutputFormat::Json);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Config::from_toml("[symbols]\ncolour = true\n").is_err());
        assert!(Config::from_toml("[symbols]\nkind = \"function\"\n").is_err());
    }

    #[test]
    fn explicit_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        let err = Config::load(Some(&missing)).unwrap_err();
        assert!(format!("{err:#}").contains("missing.toml"));
    }

    #[test]
    fn explicit_file_is_read() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[output]\nformat = \"json\"").unwrap();
        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.output.format, OutputFormat::Json);
    }

    #[test]
    fn parse_errors_name_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[output").unwrap();
        let err = Config::load(Some(file.path())).unwrap_err();
        assert!(format!("{err}").starts_with("Failed to parse"));
    }
}
