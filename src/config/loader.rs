//! Configuration loading from files, inline documents and the environment.
//!
//! Every source produces the same intermediate [`RawConfig`]: catalog keys
//! mapped to untyped TOML values. Names that are not in the catalog are kept
//! aside and reported by the validator together with every other violation,
//! so a typo never falls back to a default silently.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::catalog::{Catalog, OptionKey, ENV_PREFIX};
use crate::config::error::{ConfigError, ValidationError};
use crate::config::store::ConfigStore;
use crate::config::validation::resolve;
use crate::observability::metrics;

/// Where a raw value was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    File(PathBuf),
    Inline,
    Env(String),
}

impl Origin {
    /// Attach this origin to violations found in a value it supplied.
    pub(crate) fn attribute(&self, errors: Vec<ValidationError>) -> Vec<ValidationError> {
        match self {
            Origin::Env(var) => errors
                .into_iter()
                .map(|source| ValidationError::FromEnv {
                    var: var.clone(),
                    source: Box::new(source),
                })
                .collect(),
            _ => errors,
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::File(path) => write!(f, "{}", path.display()),
            Origin::Inline => f.write_str("inline document"),
            Origin::Env(var) => write!(f, "environment variable {}", var),
        }
    }
}

/// One supplied option before coercion.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEntry {
    pub value: toml::Value,
    pub origin: Origin,
}

/// Catalog keys mapped to the values a source supplied for them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawConfig {
    entries: BTreeMap<OptionKey, RawEntry>,
    /// Supplied names that are not catalog options.
    unknown: Vec<String>,
}

impl RawConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a raw mapping from `SGXLKL_*` environment variables.
    ///
    /// Variables without the prefix are ignored; prefixed variables that do not
    /// name a catalog option are recorded as unknown.
    pub fn from_env<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut raw = RawConfig::new();

        for (name, value) in vars {
            let name = name.as_ref();
            let Some(option) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match OptionKey::from_name(&option.to_ascii_lowercase()) {
                Some(key) => raw.insert(
                    key,
                    toml::Value::String(value.into()),
                    Origin::Env(name.to_string()),
                ),
                None => raw.unknown.push(name.to_string()),
            }
        }

        raw
    }

    pub fn insert(&mut self, key: OptionKey, value: toml::Value, origin: Origin) {
        self.entries.insert(key, RawEntry { value, origin });
    }

    pub fn get(&self, key: OptionKey) -> Option<&RawEntry> {
        self.entries.get(&key)
    }

    /// Supplied names that matched no catalog option.
    pub fn unknown_keys(&self) -> &[String] {
        &self.unknown
    }

    /// Supplied keys, in catalog order.
    pub fn keys(&self) -> impl Iterator<Item = OptionKey> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Layer `other` over `self`; keys present in both take `other`'s value.
    pub fn overlay(mut self, other: RawConfig) -> RawConfig {
        self.entries.extend(other.entries);
        self.unknown.extend(other.unknown);
        self
    }
}

/// Read and parse a configuration file.
pub fn load_from_file(path: &Path) -> Result<RawConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let raw = parse_document(&content, Origin::File(path.to_path_buf()))?;
    debug!(path = %path.display(), options = raw.len(), "Loaded config file");
    Ok(raw)
}

/// Parse a configuration document held in memory.
pub fn load_from_str(text: &str) -> Result<RawConfig, ConfigError> {
    parse_document(text, Origin::Inline)
}

fn parse_document(text: &str, origin: Origin) -> Result<RawConfig, ConfigError> {
    let table: toml::Table =
        toml::from_str(text).map_err(|e| syntax_error(origin.to_string(), text, &e))?;

    let mut raw = RawConfig::new();
    for (name, value) in table {
        match OptionKey::from_name(&name) {
            Some(key) => raw.insert(key, value, origin.clone()),
            None => raw.unknown.push(name),
        }
    }
    Ok(raw)
}

/// Syntax error with a position but without the offending source line, which
/// may hold key material.
pub(crate) fn syntax_error(origin: String, text: &str, e: &toml::de::Error) -> ConfigError {
    let message = match e.span() {
        Some(span) => {
            let (line, column) = line_column(text, span.start);
            format!("{} at line {}, column {}", e.message().trim_end(), line, column)
        }
        None => e.message().trim_end().to_string(),
    };
    ConfigError::Syntax { origin, message }
}

fn line_column(text: &str, offset: usize) -> (usize, usize) {
    let before = text.get(..offset).unwrap_or(text);
    let line = before.matches('\n').count() + 1;
    let column = before.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
    (line, column)
}

/// Load, validate and merge a configuration file against the built-in catalog.
pub fn load_and_resolve(path: &Path) -> Result<ConfigStore, ConfigError> {
    resolve_counted(&Catalog::builtin(), load_from_file(path))
}

/// Load, validate and merge an inline document against the built-in catalog.
pub fn load_and_resolve_from_str(text: &str) -> Result<ConfigStore, ConfigError> {
    resolve_counted(&Catalog::builtin(), load_from_str(text))
}

/// Resolve an optional file overlaid by `SGXLKL_*` environment variables.
///
/// Environment values win over file values for the same option.
pub fn load_and_resolve_layered<I, K, V>(
    catalog: &Catalog,
    path: Option<&Path>,
    env: I,
) -> Result<ConfigStore, ConfigError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    let raw = match path {
        Some(path) => load_from_file(path),
        None => Ok(RawConfig::new()),
    }
    .map(|base| base.overlay(RawConfig::from_env(env)));
    resolve_counted(catalog, raw)
}

fn resolve_counted(
    catalog: &Catalog,
    raw: Result<RawConfig, ConfigError>,
) -> Result<ConfigStore, ConfigError> {
    let result = raw.and_then(|raw| resolve(catalog, &raw));
    metrics::record_resolution(result.is_ok());
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_has_no_entries() {
        let raw = load_from_str("").unwrap();
        assert!(raw.is_empty());
    }

    #[test]
    fn test_document_keys_map_to_catalog() {
        let raw = load_from_str(
            r#"
            sthreads = 8
            hostname = "enclave"

            [[hds]]
            path = "/data.img"
            mnt = "/data"
            "#,
        )
        .unwrap();

        assert_eq!(
            raw.keys().collect::<Vec<_>>(),
            vec![OptionKey::Hds, OptionKey::Hostname, OptionKey::Sthreads]
        );
        assert_eq!(
            raw.get(OptionKey::Sthreads).unwrap().value,
            toml::Value::Integer(8)
        );
        assert_eq!(raw.get(OptionKey::Hostname).unwrap().origin, Origin::Inline);
    }

    #[test]
    fn test_unknown_keys_are_kept_aside() {
        let raw = load_from_str("sthread = 8\nethreads = 2\nhost_net = true").unwrap();
        assert_eq!(raw.unknown_keys(), ["host_net", "sthread"]);
        assert_eq!(raw.keys().collect::<Vec<_>>(), vec![OptionKey::Ethreads]);

        let err = load_and_resolve_from_str("sthread = 8\nethreads = 2\nhost_net = true")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert_eq!(err.offending_keys(), vec!["host_net", "sthread"]);
    }

    #[test]
    fn test_malformed_document_is_syntax_error() {
        let err = load_from_str("this is not valid TOML [[[").unwrap_err();
        assert!(matches!(err, ConfigError::Syntax { .. }));
    }

    #[test]
    fn test_syntax_error_omits_source_line() {
        let err = load_from_str("hd_key = \"deadbeefcafe00\nsthreads = 2").unwrap_err();
        let ConfigError::Syntax { message, .. } = &err else {
            panic!("expected syntax error, got {:?}", err);
        };
        assert!(message.contains("line 1"), "{}", message);
        assert!(!message.contains("deadbeef"), "{}", message);
        assert!(!err.to_string().contains("deadbeef"));
    }

    #[test]
    fn test_line_column() {
        assert_eq!(line_column("a = 1\nb = ", 0), (1, 1));
        assert_eq!(line_column("a = 1\nb = ", 10), (2, 5));
    }

    #[test]
    fn test_env_vars_filtered_by_prefix() {
        let raw = RawConfig::from_env(vec![
            ("PATH", "/usr/bin"),
            ("SGXLKL_STHREADS", "6"),
            ("SGXLKL_HOSTNET", "1"),
        ]);

        assert_eq!(raw.len(), 2);
        let entry = raw.get(OptionKey::Sthreads).unwrap();
        assert_eq!(entry.value, toml::Value::String("6".into()));
        assert_eq!(entry.origin, Origin::Env("SGXLKL_STHREADS".into()));
    }

    #[test]
    fn test_unknown_env_var_rejected() {
        let raw = RawConfig::from_env(vec![("SGXLKL_STHRADS", "6")]);
        assert!(raw.is_empty());
        assert_eq!(raw.unknown_keys(), ["SGXLKL_STHRADS"]);

        let err = resolve(&Catalog::builtin(), &raw).unwrap_err();
        assert_eq!(err.offending_keys(), vec!["SGXLKL_STHRADS"]);
    }

    #[test]
    fn test_env_violation_names_variable() {
        let err = load_and_resolve_layered(
            &Catalog::builtin(),
            None,
            vec![("SGXLKL_STHREADS", "0")],
        )
        .unwrap_err();
        assert_eq!(err.offending_keys(), vec!["sthreads"]);
        assert!(matches!(
            err.violations(),
            [ValidationError::FromEnv { var, .. }] if var == "SGXLKL_STHREADS"
        ));
        assert!(err.to_string().contains("SGXLKL_STHREADS"));
    }

    #[test]
    fn test_overlay_prefers_later_source() {
        let file = load_from_str("sthreads = 2\nethreads = 3").unwrap();
        let env = RawConfig::from_env(vec![("SGXLKL_STHREADS", "9")]);

        let merged = file.overlay(env);
        assert_eq!(
            merged.get(OptionKey::Sthreads).unwrap().value,
            toml::Value::String("9".into())
        );
        assert_eq!(
            merged.get(OptionKey::Ethreads).unwrap().value,
            toml::Value::Integer(3)
        );
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_from_file(Path::new("/nonexistent/sgxlkl.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
