//! Configuration error types.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::catalog::ExclusionGroup;

/// Error returned by the loading and reconfiguration entry points.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a configuration file.
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The document is not well-formed TOML.
    #[error("malformed config document ({origin}): {message}")]
    Syntax { origin: String, message: String },

    /// One or more options were rejected.
    #[error("{0}")]
    Invalid(ValidationReport),

    /// The current configuration does not accept remote updates.
    #[error("remote reconfiguration is disabled (set remote_config = true at boot)")]
    RemoteConfigDisabled,
}

impl ConfigError {
    /// Every key named by this error, in report order.
    pub fn offending_keys(&self) -> Vec<&str> {
        match self {
            ConfigError::Invalid(report) => report.keys(),
            _ => Vec::new(),
        }
    }

    /// The individual violations, if this is a validation failure.
    pub fn violations(&self) -> &[ValidationError] {
        match self {
            ConfigError::Invalid(report) => report.errors(),
            _ => &[],
        }
    }
}

impl From<ValidationReport> for ConfigError {
    fn from(report: ValidationReport) -> Self {
        ConfigError::Invalid(report)
    }
}

/// A single rejected option or option combination.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unknown option `{key}`")]
    UnknownKey { key: String },

    #[error("option `{key}` expects {expected}, got {found}")]
    TypeMismatch {
        key: String,
        expected: String,
        found: String,
    },

    #[error("option `{key}` value {value} is outside {allowed}")]
    BoundsViolation {
        key: String,
        value: String,
        allowed: String,
    },

    #[error("required option `{key}` is missing")]
    MissingRequired { key: String },

    #[error("options {} are mutually exclusive ({group})", quoted(.keys))]
    MutualExclusion {
        group: ExclusionGroup,
        keys: Vec<String>,
    },

    #[error("option `{key}` requires `{requires}` to be set")]
    DependencyViolation { key: String, requires: String },

    #[error("option `{key}` cannot be changed after boot")]
    NotUpdatable { key: String },

    /// A violation in a value read from an environment variable.
    #[error("{var}: {source}")]
    FromEnv {
        var: String,
        source: Box<ValidationError>,
    },
}

impl ValidationError {
    /// Keys this violation names.
    pub fn keys(&self) -> Vec<&str> {
        match self {
            ValidationError::UnknownKey { key }
            | ValidationError::TypeMismatch { key, .. }
            | ValidationError::BoundsViolation { key, .. }
            | ValidationError::MissingRequired { key }
            | ValidationError::NotUpdatable { key } => vec![key.as_str()],
            ValidationError::DependencyViolation { key, requires } => {
                vec![key.as_str(), requires.as_str()]
            }
            ValidationError::MutualExclusion { keys, .. } => {
                keys.iter().map(String::as_str).collect()
            }
            ValidationError::FromEnv { source, .. } => source.keys(),
        }
    }
}

fn quoted(keys: &[String]) -> String {
    keys.iter()
        .map(|k| format!("`{}`", k))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Every violation found in one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    errors: Vec<ValidationError>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn extend(&mut self, errors: impl IntoIterator<Item = ValidationError>) {
        self.errors.extend(errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn keys(&self) -> Vec<&str> {
        self.errors.iter().flat_map(ValidationError::keys).collect()
    }

    /// `Ok(())` when nothing was reported.
    pub fn into_result(self) -> Result<(), ConfigError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(self))
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "configuration rejected: ")?;
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}
