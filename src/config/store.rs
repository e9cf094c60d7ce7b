//! Resolved configuration snapshot and its typed accessors.
//!
//! A [`ConfigStore`] holds exactly one [`ResolvedValue`] per catalog key. It is
//! immutable once built; consumers share it by reference (or `Arc`) and read it
//! without locking.
//!
//! Calling an accessor whose type does not match the option's declared type is
//! a programmer error and panics.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::config::catalog::{Catalog, DefaultValue, OptionDescriptor, OptionKey, OptionType};

const REDACTED: &str = "<redacted>";

/// Whether a value was supplied or taken from the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Default,
    Explicit,
}

/// Typed option value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    U64(u64),
    Str(String),
    List(Vec<String>),
    Records(Vec<Record>),
}

impl Value {
    pub fn option_type(&self) -> OptionType {
        match self {
            Value::Bool(_) => OptionType::Bool,
            Value::U64(_) => OptionType::U64,
            Value::Str(_) => OptionType::Str,
            Value::List(_) => OptionType::StrList,
            Value::Records(_) => OptionType::Records,
        }
    }

    fn from_default(default: DefaultValue, ty: OptionType) -> Option<Self> {
        match default {
            DefaultValue::None => None,
            DefaultValue::Bool(value) => Some(Value::Bool(value)),
            DefaultValue::U64(value) => Some(Value::U64(value)),
            DefaultValue::Str(value) => Some(Value::Str(value.to_string())),
            DefaultValue::Empty if ty == OptionType::Records => Some(Value::Records(Vec::new())),
            DefaultValue::Empty => Some(Value::List(Vec::new())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(value) => write!(f, "{}", value),
            Value::U64(value) => write!(f, "{}", value),
            Value::Str(value) => write!(f, "{:?}", value),
            Value::List(values) => write!(f, "[{}]", values.join(", ")),
            Value::Records(records) => write!(f, "{} record(s)", records.len()),
        }
    }
}

/// One entry of a record-list option, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<&'static str, Value>,
}

impl Record {
    pub(crate) fn insert(&mut self, field: &'static str, value: Value) {
        self.fields.insert(field, value);
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        match self.fields.get(field) {
            Some(Value::Str(value)) => Some(value),
            _ => None,
        }
    }

    pub fn get_bool(&self, field: &str) -> Option<bool> {
        match self.fields.get(field) {
            Some(Value::Bool(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn get_u64(&self, field: &str) -> Option<u64> {
        match self.fields.get(field) {
            Some(Value::U64(value)) => Some(*value),
            _ => None,
        }
    }
}

/// Resolved value of one option.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedValue {
    key: OptionKey,
    ty: OptionType,
    value: Option<Value>,
    provenance: Provenance,
    sensitive: bool,
}

impl ResolvedValue {
    pub(crate) fn explicit(descriptor: &OptionDescriptor, value: Value) -> Self {
        Self {
            key: descriptor.key,
            ty: descriptor.ty,
            value: Some(value),
            provenance: Provenance::Explicit,
            sensitive: descriptor.sensitive,
        }
    }

    pub(crate) fn from_default(descriptor: &OptionDescriptor) -> Self {
        Self {
            key: descriptor.key,
            ty: descriptor.ty,
            value: Value::from_default(descriptor.default, descriptor.ty),
            provenance: Provenance::Default,
            sensitive: descriptor.sensitive,
        }
    }

    pub fn key(&self) -> OptionKey {
        self.key
    }

    pub fn option_type(&self) -> OptionType {
        self.ty
    }

    /// `None` only for options without a default that were not supplied.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    pub fn is_explicit(&self) -> bool {
        self.provenance == Provenance::Explicit
    }

    pub fn is_sensitive(&self) -> bool {
        self.sensitive
    }

    /// Whether the value turns its feature on: `true`, a non-empty string or
    /// list, or any number.
    pub fn is_engaged(&self) -> bool {
        match &self.value {
            None => false,
            Some(Value::Bool(value)) => *value,
            Some(Value::U64(_)) => true,
            Some(Value::Str(value)) => !value.is_empty(),
            Some(Value::List(values)) => !values.is_empty(),
            Some(Value::Records(records)) => !records.is_empty(),
        }
    }

    /// Value formatted for logs, with secrets masked.
    pub fn display_value(&self) -> String {
        match &self.value {
            None => "<unset>".to_string(),
            Some(_) if self.sensitive => REDACTED.to_string(),
            Some(value) => value.to_string(),
        }
    }
}

impl fmt::Debug for ResolvedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedValue")
            .field("key", &self.key)
            .field("value", &self.display_value())
            .field("provenance", &self.provenance)
            .finish()
    }
}

/// Immutable resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigStore {
    values: Vec<ResolvedValue>,
}

impl ConfigStore {
    /// Store built purely from catalog defaults, without validation.
    pub fn from_defaults(catalog: &Catalog) -> Self {
        Self::from_values(
            catalog
                .descriptors()
                .iter()
                .map(ResolvedValue::from_default)
                .collect(),
        )
    }

    pub(crate) fn from_values(values: Vec<ResolvedValue>) -> Self {
        debug_assert_eq!(values.len(), OptionKey::COUNT);
        Self { values }
    }

    pub(crate) fn replace(&mut self, resolved: ResolvedValue) {
        let index = resolved.key.index();
        self.values[index] = resolved;
    }

    pub fn resolved(&self, key: OptionKey) -> &ResolvedValue {
        &self.values[key.index()]
    }

    /// All resolved values, in key order.
    pub fn iter(&self) -> impl Iterator<Item = &ResolvedValue> {
        self.values.iter()
    }

    /// Whether `key` was supplied rather than defaulted.
    pub fn is_explicitly_set(&self, key: OptionKey) -> bool {
        self.resolved(key).is_explicit()
    }

    /// Keys that were supplied, in key order.
    pub fn explicit_keys(&self) -> impl Iterator<Item = OptionKey> + '_ {
        self.values
            .iter()
            .filter(|v| v.is_explicit())
            .map(|v| v.key)
    }

    pub fn get_bool(&self, key: OptionKey) -> bool {
        match self.checked(key, OptionType::Bool) {
            Some(Value::Bool(value)) => *value,
            _ => unset(key),
        }
    }

    pub fn get_u64(&self, key: OptionKey) -> u64 {
        match self.checked(key, OptionType::U64) {
            Some(Value::U64(value)) => *value,
            _ => unset(key),
        }
    }

    /// `None` when the option has no default and was not supplied.
    pub fn get_str(&self, key: OptionKey) -> Option<&str> {
        match self.checked(key, OptionType::Str) {
            Some(Value::Str(value)) => Some(value),
            _ => None,
        }
    }

    pub fn get_list(&self, key: OptionKey) -> &[String] {
        match self.checked(key, OptionType::StrList) {
            Some(Value::List(values)) => values,
            _ => &[],
        }
    }

    pub fn get_records(&self, key: OptionKey) -> &[Record] {
        match self.checked(key, OptionType::Records) {
            Some(Value::Records(records)) => records,
            _ => &[],
        }
    }

    fn checked(&self, key: OptionKey, expected: OptionType) -> Option<&Value> {
        let resolved = self.resolved(key);
        if resolved.ty != expected {
            panic!(
                "option `{}` is declared as {}, but was read as {}",
                key, resolved.ty, expected
            );
        }
        resolved.value.as_ref()
    }

    /// Operator view of the store: every option with its value and source.
    pub fn to_json(&self, reveal_secrets: bool) -> serde_json::Value {
        let mut options = serde_json::Map::new();
        for resolved in &self.values {
            let value = match &resolved.value {
                Some(_) if resolved.sensitive && !reveal_secrets => {
                    serde_json::Value::String(REDACTED.to_string())
                }
                Some(value) => serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
                None => serde_json::Value::Null,
            };
            options.insert(
                resolved.key.name().to_string(),
                serde_json::json!({
                    "value": value,
                    "source": resolved.provenance,
                }),
            );
        }
        serde_json::Value::Object(options)
    }
}

fn unset(key: OptionKey) -> ! {
    panic!("option `{}` has no value; its catalog entry declares no default", key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_store_is_total() {
        let store = ConfigStore::from_defaults(&Catalog::builtin());
        assert_eq!(store.iter().count(), OptionKey::COUNT);
        assert_eq!(store.explicit_keys().count(), 0);
        assert_eq!(store.get_u64(OptionKey::Sthreads), 4);
        assert!(store.get_bool(OptionKey::GettimeVdso));
        assert_eq!(store.get_str(OptionKey::Hostname), Some("lkl"));
        assert_eq!(store.get_str(OptionKey::Hd), None);
        assert!(store.get_list(OptionKey::EthreadsAffinity).is_empty());
        assert!(store.get_records(OptionKey::WgPeers).is_empty());
    }

    #[test]
    #[should_panic(expected = "declared as unsigned 64-bit integer")]
    fn test_accessor_type_mismatch_panics() {
        let store = ConfigStore::from_defaults(&Catalog::builtin());
        store.get_bool(OptionKey::Sthreads);
    }

    #[test]
    #[should_panic(expected = "declared as boolean")]
    fn test_string_accessor_on_bool_panics() {
        let store = ConfigStore::from_defaults(&Catalog::builtin());
        store.get_str(OptionKey::Hostnet);
    }

    #[test]
    fn test_engaged_values() {
        let catalog = Catalog::builtin();
        let store = ConfigStore::from_defaults(&catalog);
        assert!(!store.resolved(OptionKey::Hostnet).is_engaged());
        assert!(store.resolved(OptionKey::Tap).is_engaged());
        assert!(!store.resolved(OptionKey::HdVerity).is_engaged());
        assert!(!store.resolved(OptionKey::Hds).is_engaged());
    }

    #[test]
    fn test_json_redacts_secrets() {
        let catalog = Catalog::builtin();
        let mut store = ConfigStore::from_defaults(&catalog);
        store.replace(ResolvedValue::explicit(
            catalog.lookup(OptionKey::HdKey),
            Value::Str("00ff".into()),
        ));

        let json = store.to_json(false);
        assert_eq!(json["hd_key"]["value"], "<redacted>");
        assert_eq!(json["hd_key"]["source"], "explicit");
        assert_eq!(json["sthreads"]["value"], 4);
        assert_eq!(json["sthreads"]["source"], "default");
        assert!(json["hd"]["value"].is_null());

        let revealed = store.to_json(true);
        assert_eq!(revealed["hd_key"]["value"], "00ff");
    }

    #[test]
    fn test_debug_output_masks_secrets() {
        let catalog = Catalog::builtin();
        let resolved = ResolvedValue::explicit(
            catalog.lookup(OptionKey::WgKey),
            Value::Str("c2VjcmV0".into()),
        );
        let debug = format!("{:?}", resolved);
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("c2VjcmV0"));
    }
}
