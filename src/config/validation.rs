//! Configuration validation and merging.
//!
//! # Responsibilities
//! - Coerce raw values to each option's declared type
//! - Check numeric ranges, allowed string sets and string formats
//! - Substitute catalog defaults and record provenance
//! - Enforce exclusion groups and option dependencies
//!
//! # Design Decisions
//! - Returns all violations of a pass, not just the first
//! - Cross-field checks only run once every option resolved on its own
//! - Nothing is published unless the whole input validates

use std::net::{Ipv4Addr, Ipv6Addr};

use tracing::{debug, info};

use crate::config::catalog::{
    Bounds, Catalog, DefaultValue, OptionDescriptor, OptionKey, OptionType, RecordField,
    RecordSchema, StrFormat, Unit,
};
use crate::config::error::{ConfigError, ValidationError, ValidationReport};
use crate::config::loader::RawConfig;
use crate::config::schema::AppConfig;
use crate::config::store::{ConfigStore, Record, ResolvedValue, Value};

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;
const GIB: u64 = 1024 * MIB;

/// Resolve every catalog option against `raw`.
pub fn resolve(catalog: &Catalog, raw: &RawConfig) -> Result<ConfigStore, ConfigError> {
    let mut report = unknown_keys(raw);
    let mut values = Vec::with_capacity(catalog.descriptors().len());

    for descriptor in catalog.descriptors() {
        let resolved = match raw.get(descriptor.key) {
            Some(entry) => match coerce(descriptor, &entry.value) {
                Ok(value) => ResolvedValue::explicit(descriptor, value),
                Err(errors) => {
                    report.extend(entry.origin.attribute(errors));
                    ResolvedValue::from_default(descriptor)
                }
            },
            None => {
                if descriptor.required && descriptor.default == DefaultValue::None {
                    report.push(ValidationError::MissingRequired {
                        key: descriptor.key.name().to_string(),
                    });
                }
                ResolvedValue::from_default(descriptor)
            }
        };
        values.push(resolved);
    }
    report.into_result()?;

    let store = ConfigStore::from_values(values);
    check_cross_field(catalog, &store)?;

    for resolved in store.iter().filter(|v| v.is_explicit()) {
        debug!(
            option = resolved.key().name(),
            value = %resolved.display_value(),
            "Option set explicitly"
        );
    }
    info!(
        explicit = store.explicit_keys().count(),
        "Configuration resolved"
    );
    Ok(store)
}

/// Resolve a partial update on top of `current`.
///
/// Only keys marked remote-updatable may appear in `raw`. Untouched keys keep
/// their current value and provenance; cross-field checks run against the
/// combined result. Returns the replacement store and the keys it changed.
pub fn resolve_update(
    catalog: &Catalog,
    current: &ConfigStore,
    raw: &RawConfig,
) -> Result<(ConfigStore, Vec<OptionKey>), ConfigError> {
    let mut report = unknown_keys(raw);
    let mut next = current.clone();
    let mut touched = Vec::with_capacity(raw.len());

    for key in raw.keys() {
        let descriptor = catalog.lookup(key);
        if !descriptor.remote_updatable {
            report.push(ValidationError::NotUpdatable {
                key: key.name().to_string(),
            });
            continue;
        }
        let Some(entry) = raw.get(key) else {
            continue;
        };
        match coerce(descriptor, &entry.value) {
            Ok(value) => {
                next.replace(ResolvedValue::explicit(descriptor, value));
                touched.push(key);
            }
            Err(errors) => report.extend(entry.origin.attribute(errors)),
        }
    }
    report.into_result()?;

    check_cross_field(catalog, &next)?;
    Ok((next, touched))
}

fn unknown_keys(raw: &RawConfig) -> ValidationReport {
    let mut report = ValidationReport::new();
    report.extend(
        raw.unknown_keys()
            .iter()
            .map(|key| ValidationError::UnknownKey { key: key.clone() }),
    );
    report
}

fn check_cross_field(catalog: &Catalog, store: &ConfigStore) -> Result<(), ConfigError> {
    let mut report = ValidationReport::new();

    // An explicit `false` opts out of a mode; any other explicit value selects it.
    for (group, members) in catalog.exclusion_groups() {
        let set: Vec<String> = members
            .iter()
            .map(|key| store.resolved(*key))
            .filter(|resolved| {
                resolved.is_explicit() && resolved.value() != Some(&Value::Bool(false))
            })
            .map(|resolved| resolved.key().name().to_string())
            .collect();
        if set.len() > 1 {
            report.push(ValidationError::MutualExclusion { group, keys: set });
        }
    }

    for dependency in catalog.dependencies() {
        if store.is_explicitly_set(dependency.dependent)
            && !store.resolved(dependency.prerequisite).is_engaged()
        {
            report.push(ValidationError::DependencyViolation {
                key: dependency.dependent.name().to_string(),
                requires: dependency.prerequisite.name().to_string(),
            });
        }
    }

    report.into_result()
}

/// Location of a value being coerced, used to name it in errors.
struct Site {
    key: String,
    sensitive: bool,
}

impl Site {
    fn option(descriptor: &OptionDescriptor) -> Self {
        Self {
            key: descriptor.key.name().to_string(),
            sensitive: descriptor.sensitive,
        }
    }

    fn child(&self, suffix: impl std::fmt::Display) -> Self {
        Self {
            key: format!("{}{}", self.key, suffix),
            sensitive: self.sensitive,
        }
    }

    fn mismatch(&self, expected: &str, raw: &toml::Value) -> ValidationError {
        ValidationError::TypeMismatch {
            key: self.key.clone(),
            expected: expected.to_string(),
            found: describe(raw, self.sensitive),
        }
    }
}

fn describe(raw: &toml::Value, sensitive: bool) -> String {
    match raw {
        toml::Value::String(_) if sensitive => "string (redacted)".to_string(),
        toml::Value::String(s) => format!("string {:?}", s),
        toml::Value::Integer(i) => format!("integer {}", i),
        toml::Value::Float(f) => format!("float {}", f),
        toml::Value::Boolean(b) => format!("boolean {}", b),
        toml::Value::Datetime(d) => format!("datetime {}", d),
        toml::Value::Array(_) => "array".to_string(),
        toml::Value::Table(_) => "table".to_string(),
    }
}

fn coerce(descriptor: &OptionDescriptor, raw: &toml::Value) -> Result<Value, Vec<ValidationError>> {
    let site = Site::option(descriptor);
    match descriptor.ty {
        OptionType::Bool => coerce_bool(&site, raw).map(Value::Bool).map_err(|e| vec![e]),
        OptionType::U64 => coerce_u64(&site, raw, descriptor.unit)
            .and_then(|value| check_range(&site, value, descriptor.bounds))
            .map(Value::U64)
            .map_err(|e| vec![e]),
        OptionType::Str if descriptor.format == StrFormat::AppDocument => {
            coerce_app_document(&site, raw).map(Value::Str)
        }
        OptionType::Str => coerce_str(&site, raw, descriptor.format)
            .and_then(|value| check_one_of(&site, value, descriptor.bounds))
            .map(Value::Str)
            .map_err(|e| vec![e]),
        OptionType::StrList => coerce_list(&site, raw, descriptor.format).map(Value::List),
        OptionType::Records => match descriptor.record {
            Some(schema) => coerce_records(&site, raw, schema).map(Value::Records),
            None => Err(vec![site.mismatch("record list without schema", raw)]),
        },
    }
}

fn coerce_bool(site: &Site, raw: &toml::Value) -> Result<bool, ValidationError> {
    match raw {
        toml::Value::Boolean(value) => Ok(*value),
        toml::Value::Integer(0) => Ok(false),
        toml::Value::Integer(1) => Ok(true),
        toml::Value::String(text) => {
            parse_bool_token(text).ok_or_else(|| site.mismatch("boolean", raw))
        }
        _ => Err(site.mismatch("boolean", raw)),
    }
}

fn parse_bool_token(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn coerce_u64(site: &Site, raw: &toml::Value, unit: Unit) -> Result<u64, ValidationError> {
    let expected = match unit {
        Unit::Count => "unsigned 64-bit integer",
        Unit::Bytes => "byte size (integer with optional K/M/G suffix)",
    };
    match raw {
        toml::Value::Integer(value) => {
            u64::try_from(*value).map_err(|_| site.mismatch(expected, raw))
        }
        toml::Value::String(text) => {
            parse_u64_text(text, unit).ok_or_else(|| site.mismatch(expected, raw))
        }
        _ => Err(site.mismatch(expected, raw)),
    }
}

/// Decimal or `0x` hexadecimal; byte sizes may carry a binary K/M/G suffix.
fn parse_u64_text(text: &str, unit: Unit) -> Option<u64> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).ok();
    }
    let (digits, multiplier) = match unit {
        Unit::Count => (text, 1),
        Unit::Bytes => split_size_suffix(text),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u64>().ok()?.checked_mul(multiplier)
}

fn split_size_suffix(text: &str) -> (&str, u64) {
    let multiplier = match text.as_bytes().last().map(u8::to_ascii_uppercase) {
        Some(b'K') => KIB,
        Some(b'M') => MIB,
        Some(b'G') => GIB,
        _ => return (text, 1),
    };
    (&text[..text.len() - 1], multiplier)
}

fn check_range(site: &Site, value: u64, bounds: Bounds) -> Result<u64, ValidationError> {
    match bounds {
        Bounds::Range { min, max } if value < min || value > max => {
            Err(ValidationError::BoundsViolation {
                key: site.key.clone(),
                value: value.to_string(),
                allowed: bounds.to_string(),
            })
        }
        _ => Ok(value),
    }
}

fn coerce_str(site: &Site, raw: &toml::Value, format: StrFormat) -> Result<String, ValidationError> {
    let text = match raw {
        toml::Value::String(text) => text.clone(),
        _ => return Err(site.mismatch(format.describe(), raw)),
    };
    if matches_format(&text, format) {
        Ok(text)
    } else {
        Err(site.mismatch(format.describe(), raw))
    }
}

/// `app_config` as an inline table or a document string. Unknown fields are
/// named individually; a table is canonicalised to a document string.
fn coerce_app_document(site: &Site, raw: &toml::Value) -> Result<String, Vec<ValidationError>> {
    let expected = StrFormat::AppDocument.describe();
    let (table, text) = match raw {
        toml::Value::Table(table) => (table.clone(), None),
        toml::Value::String(text) => match toml::from_str::<toml::Table>(text) {
            Ok(table) => (table, Some(text.clone())),
            Err(_) => return Err(vec![site.mismatch(expected, raw)]),
        },
        _ => return Err(vec![site.mismatch(expected, raw)]),
    };

    let unknown: Vec<ValidationError> = table
        .keys()
        .filter(|name| !AppConfig::FIELDS.contains(&name.as_str()))
        .map(|name| ValidationError::UnknownKey {
            key: format!("{}.{}", site.key, name),
        })
        .collect();
    if !unknown.is_empty() {
        return Err(unknown);
    }

    let text = match text {
        Some(text) => text,
        None => toml::to_string(&table).map_err(|_| vec![site.mismatch(expected, raw)])?,
    };
    match toml::from_str::<AppConfig>(&text) {
        Ok(_) => Ok(text),
        Err(_) => Err(vec![site.mismatch(expected, raw)]),
    }
}

fn check_one_of(site: &Site, value: String, bounds: Bounds) -> Result<String, ValidationError> {
    match bounds {
        Bounds::OneOf(allowed) if !allowed.contains(&value.as_str()) => {
            Err(ValidationError::BoundsViolation {
                key: site.key.clone(),
                value: format!("{:?}", value),
                allowed: bounds.to_string(),
            })
        }
        _ => Ok(value),
    }
}

fn matches_format(text: &str, format: StrFormat) -> bool {
    match format {
        StrFormat::Any => true,
        StrFormat::Ipv4 => text.parse::<Ipv4Addr>().is_ok(),
        StrFormat::Ipv6 => text.parse::<Ipv6Addr>().is_ok(),
        StrFormat::Hex => {
            !text.is_empty() && text.len() % 2 == 0 && text.bytes().all(|b| b.is_ascii_hexdigit())
        }
        StrFormat::Base64Key => is_base64_key(text),
        StrFormat::HostPort => match text.rsplit_once(':') {
            Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
            None => false,
        },
        StrFormat::AbsolutePath => text.starts_with('/'),
        StrFormat::CpuRange => is_cpu_range(text),
        StrFormat::AppDocument => toml::from_str::<AppConfig>(text).is_ok(),
    }
}

/// 32 bytes in padded standard base64: 43 alphabet characters and one `=`.
fn is_base64_key(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.len() == 44
        && bytes[43] == b'='
        && bytes[..43]
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || *b == b'+' || *b == b'/')
}

fn is_cpu_range(text: &str) -> bool {
    let index = |s: &str| -> Option<u32> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        s.parse().ok()
    };
    match text.split_once('-') {
        Some((lo, hi)) => matches!((index(lo), index(hi)), (Some(lo), Some(hi)) if lo <= hi),
        None => index(text).is_some(),
    }
}

fn coerce_list(
    site: &Site,
    raw: &toml::Value,
    format: StrFormat,
) -> Result<Vec<String>, Vec<ValidationError>> {
    let elements: Vec<toml::Value> = match raw {
        toml::Value::String(text) => text
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| toml::Value::String(item.to_string()))
            .collect(),
        toml::Value::Array(items) => items.clone(),
        _ => return Err(vec![site.mismatch("string list", raw)]),
    };

    let mut items = Vec::with_capacity(elements.len());
    let mut errors = Vec::new();
    for (i, element) in elements.iter().enumerate() {
        let element_site = site.child(format_args!("[{}]", i));
        match element {
            toml::Value::String(text) if matches_format(text.trim(), format) => {
                items.push(text.trim().to_string())
            }
            other => errors.push(element_site.mismatch(format.describe(), other)),
        }
    }

    if errors.is_empty() {
        Ok(items)
    } else {
        Err(errors)
    }
}

fn coerce_records(
    site: &Site,
    raw: &toml::Value,
    schema: &RecordSchema,
) -> Result<Vec<Record>, Vec<ValidationError>> {
    let tables = match raw {
        toml::Value::Array(items) => {
            let mut tables = Vec::with_capacity(items.len());
            let mut errors = Vec::new();
            for (i, item) in items.iter().enumerate() {
                match item {
                    toml::Value::Table(table) => tables.push(table.clone()),
                    other => errors.push(
                        site.child(format_args!("[{}]", i))
                            .mismatch(&format!("{} table", schema.name), other),
                    ),
                }
            }
            if !errors.is_empty() {
                return Err(errors);
            }
            tables
        }
        toml::Value::String(text) => parse_compact_records(text, schema),
        _ => {
            return Err(vec![
                site.mismatch(&format!("list of {} records", schema.name), raw)
            ])
        }
    };

    let mut records = Vec::with_capacity(tables.len());
    let mut errors = Vec::new();
    for (i, table) in tables.iter().enumerate() {
        match coerce_record(&site.child(format_args!("[{}]", i)), table, schema) {
            Ok(record) => records.push(record),
            Err(record_errors) => errors.extend(record_errors),
        }
    }

    if errors.is_empty() {
        Ok(records)
    } else {
        Err(errors)
    }
}

/// Compact text form: entries separated by `,`, positional fields by `:`.
/// The last field takes the remainder of its entry.
fn parse_compact_records(text: &str, schema: &RecordSchema) -> Vec<toml::Table> {
    text.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .splitn(schema.fields.len(), ':')
                .zip(schema.fields)
                .filter(|(part, _)| !part.is_empty())
                .map(|(part, field)| (field.name.to_string(), toml::Value::String(part.to_string())))
                .collect()
        })
        .collect()
}

fn coerce_record(
    site: &Site,
    table: &toml::Table,
    schema: &RecordSchema,
) -> Result<Record, Vec<ValidationError>> {
    let mut record = Record::default();
    let mut errors = Vec::new();

    for (name, value) in table {
        let field_site = site.child(format_args!(".{}", name));
        let Some(field) = schema.field(name) else {
            errors.push(ValidationError::UnknownKey { key: field_site.key });
            continue;
        };
        match coerce_field(&field_site, field, value) {
            Ok(value) => record.insert(field.name, value),
            Err(e) => errors.push(e),
        }
    }

    for field in schema.fields {
        if field.required && !table.contains_key(field.name) {
            errors.push(ValidationError::MissingRequired {
                key: format!("{}.{}", site.key, field.name),
            });
        }
        if let Some(requires) = field.requires {
            if table.contains_key(field.name) && !table.contains_key(requires) {
                errors.push(ValidationError::DependencyViolation {
                    key: format!("{}.{}", site.key, field.name),
                    requires: format!("{}.{}", site.key, requires),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(record)
    } else {
        Err(errors)
    }
}

fn coerce_field(
    site: &Site,
    field: &RecordField,
    raw: &toml::Value,
) -> Result<Value, ValidationError> {
    match field.ty {
        OptionType::Bool => coerce_bool(site, raw).map(Value::Bool),
        OptionType::U64 => coerce_u64(site, raw, Unit::Count).map(Value::U64),
        _ => coerce_str(site, raw, field.format).map(Value::Str),
    }
}
