//! Shared helpers for configuration integration tests.

use std::io::Write;
use std::sync::Arc;

use sgxlkl_config::config::catalog::DefaultValue;
use sgxlkl_config::config::OptionType;
use sgxlkl_config::{load_and_resolve_from_str, Catalog, ConfigHandle, ConfigStore, OptionKey};
use tempfile::NamedTempFile;

/// Write `content` to a temporary `.toml` file kept alive by the return value.
#[allow(dead_code)]
pub fn write_config(content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

/// Handle over a store resolved from `boot` with the built-in catalog.
#[allow(dead_code)]
pub fn handle_from(boot: &str) -> Arc<ConfigHandle> {
    let store = load_and_resolve_from_str(boot).unwrap();
    Arc::new(ConfigHandle::new(Catalog::builtin(), store))
}

/// TOML literal for an unsigned value; large values go through the string form.
#[allow(dead_code)]
pub fn uint_literal(value: u64) -> String {
    if value <= i64::MAX as u64 {
        value.to_string()
    } else {
        format!("\"{}\"", value)
    }
}

/// Assert that `key` holds exactly its catalog default, through the typed getter.
#[allow(dead_code)]
pub fn assert_holds_default(catalog: &Catalog, store: &ConfigStore, key: OptionKey) {
    let descriptor = catalog.lookup(key);
    match (descriptor.default, descriptor.ty) {
        (DefaultValue::Bool(expected), _) => assert_eq!(store.get_bool(key), expected, "{}", key),
        (DefaultValue::U64(expected), _) => assert_eq!(store.get_u64(key), expected, "{}", key),
        (DefaultValue::Str(expected), _) => {
            assert_eq!(store.get_str(key), Some(expected), "{}", key)
        }
        (DefaultValue::None, _) => assert_eq!(store.resolved(key).value(), None, "{}", key),
        (DefaultValue::Empty, OptionType::StrList) => {
            assert!(store.get_list(key).is_empty(), "{}", key)
        }
        (DefaultValue::Empty, _) => assert!(store.get_records(key).is_empty(), "{}", key),
    }
}
