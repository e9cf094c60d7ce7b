//! Typed views over structured options.
//!
//! Record lists and the application document are stored generically; these
//! types give consumers (disk layer, WireGuard setup, application launcher)
//! something concrete to work with.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::catalog::OptionKey;
use crate::config::error::ConfigError;
use crate::config::loader::syntax_error;
use crate::config::store::{ConfigStore, Record};

/// Application sub-configuration carried by `app_config`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Executable to run inside the enclave.
    pub run: Option<String>,

    /// Arguments passed to the executable.
    pub args: Vec<String>,

    /// Environment of the application.
    pub environment: BTreeMap<String, String>,

    /// Working directory; overrides `cwd` when set.
    pub cwd: Option<String>,
}

impl AppConfig {
    /// Field names accepted in the document.
    pub const FIELDS: &'static [&'static str] = &["run", "args", "environment", "cwd"];
}

/// Disk image mounted inside the enclave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiskSpec {
    pub path: String,
    pub mount_point: String,
    pub read_only: bool,
    /// Hex encoded dm-crypt key.
    #[serde(skip_serializing)]
    pub key: Option<String>,
    /// Hex encoded dm-verity root hash.
    pub verity_root_hash: Option<String>,
    pub verity_offset: Option<u64>,
}

impl DiskSpec {
    fn from_record(record: &Record) -> Self {
        Self {
            path: record.get_str("path").unwrap_or_default().to_string(),
            mount_point: record.get_str("mnt").unwrap_or_default().to_string(),
            read_only: record.get_bool("ro").unwrap_or(false),
            key: record.get_str("key").map(str::to_string),
            verity_root_hash: record.get_str("verity").map(str::to_string),
            verity_offset: record.get_u64("verity_offset"),
        }
    }

    pub fn is_encrypted(&self) -> bool {
        self.key.is_some()
    }
}

/// WireGuard peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WgPeer {
    pub public_key: String,
    pub allowed_ips: String,
    pub endpoint: Option<String>,
}

impl WgPeer {
    fn from_record(record: &Record) -> Self {
        Self {
            public_key: record.get_str("key").unwrap_or_default().to_string(),
            allowed_ips: record.get_str("allowed_ips").unwrap_or_default().to_string(),
            endpoint: record.get_str("endpoint").map(str::to_string),
        }
    }
}

impl ConfigStore {
    /// Root disk (when `hd` is set) followed by every `hds` entry.
    pub fn disks(&self) -> Vec<DiskSpec> {
        let root = self.get_str(OptionKey::Hd).map(|path| DiskSpec {
            path: path.to_string(),
            mount_point: "/".to_string(),
            read_only: self.get_bool(OptionKey::HdRo),
            key: self.get_str(OptionKey::HdKey).map(str::to_string),
            verity_root_hash: self.get_str(OptionKey::HdVerity).map(str::to_string),
            verity_offset: self
                .is_explicitly_set(OptionKey::HdVerityOffset)
                .then(|| self.get_u64(OptionKey::HdVerityOffset)),
        });

        root.into_iter()
            .chain(
                self.get_records(OptionKey::Hds)
                    .iter()
                    .map(DiskSpec::from_record),
            )
            .collect()
    }

    pub fn wg_peers(&self) -> Vec<WgPeer> {
        self.get_records(OptionKey::WgPeers)
            .iter()
            .map(WgPeer::from_record)
            .collect()
    }

    /// Parsed application document, if one was supplied.
    pub fn app_config(&self) -> Result<Option<AppConfig>, ConfigError> {
        self.get_str(OptionKey::AppConfig)
            .map(|text| {
                toml::from_str(text)
                    .map_err(|e| syntax_error(OptionKey::AppConfig.name().to_string(), text, &e))
            })
            .transpose()
    }

    /// Effective working directory of the application.
    pub fn working_dir(&self) -> Result<String, ConfigError> {
        let from_app = self.app_config()?.and_then(|app| app.cwd);
        Ok(from_app
            .or_else(|| self.get_str(OptionKey::Cwd).map(str::to_string))
            .unwrap_or_else(|| "/".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_rejects_unknown_fields() {
        let result: Result<AppConfig, _> = toml::from_str("run = \"/bin/app\"\nargv = []");
        assert!(result.is_err());
    }

    #[test]
    fn test_app_config_field_list_matches_struct() {
        let app = AppConfig {
            run: Some("/bin/app".into()),
            args: vec!["-v".into()],
            environment: BTreeMap::from([("HOME".to_string(), "/".to_string())]),
            cwd: Some("/srv".into()),
        };
        let value = toml::Value::try_from(&app).unwrap();
        let names: Vec<&str> = value.as_table().unwrap().keys().map(String::as_str).collect();

        let mut expected = AppConfig::FIELDS.to_vec();
        expected.sort_unstable();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_app_config_defaults() {
        let app: AppConfig = toml::from_str("run = \"/bin/app\"").unwrap();
        assert_eq!(app.run.as_deref(), Some("/bin/app"));
        assert!(app.args.is_empty());
        assert!(app.environment.is_empty());
    }

    #[test]
    fn test_disk_from_record() {
        let mut record = Record::default();
        record.insert("path", crate::config::store::Value::Str("/data.img".into()));
        record.insert("mnt", crate::config::store::Value::Str("/data".into()));
        record.insert("ro", crate::config::store::Value::Bool(true));

        let disk = DiskSpec::from_record(&record);
        assert_eq!(disk.path, "/data.img");
        assert_eq!(disk.mount_point, "/data");
        assert!(disk.read_only);
        assert!(!disk.is_encrypted());
        assert_eq!(disk.verity_offset, None);
    }

    #[test]
    fn test_default_store_has_no_disks() {
        let store = ConfigStore::from_defaults(&crate::config::Catalog::builtin());
        assert!(store.disks().is_empty());
        assert!(store.wg_peers().is_empty());
        assert_eq!(store.app_config().unwrap(), None);
        assert_eq!(store.working_dir().unwrap(), "/");
    }
}
