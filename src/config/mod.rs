//! Configuration subsystem.
//!
//! # Data Flow
//! ```text
//! config file / inline document / SGXLKL_* environment
//!     → loader.rs (parse into RawConfig, reject unknown names)
//!     → validation.rs (coerce, bounds, formats, cross-field checks)
//!     → ConfigStore (every catalog option, explicit or default)
//!     → published through ConfigHandle
//!
//! On a remote batch:
//!     remote.rs receives the document
//!     → validation.rs checks it against the current store
//!     → atomic swap of Arc<ConfigStore>
//!     → readers observe the new store on their next snapshot
//! ```
//!
//! # Design Decisions
//! - The catalog is the single source of names, types, defaults and bounds
//! - Validation is all-or-nothing; every violation is reported at once
//! - Only options marked remote-updatable may change after boot

pub mod catalog;
pub mod error;
pub mod handle;
pub mod loader;
pub mod remote;
pub mod schema;
pub mod store;
pub mod validation;

pub use catalog::{Catalog, OptionDescriptor, OptionKey, OptionType};
pub use error::{ConfigError, ValidationError, ValidationReport};
pub use handle::ConfigHandle;
pub use loader::{
    load_and_resolve, load_and_resolve_from_str, load_and_resolve_layered, load_from_file,
    load_from_str, RawConfig,
};
pub use remote::{RemoteConfigListener, RemoteUpdate};
pub use schema::{AppConfig, DiskSpec, WgPeer};
pub use store::{ConfigStore, Provenance, ResolvedValue, Value};
pub use validation::resolve;
