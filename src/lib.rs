//! Configuration subsystem of the SGX-LKL enclave runtime.

pub mod config;
pub mod observability;

pub use config::{
    load_and_resolve, load_and_resolve_from_str, Catalog, ConfigError, ConfigHandle, ConfigStore,
    OptionKey,
};
