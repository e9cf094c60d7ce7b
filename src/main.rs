//! Operator CLI for the enclave configuration subsystem.
//!
//! Resolves a configuration the same way the runtime does at boot and reports
//! the outcome, so a document can be checked before it is packaged into an
//! enclave image.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use sgxlkl_config::config::catalog::{Bounds, StrFormat};
use sgxlkl_config::config::{load_from_file, load_from_str, resolve, RawConfig};
use sgxlkl_config::observability::logging;
use sgxlkl_config::{Catalog, ConfigError, ConfigStore};

#[derive(Parser)]
#[command(name = "sgxlkl-config")]
#[command(about = "Validate and inspect SGX-LKL enclave configuration", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, conflicts_with = "inline")]
    file: Option<PathBuf>,

    /// Configuration document given on the command line
    #[arg(short, long, global = true)]
    inline: Option<String>,

    /// Overlay SGXLKL_* environment variables
    #[arg(short, long, global = true)]
    env: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration and summarise explicit options
    Check,
    /// Print the resolved configuration as JSON
    Show {
        /// Print secret values instead of redacting them
        #[arg(long)]
        reveal: bool,
    },
    /// List every option with its type, default and constraint
    Catalog,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let catalog = Catalog::builtin();

    if let Commands::Catalog = cli.command {
        print_catalog(&catalog);
        return ExitCode::SUCCESS;
    }

    let store = match load(&cli, &catalog) {
        Ok(store) => store,
        Err(e) => {
            report_error(&e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Check => print_summary(&store),
        Commands::Show { reveal } => match serde_json::to_string_pretty(&store.to_json(reveal)) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error: failed to render configuration: {}", e);
                return ExitCode::FAILURE;
            }
        },
        Commands::Catalog => {}
    }

    ExitCode::SUCCESS
}

fn load(cli: &Cli, catalog: &Catalog) -> Result<ConfigStore, ConfigError> {
    let mut raw = match (&cli.file, &cli.inline) {
        (Some(path), _) => load_from_file(path)?,
        (None, Some(text)) => load_from_str(text)?,
        (None, None) => RawConfig::new(),
    };
    if cli.env {
        raw = raw.overlay(RawConfig::from_env(std::env::vars()));
    }
    resolve(catalog, &raw)
}

fn report_error(error: &ConfigError) {
    match error {
        ConfigError::Invalid(report) => {
            eprintln!("Error: configuration rejected ({} violations)", report.len());
            for violation in report.errors() {
                eprintln!("  - {}", violation);
            }
        }
        other => eprintln!("Error: {}", other),
    }
}

fn print_summary(store: &ConfigStore) {
    let explicit: Vec<_> = store
        .iter()
        .filter(|resolved| resolved.is_explicit())
        .collect();

    println!("configuration ok: {} options set explicitly", explicit.len());
    for resolved in explicit {
        println!("  {} = {}", resolved.key(), resolved.display_value());
    }
}

fn print_catalog(catalog: &Catalog) {
    for descriptor in catalog.descriptors() {
        let mut constraint = Vec::new();
        if descriptor.bounds != Bounds::None {
            constraint.push(descriptor.bounds.to_string());
        }
        if descriptor.format != StrFormat::Any {
            constraint.push(descriptor.format.describe().to_string());
        }
        if let Some(group) = descriptor.exclusion {
            constraint.push(format!("group {}", group));
        }
        if descriptor.remote_updatable {
            constraint.push("remote".to_string());
        }
        if descriptor.sensitive {
            constraint.push("secret".to_string());
        }

        println!(
            "{:<26} {:<24} {:<26} {}",
            descriptor.key.name(),
            descriptor.ty.to_string(),
            descriptor.default.to_string(),
            constraint.join("; ")
        );
    }
}
