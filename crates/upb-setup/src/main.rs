//! UPB PIM setup tool entry point.
//!
//! Wires the real PIM client and the TOML registration store into the setup
//! flow and exposes it as a small CLI.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load AppConfig            -- --config path or platform config dir
//!  └─ TomlRegistrationStore     -- registry_file beside the config
//!  └─ command
//!       ├─ add     one RegistrationCoordinator, user flow
//!       ├─ import  one RegistrationCoordinator per [[device]], import flow
//!       └─ list    print stored registrations
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use upb_core::{ConnectionParameters, TransportKind};
use upb_setup::application::register_device::{
    FlowResult, RegistrationCoordinator, RegistrationStore,
};
use upb_setup::application::validate_connection::{ConnectionValidator, Validate};
use upb_setup::infrastructure::pim::PimClientFactory;
use upb_setup::infrastructure::storage::config::{self, AppConfig};
use upb_setup::infrastructure::storage::registry::TomlRegistrationStore;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Validates and registers UPB Powerline Interface Modules.
#[derive(Debug, Parser)]
#[command(name = "upb-setup", version)]
struct Cli {
    /// Path to the configuration file.  Defaults to the platform config
    /// directory.
    #[arg(long, env = "UPB_SETUP_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate a PIM and register it.
    Add {
        /// Transport: `tcp` or `serial`.
        #[arg(long, default_value = "serial")]
        protocol: TransportKind,

        /// `host[:port]` for TCP, device path for serial.
        #[arg(long)]
        address: String,

        /// UPStart export file describing the network.
        #[arg(long, default_value = "")]
        file_path: String,
    },
    /// Register every `[[device]]` listed in a TOML file.
    Import { file: PathBuf },
    /// Print stored registrations.
    List,
}

/// Contents of an import file.
#[derive(Debug, Deserialize)]
struct ImportFile {
    #[serde(default)]
    device: Vec<ConnectionParameters>,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => config::config_file_path().context("locating the config file")?,
    };
    let app_config = config::load_config_from(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    // `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&app_config.setup.log_level)),
        )
        .init();

    let store = Arc::new(TomlRegistrationStore::new(
        app_config.registry_path(&config_path),
    ));
    info!("using registrations at {}", store.path().display());

    match cli.command {
        Command::Add {
            protocol,
            address,
            file_path,
        } => {
            let params = ConnectionParameters::new(protocol, address, file_path);
            let mut flow = coordinator(&app_config, store);
            let result = flow
                .handle_user_step(Some(params))
                .await
                .context("running setup flow")?;
            report(&result);
            if !matches!(result, FlowResult::CreateEntry { .. }) {
                anyhow::bail!("UPB PIM was not registered");
            }
        }
        Command::Import { file } => {
            let devices = read_import_file(&file)?;
            info!("importing {} device(s) from {}", devices.len(), file.display());
            for params in devices {
                let mut flow = coordinator(&app_config, Arc::clone(&store));
                let result = flow
                    .handle_import(params)
                    .await
                    .context("running import flow")?;
                report(&result);
            }
        }
        Command::List => {
            let records = store.records().context("reading registrations")?;
            if records.is_empty() {
                println!("no UPB PIMs registered");
            }
            for record in records {
                println!(
                    "{}\t{}\t{}\t{}",
                    record.id, record.title, record.host, record.file_path
                );
            }
        }
    }

    Ok(())
}

fn coordinator(
    app_config: &AppConfig,
    store: Arc<TomlRegistrationStore>,
) -> RegistrationCoordinator {
    let validator: Arc<dyn Validate> =
        Arc::new(ConnectionValidator::new(Arc::new(PimClientFactory)));
    RegistrationCoordinator::new(validator, store).with_deadline(app_config.validate_timeout())
}

fn read_import_file(path: &Path) -> anyhow::Result<Vec<ConnectionParameters>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading import file {}", path.display()))?;
    let file: ImportFile = toml::from_str(&content)
        .with_context(|| format!("parsing import file {}", path.display()))?;
    if file.device.is_empty() {
        warn!("{} lists no [[device]] entries", path.display());
    }
    Ok(file.device)
}

fn report(result: &FlowResult) {
    match result {
        FlowResult::CreateEntry { record } => {
            println!("registered {} ({}) at {}", record.title, record.id, record.host);
        }
        FlowResult::Abort { reason } => println!("aborted: {reason}"),
        FlowResult::ShowForm { errors, .. } => {
            for (field, token) in errors {
                println!("error [{field}]: {token}");
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
