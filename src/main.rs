// Entrypoint for the CLI application.
// - Parses flags, builds the run configuration once and sets up logging.
// - Without a subcommand, hands over to the interactive menu in `ui`.
// - Every error ends up here and is printed with its full chain instead of
//   panicking.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use crossterm::tty::IsTty;
use omie_export::api::OmieClient;
use omie_export::config::{AppConfig, Overrides};
use omie_export::credentials::{Credentials, ProfileStore};
use omie_export::endpoints::Registry;
use omie_export::{export, logging, ui};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "omie-export", version, about = "Export OMIE list calls to JSON files")]
struct Cli {
    /// API base URL the call paths are joined onto
    #[arg(long, global = true)]
    api_base: Option<String>,

    /// Credential profiles file
    #[arg(long, global = true)]
    profiles: Option<PathBuf>,

    /// Directory result files are written to
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Fail when pagination stops on a request error (partial results are still saved)
    #[arg(long, global = true)]
    strict: bool,

    /// Log level: trace, debug, info, warn, error
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the available calls
    Calls,
    /// Export every page of one call without prompting
    Fetch {
        /// Call name, e.g. ListarClientes
        #[arg(long)]
        call: String,
        /// Saved profile to use instead of APP_KEY/APP_SECRET or "default"
        #[arg(long)]
        profile: Option<String>,
    },
    /// Manage saved credential profiles
    Profiles {
        #[command(subcommand)]
        action: ProfileAction,
    },
}

#[derive(Subcommand, Debug)]
enum ProfileAction {
    List,
    Save {
        name: String,
        #[arg(long)]
        key: String,
        #[arg(long)]
        secret: String,
    },
    Delete {
        name: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let cfg = AppConfig::load(Overrides {
        api_base: cli.api_base.clone(),
        profiles_path: cli.profiles.clone(),
        output_dir: cli.output_dir.clone(),
        strict: cli.strict,
        log_level: cli.log_level.clone(),
    });
    logging::init_logging(&cfg.log_level);

    match run(cli.command, &cfg) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            ui::print_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Option<Command>, cfg: &AppConfig) -> Result<()> {
    match command {
        None => {
            let api = OmieClient::new()?;
            ui::main_menu(api, cfg)
        }
        Some(Command::Calls) => {
            let registry = Registry::new(&cfg.api_base);
            for (i, call) in registry.calls().iter().enumerate() {
                println!("{}. {}", i + 1, call);
            }
            Ok(())
        }
        Some(Command::Fetch { call, profile }) => fetch(cfg, &call, profile.as_deref()),
        Some(Command::Profiles { action }) => profiles(cfg, action),
    }
}

fn fetch(cfg: &AppConfig, call: &str, profile: Option<&str>) -> Result<()> {
    let mut store = ProfileStore::load(&cfg.profiles_path);
    let (creds, source) = ui::credentials_for_run(
        &mut store,
        profile,
        Credentials::from_env(),
        std::io::stdin().is_tty(),
        ui::acquire_credentials,
    )?;
    tracing::info!(%source, "using credentials");

    let registry = Registry::new(&cfg.api_base);
    let pb = ui::progress_bar()?;
    let outcome = export::run(OmieClient::new()?, &registry, call, &creds, cfg, |event| {
        ui::apply_event(&pb, &event)
    });
    pb.finish_and_clear();
    let outcome = outcome.with_context(|| format!("Export of {} failed", call))?;

    if !outcome.report.is_complete() {
        ui::print_warning(&format!(
            "Pagination stopped early: {}",
            outcome.report.stop
        ));
    }
    println!("Response saved to {}", outcome.path.display());
    println!(
        "Execution completed in {:.2} seconds",
        outcome.report.elapsed.as_secs_f64()
    );
    Ok(())
}

fn profiles(cfg: &AppConfig, action: ProfileAction) -> Result<()> {
    let mut store = ProfileStore::load(&cfg.profiles_path);
    match action {
        ProfileAction::List => {
            if store.is_empty() {
                println!("No saved profiles in {}", store.path().display());
            }
            for name in store.names() {
                println!("{}", name);
            }
        }
        ProfileAction::Save { name, key, secret } => {
            store.save(&name, Credentials::new(&key, &secret)?)?;
            println!("Profile \"{}\" saved to {}", name, store.path().display());
        }
        ProfileAction::Delete { name } => {
            if !store.delete(&name)? {
                bail!("No profile named \"{}\"", name);
            }
            println!("Profile \"{}\" deleted", name);
        }
    }
    Ok(())
}
