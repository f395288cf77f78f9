// UI layer: an interactive menu built on `dialoguer`, with `indicatif`
// progress driven by events from the fetch worker. Functions are small and
// synchronous; only the page loop runs off the main thread.

use crate::api::OmieClient;
use crate::config::AppConfig;
use crate::credentials::{self, CredentialSource, Credentials, ProfileStore, DEFAULT_PROFILE};
use crate::endpoints::Registry;
use crate::export;
use crate::output::{self, PREVIEW_LIMIT};
use crate::paginator::{spawn_fetch, FetchEvent, FetchReport};
use anyhow::{anyhow, bail, Context, Result};
use crossterm::style::Stylize;
use dialoguer::{Confirm, Input, Password, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::PathBuf;

/// State carried between menu actions for one interactive session.
struct Session<'a> {
    api: OmieClient,
    cfg: &'a AppConfig,
    registry: Registry,
    store: ProfileStore,
    active: Option<(Credentials, CredentialSource)>,
    last_output: Option<PathBuf>,
    log: Vec<String>,
}

/// Main interactive menu. Runs a select loop until the user chooses "Exit".
pub fn main_menu(api: OmieClient, cfg: &AppConfig) -> Result<()> {
    let mut session = Session {
        api,
        cfg,
        registry: Registry::new(&cfg.api_base),
        store: ProfileStore::load(&cfg.profiles_path),
        active: None,
        last_output: None,
        log: Vec::new(),
    };

    loop {
        let items = vec![
            "Run export",
            "Manage profiles",
            "Save last results as...",
            "Show run log",
            "Exit",
        ];
        let selection = Select::new()
            .with_prompt(active_label(&session.active))
            .items(&items)
            .default(0)
            .interact()?;
        let outcome = match selection {
            0 => run_export(&mut session),
            1 => manage_profiles(&mut session),
            2 => save_results_as(&session),
            3 => show_log(&mut session),
            _ => break,
        };
        // Errors inside an action are shown and the menu continues.
        if let Err(e) = outcome {
            print_error(&e);
        }
    }
    Ok(())
}

fn active_label(active: &Option<(Credentials, CredentialSource)>) -> String {
    match active {
        Some((_, source)) => format!("Active credentials: {}", source),
        None => "No active credentials".to_string(),
    }
}

/// Credentials for a run: the session's active pair, or one resolved from
/// profiles/environment (with an offer to replace it), or a fresh prompt.
fn ensure_credentials(session: &mut Session<'_>) -> Result<Credentials> {
    if let Some((creds, _)) = &session.active {
        return Ok(creds.clone());
    }
    let resolved = credentials::resolve(&session.store, None, Credentials::from_env())?;
    let active = match resolved {
        Some((creds, source)) => {
            let change = Confirm::new()
                .with_prompt(format!(
                    "Credentials already exist ({}). Would you like to change them?",
                    source
                ))
                .default(false)
                .interact()?;
            if change {
                acquire_credentials(&mut session.store)?
            } else {
                (creds, source)
            }
        }
        None => {
            println!("No credentials found. Please enter your credentials.");
            acquire_credentials(&mut session.store)?
        }
    };
    let creds = active.0.clone();
    session.active = Some(active);
    Ok(creds)
}

/// Credentials for a one-shot run. When nothing resolves, an interactive
/// terminal goes through `acquire`; otherwise the run fails with a hint.
pub fn credentials_for_run(
    store: &mut ProfileStore,
    profile: Option<&str>,
    env: Option<Credentials>,
    interactive: bool,
    acquire: impl FnOnce(&mut ProfileStore) -> Result<(Credentials, CredentialSource)>,
) -> Result<(Credentials, CredentialSource)> {
    if let Some(found) = credentials::resolve(store, profile, env)? {
        return Ok(found);
    }
    if !interactive {
        bail!(
            "No credentials found. Save a profile with `omie-export profiles save` or set APP_KEY and APP_SECRET"
        );
    }
    println!("No credentials found. Please enter your credentials.");
    acquire(store)
}

/// Prompt for a key/secret pair and save it under a profile name right away.
pub fn acquire_credentials(store: &mut ProfileStore) -> Result<(Credentials, CredentialSource)> {
    let key: String = Input::new().with_prompt("App key").interact_text()?;
    let secret: String = Password::new().with_prompt("App secret").interact()?;
    let creds = Credentials::new(&key, &secret)?;

    let name: String = Input::new()
        .with_prompt("Save as profile")
        .default(DEFAULT_PROFILE.to_string())
        .interact_text()?;
    store
        .save(&name, creds.clone())
        .with_context(|| format!("Saving profile \"{}\"", name))?;
    println!("Profile \"{}\" saved to {}", name.trim(), store.path().display());
    Ok((creds, CredentialSource::Profile(name.trim().to_string())))
}

fn run_export(session: &mut Session<'_>) -> Result<()> {
    let creds = ensure_credentials(session)?;

    let calls = session.registry.calls();
    let selection = Select::new()
        .with_prompt("Please select the call you want to make")
        .items(&calls)
        .default(0)
        .interact()?;
    let endpoint = session.registry.by_index(selection + 1)?;

    println!("Executing API call for: {}", endpoint.call);
    session.log.push(format!("--- {} ---", endpoint.call));

    let (handle, events) = spawn_fetch(
        session.api.clone(),
        endpoint.url.clone(),
        endpoint.call.to_string(),
        creds,
    );
    let pb = progress_bar()?;
    let mut finished: Option<FetchReport> = None;
    let mut failure: Option<String> = None;
    for event in events {
        match event {
            FetchEvent::Log(line) => session.log.push(line),
            FetchEvent::Finished(report) => finished = Some(report),
            FetchEvent::Failed(msg) => failure = Some(msg),
            other => apply_event(&pb, &other),
        }
    }
    handle
        .join()
        .map_err(|_| anyhow!("fetch worker terminated unexpectedly"))?;

    let report = match (finished, failure) {
        (Some(report), _) => report,
        (None, Some(msg)) => {
            pb.abandon_with_message("Error occurred");
            session.log.push(msg.clone());
            return Err(anyhow!(msg));
        }
        (None, None) => {
            pb.abandon_with_message("Error occurred");
            return Err(anyhow!("fetch worker ended without a result"));
        }
    };
    pb.finish_with_message(format!("Fetched {} page(s)", report.pages.len()));

    if !report.is_complete() {
        print_warning(&format!("Pagination stopped early: {}", report.stop));
    }
    let elapsed = report.elapsed;
    let outcome = export::finish(report, session.cfg)?;

    let text = fs::read_to_string(&outcome.path)
        .with_context(|| format!("Reading back {}", outcome.path.display()))?;
    println!("{}", output::preview(&text, PREVIEW_LIMIT));
    println!(
        "{}",
        format!("Completed! Results saved to {}", outcome.path.display()).green()
    );
    println!("Execution completed in {:.2} seconds", elapsed.as_secs_f64());
    session
        .log
        .push(format!("Saved {} ({:.2}s)", outcome.path.display(), elapsed.as_secs_f64()));
    session.last_output = Some(outcome.path);
    Ok(())
}

fn manage_profiles(session: &mut Session<'_>) -> Result<()> {
    let items = vec![
        "Load profile",
        "Save current credentials as profile",
        "Enter new credentials",
        "Delete profile",
        "Back",
    ];
    let selection = Select::new().items(&items).default(0).interact()?;
    match selection {
        0 => {
            let Some(name) = pick_profile(&session.store)? else {
                return Ok(());
            };
            if let Some(creds) = session.store.get(&name) {
                session.active = Some((creds.clone(), CredentialSource::Profile(name.clone())));
                println!("Active credentials: {}", name);
            }
        }
        1 => {
            let Some((creds, _)) = session.active.clone() else {
                println!("No active credentials to save. Please enter your credentials first.");
                return Ok(());
            };
            let name: String = Input::new()
                .with_prompt("Enter a name for this profile")
                .interact_text()?;
            session.store.save(&name, creds.clone())?;
            session.active = Some((creds, CredentialSource::Profile(name.trim().to_string())));
            println!("Profile \"{}\" saved successfully", name.trim());
        }
        2 => {
            session.active = Some(acquire_credentials(&mut session.store)?);
        }
        3 => {
            let Some(name) = pick_profile(&session.store)? else {
                return Ok(());
            };
            let confirmed = Confirm::new()
                .with_prompt(format!(
                    "Are you sure you want to delete the profile \"{}\"?",
                    name
                ))
                .default(false)
                .interact()?;
            if confirmed && session.store.delete(&name)? {
                let was_active = matches!(
                    &session.active,
                    Some((_, CredentialSource::Profile(active))) if *active == name
                );
                if was_active {
                    session.active = None;
                }
                println!("Profile \"{}\" deleted successfully", name);
            }
        }
        _ => {}
    }
    Ok(())
}

fn pick_profile(store: &ProfileStore) -> Result<Option<String>> {
    let names = store.names();
    if names.is_empty() {
        println!("No saved profiles in {}", store.path().display());
        return Ok(None);
    }
    let selection = Select::new()
        .with_prompt("Select profile")
        .items(&names)
        .default(0)
        .interact()?;
    Ok(Some(names[selection].to_string()))
}

/// Copy the last result file to a location chosen through the native save
/// dialog, or typed in when no dialog is wanted.
fn save_results_as(session: &Session<'_>) -> Result<()> {
    let src = match &session.last_output {
        Some(p) if p.exists() => p,
        _ => {
            println!("No results available to save");
            return Ok(());
        }
    };
    let how = Select::new()
        .items(&["Choose with file dialog", "Type a path"])
        .default(0)
        .interact()?;
    let dest = if how == 0 {
        rfd::FileDialog::new()
            .set_file_name("omie_results.json")
            .add_filter("JSON Files", &["json"])
            .save_file()
    } else {
        let typed: String = Input::new()
            .with_prompt("Save results to")
            .default("omie_results.json".to_string())
            .interact_text()?;
        Some(PathBuf::from(typed))
    };
    let Some(dest) = dest else {
        return Ok(());
    };
    output::export(src, &dest).with_context(|| format!("Failed to save file {}", dest.display()))?;
    println!("Results saved to {}", dest.display());
    Ok(())
}

fn show_log(session: &mut Session<'_>) -> Result<()> {
    if session.log.is_empty() {
        println!("Log is empty");
        return Ok(());
    }
    for line in &session.log {
        println!("{}", line);
    }
    let clear = Confirm::new()
        .with_prompt("Clear the log?")
        .default(false)
        .interact()?;
    if clear {
        session.log.clear();
    }
    Ok(())
}

/// Page progress bar shared by the menu and the one-shot `fetch` command.
pub fn progress_bar() -> Result<ProgressBar> {
    let pb = ProgressBar::new(0);
    pb.set_style(ProgressStyle::with_template(
        "{spinner} [{bar:30}] {pos}/{len} {msg}",
    )?);
    pb.set_message("Starting...");
    Ok(pb)
}

/// Reflect a worker event on the progress bar.
pub fn apply_event(pb: &ProgressBar, event: &FetchEvent) {
    if let FetchEvent::PageFetched { page, total } = event {
        let page = u64::from(*page);
        pb.set_length((*total).max(page));
        pb.set_position(page);
        pb.set_message(format!("Processing page {} of {}", page, total));
    }
}

/// Print an error with its full cause chain in red.
pub fn print_error(e: &anyhow::Error) {
    eprintln!("{}", "ERROR".red().bold());
    eprintln!("\nDetails:\n{:?}", e);
}

pub fn print_warning(msg: &str) {
    eprintln!("{}", msg.yellow());
}
