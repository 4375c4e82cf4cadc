use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sf_backup::config::{self, expand_tilde, is_valid_object_name, Config};
use sf_backup::managers::backup::BackupEngine;
use sf_backup::managers::logging::{self, LoggingConfig};
use sf_backup::managers::progress::RunState;
use sf_backup::utils::rest_api::RestSession;
use sf_backup::utils::source_ops::{filter_objects, RecordSource, RestRecordSource};
use sf_backup::utils::CancelSignal;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "sf-backup")]
#[command(about = "Export selected objects of a data API to CSV files", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "sf-backup.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Back up objects to CSV files
    Run {
        /// Named selection from the config file
        #[arg(short, long, conflicts_with = "object")]
        selection: Option<String>,

        /// Object to back up (can be used multiple times)
        #[arg(short, long)]
        object: Vec<String>,

        /// Output root directory (defaults to global.output_root)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// List queryable objects
    List {
        /// Only show objects whose name contains this text (case-insensitive)
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// Show the selections defined in the config file
    Selections,

    /// Validate configuration file
    Validate,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config::load_config(&cli.config)
        .with_context(|| format!("Failed to load config {:?}", cli.config))?;

    if matches!(cli.command, Commands::Validate) {
        logging::init_console_logging();
        return handle_validate(&config);
    }

    // Must stay alive until exit so buffered log lines are flushed
    let _log_guard = logging::init_logging(&LoggingConfig::from_global(&config.global))?;

    match cli.command {
        Commands::Run {
            selection,
            object,
            output,
        } => handle_run(&config, selection, object, output),
        Commands::List { filter } => handle_list(&config, filter.as_deref()),
        Commands::Selections => handle_selections(&config),
        Commands::Validate => handle_validate(&config),
    }
}

fn connect(config: &Config) -> Result<Arc<dyn RecordSource>> {
    let session = RestSession::from_config(&config.connection)
        .context("Failed to create API session")?;
    info!("Using instance {}", session.instance_url());
    Ok(Arc::new(RestRecordSource::new(session)))
}

fn handle_run(
    config: &Config,
    selection: Option<String>,
    objects: Vec<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let source = connect(config)?;

    let objects = if !objects.is_empty() {
        objects
    } else if let Some(name) = selection {
        config::resolve_selection(config, &name)?
    } else {
        select_interactively(source.as_ref())?
    };

    if let Some(bad) = objects.iter().find(|o| !is_valid_object_name(o)) {
        anyhow::bail!("Invalid object name: '{}'", bad);
    }

    let output_root = expand_tilde(output.as_deref().unwrap_or(config.global.output_root.as_path()));
    let engine = BackupEngine::new(source);
    let cancel = CancelSignal::new();
    listen_for_interrupt(cancel.clone());
    let handle = engine.start_backup_with_cancel(&objects, &output_root, cancel)?;

    println!(
        "Backing up {} object(s) into {}",
        handle.run().selection.len(),
        handle.run_dir().display()
    );
    println!("Press Ctrl-C to stop after the current page.\n");

    let mut progress_rx = handle.subscribe();
    let mut last_printed = (0, 0);
    while !handle.is_finished() {
        if progress_rx.has_changed().unwrap_or(false) {
            let progress = progress_rx.borrow_and_update().clone();
            if progress.state.is_terminal() {
                break;
            }
            let key = (progress.current_index, progress.records_retrieved);
            if progress.state == RunState::Running && progress.current_object.is_some() && key != last_printed {
                if progress.records_expected > 0 {
                    println!(
                        "[{:>3.0}%] {} - {} of {} records",
                        progress.percent(),
                        progress,
                        progress.records_retrieved,
                        progress.records_expected
                    );
                } else {
                    println!("[{:>3.0}%] {}", progress.percent(), progress);
                }
                last_printed = key;
            }
        }
        thread::sleep(Duration::from_millis(200));
    }

    let report = handle.wait();

    println!();
    for line in report.summary_lines() {
        println!("{}", line);
    }

    if report.has_failures() {
        anyhow::bail!(
            "{} object(s) failed to back up",
            report.count(sf_backup::ObjectStatus::Failed)
        );
    }

    match report.state {
        RunState::Completed => println!("\n✓ Backup completed successfully"),
        RunState::Cancelled => println!("\nBackup stopped"),
        _ => anyhow::bail!("Backup ended in state: {}", report.state),
    }

    Ok(())
}

/// First Ctrl-C requests cancellation, a second one exits immediately.
fn listen_for_interrupt(signal: CancelSignal) {
    let spawned = thread::Builder::new()
        .name("interrupt-listener".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    warn!("Ctrl-C handling unavailable: {}", e);
                    return;
                }
            };

            runtime.block_on(async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    eprintln!("\nStopping backup after the current page (Ctrl-C again to abort)...");
                    signal.cancel();
                }
                if tokio::signal::ctrl_c().await.is_ok() {
                    std::process::exit(130);
                }
            });
        });

    if let Err(e) = spawned {
        warn!("Ctrl-C handling unavailable: {}", e);
    }
}

fn select_interactively(source: &dyn RecordSource) -> Result<Vec<String>> {
    use dialoguer::{Input, MultiSelect};

    let available = source.list_objects()?;
    if available.is_empty() {
        anyhow::bail!("No queryable objects available");
    }

    let term: String = Input::new()
        .with_prompt("Filter objects (empty for all)")
        .allow_empty(true)
        .interact_text()?;
    let visible = filter_objects(&available, &term);
    if visible.is_empty() {
        anyhow::bail!("No objects match '{}'", term);
    }

    let chosen = MultiSelect::new()
        .with_prompt("Select objects to back up (space to toggle, enter to confirm)")
        .items(&visible)
        .interact()?;

    Ok(chosen.into_iter().map(|i| visible[i].clone()).collect())
}

fn handle_list(config: &Config, filter: Option<&str>) -> Result<()> {
    let source = connect(config)?;
    let available = source.list_objects()?;
    let visible = filter_objects(&available, filter.unwrap_or_default());

    for name in &visible {
        println!("{}", name);
    }
    println!("\n{} of {} queryable objects", visible.len(), available.len());

    Ok(())
}

fn handle_selections(config: &Config) -> Result<()> {
    if config.selections.is_empty() {
        println!("No selections configured");
        return Ok(());
    }

    let mut names: Vec<&String> = config.selections.keys().collect();
    names.sort();

    for name in names {
        let selection = &config.selections[name];
        println!("{}: {}", name, selection.objects.join(", "));
        if !selection.description.is_empty() {
            println!("  {}", selection.description);
        }
    }

    Ok(())
}

fn handle_validate(config: &Config) -> Result<()> {
    println!("✓ Configuration is valid");
    println!("  Instance: {}", config.connection.instance_url);
    println!("  API version: {}", config.connection.api_version);
    println!("  Output root: {}", config.global.output_root.display());
    println!("  Selections: {}", config.selections.len());
    Ok(())
}
