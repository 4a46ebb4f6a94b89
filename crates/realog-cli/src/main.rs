//! ReaLog CLI
//!
//! Command-line interface for ReaLog - a journal of daily, weekly, monthly
//! and yearly entries kept locally, on a self-hosted server or in the cloud.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use realog_core::{
    BackendKind, Category, Config, Direction, ExportFormat, HttpBackendFactory, LocalBackend,
    SyncOrchestrator, SyncStatus,
};

mod commands;
mod editor;
mod output;
mod weather;

use commands::entry::{EntryFields, ListArgs};
use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "realog")]
#[command(about = "ReaLog - a periodic journal with local, server and cloud storage")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use this config file instead of the default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Stay on the local document for this run (no server or cloud calls)
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or set program configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    #[command(flatten)]
    Journal(JournalCommands),
}

/// Commands that work on the loaded journal
#[derive(Subcommand)]
enum JournalCommands {
    /// Manage entries
    Entry {
        #[command(subcommand)]
        command: EntryCommands,
    },
    /// Manage questions
    #[command(alias = "q")]
    Question {
        #[command(subcommand)]
        command: QuestionCommands,
    },
    /// Search entry text
    Search {
        /// Text to look for
        query: String,
        /// Search within one category view only
        #[arg(short, long)]
        category: Option<Category>,
    },
    /// Export entries (json, txt, html, wxr)
    Export {
        /// Output format
        #[arg(short, long, default_value = "json")]
        format: ExportFormat,
        /// First day to include (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last day to include (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
        /// Include private entries (admin only)
        #[arg(long)]
        include_private: bool,
        /// Directory to write to, or - for stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Replace the journal with a JSON backup, or add WordPress posts
    Import {
        /// JSON backup, or WordPress export (.xml, .wxr)
        file: PathBuf,
        /// Read the file as a WordPress export whatever its name
        #[arg(long)]
        wxr: bool,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Show or switch the storage backend
    Backend {
        #[command(subcommand)]
        command: Option<BackendCommands>,
    },
    /// Start an admin session
    Login {
        /// Password (prompted when omitted)
        #[arg(long)]
        password: Option<String>,
    },
    /// End the admin session
    Logout,
    /// Show or set journal settings (synced with the journal)
    Settings {
        #[command(subcommand)]
        command: Option<SettingsCommands>,
    },
    /// Show writing streaks and entry counts
    Stats,
    /// Show status (backend, sync, session, counts)
    Status,
}

#[derive(Subcommand)]
enum EntryCommands {
    /// Write a new entry
    #[command(alias = "new")]
    Add {
        /// Entry category
        #[arg(short, long, default_value = "daily")]
        category: Category,
        /// Entry date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        #[command(flatten)]
        fields: EntryFields,
    },
    /// List entries
    #[command(alias = "ls")]
    List(ListArgs),
    /// Show an entry
    Show {
        /// Entry ID (full or prefix)
        id: String,
    },
    /// Edit an entry
    Edit {
        /// Entry ID (full or prefix)
        id: String,
        /// Move the entry to another category
        #[arg(short, long)]
        category: Option<Category>,
        #[command(flatten)]
        fields: EntryFields,
    },
    /// Delete an entry
    #[command(alias = "rm")]
    Delete {
        /// Entry ID (full or prefix)
        id: String,
    },
    /// Show the next newer entry in a category view
    Next {
        /// Entry ID (full or prefix)
        id: String,
        /// Category view to step through (defaults to the entry's own)
        #[arg(long)]
        view: Option<Category>,
    },
    /// Show the next older entry in a category view
    Prev {
        /// Entry ID (full or prefix)
        id: String,
        /// Category view to step through (defaults to the entry's own)
        #[arg(long)]
        view: Option<Category>,
    },
    /// Entries written on this date in earlier years
    OnThisDay,
}

#[derive(Subcommand)]
enum QuestionCommands {
    /// List questions
    #[command(alias = "ls")]
    List {
        /// Only this category
        #[arg(short, long)]
        category: Option<Category>,
        /// Only active questions
        #[arg(long)]
        active: bool,
    },
    /// Add a question
    Add {
        /// Question text
        text: String,
        /// Question category
        #[arg(short, long, default_value = "daily")]
        category: Category,
        /// Explicit id (generated when omitted)
        #[arg(long)]
        id: Option<String>,
    },
    /// Delete a question
    #[command(alias = "rm")]
    Delete {
        /// Question ID
        id: String,
    },
    /// Show a question when writing entries
    Activate {
        /// Question ID
        id: String,
    },
    /// Hide a question when writing entries
    Deactivate {
        /// Question ID
        id: String,
    },
}

#[derive(Subcommand)]
enum BackendCommands {
    /// Show the active backend and sync status
    Show,
    /// Switch to another backend (local, server, cloud)
    Use {
        /// Backend to switch to
        kind: BackendKind,
    },
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Show journal settings
    Show,
    /// Set a journal setting
    Set {
        /// Setting key (userName, theme, cloud.url, weekly.includeDaily, ...)
        key: String,
        /// Setting value
        value: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, server_url, server_probe, ...)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config_path = cli.config.as_deref();

    // Program config does not need the journal loaded
    let command = match cli.command {
        Commands::Config { command } => {
            return match command {
                Some(ConfigCommands::Show) | None => commands::config::show(config_path, &output),
                Some(ConfigCommands::Set { key, value }) => {
                    commands::config::set(key, value, config_path, &output)
                }
            };
        }
        Commands::Journal(command) => command,
    };

    let config = commands::config::load(config_path)?;
    init_logging(&config);

    let mut sync = start_sync(&config, cli.offline).await?;

    let result = run(command, &mut sync, &config, config_path, &output).await;

    // Push any debounced remote write before the process exits
    sync.flush().await;
    let snapshot = sync.snapshot();
    if snapshot.status == SyncStatus::Error {
        if let Some(error) = snapshot.last_error {
            output.warn(&format!("{} sync failed: {}", snapshot.backend, error));
        }
    }

    result
}

async fn start_sync(config: &Config, offline: bool) -> Result<SyncOrchestrator> {
    let factory = Arc::new(HttpBackendFactory {
        server_url: config.server_url.clone(),
        timeout: config.request_timeout(),
    });

    let mut options = config.startup_options();
    if offline {
        options.probe_server = false;
        options.preferred = Some(BackendKind::Local);
    }

    debug!("Starting sync (data dir {:?}, offline: {})", config.data_dir, offline);
    SyncOrchestrator::start(LocalBackend::new(&config.data_dir), factory, options)
        .await
        .context("Failed to open the local journal")
}

async fn run(
    command: JournalCommands,
    sync: &mut SyncOrchestrator,
    config: &Config,
    config_path: Option<&Path>,
    output: &Output,
) -> Result<()> {
    match command {
        JournalCommands::Entry { command } => handle_entry_command(command, sync, output).await,
        JournalCommands::Question { command } => handle_question_command(command, sync, output),
        JournalCommands::Search { query, category } => {
            commands::entry::search(sync, query, category, output)
        }
        JournalCommands::Export {
            format,
            from,
            to,
            include_private,
            out,
        } => commands::export::run(sync, format, from, to, include_private, out, output),
        JournalCommands::Import { file, wxr, yes } => {
            commands::import::run(sync, file, wxr, yes, output)
        }
        JournalCommands::Backend { command } => match command {
            Some(BackendCommands::Show) | None => commands::backend::show(sync, output),
            Some(BackendCommands::Use { kind }) => {
                commands::backend::switch(sync, kind, config_path, output).await
            }
        },
        JournalCommands::Login { password } => commands::auth::login(sync, password, output),
        JournalCommands::Logout => commands::auth::logout(sync, output),
        JournalCommands::Settings { command } => match command {
            Some(SettingsCommands::Show) | None => commands::settings::show(sync, output),
            Some(SettingsCommands::Set { key, value }) => {
                commands::settings::set(sync, key, value, output)
            }
        },
        JournalCommands::Stats => commands::stats::show(sync, output),
        JournalCommands::Status => commands::status::show(sync, config, output),
    }
}

async fn handle_entry_command(
    command: EntryCommands,
    sync: &mut SyncOrchestrator,
    output: &Output,
) -> Result<()> {
    match command {
        EntryCommands::Add {
            category,
            date,
            fields,
        } => commands::entry::add(sync, category, date, fields, output).await,
        EntryCommands::List(args) => commands::entry::list(sync, args, output),
        EntryCommands::Show { id } => commands::entry::show(sync, id, output),
        EntryCommands::Edit {
            id,
            category,
            fields,
        } => commands::entry::edit(sync, id, category, fields, output).await,
        EntryCommands::Delete { id } => commands::entry::delete(sync, id, output),
        EntryCommands::Next { id, view } => {
            commands::entry::step(sync, id, view, Direction::Next, output)
        }
        EntryCommands::Prev { id, view } => {
            commands::entry::step(sync, id, view, Direction::Previous, output)
        }
        EntryCommands::OnThisDay => commands::entry::on_this_day(sync, output),
    }
}

fn handle_question_command(
    command: QuestionCommands,
    sync: &mut SyncOrchestrator,
    output: &Output,
) -> Result<()> {
    match command {
        QuestionCommands::List { category, active } => {
            commands::question::list(sync, category, active, output)
        }
        QuestionCommands::Add { text, category, id } => {
            commands::question::add(sync, text, category, id, output)
        }
        QuestionCommands::Delete { id } => commands::question::delete(sync, id, output),
        QuestionCommands::Activate { id } => {
            commands::question::set_active(sync, id, true, output)
        }
        QuestionCommands::Deactivate { id } => {
            commands::question::set_active(sync, id, false, output)
        }
    }
}

/// Initialize file logging
///
/// `RUST_LOG` wins when set; otherwise the config's `log_level` (default
/// `info`) applies to both crates. Logs go to `config.log_path()` so they
/// never mix with command output.
fn init_logging(config: &Config) {
    let log_path = config.log_path();
    if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = fs::create_dir_all(parent) {
            eprintln!("Warning: Could not create log directory {:?}: {}", parent, e);
            return;
        }
    }
    let log_file = match OpenOptions::new().create(true).append(true).open(&log_path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Warning: Could not open log file {:?}: {}", log_path, e);
            return;
        }
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = config.log_level.as_deref().unwrap_or("info");
        EnvFilter::new(format!("realog_core={},realog_cli={}", level, level))
    });

    // Ignore the error if a subscriber is already installed
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_ansi(false)
        .with_writer(log_file)
        .try_init();

    info!("Logging to {:?}", log_path);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_entry_add() {
        let cli = Cli::try_parse_from([
            "realog", "entry", "add", "-c", "weekly", "--answer", "w1=Shipped", "--gps",
            "-33.86,151.21", "--private",
        ])
        .unwrap();

        let Commands::Journal(JournalCommands::Entry {
            command:
                EntryCommands::Add {
                    category, fields, ..
                },
        }) = cli.command
        else {
            panic!("expected entry add");
        };
        assert_eq!(category, Category::Weekly);
        assert_eq!(fields.answer, vec!["w1=Shipped".to_string()]);
        assert_eq!(fields.gps.map(|p| p.lat), Some(-33.86));
        assert!(fields.private);
    }

    #[test]
    fn test_text_conflicts_with_answers() {
        let result = Cli::try_parse_from([
            "realog", "entry", "add", "--text", "free", "--answer", "d1=x",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from([
            "realog", "status", "--offline", "--json", "--config", "/tmp/realog.toml",
        ])
        .unwrap();
        assert!(cli.offline);
        assert!(cli.json);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/realog.toml")));
    }

    #[test]
    fn test_parse_export_and_backend() {
        let cli = Cli::try_parse_from([
            "realog", "export", "-f", "wxr", "--from", "2024-01-01", "--out", "-",
        ])
        .unwrap();
        let Commands::Journal(JournalCommands::Export { format, from, .. }) = cli.command else {
            panic!("expected export");
        };
        assert_eq!(format, ExportFormat::Wxr);
        assert_eq!(from, NaiveDate::from_ymd_opt(2024, 1, 1));

        let cli = Cli::try_parse_from(["realog", "backend", "use", "cloud"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Journal(JournalCommands::Backend {
                command: Some(BackendCommands::Use {
                    kind: BackendKind::Cloud
                })
            })
        ));
    }

    #[test]
    fn test_config_is_handled_apart_from_journal_commands() {
        let cli = Cli::try_parse_from(["realog", "config", "set", "backend", "cloud"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                command: Some(ConfigCommands::Set { .. })
            }
        ));

        let cli = Cli::try_parse_from(["realog", "stats"]).unwrap();
        assert!(matches!(cli.command, Commands::Journal(JournalCommands::Stats)));
    }

    #[test]
    fn test_parse_step_view_and_wxr_import() {
        let cli =
            Cli::try_parse_from(["realog", "entry", "next", "abc", "--view", "weekly"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Journal(JournalCommands::Entry {
                command: EntryCommands::Next {
                    view: Some(Category::Weekly),
                    ..
                }
            })
        ));

        let cli = Cli::try_parse_from(["realog", "import", "blog.txt", "--wxr", "-y"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Journal(JournalCommands::Import {
                wxr: true,
                yes: true,
                ..
            })
        ));
    }

    #[test]
    fn test_log_directory_is_created() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = Config {
            log_file: Some(dir.path().join("nested/logs/realog.log")),
            log_level: Some("warn".to_string()),
            ..Default::default()
        };
        init_logging(&config);
        assert!(dir.path().join("nested/logs").is_dir());
    }
}
