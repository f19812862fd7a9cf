// main.rs

mod api;
mod app;
mod cache;
mod cancel;
mod config;
mod error;
mod form;
mod models;
mod page;
mod parser;
mod reconcile;
#[cfg(test)]
mod testing;
mod ui;
mod weather;

use crate::api::ApiClient;
use crate::app::{App, SharedBackend};
use crate::config::{default_log_path, Config, Variant};
use crate::parser::{parse_location, Location};
use clap::Parser;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use dotenv::dotenv;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "smart-todo", version, about = "Smart todo list and saved weather locations")]
struct Cli {
    /// Start location, e.g. `/tasks?email=me@example.com`
    location: Option<String>,

    /// Shorthand for the configured variant's location with this email
    #[arg(long)]
    email: Option<String>,

    /// `tasks` or `weather`; overrides the config file
    #[arg(long)]
    variant: Option<Variant>,

    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long = "log-file")]
    log_file: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(log_file: Option<PathBuf>, verbose: bool) -> io::Result<Option<WorkerGuard>> {
    // The terminal is owned by the UI, so logs only ever go to a file.
    let Some(path) = log_file.or_else(default_log_path) else {
        return Ok(None);
    };
    let dir = path
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&dir)?;
    let file_name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "smart-todo.log".into());

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));

    let default_level = if verbose { "info,smart_todo=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(true)
        .with_ansi(false)
        .try_init();

    Ok(Some(guard))
}

fn start_location(cli: &Cli, variant: Variant) -> Result<Location, Box<dyn std::error::Error>> {
    if let Some(location) = &cli.location {
        return Ok(parse_location(location, variant.route())?);
    }
    Ok(match &cli.email {
        Some(email) => Location::new(variant.route(), email.trim()),
        None => Location::landing(),
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenv().ok();

    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_file.clone(), cli.verbose)?;

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(variant) = cli.variant {
        config.variant = variant;
    }
    let location = start_location(&cli, config.variant)?;
    info!(variant = ?config.variant, %location, "starting");

    let api: SharedBackend = Arc::new(ApiClient::new(&config));

    // Setup terminal UI
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    terminal.hide_cursor()?;

    let app = App::new(api, config.variant, location);

    let res = ui::run_app(&mut terminal, app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("Error: {:?}", err);
    }

    Ok(())
}
