// netatlas - CMDB network topology dashboard for the terminal

mod analysis;
mod app;
mod capture;
mod graph;
mod inventory;
mod live;
mod theme;
mod ui;
mod view;

use anyhow::{Context, Result};
use app::event::{handle_key_event, handle_mouse_event};
use app::{AppConfig, AppState, CaptureSource, InventorySource, TICK_MS};
use capture::Dialect;
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Draw CMDB servers and their observed network connections as an
/// interactive topology map.
#[derive(Debug, Parser)]
#[command(name = "netatlas", version, about)]
struct Cli {
    /// Server inventory JSON file
    #[arg(long, value_name = "FILE", required_unless_present = "demo")]
    inventory: Option<PathBuf>,

    /// Server group JSON file
    #[arg(long, value_name = "FILE", required_unless_present = "demo")]
    groups: Option<PathBuf>,

    /// Network diagnostic capture to analyze with 'a'
    #[arg(long, value_name = "FILE")]
    capture: Option<PathBuf>,

    /// Capture dialect; guessed from the file name when omitted
    #[arg(long, value_enum)]
    dialect: Option<Dialect>,

    /// Run with the built-in sample inventory
    #[arg(long)]
    demo: bool,

    /// Inventory re-read period in seconds (0 disables)
    #[arg(long, default_value_t = 30)]
    refresh_secs: u64,

    /// Where 'e' writes the analysis JSON
    #[arg(long, value_name = "FILE", default_value = "netatlas-analysis.json")]
    export: PathBuf,

    /// Append logs to this file (logging is off without it)
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_deref())?;
    let config = resolve_config(cli)?;
    let app = AppState::new(config)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }
    Ok(())
}

/// Log to the requested file; the terminal itself stays clean. Without
/// `--log-file` no subscriber is installed and events go nowhere.
fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let Some(path) = log_file else {
        return Ok(());
    };

    let file = std::fs::File::options()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .init();
    Ok(())
}

fn resolve_config(cli: Cli) -> Result<AppConfig> {
    let inventory = if cli.demo {
        InventorySource::Demo
    } else {
        InventorySource::Files {
            servers: cli
                .inventory
                .context("--inventory is required without --demo")?,
            groups: cli.groups.context("--groups is required without --demo")?,
        }
    };

    let capture = match cli.capture {
        Some(path) => {
            let dialect = match cli.dialect {
                Some(dialect) => dialect,
                None => {
                    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
                    Dialect::guess_from_name(name).with_context(|| {
                        format!(
                            "cannot tell the capture type of {}; pass --dialect",
                            path.display()
                        )
                    })?
                }
            };
            Some(CaptureSource { path, dialect })
        }
        None => None,
    };

    Ok(AppConfig {
        inventory,
        capture,
        refresh_secs: cli.refresh_secs,
        export_path: cli.export,
    })
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    mut app: AppState,
) -> Result<()> {
    loop {
        app.on_tick();
        terminal.draw(|f| ui::draw(f, &mut app))?;

        if !app.running {
            return Ok(());
        }

        if event::poll(Duration::from_millis(TICK_MS))? {
            match event::read()? {
                Event::Key(key) => {
                    handle_key_event(&mut app, key.code);
                }
                Event::Mouse(mouse) => handle_mouse_event(&mut app, mouse),
                _ => {}
            }
        }
    }
}
