mod app;
mod components;
mod config;
mod error;
mod event;
mod handler;
mod live;
mod remote;
mod theme;
mod tree;
mod tui;
mod ui;

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::app::App;
use crate::config::{AppConfig, GeneralConfig, LiveConfig, LoggingConfig, ServerConfig};
use crate::event::EventHandler;
use crate::live::hub::EventHub;
use crate::remote::types::validate_path;
use crate::remote::ApiClient;
use crate::tree::explorer::ExplorerSettings;
use crate::tree::persistence::SessionStorage;
use crate::tree::{Explorer, TelemetryObserver};
use crate::tui::{install_panic_hook, Tui};

/// Browse the file tree of projects on a document server.
#[derive(Parser, Debug)]
#[command(name = "ptree", version, about)]
struct Cli {
    /// Project ids to browse (Ctrl+N switches between them)
    #[arg(required = true)]
    projects: Vec<String>,

    /// API base url, e.g. http://localhost:8081/api
    #[arg(long)]
    api: Option<String>,

    /// Token sent with every request
    #[arg(long)]
    token: Option<String>,

    /// Path to a config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Reveal and select this path in the first project on startup
    #[arg(long, value_name = "PATH")]
    open: Option<String>,

    /// Do not subscribe to live server events
    #[arg(long)]
    no_live: bool,

    /// Do not remember expanded folders and focus between runs
    #[arg(long)]
    no_persist: bool,

    /// Write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Cli {
    /// Config overrides derived from flags; unset flags leave the file value.
    fn overrides(&self) -> AppConfig {
        AppConfig {
            server: ServerConfig {
                base_url: self.api.clone(),
                token: self.token.clone(),
            },
            general: GeneralConfig {
                persist: self.no_persist.then_some(false),
                ..Default::default()
            },
            live: LiveConfig {
                enabled: self.no_live.then_some(false),
                ..Default::default()
            },
            logging: LoggingConfig {
                file: self.log_file.as_ref().map(|p| p.display().to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

/// Route `tracing` output to the log file; the terminal belongs to the UI.
fn init_logging(config: &AppConfig) {
    let path = config.log_file();
    if let Some(dir) = path.parent() {
        let _ = std::fs::create_dir_all(dir);
    }
    let file = match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Warning: logging disabled, cannot open {}: {}", path.display(), e);
            return;
        }
    };
    let filter =
        EnvFilter::try_from_env("PTREE_LOG").unwrap_or_else(|_| EnvFilter::new(config.log_level()));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .init();
}

fn session_storage(config: &AppConfig) -> SessionStorage {
    if config.persist() {
        SessionStorage::open(&SessionStorage::default_path())
    } else {
        SessionStorage::in_memory()
    }
}

#[tokio::main]
async fn main() -> error::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref(), Some(&cli.overrides()));
    init_logging(&config);

    if let Some(path) = &cli.open {
        validate_path(path)?;
    }
    let client = Arc::new(ApiClient::new(config.base_url(), config.token())?);
    info!(
        base_url = config.base_url(),
        projects = ?cli.projects,
        live = config.live_enabled(),
        "starting"
    );

    install_panic_hook(config.mouse_enabled());

    let mut tui = Tui::new(config.mouse_enabled())?;
    let mut events = EventHandler::new(Duration::from_millis(16));
    let tx = events.sender();

    let settings = ExplorerSettings {
        search_debounce: config.search_debounce(),
        refresh_delay: config.refresh_delay(),
        auto_open_readme: config.auto_open_readme(),
        overscan: config.overscan(),
    };
    let mut explorer = Explorer::new(client.clone(), tx.clone(), session_storage(&config), settings);
    explorer.add_observer(Box::new(TelemetryObserver));

    let hub = config
        .live_enabled()
        .then(|| EventHub::new(client.clone(), config.reconnect_backoff()));
    let mut app = App::new(
        explorer,
        cli.projects.clone(),
        client,
        hub,
        tx,
        theme::resolve_theme(&config.theme),
        config.use_icons(),
    );
    app.start(cli.open.as_deref());

    let result = run(&mut app, &mut tui, &mut events).await;
    tui.restore()?;
    result
}

async fn run(app: &mut App, tui: &mut Tui, events: &mut EventHandler) -> error::Result<()> {
    loop {
        tui.draw(app)?;

        let event = events.next().await?;
        app.handle_event(event);

        if app.should_quit {
            info!("quitting");
            return Ok(());
        }
    }
}
