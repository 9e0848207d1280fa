//! hsync: WebDAV browser-history sync CLI
//!
//! Master password:
//!   master set|unlock|lock|clear|status
//!
//! Configuration:
//!   config set [--url ..] [--username ..] [--ask-password] [--encryption <alg>] ...
//!   config show | config validate
//!
//! Sync:
//!   test-connection             - PROPFIND the configured collection
//!   push --history <file>       - merge a JSON history export into the remote copy
//!   pull [--output <file>]      - download and decrypt the remote history
//!   log [--clear]               - show the recent sync attempts
//!   watch                       - push periodically on the configured interval

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use hsync_core::config::HsyncConfig;
use hsync_core::types::{GeneralConfig, SyncDirection};
use hsync_core::validate::{validate_all_config, validate_encryption_key};
use hsync_core::{Algorithm, SyncFailure, WebDavConfig};
use hsync_crypto::KdfParams;
use hsync_secrets::prompt::{read_new_password, read_password};
use hsync_secrets::{ConfigManager, MasterPasswordManager};
use hsync_storage::{check_health, open_stores, Stores};
use hsync_sync::history::HistoryProvider;
use hsync_sync::{JsonFileHistory, RemoteHistory, ReqwestTransport, SyncEngine};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "hsync",
    version,
    about = "Browser history sync over WebDAV",
    long_about = "hsync: sync browser history to a WebDAV server, optionally encrypted"
)]
struct Cli {
    /// Path to hsync config.toml (default: <config dir>/hsync/config.toml)
    #[arg(long, short = 'c', env = "HSYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides [logging].level
    #[arg(long, env = "HSYNC_LOG")]
    log: Option<String>,

    /// Log format; overrides [logging].format
    #[arg(long, env = "HSYNC_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum, PartialEq)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Master password management
    Master {
        #[command(subcommand)]
        action: MasterAction,
    },

    /// WebDAV and sync settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Check that the WebDAV collection is reachable with the stored credentials
    #[command(name = "test-connection")]
    TestConnection,

    /// Merge local history into the remote copy and upload it
    Push {
        /// JSON array of history items (id, url, title, lastVisitTime, visitCount)
        #[arg(long)]
        history: PathBuf,
    },

    /// Download the remote history
    Pull {
        /// Write the history here instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Show recent sync attempts
    Log {
        /// Delete the log instead of printing it
        #[arg(long)]
        clear: bool,
    },

    /// Push on a fixed interval until interrupted
    Watch {
        /// JSON history export to push
        #[arg(long)]
        history: PathBuf,
        /// Minutes between pushes (default: stored syncIntervalMinutes)
        #[arg(long)]
        interval: Option<u32>,
    },
}

#[derive(Subcommand, Debug)]
enum MasterAction {
    /// Set or change the master password (changing requires `master unlock` first)
    Set,
    /// Unlock stored secrets for this session
    Unlock,
    /// Forget the session key
    Lock,
    /// Remove the master password; stored secrets return to plaintext when unlocked
    Clear {
        /// Do not ask for confirmation
        #[arg(long)]
        yes: bool,
    },
    /// Show whether a master password is set and unlocked
    Status,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Update WebDAV, encryption and general settings
    Set(ConfigSetArgs),
    /// Print the active configuration (secrets redacted)
    Show,
    /// Run the full pre-sync validation
    Validate,
}

#[derive(clap::Args, Debug, Default)]
struct ConfigSetArgs {
    /// WebDAV collection URL (https only)
    #[arg(long)]
    url: Option<String>,
    #[arg(long)]
    username: Option<String>,
    /// Prompt for the WebDAV password
    #[arg(long)]
    ask_password: bool,
    /// Enable payload encryption with this algorithm
    #[arg(long, value_parser = parse_algorithm)]
    encryption: Option<Algorithm>,
    /// Disable payload encryption
    #[arg(long, conflicts_with = "encryption")]
    no_encryption: bool,
    /// Prompt for the payload encryption key
    #[arg(long)]
    ask_key: bool,
    /// Fixed base64 16-byte payload salt (default: random per upload)
    #[arg(long)]
    salt: Option<String>,
    #[arg(long)]
    auto_sync: Option<bool>,
    /// Minutes between automatic pushes
    #[arg(long)]
    interval: Option<u32>,
    /// Most recent local records sent per push
    #[arg(long)]
    max_items: Option<usize>,
}

fn parse_algorithm(name: &str) -> std::result::Result<Algorithm, String> {
    Algorithm::ALL
        .into_iter()
        .find(|a| a.as_str() == name)
        .ok_or_else(|| {
            let known: Vec<&str> = Algorithm::ALL.iter().map(|a| a.as_str()).collect();
            format!("unknown algorithm {name:?} (expected one of: {})", known.join(", "))
        })
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let (config, found) = load_config(&config_path).await?;

    let level = cli.log.clone().unwrap_or_else(|| config.logging.level.clone());
    let format = cli.log_format.clone().unwrap_or_else(|| {
        if config.logging.format.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    });
    init_logging(&level, &format);
    if !found {
        warn!(
            "config file not found: {}  (using defaults)",
            config_path.display()
        );
    }

    let app = App::open(config)?;

    match cli.command {
        Commands::Master { action } => match action {
            MasterAction::Set => cmd_master_set(&app).await,
            MasterAction::Unlock => cmd_master_unlock(&app).await,
            MasterAction::Lock => cmd_master_lock(&app).await,
            MasterAction::Clear { yes } => cmd_master_clear(&app, yes).await,
            MasterAction::Status => cmd_master_status(&app).await,
        },
        Commands::Config { action } => match action {
            ConfigAction::Set(args) => cmd_config_set(&app, args).await,
            ConfigAction::Show => cmd_config_show(&app, &config_path, found).await,
            ConfigAction::Validate => cmd_config_validate(&app).await,
        },
        Commands::TestConnection => cmd_test_connection(&app).await,
        Commands::Push { history } => cmd_push(&app, &history).await,
        Commands::Pull { output } => cmd_pull(&app, output.as_deref()).await,
        Commands::Log { clear } => cmd_log(&app, clear).await,
        Commands::Watch { history, interval } => cmd_watch(&app, &history, interval).await,
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr so `pull` output stays clean on stdout
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Config loading ────────────────────────────────────────────────────────────

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hsync")
        .join("config.toml")
}

/// Returns the config and whether the file existed.
async fn load_config(path: &Path) -> Result<(HsyncConfig, bool)> {
    if path.exists() {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading config: {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("parsing config: {}", path.display()))?;
        Ok((config, true))
    } else {
        Ok((HsyncConfig::default(), false))
    }
}

// ── Application context ───────────────────────────────────────────────────────

struct App {
    config: HsyncConfig,
    stores: Stores,
    settings: ConfigManager,
}

impl App {
    fn open(config: HsyncConfig) -> Result<Self> {
        let stores = open_stores(&config.storage).context("opening stores")?;
        let master = MasterPasswordManager::new(&stores, kdf_params(&config));
        let settings = ConfigManager::new(&stores, master);
        Ok(Self {
            config,
            stores,
            settings,
        })
    }

    fn master(&self) -> &MasterPasswordManager {
        self.settings.master()
    }

    fn engine(&self) -> Result<SyncEngine> {
        let transport = ReqwestTransport::new(self.config.sync.http_timeout())
            .context("building HTTP client")?;
        Ok(SyncEngine::new(
            &self.stores,
            self.settings.clone(),
            Arc::new(transport),
            self.config.sync.clone(),
            kdf_params(&self.config),
        ))
    }
}

fn kdf_params(config: &HsyncConfig) -> KdfParams {
    KdfParams {
        iterations: config.crypto.pbkdf2_iterations,
    }
}

/// Print a failure with its recovery advice and turn it into an error.
fn fail(failure: SyncFailure) -> anyhow::Error {
    eprintln!("error: {}", failure.message);
    for action in &failure.recovery_actions {
        eprintln!("  - {action}");
    }
    anyhow::anyhow!("{} ({:?})", failure.message, failure.kind)
}

fn redact(secret: Option<&str>) -> &'static str {
    match secret {
        Some(s) if !s.is_empty() => "********",
        _ => "(not set)",
    }
}

// ── `hsync master` ────────────────────────────────────────────────────────────

async fn cmd_master_set(app: &App) -> Result<()> {
    let password = read_new_password("New master password: ")?;
    app.master()
        .set_master_password(&password)
        .await
        .map_err(|e| fail(SyncFailure::from_error(&e)))?;
    println!("Master password set. Run `hsync master unlock` to use stored secrets.");
    Ok(())
}

async fn cmd_master_unlock(app: &App) -> Result<()> {
    let password: SecretString = read_password("Master password: ")?;
    app.master()
        .set_session_master_password(&password)
        .await
        .map_err(|e| fail(SyncFailure::from_error(&e)))?;
    println!("Unlocked.");
    Ok(())
}

async fn cmd_master_lock(app: &App) -> Result<()> {
    app.master().lock().await?;
    println!("Locked.");
    Ok(())
}

async fn cmd_master_clear(app: &App, yes: bool) -> Result<()> {
    if !yes {
        if !app.master().is_unlocked().await {
            eprintln!("warning: the session is locked; the stored WebDAV password and encryption key will be discarded");
        }
        eprint!("Type 'clear' to remove the master password: ");
        let mut answer = String::new();
        std::io::stdin()
            .read_line(&mut answer)
            .context("reading confirmation")?;
        if answer.trim() != "clear" {
            anyhow::bail!("aborted");
        }
    }
    app.master().clear_master_password().await?;
    println!("Master password removed.");
    Ok(())
}

async fn cmd_master_status(app: &App) -> Result<()> {
    let set = app.master().has_master_password().await?;
    let unlocked = app.master().is_unlocked().await;
    println!("master password: {}", if set { "set" } else { "not set" });
    if set {
        println!("session:         {}", if unlocked { "unlocked" } else { "locked" });
    }
    for (name, store) in [
        ("persistent", &app.stores.persistent),
        ("session", &app.stores.session),
    ] {
        let health = match check_health(store.as_ref()).await {
            Ok(()) => "ok".to_string(),
            Err(e) => format!("error: {e}"),
        };
        println!("{name:<11} store: {health}");
    }
    Ok(())
}

// ── `hsync config` ────────────────────────────────────────────────────────────

async fn cmd_config_set(app: &App, args: ConfigSetArgs) -> Result<()> {
    let mut webdav = app
        .settings
        .load_config()
        .await
        .map_err(|e| fail(SyncFailure::from_error(&e)))?
        .unwrap_or_default();

    if let Some(url) = args.url {
        webdav.url = url;
    }
    if let Some(username) = args.username {
        webdav.username = username;
    }
    if args.ask_password {
        let password = read_password("WebDAV password: ")?;
        webdav.password = Some(secrecy::ExposeSecret::expose_secret(&password).to_string());
    }
    if let Some(algorithm) = args.encryption {
        webdav.encryption.enabled = true;
        webdav.encryption.algorithm = algorithm;
    }
    if args.no_encryption {
        webdav.encryption.enabled = false;
    }
    if args.ask_key {
        let key = read_new_password("Encryption key: ")?;
        webdav.encryption.key = Some(secrecy::ExposeSecret::expose_secret(&key).to_string());
    }
    if let Some(salt) = args.salt {
        webdav.encryption.salt = Some(salt).filter(|s| !s.is_empty());
    }

    if webdav.encryption.enabled {
        let check = validate_encryption_key(webdav.encryption_key().unwrap_or_default());
        if let Some(err) = check.error {
            anyhow::bail!("{err}");
        }
        if let Some(advisory) = check.advisory {
            eprintln!("warning: {advisory}");
        }
    }

    if webdav != WebDavConfig::default() {
        app.settings
            .save_config(&webdav)
            .await
            .map_err(|e| fail(SyncFailure::from_error(&e)))?;
    }

    if args.auto_sync.is_some() || args.interval.is_some() || args.max_items.is_some() {
        let mut general = app.settings.load_general_config().await?;
        apply_general(&mut general, args.auto_sync, args.interval, args.max_items);
        app.settings.save_general_config(&general).await?;
    }

    println!("Configuration saved.");
    Ok(())
}

fn apply_general(
    general: &mut GeneralConfig,
    auto_sync: Option<bool>,
    interval: Option<u32>,
    max_items: Option<usize>,
) {
    if let Some(auto_sync) = auto_sync {
        general.auto_sync = auto_sync;
    }
    if let Some(interval) = interval {
        general.sync_interval_minutes = interval;
    }
    if let Some(max_items) = max_items {
        general.max_history_items = max_items;
    }
}

async fn cmd_config_show(app: &App, config_path: &Path, found: bool) -> Result<()> {
    if found {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(&app.config).context("serializing config to TOML")?;
    print!("{rendered}");

    println!();
    println!("# WebDAV");
    match app.settings.load_config().await {
        Ok(Some(webdav)) => {
            println!("url:        {}", webdav.url);
            println!("username:   {}", webdav.username);
            println!("password:   {}", redact(webdav.password()));
            println!(
                "encryption: {}",
                if webdav.encryption.enabled {
                    webdav.encryption.algorithm.as_str()
                } else {
                    "disabled"
                }
            );
            println!("key:        {}", redact(webdav.encryption_key()));
            if let Some(strength) = webdav.encryption.key_strength {
                println!("strength:   {strength:?}");
            }
        }
        Ok(None) => println!("(not configured)"),
        Err(e) => println!("(unavailable: {e})"),
    }

    let general = app.settings.load_general_config().await?;
    println!();
    println!("# General");
    println!("{}", serde_json::to_string_pretty(&general)?);
    Ok(())
}

async fn cmd_config_validate(app: &App) -> Result<()> {
    let webdav = app
        .settings
        .load_config()
        .await
        .map_err(|e| fail(SyncFailure::from_error(&e)))?
        .context("WebDAV is not configured; run `hsync config set`")?;
    let result = validate_all_config(&webdav);
    app.settings.clear_session_config().await?;
    let advisories = result.map_err(fail)?;
    for advisory in advisories {
        eprintln!("warning: {advisory}");
    }
    println!("Configuration is valid.");
    Ok(())
}

// ── `hsync test-connection` ──────────────────────────────────────────────────

async fn cmd_test_connection(app: &App) -> Result<()> {
    app.engine()?.test_connection().await.map_err(fail)?;
    println!("Connection ok.");
    Ok(())
}

// ── `hsync push` / `hsync pull` ──────────────────────────────────────────────

async fn push_once(app: &App, engine: &SyncEngine, provider: &JsonFileHistory) -> Result<()> {
    let general = app.settings.load_general_config().await?;
    let local = provider
        .get_local_history(general.max_history_items)
        .await
        .map_err(|e| fail(SyncFailure::from_error(&e)))?;
    info!(count = local.len(), path = %provider.path().display(), "pushing local history");

    let report = engine.sync_to_cloud(&local).await.map_err(fail)?;
    println!("{}", report.message);
    Ok(())
}

async fn cmd_push(app: &App, history: &Path) -> Result<()> {
    let engine = app.engine()?;
    push_once(app, &engine, &JsonFileHistory::new(history)).await
}

async fn cmd_pull(app: &App, output: Option<&Path>) -> Result<()> {
    let remote = app.engine()?.sync_from_cloud().await.map_err(fail)?;
    let items = match remote {
        RemoteHistory::Found(items) => items,
        RemoteHistory::NotFound => {
            eprintln!("No remote history yet.");
            Vec::new()
        }
    };

    match output {
        Some(path) => {
            JsonFileHistory::write(path, &items).await?;
            println!("Wrote {} items to {}", items.len(), path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&items)?),
    }
    Ok(())
}

// ── `hsync log` ──────────────────────────────────────────────────────────────

async fn cmd_log(app: &App, clear: bool) -> Result<()> {
    let engine = app.engine()?;
    if clear {
        engine.log().clear().await?;
        println!("Sync log cleared.");
        return Ok(());
    }

    let entries = engine.log().entries().await?;
    if entries.is_empty() {
        println!("No sync attempts recorded.");
    }
    for entry in entries.iter().rev() {
        let direction = match entry.direction {
            SyncDirection::Upload => "push",
            SyncDirection::Download => "pull",
        };
        println!(
            "{}  {direction:<4}  {:<4}  {:>6} items  {}",
            entry.timestamp,
            if entry.success { "ok" } else { "FAIL" },
            entry.item_count,
            entry.message
        );
    }
    Ok(())
}

// ── `hsync watch` ────────────────────────────────────────────────────────────

async fn cmd_watch(app: &App, history: &Path, interval: Option<u32>) -> Result<()> {
    let general = app.settings.load_general_config().await?;
    if !general.auto_sync {
        warn!("autoSync is disabled in the stored settings; watching anyway");
    }
    let minutes = interval.unwrap_or(general.sync_interval_minutes).max(1);
    let engine = app.engine()?;
    let provider = JsonFileHistory::new(history);

    println!("Pushing every {minutes} min; Ctrl-C to stop.");
    let mut ticker = tokio::time::interval(Duration::from_secs(u64::from(minutes) * 60));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // A failed push is logged and retried on the next tick
                if let Err(e) = push_once(app, &engine, &provider).await {
                    warn!(error = %e, "scheduled push failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted; stopping watch");
                return Ok(());
            }
        }
    }
}
