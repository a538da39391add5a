//! # FlexAuto: headless scenario automation host
//!
//! Usage:
//!   flexauto run                         # Start scheduler, Telegram bot and key hook
//!   flexauto run --reload-secs 30        # Also pick up edits made by other processes
//!   flexauto list                        # Show stored scenarios
//!   flexauto add scenario.json           # Import a scenario definition
//!   flexauto trigger <id>                # Run one scenario now
//!   flexauto telegram --token T --enable # Configure the bot
//!   flexauto pair                        # Bind a Telegram chat

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use flexauto_channels::{KeyHook, TelegramBot};
use flexauto_core::traits::{ChatTransport, ScenarioStore, SyntheticInput};
use flexauto_core::{AppSettings, FlexConfig, Scenario};
use flexauto_scheduler::executor::split_chain;
use flexauto_scheduler::{Scheduler, Services, SqliteStore, parse_chain};
use flexauto_tools::{SystemProcesses, TmdbService, YouTubeService, default_input_driver};

#[derive(Parser)]
#[command(
    name = "flexauto",
    version,
    about = "⚙️ FlexAuto — scenario automation: triggers, action chains, hot reload"
)]
struct Cli {
    /// Config file (default ~/.flexauto/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scheduler until Ctrl-C
    Run {
        /// Reload the scenario set every N seconds
        #[arg(long)]
        reload_secs: Option<u64>,
    },
    /// List stored scenarios
    List,
    /// Import a scenario definition (JSON)
    Add { file: PathBuf },
    /// Delete a scenario
    Remove { id: Uuid },
    /// Activate a scenario
    Enable { id: Uuid },
    /// Deactivate a scenario
    Disable { id: Uuid },
    /// Run a scenario once, skipping its trigger
    Trigger { id: Uuid },
    /// Configure the Telegram bot
    Telegram {
        #[arg(long)]
        token: Option<String>,
        #[arg(long)]
        chat_id: Option<i64>,
        #[arg(long, conflicts_with = "disable")]
        enable: bool,
        #[arg(long)]
        disable: bool,
    },
    /// Bind a Telegram chat with a one-time code
    Pair,
}

/// On-disk scenario definition accepted by `add`.
#[derive(Debug, Deserialize)]
struct ScenarioFile {
    name: String,
    #[serde(default = "default_active")]
    active: bool,
    #[serde(default)]
    color: Option<String>,
    blocks: serde_json::Value,
}

fn default_active() -> bool {
    true
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "flexauto=debug" } else { "flexauto=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => FlexConfig::load_from(path)?,
        None => FlexConfig::load()?,
    };
    let store = Arc::new(SqliteStore::open(&config.database_file())?);

    match cli.command {
        Command::Run { reload_secs } => run(config, store, reload_secs).await,
        Command::List => list(store.as_ref()).await,
        Command::Add { file } => add(store.as_ref(), &file).await,
        Command::Remove { id } => {
            if !store.delete_scenario(id).await? {
                bail!("Scenario {id} not found");
            }
            println!("🗑️  Removed {id}");
            Ok(())
        }
        Command::Enable { id } => set_active(store.as_ref(), id, true).await,
        Command::Disable { id } => set_active(store.as_ref(), id, false).await,
        Command::Trigger { id } => trigger(config, store, id).await,
        Command::Telegram {
            token,
            chat_id,
            enable,
            disable,
        } => configure_telegram(config, store.as_ref(), token, chat_id, enable, disable).await,
        Command::Pair => pair(config, store.as_ref()).await,
    }
}

fn build_services(
    store: Arc<SqliteStore>,
    bot: &TelegramBot,
    synthetic: SyntheticInput,
) -> Services {
    Services::new(store)
        .with_chat(Arc::new(bot.clone()))
        .with_video(Arc::new(YouTubeService::new()))
        .with_catalog(Arc::new(TmdbService::new()))
        .with_input(default_input_driver(synthetic))
        .with_process(Arc::new(SystemProcesses))
}

async fn run(config: FlexConfig, store: Arc<SqliteStore>, reload_secs: Option<u64>) -> Result<()> {
    println!("⚙️ FlexAuto v{}", env!("CARGO_PKG_VERSION"));
    println!("   🗄️  Database: {}", config.database_file().display());

    let bot = TelegramBot::new(config.telegram.clone());
    let (hook, key_events) = KeyHook::new();
    let services = build_services(store, &bot, hook.synthetic());
    let scheduler = Scheduler::new(services, config.scheduler.clone());

    let key_events = if config.hotkeys.enabled {
        hook.start()?;
        Some(key_events)
    } else {
        None
    };

    let summary = scheduler.start(key_events).await?;
    println!(
        "   ⏰ {} polling, {} hotkey, {} command scenario(s), {} skipped",
        summary.polling, summary.hotkeys, summary.commands, summary.skipped
    );
    println!("   Press Ctrl-C to stop.");

    let mut ticker = reload_secs
        .filter(|s| *s > 0)
        .map(|s| tokio::time::interval(Duration::from_secs(s)));
    if let Some(ticker) = ticker.as_mut() {
        ticker.tick().await;
    }

    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res.context("Failed to listen for Ctrl-C")?;
                break;
            }
            _ = next_tick(&mut ticker) => {
                if let Err(e) = scheduler.reload().await {
                    tracing::error!("❌ Reload failed: {e}");
                }
            }
        }
    }

    hook.stop();
    scheduler.shutdown().await;
    println!("👋 Stopped");
    Ok(())
}

async fn next_tick(ticker: &mut Option<tokio::time::Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn list(store: &SqliteStore) -> Result<()> {
    let scenarios = store.all_scenarios().await?;
    if scenarios.is_empty() {
        println!("No scenarios.");
        return Ok(());
    }
    for s in scenarios {
        let trigger = parse_chain(&s.blocks_json)
            .ok()
            .and_then(|blocks| blocks.first().map(|b| b.kind().to_string()))
            .unwrap_or_else(|| "invalid".into());
        let last = s
            .last_executed
            .map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "never".into());
        println!(
            "{} {} {:<24} {:<24} last run: {last}",
            if s.is_active { "🟢" } else { "⚪" },
            s.id,
            s.name,
            trigger
        );
    }
    Ok(())
}

async fn add(store: &SqliteStore, file: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let def: ScenarioFile = serde_json::from_str(&raw).context("Invalid scenario file")?;

    let blocks_json = serde_json::to_string(&def.blocks)?;
    let blocks = parse_chain(&blocks_json)?;
    split_chain(blocks).context("Scenario chain is not runnable")?;

    let mut scenario = Scenario::new(&def.name).with_blocks(blocks_json);
    scenario.is_active = def.active;
    if let Some(color) = def.color {
        scenario.color = color;
    }
    store.add_scenario(&scenario).await?;
    println!("✅ Added '{}' ({})", scenario.name, scenario.id);
    Ok(())
}

async fn set_active(store: &SqliteStore, id: Uuid, active: bool) -> Result<()> {
    let mut scenario = store
        .scenario(id)
        .await?
        .with_context(|| format!("Scenario {id} not found"))?;
    scenario.is_active = active;
    store.update_scenario(&scenario).await?;
    println!(
        "{} '{}'",
        if active { "🟢 Enabled" } else { "⚪ Disabled" },
        scenario.name
    );
    Ok(())
}

async fn trigger(config: FlexConfig, store: Arc<SqliteStore>, id: Uuid) -> Result<()> {
    let settings = store.settings().await?;
    let bot = TelegramBot::new(config.telegram.clone());
    if let Some(settings) = &settings {
        if let Some(token) = settings.active_bot_token() {
            bot.initialize(token, settings.telegram_chat_id)?;
        }
    }

    let services = build_services(store, &bot, SyntheticInput::default());
    let scheduler = Scheduler::new(services, config.scheduler);
    let outcome = scheduler.run_now(id).await;
    if !outcome.is_executed() {
        bail!("Scenario {id} did not complete");
    }
    println!("✅ Scenario {id} executed");
    Ok(())
}

async fn configure_telegram(
    config: FlexConfig,
    store: &SqliteStore,
    token: Option<String>,
    chat_id: Option<i64>,
    enable: bool,
    disable: bool,
) -> Result<()> {
    let mut settings = store.settings().await?.unwrap_or_default();

    if let Some(token) = token {
        let bot = TelegramBot::new(config.telegram);
        bot.initialize(&token, None)?;
        match bot.get_me().await {
            Ok(me) => println!("🤖 Bot @{}", me.username.as_deref().unwrap_or(&me.first_name)),
            Err(e) => println!("⚠️  Token could not be verified: {e}"),
        }
        settings.telegram_bot_token = Some(token);
    }
    if let Some(chat_id) = chat_id {
        settings.telegram_chat_id = Some(chat_id);
    }
    if enable {
        settings.telegram_enabled = true;
    }
    if disable {
        settings.telegram_enabled = false;
    }

    store.save_settings(&settings).await?;
    print_telegram(&settings);
    Ok(())
}

fn print_telegram(settings: &AppSettings) {
    println!("💬 Telegram");
    println!(
        "   Token:   {}",
        if settings.telegram_bot_token.is_some() { "set" } else { "not set" }
    );
    println!(
        "   Chat:    {}",
        settings
            .telegram_chat_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "not paired".into())
    );
    println!(
        "   Enabled: {}",
        if settings.telegram_enabled { "yes" } else { "no" }
    );
}

async fn pair(config: FlexConfig, store: &SqliteStore) -> Result<()> {
    let mut settings = store.settings().await?.unwrap_or_default();
    let Some(token) = settings.telegram_bot_token.clone() else {
        bail!("No bot token. Run `flexauto telegram --token <TOKEN>` first");
    };

    let timeout = Duration::from_secs(config.telegram.pairing_timeout_secs);
    let bot = TelegramBot::new(config.telegram);
    bot.initialize(&token, None)?;
    let mut paired = bot.pairing_events();
    let code = bot.start_pairing()?;
    bot.start_listening().await?;

    println!("🔗 Send this message to your bot within {}s:", timeout.as_secs());
    println!();
    println!("   /pair {code}");
    println!();

    let waited = tokio::time::timeout(timeout, async {
        loop {
            if paired.changed().await.is_err() {
                return None;
            }
            if let Some(id) = *paired.borrow() {
                return Some(id);
            }
        }
    })
    .await;
    bot.stop_listening();

    match waited {
        Ok(Some(chat_id)) => {
            settings.telegram_chat_id = Some(chat_id);
            settings.telegram_enabled = true;
            settings.pairing_code = None;
            store.save_settings(&settings).await?;
            println!("✅ Paired with chat {chat_id}");
            Ok(())
        }
        _ => {
            bot.stop_pairing();
            bail!("Pairing timed out")
        }
    }
}
