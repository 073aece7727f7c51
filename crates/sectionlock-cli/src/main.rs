//! Sectionlock CLI - section lock coordinator demo and shell

mod shell;

use clap::{Parser, Subcommand};
use sectionlock_core::Error;
use sectionlock_core::api::{LockApi, LockChangeSummary, LockSummary};
use sectionlock_core::config::Config;
use sectionlock_core::domain::identity::Principal;
use sectionlock_core::domain::locking::LockChangeEvent;
use sectionlock_core::domain::subscription::LockSubscription;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "sectionlock")]
#[command(author, version, about = "Collaborative section lock coordinator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk through a scripted editing session
    Demo,

    /// Interactive shell simulating live connections on one resource
    Shell {
        /// Resource ID (a new one is generated if omitted)
        #[arg(short, long)]
        resource: Option<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, load_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    // Initialize tracing; RUST_LOG wins over the configured filter
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.logging.filter))?,
        )
        .with_writer(std::io::stderr)
        .init();

    if let Some(e) = load_error {
        warn!(error = %e, "Failed to load config, using defaults");
    }

    match cli.command {
        Commands::Demo => cmd_demo(&config, cli.format, cli.quiet).await,
        Commands::Shell { resource } => {
            let resource_id = match resource {
                Some(id) => sectionlock_core::api::parse_resource_id(&id)?.to_string(),
                None => Uuid::new_v4().to_string(),
            };
            shell::run(LockApi::new(&config), resource_id, cli.format).await
        }
        Commands::Config { action } => cmd_config(action, cli.quiet),
    }
}

// ============================================================================
// Output helpers
// ============================================================================

pub(crate) fn print_event(listener: &str, event: LockChangeEvent, format: OutputFormat) {
    let summary = LockChangeSummary::from(event);
    match format {
        OutputFormat::Json => {
            let line = serde_json::json!({ "listener": listener, "event": summary });
            println!("{}", line);
        }
        OutputFormat::Text => {
            println!(
                "  [{}] #{} {} {} held by {} ({:?})",
                listener,
                summary.revision,
                summary.change_type,
                summary.lock.section,
                summary.lock.holder,
                summary.action_type,
            );
        }
    }
}

pub(crate) fn print_locks(locks: &[LockSummary], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(locks)?),
        OutputFormat::Text => {
            if locks.is_empty() {
                println!("  No sections locked");
            }
            for lock in locks {
                let admin = if lock.is_admin_holder { " (admin)" } else { "" };
                println!("  {:<24} {}{}", lock.section, lock.holder, admin);
            }
        }
    }
    Ok(())
}

pub(crate) fn print_error(error: &Error, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let line = serde_json::json!({
                "error": error.to_string(),
                "code": error.code(),
                "suggestion": error.suggestion(),
            });
            println!("{}", line);
        }
        OutputFormat::Text => {
            println!("  Error [{}]: {}", error.code(), error);
            if let Some(suggestion) = error.suggestion() {
                println!("  Hint: {}", suggestion);
            }
        }
    }
}

/// Print every event a connection receives until it is torn down
pub(crate) fn spawn_listener(
    listener: String,
    mut subscription: LockSubscription,
    format: OutputFormat,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        debug!(
            listener = %listener,
            subscriber_id = %subscription.id(),
            resource_id = %subscription.resource_id(),
            "Listening for lock changes"
        );
        while let Some(event) = subscription.recv().await {
            print_event(&listener, event, format);
        }
        if let Some(report) = subscription.wait_closed().await {
            if format == OutputFormat::Text {
                println!("  [{}] {}", listener, report.summary());
            }
            for warning in &report.warnings {
                warn!(listener = %listener, "{}", warning);
            }
        }
    })
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_demo(config: &Config, format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    let api = LockApi::new(config);
    let resource_id = Uuid::new_v4().to_string();
    let step = |text: &str| {
        if !quiet && format == OutputFormat::Text {
            println!("\n{}", text);
        }
    };

    let abcd = Principal::user("ABCD");
    let usr1 = Principal::user("USR1");
    let admin = Principal::admin("ADMN");

    step(&format!("Resource {}", resource_id));

    let viewer = api
        .on_lock_changed(&Principal::user("VIEW"), &resource_id, CancellationToken::new())
        .await?;
    let viewer = spawn_listener("VIEW".to_string(), viewer, format);

    let abcd_connection = CancellationToken::new();
    let abcd_subscription = api
        .on_lock_changed(&abcd, &resource_id, abcd_connection.clone())
        .await?;
    let abcd_listener = spawn_listener("ABCD".to_string(), abcd_subscription, format);

    step("1. ABCD locks BUSINESS_INFORMATION");
    api.lock(&abcd, &resource_id, "BUSINESS_INFORMATION").await?;

    step("2. USR1 tries the same section");
    if let Err(e) = api.lock(&usr1, &resource_id, "BUSINESS_INFORMATION").await {
        print_error(&e, format);
    }

    step("3. ABCD locks it again (silent refresh)");
    api.lock(&abcd, &resource_id, "BUSINESS_INFORMATION").await?;

    step("4. USR1 tries to unlock ABCD's section");
    if let Err(e) = api.unlock(&usr1, &resource_id, "BUSINESS_INFORMATION").await {
        print_error(&e, format);
    }

    step("5. ABCD also locks TEAM, then disconnects");
    api.lock(&abcd, &resource_id, "TEAM").await?;
    abcd_connection.cancel();
    abcd_listener.await?;

    step("6. Three editors each lock a section");
    for (account, section) in [("A", "DATA"), ("B", "CONTRACTS"), ("C", "SUB_SYSTEMS")] {
        api.lock(&Principal::user(account), &resource_id, section).await?;
    }
    print_locks(&api.get_locks(&admin, &resource_id).await?, format)?;

    step("7. USR1 tries to release everything");
    if let Err(e) = api.unlock_all(&usr1, &resource_id).await {
        print_error(&e, format);
    }

    step("8. ADMN releases everything");
    let removed = api.unlock_all(&admin, &resource_id).await?;
    if !quiet && format == OutputFormat::Text {
        println!("  Released {} lock(s)", removed.len());
    }

    api.subscriptions().disconnect_all().await;
    viewer.await?;

    step("Final state");
    print_locks(&api.get_locks(&admin, &resource_id).await?, format)?;
    Ok(())
}

fn cmd_config(action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let items = config.list()?;
            for (key, value) in items {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}
