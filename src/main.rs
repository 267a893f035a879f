use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use serenity::all::GatewayIntents;
use tracing::{debug, error, info};

use murmur::config::{
    self, Config, SecretConfig, StorePaths, CONFIG_VERSION, SECRET_CONFIG_VERSION,
};
use murmur::error::BotError;
use murmur::handlers::BotHandler;
use murmur::markov::{Markov, MARKOV_MODEL_VERSION};
use murmur::state::BotState;
use murmur::utils::pid;

#[derive(Parser)]
#[command(name = "murmur")]
#[command(about = "Discord chat bot with a config-driven command core", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot
    Start {
        /// Skip the Markov model consistency check
        #[arg(long)]
        fast_start: bool,
    },
    /// Stop a running instance
    Stop,
}

#[tokio::main]
async fn main() -> Result<(), BotError> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Start { fast_start } => start(fast_start).await,
        Commands::Stop => stop(),
    }
}

async fn start(fast_start: bool) -> Result<(), BotError> {
    let paths = StorePaths::default();

    if let Some(pid) = pid::read_pid_file(&paths.pid) {
        if pid::process_exists(pid) {
            error!("Bot is already running (pid {})", pid);
            return Err(BotError::Runtime("bot is already running".to_string()));
        }
    }
    pid::write_pid_file(&paths.pid)?;

    let mut config: Config = config::load_document(&paths.config)?.unwrap_or_default();
    let mut secret: SecretConfig = config::load_document(&paths.secret)?.unwrap_or_default();
    let mut markov: Markov = config::load_document(&paths.markov)?.unwrap_or_default();

    let mut versions_ok = true;
    versions_ok &= config::check_version("config", config.version, CONFIG_VERSION);
    versions_ok &= config::check_version("secret config", secret.version, SECRET_CONFIG_VERSION);
    versions_ok &= config::check_version("markov model", markov.version, MARKOV_MODEL_VERSION);
    if !versions_ok {
        pid::remove_pid_file(&paths.pid);
        return Err(BotError::Config(
            "persisted document version mismatch".to_string(),
        ));
    }

    config.commands.register_builtins();

    if !fast_start {
        let fixes = markov.check();
        if fixes == 0 {
            info!("Markov model has passed all checks");
        } else {
            info!(
                "Markov model has not passed checks, {} error(s) were fixed",
                fixes
            );
        }
    }

    let token = match secret
        .token
        .clone()
        .or_else(|| std::env::var("DISCORD_TOKEN").ok())
    {
        Some(token) => token,
        None => {
            pid::remove_pid_file(&paths.pid);
            return Err(BotError::Config(
                "no token configured: set it in secret.yaml or DISCORD_TOKEN".to_string(),
            ));
        }
    };
    secret.token = Some(token.clone());

    let state = BotState::new(config, secret, markov, paths.clone());

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = serenity::Client::builder(&token, intents)
        .event_handler(BotHandler::new(state.clone()))
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            shard_manager.shutdown_all().await;
        }
    });

    client.start().await?;

    // The gateway loop has ended: stop the repl, persist everything once
    // more, and release the instance lock.
    state.stop_repl().await;
    state.save().await;
    pid::remove_pid_file(&paths.pid);
    info!("Bot is disconnected!");
    Ok(())
}

fn stop() -> Result<(), BotError> {
    let paths = StorePaths::default();
    let Some(pid) = pid::read_pid_file(&paths.pid) else {
        error!("Could not stop the bot (no pid recorded)");
        return Err(BotError::Runtime("bot is not running".to_string()));
    };
    if !pid::process_exists(pid) {
        error!("Could not stop the bot (bot is not running)");
        pid::remove_pid_file(&paths.pid);
        return Err(BotError::Runtime("bot is not running".to_string()));
    }
    if !pid::signal_stop(pid) {
        return Err(BotError::Runtime(format!("failed to signal pid {pid}")));
    }
    while pid::process_exists(pid) {
        debug!("Bot is still running. Please, wait...");
        std::thread::sleep(std::time::Duration::from_millis(500));
    }
    info!("Bot is stopped!");
    Ok(())
}
