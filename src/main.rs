//! BingX → Discord relay bot
//!
//! Polls BingX for open orders, positions and TP/SL orders and posts each
//! newly seen one to a Discord channel.

use anyhow::Context;
use bingx_relay::{
    client::BingxClient,
    commands::CommandHandler,
    config::Config,
    dedup::SharedSeenSet,
    normalize::{format_message, normalize},
    notify::{DeliverySink, DiscordSink},
    poller::{PollContext, Poller},
    types::EndpointKind,
};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "bingx-relay")]
#[command(about = "Relays BingX order and position events to Discord")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (environment variables override it)
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the poller and command listener until Ctrl-C or SIGTERM
    Run,
    /// Fetch one endpoint once and print the events without delivering them
    Snapshot {
        /// order, position or tpsl
        #[arg(short, long, default_value = "order")]
        kind: EndpointKind,
    },
    /// Send a test message to the configured channel
    TestNotify,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Note: no .env file loaded: {}", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,bingx_relay=debug")),
        )
        .init();

    let cli = Cli::parse();

    let config = Config::load(&cli.config).context("invalid configuration")?;
    tracing::debug!(?config, "Configuration loaded");

    match cli.command {
        Commands::Run => run_bot(config).await,
        Commands::Snapshot { kind } => snapshot(config, kind).await,
        Commands::TestNotify => test_notify(config).await,
    }
}

async fn run_bot(config: Config) -> anyhow::Result<()> {
    tracing::info!(symbol = %config.venue.symbol, "Starting BingX relay");

    let venue = Arc::new(BingxClient::new(&config.venue)?);
    let discord = Arc::new(DiscordSink::new(&config.discord)?);

    let ctx = PollContext {
        venue,
        sink: discord.clone(),
        seen: SharedSeenSet::new(config.poller.max_cache),
        channel_id: config.discord.channel_id.clone(),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let commands = CommandHandler::new(ctx.clone());
    let command_rx = shutdown_rx.clone();
    let poll_every = Duration::from_secs(config.discord.command_poll_secs);
    let listener = tokio::spawn(async move {
        commands.run(discord, poll_every, command_rx).await;
    });

    let poller = Poller::new(ctx, config.poller.clone());
    let poll_task = tokio::spawn(async move { poller.run(shutdown_rx).await });

    shutdown_signal().await;
    tracing::info!("Shutdown signal received");
    shutdown_tx.send_replace(true);

    let stats = poll_task.await?;
    listener.await?;

    tracing::info!(
        cycles = stats.cycles,
        delivered = stats.delivered,
        dropped_ticks = stats.dropped_ticks,
        "Relay stopped"
    );
    Ok(())
}

/// Resolve on Ctrl-C, or on SIGTERM where the platform has it
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

async fn snapshot(config: Config, kind: EndpointKind) -> anyhow::Result<()> {
    let client = BingxClient::new(&config.venue)?;
    let events = client
        .fetch_events(kind)
        .await
        .with_context(|| format!("failed to fetch {} events", kind))?;

    println!("{} {} event(s) for {}", events.len(), kind, client.symbol());
    for event in &events {
        println!("{}", format_message(&normalize(event)));
    }
    Ok(())
}

async fn test_notify(config: Config) -> anyhow::Result<()> {
    let sink = DiscordSink::new(&config.discord)?;
    let channel_id = &config.discord.channel_id;

    sink.resolve_channel(channel_id).await?;
    sink.send(channel_id, "🔔 BingX relay test message").await?;

    println!("Test message sent to channel {}", channel_id);
    Ok(())
}
