use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use application::{CommandListener, DomeActor, DomeController};
use domain::event::EventPublisher;
use dome_agent::Args;
use infrastructure::{
    AgentConfig, ChannelEventPublisher, CompositeEventPublisher, DriverFactory, FileStateStore,
    LogEventPublisher,
};

async fn run() -> Result<()> {
    dotenv().ok();

    // Logs go to stderr; stdout carries the command protocol
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,dome_agent=debug,application=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    info!(pid = std::process::id(), "Dome agent starting");

    let config_dir = args.resolve_config_dir();
    let config_dir = config_dir.to_string_lossy();
    info!(config_dir = %config_dir, "Loading configuration");
    let config = AgentConfig::load(&config_dir)
        .with_context(|| format!("failed to load configuration from {config_dir}"))?;
    let config = args.apply(config);
    config.validate().context("invalid configuration after CLI overrides")?;

    info!(
        device = %config.device_name,
        driver = %config.transport.driver_type(),
        poll_interval_ms = config.poll_interval_ms,
        "Configuration loaded"
    );
    if config.transport.driver_type().is_simulated() {
        warn!("Running against the simulated dome, no hardware will move");
    }

    let factory = Arc::new(DriverFactory::new(
        config.transport.clone(),
        config.profile.clone(),
    ));
    let store = Arc::new(FileStateStore::new(&config.state_file));
    info!(path = %store.path().display(), "State file");

    let channel = Arc::new(ChannelEventPublisher::new(256));
    let publishers: Vec<Arc<dyn EventPublisher>> = vec![
        Arc::new(LogEventPublisher::new(config.device_name.clone())),
        channel.clone(),
    ];
    let publisher = Arc::new(CompositeEventPublisher::new(publishers));

    let controller = DomeController::new(config.profile.clone(), config.policy.clone());
    let (actor, handle) = DomeActor::new(
        config.device_name.clone(),
        controller,
        factory,
        store,
        publisher,
        Duration::from_millis(config.poll_interval_ms),
    );
    let actor_task = tokio::spawn(actor.run());

    let mut listener = CommandListener::new(handle.clone()).with_events(channel.subscribe());
    let listener_task = tokio::spawn(async move {
        let stdin = BufReader::new(tokio::io::stdin());
        if let Err(e) = listener.run(stdin, tokio::io::stdout()).await {
            warn!(error = %e, "Command listener stopped");
        }
    });

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutting down"),
        Err(err) => warn!(error = %err, "Unable to listen for shutdown signal"),
    }

    handle.shutdown();
    listener_task.abort();
    let controller = actor_task.await.context("dome actor task failed")?;
    info!(
        connection = controller.state().connection().as_str(),
        "Dome actor finished"
    );

    info!("Good bye");
    Ok(())
}

fn main() {
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to start the async runtime: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = rt.block_on(run()) {
        eprintln!("\nCRITICAL ERROR: {:?}", e);
        std::process::exit(1);
    }
}
