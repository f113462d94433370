use std::sync::Arc;

use anyhow::Context;

use localis::agent::ListenLoop;
use localis::carrier::CarrierClassifier;
use localis::channels::SignalCli;
use localis::config::BotConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Arc::new(BotConfig::from_env().context("Failed to load configuration")?);

    let mut area_codes: Vec<&str> = config.allowed_area_codes.iter().map(String::as_str).collect();
    area_codes.sort_unstable();

    eprintln!("localis v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Account: {}", config.bot_number);
    eprintln!("   Allowed area codes: {}", area_codes.join(", "));
    eprintln!(
        "   Carrier check: {}",
        if config.carrier_check_enabled() {
            "enabled"
        } else {
            "disabled"
        }
    );
    eprintln!("   Waiting for messages... (Ctrl+C to stop)\n");

    let signal = Arc::new(SignalCli::from_config(&config));
    let classifier = Arc::new(CarrierClassifier::from_config(&config));
    let listener = ListenLoop::new(
        Arc::clone(&config),
        signal.clone(),
        signal,
        classifier,
    );

    let stats = listener
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl+C: {e}");
                std::future::pending::<()>().await;
            }
        })
        .await;

    tracing::info!(
        joins = stats.joins_handled,
        subscriptions = stats.subscriptions,
        "Stopped"
    );

    Ok(())
}
