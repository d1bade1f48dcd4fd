use anyhow::Result;
use onekgman::{
    config::Config,
    handlers::AppState,
    middleware::PaymentGate,
    models::{PricingTable, TierDefaults},
    routes::build_router,
    services::build_verifier,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("onekgman=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration; a missing payee ends the process here
    let config = Config::from_env()?;

    tracing::info!("Starting Onekgman server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {:?}", config.environment);
    tracing::info!("Payment address: {}", config.pay_to_string());
    tracing::info!("Network: {}", config.network);

    // Pricing table, built and validated once
    let pricing = Arc::new(PricingTable::standard(&TierDefaults {
        pay_to: config.pay_to_string(),
        network: config.network.clone(),
        asset: config.asset_string(),
        base_url: config.public_base_url.clone(),
        timeout_seconds: config.payment_timeout_seconds,
    })?);

    // Verifier and its connection live for the whole process
    let verifier = build_verifier(&config).await?;
    tracing::info!("Using {} verification", verifier.name());

    let gate = Arc::new(PaymentGate::new(
        pricing,
        verifier,
        config.verifier_unavailable_status,
    ));
    let app = build_router(AppState::new(gate));

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("Free: http://{}/health", addr);
    tracing::info!("Paid: http://{}/api/basic", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped, verifier released");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for ctrl+c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down gracefully...");
}
