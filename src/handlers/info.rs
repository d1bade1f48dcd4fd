use crate::{
    handlers::{AppState, SERVER_NAME},
    models::{EndpointList, ServerIndex, ServerInfo},
};
use axum::{extract::State, Json};
use serde_json::Value;

pub async fn index(State(state): State<AppState>) -> Json<ServerIndex> {
    let pricing = state.gate.pricing();
    let prices = pricing
        .iter()
        .map(|tier| (tier.name().to_string(), Value::from(tier.display_price())))
        .collect();

    Json(ServerIndex {
        name: format!("{} Server", SERVER_NAME),
        version: env!("CARGO_PKG_VERSION").to_string(),
        description: format!(
            "A x402 payment-enabled server with {} verification",
            state.verification_label()
        ),
        endpoints: EndpointList {
            free: vec!["/health".to_string(), "/info".to_string()],
            paid: pricing.paths(),
        },
        prices,
        verification: state.verification_label().to_string(),
    })
}

pub async fn server_info(State(state): State<AppState>) -> Json<ServerInfo> {
    Json(ServerInfo {
        server: SERVER_NAME.to_string(),
        description: format!("Welcome to {} - Your premium content server", SERVER_NAME),
        features: vec![
            "x402 Payment Integration".to_string(),
            "Multiple Pricing Tiers".to_string(),
            "Base Network Support".to_string(),
            format!("{} Payment Verification", state.verification_label()),
        ],
        contact: "onekgman@example.com".to_string(),
    })
}
