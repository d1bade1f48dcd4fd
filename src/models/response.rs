use crate::models::PriceTier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const X402_VERSION: u32 = 1;

/// Body of every 402 response.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequiredBody {
    pub x402_version: u32,
    pub error: String,
    pub error_code: String,
    pub accepts: Vec<PriceTier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct NotFoundBody {
    pub error: String,
    pub message: String,
    pub available_endpoints: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct InternalErrorBody {
    pub error: String,
    pub message: String,
    pub request_id: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub server: String,
    pub uptime: u64,
    pub verification: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct EndpointList {
    pub free: Vec<String>,
    pub paid: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ServerIndex {
    pub name: String,
    pub version: String,
    pub description: String,
    pub endpoints: EndpointList,
    pub prices: serde_json::Map<String, serde_json::Value>,
    pub verification: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ServerInfo {
    pub server: String,
    pub description: String,
    pub features: Vec<String>,
    pub contact: String,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TierContent {
    pub content: String,
    pub message: String,
    pub features: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_upgrade: Option<String>,
    pub payment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
}
