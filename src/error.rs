use crate::models::{
    InternalErrorBody, InvalidReason, NotFoundBody, PaymentRequiredBody, PriceTier, X402_VERSION,
};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::any::Any;
use thiserror::Error;
use uuid::Uuid;

pub const AVAILABLE_ENDPOINTS: [&str; 7] = [
    "/",
    "/health",
    "/info",
    "/api/basic",
    "/api/premium",
    "/api/pro",
    "/api/vip",
];

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("X-PAYMENT header is required")]
    MissingPayment { tier: Box<PriceTier> },

    #[error("Malformed X-PAYMENT header: {detail}")]
    MalformedPayment { detail: String, tier: Box<PriceTier> },

    #[error("Invalid payment format: {detail}")]
    InvalidFormat { detail: String, tier: Box<PriceTier> },

    #[error("{reason}")]
    PaymentRejected {
        reason: InvalidReason,
        payer: Option<String>,
        tier: Box<PriceTier>,
    },

    #[error("Payment verifier unavailable: {detail}")]
    VerifierUnavailable {
        detail: String,
        status: StatusCode,
        tier: Box<PriceTier>,
    },

    #[error("The requested endpoint does not exist")]
    NotFound,

    #[error("{0}")]
    Internal(String),
}

/// Failures talking to the verification dependency, as opposed to a proof
/// the verifier looked at and refused.
#[derive(Error, Debug)]
pub enum VerifierError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected verifier response: {0}")]
    UnexpectedResponse(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("verification timed out after {0}s")]
    Timeout(u64),
}

impl From<reqwest::Error> for VerifierError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            VerifierError::UnexpectedResponse(err.to_string())
        } else {
            VerifierError::Transport(err.to_string())
        }
    }
}

impl ServerError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ServerError::MissingPayment { .. } => "MISSING_PAYMENT",
            ServerError::MalformedPayment { .. } => "MALFORMED_PAYMENT",
            ServerError::InvalidFormat { .. } => "INVALID_FORMAT",
            ServerError::PaymentRejected { .. } => "PAYMENT_REJECTED",
            ServerError::VerifierUnavailable { .. } => "VERIFIER_UNAVAILABLE",
            ServerError::NotFound => "NOT_FOUND",
            ServerError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::VerifierUnavailable { status, .. } => *status,
            ServerError::NotFound => StatusCode::NOT_FOUND,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::PAYMENT_REQUIRED,
        }
    }

    fn tier(&self) -> Option<&PriceTier> {
        match self {
            ServerError::MissingPayment { tier }
            | ServerError::MalformedPayment { tier, .. }
            | ServerError::InvalidFormat { tier, .. }
            | ServerError::PaymentRejected { tier, .. }
            | ServerError::VerifierUnavailable { tier, .. } => Some(&**tier),
            ServerError::NotFound | ServerError::Internal(_) => None,
        }
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(err: anyhow::Error) -> Self {
        ServerError::Internal(err.to_string())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        if let Some(tier) = self.tier() {
            let payer = match &self {
                ServerError::PaymentRejected { payer, .. } => payer.clone(),
                _ => None,
            };
            let body = PaymentRequiredBody {
                x402_version: X402_VERSION,
                error: message,
                error_code: self.error_code().to_string(),
                accepts: vec![tier.clone()],
                payer,
            };
            return (status, Json(body)).into_response();
        }

        match self {
            ServerError::NotFound => (
                status,
                Json(NotFoundBody {
                    error: "Not found".to_string(),
                    message,
                    available_endpoints: AVAILABLE_ENDPOINTS
                        .iter()
                        .map(|s| s.to_string())
                        .collect(),
                }),
            )
                .into_response(),
            _ => internal_error_response(message),
        }
    }
}

fn internal_error_response(message: String) -> Response {
    let request_id = Uuid::new_v4().to_string();

    tracing::error!(request_id = %request_id, error = %message, "Request failed");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(InternalErrorBody {
            error: "Internal server error".to_string(),
            message,
            request_id,
        }),
    )
        .into_response()
}

/// Panic handler for `CatchPanicLayer`: reports the panic message only.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unexpected fault".to_string()
    };
    internal_error_response(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PricingTable, TierDefaults};

    fn tier() -> Box<PriceTier> {
        let defaults = TierDefaults {
            pay_to: "0xPAYEE".to_string(),
            network: "base".to_string(),
            asset: "0xUSDC".to_string(),
            base_url: "http://localhost:3000".to_string(),
            timeout_seconds: 60,
        };
        Box::new(PricingTable::tier(&defaults, "/api/basic", 1000, "basic"))
    }

    #[test]
    fn payment_kinds_map_to_402() {
        let errors = [
            ServerError::MissingPayment { tier: tier() },
            ServerError::MalformedPayment {
                detail: "bad".into(),
                tier: tier(),
            },
            ServerError::InvalidFormat {
                detail: "bad".into(),
                tier: tier(),
            },
            ServerError::PaymentRejected {
                reason: InvalidReason::Expired,
                payer: None,
                tier: tier(),
            },
        ];
        for err in errors {
            assert_eq!(err.status(), StatusCode::PAYMENT_REQUIRED);
        }
    }

    #[test]
    fn verifier_outage_uses_configured_status() {
        let err = ServerError::VerifierUnavailable {
            detail: "down".into(),
            status: StatusCode::SERVICE_UNAVAILABLE,
            tier: tier(),
        };
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.error_code(), "VERIFIER_UNAVAILABLE");
    }

    #[test]
    fn rejection_message_is_the_reason_code() {
        let err = ServerError::PaymentRejected {
            reason: InvalidReason::InsufficientFunds,
            payer: Some("0xA".into()),
            tier: tier(),
        };
        assert_eq!(err.to_string(), "insufficient_funds");
    }

    #[test]
    fn panic_payloads_become_500() {
        let response = panic_response(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
