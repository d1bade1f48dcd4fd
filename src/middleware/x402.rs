use crate::{
    error::{ServerError, VerifierError},
    models::{same_address, PaymentProof, PriceTier, PricingTable, VerifiedPayment, X402_VERSION},
    services::Verifier,
};
use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::Engine;
use std::sync::Arc;
use std::time::Duration;

pub const PAYMENT_HEADER: &str = "X-PAYMENT";

/// What the gate decided for one request.
#[derive(Debug)]
pub enum GateDecision {
    /// Forward to the handler. `None` for free endpoints.
    Allow(Option<VerifiedPayment>),
    Reject(ServerError),
}

/// Per-request payment check in front of every route.
pub struct PaymentGate {
    pricing: Arc<PricingTable>,
    verifier: Arc<dyn Verifier>,
    unavailable_status: StatusCode,
}

impl PaymentGate {
    pub fn new(
        pricing: Arc<PricingTable>,
        verifier: Arc<dyn Verifier>,
        unavailable_status: StatusCode,
    ) -> Self {
        Self {
            pricing,
            verifier,
            unavailable_status,
        }
    }

    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    pub fn verifier_name(&self) -> &'static str {
        self.verifier.name()
    }

    /// Looks up the tier for `path` and evaluates the header against it.
    pub async fn check(&self, path: &str, raw_header: Option<&str>) -> GateDecision {
        let tier = self.pricing.get(path);
        self.evaluate(path, raw_header, tier).await
    }

    pub async fn evaluate(
        &self,
        path: &str,
        raw_header: Option<&str>,
        tier: Option<&PriceTier>,
    ) -> GateDecision {
        let Some(tier) = tier else {
            return GateDecision::Allow(None);
        };

        let Some(raw_header) = raw_header else {
            tracing::info!(path, outcome = "missing_payment", "Payment required");
            return GateDecision::Reject(ServerError::MissingPayment {
                tier: Box::new(tier.clone()),
            });
        };

        let proof = match decode_payment_header(raw_header) {
            Ok(proof) => proof,
            Err(detail) => {
                tracing::warn!(path, outcome = "malformed_payment", error = %detail, "Undecodable payment header");
                return GateDecision::Reject(ServerError::MalformedPayment {
                    detail,
                    tier: Box::new(tier.clone()),
                });
            }
        };

        if let Err(detail) = check_structure(&proof, tier) {
            tracing::warn!(
                path,
                payer = proof.payer().unwrap_or("unknown"),
                outcome = "invalid_format",
                error = %detail,
                "Payment proof failed structural checks"
            );
            return GateDecision::Reject(ServerError::InvalidFormat {
                detail,
                tier: Box::new(tier.clone()),
            });
        }

        let verifier = self.verifier.name();
        let timeout = Duration::from_secs(tier.max_timeout_seconds);
        let verdict = match tokio::time::timeout(timeout, self.verifier.verify(&proof, tier)).await
        {
            Ok(result) => result,
            Err(_) => Err(VerifierError::Timeout(tier.max_timeout_seconds)),
        };

        match verdict {
            Ok(result) if result.is_valid => {
                let payer = result.payer.or_else(|| proof.payer().map(str::to_string));
                tracing::info!(
                    path,
                    payer = payer.as_deref().unwrap_or("unknown"),
                    verifier,
                    outcome = "allowed",
                    "Payment verified"
                );
                GateDecision::Allow(Some(VerifiedPayment {
                    payer,
                    amount: proof.amount().map(str::to_string),
                    verifier,
                }))
            }
            Ok(result) => {
                let reason = result
                    .invalid_reason
                    .unwrap_or_else(|| "payment_rejected".to_string().into());
                tracing::warn!(
                    path,
                    payer = result.payer.as_deref().unwrap_or("unknown"),
                    verifier,
                    outcome = "rejected",
                    reason = %reason,
                    "Payment rejected"
                );
                GateDecision::Reject(ServerError::PaymentRejected {
                    reason,
                    payer: result.payer,
                    tier: Box::new(tier.clone()),
                })
            }
            Err(e) => {
                tracing::error!(
                    path,
                    payer = proof.payer().unwrap_or("unknown"),
                    verifier,
                    outcome = "verifier_unavailable",
                    error = %e,
                    "Payment verifier unavailable"
                );
                GateDecision::Reject(ServerError::VerifierUnavailable {
                    detail: e.to_string(),
                    status: self.unavailable_status,
                    tier: Box::new(tier.clone()),
                })
            }
        }
    }
}

/// base64 -> UTF-8 -> JSON. Errors are client faults, reported as text.
pub fn decode_payment_header(header_value: &str) -> Result<PaymentProof, String> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(header_value.trim())
        .map_err(|e| format!("invalid base64: {e}"))?;
    let text = String::from_utf8(bytes).map_err(|e| format!("invalid UTF-8: {e}"))?;
    serde_json::from_str(&text).map_err(|e| format!("invalid JSON payload: {e}"))
}

/// Shape checks that hold regardless of which verifier runs next.
fn check_structure(proof: &PaymentProof, tier: &PriceTier) -> Result<(), String> {
    if let Some(version) = proof.x402_version {
        if version != X402_VERSION {
            return Err(format!("unsupported x402Version {version}"));
        }
    }
    if let Some(scheme) = proof.scheme.as_deref() {
        if scheme != tier.scheme {
            return Err(format!("unsupported scheme {scheme}"));
        }
    }
    if let Some(network) = proof.network.as_deref() {
        if network != tier.network {
            return Err(format!("network mismatch: expected {}", tier.network));
        }
    }
    if proof.payer().is_none() {
        return Err("authorization.from is required".to_string());
    }
    match proof.payee() {
        Some(to) if same_address(to, &tier.pay_to) => {}
        Some(_) => return Err("payee mismatch".to_string()),
        None => return Err("authorization.to is required".to_string()),
    }
    if proof.signature().is_none() {
        return Err("signature is required".to_string());
    }
    Ok(())
}

// Axum middleware function
pub async fn x402_middleware_layer(
    gate: Arc<PaymentGate>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let payment_header = request
        .headers()
        .get(PAYMENT_HEADER)
        .map(|h| h.to_str().unwrap_or_default().to_string());

    match gate.check(&path, payment_header.as_deref()).await {
        GateDecision::Allow(payment) => {
            if let Some(payment) = payment {
                request.extensions_mut().insert(payment);
            }
            next.run(request).await
        }
        GateDecision::Reject(err) => err.into_response(),
    }
}
