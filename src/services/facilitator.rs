use crate::{
    error::VerifierError,
    models::{PaymentProof, PriceTier, VerificationResult, X402_VERSION},
    services::Verifier,
};
use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// Delegates verification to a hosted x402 facilitator.
pub struct FacilitatorVerifier {
    facilitator_url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyRequest<'a> {
    x402_version: u32,
    payment_payload: PaymentProof,
    payment_requirements: &'a PriceTier,
}

impl FacilitatorVerifier {
    pub fn new(facilitator_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            facilitator_url: facilitator_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl Verifier for FacilitatorVerifier {
    fn name(&self) -> &'static str {
        "FACILITATOR"
    }

    async fn verify(
        &self,
        proof: &PaymentProof,
        tier: &PriceTier,
    ) -> Result<VerificationResult, VerifierError> {
        let mut payment_payload = proof.clone();
        payment_payload.x402_version = Some(X402_VERSION);
        payment_payload.scheme.get_or_insert_with(|| tier.scheme.clone());
        payment_payload
            .network
            .get_or_insert_with(|| tier.network.clone());

        let request = VerifyRequest {
            x402_version: X402_VERSION,
            payment_payload,
            payment_requirements: tier,
        };

        let response = self
            .client
            .post(format!("{}/verify", self.facilitator_url))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %body, "Facilitator rejected verify request");
            return Err(VerifierError::UnexpectedResponse(format!(
                "facilitator returned {}",
                status
            )));
        }

        let result: VerificationResult = response.json().await?;
        if !result.is_valid && result.invalid_reason.is_none() {
            return Err(VerifierError::UnexpectedResponse(
                "invalid verdict without a reason".to_string(),
            ));
        }

        tracing::debug!(valid = result.is_valid, "Facilitator verdict received");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InvalidReason, PricingTable, TierDefaults};
    use mockito::Matcher;

    fn tier() -> PriceTier {
        let defaults = TierDefaults {
            pay_to: "0xPAYEE".to_string(),
            network: "base-sepolia".to_string(),
            asset: "0xUSDC".to_string(),
            base_url: "http://localhost:3000".to_string(),
            timeout_seconds: 60,
        };
        PricingTable::tier(&defaults, "/api/pro", 100_000, "pro")
    }

    fn proof() -> PaymentProof {
        serde_json::from_value(serde_json::json!({
            "payload": {
                "authorization": {"from": "0xA", "to": "0xPAYEE", "value": "100000"},
                "signature": "0xsig"
            }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn posts_payload_and_requirements() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/verify")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "x402Version": 1,
                "paymentPayload": {
                    "x402Version": 1,
                    "scheme": "exact",
                    "network": "base-sepolia",
                    "payload": {"authorization": {"from": "0xA"}}
                },
                "paymentRequirements": {"maxAmountRequired": "100000", "payTo": "0xPAYEE"}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"isValid":true,"payer":"0xA"}"#)
            .create_async()
            .await;

        let verifier = FacilitatorVerifier::new(format!("{}/", server.url())).unwrap();
        let result = verifier.verify(&proof(), &tier()).await.unwrap();

        mock.assert_async().await;
        assert!(result.is_valid);
        assert_eq!(result.payer.as_deref(), Some("0xA"));
    }

    #[tokio::test]
    async fn passes_through_invalid_verdict() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/verify")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"isValid":false,"invalidReason":"insufficient_funds","payer":"0xA"}"#)
            .create_async()
            .await;

        let verifier = FacilitatorVerifier::new(server.url()).unwrap();
        let result = verifier.verify(&proof(), &tier()).await.unwrap();

        assert!(!result.is_valid);
        assert_eq!(result.invalid_reason, Some(InvalidReason::InsufficientFunds));
    }

    #[tokio::test]
    async fn server_error_is_a_dependency_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/verify")
            .with_status(502)
            .create_async()
            .await;

        let verifier = FacilitatorVerifier::new(server.url()).unwrap();
        let err = verifier.verify(&proof(), &tier()).await.unwrap_err();
        assert!(matches!(err, VerifierError::UnexpectedResponse(_)));
    }

    #[tokio::test]
    async fn garbage_body_is_a_dependency_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/verify")
            .with_status(200)
            .with_body("<html>oops</html>")
            .create_async()
            .await;

        let verifier = FacilitatorVerifier::new(server.url()).unwrap();
        assert!(verifier.verify(&proof(), &tier()).await.is_err());
    }

    #[tokio::test]
    async fn unreachable_facilitator_is_a_transport_error() {
        let verifier = FacilitatorVerifier::new("http://127.0.0.1:9").unwrap();
        let err = verifier.verify(&proof(), &tier()).await.unwrap_err();
        assert!(matches!(err, VerifierError::Transport(_)));
    }
}
