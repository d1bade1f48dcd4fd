//! TEST ONLY verifier. It never looks at the signature bytes, so any client
//! can forge a payment. Config refuses to build it without
//! `ALLOW_PERMISSIVE_VERIFICATION=true`, and never in production.

use crate::{
    error::VerifierError,
    models::{same_address, InvalidReason, PaymentProof, PriceTier, VerificationResult},
    services::Verifier,
};
use async_trait::async_trait;

pub struct PermissiveVerifier;

impl PermissiveVerifier {
    pub fn new() -> Self {
        tracing::warn!("PERMISSIVE verification enabled: payment signatures are NOT checked");
        Self
    }
}

impl Default for PermissiveVerifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Verifier for PermissiveVerifier {
    fn name(&self) -> &'static str {
        "PERMISSIVE"
    }

    async fn verify(
        &self,
        proof: &PaymentProof,
        tier: &PriceTier,
    ) -> Result<VerificationResult, VerifierError> {
        let payer = proof.payer().map(str::to_string);

        let payee_matches = proof
            .payee()
            .is_some_and(|to| same_address(to, &tier.pay_to));
        if !payee_matches {
            return Ok(VerificationResult::invalid(
                InvalidReason::RecipientMismatch,
                payer,
            ));
        }

        match (payer, proof.signature()) {
            (Some(payer), Some(_)) => Ok(VerificationResult::valid(payer)),
            (payer, _) => Ok(VerificationResult::invalid(
                InvalidReason::InvalidPayload,
                payer,
            )),
        }
    }
}
