use crate::{
    error::VerifierError,
    models::{PaymentProof, PriceTier, VerificationResult},
};
use async_trait::async_trait;

/// Checks a structurally valid proof against a tier.
///
/// `Ok` carries the verdict on the proof itself, valid or not. `Err` means the
/// verifier could not reach a verdict (facilitator down, RPC failure) and the
/// gate reports the dependency as unavailable instead of blaming the client.
#[async_trait]
pub trait Verifier: Send + Sync {
    /// Short label used in logs and response bodies.
    fn name(&self) -> &'static str;

    async fn verify(
        &self,
        proof: &PaymentProof,
        tier: &PriceTier,
    ) -> Result<VerificationResult, VerifierError>;
}
