pub mod chain;
pub mod facilitator;
pub mod permissive;
pub mod verifier;

pub use chain::ChainVerifier;
pub use facilitator::FacilitatorVerifier;
pub use permissive::PermissiveVerifier;
pub use verifier::Verifier;

use crate::config::{Config, VerificationMode};
use anyhow::{Context, Result};
use std::sync::Arc;

/// Builds the verifier selected by `VERIFICATION_MODE`, once, at startup.
pub async fn build_verifier(config: &Config) -> Result<Arc<dyn Verifier>> {
    let verifier: Arc<dyn Verifier> = match config.verification_mode {
        VerificationMode::Facilitator => {
            tracing::info!("Facilitator: {}", config.facilitator_url);
            Arc::new(FacilitatorVerifier::new(config.facilitator_url.clone())?)
        }
        VerificationMode::Chain => {
            let rpc_url = config
                .rpc_url
                .as_deref()
                .context("RPC_URL required for chain verification")?;
            Arc::new(ChainVerifier::connect(rpc_url, &config.network).await?)
        }
        VerificationMode::Permissive => Arc::new(PermissiveVerifier::new()),
    };
    Ok(verifier)
}
