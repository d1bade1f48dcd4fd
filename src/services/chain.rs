//! Verifies `exact` EVM payments against the chain directly.
//!
//! EIP-712 hashing, ECDSA recovery and JSON-RPC all go through `ethers`; this
//! module only decides which checks to run and in what order. Nothing here
//! broadcasts or settles.

use crate::{
    config::chain_id,
    contracts::Erc3009Token,
    error::VerifierError,
    models::{AssetDomain, InvalidReason, PaymentProof, PriceTier, VerificationResult},
    services::Verifier,
};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use ethers::{
    providers::{Http, Middleware, Provider},
    types::{
        transaction::eip712::{EIP712Domain, Eip712, Eip712DomainType, TypedData},
        Address, RecoveryMessage, Signature, H256, U256,
    },
    utils::to_checksum,
};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

/// One provider for the life of the process, shared by every request.
pub struct ChainVerifier {
    provider: Arc<Provider<Http>>,
    chain_id: u64,
}

/// Parsed ERC-3009 `TransferWithAuthorization` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferAuthorization {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub valid_after: u64,
    pub valid_before: u64,
    pub nonce: [u8; 32],
}

impl TransferAuthorization {
    fn from_proof(proof: &PaymentProof) -> Option<Self> {
        let auth = &proof.payload.authorization;
        Some(Self {
            from: Address::from_str(auth.from.as_deref()?.trim()).ok()?,
            to: Address::from_str(auth.to.as_deref()?.trim()).ok()?,
            value: U256::from_dec_str(auth.value.as_deref()?.trim()).ok()?,
            valid_after: auth.valid_after.as_deref()?.trim().parse().ok()?,
            valid_before: auth.valid_before.as_deref()?.trim().parse().ok()?,
            nonce: parse_nonce(auth.nonce.as_deref()?)?,
        })
    }

    pub fn typed_data(&self, domain: &AssetDomain, chain_id: u64, asset: Address) -> TypedData {
        let field = |name: &str, type_: &str| Eip712DomainType {
            name: name.to_string(),
            r#type: type_.to_string(),
        };

        let mut types: BTreeMap<String, Vec<Eip712DomainType>> = BTreeMap::new();
        types.insert(
            "TransferWithAuthorization".to_string(),
            vec![
                field("from", "address"),
                field("to", "address"),
                field("value", "uint256"),
                field("validAfter", "uint256"),
                field("validBefore", "uint256"),
                field("nonce", "bytes32"),
            ],
        );

        let mut message: BTreeMap<String, serde_json::Value> = BTreeMap::new();
        message.insert("from".to_string(), to_checksum(&self.from, None).into());
        message.insert("to".to_string(), to_checksum(&self.to, None).into());
        message.insert("value".to_string(), self.value.to_string().into());
        message.insert("validAfter".to_string(), self.valid_after.to_string().into());
        message.insert("validBefore".to_string(), self.valid_before.to_string().into());
        message.insert(
            "nonce".to_string(),
            format!("0x{}", hex::encode(self.nonce)).into(),
        );

        TypedData {
            domain: EIP712Domain {
                name: Some(domain.name.clone()),
                version: Some(domain.version.clone()),
                chain_id: Some(U256::from(chain_id)),
                verifying_contract: Some(asset),
                salt: None,
            },
            types,
            primary_type: "TransferWithAuthorization".to_string(),
            message,
        }
    }
}

fn parse_nonce(raw: &str) -> Option<[u8; 32]> {
    let bytes = hex::decode(raw.trim().trim_start_matches("0x")).ok()?;
    bytes.try_into().ok()
}

impl ChainVerifier {
    /// Opens the RPC connection and checks it serves the expected chain.
    pub async fn connect(rpc_url: &str, network: &str) -> Result<Self> {
        let expected = chain_id(network)
            .with_context(|| format!("No chain id known for network {}", network))?;
        let provider = Provider::<Http>::try_from(rpc_url)?;

        let remote = provider
            .get_chainid()
            .await
            .context("Failed to query chain id from RPC")?;
        if remote != U256::from(expected) {
            bail!(
                "RPC at {} serves chain {}, expected {} for {}",
                rpc_url,
                remote,
                expected,
                network
            );
        }

        tracing::info!("Chain RPC connected: {} (chain id {})", network, expected);

        Ok(Self::with_provider(provider, expected))
    }

    pub fn with_provider(provider: Provider<Http>, chain_id: u64) -> Self {
        Self {
            provider: Arc::new(provider),
            chain_id,
        }
    }

    /// Checks that need no RPC round trip. `None` means the proof passed.
    fn check_offline(
        &self,
        auth: &TransferAuthorization,
        signature: Option<&str>,
        tier: &PriceTier,
        asset: Address,
        now: u64,
    ) -> Option<InvalidReason> {
        let payee_matches = Address::from_str(tier.pay_to.trim())
            .map(|pay_to| pay_to == auth.to)
            .unwrap_or(false);
        if !payee_matches {
            return Some(InvalidReason::RecipientMismatch);
        }

        if auth.value < U256::from(tier.amount_required_atomic) {
            return Some(InvalidReason::AmountTooLow);
        }

        if auth.valid_before <= now {
            return Some(InvalidReason::Expired);
        }
        if auth.valid_after > now {
            return Some(InvalidReason::NotYetValid);
        }

        let Some(signature) = signature.and_then(|s| Signature::from_str(s.trim()).ok()) else {
            return Some(InvalidReason::InvalidSignature);
        };
        let digest = match auth.typed_data(&tier.extra, self.chain_id, asset).encode_eip712() {
            Ok(digest) => digest,
            Err(e) => {
                tracing::debug!("EIP-712 encoding failed: {}", e);
                return Some(InvalidReason::InvalidPayload);
            }
        };
        match signature.recover(RecoveryMessage::Hash(H256::from(digest))) {
            Ok(signer) if signer == auth.from => None,
            _ => Some(InvalidReason::InvalidSignature),
        }
    }
}

#[async_trait]
impl Verifier for ChainVerifier {
    fn name(&self) -> &'static str {
        "CHAIN"
    }

    async fn verify(
        &self,
        proof: &PaymentProof,
        tier: &PriceTier,
    ) -> Result<VerificationResult, VerifierError> {
        let claimed_payer = proof.payer().map(str::to_string);

        if chain_id(&tier.network) != Some(self.chain_id) {
            return Ok(VerificationResult::invalid(
                InvalidReason::InvalidNetwork,
                claimed_payer,
            ));
        }

        let Some(auth) = TransferAuthorization::from_proof(proof) else {
            return Ok(VerificationResult::invalid(
                InvalidReason::InvalidPayload,
                claimed_payer,
            ));
        };
        let payer = to_checksum(&auth.from, None);

        let asset = Address::from_str(tier.asset.trim())
            .map_err(|_| VerifierError::Rpc(format!("asset {} is not an address", tier.asset)))?;

        let now = Utc::now().timestamp().max(0) as u64;
        if let Some(reason) = self.check_offline(&auth, proof.signature(), tier, asset, now) {
            return Ok(VerificationResult::invalid(reason, Some(payer)));
        }

        let token = Erc3009Token::new(asset, self.provider.clone());

        let used = token
            .authorization_state(auth.from, auth.nonce)
            .call()
            .await
            .map_err(|e| VerifierError::Rpc(e.to_string()))?;
        if used {
            return Ok(VerificationResult::invalid(
                InvalidReason::NonceAlreadyUsed,
                Some(payer),
            ));
        }

        let balance = token
            .balance_of(auth.from)
            .call()
            .await
            .map_err(|e| VerifierError::Rpc(e.to_string()))?;
        if balance < auth.value {
            return Ok(VerificationResult::invalid(
                InvalidReason::InsufficientFunds,
                Some(payer),
            ));
        }

        tracing::debug!(payer = %payer, balance = %balance, "On-chain checks passed");

        Ok(VerificationResult::valid(payer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PricingTable, TierDefaults};
    use ethers::signers::{LocalWallet, Signer};
    use ethers::utils::id;
    use mockito::{Matcher, ServerGuard};

    // Well-known development key; never holds real funds.
    const PAYER_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const PAYEE: &str = "0x209693Bc6afc0C5328bA36FaF03C514EF312287C";
    const USDC: &str = "0x036CbD53842c5426634e9294A7D3D1bE4F8dBbCe";

    fn tier() -> PriceTier {
        let defaults = TierDefaults {
            pay_to: PAYEE.to_string(),
            network: "base-sepolia".to_string(),
            asset: USDC.to_string(),
            base_url: "http://localhost:3000".to_string(),
            timeout_seconds: 60,
        };
        PricingTable::tier(&defaults, "/api/basic", 1000, "basic")
    }

    fn verifier() -> ChainVerifier {
        // Nothing listens here, so any RPC call fails fast.
        let provider = Provider::<Http>::try_from("http://127.0.0.1:9").unwrap();
        ChainVerifier::with_provider(provider, 84532)
    }

    /// Answers `eth_call` for one contract function with a single ABI word.
    async fn answer_call(server: &mut ServerGuard, signature: &str, word: U256) {
        let selector = hex::encode(id(signature));
        let mut encoded = [0u8; 32];
        word.to_big_endian(&mut encoded);
        server
            .mock("POST", "/")
            .match_body(Matcher::Regex(selector))
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "result": format!("0x{}", hex::encode(encoded)),
                })
                .to_string(),
            )
            .create_async()
            .await;
    }

    async fn rpc_verifier(server: &mut ServerGuard, nonce_used: bool, balance: u64) -> ChainVerifier {
        answer_call(
            server,
            "authorizationState(address,bytes32)",
            U256::from(nonce_used as u8),
        )
        .await;
        answer_call(server, "balanceOf(address)", U256::from(balance)).await;

        let provider = Provider::<Http>::try_from(server.url().as_str()).unwrap();
        ChainVerifier::with_provider(provider, 84532)
    }

    fn now() -> u64 {
        Utc::now().timestamp() as u64
    }

    async fn signed_proof(value: &str, valid_before: u64) -> (PaymentProof, Address) {
        let wallet: LocalWallet = PAYER_KEY.parse().unwrap();
        let auth = TransferAuthorization {
            from: wallet.address(),
            to: Address::from_str(PAYEE).unwrap(),
            value: U256::from_dec_str(value).unwrap(),
            valid_after: 0,
            valid_before,
            nonce: [7u8; 32],
        };
        let typed = auth.typed_data(&AssetDomain::default(), 84532, Address::from_str(USDC).unwrap());
        let signature = wallet.sign_typed_data(&typed).await.unwrap();

        let proof = serde_json::from_value(serde_json::json!({
            "scheme": "exact",
            "network": "base-sepolia",
            "payload": {
                "authorization": {
                    "from": to_checksum(&auth.from, None),
                    "to": PAYEE,
                    "value": value,
                    "validAfter": "0",
                    "validBefore": valid_before.to_string(),
                    "nonce": format!("0x{}", hex::encode(auth.nonce)),
                },
                "signature": format!("0x{}", hex::encode(signature.to_vec())),
            }
        }))
        .unwrap();
        (proof, wallet.address())
    }

    #[tokio::test]
    async fn amount_below_tier_price_is_rejected_before_rpc() {
        let (proof, _) = signed_proof("999", now() + 600).await;
        let result = verifier().verify(&proof, &tier()).await.unwrap();
        assert_eq!(result.invalid_reason, Some(InvalidReason::AmountTooLow));
    }

    #[tokio::test]
    async fn expired_authorization_is_rejected() {
        let (proof, _) = signed_proof("1000", now() - 1).await;
        let result = verifier().verify(&proof, &tier()).await.unwrap();
        assert_eq!(result.invalid_reason, Some(InvalidReason::Expired));
    }

    #[tokio::test]
    async fn tampered_value_breaks_the_signature() {
        let (mut proof, _) = signed_proof("1000", now() + 600).await;
        proof.payload.authorization.value = Some("2000".to_string());
        let result = verifier().verify(&proof, &tier()).await.unwrap();
        assert_eq!(result.invalid_reason, Some(InvalidReason::InvalidSignature));
    }

    #[tokio::test]
    async fn garbage_signature_is_rejected() {
        let (mut proof, _) = signed_proof("1000", now() + 600).await;
        proof.payload.signature = Some("0xsig".to_string());
        let result = verifier().verify(&proof, &tier()).await.unwrap();
        assert!(!result.is_valid);
        assert_eq!(result.invalid_reason, Some(InvalidReason::InvalidSignature));
    }

    #[tokio::test]
    async fn valid_signature_reaches_the_chain() {
        let (proof, _) = signed_proof("1000", now() + 600).await;
        let err = verifier().verify(&proof, &tier()).await.unwrap_err();
        assert!(matches!(err, VerifierError::Rpc(_)));
    }

    #[tokio::test]
    async fn missing_nonce_is_an_invalid_payload() {
        let (mut proof, payer) = signed_proof("1000", now() + 600).await;
        proof.payload.authorization.nonce = None;
        let result = verifier().verify(&proof, &tier()).await.unwrap();
        assert_eq!(result.invalid_reason, Some(InvalidReason::InvalidPayload));
        assert!(result
            .payer
            .unwrap()
            .eq_ignore_ascii_case(&to_checksum(&payer, None)));
    }

    #[tokio::test]
    async fn other_network_is_rejected() {
        let (proof, _) = signed_proof("1000", now() + 600).await;
        let mut tier = tier();
        tier.network = "base".to_string();
        let result = verifier().verify(&proof, &tier).await.unwrap();
        assert_eq!(result.invalid_reason, Some(InvalidReason::InvalidNetwork));
    }

    #[tokio::test]
    async fn used_nonce_is_a_replay() {
        let mut server = mockito::Server::new_async().await;
        let verifier = rpc_verifier(&mut server, true, 5_000).await;

        let (proof, _) = signed_proof("1000", now() + 600).await;
        let result = verifier.verify(&proof, &tier()).await.unwrap();
        assert!(!result.is_valid);
        assert_eq!(result.invalid_reason, Some(InvalidReason::NonceAlreadyUsed));
    }

    #[tokio::test]
    async fn balance_below_value_is_insufficient_funds() {
        let mut server = mockito::Server::new_async().await;
        let verifier = rpc_verifier(&mut server, false, 999).await;

        let (proof, _) = signed_proof("1000", now() + 600).await;
        let result = verifier.verify(&proof, &tier()).await.unwrap();
        assert!(!result.is_valid);
        assert_eq!(result.invalid_reason, Some(InvalidReason::InsufficientFunds));
    }

    #[tokio::test]
    async fn funded_fresh_authorization_is_valid() {
        let mut server = mockito::Server::new_async().await;
        let verifier = rpc_verifier(&mut server, false, 1_000).await;

        let (proof, payer) = signed_proof("1000", now() + 600).await;
        let result = verifier.verify(&proof, &tier()).await.unwrap();
        assert!(result.is_valid);
        assert_eq!(result.invalid_reason, None);
        assert_eq!(result.payer, Some(to_checksum(&payer, None)));
    }
}
