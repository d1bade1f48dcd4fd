use serde::{Deserialize, Serialize};
use std::fmt;

/// Decoded `X-PAYMENT` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentProof {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x402_version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    pub payload: ExactPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExactPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    pub authorization: Authorization,
}

/// ERC-3009 `transferWithAuthorization` arguments as sent by x402 clients.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorization {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_after: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

impl PaymentProof {
    pub fn payer(&self) -> Option<&str> {
        non_empty(self.payload.authorization.from.as_deref())
    }

    pub fn payee(&self) -> Option<&str> {
        non_empty(self.payload.authorization.to.as_deref())
    }

    pub fn signature(&self) -> Option<&str> {
        non_empty(self.payload.signature.as_deref())
    }

    pub fn amount(&self) -> Option<&str> {
        non_empty(self.payload.authorization.value.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Address comparison that ignores EIP-55 checksum casing.
pub fn same_address(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Why a verifier refused a proof. Known x402 reason codes get their own
/// variant; anything else a facilitator sends is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InvalidReason {
    InsufficientFunds,
    InvalidSignature,
    AmountTooLow,
    Expired,
    NotYetValid,
    RecipientMismatch,
    NonceAlreadyUsed,
    InvalidNetwork,
    InvalidScheme,
    InvalidPayload,
    Other(String),
}

impl InvalidReason {
    pub fn as_str(&self) -> &str {
        match self {
            InvalidReason::InsufficientFunds => "insufficient_funds",
            InvalidReason::InvalidSignature => "invalid_exact_evm_payload_signature",
            InvalidReason::AmountTooLow => "invalid_exact_evm_payload_authorization_value",
            InvalidReason::Expired => "invalid_exact_evm_payload_authorization_valid_before",
            InvalidReason::NotYetValid => "invalid_exact_evm_payload_authorization_valid_after",
            InvalidReason::RecipientMismatch => "invalid_exact_evm_payload_recipient_mismatch",
            InvalidReason::NonceAlreadyUsed => "invalid_transaction_state",
            InvalidReason::InvalidNetwork => "invalid_network",
            InvalidReason::InvalidScheme => "invalid_scheme",
            InvalidReason::InvalidPayload => "invalid_payload",
            InvalidReason::Other(reason) => reason,
        }
    }
}

impl From<String> for InvalidReason {
    fn from(value: String) -> Self {
        match value.as_str() {
            "insufficient_funds" => InvalidReason::InsufficientFunds,
            "invalid_exact_evm_payload_signature" => InvalidReason::InvalidSignature,
            "invalid_exact_evm_payload_authorization_value" => InvalidReason::AmountTooLow,
            "invalid_exact_evm_payload_authorization_valid_before" => InvalidReason::Expired,
            "invalid_exact_evm_payload_authorization_valid_after" => InvalidReason::NotYetValid,
            "invalid_exact_evm_payload_recipient_mismatch" => InvalidReason::RecipientMismatch,
            "invalid_transaction_state" => InvalidReason::NonceAlreadyUsed,
            "invalid_network" => InvalidReason::InvalidNetwork,
            "invalid_scheme" => InvalidReason::InvalidScheme,
            "invalid_payload" => InvalidReason::InvalidPayload,
            _ => InvalidReason::Other(value),
        }
    }
}

impl From<InvalidReason> for String {
    fn from(reason: InvalidReason) -> Self {
        reason.as_str().to_string()
    }
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of checking a proof against a tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<InvalidReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

impl VerificationResult {
    pub fn valid(payer: impl Into<String>) -> Self {
        Self {
            is_valid: true,
            invalid_reason: None,
            payer: Some(payer.into()),
        }
    }

    pub fn invalid(reason: InvalidReason, payer: Option<String>) -> Self {
        Self {
            is_valid: false,
            invalid_reason: Some(reason),
            payer,
        }
    }
}

/// Attached to request extensions once the gate lets a paid request through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedPayment {
    pub payer: Option<String>,
    pub amount: Option<String>,
    pub verifier: &'static str,
}
