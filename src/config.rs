use anyhow::{bail, Context, Result};
use axum::http::StatusCode;
use ethers::types::Address;
use ethers::utils::to_checksum;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Testnet,
    Production,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationMode {
    /// Hosted facilitator `/verify` endpoint.
    Facilitator,
    /// Direct chain RPC verification.
    Chain,
    /// TEST ONLY: structural checks, signature is never validated.
    Permissive,
}

impl VerificationMode {
    pub fn label(&self) -> &'static str {
        match self {
            VerificationMode::Facilitator => "FACILITATOR",
            VerificationMode::Chain => "CHAIN",
            VerificationMode::Permissive => "PERMISSIVE",
        }
    }
}

/// Known networks: (name, chain id, USDC contract, public RPC).
const NETWORKS: [(&str, u64, &str, &str); 2] = [
    (
        "base",
        8453,
        "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
        "https://mainnet.base.org",
    ),
    (
        "base-sepolia",
        84532,
        "0x036CbD53842c5426634e9294A7D3D1bE4F8dBbCe",
        "https://sepolia.base.org",
    ),
];

pub fn chain_id(network: &str) -> Option<u64> {
    NETWORKS
        .iter()
        .find(|(name, ..)| *name == network)
        .map(|(_, id, ..)| *id)
}

fn default_usdc(network: &str) -> Option<&'static str> {
    NETWORKS
        .iter()
        .find(|(name, ..)| *name == network)
        .map(|(_, _, usdc, _)| *usdc)
}

fn default_rpc(network: &str) -> Option<&'static str> {
    NETWORKS
        .iter()
        .find(|(name, ..)| *name == network)
        .map(|(.., rpc)| *rpc)
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub host: String,
    pub port: u16,
    pub public_base_url: String,

    // Payment
    pub pay_to: Address,
    pub network: String,
    pub usdc_address: Address,
    pub payment_timeout_seconds: u64,

    // Verification
    pub verification_mode: VerificationMode,
    pub facilitator_url: String,
    pub rpc_url: Option<String>,
    pub allow_permissive: bool,
    pub verifier_unavailable_status: StatusCode,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let environment = Self::parse_environment(&var("ENVIRONMENT", "development"))?;
        let port: u16 = var("PORT", "3000").parse().context("Invalid PORT")?;
        let network = var("NETWORK", "base");

        let pay_to = Self::parse_address(
            "ADDRESS",
            &lookup("ADDRESS").context("Missing required environment variable: ADDRESS")?,
        )?;

        let usdc_address = match lookup("USDC_ADDRESS") {
            Some(addr) => Self::parse_address("USDC_ADDRESS", &addr)?,
            None => {
                let addr = default_usdc(&network).with_context(|| {
                    format!("USDC_ADDRESS required for unknown network {}", network)
                })?;
                Self::parse_address("USDC_ADDRESS", addr)?
            }
        };

        let config = Self {
            environment,
            host: var("HOST", "0.0.0.0"),
            port,
            public_base_url: var("PUBLIC_BASE_URL", &format!("http://localhost:{}", port)),

            pay_to,
            usdc_address,
            payment_timeout_seconds: var("PAYMENT_TIMEOUT_SECONDS", "60")
                .parse()
                .context("Invalid PAYMENT_TIMEOUT_SECONDS")?,

            verification_mode: Self::parse_mode(&var("VERIFICATION_MODE", "facilitator"))?,
            facilitator_url: var("FACILITATOR_URL", "https://x402.org/facilitator"),
            rpc_url: lookup("RPC_URL").or_else(|| default_rpc(&network).map(str::to_string)),
            allow_permissive: var("ALLOW_PERMISSIVE_VERIFICATION", "false")
                .parse()
                .context("Invalid ALLOW_PERMISSIVE_VERIFICATION")?,
            verifier_unavailable_status: Self::parse_outage_status(&var(
                "VERIFIER_UNAVAILABLE_STATUS",
                "402",
            ))?,
            network,
        };

        config.validate()?;
        Ok(config)
    }

    /// Checksummed payee, as advertised in `payTo`.
    pub fn pay_to_string(&self) -> String {
        to_checksum(&self.pay_to, None)
    }

    pub fn asset_string(&self) -> String {
        to_checksum(&self.usdc_address, None)
    }

    fn parse_environment(env: &str) -> Result<Environment> {
        match env.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "testnet" | "test" => Ok(Environment::Testnet),
            "production" | "prod" => Ok(Environment::Production),
            _ => bail!("Unknown environment: {}", env),
        }
    }

    fn parse_mode(mode: &str) -> Result<VerificationMode> {
        match mode.to_lowercase().as_str() {
            "facilitator" => Ok(VerificationMode::Facilitator),
            "chain" | "local" | "custom" => Ok(VerificationMode::Chain),
            "permissive" | "simple" => Ok(VerificationMode::Permissive),
            _ => bail!("Unknown VERIFICATION_MODE: {}", mode),
        }
    }

    fn parse_outage_status(status: &str) -> Result<StatusCode> {
        match status.trim() {
            "402" => Ok(StatusCode::PAYMENT_REQUIRED),
            "503" => Ok(StatusCode::SERVICE_UNAVAILABLE),
            _ => bail!("VERIFIER_UNAVAILABLE_STATUS must be 402 or 503, got {}", status),
        }
    }

    fn parse_address(var: &str, value: &str) -> Result<Address> {
        Address::from_str(value.trim()).with_context(|| format!("Invalid address for {}", var))
    }

    fn validate(&self) -> Result<()> {
        if self.payment_timeout_seconds == 0 {
            bail!("PAYMENT_TIMEOUT_SECONDS must be positive");
        }

        match self.verification_mode {
            VerificationMode::Facilitator => {
                if !self.facilitator_url.starts_with("http") {
                    bail!("FACILITATOR_URL must be HTTP(S) URL");
                }
            }
            VerificationMode::Chain => {
                let Some(rpc_url) = &self.rpc_url else {
                    bail!("RPC_URL required for chain verification on {}", self.network);
                };
                if !rpc_url.starts_with("http") {
                    bail!("RPC_URL must be HTTP(S) URL");
                }
                if chain_id(&self.network).is_none() {
                    bail!("Chain verification does not know network {}", self.network);
                }
            }
            VerificationMode::Permissive => {
                if !self.allow_permissive {
                    bail!(
                        "Permissive verification requires ALLOW_PERMISSIVE_VERIFICATION=true"
                    );
                }
                if self.environment == Environment::Production {
                    bail!("Permissive verification is not allowed in production");
                }
            }
        }

        tracing::info!(
            "Configuration validated for {:?} environment ({} verification)",
            self.environment,
            self.verification_mode.label()
        );

        Ok(())
    }
}
