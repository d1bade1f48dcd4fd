use anyhow::{bail, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// USDC uses 6 decimals on every network we price against.
pub const USDC_DECIMALS: u32 = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceTier {
    #[serde(skip)]
    pub path: String,
    pub scheme: String,
    pub network: String,
    #[serde(
        rename = "maxAmountRequired",
        serialize_with = "amount_as_string",
        deserialize_with = "amount_from_string"
    )]
    pub amount_required_atomic: u64,
    pub resource: String,
    pub description: String,
    pub mime_type: String,
    pub pay_to: String,
    pub max_timeout_seconds: u64,
    pub asset: String,
    pub output_schema: OutputSchema,
    pub extra: AssetDomain,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSchema {
    pub input: InputSchema,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSchema {
    #[serde(rename = "type")]
    pub type_: String,
    pub method: String,
    pub discoverable: bool,
}

/// EIP-712 domain name/version of the asset contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDomain {
    pub name: String,
    pub version: String,
}

impl Default for AssetDomain {
    fn default() -> Self {
        Self {
            name: "USD Coin".to_string(),
            version: "2".to_string(),
        }
    }
}

fn amount_as_string<S: Serializer>(amount: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&amount.to_string())
}

fn amount_from_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}

impl PriceTier {
    /// The last path segment, e.g. `premium` for `/api/premium`.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Human price such as `$0.001`, derived from the atomic amount.
    pub fn display_price(&self) -> String {
        let scale = 10u64.pow(USDC_DECIMALS);
        let whole = self.amount_required_atomic / scale;
        let frac = self.amount_required_atomic % scale;
        if frac == 0 {
            return format!("${whole}.00");
        }
        let mut frac = format!("{:0width$}", frac, width = USDC_DECIMALS as usize);
        while frac.len() > 2 && frac.ends_with('0') {
            frac.pop();
        }
        format!("${whole}.{frac}")
    }
}

/// Settings shared by every tier in a table.
#[derive(Debug, Clone)]
pub struct TierDefaults {
    pub pay_to: String,
    pub network: String,
    pub asset: String,
    pub base_url: String,
    pub timeout_seconds: u64,
}

/// Read-only `path -> PriceTier` map built once at startup.
#[derive(Debug, Clone, Default)]
pub struct PricingTable {
    tiers: BTreeMap<String, PriceTier>,
    order: Vec<String>,
}

impl PricingTable {
    /// The four standard content tiers.
    pub fn standard(defaults: &TierDefaults) -> Result<Self> {
        let mut table = Self::default();
        for (path, amount, description) in [
            ("/api/basic", 1_000, "Basic Onekgman content access"),
            ("/api/premium", 10_000, "Premium Onekgman content access"),
            ("/api/pro", 100_000, "Pro Onekgman content access"),
            ("/api/vip", 1_000_000, "VIP Onekgman content access"),
        ] {
            table.insert(Self::tier(defaults, path, amount, description))?;
        }
        table.validate()?;
        Ok(table)
    }

    pub fn tier(defaults: &TierDefaults, path: &str, amount: u64, description: &str) -> PriceTier {
        PriceTier {
            path: path.to_string(),
            scheme: "exact".to_string(),
            network: defaults.network.clone(),
            amount_required_atomic: amount,
            resource: format!("{}{}", defaults.base_url.trim_end_matches('/'), path),
            description: description.to_string(),
            mime_type: "application/json".to_string(),
            pay_to: defaults.pay_to.clone(),
            max_timeout_seconds: defaults.timeout_seconds,
            asset: defaults.asset.clone(),
            output_schema: OutputSchema {
                input: InputSchema {
                    type_: "http".to_string(),
                    method: "GET".to_string(),
                    discoverable: true,
                },
            },
            extra: AssetDomain::default(),
        }
    }

    pub fn insert(&mut self, tier: PriceTier) -> Result<()> {
        if self.tiers.contains_key(&tier.path) {
            bail!("Duplicate price tier for {}", tier.path);
        }
        self.order.push(tier.path.clone());
        self.tiers.insert(tier.path.clone(), tier);
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.tiers.is_empty() {
            bail!("Pricing table has no tiers");
        }
        for tier in self.tiers.values() {
            if !tier.path.starts_with('/') {
                bail!("Tier path must start with '/': {}", tier.path);
            }
            if tier.amount_required_atomic == 0 {
                bail!("Tier {} has a zero price", tier.path);
            }
            if tier.max_timeout_seconds == 0 {
                bail!("Tier {} has a zero timeout", tier.path);
            }
            if tier.pay_to.trim().is_empty() {
                bail!("Tier {} has no payee", tier.path);
            }
        }
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<&PriceTier> {
        self.tiers.get(path)
    }

    /// Tiers in insertion order (cheapest first for the standard table).
    pub fn iter(&self) -> impl Iterator<Item = &PriceTier> {
        self.order.iter().filter_map(|path| self.tiers.get(path))
    }

    pub fn paths(&self) -> Vec<String> {
        self.order.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> TierDefaults {
        TierDefaults {
            pay_to: "0xPAYEE".to_string(),
            network: "base".to_string(),
            asset: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913".to_string(),
            base_url: "http://localhost:3000/".to_string(),
            timeout_seconds: 60,
        }
    }

    #[test]
    fn standard_table_has_four_tiers_in_price_order() {
        let table = PricingTable::standard(&defaults()).unwrap();
        let amounts: Vec<u64> = table.iter().map(|t| t.amount_required_atomic).collect();
        assert_eq!(amounts, vec![1_000, 10_000, 100_000, 1_000_000]);
        assert_eq!(
            table.paths(),
            vec!["/api/basic", "/api/premium", "/api/pro", "/api/vip"]
        );
    }

    #[test]
    fn tier_serializes_as_x402_requirement() {
        let table = PricingTable::standard(&defaults()).unwrap();
        let json = serde_json::to_value(table.get("/api/vip").unwrap()).unwrap();
        assert_eq!(json["maxAmountRequired"], "1000000");
        assert_eq!(json["scheme"], "exact");
        assert_eq!(json["payTo"], "0xPAYEE");
        assert_eq!(json["resource"], "http://localhost:3000/api/vip");
        assert_eq!(json["maxTimeoutSeconds"], 60);
        assert_eq!(json["outputSchema"]["input"]["type"], "http");
        assert_eq!(json["extra"]["version"], "2");
        assert!(json.get("path").is_none());
    }

    #[test]
    fn display_price_trims_to_cents() {
        let table = PricingTable::standard(&defaults()).unwrap();
        let prices: Vec<String> = table.iter().map(PriceTier::display_price).collect();
        assert_eq!(prices, vec!["$0.001", "$0.01", "$0.10", "$1.00"]);
    }

    #[test]
    fn duplicate_paths_are_rejected() {
        let mut table = PricingTable::default();
        table
            .insert(PricingTable::tier(&defaults(), "/api/basic", 1, "a"))
            .unwrap();
        assert!(table
            .insert(PricingTable::tier(&defaults(), "/api/basic", 2, "b"))
            .is_err());
    }

    #[test]
    fn zero_price_fails_validation() {
        let mut table = PricingTable::default();
        table
            .insert(PricingTable::tier(&defaults(), "/api/free", 0, "free"))
            .unwrap();
        assert!(table.validate().is_err());
    }
}
