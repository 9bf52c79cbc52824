//! Per-network raffle parameters.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Networks on which the randomness coordinator is mocked.
pub const DEVELOPMENT_NETWORKS: [&str; 2] = ["standalone", "local"];

/// 0.01 XLM in stroops.
pub const DEFAULT_ENTRANCE_FEE: i128 = 100_000;
pub const DEFAULT_INTERVAL: u64 = 30;
pub const DEFAULT_CALLBACK_GAS_LIMIT: u32 = 500_000;
pub const DEFAULT_GAS_LANE: &str = "d89b2bf150e3b9e13446986e571fb9cab24b13cea0a43ea20a6049a85cc807cc";

pub fn is_development_network(name: &str) -> bool {
    DEVELOPMENT_NETWORKS.contains(&name)
}

fn native_token() -> String {
    "native".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub name: String,
    /// Address of the live coordinator. Not needed where it is mocked.
    #[serde(default)]
    pub vrf_coordinator: Option<String>,
    /// Asset the raffle is paid in; `native` for the network's XLM contract.
    #[serde(default = "native_token")]
    pub payment_token: String,
    pub entrance_fee: i128,
    /// Hex-encoded 32-byte coordinator key hash.
    pub gas_lane: String,
    pub subscription_id: u64,
    pub callback_gas_limit: u32,
    pub interval: u64,
}

impl NetworkConfig {
    pub fn is_development(&self) -> bool {
        is_development_network(&self.name)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |reason| Error::InvalidConfig {
            network: self.name.clone(),
            reason,
        };

        if self.entrance_fee <= 0 {
            return Err(invalid("entrance fee must be positive"));
        }
        if self.interval == 0 {
            return Err(invalid("interval must be positive"));
        }
        if self.callback_gas_limit == 0 {
            return Err(invalid("callback gas limit must be positive"));
        }
        if self.gas_lane.len() != 64 || !self.gas_lane.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid("gas lane must be 32 hex-encoded bytes"));
        }
        Ok(())
    }
}

/// Network parameters keyed by network name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkTable(BTreeMap<String, NetworkConfig>);

impl NetworkTable {
    /// The parameters the raffle ships with.
    pub fn builtin() -> Self {
        let entry = |name: &str, vrf_coordinator: Option<&str>| NetworkConfig {
            name: name.to_string(),
            vrf_coordinator: vrf_coordinator.map(str::to_string),
            payment_token: native_token(),
            entrance_fee: DEFAULT_ENTRANCE_FEE,
            gas_lane: DEFAULT_GAS_LANE.to_string(),
            subscription_id: 0,
            callback_gas_limit: DEFAULT_CALLBACK_GAS_LIMIT,
            interval: DEFAULT_INTERVAL,
        };

        let mut table = Self::default();
        // No public coordinator is deployed on testnet; supply one through a
        // network file before planning a live deployment.
        table.insert(entry("testnet", None));
        table.insert(entry("standalone", None));
        table.insert(entry("local", None));
        table
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let table: Self = serde_json::from_str(json)?;
        for (key, config) in &table.0 {
            if key != &config.name {
                return Err(Error::InvalidConfig {
                    network: key.clone(),
                    reason: "entry key does not match its name",
                });
            }
            config.validate()?;
        }
        Ok(table)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("loaded network table from {}", path.display());
        Self::from_json(&json)
    }

    pub fn insert(&mut self, config: NetworkConfig) {
        self.0.insert(config.name.clone(), config);
    }

    pub fn get(&self, name: &str) -> Result<&NetworkConfig> {
        self.0
            .get(name)
            .ok_or_else(|| Error::UnknownNetwork(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
