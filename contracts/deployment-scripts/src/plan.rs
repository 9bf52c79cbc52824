//! Ordered deployment steps for one network.
//!
//! Development networks get a coordinator mock with a funded subscription
//! before the raffle goes out; live networks point the raffle at the
//! configured coordinator.

use serde::{Deserialize, Serialize};

use crate::config::{NetworkConfig, NetworkTable};
use crate::error::{Error, Result};

/// 0.25 LINK premium per request, 18 decimals.
pub const MOCK_BASE_FEE: i128 = 250_000_000_000_000_000;
/// LINK-units per unit of callback gas.
pub const MOCK_GAS_PRICE_LINK: i128 = 1_000_000_000;
/// 10 LINK, enough for a long run of local rounds.
pub const MOCK_SUBSCRIPTION_FUND: i128 = 10_000_000_000_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockArgs {
    pub base_fee: i128,
    pub gas_price_link: i128,
}

impl Default for MockArgs {
    fn default() -> Self {
        Self {
            base_fee: MOCK_BASE_FEE,
            gas_price_link: MOCK_GAS_PRICE_LINK,
        }
    }
}

/// Where the raffle's coordinator comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "value")]
pub enum CoordinatorSource {
    /// The mock deployed earlier in the same plan.
    Mock,
    Address(String),
}

/// Where the raffle's subscription id comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "value")]
pub enum SubscriptionSource {
    /// The subscription created earlier in the same plan.
    CreatedByPlan,
    Configured(u64),
}

/// Arguments for the raffle's `init` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaffleInitArgs {
    pub coordinator: CoordinatorSource,
    pub payment_token: String,
    pub entrance_fee: i128,
    pub key_hash: String,
    pub subscription: SubscriptionSource,
    pub callback_gas_limit: u32,
    pub interval: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "step")]
pub enum DeployStep {
    DeployVrfCoordinatorMock { args: MockArgs },
    CreateSubscription,
    FundSubscription { amount: i128 },
    DeployRaffle { init: RaffleInitArgs },
    AddConsumer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployPlan {
    pub network: String,
    pub steps: Vec<DeployStep>,
}

impl DeployPlan {
    pub fn for_network(table: &NetworkTable, name: &str) -> Result<Self> {
        let config = table.get(name)?;
        config.validate()?;
        Self::for_config(config)
    }

    pub fn for_config(config: &NetworkConfig) -> Result<Self> {
        let mut steps = Vec::new();

        let (coordinator, subscription) = if config.is_development() {
            log::info!("local network `{}` detected, deploying mocks", config.name);
            steps.push(DeployStep::DeployVrfCoordinatorMock {
                args: MockArgs::default(),
            });
            steps.push(DeployStep::CreateSubscription);
            steps.push(DeployStep::FundSubscription {
                amount: MOCK_SUBSCRIPTION_FUND,
            });
            (CoordinatorSource::Mock, SubscriptionSource::CreatedByPlan)
        } else {
            let address = config
                .vrf_coordinator
                .clone()
                .ok_or_else(|| Error::MissingCoordinator(config.name.clone()))?;
            if config.subscription_id == 0 {
                log::warn!(
                    "network `{}` uses subscription 0; requests will fail until it is set",
                    config.name
                );
            }
            (
                CoordinatorSource::Address(address),
                SubscriptionSource::Configured(config.subscription_id),
            )
        };

        steps.push(DeployStep::DeployRaffle {
            init: RaffleInitArgs {
                coordinator,
                payment_token: config.payment_token.clone(),
                entrance_fee: config.entrance_fee,
                key_hash: config.gas_lane.clone(),
                subscription,
                callback_gas_limit: config.callback_gas_limit,
                interval: config.interval,
            },
        });

        if config.is_development() {
            steps.push(DeployStep::AddConsumer);
        }

        Ok(Self {
            network: config.name.clone(),
            steps,
        })
    }

    pub fn uses_mocks(&self) -> bool {
        self.steps
            .iter()
            .any(|step| matches!(step, DeployStep::DeployVrfCoordinatorMock { .. }))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEVELOPMENT_NETWORKS;

    fn live_table() -> NetworkTable {
        let mut table = NetworkTable::builtin();
        let mut testnet = table.get("testnet").unwrap().clone();
        testnet.vrf_coordinator = Some("CCOORDINATOR".to_string());
        testnet.subscription_id = 7;
        table.insert(testnet);
        table
    }

    #[test]
    fn development_plan_deploys_mocks_first() {
        let plan = DeployPlan::for_network(&NetworkTable::builtin(), "standalone").unwrap();

        assert!(plan.uses_mocks());
        assert_eq!(
            plan.steps[0],
            DeployStep::DeployVrfCoordinatorMock {
                args: MockArgs {
                    base_fee: MOCK_BASE_FEE,
                    gas_price_link: MOCK_GAS_PRICE_LINK,
                }
            }
        );
        assert_eq!(plan.steps[1], DeployStep::CreateSubscription);
        assert!(matches!(plan.steps[2], DeployStep::FundSubscription { .. }));
        match &plan.steps[3] {
            DeployStep::DeployRaffle { init } => {
                assert_eq!(init.coordinator, CoordinatorSource::Mock);
                assert_eq!(init.subscription, SubscriptionSource::CreatedByPlan);
                assert_eq!(init.interval, 30);
            }
            other => panic!("unexpected step {other:?}"),
        }
        assert_eq!(plan.steps.last(), Some(&DeployStep::AddConsumer));
    }

    #[test]
    fn every_development_network_plans_with_mocks() {
        let table = NetworkTable::builtin();
        for name in DEVELOPMENT_NETWORKS {
            let plan = DeployPlan::for_network(&table, name).unwrap();
            assert_eq!(plan.network, name);
            assert!(plan.uses_mocks());
            assert_eq!(plan.steps.last(), Some(&DeployStep::AddConsumer));
        }
    }

    #[test]
    fn live_plan_uses_configured_coordinator() {
        let plan = DeployPlan::for_network(&live_table(), "testnet").unwrap();

        assert!(!plan.uses_mocks());
        assert_eq!(plan.steps.len(), 1);
        match &plan.steps[0] {
            DeployStep::DeployRaffle { init } => {
                assert_eq!(
                    init.coordinator,
                    CoordinatorSource::Address("CCOORDINATOR".to_string())
                );
                assert_eq!(init.subscription, SubscriptionSource::Configured(7));
                assert_eq!(init.entrance_fee, 100_000);
            }
            other => panic!("unexpected step {other:?}"),
        }
    }

    #[test]
    fn live_plan_requires_coordinator() {
        let err = DeployPlan::for_network(&NetworkTable::builtin(), "testnet").unwrap_err();
        assert!(matches!(err, Error::MissingCoordinator(name) if name == "testnet"));
    }

    #[test]
    fn plan_rejects_invalid_config() {
        let mut table = NetworkTable::builtin();
        let mut local = table.get("standalone").unwrap().clone();
        local.entrance_fee = 0;
        table.insert(local);

        let err = DeployPlan::for_network(&table, "standalone").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn plan_serializes_with_step_tags() {
        let plan = DeployPlan::for_network(&NetworkTable::builtin(), "standalone").unwrap();
        let json: serde_json::Value = serde_json::from_str(&plan.to_json().unwrap()).unwrap();

        assert_eq!(json["network"], "standalone");
        assert_eq!(json["steps"][0]["step"], "deploy_vrf_coordinator_mock");
        assert_eq!(json["steps"][3]["init"]["coordinator"]["kind"], "mock");
    }
}
