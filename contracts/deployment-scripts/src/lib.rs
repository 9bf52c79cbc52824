//! Deployment tooling for the raffle contracts.
//!
//! Holds the per-network parameter table and turns one of its entries into an
//! ordered [`DeployPlan`]. Plans are data only; submitting them is left to the
//! Stellar CLI.

pub mod config;
pub mod error;
pub mod plan;

pub use config::{is_development_network, NetworkConfig, NetworkTable, DEVELOPMENT_NETWORKS};
pub use error::{Error, Result};
pub use plan::{DeployPlan, DeployStep, MockArgs};
