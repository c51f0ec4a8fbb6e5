//! Network parameters selected once at process start.

use serde::{Deserialize, Serialize};

/// The network the upstream node is syncing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Network {
    Mainnet,
    Testnet,
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mainnet => write!(f, "mainnet"),
            Self::Testnet => write!(f, "testnet"),
        }
    }
}

/// Fixed network parameter set handed to the engine via `EntryHandler::params`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkParams {
    pub network: Network,
    /// Local regression-test network on top of testnet.
    pub regtest: bool,
    /// Regtest with shortened block times.
    pub accelerated_regtest: bool,
}

impl NetworkParams {
    pub fn mainnet() -> Self {
        Self {
            network: Network::Mainnet,
            regtest: false,
            accelerated_regtest: false,
        }
    }

    pub fn testnet() -> Self {
        Self {
            network: Network::Testnet,
            ..Self::mainnet()
        }
    }

    /// Resolve the parameter set from start-up flags.
    ///
    /// Mainnet unless `testnet` is set. Regtest flags are ignored on mainnet.
    pub fn select(testnet: bool, regtest: bool, accelerated_regtest: bool) -> Self {
        if !testnet {
            return Self::mainnet();
        }
        let mut params = Self::testnet();
        if regtest {
            params.regtest = true;
            params.accelerated_regtest = accelerated_regtest;
        }
        params
    }

    pub fn is_mainnet(&self) -> bool {
        self.network == Network::Mainnet
    }
}

impl Default for NetworkParams {
    fn default() -> Self {
        Self::mainnet()
    }
}
