//! Process configuration, loaded once from the environment.
use std::{fmt, path::PathBuf, str::FromStr};

use alloy::{
    primitives::Address, signers::local::PrivateKeySigner,
    transports::http::reqwest::Url,
};
use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// JSON-RPC endpoint of the target network.
pub const RPC_URL: &str = "RPC_URL";
/// Hex-encoded private key of the deployer.
pub const PRIVATE_KEY: &str = "PRIVATE_KEY";
/// Directory holding compiled artifacts.
pub const ARTIFACTS_DIR: &str = "ARTIFACTS_DIR";
/// Directory holding per-chain deployment manifests.
pub const MANIFEST_DIR: &str = "MANIFEST_DIR";
/// Confirmations to wait for after each write.
pub const CONFIRMATIONS: &str = "CONFIRMATIONS";
/// Beacon targeted by an upgrade.
pub const BEACON_ADDRESS: &str = "BEACON_ADDRESS";
/// Beacon proxy targeted by an upgrade.
pub const BEACON_PROXY_ADDRESS: &str = "BEACON_PROXY_ADDRESS";

const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";
const DEFAULT_MANIFEST_DIR: &str = ".deployments";
const DEFAULT_CONFIRMATIONS: u64 = 1;

/// Network endpoint, credentials and local paths.
pub struct Config {
    /// JSON-RPC endpoint.
    pub rpc_url: Url,
    private_key: Zeroizing<String>,
    /// Directory holding compiled artifacts.
    pub artifacts_dir: PathBuf,
    /// Directory holding deployment manifests.
    pub manifest_dir: PathBuf,
    /// Confirmations to wait for after each write. At least one.
    pub confirmations: u64,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// May fail if a required variable is missing or a value is invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from `lookup`, which maps variable names to
    /// values.
    ///
    /// # Errors
    ///
    /// May fail if a required variable is missing or a value is invalid.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let rpc_url = required(&lookup, RPC_URL)?;
        let rpc_url = Url::parse(&rpc_url).map_err(|e| {
            Error::Config(format!("{RPC_URL} is not a valid URL: {e}"))
        })?;

        let private_key = Zeroizing::new(required(&lookup, PRIVATE_KEY)?);
        // Reject a bad key now rather than on first use.
        PrivateKeySigner::from_str(&private_key).map_err(|e| {
            Error::Config(format!("{PRIVATE_KEY} is not a valid key: {e}"))
        })?;

        let artifacts_dir = lookup(ARTIFACTS_DIR)
            .unwrap_or_else(|| DEFAULT_ARTIFACTS_DIR.to_owned())
            .into();
        let manifest_dir = lookup(MANIFEST_DIR)
            .unwrap_or_else(|| DEFAULT_MANIFEST_DIR.to_owned())
            .into();

        let confirmations = match lookup(CONFIRMATIONS) {
            Some(value) => value.trim().parse::<u64>().map_err(|e| {
                Error::Config(format!("{CONFIRMATIONS} is not a number: {e}"))
            })?,
            None => DEFAULT_CONFIRMATIONS,
        };
        if confirmations == 0 {
            return Err(Error::Config(format!(
                "{CONFIRMATIONS} must be at least 1"
            )));
        }

        Ok(Self {
            rpc_url,
            private_key,
            artifacts_dir,
            manifest_dir,
            confirmations,
        })
    }

    /// Signer for the configured private key.
    ///
    /// # Errors
    ///
    /// May fail if the key is malformed.
    pub fn signer(&self) -> Result<PrivateKeySigner> {
        PrivateKeySigner::from_str(&self.private_key).map_err(|e| {
            Error::Config(format!("{PRIVATE_KEY} is not a valid key: {e}"))
        })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("rpc_url", &self.rpc_url.as_str())
            .field("private_key", &"<redacted>")
            .field("artifacts_dir", &self.artifacts_dir)
            .field("manifest_dir", &self.manifest_dir)
            .field("confirmations", &self.confirmations)
            .finish()
    }
}

/// The beacon/proxy pair an upgrade operates on.
///
/// Nothing checks that these addresses host a beacon and a proxy produced
/// by a previous deployment; a wrong address fails at the first call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpgradeTargets {
    /// Beacon to repoint.
    pub beacon: Address,
    /// Proxy backed by `beacon`.
    pub proxy: Address,
}

impl UpgradeTargets {
    /// Load targets from the process environment.
    ///
    /// # Errors
    ///
    /// May fail if an address is missing, malformed or zero.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load targets from `lookup`.
    ///
    /// # Errors
    ///
    /// May fail if an address is missing, malformed or zero.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        Ok(Self {
            beacon: parse_address(
                BEACON_ADDRESS,
                &required(&lookup, BEACON_ADDRESS)?,
            )?,
            proxy: parse_address(
                BEACON_PROXY_ADDRESS,
                &required(&lookup, BEACON_PROXY_ADDRESS)?,
            )?,
        })
    }
}

/// Load the required variable `name`; blank values count as missing.
fn required(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<String> {
    lookup(name)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| Error::Config(format!("{name} is not set")))
}

/// Parse the address held by variable `name`.
fn parse_address(name: &str, value: &str) -> Result<Address> {
    let address = Address::from_str(value).map_err(|e| {
        Error::Config(format!("{name} is not a valid address ({value}): {e}"))
    })?;
    if address.is_zero() {
        return Err(Error::Config(format!("{name} is the zero address")));
    }
    Ok(address)
}
