//! The contract toolchain the workflows drive.
//!
//! Everything that touches a chain goes through [`Upgrades`]: resolving
//! artifacts, creating and repointing beacons, creating beacon proxies and
//! calling through bound interfaces. Every write returns only once the
//! transaction is confirmed.
use std::fmt;

use alloy::{
    dyn_abi::DynSolValue,
    primitives::{Address, TxHash},
};
use async_trait::async_trait;

use crate::{
    artifact::{Artifact, BoundContract},
    error::Result,
};

/// A function call by name with ABI-typed arguments.
#[derive(Clone, Debug, PartialEq)]
pub struct Invocation {
    /// Function name, e.g. `setY`.
    pub function: String,
    /// Arguments, in declaration order.
    pub args: Vec<DynSolValue>,
}

impl Invocation {
    /// Create a new invocation of `function`.
    pub fn new(function: impl Into<String>, args: Vec<DynSolValue>) -> Self {
        Self { function: function.into(), args }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.function)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", ValueDisplay(arg))?;
        }
        f.write_str(")")
    }
}

/// Human-readable rendering of an ABI value.
pub struct ValueDisplay<'a>(pub &'a DynSolValue);

impl fmt::Display for ValueDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            DynSolValue::Uint(value, _) => write!(f, "{value}"),
            DynSolValue::Int(value, _) => write!(f, "{value}"),
            DynSolValue::Address(value) => write!(f, "{value}"),
            DynSolValue::Bool(value) => write!(f, "{value}"),
            DynSolValue::String(value) => write!(f, "{value:?}"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// A confirmed state-changing transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Confirmation {
    /// Transaction hash.
    pub tx_hash: TxHash,
    /// Block the transaction was included in, when the node reports it.
    pub block_number: Option<u64>,
}

/// A confirmed contract creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Deployment {
    /// Address of the created contract.
    pub address: Address,
    /// Creation transaction.
    pub confirmation: Confirmation,
}

/// A beacon that was created or repointed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BeaconDeployment {
    /// Beacon address.
    pub beacon: Address,
    /// Implementation the beacon now points at.
    pub implementation: Address,
    /// Transaction that created or repointed the beacon.
    pub confirmation: Confirmation,
}

/// Operations of the external contract toolchain.
#[async_trait]
pub trait Upgrades: Send + Sync {
    /// Resolve the compiled artifact of contract `name`.
    ///
    /// # Errors
    ///
    /// May fail if the contract is unknown or was not compiled.
    fn artifact(&self, name: &str) -> Result<Artifact>;

    /// Deploy an upgrade beacon pointing at an implementation of
    /// `artifact`, and wait for confirmation.
    ///
    /// # Errors
    ///
    /// May fail on network errors or reverted transactions.
    async fn deploy_beacon(&self, artifact: &Artifact)
        -> Result<BeaconDeployment>;

    /// Deploy a proxy delegating to `beacon`'s implementation, initialized
    /// with `initializer` from `artifact`'s interface, and wait for
    /// confirmation.
    ///
    /// # Errors
    ///
    /// May fail if `initializer` is not part of `artifact`'s interface, on
    /// network errors or reverted transactions.
    async fn deploy_beacon_proxy(
        &self,
        beacon: Address,
        artifact: &Artifact,
        initializer: &Invocation,
    ) -> Result<Deployment>;

    /// Point `beacon` at an implementation of `artifact`, and wait for
    /// confirmation.
    ///
    /// # Errors
    ///
    /// May fail if `beacon` is not a beacon, on network errors or reverted
    /// transactions (e.g. the signer does not own the beacon).
    async fn upgrade_beacon(
        &self,
        beacon: Address,
        artifact: &Artifact,
    ) -> Result<BeaconDeployment>;

    /// Read the implementation `beacon` currently points at.
    ///
    /// # Errors
    ///
    /// May fail if `beacon` is not a beacon or on network errors.
    async fn implementation(&self, beacon: Address) -> Result<Address>;

    /// Send a state-changing `invocation` through `contract`, and wait for
    /// confirmation.
    ///
    /// # Errors
    ///
    /// May fail if there is no contract at the bound address, on network
    /// errors or reverted transactions.
    async fn send(
        &self,
        contract: &BoundContract,
        invocation: &Invocation,
    ) -> Result<Confirmation>;

    /// Execute a read-only `invocation` through `contract`.
    ///
    /// # Errors
    ///
    /// May fail if there is no contract at the bound address, on network
    /// errors or reverts.
    async fn call(
        &self,
        contract: &BoundContract,
        invocation: &Invocation,
    ) -> Result<Vec<DynSolValue>>;
}
