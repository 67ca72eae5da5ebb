use std::fmt;

use alloy::{
    dyn_abi::DynSolValue,
    primitives::{Address, U256},
};
use tracing::{info, instrument};

use super::{Progress, Stage, WorkflowError};
use crate::toolchain::{Invocation, Upgrades};

/// What the deploy workflow creates.
#[derive(Clone, Debug)]
pub struct DeployPlan {
    /// Contract to deploy behind the beacon.
    pub contract: String,
    /// Initializer the proxy runs on creation.
    pub initializer: Invocation,
}

impl Default for DeployPlan {
    /// `Box`, initialized with `initialize(42)`.
    fn default() -> Self {
        Self {
            contract: "Box".to_owned(),
            initializer: Invocation::new(
                "initialize",
                vec![DynSolValue::Uint(U256::from(42), 256)],
            ),
        }
    }
}

/// Addresses produced by a successful deployment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeployReport {
    /// Deployed contract name.
    pub contract: String,
    /// The new beacon.
    pub beacon: Address,
    /// Implementation the beacon points at.
    pub implementation: Address,
    /// The new proxy.
    pub proxy: Address,
}

impl fmt::Display for DeployReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Beacon deployed to: {}", self.beacon)?;
        writeln!(f, "Implementation: {}", self.implementation)?;
        write!(f, "{} deployed to: {}", self.contract, self.proxy)
    }
}

/// Deploy a beacon for `plan.contract`, then a proxy backed by it.
///
/// The proxy is only created once the beacon is confirmed.
///
/// # Errors
///
/// Fails on the first error of any step, reporting the stage reached.
#[instrument(skip_all, fields(contract = %plan.contract))]
pub async fn deploy<U: Upgrades + ?Sized>(
    upgrades: &U,
    plan: &DeployPlan,
) -> Result<DeployReport, WorkflowError> {
    let mut progress = Progress::new("deploy");

    let artifact = progress.check(upgrades.artifact(&plan.contract))?;
    progress.advance(Stage::ArtifactResolved);

    progress.advance(Stage::Write1Submitted);
    let beacon = progress.check(upgrades.deploy_beacon(&artifact).await)?;
    progress.advance(Stage::Write1Confirmed);
    info!(
        tx_hash = %beacon.confirmation.tx_hash,
        "Beacon deployed to: {}", beacon.beacon
    );

    progress.advance(Stage::Write2Submitted);
    let proxy = progress.check(
        upgrades
            .deploy_beacon_proxy(beacon.beacon, &artifact, &plan.initializer)
            .await,
    )?;
    progress.advance(Stage::Write2Confirmed);
    info!(
        tx_hash = %proxy.confirmation.tx_hash,
        "{} deployed to: {}", plan.contract, proxy.address
    );

    progress.advance(Stage::Reported);
    Ok(DeployReport {
        contract: plan.contract.clone(),
        beacon: beacon.beacon,
        implementation: beacon.implementation,
        proxy: proxy.address,
    })
}
