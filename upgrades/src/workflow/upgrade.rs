use std::fmt;

use alloy::{
    dyn_abi::DynSolValue,
    primitives::{Address, U256},
};
use tracing::{info, instrument};

use super::{Progress, Stage, WorkflowError};
use crate::{
    config::UpgradeTargets,
    error::Error,
    toolchain::{Invocation, Upgrades, ValueDisplay},
};

/// What the upgrade workflow changes.
#[derive(Clone, Debug)]
pub struct UpgradePlan {
    /// New implementation contract.
    pub contract: String,
    /// Beacon to repoint and the proxy behind it.
    pub targets: UpgradeTargets,
    /// State-changing call sent through the proxy after the upgrade.
    pub call: Invocation,
    /// Read-only call whose result is reported.
    pub read: Invocation,
}

impl UpgradePlan {
    /// Upgrade `targets` to `BoxV2`, then `setY(55)` and read back `y()`.
    #[must_use]
    pub fn new(targets: UpgradeTargets) -> Self {
        Self {
            contract: "BoxV2".to_owned(),
            targets,
            call: Invocation::new(
                "setY",
                vec![DynSolValue::Uint(U256::from(55), 256)],
            ),
            read: Invocation::new("y", vec![]),
        }
    }
}

/// Outcome of a successful upgrade.
#[derive(Clone, Debug, PartialEq)]
pub struct UpgradeReport {
    /// New implementation contract name.
    pub contract: String,
    /// Repointed beacon.
    pub beacon: Address,
    /// Implementation the beacon now points at.
    pub implementation: Address,
    /// Proxy the calls went through.
    pub proxy: Address,
    /// Name of the function read after the upgrade.
    pub read: String,
    /// Value it returned.
    pub value: DynSolValue,
}

impl fmt::Display for UpgradeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Beacon {} upgraded to {} at {}",
            self.beacon, self.contract, self.implementation
        )?;
        write!(
            f,
            "Box upgraded {} {}() = {}",
            self.proxy,
            self.read,
            ValueDisplay(&self.value)
        )
    }
}

/// Repoint `plan.targets.beacon` to `plan.contract`, then call through the
/// proxy with the new interface.
///
/// The addresses are not checked up front: a wrong one fails at the first
/// call that touches it.
///
/// # Errors
///
/// Fails on the first error of any step, reporting the stage reached.
#[instrument(skip_all, fields(contract = %plan.contract))]
pub async fn upgrade<U: Upgrades + ?Sized>(
    upgrades: &U,
    plan: &UpgradePlan,
) -> Result<UpgradeReport, WorkflowError> {
    let UpgradeTargets { beacon, proxy } = plan.targets;
    let mut progress = Progress::new("upgrade");

    let artifact = progress.check(upgrades.artifact(&plan.contract))?;
    progress.advance(Stage::ArtifactResolved);

    info!(%beacon, "Upgrading beacon to {}", plan.contract);
    progress.advance(Stage::Write1Submitted);
    let upgraded =
        progress.check(upgrades.upgrade_beacon(beacon, &artifact).await)?;
    progress.advance(Stage::Write1Confirmed);
    info!(
        tx_hash = %upgraded.confirmation.tx_hash,
        implementation = %upgraded.implementation,
        "Beacon updated!"
    );

    let contract = artifact.attach(proxy);

    progress.advance(Stage::Write2Submitted);
    let sent = progress.check(upgrades.send(&contract, &plan.call).await)?;
    progress.advance(Stage::Write2Confirmed);
    info!(tx_hash = %sent.tx_hash, "{} confirmed", plan.call);

    let output = progress.check(upgrades.call(&contract, &plan.read).await)?;
    let value = progress.check(output.into_iter().next().ok_or_else(|| {
        Error::UnexpectedOutput {
            function: plan.read.function.clone(),
            reason: "no return value".to_owned(),
        }
    }))?;
    info!(%proxy, "{}() = {}", plan.read.function, ValueDisplay(&value));

    progress.advance(Stage::Reported);
    Ok(UpgradeReport {
        contract: plan.contract.clone(),
        beacon,
        implementation: upgraded.implementation,
        proxy,
        read: plan.read.function.clone(),
        value,
    })
}
