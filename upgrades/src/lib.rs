/*!
# Beacon Upgrades

Operator workflows for contracts deployed behind an upgrade beacon.

A beacon holds the address of an implementation contract. Any number of
beacon proxies delegate every call to whatever the beacon currently points
at, so repointing the beacon upgrades all of them in one transaction.

Two workflows are provided:

- [`deploy`]: deploy a beacon for a contract, then a proxy backed by it,
  running the contract's initializer on creation.
- [`upgrade`]: repoint an existing beacon to a new implementation, then
  call through the proxy using the new interface.

Both run against any [`Upgrades`] toolchain. [`AlloyUpgrades`] talks to a
node over JSON-RPC and keeps a per-chain deployment manifest.

```ignore
use beacon_upgrades::{deploy, AlloyUpgrades, Config, DeployPlan};

let config = Config::from_env()?;
let upgrades = AlloyUpgrades::connect(&config).await?;
let report = deploy(&upgrades, &DeployPlan::default()).await?;
println!("{report}");
```
*/

pub mod artifact;
pub mod config;
pub mod error;
pub mod manifest;
pub mod network;
pub mod toolchain;
pub mod workflow;

pub use artifact::{Artifact, ArtifactStore, BoundContract};
pub use config::{Config, UpgradeTargets};
pub use error::{Error, Result};
pub use network::AlloyUpgrades;
pub use toolchain::{
    BeaconDeployment, Confirmation, Deployment, Invocation, Upgrades,
    ValueDisplay,
};
pub use workflow::{
    deploy, upgrade, DeployPlan, DeployReport, Stage, UpgradePlan,
    UpgradeReport, WorkflowError,
};
