//! [`Upgrades`] over JSON-RPC, backed by `alloy`.
use alloy::{
    contract::{ContractInstance, Interface},
    dyn_abi::{DynSolValue, JsonAbiExt},
    json_abi::JsonAbi,
    network::{Ethereum, EthereumWallet, ReceiptResponse, TransactionBuilder},
    primitives::{Address, Bytes},
    providers::{
        DynProvider, PendingTransactionBuilder, Provider, ProviderBuilder,
    },
    rpc::types::{TransactionReceipt, TransactionRequest},
};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    artifact::{find_function, Artifact, ArtifactStore, BoundContract},
    config::Config,
    error::{Error, Result},
    manifest::{BeaconRecord, ImplementationRecord, Manifest, ProxyRecord},
    toolchain::{
        BeaconDeployment, Confirmation, Deployment, Invocation, Upgrades,
    },
};

/// Artifact providing the upgrade beacon's creation code.
pub const BEACON_CONTRACT: &str = "UpgradeableBeacon";
/// Artifact providing the beacon proxy's creation code.
pub const PROXY_CONTRACT: &str = "BeaconProxy";

/// Interface every upgrade beacon exposes.
const BEACON_ABI: &str = r#"[
    {
        "type": "function",
        "name": "implementation",
        "stateMutability": "view",
        "inputs": [],
        "outputs": [
            { "name": "", "type": "address", "internalType": "address" }
        ]
    },
    {
        "type": "function",
        "name": "upgradeTo",
        "stateMutability": "nonpayable",
        "inputs": [
            {
                "name": "newImplementation",
                "type": "address",
                "internalType": "address"
            }
        ],
        "outputs": []
    }
]"#;

/// Toolchain talking to a node over HTTP, signing with a local key.
pub struct AlloyUpgrades {
    provider: DynProvider,
    deployer: Address,
    artifacts: ArtifactStore,
    manifest: Mutex<Manifest>,
    beacon_abi: JsonAbi,
    confirmations: u64,
}

impl AlloyUpgrades {
    /// Connect to the node in `config` and load the chain's manifest.
    ///
    /// # Errors
    ///
    /// May fail if the signer is invalid, the node is unreachable, or the
    /// manifest cannot be read.
    pub async fn connect(config: &Config) -> Result<Self> {
        let signer = config.signer()?;
        let deployer = signer.address();

        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(config.rpc_url.clone())
            .erased();

        let chain_id = provider.get_chain_id().await?;
        let manifest = Manifest::load(&config.manifest_dir, chain_id).await?;
        info!(
            chain_id,
            %deployer,
            manifest = %manifest.path().display(),
            "connected to network"
        );

        let beacon_abi = serde_json::from_str(BEACON_ABI).map_err(|e| {
            Error::MalformedArtifact {
                name: BEACON_CONTRACT.to_owned(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            provider,
            deployer,
            artifacts: ArtifactStore::new(&config.artifacts_dir),
            manifest: Mutex::new(manifest),
            beacon_abi,
            confirmations: config.confirmations,
        })
    }

    /// Address that signs and pays for every transaction.
    #[must_use]
    pub fn deployer(&self) -> Address {
        self.deployer
    }

    /// Wait for `pending` to gather the configured confirmations and check
    /// that it did not revert.
    async fn confirm(
        &self,
        pending: PendingTransactionBuilder<Ethereum>,
    ) -> Result<TransactionReceipt> {
        let tx_hash = *pending.tx_hash();
        debug!(
            %tx_hash,
            confirmations = self.confirmations,
            "waiting for transaction"
        );

        let receipt = pending
            .with_required_confirmations(self.confirmations)
            .get_receipt()
            .await?;
        let receipt = ensure_success(receipt)?;
        debug!(
            %tx_hash,
            block = ?receipt.block_number(),
            "transaction confirmed"
        );
        Ok(receipt)
    }

    /// Send a contract creation transaction and wait for it.
    async fn deploy_code(&self, code: Bytes) -> Result<Deployment> {
        let tx = TransactionRequest::default().with_deploy_code(code);
        let pending = self.provider.send_transaction(tx).await?;
        let receipt = self.confirm(pending).await?;

        let address = receipt.contract_address().ok_or_else(|| {
            Error::MissingContractAddress {
                tx_hash: receipt.transaction_hash(),
            }
        })?;
        Ok(Deployment { address, confirmation: confirmation(&receipt) })
    }

    async fn has_code(&self, address: Address) -> Result<bool> {
        let code = self.provider.get_code_at(address).await?;
        Ok(!code.is_empty())
    }

    async fn ensure_code(&self, address: Address) -> Result<()> {
        if self.has_code(address).await? {
            Ok(())
        } else {
            Err(Error::NoCode(address))
        }
    }

    fn instance(
        &self,
        address: Address,
        abi: JsonAbi,
    ) -> ContractInstance<DynProvider, Ethereum> {
        ContractInstance::new(
            address,
            self.provider.clone(),
            Interface::new(abi),
        )
    }

    /// The recorded implementation of `artifact`, if it is still live on
    /// this chain and was created by the transaction the manifest names.
    async fn reusable_implementation(
        &self,
        artifact: &Artifact,
    ) -> Result<Option<Address>> {
        let Some(record) = self
            .manifest
            .lock()
            .await
            .implementation(&artifact.bytecode_hash())
            .cloned()
        else {
            return Ok(None);
        };
        let address = record.address;

        if !self.has_code(address).await? {
            warn!(
                contract = artifact.name(),
                %address,
                "recorded implementation has no code"
            );
            return Ok(None);
        }

        // Code alone may belong to another contract after a chain reset.
        let created = self
            .provider
            .get_transaction_receipt(record.tx_hash)
            .await?
            .and_then(|receipt| receipt.contract_address);
        if created != Some(address) {
            warn!(
                contract = artifact.name(),
                %address,
                tx_hash = %record.tx_hash,
                "recorded implementation was not created by its transaction"
            );
            return Ok(None);
        }

        info!(contract = artifact.name(), %address, "reusing implementation");
        Ok(Some(address))
    }

    /// Address of an implementation of `artifact`, deploying one unless
    /// the manifest knows a live deployment of the same creation code.
    async fn implementation_for(&self, artifact: &Artifact) -> Result<Address> {
        if let Some(address) = self.reusable_implementation(artifact).await? {
            return Ok(address);
        }

        let deployment =
            self.deploy_code(creation_code(artifact, &[])?).await?;
        info!(
            contract = artifact.name(),
            address = %deployment.address,
            "implementation deployed"
        );

        self.manifest
            .lock()
            .await
            .record_implementation(
                artifact.bytecode_hash(),
                ImplementationRecord {
                    contract: artifact.name().to_owned(),
                    address: deployment.address,
                    tx_hash: deployment.confirmation.tx_hash,
                },
            )
            .await?;
        Ok(deployment.address)
    }
}

#[async_trait]
impl Upgrades for AlloyUpgrades {
    fn artifact(&self, name: &str) -> Result<Artifact> {
        self.artifacts.resolve(name)
    }

    async fn deploy_beacon(
        &self,
        artifact: &Artifact,
    ) -> Result<BeaconDeployment> {
        let implementation = self.implementation_for(artifact).await?;

        let beacon_artifact = self.artifacts.resolve(BEACON_CONTRACT)?;
        let args = beacon_constructor_args(
            &beacon_artifact,
            implementation,
            self.deployer,
        );
        let deployment =
            self.deploy_code(creation_code(&beacon_artifact, &args)?).await?;

        self.manifest
            .lock()
            .await
            .record_beacon(BeaconRecord {
                address: deployment.address,
                implementation,
                tx_hash: deployment.confirmation.tx_hash,
            })
            .await?;

        Ok(BeaconDeployment {
            beacon: deployment.address,
            implementation,
            confirmation: deployment.confirmation,
        })
    }

    async fn deploy_beacon_proxy(
        &self,
        beacon: Address,
        artifact: &Artifact,
        initializer: &Invocation,
    ) -> Result<Deployment> {
        let data = find_function(artifact.abi(), artifact.name(), initializer)?
            .abi_encode_input(&initializer.args)
            .map_err(|e| Error::MalformedArtifact {
                name: artifact.name().to_owned(),
                reason: format!("cannot encode `{initializer}`: {e}"),
            })?;
        self.ensure_code(beacon).await?;

        let proxy_artifact = self.artifacts.resolve(PROXY_CONTRACT)?;
        let args = [DynSolValue::Address(beacon), DynSolValue::Bytes(data)];
        let deployment =
            self.deploy_code(creation_code(&proxy_artifact, &args)?).await?;

        self.manifest
            .lock()
            .await
            .record_proxy(ProxyRecord {
                address: deployment.address,
                beacon,
                tx_hash: deployment.confirmation.tx_hash,
            })
            .await?;

        Ok(deployment)
    }

    async fn upgrade_beacon(
        &self,
        beacon: Address,
        artifact: &Artifact,
    ) -> Result<BeaconDeployment> {
        let current = self.implementation(beacon).await?;
        let implementation = self.implementation_for(artifact).await?;
        if current == implementation {
            info!(
                %beacon,
                %implementation,
                "beacon already points at this implementation"
            );
        }

        let pending = self
            .instance(beacon, self.beacon_abi.clone())
            .function("upgradeTo", &[DynSolValue::Address(implementation)])?
            .send()
            .await?;
        let receipt = self.confirm(pending).await?;
        let confirmation = confirmation(&receipt);

        self.manifest
            .lock()
            .await
            .record_beacon(BeaconRecord {
                address: beacon,
                implementation,
                tx_hash: confirmation.tx_hash,
            })
            .await?;

        Ok(BeaconDeployment { beacon, implementation, confirmation })
    }

    async fn implementation(&self, beacon: Address) -> Result<Address> {
        self.ensure_code(beacon).await?;

        let output = self
            .instance(beacon, self.beacon_abi.clone())
            .function("implementation", &[])?
            .call()
            .await
            .map_err(|e| Error::NotABeacon {
                address: beacon,
                reason: e.to_string(),
            })?;

        match output.first() {
            Some(DynSolValue::Address(implementation)) => Ok(*implementation),
            _ => Err(Error::NotABeacon {
                address: beacon,
                reason: format!("`implementation()` returned {output:?}"),
            }),
        }
    }

    async fn send(
        &self,
        contract: &BoundContract,
        invocation: &Invocation,
    ) -> Result<Confirmation> {
        contract.function(invocation)?;
        self.ensure_code(contract.address()).await?;

        let pending = self
            .instance(contract.address(), contract.abi().clone())
            .function(&invocation.function, &invocation.args)?
            .send()
            .await?;
        let receipt = self.confirm(pending).await?;
        Ok(confirmation(&receipt))
    }

    async fn call(
        &self,
        contract: &BoundContract,
        invocation: &Invocation,
    ) -> Result<Vec<DynSolValue>> {
        contract.function(invocation)?;
        self.ensure_code(contract.address()).await?;

        let output = self
            .instance(contract.address(), contract.abi().clone())
            .function(&invocation.function, &invocation.args)?
            .call()
            .await?;
        Ok(output)
    }
}

/// Reject receipts of reverted transactions.
fn ensure_success(receipt: TransactionReceipt) -> Result<TransactionReceipt> {
    if receipt.status() {
        Ok(receipt)
    } else {
        Err(Error::Reverted { tx_hash: receipt.transaction_hash })
    }
}

fn confirmation(receipt: &TransactionReceipt) -> Confirmation {
    Confirmation {
        tx_hash: receipt.transaction_hash(),
        block_number: receipt.block_number(),
    }
}

/// Creation code of `artifact` followed by its abi-encoded constructor
/// arguments.
fn creation_code(artifact: &Artifact, args: &[DynSolValue]) -> Result<Bytes> {
    let mut code = artifact.bytecode().to_vec();
    match &artifact.abi().constructor {
        Some(constructor) => {
            let encoded = constructor.abi_encode_input(args).map_err(|e| {
                Error::MalformedArtifact {
                    name: artifact.name().to_owned(),
                    reason: format!("cannot encode constructor arguments: {e}"),
                }
            })?;
            code.extend_from_slice(&encoded);
        }
        None if args.is_empty() => {}
        None => {
            return Err(Error::MalformedArtifact {
                name: artifact.name().to_owned(),
                reason: format!(
                    "takes no constructor arguments, {} supplied",
                    args.len()
                ),
            });
        }
    }
    Ok(code.into())
}

/// `UpgradeableBeacon(implementation)` up to OpenZeppelin 4.x,
/// `UpgradeableBeacon(implementation, initialOwner)` since 5.0.
fn beacon_constructor_args(
    beacon: &Artifact,
    implementation: Address,
    owner: Address,
) -> Vec<DynSolValue> {
    let arity = beacon
        .abi()
        .constructor
        .as_ref()
        .map_or(0, |constructor| constructor.inputs.len());
    if arity == 2 {
        vec![DynSolValue::Address(implementation), DynSolValue::Address(owner)]
    } else {
        vec![DynSolValue::Address(implementation)]
    }
}
