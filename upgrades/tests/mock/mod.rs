//! An in-memory chain implementing [`Upgrades`].
//!
//! Models implementations, upgrade beacons and beacon proxies with their
//! own storage. Proxies execute `Box` and `BoxV2` logic against their
//! storage, depending on the implementation their beacon points at.
#![allow(dead_code)]

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Mutex, MutexGuard},
};

use alloy::{
    dyn_abi::DynSolValue,
    primitives::{address, Address, TxHash, B256, U256},
};
use async_trait::async_trait;
use beacon_upgrades::{
    Artifact, BeaconDeployment, BoundContract, Confirmation, Deployment, Error,
    Invocation, Result, Upgrades,
};

/// Signs every transaction unless told otherwise.
pub const DEPLOYER: Address =
    address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
/// Some other account.
pub const STRANGER: Address =
    address!("0x70997970C51812dc3A010C7d01b50e0d17dc79C8");

const BOX: &str = r#"{
    "abi": [
        {
            "type": "function",
            "name": "initialize",
            "stateMutability": "nonpayable",
            "inputs": [{ "name": "x_", "type": "uint256" }],
            "outputs": []
        },
        {
            "type": "function",
            "name": "x",
            "stateMutability": "view",
            "inputs": [],
            "outputs": [{ "name": "", "type": "uint256" }]
        }
    ],
    "bytecode": "0x6080604052600a"
}"#;

const BOX_V2: &str = r#"{
    "abi": [
        {
            "type": "function",
            "name": "x",
            "stateMutability": "view",
            "inputs": [],
            "outputs": [{ "name": "", "type": "uint256" }]
        },
        {
            "type": "function",
            "name": "y",
            "stateMutability": "view",
            "inputs": [],
            "outputs": [{ "name": "", "type": "uint256" }]
        },
        {
            "type": "function",
            "name": "setY",
            "stateMutability": "nonpayable",
            "inputs": [{ "name": "y_", "type": "uint256" }],
            "outputs": []
        }
    ],
    "bytecode": "0x6080604052600b"
}"#;

/// A toolchain call, in the order the chain saw it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Op {
    Resolve(String),
    DeployImplementation(String),
    DeployBeacon { implementation: Address },
    DeployProxy { beacon: Address },
    UpgradeBeacon { beacon: Address, implementation: Address },
    Send(String),
    Call(String),
}

/// Toolchain calls that can be made to revert.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    DeployBeacon,
    DeployProxy,
    UpgradeBeacon,
    Send,
}

#[derive(Clone, Debug)]
enum Code {
    Implementation { contract: String },
    Beacon { implementation: Address, owner: Address },
    Proxy { beacon: Address, storage: HashMap<&'static str, U256> },
}

#[derive(Debug, Default)]
struct State {
    code: HashMap<Address, Code>,
    implementations: HashMap<B256, Address>,
    ops: Vec<Op>,
    nonce: u64,
    block: u64,
    signer: Option<Address>,
    failing: Option<Step>,
}

impl State {
    fn signer(&self) -> Address {
        self.signer.unwrap_or(DEPLOYER)
    }

    fn next_address(&mut self) -> Address {
        self.nonce += 1;
        Address::left_padding_from(&self.nonce.to_be_bytes())
    }

    fn mine(&mut self) -> Confirmation {
        self.block += 1;
        let tx_hash = TxHash::left_padding_from(
            &[self.block.to_be_bytes(), self.nonce.to_be_bytes()].concat(),
        );
        Confirmation { tx_hash, block_number: Some(self.block) }
    }

    fn check(&mut self, step: Step) -> Result<()> {
        if self.failing == Some(step) {
            let Confirmation { tx_hash, .. } = self.mine();
            return Err(Error::Reverted { tx_hash });
        }
        Ok(())
    }

    fn implementation_for(&mut self, artifact: &Artifact) -> Address {
        let hash = artifact.bytecode_hash();
        if let Some(address) = self.implementations.get(&hash) {
            return *address;
        }

        let address = self.next_address();
        self.mine();
        self.code.insert(
            address,
            Code::Implementation { contract: artifact.name().to_owned() },
        );
        self.implementations.insert(hash, address);
        self.ops.push(Op::DeployImplementation(artifact.name().to_owned()));
        address
    }

    fn beacon_implementation(&self, beacon: Address) -> Result<Address> {
        match self.code.get(&beacon) {
            Some(Code::Beacon { implementation, .. }) => Ok(*implementation),
            Some(_) => Err(Error::NotABeacon {
                address: beacon,
                reason: "`implementation()` reverted".to_owned(),
            }),
            None => Err(Error::NoCode(beacon)),
        }
    }

    /// Contract name the proxy at `address` currently delegates to.
    fn logic_of(&self, address: Address) -> Result<String> {
        let beacon = match self.code.get(&address) {
            Some(Code::Proxy { beacon, .. }) => *beacon,
            Some(_) => return Err(self.revert()),
            None => return Err(Error::NoCode(address)),
        };
        let implementation = self.beacon_implementation(beacon)?;
        match self.code.get(&implementation) {
            Some(Code::Implementation { contract }) => Ok(contract.clone()),
            _ => Err(self.revert()),
        }
    }

    fn revert(&self) -> Error {
        Error::Reverted { tx_hash: TxHash::ZERO }
    }

    fn storage(&mut self, proxy: Address) -> &mut HashMap<&'static str, U256> {
        match self.code.get_mut(&proxy) {
            Some(Code::Proxy { storage, .. }) => storage,
            _ => unreachable!("{proxy} was checked to be a proxy"),
        }
    }

    /// Run `invocation` through the proxy at `proxy`, persisting storage
    /// writes only if `commit` is set.
    fn execute(
        &mut self,
        proxy: Address,
        invocation: &Invocation,
        commit: bool,
    ) -> Result<Vec<DynSolValue>> {
        let logic = self.logic_of(proxy)?;
        let revert = self.revert();
        let mut storage = self.storage(proxy).clone();

        let function = invocation.function.as_str();
        let output = match (logic.as_str(), function, &invocation.args[..]) {
            ("Box", "initialize", [DynSolValue::Uint(x, 256)]) => {
                if storage.contains_key("initialized") {
                    return Err(revert);
                }
                storage.insert("initialized", U256::from(1));
                storage.insert("x", *x);
                vec![]
            }
            ("Box" | "BoxV2", "x", []) => {
                vec![uint(storage.get("x").copied().unwrap_or_default())]
            }
            ("BoxV2", "y", []) => {
                vec![uint(storage.get("y").copied().unwrap_or_default())]
            }
            ("BoxV2", "setY", [DynSolValue::Uint(y, 256)]) => {
                storage.insert("y", *y);
                vec![]
            }
            _ => return Err(revert),
        };

        if commit {
            *self.storage(proxy) = storage;
        }
        Ok(output)
    }
}

fn uint(value: U256) -> DynSolValue {
    DynSolValue::Uint(value, 256)
}

/// An in-memory chain.
#[derive(Default)]
pub struct MockChain {
    state: Mutex<State>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("state lock should not be poisoned")
    }

    /// Make every later `step` revert.
    pub fn fail(&self, step: Step) {
        self.state().failing = Some(step);
    }

    /// Stop reverting.
    pub fn heal(&self) {
        self.state().failing = None;
    }

    /// Sign the following transactions as `signer`.
    pub fn sign_as(&self, signer: Address) {
        self.state().signer = Some(signer);
    }

    /// Every toolchain call so far.
    pub fn ops(&self) -> Vec<Op> {
        self.state().ops.clone()
    }

    /// Forget the call log.
    pub fn clear_ops(&self) {
        self.state().ops.clear();
    }

    /// Implementation currently backing `beacon`.
    pub fn implementation_of(&self, beacon: Address) -> Option<Address> {
        self.state().beacon_implementation(beacon).ok()
    }

    /// Address the implementation of `contract` was deployed at.
    pub fn implementation_address(&self, contract: &str) -> Option<Address> {
        self.state().code.iter().find_map(|(address, code)| match code {
            Code::Implementation { contract: name } if name == contract => {
                Some(*address)
            }
            _ => None,
        })
    }

    /// Raw storage slot `slot` of the proxy at `proxy`.
    pub fn slot(&self, proxy: Address, slot: &str) -> Option<U256> {
        match self.state().code.get(&proxy) {
            Some(Code::Proxy { storage, .. }) => storage.get(slot).copied(),
            _ => None,
        }
    }

    /// Number of implementations deployed so far.
    pub fn implementation_count(&self) -> usize {
        self.state().implementations.len()
    }
}

#[async_trait]
impl Upgrades for MockChain {
    fn artifact(&self, name: &str) -> Result<Artifact> {
        self.state().ops.push(Op::Resolve(name.to_owned()));
        match name {
            "Box" => Artifact::from_json(name, BOX),
            "BoxV2" => Artifact::from_json(name, BOX_V2),
            _ => Err(Error::ArtifactNotFound {
                name: name.to_owned(),
                dir: PathBuf::from("artifacts"),
            }),
        }
    }

    async fn deploy_beacon(
        &self,
        artifact: &Artifact,
    ) -> Result<BeaconDeployment> {
        let mut state = self.state();
        let implementation = state.implementation_for(artifact);
        state.check(Step::DeployBeacon)?;

        let beacon = state.next_address();
        let confirmation = state.mine();
        let owner = state.signer();
        state.code.insert(beacon, Code::Beacon { implementation, owner });
        state.ops.push(Op::DeployBeacon { implementation });

        Ok(BeaconDeployment { beacon, implementation, confirmation })
    }

    async fn deploy_beacon_proxy(
        &self,
        beacon: Address,
        artifact: &Artifact,
        initializer: &Invocation,
    ) -> Result<Deployment> {
        artifact.attach(Address::ZERO).function(initializer)?;

        let mut state = self.state();
        state.beacon_implementation(beacon)?;
        state.check(Step::DeployProxy)?;

        let address = state.next_address();
        state
            .code
            .insert(address, Code::Proxy { beacon, storage: HashMap::new() });
        if let Err(e) = state.execute(address, initializer, true) {
            state.code.remove(&address);
            return Err(e);
        }
        let confirmation = state.mine();
        state.ops.push(Op::DeployProxy { beacon });

        Ok(Deployment { address, confirmation })
    }

    async fn upgrade_beacon(
        &self,
        beacon: Address,
        artifact: &Artifact,
    ) -> Result<BeaconDeployment> {
        let mut state = self.state();
        state.beacon_implementation(beacon)?;
        let implementation = state.implementation_for(artifact);
        state.check(Step::UpgradeBeacon)?;

        let signer = state.signer();
        let Some(Code::Beacon { implementation: current, owner }) =
            state.code.get_mut(&beacon)
        else {
            unreachable!("{beacon} was checked to be a beacon");
        };
        if *owner != signer {
            return Err(Error::Reverted { tx_hash: TxHash::ZERO });
        }
        *current = implementation;

        let confirmation = state.mine();
        state.ops.push(Op::UpgradeBeacon { beacon, implementation });
        Ok(BeaconDeployment { beacon, implementation, confirmation })
    }

    async fn implementation(&self, beacon: Address) -> Result<Address> {
        self.state().beacon_implementation(beacon)
    }

    async fn send(
        &self,
        contract: &BoundContract,
        invocation: &Invocation,
    ) -> Result<Confirmation> {
        contract.function(invocation)?;

        let mut state = self.state();
        state.ops.push(Op::Send(invocation.function.clone()));
        state.check(Step::Send)?;
        state.execute(contract.address(), invocation, true)?;
        Ok(state.mine())
    }

    async fn call(
        &self,
        contract: &BoundContract,
        invocation: &Invocation,
    ) -> Result<Vec<DynSolValue>> {
        contract.function(invocation)?;

        let mut state = self.state();
        state.ops.push(Op::Call(invocation.function.clone()));
        state.execute(contract.address(), invocation, false)
    }
}
