//! Per-chain record of what was deployed.
//!
//! Implementations are keyed by the hash of their creation code, so that
//! deploying or upgrading to an unchanged contract reuses the existing
//! implementation instead of deploying a copy. Callers check a record
//! against the chain before reusing it.
use std::{
    collections::BTreeMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use alloy::primitives::{Address, TxHash, B256};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::{Error, Result};

/// A deployed implementation contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplementationRecord {
    /// Contract name of the artifact it was deployed from.
    pub contract: String,
    /// Implementation address.
    pub address: Address,
    /// Creation transaction.
    pub tx_hash: TxHash,
}

/// A deployed beacon and its current implementation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconRecord {
    /// Beacon address.
    pub address: Address,
    /// Implementation the beacon last pointed at.
    pub implementation: Address,
    /// Last transaction that created or repointed the beacon.
    pub tx_hash: TxHash,
}

/// A deployed beacon proxy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyRecord {
    /// Proxy address.
    pub address: Address,
    /// Beacon the proxy delegates to.
    pub beacon: Address,
    /// Creation transaction.
    pub tx_hash: TxHash,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ManifestData {
    #[serde(default)]
    implementations: BTreeMap<String, ImplementationRecord>,
    #[serde(default)]
    beacons: Vec<BeaconRecord>,
    #[serde(default)]
    proxies: Vec<ProxyRecord>,
}

/// Deployment manifest of a single chain, stored as JSON.
#[derive(Debug)]
pub struct Manifest {
    path: PathBuf,
    data: ManifestData,
}

impl Manifest {
    /// Load the manifest of `chain_id` from `dir`. A missing file is an
    /// empty manifest.
    ///
    /// # Errors
    ///
    /// May fail if the file exists but cannot be read or parsed.
    pub async fn load(dir: &Path, chain_id: u64) -> Result<Self> {
        let path = dir.join(format!("chain-{chain_id}.json"));
        let json = match fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(Self { path, data: ManifestData::default() });
            }
            Err(e) => return Err(manifest_error(&path, &e)),
        };

        let data = serde_json::from_str(&json)
            .map_err(|e| manifest_error(&path, &e))?;
        Ok(Self { path, data })
    }

    /// Manifest file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Implementation previously deployed from creation code with
    /// `bytecode_hash`.
    #[must_use]
    pub fn implementation(
        &self,
        bytecode_hash: &B256,
    ) -> Option<&ImplementationRecord> {
        self.data.implementations.get(&bytecode_hash.to_string())
    }

    /// Beacon recorded at `address`.
    #[must_use]
    pub fn beacon(&self, address: Address) -> Option<&BeaconRecord> {
        self.data.beacons.iter().find(|beacon| beacon.address == address)
    }

    /// Proxies recorded as delegating to `beacon`.
    pub fn proxies_of(
        &self,
        beacon: Address,
    ) -> impl Iterator<Item = &ProxyRecord> {
        self.data.proxies.iter().filter(move |proxy| proxy.beacon == beacon)
    }

    /// Record an implementation deployed from code with `bytecode_hash`,
    /// replacing any previous one, and save.
    ///
    /// # Errors
    ///
    /// May fail if the manifest cannot be written.
    pub async fn record_implementation(
        &mut self,
        bytecode_hash: B256,
        record: ImplementationRecord,
    ) -> Result<()> {
        self.data.implementations.insert(bytecode_hash.to_string(), record);
        self.save().await
    }

    /// Record a created or repointed beacon, and save.
    ///
    /// # Errors
    ///
    /// May fail if the manifest cannot be written.
    pub async fn record_beacon(
        &mut self,
        record: BeaconRecord,
    ) -> Result<()> {
        match self
            .data
            .beacons
            .iter_mut()
            .find(|beacon| beacon.address == record.address)
        {
            Some(beacon) => *beacon = record,
            None => self.data.beacons.push(record),
        }
        self.save().await
    }

    /// Record a created proxy, and save.
    ///
    /// # Errors
    ///
    /// May fail if the manifest cannot be written.
    pub async fn record_proxy(&mut self, record: ProxyRecord) -> Result<()> {
        self.data.proxies.push(record);
        self.save().await
    }

    async fn save(&self) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| manifest_error(&self.path, &e))?;
        }
        let json = serde_json::to_string_pretty(&self.data)
            .map_err(|e| manifest_error(&self.path, &e))?;

        // Write next to the manifest, then rename over it.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).await.map_err(|e| manifest_error(&tmp, &e))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| manifest_error(&self.path, &e))
    }
}

fn manifest_error(path: &Path, err: &impl std::fmt::Display) -> Error {
    Error::Manifest { path: path.to_path_buf(), reason: err.to_string() }
}
