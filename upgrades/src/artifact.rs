//! Compiled contract artifacts and local interface bindings.
use std::{
    fs,
    path::{Path, PathBuf},
};

use alloy::{
    hex,
    json_abi::{Function, JsonAbi},
    primitives::{keccak256, Address, Bytes, B256},
};
use serde_json::Value;

use crate::{
    error::{Error, Result},
    toolchain::Invocation,
};

/// Compiled bytecode and interface of a named contract.
#[derive(Clone, Debug)]
pub struct Artifact {
    name: String,
    abi: JsonAbi,
    bytecode: Bytes,
}

impl Artifact {
    /// Create an artifact from already parsed parts.
    #[must_use]
    pub fn new(name: impl Into<String>, abi: JsonAbi, bytecode: Bytes) -> Self {
        Self { name: name.into(), abi, bytecode }
    }

    /// Parse a Hardhat or Foundry artifact file's contents.
    ///
    /// Hardhat stores creation code as a hex string under `bytecode`,
    /// Foundry nests it under `bytecode.object`.
    ///
    /// # Errors
    ///
    /// May fail if the JSON is invalid, or if the ABI or creation code is
    /// missing or malformed.
    pub fn from_json(name: &str, json: &str) -> Result<Self> {
        let malformed = |reason: String| Error::MalformedArtifact {
            name: name.to_owned(),
            reason,
        };

        let mut value: Value =
            serde_json::from_str(json).map_err(|e| malformed(e.to_string()))?;

        let abi = value
            .get_mut("abi")
            .map(Value::take)
            .ok_or_else(|| malformed("missing `abi`".to_owned()))?;
        let abi: JsonAbi = serde_json::from_value(abi)
            .map_err(|e| malformed(format!("invalid `abi`: {e}")))?;

        let code = match value.get("bytecode") {
            Some(Value::String(code)) => code.as_str(),
            Some(Value::Object(object)) => object
                .get("object")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    malformed("missing `bytecode.object`".to_owned())
                })?,
            _ => return Err(malformed("missing `bytecode`".to_owned())),
        };
        let bytecode = hex::decode(code)
            .map_err(|e| malformed(format!("invalid bytecode hex: {e}")))?;
        if bytecode.is_empty() {
            return Err(malformed(
                "empty creation code, contract is abstract or an interface"
                    .to_owned(),
            ));
        }

        Ok(Self::new(name, abi, bytecode.into()))
    }

    /// Contract name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Contract interface.
    #[must_use]
    pub fn abi(&self) -> &JsonAbi {
        &self.abi
    }

    /// Creation code.
    #[must_use]
    pub fn bytecode(&self) -> &Bytes {
        &self.bytecode
    }

    /// Keccak-256 of the creation code. Identifies an implementation across
    /// runs.
    #[must_use]
    pub fn bytecode_hash(&self) -> B256 {
        keccak256(&self.bytecode)
    }

    /// Bind this artifact's interface to `address`.
    ///
    /// Purely local: nothing is checked on chain.
    #[must_use]
    pub fn attach(&self, address: Address) -> BoundContract {
        BoundContract {
            contract: self.name.clone(),
            address,
            abi: self.abi.clone(),
        }
    }
}

/// A contract interface bound to an on-chain address.
#[derive(Clone, Debug)]
pub struct BoundContract {
    contract: String,
    address: Address,
    abi: JsonAbi,
}

impl BoundContract {
    /// Name of the contract whose interface is bound.
    #[must_use]
    pub fn contract(&self) -> &str {
        &self.contract
    }

    /// Address the interface is bound to.
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// Bound interface.
    #[must_use]
    pub fn abi(&self) -> &JsonAbi {
        &self.abi
    }

    /// Find the function `invocation` targets, matching by name and number
    /// of arguments.
    ///
    /// # Errors
    ///
    /// May fail if no such function exists on the interface.
    pub fn function(&self, invocation: &Invocation) -> Result<&Function> {
        find_function(&self.abi, &self.contract, invocation)
    }
}

/// Find the overload of `invocation.function` taking as many arguments as
/// supplied.
pub(crate) fn find_function<'a>(
    abi: &'a JsonAbi,
    contract: &str,
    invocation: &Invocation,
) -> Result<&'a Function> {
    abi.function(&invocation.function)
        .and_then(|overloads| {
            overloads.iter().find(|f| f.inputs.len() == invocation.args.len())
        })
        .ok_or_else(|| Error::UnknownFunction {
            contract: contract.to_owned(),
            function: invocation.function.clone(),
            arity: invocation.args.len(),
        })
}

/// Resolves compiled artifacts by contract name under a build directory.
#[derive(Clone, Debug)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Create a store reading from `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Build directory this store reads from.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load the artifact of contract `name`.
    ///
    /// Looks for `<dir>/<name>.json`, then `<dir>/<name>.sol/<name>.json`
    /// (Foundry's `out/`), then any `<file>.sol/<name>.json` below `dir`
    /// (Hardhat's `artifacts/`).
    ///
    /// # Errors
    ///
    /// May fail if no artifact exists for `name` or if it is malformed.
    pub fn resolve(&self, name: &str) -> Result<Artifact> {
        let path = self.locate(name).ok_or_else(|| Error::ArtifactNotFound {
            name: name.to_owned(),
            dir: self.dir.clone(),
        })?;
        tracing::debug!(
            contract = name,
            path = %path.display(),
            "resolved artifact"
        );

        let json = fs::read_to_string(&path).map_err(|e| {
            Error::MalformedArtifact {
                name: name.to_owned(),
                reason: format!("failed to read {}: {e}", path.display()),
            }
        })?;
        Artifact::from_json(name, &json)
    }

    fn locate(&self, name: &str) -> Option<PathBuf> {
        let file = format!("{name}.json");
        let flat = self.dir.join(&file);
        if flat.is_file() {
            return Some(flat);
        }
        let foundry = self.dir.join(format!("{name}.sol")).join(&file);
        if foundry.is_file() {
            return Some(foundry);
        }
        search(&self.dir, &file)
    }
}

/// Depth-first search for `file` inside a `*.sol` directory below `dir`.
fn search(dir: &Path, file: &str) -> Option<PathBuf> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.is_dir())
        .collect();
    entries.sort();

    for path in entries {
        let is_source_dir = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(".sol"));
        if is_source_dir {
            let candidate = path.join(file);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        if let Some(found) = search(&path, file) {
            return Some(found);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use alloy::{
        dyn_abi::DynSolValue,
        primitives::{address, U256},
    };
    use tempfile::TempDir;

    use super::*;

    const BOX_ABI: &str = r#"[
        {"type":"function","name":"initialize",
         "stateMutability":"nonpayable",
         "inputs":[{"name":"x","type":"uint256","internalType":"uint256"}],
         "outputs":[]},
        {"type":"function","name":"x","stateMutability":"view",
         "inputs":[],
         "outputs":[{"name":"","type":"uint256","internalType":"uint256"}]}
    ]"#;

    fn hardhat_json() -> String {
        format!(
            concat!(
                r#"{{"_format":"hh-sol-artifact-1","contractName":"Box","#,
                r#""abi":{abi},"bytecode":"0x6080604052"}}"#,
            ),
            abi = BOX_ABI,
        )
    }

    fn foundry_json() -> String {
        format!(r#"{{"abi":{BOX_ABI},"bytecode":{{"object":"0x6080604052"}}}}"#)
    }

    #[test]
    fn parses_hardhat_artifact() {
        let artifact = Artifact::from_json("Box", &hardhat_json())
            .expect("should parse hardhat artifact");
        assert_eq!(artifact.name(), "Box");
        assert_eq!(
            artifact.bytecode().to_vec(),
            vec![0x60, 0x80, 0x60, 0x40, 0x52]
        );
        assert!(artifact.abi().function("initialize").is_some());
    }

    #[test]
    fn parses_foundry_artifact() {
        let hardhat = Artifact::from_json("Box", &hardhat_json()).unwrap();
        let foundry = Artifact::from_json("Box", &foundry_json())
            .expect("should parse foundry artifact");
        assert_eq!(foundry.bytecode(), hardhat.bytecode());
        assert_eq!(foundry.bytecode_hash(), hardhat.bytecode_hash());
    }

    #[test]
    fn rejects_interface_artifact() {
        let json = format!(r#"{{"abi":{BOX_ABI},"bytecode":"0x"}}"#);
        let err = Artifact::from_json("IBox", &json)
            .expect_err("should reject empty creation code");
        assert!(matches!(
            err,
            Error::MalformedArtifact { name, .. } if name == "IBox"
        ));
    }

    #[test]
    fn rejects_missing_abi() {
        let err = Artifact::from_json("Box", r#"{"bytecode":"0x60"}"#)
            .expect_err("should reject missing abi");
        assert!(err.to_string().contains("missing `abi`"));
    }

    #[test]
    fn bound_contract_finds_functions_by_arity() {
        let artifact = Artifact::from_json("Box", &hardhat_json()).unwrap();
        let proxy = address!("0xB7b9CAb3B5ABd9ac543348f93a640eeEFb0047F4");
        let bound = artifact.attach(proxy);
        assert_eq!(bound.address(), proxy);

        let initialize = Invocation::new(
            "initialize",
            vec![DynSolValue::Uint(U256::from(42), 256)],
        );
        assert_eq!(bound.function(&initialize).unwrap().name, "initialize");

        let err = bound
            .function(&Invocation::new("initialize", vec![]))
            .expect_err("should not match wrong arity");
        assert!(matches!(err, Error::UnknownFunction { arity: 0, .. }));

        let err = bound
            .function(&Invocation::new("setY", vec![]))
            .expect_err("should not find missing function");
        assert!(matches!(
            err,
            Error::UnknownFunction { function, .. } if function == "setY"
        ));
    }

    #[test]
    fn resolves_foundry_layout() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::create_dir_all(dir.join("Box.sol")).unwrap();
        fs::write(dir.join("Box.sol").join("Box.json"), foundry_json())
            .unwrap();

        let artifact = ArtifactStore::new(dir).resolve("Box").unwrap();
        assert_eq!(artifact.name(), "Box");
    }

    #[test]
    fn resolves_nested_hardhat_layout() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("contracts").join("Box.sol");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("Box.json"), hardhat_json()).unwrap();
        fs::write(nested.join("Box.dbg.json"), "{}").unwrap();

        let artifact =
            ArtifactStore::new(temp_dir.path()).resolve("Box").unwrap();
        assert_eq!(artifact.name(), "Box");
    }

    #[test]
    fn unknown_contract_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let err = ArtifactStore::new(temp_dir.path())
            .resolve("BoxV3")
            .expect_err("should not resolve unknown contract");
        assert!(matches!(
            err,
            Error::ArtifactNotFound { name, .. } if name == "BoxV3"
        ));
    }
}
