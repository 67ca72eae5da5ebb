//! Error type shared by artifact resolution, the manifest and the
//! network toolchain.
use std::path::PathBuf;

use alloy::{
    primitives::{Address, TxHash},
    providers::PendingTransactionError,
    transports::TransportError,
};

/// Convenience alias for results returned by this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while resolving artifacts or talking to the chain.
///
/// None of these are recovered locally: the first one aborts the running
/// workflow.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No compiled artifact exists for the requested contract name.
    #[error("artifact for contract `{name}` not found in {}", dir.display())]
    ArtifactNotFound {
        /// Requested contract name.
        name: String,
        /// Build directory that was searched.
        dir: PathBuf,
    },
    /// The artifact exists but cannot be used.
    #[error("malformed artifact for contract `{name}`: {reason}")]
    MalformedArtifact {
        /// Contract name of the artifact.
        name: String,
        /// What is wrong with it.
        reason: String,
    },
    /// Process configuration is missing or invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// The node could not be reached or answered with an error.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Waiting for a submitted transaction failed.
    #[error(transparent)]
    PendingTransaction(#[from] PendingTransactionError),
    /// A contract call or transaction could not be built or executed.
    #[error(transparent)]
    Contract(#[from] alloy::contract::Error),
    /// The transaction was mined, but reverted.
    #[error("transaction {tx_hash} reverted")]
    Reverted {
        /// Hash of the reverted transaction.
        tx_hash: TxHash,
    },
    /// A deployment receipt carried no contract address.
    #[error("receipt of transaction {tx_hash} has no contract address")]
    MissingContractAddress {
        /// Hash of the deployment transaction.
        tx_hash: TxHash,
    },
    /// There is no contract deployed at the address.
    #[error("no contract code at {0}")]
    NoCode(Address),
    /// The address does not answer like an upgrade beacon.
    #[error("{address} is not an upgrade beacon: {reason}")]
    NotABeacon {
        /// Address that was expected to host a beacon.
        address: Address,
        /// Why it was rejected.
        reason: String,
    },
    /// The bound interface has no function with this name and arity.
    #[error(
        "function `{function}` with {arity} argument(s) does not exist on \
         `{contract}`"
    )]
    UnknownFunction {
        /// Contract whose interface was searched.
        contract: String,
        /// Function name.
        function: String,
        /// Number of arguments supplied.
        arity: usize,
    },
    /// A call returned values of an unexpected shape.
    #[error("unexpected output from `{function}`: {reason}")]
    UnexpectedOutput {
        /// Function that was called.
        function: String,
        /// What was wrong with the output.
        reason: String,
    },
    /// Reading or writing the deployment manifest failed.
    #[error("deployment manifest {}: {reason}", path.display())]
    Manifest {
        /// Manifest file path.
        path: PathBuf,
        /// IO or serialization failure.
        reason: String,
    },
}

impl Error {
    /// Whether this error is an on-chain revert, either of a mined
    /// transaction or reported by the node during gas estimation.
    #[must_use]
    pub fn is_revert(&self) -> bool {
        let transport = match self {
            Self::Reverted { .. } => return true,
            Self::Transport(e) => e,
            Self::Contract(alloy::contract::Error::TransportError(e)) => e,
            _ => return false,
        };

        //  ErrorResp(
        //      ErrorPayload {
        //          code: 3,
        //          message: "execution reverted: ..",
        //          data: Some(..),
        //      },
        //  )
        transport
            .as_error_resp()
            .is_some_and(|payload| payload.message.contains("revert"))
    }
}
