//! End-to-end testing harness.
//!
//! Tests run against the development node at `RPC_URL` (e.g. `anvil`). Each
//! test gets fresh [`Account`]s funded from the node's first development
//! account.
mod account;
mod system;

pub use account::Account;
pub use system::{rpc_url, Wallet, RPC_URL_ENV_VAR_NAME};
