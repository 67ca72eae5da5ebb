use alloy::{providers::DynProvider, transports::http::reqwest::Url};
use eyre::Context;

/// Environment variable holding the node's endpoint.
pub const RPC_URL_ENV_VAR_NAME: &str = "RPC_URL";

/// Convenience type alias that represents an Ethereum wallet.
pub type Wallet = DynProvider;

/// Load the `name` environment variable.
fn env(name: &str) -> eyre::Result<String> {
    std::env::var(name).wrap_err(format!("failed to load {name}"))
}

/// Endpoint of the node under test.
///
/// # Errors
///
/// May fail if `RPC_URL` is unset or is not a URL.
pub fn rpc_url() -> eyre::Result<Url> {
    let url = env(RPC_URL_ENV_VAR_NAME)?;
    url.parse()
        .wrap_err(format!("failed to parse {RPC_URL_ENV_VAR_NAME} ({url})"))
}
