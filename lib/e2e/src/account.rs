use std::{fmt, str::FromStr};

use alloy::{
    network::{EthereumWallet, TransactionBuilder},
    primitives::{uint, Address, U256},
    providers::{Provider, ProviderBuilder},
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
    transports::http::reqwest::Url,
};
use eyre::{ensure, Context};
use once_cell::sync::Lazy;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::system::{rpc_url, Wallet};

/// First development account of `anvil` and `hardhat node`.
const MASTER_PRIVATE_KEY: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const DEFAULT_FUNDING_ETH: U256 = uint!(10_000_000_000_000_000_000_U256);

/// Type that corresponds to a test account.
#[derive(Clone)]
pub struct Account {
    /// The account's local private key wrapper.
    pub signer: PrivateKeySigner,
    /// The account's wallet -- an `alloy` provider signing with `signer`.
    pub wallet: Wallet,
    url: Url,
}

impl Account {
    /// Create a new account with a default funding of [`DEFAULT_FUNDING_ETH`].
    ///
    /// # Errors
    ///
    /// May fail if `RPC_URL` is not set or funding the newly created account
    /// fails.
    pub async fn new() -> eyre::Result<Self> {
        AccountFactory::create().await
    }

    /// Get a hex-encoded String representing this account's private key.
    #[must_use]
    pub fn pk(&self) -> String {
        alloy::hex::encode_prefixed(self.signer.to_bytes())
    }

    /// Retrieve this account's address.
    #[must_use]
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// The rpc endpoint this account's provider is connected to.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Get gas token balance.
    ///
    /// # Errors
    ///
    /// May fail if the node is unreachable.
    pub async fn balance(&self) -> eyre::Result<U256> {
        Ok(self.wallet.get_balance(self.address()).await?)
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("address", &self.address())
            .field("url", &self.url.as_str())
            .finish_non_exhaustive()
    }
}

/// A unit struct used as a synchronization mechanism in
/// [`SYNC_ACCOUNT_FACTORY`].
struct AccountFactory;

impl AccountFactory {
    /// Get access to the factory in a synchronized manner.
    async fn lock() -> MutexGuard<'static, Self> {
        /// Every account is funded from the same master account, so creation
        /// is serialized to keep its nonces in order.
        static SYNC_ACCOUNT_FACTORY: Lazy<Mutex<AccountFactory>> =
            Lazy::new(|| Mutex::new(AccountFactory));

        SYNC_ACCOUNT_FACTORY.lock().await
    }

    /// Create a new account and fund it from the master account.
    ///
    /// # Errors
    ///
    /// May fail if `RPC_URL` is not set or funding the newly created account
    /// fails.
    async fn create() -> eyre::Result<Account> {
        let _lock = AccountFactory::lock().await;

        let signer = PrivateKeySigner::random();
        let url = rpc_url()?;

        let master = PrivateKeySigner::from_str(MASTER_PRIVATE_KEY)
            .wrap_err("failed to create master signer")?;
        let master_wallet = ProviderBuilder::new()
            .wallet(EthereumWallet::from(master.clone()))
            .connect_http(url.clone());

        let tx = TransactionRequest::default()
            .with_from(master.address())
            .with_to(signer.address())
            .with_value(DEFAULT_FUNDING_ETH);

        let receipt = master_wallet
            .send_transaction(tx)
            .await?
            .get_receipt()
            .await
            .wrap_err("account's wallet wasn't funded")?;
        ensure!(receipt.status(), "funding transaction reverted");
        debug!(address = %signer.address(), "funded test account");

        let wallet = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer.clone()))
            .connect_http(url.clone())
            .erased();

        Ok(Account { signer, wallet, url })
    }
}
