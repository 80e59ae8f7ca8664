/// Connected wallet state
///
/// Holds the connected address and the most recent balance snapshot. Every
/// refresh replaces the snapshot wholesale.
use super::signer::WalletSigner;
use crate::balances::{parse_wallet_address, BalanceAggregator, WalletSnapshot};
use crate::errors::FlowError;
use crate::logger::{self, LogTag};
use crate::tokens::AssetRegistry;
use crate::utils::short_address;
use parking_lot::RwLock;
use std::sync::Arc;

pub struct WalletSession {
    signer: Arc<dyn WalletSigner>,
    aggregator: Arc<BalanceAggregator>,
    address: RwLock<Option<String>>,
    snapshot: RwLock<Option<WalletSnapshot>>,
}

impl WalletSession {
    pub fn new(signer: Arc<dyn WalletSigner>, aggregator: Arc<BalanceAggregator>) -> Self {
        Self {
            signer,
            aggregator,
            address: RwLock::new(None),
            snapshot: RwLock::new(None),
        }
    }

    pub fn signer(&self) -> &Arc<dyn WalletSigner> {
        &self.signer
    }

    pub fn registry(&self) -> &Arc<AssetRegistry> {
        self.aggregator.registry()
    }

    pub fn address(&self) -> Option<String> {
        self.address.read().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.address.read().is_some()
    }

    /// Latest snapshot, if one has been fetched since connecting
    pub fn snapshot(&self) -> Option<WalletSnapshot> {
        self.snapshot.read().clone()
    }

    /// Connect the signer and load balances
    ///
    /// Connecting an already connected session returns the current address.
    pub async fn connect(&self) -> Result<String, FlowError> {
        if let Some(address) = self.address() {
            return Ok(address);
        }

        let address = self.signer.connect().await?;
        let owner = parse_wallet_address(&address)?.to_string();
        *self.address.write() = Some(owner.clone());

        logger::info(
            LogTag::Wallet,
            &format!(
                "Connected {} wallet {}",
                self.signer.name(),
                short_address(&owner)
            ),
        );

        self.refresh().await?;
        Ok(owner)
    }

    pub async fn disconnect(&self) {
        self.signer.disconnect().await;
        let previous = self.address.write().take();
        *self.snapshot.write() = None;

        if let Some(address) = previous {
            logger::info(
                LogTag::Wallet,
                &format!("Disconnected {}", short_address(&address)),
            );
        }
    }

    /// Fetch a fresh snapshot for the connected wallet
    pub async fn refresh(&self) -> Result<WalletSnapshot, FlowError> {
        let address = self.address().ok_or(FlowError::WalletNotConnected)?;
        let snapshot = self.aggregator.fetch(&address).await?;

        // A disconnect or reconnect during the fetch wins
        if self.address().as_deref() == Some(address.as_str()) {
            *self.snapshot.write() = Some(snapshot.clone());
        }

        Ok(snapshot)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::balances::aggregator::tests::{token_account, FakeRpc};
    use crate::constants::USDC_MINT;
    use crate::transactions::PendingTransaction;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use solana_sdk::pubkey::Pubkey;
    use std::time::Duration;

    /// Signer double with scripted answers
    pub(crate) struct FakeSigner {
        pub address: String,
        pub decline_connect: Mutex<bool>,
        /// Answers for successive `sign_and_submit` calls; empty means success
        pub sign_results: Mutex<Vec<Result<String, FlowError>>>,
        pub signed: Mutex<Vec<PendingTransaction>>,
    }

    impl FakeSigner {
        pub fn new() -> Self {
            Self {
                address: Pubkey::new_unique().to_string(),
                decline_connect: Mutex::new(false),
                sign_results: Mutex::new(vec![]),
                signed: Mutex::new(vec![]),
            }
        }

        pub fn sign_calls(&self) -> usize {
            self.signed.lock().len()
        }
    }

    #[async_trait]
    impl WalletSigner for FakeSigner {
        fn name(&self) -> &str {
            "fake"
        }

        async fn connect(&self) -> Result<String, FlowError> {
            if *self.decline_connect.lock() {
                return Err(FlowError::UserRejected);
            }
            Ok(self.address.clone())
        }

        async fn disconnect(&self) {}

        async fn sign_and_submit(&self, pending: &PendingTransaction) -> Result<String, FlowError> {
            self.signed.lock().push(pending.clone());
            let mut results = self.sign_results.lock();
            if results.is_empty() {
                return Ok("Signature1111".to_string());
            }
            results.remove(0)
        }
    }

    pub(crate) fn session_with(rpc: Arc<FakeRpc>, signer: Arc<FakeSigner>) -> WalletSession {
        let aggregator = BalanceAggregator::new(
            rpc,
            Arc::new(AssetRegistry::with_builtin()),
            Duration::from_millis(200),
            20,
        );
        WalletSession::new(signer, Arc::new(aggregator))
    }

    #[tokio::test]
    async fn test_connect_loads_snapshot() {
        let rpc = Arc::new(FakeRpc::default());
        *rpc.lamports.lock() = Ok(1_500_000_000);
        *rpc.spl_accounts.lock() = Ok(vec![token_account(USDC_MINT, 42_000_000, 6)]);
        let signer = Arc::new(FakeSigner::new());
        let session = session_with(rpc, signer.clone());

        let address = session.connect().await.unwrap();
        assert_eq!(address, signer.address);

        let snapshot = session.snapshot().unwrap();
        assert_eq!(snapshot.holdings().len(), 2);
        assert_eq!(snapshot.native.unwrap().ui_amount, "1.5");
    }

    #[tokio::test]
    async fn test_declined_connect_stays_disconnected() {
        let signer = Arc::new(FakeSigner::new());
        *signer.decline_connect.lock() = true;
        let session = session_with(Arc::new(FakeRpc::default()), signer);

        assert_eq!(session.connect().await.unwrap_err(), FlowError::UserRejected);
        assert!(!session.is_connected());
        assert_eq!(
            session.refresh().await.unwrap_err(),
            FlowError::WalletNotConnected
        );
    }

    #[tokio::test]
    async fn test_refresh_replaces_and_disconnect_clears() {
        let rpc = Arc::new(FakeRpc::default());
        *rpc.lamports.lock() = Ok(1_000_000_000);
        let session = session_with(rpc.clone(), Arc::new(FakeSigner::new()));
        session.connect().await.unwrap();

        *rpc.lamports.lock() = Ok(250_000_000);
        session.refresh().await.unwrap();
        assert_eq!(session.snapshot().unwrap().native.unwrap().raw_amount, 250_000_000);

        session.disconnect().await;
        assert!(session.snapshot().is_none());
        assert!(session.address().is_none());
    }
}
