/// Balance aggregation across the node's data sources
///
/// Native balance, token accounts (both token programs) and recent
/// signatures are fetched concurrently. Each source fails on its own and is
/// reported as a `SourceError` inside the snapshot.
use super::types::{Balance, BalanceSource, SourceError, WalletSnapshot};
use crate::constants::{SPL_TOKEN_PROGRAM_ID, TOKEN_2022_PROGRAM_ID};
use crate::errors::FlowError;
use crate::logger::{self, LogTag};
use crate::rpc::{NodeRpc, SignatureInfo, TokenAccountInfo};
use crate::tokens::AssetRegistry;
use crate::utils::{short_address, with_timeout};
use chrono::Utc;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub struct BalanceAggregator {
    rpc: Arc<dyn NodeRpc>,
    registry: Arc<AssetRegistry>,
    timeout: Duration,
    history_limit: usize,
}

/// Validate a base58 wallet address
pub fn parse_wallet_address(address: &str) -> Result<Pubkey, FlowError> {
    Pubkey::from_str(address.trim()).map_err(|_| FlowError::InvalidAddress {
        address: address.to_string(),
    })
}

impl BalanceAggregator {
    pub fn new(
        rpc: Arc<dyn NodeRpc>,
        registry: Arc<AssetRegistry>,
        timeout: Duration,
        history_limit: usize,
    ) -> Self {
        Self {
            rpc,
            registry,
            timeout,
            history_limit,
        }
    }

    pub fn registry(&self) -> &Arc<AssetRegistry> {
        &self.registry
    }

    /// Fetch a full snapshot for `address`
    ///
    /// Only an invalid address fails the call; source failures are carried
    /// in the snapshot.
    pub async fn fetch(&self, address: &str) -> Result<WalletSnapshot, FlowError> {
        let owner = parse_wallet_address(address)?;
        let owner_str = owner.to_string();

        logger::debug(
            LogTag::Balances,
            &format!("Refreshing balances for {}", short_address(&owner_str)),
        );

        let (native, tokens, recent_activity) = tokio::join!(
            self.fetch_native(&owner),
            self.fetch_tokens(&owner),
            self.fetch_activity(&owner),
        );

        let snapshot = WalletSnapshot {
            owner: owner_str,
            native: native.map_err(|error| SourceError {
                origin: BalanceSource::Native,
                error,
            }),
            tokens: tokens.map_err(|error| SourceError {
                origin: BalanceSource::TokenAccounts,
                error,
            }),
            recent_activity: recent_activity.map_err(|error| SourceError {
                origin: BalanceSource::RecentActivity,
                error,
            }),
            fetched_at: Utc::now(),
        };

        for error in snapshot.errors() {
            logger::warning(LogTag::Balances, &error.to_string());
        }

        logger::info(
            LogTag::Balances,
            &format!(
                "Balances for {}: {} holdings, {} source errors",
                short_address(&snapshot.owner),
                snapshot.holdings().len(),
                snapshot.errors().len()
            ),
        );

        Ok(snapshot)
    }

    async fn fetch_native(&self, owner: &Pubkey) -> Result<Balance, FlowError> {
        let lamports = with_timeout(self.timeout, "getBalance", async {
            self.rpc.get_balance(owner).await.map_err(FlowError::from)
        })
        .await?;

        Ok(Balance::native(&owner.to_string(), lamports))
    }

    async fn fetch_tokens(&self, owner: &Pubkey) -> Result<Vec<Balance>, FlowError> {
        let spl_program = Pubkey::from_str(SPL_TOKEN_PROGRAM_ID)
            .map_err(|e| FlowError::Config(format!("Invalid token program id: {}", e)))?;
        let token_2022_program = Pubkey::from_str(TOKEN_2022_PROGRAM_ID)
            .map_err(|e| FlowError::Config(format!("Invalid token program id: {}", e)))?;

        let (legacy, extensions) = tokio::join!(
            with_timeout(self.timeout, "getTokenAccountsByOwner", async {
                self.rpc
                    .get_token_accounts_by_owner(owner, &spl_program)
                    .await
                    .map_err(FlowError::from)
            }),
            with_timeout(self.timeout, "getTokenAccountsByOwner (2022)", async {
                self.rpc
                    .get_token_accounts_by_owner(owner, &token_2022_program)
                    .await
                    .map_err(FlowError::from)
            }),
        );

        let mut accounts: Vec<TokenAccountInfo> = legacy?;
        accounts.extend(extensions?);

        let owner_str = owner.to_string();
        let mut balances: Vec<Balance> = accounts
            .into_iter()
            .filter(|account| account.amount > 0)
            .map(|account| {
                let asset = self.registry.resolve(&account.mint, account.decimals);
                Balance::token(
                    &owner_str,
                    asset,
                    account.amount,
                    &account.account,
                    account.is_token_2022,
                )
            })
            .collect();

        // Known assets first, then by symbol
        balances.sort_by(|a, b| {
            a.asset
                .is_unknown()
                .cmp(&b.asset.is_unknown())
                .then_with(|| a.asset.symbol.cmp(&b.asset.symbol))
                .then_with(|| b.raw_amount.cmp(&a.raw_amount))
        });

        Ok(balances)
    }

    async fn fetch_activity(&self, owner: &Pubkey) -> Result<Vec<SignatureInfo>, FlowError> {
        with_timeout(self.timeout, "getSignaturesForAddress", async {
            self.rpc
                .get_signatures_for_address(owner, self.history_limit)
                .await
                .map_err(FlowError::from)
        })
        .await
    }
}
