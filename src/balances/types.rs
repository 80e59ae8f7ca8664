use crate::errors::FlowError;
use crate::rpc::SignatureInfo;
use crate::tokens::{format_raw_amount_trimmed, Asset};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// One holding of one asset by one wallet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Balance {
    pub owner: String,
    pub asset: Asset,
    pub raw_amount: u64,
    /// Exact decimal rendering of `raw_amount`
    pub ui_amount: String,
    /// Token account holding the amount; `None` for the native balance
    pub token_account: Option<String>,
    pub is_token_2022: bool,
}

impl Balance {
    pub fn native(owner: &str, lamports: u64) -> Self {
        let asset = Asset::sol();
        Self {
            owner: owner.to_string(),
            ui_amount: format_raw_amount_trimmed(lamports, asset.decimals),
            asset,
            raw_amount: lamports,
            token_account: None,
            is_token_2022: false,
        }
    }

    pub fn token(
        owner: &str,
        asset: Asset,
        raw_amount: u64,
        token_account: &str,
        is_token_2022: bool,
    ) -> Self {
        Self {
            owner: owner.to_string(),
            ui_amount: format_raw_amount_trimmed(raw_amount, asset.decimals),
            asset,
            raw_amount,
            token_account: Some(token_account.to_string()),
            is_token_2022,
        }
    }
}

/// Data source queried during a balance refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BalanceSource {
    Native,
    TokenAccounts,
    RecentActivity,
}

impl std::fmt::Display for BalanceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BalanceSource::Native => "native balance",
            BalanceSource::TokenAccounts => "token accounts",
            BalanceSource::RecentActivity => "recent activity",
        };
        write!(f, "{}", name)
    }
}

/// Failure of a single source; the other sources are unaffected
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{origin} unavailable: {error}")]
pub struct SourceError {
    pub origin: BalanceSource,
    pub error: FlowError,
}

/// Everything known about a wallet after one refresh
#[derive(Debug, Clone)]
pub struct WalletSnapshot {
    pub owner: String,
    pub native: Result<Balance, SourceError>,
    /// Non-zero token accounts, one entry per account
    pub tokens: Result<Vec<Balance>, SourceError>,
    pub recent_activity: Result<Vec<SignatureInfo>, SourceError>,
    pub fetched_at: DateTime<Utc>,
}

impl WalletSnapshot {
    /// Native balance followed by token balances, skipping failed sources
    pub fn holdings(&self) -> Vec<Balance> {
        let mut holdings = Vec::new();
        if let Ok(native) = &self.native {
            holdings.push(native.clone());
        }
        if let Ok(tokens) = &self.tokens {
            holdings.extend(tokens.iter().cloned());
        }
        holdings
    }

    pub fn errors(&self) -> Vec<&SourceError> {
        let mut errors = Vec::new();
        if let Err(e) = &self.native {
            errors.push(e);
        }
        if let Err(e) = &self.tokens {
            errors.push(e);
        }
        if let Err(e) = &self.recent_activity {
            errors.push(e);
        }
        errors
    }

    pub fn is_complete(&self) -> bool {
        self.errors().is_empty()
    }

    /// Spendable holding of `asset` in a single instruction
    ///
    /// For tokens this is the largest account of the mint, since one
    /// transfer moves funds out of one account. `None` means the source
    /// that would know is unavailable; `Some(0)` means nothing is held.
    pub fn holding_of(&self, asset: &Asset) -> Option<Balance> {
        if asset.native {
            return self.native.as_ref().ok().cloned();
        }
        let tokens = self.tokens.as_ref().ok()?;
        let best = tokens
            .iter()
            .filter(|b| b.asset.address == asset.address)
            .max_by_key(|b| b.raw_amount)
            .cloned();
        Some(best.unwrap_or_else(|| Balance {
            owner: self.owner.clone(),
            asset: asset.clone(),
            raw_amount: 0,
            ui_amount: "0".to_string(),
            token_account: None,
            is_token_2022: false,
        }))
    }

    /// Raw spendable amount of `asset`, see `holding_of`
    pub fn available(&self, asset: &Asset) -> Option<u64> {
        self.holding_of(asset).map(|b| b.raw_amount)
    }
}
