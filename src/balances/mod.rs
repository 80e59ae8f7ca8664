//! Wallet holdings: native balance, token balances and recent activity

pub mod aggregator;
pub mod types;

pub use aggregator::{parse_wallet_address, BalanceAggregator};
pub use types::{Balance, BalanceSource, SourceError, WalletSnapshot};
