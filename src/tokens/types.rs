use crate::constants::{SOL_DECIMALS, SOL_MINT, UNKNOWN_TOKEN_NAME, UNKNOWN_TOKEN_SYMBOL};
use serde::{Deserialize, Serialize};

/// Tradable asset metadata
///
/// `native` marks the chain's own currency (lamports held directly by the
/// wallet rather than in a token account). Jupiter addresses native SOL by
/// the wrapped SOL mint, so both share `SOL_MINT`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Asset {
    pub address: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    pub icon: Option<String>,
    #[serde(default)]
    pub native: bool,
}

impl Asset {
    pub fn new(address: &str, symbol: &str, name: &str, decimals: u8) -> Self {
        Self {
            address: address.to_string(),
            symbol: symbol.to_string(),
            name: name.to_string(),
            decimals,
            icon: None,
            native: false,
        }
    }

    /// Native SOL
    pub fn sol() -> Self {
        Self {
            native: true,
            ..Self::new(SOL_MINT, "SOL", "Solana", SOL_DECIMALS)
        }
    }

    /// Placeholder for a mint missing from the registry
    pub fn unknown(address: &str, decimals: u8) -> Self {
        Self::new(address, UNKNOWN_TOKEN_SYMBOL, UNKNOWN_TOKEN_NAME, decimals)
    }

    pub fn is_unknown(&self) -> bool {
        self.symbol == UNKNOWN_TOKEN_SYMBOL && self.name == UNKNOWN_TOKEN_NAME
    }
}

impl std::fmt::Display for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol)
    }
}
