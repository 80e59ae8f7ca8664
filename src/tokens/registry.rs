/// Asset registry: mint address → display metadata
///
/// Starts from a built-in list of well-known mints and can be extended from a
/// remote token list. Unknown mints never fail a lookup; they resolve to the
/// "Unknown Token" placeholder.
use super::types::Asset;
use crate::constants::{BONK_MINT, JUP_MINT, SOL_MINT, USDC_MINT, USDT_MINT};
use crate::errors::FlowError;
use crate::logger::{self, LogTag};
use parking_lot::RwLock;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Mainnet chain id used by the solana-labs token list
const MAINNET_CHAIN_ID: u64 = 101;

#[derive(Debug, Deserialize)]
struct TokenListEntry {
    address: String,
    symbol: String,
    name: String,
    decimals: u8,
    #[serde(rename = "logoURI", default)]
    logo_uri: Option<String>,
    #[serde(rename = "chainId", default)]
    chain_id: Option<u64>,
}

/// Both the solana-labs `{ "tokens": [...] }` document and a bare array
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TokenListDocument {
    Wrapped { tokens: Vec<TokenListEntry> },
    Bare(Vec<TokenListEntry>),
}

pub struct AssetRegistry {
    assets: RwLock<HashMap<String, Asset>>,
}

impl Default for AssetRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl AssetRegistry {
    pub fn empty() -> Self {
        Self {
            assets: RwLock::new(HashMap::new()),
        }
    }

    /// Registry seeded with the well-known mints
    pub fn with_builtin() -> Self {
        let registry = Self::empty();
        for asset in builtin_assets() {
            registry.insert(asset);
        }
        registry
    }

    pub fn insert(&self, asset: Asset) {
        self.assets.write().insert(asset.address.clone(), asset);
    }

    pub fn len(&self) -> usize {
        self.assets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.read().is_empty()
    }

    pub fn lookup(&self, address: &str) -> Option<Asset> {
        self.assets.read().get(address).cloned()
    }

    /// Metadata for a mint, or the placeholder carrying on-chain decimals
    pub fn resolve(&self, address: &str, decimals: u8) -> Asset {
        match self.lookup(address) {
            Some(mut asset) => {
                // On-chain decimals win over list metadata
                asset.decimals = decimals;
                asset
            }
            None => {
                logger::debug(
                    LogTag::Registry,
                    &format!("No metadata for mint {}, using placeholder", address),
                );
                Asset::unknown(address, decimals)
            }
        }
    }

    /// Case-insensitive symbol lookup; "SOL" is the native asset
    pub fn find_by_symbol(&self, symbol: &str) -> Option<Asset> {
        if symbol.eq_ignore_ascii_case("SOL") {
            return Some(Asset::sol());
        }
        let assets = self.assets.read();
        let mut matches: Vec<&Asset> = assets
            .values()
            .filter(|a| a.symbol.eq_ignore_ascii_case(symbol))
            .collect();
        // Prefer built-ins and stable ordering when a symbol is reused
        matches.sort_by(|a, b| a.address.cmp(&b.address));
        matches
            .iter()
            .find(|a| builtin_assets().iter().any(|b| b.address == a.address))
            .or_else(|| matches.first())
            .map(|a| (*a).clone())
    }

    /// Resolve user input that is either a symbol or a mint address
    pub fn find(&self, symbol_or_address: &str) -> Option<Asset> {
        self.find_by_symbol(symbol_or_address)
            .or_else(|| self.lookup(symbol_or_address))
    }

    /// Symbol or name substring search, capped at `limit`
    pub fn search(&self, query: &str, limit: usize) -> Vec<Asset> {
        let needle = query.to_lowercase();
        let assets = self.assets.read();
        let mut found: Vec<Asset> = assets
            .values()
            .filter(|a| {
                a.symbol.to_lowercase().contains(&needle) || a.name.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        found.truncate(limit);
        found
    }

    /// Merge a token list document; built-in entries are kept as they are
    pub fn merge_token_list(&self, body: &str) -> Result<usize, FlowError> {
        let document: TokenListDocument = serde_json::from_str(body)
            .map_err(|e| FlowError::upstream(format!("Token list parse failed: {}", e)))?;

        let entries = match document {
            TokenListDocument::Wrapped { tokens } => tokens,
            TokenListDocument::Bare(tokens) => tokens,
        };

        let mut assets = self.assets.write();
        let mut added = 0;
        for entry in entries {
            if entry.chain_id.map_or(false, |id| id != MAINNET_CHAIN_ID) {
                continue;
            }
            if assets.contains_key(&entry.address) {
                continue;
            }
            let mut asset = Asset::new(&entry.address, &entry.symbol, &entry.name, entry.decimals);
            asset.icon = entry.logo_uri.filter(|uri| !uri.is_empty());
            assets.insert(entry.address, asset);
            added += 1;
        }
        Ok(added)
    }

    /// Fetch and merge a remote token list
    pub async fn load_remote(&self, url: &str, timeout: Duration) -> Result<usize, FlowError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FlowError::upstream(format!("Failed to create HTTP client: {}", e)))?;

        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| FlowError::upstream(format!("Token list request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(FlowError::upstream(format!(
                "Token list request failed with status {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FlowError::upstream(format!("Failed to read token list: {}", e)))?;

        let added = self.merge_token_list(&body)?;
        logger::info(
            LogTag::Registry,
            &format!("Loaded {} assets from remote token list", added),
        );
        Ok(added)
    }

    /// Remote load that degrades to the built-in list on any failure
    pub async fn load_remote_or_keep(&self, url: &str, timeout: Duration) {
        if let Err(e) = self.load_remote(url, timeout).await {
            logger::warning(
                LogTag::Registry,
                &format!("Token list unavailable, keeping built-in assets: {}", e),
            );
        }
    }
}

fn builtin_assets() -> Vec<Asset> {
    vec![
        Asset::new(SOL_MINT, "wSOL", "Wrapped SOL", 9),
        Asset::new(USDC_MINT, "USDC", "USD Coin", 6),
        Asset::new(USDT_MINT, "USDT", "USDT", 6),
        Asset::new(BONK_MINT, "BONK", "Bonk", 5),
        Asset::new(JUP_MINT, "JUP", "Jupiter", 6),
    ]
}
