use super::schemas::Config;
/// Configuration utilities - loading and access helpers
///
/// - Loading configuration from disk (defaults when the file is missing)
/// - Thread-safe global access
/// - Wallet keypair loading from the configured private key
use crate::logger::{self, LogTag};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use std::path::Path;

/// Global configuration instance
pub static CONFIG: OnceCell<RwLock<Config>> = OnceCell::new();

/// Default configuration file path
pub const CONFIG_FILE_PATH: &str = "data/config.toml";

fn global() -> &'static RwLock<Config> {
    CONFIG.get_or_init(|| RwLock::new(Config::default()))
}

/// Parse a configuration file without touching the global instance
///
/// A missing file yields the defaults.
pub fn read_config_file(path: &str) -> Result<Config, String> {
    if !Path::new(path).exists() {
        logger::warning(
            LogTag::Config,
            &format!("Config file '{}' not found, using default values", path),
        );
        return Ok(Config::default());
    }

    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config file '{}': {}", path, e))?;

    toml::from_str::<Config>(&contents)
        .map_err(|e| format!("Failed to parse config file '{}': {}", path, e))
}

/// Load configuration from a specific file path into the global instance
///
/// Calling it again replaces the previous configuration atomically.
pub fn load_config_from_path(path: &str) -> Result<(), String> {
    let config = read_config_file(path)?;
    *global().write() = config;

    logger::debug(
        LogTag::Config,
        &format!("Configuration loaded from '{}'", path),
    );
    Ok(())
}

/// Execute a function with read access to the configuration
///
/// # Example
/// ```
/// use swapdesk::config::with_config;
///
/// let slippage = with_config(|cfg| cfg.quotes.default_slippage_bps);
/// ```
pub fn with_config<F, R>(f: F) -> R
where
    F: FnOnce(&Config) -> R,
{
    let config = global().read();
    f(&config)
}

/// Get a clone of the entire configuration, for use across await points
pub fn get_config_clone() -> Config {
    with_config(|cfg| cfg.clone())
}

// ============================================================================
// WALLET MANAGEMENT FUNCTIONS
// ============================================================================

/// Load the main wallet keypair from the configuration
///
/// Supported private key formats:
/// - Base58 encoded string (standard Solana format)
/// - Array format like [1,2,3,4,...]
pub fn get_wallet_keypair() -> Result<Keypair, String> {
    let private_key = with_config(|cfg| cfg.main_wallet_private.clone());
    parse_private_key(&private_key)
}

pub fn parse_private_key(private_key: &str) -> Result<Keypair, String> {
    let private_key = private_key.trim();

    if private_key.is_empty() {
        return Err("Main wallet private key is empty in config".to_string());
    }

    if private_key.starts_with('[') && private_key.ends_with(']') {
        load_keypair_from_array_format(private_key)
    } else {
        load_keypair_from_base58_format(private_key)
    }
}

fn load_keypair_from_array_format(private_key_str: &str) -> Result<Keypair, String> {
    let private_key_str = private_key_str
        .trim_start_matches('[')
        .trim_end_matches(']');

    let bytes = private_key_str
        .split(',')
        .map(|s| s.trim().parse::<u8>())
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|e| format!("Failed to parse private key array: {}", e))?;

    keypair_from_bytes(&bytes)
}

fn load_keypair_from_base58_format(private_key_str: &str) -> Result<Keypair, String> {
    let decoded = bs58::decode(private_key_str)
        .into_vec()
        .map_err(|e| format!("Failed to decode base58 private key: {}", e))?;

    keypair_from_bytes(&decoded)
}

#[allow(deprecated)]
fn keypair_from_bytes(bytes: &[u8]) -> Result<Keypair, String> {
    if bytes.len() != 64 {
        return Err(format!(
            "Invalid private key length: expected 64 bytes, got {}",
            bytes.len()
        ));
    }

    Keypair::from_bytes(bytes).map_err(|e| format!("Failed to create keypair: {}", e))
}

pub fn get_wallet_pubkey() -> Result<Pubkey, String> {
    get_wallet_keypair().map(|kp| kp.pubkey())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.quotes.default_slippage_bps, 50);
        assert_eq!(config.rpc.history_limit, 20);
        assert_eq!(config.settlement.commitment, "confirmed");
        assert!(config.swaps.wrap_and_unwrap_sol);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[quotes]"));
        assert!(toml_str.contains("[settlement]"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[rpc]\nurl = \"http://localhost:8899\"\n\n[quotes]\ndefault_slippage_bps = 100"
        )
        .unwrap();

        let config = read_config_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.rpc.url, "http://localhost:8899");
        assert_eq!(config.rpc.timeout_secs, 15);
        assert_eq!(config.quotes.default_slippage_bps, 100);
        assert_eq!(config.quotes.validity_secs, 30);
        assert_eq!(config.quotes.validity(), std::time::Duration::from_secs(30));
        assert_eq!(
            config.settlement.poll_interval(),
            std::time::Duration::from_millis(500)
        );
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = read_config_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.rpc.url, "https://api.mainnet-beta.solana.com");
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[rpc\nurl = ").unwrap();
        assert!(read_config_file(file.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn test_private_key_formats() {
        let keypair = Keypair::new();
        let bytes = keypair.to_bytes();

        let base58 = bs58::encode(bytes).into_string();
        assert_eq!(parse_private_key(&base58).unwrap().pubkey(), keypair.pubkey());

        let array = format!(
            "[{}]",
            bytes
                .iter()
                .map(|b| b.to_string())
                .collect::<Vec<_>>()
                .join(",")
        );
        assert_eq!(parse_private_key(&array).unwrap().pubkey(), keypair.pubkey());

        assert!(parse_private_key("").is_err());
        assert!(parse_private_key("[1,2,3]").is_err());
    }
}
