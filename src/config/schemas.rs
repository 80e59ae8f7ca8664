/// Configuration schemas - all config structures defined once with defaults
///
/// Each struct is defined with the config_struct! macro, so a missing key in
/// the TOML file falls back to the value declared here.
use crate::config_struct;

// ============================================================================
// RPC CONFIGURATION
// ============================================================================

config_struct! {
    /// Node RPC endpoint configuration
    pub struct RpcConfig {
        url: String = "https://api.mainnet-beta.solana.com".to_string(),
        /// Bounded wait for a single JSON-RPC call
        timeout_secs: u64 = 15,
        /// Commitment used for reads and blockhash lookups
        commitment: String = "confirmed".to_string(),
        /// Number of recent signatures fetched with balances
        history_limit: usize = 20,
    }
    durations {
        timeout => timeout_secs as from_secs,
    }
}

// ============================================================================
// QUOTE CONFIGURATION
// ============================================================================

config_struct! {
    /// Jupiter quote API configuration
    pub struct QuotesConfig {
        base_url: String = "https://lite-api.jup.ag/swap/v1".to_string(),
        /// Optional key for the paid Jupiter endpoint (sent as x-api-key)
        api_key: String = String::new(),
        default_slippage_bps: u16 = 50,
        timeout_secs: u64 = 10,
        /// How long a fetched quote stays usable for confirmation
        validity_secs: u64 = 30,
    }
    durations {
        timeout => timeout_secs as from_secs,
        /// How long a fetched quote stays usable
        validity => validity_secs as from_secs,
    }
}

// ============================================================================
// SWAP ASSEMBLY CONFIGURATION
// ============================================================================

config_struct! {
    /// Transaction assembly preferences sent with swap requests
    pub struct SwapsConfig {
        wrap_and_unwrap_sol: bool = true,
        dynamic_compute_unit_limit: bool = true,
        /// "auto" or a fixed lamport amount
        prioritization_fee_lamports: String = "auto".to_string(),
        timeout_secs: u64 = 15,
    }
    durations {
        timeout => timeout_secs as from_secs,
    }
}

// ============================================================================
// ASSET REGISTRY CONFIGURATION
// ============================================================================

config_struct! {
    /// Remote token list used to enrich balances
    pub struct RegistryConfig {
        load_remote: bool = true,
        token_list_url: String = "https://raw.githubusercontent.com/solana-labs/token-list/main/src/tokens/solana.tokenlist.json".to_string(),
        timeout_secs: u64 = 10,
    }
    durations {
        timeout => timeout_secs as from_secs,
    }
}

// ============================================================================
// SETTLEMENT CONFIGURATION
// ============================================================================

config_struct! {
    /// Confirmation polling after a transaction is submitted
    pub struct SettlementConfig {
        poll_interval_ms: u64 = 500,
        timeout_secs: u64 = 60,
        /// processed | confirmed | finalized
        commitment: String = "confirmed".to_string(),
    }
    durations {
        poll_interval => poll_interval_ms as from_millis,
        timeout => timeout_secs as from_secs,
    }
}

// ============================================================================
// WALLET CONFIGURATION
// ============================================================================

config_struct! {
    pub struct WalletConfig {
        /// Bounded wait for the signer (covers user approval time)
        signer_timeout_secs: u64 = 120,
    }
    durations {
        signer_timeout => signer_timeout_secs as from_secs,
    }
}

config_struct! {
    pub struct LoggingConfig {
        /// Empty disables the file sink
        file_path: String = String::new(),
    }
}

// ============================================================================
// ROOT CONFIGURATION
// ============================================================================

config_struct! {
    /// Root configuration structure containing all sub-configurations
    pub struct Config {
        /// Main wallet private key (base58 or array format)
        main_wallet_private: String = String::new(),

        rpc: RpcConfig = RpcConfig::default(),
        quotes: QuotesConfig = QuotesConfig::default(),
        swaps: SwapsConfig = SwapsConfig::default(),
        registry: RegistryConfig = RegistryConfig::default(),
        settlement: SettlementConfig = SettlementConfig::default(),
        wallet: WalletConfig = WalletConfig::default(),
        logging: LoggingConfig = LoggingConfig::default(),
    }
}
