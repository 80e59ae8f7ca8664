/// Global constants used across swapdesk
///
/// System-wide values that are not configurable.

// ============================================================================
// SOLANA BLOCKCHAIN CONSTANTS
// ============================================================================

/// SOL token mint address (wrapped SOL / WSOL)
pub const SOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// Number of decimal places for SOL token
pub const SOL_DECIMALS: u8 = 9;

/// Lamports per SOL (10^9)
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Common stablecoin mints
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
pub const USDT_MINT: &str = "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB";

pub const BONK_MINT: &str = "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263";
pub const JUP_MINT: &str = "JUPyiwrYJFskUPiHa7hkeR8VUtAeFoSYbKedZNsDvCN";

// ============================================================================
// PROGRAM IDS
// ============================================================================

/// Legacy SPL Token program
pub const SPL_TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

/// Token-2022 (token extensions) program
pub const TOKEN_2022_PROGRAM_ID: &str = "TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb";

// ============================================================================
// DISPLAY
// ============================================================================

/// Placeholder metadata for assets missing from the registry
pub const UNKNOWN_TOKEN_SYMBOL: &str = "Unknown";
pub const UNKNOWN_TOKEN_NAME: &str = "Unknown Token";

/// Decimal places shown for quote estimates
pub const QUOTE_DISPLAY_DECIMALS: u32 = 6;

/// Upper bound for user supplied slippage (50%)
pub const MAX_SLIPPAGE_BPS: u16 = 5_000;
