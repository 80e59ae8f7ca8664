//! Configuration system
//!
//! TOML file at `data/config.toml` (or `--config <path>`), parsed into the
//! `Config` tree. Components receive their own section by value.

pub mod macros;
pub mod schemas;
pub mod utils;

pub use schemas::*;
pub use utils::{
    get_config_clone, get_wallet_keypair, get_wallet_pubkey, load_config_from_path,
    parse_private_key, read_config_file, with_config, CONFIG_FILE_PATH,
};
