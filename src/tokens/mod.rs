//! Assets, the asset registry and decimal amount handling

pub mod amounts;
pub mod registry;
pub mod types;

pub use amounts::{
    exchange_rate, format_raw_amount, format_raw_amount_fixed, format_raw_amount_trimmed,
    minimum_received, parse_ui_amount,
};
pub use registry::AssetRegistry;
pub use types::Asset;
