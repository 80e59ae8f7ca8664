//! Wallet connection, signing and the per-session view of holdings

pub mod keypair;
pub mod session;
pub mod signer;

pub use keypair::{ApprovalFn, KeypairSigner};
pub use session::WalletSession;
pub use signer::WalletSigner;
