/// Log tags, one per subsystem
///
/// The debug key of a tag is what `--debug-<key>` enables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Config,
    Rpc,
    Registry,
    Balances,
    Quote,
    Swap,
    Transfer,
    Wallet,
    Settlement,
}

impl LogTag {
    pub const ALL: [LogTag; 10] = [
        LogTag::System,
        LogTag::Config,
        LogTag::Rpc,
        LogTag::Registry,
        LogTag::Balances,
        LogTag::Quote,
        LogTag::Swap,
        LogTag::Transfer,
        LogTag::Wallet,
        LogTag::Settlement,
    ];

    /// Uppercase label used in console and file output
    pub fn to_plain_string(&self) -> &'static str {
        match self {
            LogTag::System => "SYSTEM",
            LogTag::Config => "CONFIG",
            LogTag::Rpc => "RPC",
            LogTag::Registry => "REGISTRY",
            LogTag::Balances => "BALANCES",
            LogTag::Quote => "QUOTE",
            LogTag::Swap => "SWAP",
            LogTag::Transfer => "TRANSFER",
            LogTag::Wallet => "WALLET",
            LogTag::Settlement => "SETTLE",
        }
    }

    /// Key matched against `--debug-<key>`
    pub fn to_debug_key(&self) -> String {
        format!("{:?}", self).to_lowercase()
    }

    pub fn from_debug_key(key: &str) -> Option<LogTag> {
        LogTag::ALL
            .iter()
            .copied()
            .find(|tag| tag.to_debug_key() == key.to_lowercase())
    }
}

impl std::fmt::Display for LogTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_plain_string())
    }
}
