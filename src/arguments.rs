/// Centralized argument handling for swapdesk
///
/// Stores the process arguments once so the logger and the binary can check
/// debug flags without threading them through every call.
///
/// Features:
/// - Centralized CMD_ARGS storage with thread-safe access
/// - Per-tag debug flag checks (`--debug-<tag>`)
/// - Verbosity switches (`--verbose`, `--quiet`)
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::env;

/// Global command-line arguments storage
pub static CMD_ARGS: Lazy<Mutex<Vec<String>>> = Lazy::new(|| Mutex::new(env::args().collect()));

/// Sets the global command-line arguments
/// Used by the binary and by tests to override the default env::args() collection
pub fn set_cmd_args(args: Vec<String>) {
    *CMD_ARGS.lock() = args;
}

/// Gets a copy of the current command-line arguments
pub fn get_cmd_args() -> Vec<String> {
    CMD_ARGS.lock().clone()
}

/// Checks if a specific argument is present in the command line
pub fn has_arg(arg: &str) -> bool {
    get_cmd_args().iter().any(|a| a == arg)
}

/// All `--debug-<key>` flags present, with the prefix stripped
pub fn debug_flags() -> Vec<String> {
    get_cmd_args()
        .iter()
        .filter_map(|a| a.strip_prefix("--debug-").map(|k| k.to_string()))
        .collect()
}

/// Debug mode for every tag at once
pub fn is_debug_all_enabled() -> bool {
    has_arg("--debug-all")
}

pub fn is_verbose_enabled() -> bool {
    has_arg("--verbose")
}

pub fn is_quiet_enabled() -> bool {
    has_arg("--quiet")
}

/// Flags consumed by the logger rather than the command parser
pub fn is_logging_flag(arg: &str) -> bool {
    arg.starts_with("--debug-") || arg == "--verbose" || arg == "--quiet"
}
