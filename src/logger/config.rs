/// Logger configuration derived from command-line flags
use super::levels::LogLevel;
use super::tags::LogTag;
use crate::arguments;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Messages above this level are dropped (errors always pass)
    pub min_level: LogLevel,
    /// Tags with `--debug-<tag>` enabled
    pub debug_tags: HashSet<LogTag>,
    /// Restrict output to these tags; empty means all
    pub enabled_tags: HashSet<String>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            debug_tags: HashSet::new(),
            enabled_tags: HashSet::new(),
        }
    }
}

static LOGGER_CONFIG: Lazy<RwLock<LoggerConfig>> =
    Lazy::new(|| RwLock::new(LoggerConfig::default()));

/// Build the logger configuration from the stored process arguments
pub fn init_from_args() {
    let mut config = LoggerConfig::default();

    if arguments::is_verbose_enabled() {
        config.min_level = LogLevel::Verbose;
    } else if arguments::is_quiet_enabled() {
        config.min_level = LogLevel::Warning;
    }

    if arguments::is_debug_all_enabled() {
        config.debug_tags = LogTag::ALL.iter().copied().collect();
    } else {
        config.debug_tags = arguments::debug_flags()
            .iter()
            .filter_map(|key| LogTag::from_debug_key(key))
            .collect();
    }

    // Debug output for a tag implies the Debug threshold
    if !config.debug_tags.is_empty() && config.min_level < LogLevel::Debug {
        config.min_level = LogLevel::Debug;
    }

    set_logger_config(config);
}

pub fn get_logger_config() -> LoggerConfig {
    LOGGER_CONFIG.read().clone()
}

pub fn set_logger_config(config: LoggerConfig) {
    *LOGGER_CONFIG.write() = config;
}

pub fn update_logger_config<F>(update: F)
where
    F: FnOnce(&mut LoggerConfig),
{
    update(&mut LOGGER_CONFIG.write());
}

pub fn is_debug_enabled_for_tag(tag: &LogTag) -> bool {
    LOGGER_CONFIG.read().debug_tags.contains(tag)
}
