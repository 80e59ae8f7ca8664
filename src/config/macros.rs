/// `config_struct!`: a config section declared once with its defaults
///
/// Generates the struct, a `Default` impl from the declared values and serde
/// support with `#[serde(default)]`, so a partial TOML file loads cleanly.
/// Timeouts are stored as plain integers in the file; an optional
/// `durations` block adds typed accessors for them.
///
/// # Example
/// ```
/// swapdesk::config_struct! {
///     pub struct SettlementConfig {
///         poll_interval_ms: u64 = 500,
///         timeout_secs: u64 = 60,
///     }
///     durations {
///         poll_interval => poll_interval_ms as from_millis,
///         timeout => timeout_secs as from_secs,
///     }
/// }
///
/// let settlement = SettlementConfig::default();
/// assert_eq!(settlement.timeout(), std::time::Duration::from_secs(60));
/// ```
#[macro_export]
macro_rules! config_struct {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_name:ident: $field_type:ty = $default_value:expr
            ),*
            $(,)?
        }
        $(
            durations {
                $(
                    $(#[$accessor_meta:meta])*
                    $accessor:ident => $source:ident as $unit:ident
                ),*
                $(,)?
            }
        )?
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
        #[serde(default)]
        $vis struct $name {
            $(
                $(#[$field_meta])*
                pub $field_name: $field_type,
            )*
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    $($field_name: $default_value,)*
                }
            }
        }

        $(
            impl $name {
                $(
                    $(#[$accessor_meta])*
                    pub fn $accessor(&self) -> std::time::Duration {
                        std::time::Duration::$unit(self.$source)
                    }
                )*
            }
        )?
    };
}
