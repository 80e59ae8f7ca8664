/// Small shared helpers
use crate::errors::FlowError;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;

/// Run `fut` with a bounded wait; elapsed time surfaces `UpstreamUnavailable`
pub async fn with_timeout<T, F>(duration: Duration, what: &str, fut: F) -> Result<T, FlowError>
where
    F: Future<Output = Result<T, FlowError>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => Err(FlowError::upstream(format!(
            "{} timed out after {}s",
            what,
            duration.as_secs_f64()
        ))),
    }
}

/// `AbCd...WxYz` form for log lines
pub fn short_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 10 {
        return address.to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Format age as compact string like "3m", "2h", "1d"
pub fn format_age_string(timestamp: Option<DateTime<Utc>>) -> String {
    let Some(timestamp) = timestamp else {
        return "-".to_string();
    };

    let secs = (Utc::now() - timestamp).num_seconds().max(0);
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3_600 {
        format!("{}m", secs / 60)
    } else if secs < 86_400 {
        format!("{}h", secs / 3_600)
    } else {
        format!("{}d", secs / 86_400)
    }
}
