//! Config - QueueConfig
//!
//! - `QueueConfig::default()`: 既定値（poll 1s, retry 3, history 1000, timeout なし）
//! - `QueueConfig::from_env()`: `LOOM_*` 環境変数で上書き

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::DEFAULT_MAX_RETRIES;
use crate::error::QueueError;

const POLL_INTERVAL_MS: u64 = 1_000;
const HISTORY_CAPACITY: usize = 1_000;

/// QueueConfig は manager 全体の設定
///
/// # 使用例
/// ```ignore
/// let config = QueueConfig {
///     handler_timeout: Some(Duration::from_secs(30)),
///     ..QueueConfig::from_env()?
/// };
/// let manager = QueueManager::new(config);
/// ```
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Bounded wait of one dequeue attempt. Also bounds how long an idle worker
    /// can go without looking at its queue.
    pub poll_interval: Duration,

    /// Attempt budget for tasks created through `QueueManager::submit`.
    pub default_max_retries: u32,

    /// Entries kept per completed/failed history list. `None` keeps everything.
    pub history_capacity: Option<usize>,

    /// Deadline of one handler attempt. `None` waits as long as the handler runs.
    pub handler_timeout: Option<Duration>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(POLL_INTERVAL_MS),
            default_max_retries: DEFAULT_MAX_RETRIES,
            history_capacity: Some(HISTORY_CAPACITY),
            handler_timeout: None,
        }
    }
}

impl QueueConfig {
    /// Load from `LOOM_*` environment variables, falling back to defaults.
    ///
    /// - `LOOM_POLL_INTERVAL_MS`
    /// - `LOOM_DEFAULT_MAX_RETRIES`
    /// - `LOOM_HISTORY_CAPACITY` (`0` = unbounded)
    /// - `LOOM_HANDLER_TIMEOUT_SECS` (`0` = no deadline)
    pub fn from_env() -> Result<Self, QueueError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, QueueError> {
        let mut config = Self::default();

        if let Some(ms) = parse::<u64>(&lookup, "LOOM_POLL_INTERVAL_MS")? {
            if ms == 0 {
                return Err(QueueError::Config {
                    key: "LOOM_POLL_INTERVAL_MS",
                    reason: "must be greater than zero".to_string(),
                });
            }
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(n) = parse::<u32>(&lookup, "LOOM_DEFAULT_MAX_RETRIES")? {
            config.default_max_retries = n.max(1);
        }
        if let Some(n) = parse::<usize>(&lookup, "LOOM_HISTORY_CAPACITY")? {
            config.history_capacity = (n > 0).then_some(n);
        }
        if let Some(secs) = parse::<u64>(&lookup, "LOOM_HANDLER_TIMEOUT_SECS")? {
            config.handler_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        Ok(config)
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<T>, QueueError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|e| QueueError::Config {
            key,
            reason: format!("{raw:?}: {e}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let config = QueueConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.default_max_retries, 3);
        assert_eq!(config.history_capacity, Some(1_000));
        assert!(config.handler_timeout.is_none());
    }

    #[test]
    fn overrides_from_env() {
        let config = QueueConfig::from_lookup(lookup_from(&[
            ("LOOM_POLL_INTERVAL_MS", "250"),
            ("LOOM_DEFAULT_MAX_RETRIES", "5"),
            ("LOOM_HISTORY_CAPACITY", "0"),
            ("LOOM_HANDLER_TIMEOUT_SECS", "30"),
        ]))
        .unwrap();
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.default_max_retries, 5);
        assert_eq!(config.history_capacity, None);
        assert_eq!(config.handler_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn invalid_number_is_rejected() {
        let err = QueueConfig::from_lookup(lookup_from(&[("LOOM_DEFAULT_MAX_RETRIES", "many")]))
            .unwrap_err();
        assert!(matches!(
            err,
            QueueError::Config { key: "LOOM_DEFAULT_MAX_RETRIES", .. }
        ));
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let err =
            QueueConfig::from_lookup(lookup_from(&[("LOOM_POLL_INTERVAL_MS", "0")])).unwrap_err();
        assert!(err.to_string().contains("LOOM_POLL_INTERVAL_MS"));
    }
}
