//! Billing scheduler configuration.

use std::env;
use std::time::Duration;

/// Default pause between cycle starts: one hour.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub const DEFAULT_WORKER_NAME: &str = "billing-executor";

pub const ENV_INTERVAL_SECS: &str = "BILLING_INTERVAL_SECS";
pub const ENV_WORKER_NAME: &str = "BILLING_WORKER_NAME";

/// Billing scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingConfig {
    /// Time between the starts of two consecutive cycles
    pub interval: Duration,
    /// Worker thread name (also used in logs)
    pub worker_name: String,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            worker_name: DEFAULT_WORKER_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl BillingConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_worker_name(mut self, name: impl Into<String>) -> Self {
        self.worker_name = name.into();
        self
    }

    /// Read `BILLING_INTERVAL_SECS` and `BILLING_WORKER_NAME`; unset or empty
    /// variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env`, reading values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(raw) = read(ENV_INTERVAL_SECS) {
            let secs: u64 = raw.parse().map_err(|e| ConfigError::InvalidValue {
                key: ENV_INTERVAL_SECS,
                value: raw.clone(),
                reason: format!("{e}"),
            })?;
            config.interval = Duration::from_secs(secs);
        }

        if let Some(name) = read(ENV_WORKER_NAME) {
            config.worker_name = name;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: ENV_INTERVAL_SECS,
                value: format!("{:?}", self.interval),
                reason: "interval must not be zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn defaults_to_hourly_schedule() {
        let config = BillingConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.interval, Duration::from_secs(3600));
        assert_eq!(config.worker_name, "billing-executor");
    }

    #[test]
    fn reads_overrides() {
        let config = BillingConfig::from_lookup(lookup(&[
            (ENV_INTERVAL_SECS, " 90 "),
            (ENV_WORKER_NAME, "billing-eu"),
        ]))
        .unwrap();
        assert_eq!(config.interval, Duration::from_secs(90));
        assert_eq!(config.worker_name, "billing-eu");
    }

    #[test]
    fn empty_values_keep_defaults() {
        let config = BillingConfig::from_lookup(lookup(&[(ENV_INTERVAL_SECS, "")])).unwrap();
        assert_eq!(config, BillingConfig::default());
    }

    #[test]
    fn validate_rejects_zero_interval_set_in_code() {
        let config = BillingConfig::default().with_interval(Duration::ZERO);
        assert!(config.validate().is_err());
        assert!(BillingConfig::default().validate().is_ok());
        assert!(
            BillingConfig::default()
                .with_interval(Duration::from_millis(1))
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn rejects_zero_and_garbage_intervals() {
        for raw in ["0", "hourly", "-5"] {
            let err = BillingConfig::from_lookup(lookup(&[(ENV_INTERVAL_SECS, raw)])).unwrap_err();
            match err {
                ConfigError::InvalidValue { key, .. } => assert_eq!(key, ENV_INTERVAL_SECS),
            }
        }
    }
}
