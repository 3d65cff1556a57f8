//! Configuration types.

use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Health supervisor configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SupervisorConfig {
    /// Minimum time between two supervision passes.
    pub check_interval: Duration,
    /// Leases older than this are reclaimed as stale.
    pub recovery_timeout: Duration,
    /// Recovery attempts allowed per ship before it is abandoned.
    pub max_recovery_attempts: u32,
    /// Slack past a ship's expected arrival before it counts as stuck.
    pub stuck_grace: Duration,
    /// Iterations per second above which a running task looks like a loop.
    pub max_iteration_rate: f64,
    /// Tasks with fewer iterations than this are never flagged as loops.
    pub min_loop_iterations: i64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(60), // 1 minute
            recovery_timeout: Duration::from_secs(1800), // 30 minutes
            max_recovery_attempts: 3,
            stuck_grace: Duration::from_secs(300), // 5 minutes
            max_iteration_rate: 1.0,
            min_loop_iterations: 10,
        }
    }
}

impl SupervisorConfig {
    /// Build a config from defaults overlaid with `FLEET_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Missing keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(secs) = parse_key::<u64, _>(&lookup, "FLEET_CHECK_INTERVAL_SECS")? {
            config.check_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_key::<u64, _>(&lookup, "FLEET_RECOVERY_TIMEOUT_SECS")? {
            config.recovery_timeout = Duration::from_secs(secs);
        }
        if let Some(max) = parse_key::<u32, _>(&lookup, "FLEET_MAX_RECOVERY_ATTEMPTS")? {
            config.max_recovery_attempts = max;
        }
        if let Some(secs) = parse_key::<u64, _>(&lookup, "FLEET_STUCK_GRACE_SECS")? {
            config.stuck_grace = Duration::from_secs(secs);
        }
        if let Some(rate) = parse_key::<f64, _>(&lookup, "FLEET_MAX_ITERATION_RATE")? {
            if !rate.is_finite() || rate <= 0.0 {
                return Err(ConfigError::InvalidValue {
                    key: "FLEET_MAX_ITERATION_RATE".to_string(),
                    message: format!("must be a positive number, got {rate}"),
                });
            }
            config.max_iteration_rate = rate;
        }
        if let Some(min) = parse_key::<i64, _>(&lookup, "FLEET_MIN_LOOP_ITERATIONS")? {
            config.min_loop_iterations = min;
        }

        Ok(config)
    }
}

fn parse_key<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("{e} (got {raw:?})"),
            }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = SupervisorConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, SupervisorConfig::default());
        assert_eq!(config.max_recovery_attempts, 3);
    }

    #[test]
    fn overrides_are_applied() {
        let config = SupervisorConfig::from_lookup(lookup_from(&[
            ("FLEET_CHECK_INTERVAL_SECS", "5"),
            ("FLEET_RECOVERY_TIMEOUT_SECS", " 600 "),
            ("FLEET_MAX_RECOVERY_ATTEMPTS", "7"),
            ("FLEET_MAX_ITERATION_RATE", "2.5"),
        ]))
        .unwrap();

        assert_eq!(config.check_interval, Duration::from_secs(5));
        assert_eq!(config.recovery_timeout, Duration::from_secs(600));
        assert_eq!(config.max_recovery_attempts, 7);
        assert_eq!(config.max_iteration_rate, 2.5);
        assert_eq!(config.stuck_grace, Duration::from_secs(300));
    }

    #[test]
    fn unparsable_value_is_rejected() {
        let err = SupervisorConfig::from_lookup(lookup_from(&[(
            "FLEET_MAX_RECOVERY_ATTEMPTS",
            "lots",
        )]))
        .unwrap_err();

        match err {
            ConfigError::InvalidValue { key, .. } => {
                assert_eq!(key, "FLEET_MAX_RECOVERY_ATTEMPTS")
            }
        }
    }

    #[test]
    fn non_positive_rate_is_rejected() {
        let result =
            SupervisorConfig::from_lookup(lookup_from(&[("FLEET_MAX_ITERATION_RATE", "0")]));
        assert!(result.is_err());
    }
}
