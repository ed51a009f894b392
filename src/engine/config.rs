//! Engine configuration.

use crate::game::FEE_DENOMINATOR;
use std::env;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// House fee on decisive outcomes, in basis points (500 = 5%)
    pub fee_bps: u32,

    /// Age after which a waiting match is cancelled and refunded
    pub stale_timeout_secs: u64,

    /// Age after which a two-seat waiting match is force-started.
    /// Must be shorter than `stale_timeout_secs`.
    pub two_player_grace_secs: u64,

    /// Reaper sweep interval
    pub sweep_interval_secs: u64,

    /// Attempts before lock contention surfaces as `Busy`
    pub lock_retry_attempts: u32,

    /// Base backoff between lock retries, jittered per attempt
    pub lock_retry_backoff_ms: u64,
}

impl EngineConfig {
    /// Create configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - `RPS_FEE_BPS`: fee in basis points (default: 500)
    /// - `RPS_STALE_TIMEOUT_SECS`: stale match timeout (default: 600)
    /// - `RPS_TWO_PLAYER_GRACE_SECS`: force-start grace (default: 120)
    /// - `RPS_SWEEP_INTERVAL_SECS`: reaper interval (default: 30)
    /// - `RPS_LOCK_RETRY_ATTEMPTS`: lock retries (default: 3)
    /// - `RPS_LOCK_RETRY_BACKOFF_MS`: retry backoff base (default: 25)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            fee_bps: env_or("RPS_FEE_BPS", defaults.fee_bps),
            stale_timeout_secs: env_or("RPS_STALE_TIMEOUT_SECS", defaults.stale_timeout_secs),
            two_player_grace_secs: env_or(
                "RPS_TWO_PLAYER_GRACE_SECS",
                defaults.two_player_grace_secs,
            ),
            sweep_interval_secs: env_or("RPS_SWEEP_INTERVAL_SECS", defaults.sweep_interval_secs),
            lock_retry_attempts: env_or("RPS_LOCK_RETRY_ATTEMPTS", defaults.lock_retry_attempts),
            lock_retry_backoff_ms: env_or(
                "RPS_LOCK_RETRY_BACKOFF_MS",
                defaults.lock_retry_backoff_ms,
            ),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if i64::from(self.fee_bps) > FEE_DENOMINATOR {
            return Err(format!(
                "Fee must be at most {FEE_DENOMINATOR} basis points"
            ));
        }

        if self.two_player_grace_secs >= self.stale_timeout_secs {
            return Err("Two-player grace must be shorter than the stale timeout".to_string());
        }

        if self.sweep_interval_secs == 0 {
            return Err("Sweep interval must be at least one second".to_string());
        }

        if self.lock_retry_attempts == 0 {
            return Err("Lock retry attempts must be at least 1".to_string());
        }

        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fee_bps: 500,
            stale_timeout_secs: 600,
            two_player_grace_secs: 120,
            sweep_interval_secs: 30,
            lock_retry_attempts: 3,
            lock_retry_backoff_ms: 25,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn grace_must_be_shorter_than_stale_timeout() {
        let config = EngineConfig {
            two_player_grace_secs: 600,
            stale_timeout_secs: 600,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn fee_cannot_exceed_whole_pot() {
        let config = EngineConfig {
            fee_bps: 10_001,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
