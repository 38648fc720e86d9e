//! Engine, sync and server configuration. Every field has a default so partial
//! JSON bodies and missing env vars are fine.

use crate::models::TournamentError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Elo constants and the rating clamp.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    /// Update step size (higher = more volatile).
    pub k_factor: f64,
    pub min: f64,
    pub max: f64,
    /// Seed for candidates with no prior history.
    pub default_rating: f64,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            k_factor: 32.0,
            min: 800.0,
            max: 2400.0,
            default_rating: 1500.0,
        }
    }
}

impl RatingConfig {
    /// Pull `value` into `[min, max]`. NaN collapses to the default rating.
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.default_rating;
        }
        value.clamp(self.min, self.max)
    }

    pub fn validate(&self) -> Result<(), TournamentError> {
        if !(self.k_factor.is_finite() && self.k_factor > 0.0) {
            return Err(TournamentError::InvalidInput(format!(
                "k_factor must be positive (got {})",
                self.k_factor
            )));
        }
        if !(self.min.is_finite() && self.max.is_finite() && self.min < self.max) {
            return Err(TournamentError::InvalidInput(format!(
                "rating bounds must satisfy min < max (got {}..{})",
                self.min, self.max
            )));
        }
        if !(self.min..=self.max).contains(&self.default_rating) {
            return Err(TournamentError::InvalidInput(format!(
                "default rating {} is outside {}..{}",
                self.default_rating, self.min, self.max
            )));
        }
        Ok(())
    }
}

/// When the scheduler stops serving matchups.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CompletionPolicy {
    /// Stop after this many votes in total.
    FixedComparisons { total: u32 },
    /// Stop once every candidate has appeared in at least this many matchups.
    MinAppearances { per_candidate: u32 },
}

impl Default for CompletionPolicy {
    fn default() -> Self {
        CompletionPolicy::MinAppearances { per_candidate: 3 }
    }
}

/// Settings for one tournament session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub rating: RatingConfig,
    pub completion: CompletionPolicy,
    /// Minimum interval between two accepted votes (double-click guard). 0 disables it.
    pub vote_cooldown_ms: u64,
    /// Fixed shuffle seed; `None` draws one from the OS.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rating: RatingConfig::default(),
            completion: CompletionPolicy::default(),
            vote_cooldown_ms: 250,
            seed: None,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), TournamentError> {
        self.rating.validate()?;
        let budget = match self.completion {
            CompletionPolicy::FixedComparisons { total } => total,
            CompletionPolicy::MinAppearances { per_candidate } => per_candidate,
        };
        if budget == 0 {
            return Err(TournamentError::InvalidInput(
                "completion policy must require at least one comparison".to_string(),
            ));
        }
        Ok(())
    }
}

/// Retry and durability settings for the sync queue.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Delivery attempts per entry before it is moved to `failed`.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay_ms: u64,
    /// Backoff is capped here.
    pub max_delay_ms: u64,
    /// A delivery that takes longer than this counts as a failure.
    pub delivery_timeout_ms: u64,
    /// Where the outbox is persisted. `None` keeps it in memory only.
    pub outbox_path: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            delivery_timeout_ms: 10_000,
            outbox_path: None,
        }
    }
}

impl SyncConfig {
    /// Delay before the next attempt after `failures` failed ones:
    /// `base * 2^(failures - 1)`, capped at `max_delay_ms`.
    pub fn backoff_delay(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(31);
        let delay = self.base_delay_ms.saturating_mul(1u64 << exponent);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }
}

/// Server settings, read from the environment by the `web` binary.
#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Directory the file-backed persistence writes final ratings into.
    pub ratings_dir: PathBuf,
    pub engine: EngineConfig,
    pub sync: SyncConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            ratings_dir: PathBuf::from("data/ratings"),
            engine: EngineConfig::default(),
            sync: SyncConfig {
                outbox_path: Some(PathBuf::from("data/outbox.json")),
                ..SyncConfig::default()
            },
        }
    }
}

impl AppConfig {
    /// Defaults overridden by HOST, PORT, RATINGS_DIR, OUTBOX_PATH,
    /// VOTE_COOLDOWN_MS and SYNC_MAX_ATTEMPTS. Unparseable values are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(host) = lookup("HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("PORT").and_then(|p| p.parse().ok()) {
            config.port = port;
        }
        if let Some(dir) = lookup("RATINGS_DIR") {
            config.ratings_dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup("OUTBOX_PATH") {
            config.sync.outbox_path = Some(PathBuf::from(path));
        }
        if let Some(ms) = lookup("VOTE_COOLDOWN_MS").and_then(|v| v.parse().ok()) {
            config.engine.vote_cooldown_ms = ms;
        }
        if let Some(n) = lookup("SYNC_MAX_ATTEMPTS").and_then(|v| v.parse().ok()) {
            config.sync.max_attempts = n;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let config = SyncConfig {
            base_delay_ms: 100,
            max_delay_ms: 1_000,
            ..SyncConfig::default()
        };
        assert_eq!(config.backoff_delay(1), Duration::from_millis(100));
        assert_eq!(config.backoff_delay(2), Duration::from_millis(200));
        assert_eq!(config.backoff_delay(4), Duration::from_millis(800));
        assert_eq!(config.backoff_delay(5), Duration::from_millis(1_000));
        assert_eq!(config.backoff_delay(200), Duration::from_millis(1_000));
    }

    #[test]
    fn env_overrides_defaults() {
        let config = AppConfig::from_lookup(|key| match key {
            "PORT" => Some("9000".to_string()),
            "VOTE_COOLDOWN_MS" => Some("0".to_string()),
            "SYNC_MAX_ATTEMPTS" => Some("not a number".to_string()),
            _ => None,
        });
        assert_eq!(config.port, 9000);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.engine.vote_cooldown_ms, 0);
        assert_eq!(config.sync.max_attempts, 5);
    }

    #[test]
    fn zero_budget_is_rejected() {
        let config = EngineConfig {
            completion: CompletionPolicy::FixedComparisons { total: 0 },
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(TournamentError::InvalidInput(_))
        ));
    }
}
