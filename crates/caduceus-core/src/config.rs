//! Configuration management for Caduceus.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use crate::types::UserRole;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

/// Main pipeline configuration.
///
/// This is loaded from `~/.config/caduceus/config.toml` (or platform
/// equivalent). If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Threat assessment thresholds and detector timeouts
    pub threat: ThreatConfig,
    /// Placeholder mapping retention
    pub redaction: RedactionConfig,
    /// Per-role request and spend quotas
    pub limits: LimitsConfig,
    /// Model routing thresholds and candidate models
    pub routing: RoutingConfig,
    /// Response cache sizing and expiry
    pub cache: CacheConfig,
    /// Backend call timeouts and retry policy
    pub upstream: UpstreamConfig,
    /// Per-model pricing table
    pub pricing: PricingConfig,
}

impl PipelineConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(&config_path)?;
            let config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `CADUCEUS_BLOCK_THRESHOLD`: Override the threat block threshold
    /// - `CADUCEUS_CACHE_TTL_SECS`: Override the response cache TTL
    /// - `CADUCEUS_COMPLEXITY_THRESHOLD`: Override the routing threshold
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;

        if let Ok(val) = std::env::var("CADUCEUS_BLOCK_THRESHOLD") {
            if let Ok(threshold) = val.parse() {
                config.threat.block_threshold = threshold;
                tracing::debug!("Override threat.block_threshold from env: {}", threshold);
            }
        }

        if let Ok(val) = std::env::var("CADUCEUS_CACHE_TTL_SECS") {
            if let Ok(ttl) = val.parse() {
                config.cache.ttl_secs = ttl;
                tracing::debug!("Override cache.ttl_secs from env: {}", ttl);
            }
        }

        if let Ok(val) = std::env::var("CADUCEUS_COMPLEXITY_THRESHOLD") {
            if let Ok(threshold) = val.parse() {
                config.routing.complexity_threshold = threshold;
                tracing::debug!(
                    "Override routing.complexity_threshold from env: {}",
                    threshold
                );
            }
        }

        Ok(config)
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/caduceus/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("com", "caduceus", "caduceus").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/caduceus`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("com", "caduceus", "caduceus").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.data_dir().to_path_buf())
    }
}

/// Threat assessment settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreatConfig {
    /// Combined score at or above which a request is blocked
    pub block_threshold: f64,
    /// Combined score at or above which a warning is attached
    pub warning_threshold: f64,
    /// Per-detector evaluation timeout in milliseconds
    pub detector_timeout_ms: u64,
}

impl Default for ThreatConfig {
    fn default() -> Self {
        Self {
            block_threshold: 0.70,
            warning_threshold: 0.55,
            detector_timeout_ms: 2_000,
        }
    }
}

/// Placeholder mapping retention settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactionConfig {
    /// Hours an idle mapping set survives before the sweep removes it
    pub retention_hours: i64,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self { retention_hours: 24 }
    }
}

/// Request and spend ceilings for one role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RoleLimit {
    /// Maximum requests per hour
    pub max_requests: u32,
    /// Maximum cumulative spend per hour in USD
    pub max_cost_usd: f64,
}

/// Per-role quota table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Limits for the patient role
    pub patient: RoleLimit,
    /// Limits for the clinician role
    pub clinician: RoleLimit,
    /// Limits for the admin role
    pub admin: RoleLimit,
}

impl LimitsConfig {
    /// Get the limits for a role.
    #[must_use]
    pub fn for_role(&self, role: UserRole) -> RoleLimit {
        match role {
            UserRole::Patient => self.patient,
            UserRole::Clinician => self.clinician,
            UserRole::Admin => self.admin,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            patient: RoleLimit {
                max_requests: 10,
                max_cost_usd: 1.00,
            },
            clinician: RoleLimit {
                max_requests: 100,
                max_cost_usd: 10.00,
            },
            admin: RoleLimit {
                max_requests: 1_000,
                max_cost_usd: 50.00,
            },
        }
    }
}

/// Model routing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Complexity score at or above which the capable model is chosen
    pub complexity_threshold: f64,
    /// Character count above which a message scores as long
    pub long_message_chars: usize,
    /// Word count above which a message scores as long
    pub long_message_words: usize,
    /// Question-mark count above which a message scores as multi-question
    pub many_questions: usize,
    /// Keywords indicating a complex query
    pub complexity_keywords: Vec<String>,
    /// Domain terms contributing a capped bonus to the score
    pub domain_terms: Vec<String>,
    /// Model used for routine queries
    pub cheap_model: String,
    /// Model used for complex queries (clinician and admin roles only)
    pub capable_model: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            complexity_threshold: 0.5,
            long_message_chars: 500,
            long_message_words: 100,
            many_questions: 2,
            complexity_keywords: vec![
                "diagnosis".to_string(),
                "treatment".to_string(),
                "differential".to_string(),
                "research".to_string(),
            ],
            domain_terms: vec![
                "symptom".to_string(),
                "patient".to_string(),
                "clinical".to_string(),
                "medical".to_string(),
                "therapy".to_string(),
                "medication".to_string(),
                "prescription".to_string(),
                "dosage".to_string(),
                "side effect".to_string(),
            ],
            cheap_model: "gpt-4o-mini".to_string(),
            capable_model: "gpt-4o".to_string(),
        }
    }
}

/// Response cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Seconds a cached response stays servable
    pub ttl_secs: i64,
    /// Maximum number of cached responses before eviction
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 86_400,
            capacity: 1_000,
        }
    }
}

/// Backend call timeout and retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Retries after the first failed attempt
    pub max_retries: u32,
    /// Base backoff delay in milliseconds (doubles per attempt, jittered)
    pub backoff_base_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            max_retries: 2,
            backoff_base_ms: 200,
        }
    }
}

/// Price per 1K tokens for one model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModelPricing {
    /// USD per 1K input tokens
    pub input_per_1k: f64,
    /// USD per 1K output tokens
    pub output_per_1k: f64,
}

/// Injected per-model pricing table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Model name to pricing entry
    pub models: BTreeMap<String, ModelPricing>,
}

impl PricingConfig {
    /// Look up pricing for a model.
    #[must_use]
    pub fn for_model(&self, model: &str) -> Option<ModelPricing> {
        self.models.get(model).copied()
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        let mut models = BTreeMap::new();
        models.insert(
            "gpt-4o-mini".to_string(),
            ModelPricing {
                input_per_1k: 0.000_15,
                output_per_1k: 0.000_60,
            },
        );
        models.insert(
            "gpt-4o".to_string(),
            ModelPricing {
                input_per_1k: 0.002_5,
                output_per_1k: 0.010,
            },
        );
        Self { models }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds_are_ordered() {
        let config = PipelineConfig::default();
        assert!(config.threat.block_threshold > config.threat.warning_threshold);
        assert!((config.threat.block_threshold - 0.70).abs() < f64::EPSILON);
        assert!((config.threat.warning_threshold - 0.55).abs() < f64::EPSILON);
    }

    #[test]
    fn test_default_role_limits() {
        let limits = LimitsConfig::default();
        assert_eq!(limits.for_role(UserRole::Patient).max_requests, 10);
        assert_eq!(limits.for_role(UserRole::Clinician).max_requests, 100);
        assert_eq!(limits.for_role(UserRole::Admin).max_requests, 1_000);
        assert!((limits.for_role(UserRole::Patient).max_cost_usd - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_pricing_lookup() {
        let pricing = PricingConfig::default();
        let entry = pricing.for_model("gpt-4o").expect("gpt-4o priced");
        assert!(entry.output_per_1k > entry.input_per_1k);
        assert!(pricing.for_model("unknown-model").is_none());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = PipelineConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize config");
        let parsed: PipelineConfig = toml::from_str(&toml_str).expect("parse config");
        assert!(
            (parsed.routing.complexity_threshold - config.routing.complexity_threshold).abs()
                < f64::EPSILON
        );
        assert_eq!(parsed.cache.capacity, config.cache.capacity);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml_str = r#"
            [threat]
            block_threshold = 0.9
        "#;
        let parsed: PipelineConfig = toml::from_str(toml_str).expect("parse partial config");
        assert!((parsed.threat.block_threshold - 0.9).abs() < f64::EPSILON);
        assert!((parsed.threat.warning_threshold - 0.55).abs() < f64::EPSILON);
        assert_eq!(parsed.cache.ttl_secs, 86_400);
    }

    #[test]
    fn test_env_override_applies() {
        std::env::set_var("CADUCEUS_COMPLEXITY_THRESHOLD", "0.75");
        let config = PipelineConfig::load_with_env().expect("load config");
        assert!((config.routing.complexity_threshold - 0.75).abs() < f64::EPSILON);
        std::env::remove_var("CADUCEUS_COMPLEXITY_THRESHOLD");
    }
}
