//! Main settings module

use std::collections::HashMap;
use std::path::Path;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Thread reconstruction
    #[serde(default)]
    pub threading: ThreadingConfig,

    /// Tagging stage
    #[serde(default)]
    pub tagging: TaggingConfig,

    /// Decision engine
    #[serde(default)]
    pub decision: DecisionConfig,

    /// Evaluation stage
    #[serde(default)]
    pub evaluation: EvaluationConfig,

    /// Capability backend (classification/generation/judgment)
    #[serde(default)]
    pub capability: CapabilityConfig,

    /// Concurrent batch runner
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Stage artifact storage
    #[serde(default)]
    pub artifacts: ArtifactConfig,
}

/// Thread reconstruction knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadingConfig {
    /// Fallback-heuristic window: two rootless messages between the same
    /// participants belong to one conversation when the gap stays within
    /// this many hours.
    #[serde(default = "default_link_window_hours")]
    pub link_window_hours: u32,
}

fn default_link_window_hours() -> u32 {
    24
}

impl Default for ThreadingConfig {
    fn default() -> Self {
        Self {
            link_window_hours: default_link_window_hours(),
        }
    }
}

/// Tagging stage knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaggingConfig {
    /// Labels below this confidence are marked uncertain
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// Run the personality classifier and produce personality-aware
    /// recommendations alongside the baseline
    #[serde(default)]
    pub personality_enabled: bool,
}

fn default_confidence_threshold() -> f64 {
    0.5
}

impl Default for TaggingConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            personality_enabled: false,
        }
    }
}

/// Objective-function weights. Normalized at use; the defaults sum to 1.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DecisionWeights {
    #[serde(default = "default_w_severity")]
    pub severity: f64,
    #[serde(default = "default_w_urgency")]
    pub urgency: f64,
    #[serde(default = "default_w_elapsed")]
    pub elapsed: f64,
    #[serde(default = "default_w_history")]
    pub history: f64,
    #[serde(default = "default_w_personality")]
    pub personality: f64,
}

fn default_w_severity() -> f64 {
    0.30
}
fn default_w_urgency() -> f64 {
    0.30
}
fn default_w_elapsed() -> f64 {
    0.15
}
fn default_w_history() -> f64 {
    0.15
}
fn default_w_personality() -> f64 {
    0.10
}

impl Default for DecisionWeights {
    fn default() -> Self {
        Self {
            severity: default_w_severity(),
            urgency: default_w_urgency(),
            elapsed: default_w_elapsed(),
            history: default_w_history(),
            personality: default_w_personality(),
        }
    }
}

/// Decision engine knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionConfig {
    #[serde(default)]
    pub weights: DecisionWeights,

    /// Scores within epsilon of the leader tie-break on channel priority
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,

    /// Delay applied when the customer wrote within this window, to avoid
    /// appearing automated mid-exchange
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: u32,

    /// Historical per-channel resolution rates in [0,1], keyed by channel
    /// name (phone_call, email_reply, social_reply). Channels absent from
    /// the table score a neutral 0.5.
    #[serde(default)]
    pub channel_stats: HashMap<String, f64>,
}

fn default_epsilon() -> f64 {
    0.02
}

fn default_cooldown_minutes() -> u32 {
    60
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            weights: DecisionWeights::default(),
            epsilon: default_epsilon(),
            cooldown_minutes: default_cooldown_minutes(),
            channel_stats: HashMap::new(),
        }
    }
}

/// Evaluation stage knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Independent judge calls averaged per recommendation
    #[serde(default = "default_judge_samples")]
    pub judge_samples: u32,
}

fn default_judge_samples() -> u32 {
    1
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            judge_samples: default_judge_samples(),
        }
    }
}

/// Capability backend connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityConfig {
    /// OpenAI-compatible chat-completions endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// API key; usually injected via SUPPORT_NBA_CAPABILITY__API_KEY
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Bounded retry attempts on transient failure
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff, doubled per retry
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

fn default_endpoint() -> String {
    "http://localhost:11434/v1".to_string()
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    200
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

/// Concurrent runner bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Concurrent capability calls in flight; the capability layer is the
    /// scarce resource, not CPU
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

fn default_max_in_flight() -> usize {
    4
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
        }
    }
}

/// Where stage artifacts live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactConfig {
    #[serde(default = "default_artifact_dir")]
    pub dir: String,
}

fn default_artifact_dir() -> String {
    "data".to_string()
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            dir: default_artifact_dir(),
        }
    }
}

impl Settings {
    /// Validate settings, rejecting values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threading.link_window_hours == 0 {
            return Err(ConfigError::InvalidValue {
                field: "threading.link_window_hours".to_string(),
                message: "must be at least 1 hour".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.tagging.confidence_threshold) {
            return Err(ConfigError::InvalidValue {
                field: "tagging.confidence_threshold".to_string(),
                message: "must be within [0, 1]".to_string(),
            });
        }
        let w = &self.decision.weights;
        for (field, value) in [
            ("decision.weights.severity", w.severity),
            ("decision.weights.urgency", w.urgency),
            ("decision.weights.elapsed", w.elapsed),
            ("decision.weights.history", w.history),
            ("decision.weights.personality", w.personality),
        ] {
            if value < 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: "weights must be non-negative".to_string(),
                });
            }
        }
        if w.severity + w.urgency + w.elapsed + w.history + w.personality <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "decision.weights".to_string(),
                message: "at least one weight must be positive".to_string(),
            });
        }
        if self.decision.epsilon < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "decision.epsilon".to_string(),
                message: "must be non-negative".to_string(),
            });
        }
        for (channel, rate) in &self.decision.channel_stats {
            if !matches!(
                channel.as_str(),
                "phone_call" | "email_reply" | "social_reply"
            ) {
                return Err(ConfigError::InvalidValue {
                    field: "decision.channel_stats".to_string(),
                    message: format!("unknown channel {channel:?}"),
                });
            }
            if !(0.0..=1.0).contains(rate) {
                return Err(ConfigError::InvalidValue {
                    field: format!("decision.channel_stats.{channel}"),
                    message: "must be within [0, 1]".to_string(),
                });
            }
        }
        if self.evaluation.judge_samples == 0 {
            return Err(ConfigError::InvalidValue {
                field: "evaluation.judge_samples".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.runner.max_in_flight == 0 {
            return Err(ConfigError::InvalidValue {
                field: "runner.max_in_flight".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.capability.max_retries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "capability.max_retries".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Load settings with precedence: env vars > optional TOML file > defaults.
///
/// `path` is the config file to read; a missing file is fine, defaults and
/// environment variables still apply.
pub fn load_settings(path: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    if let Some(path) = path {
        if Path::new(path).exists() {
            builder = builder.add_source(File::with_name(path));
        } else {
            tracing::warn!(path = %path, "Config file not found, using defaults");
        }
    }

    let config = builder
        .add_source(
            Environment::with_prefix("SUPPORT_NBA")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let settings: Settings = config.try_deserialize()?;
    settings.validate()?;
    Ok(settings)
}
