//! # Bot Configuration Module
//!
//! This module defines the runtime configuration of the diagnosis bot:
//! credentials, model locations, temp/log paths and outbound timeouts.
//! Values come from the environment (optionally seeded from a `.env` file).

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

// Constants for bot configuration
pub const DEFAULT_GEMINI_API_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";
pub const DEFAULT_MODEL_PATH: &str = "models/skin_cancer.onnx";
pub const DEFAULT_LABELS_PATH: &str = "models/config.json";
pub const DEFAULT_INPUT_SIZE: u32 = 224;
pub const DEFAULT_SEVERITY_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CLASSIFIER_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_DIAGNOSIS_LOG_PATH: &str = "diagnosis_logs.json";

/// Output format of the operator log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// Classifier model settings
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Path to the ONNX model file
    pub model_path: PathBuf,
    /// Path to `config.json` (with `id2label`) or a one-label-per-line file
    pub labels_path: PathBuf,
    /// Square input resolution expected by the model
    pub input_size: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            labels_path: PathBuf::from(DEFAULT_LABELS_PATH),
            input_size: DEFAULT_INPUT_SIZE,
        }
    }
}

/// Remote severity lookup settings
#[derive(Debug, Clone)]
pub struct SeverityConfig {
    /// API key; the lookup is disabled when unset
    pub api_key: Option<String>,
    /// `generateContent` endpoint
    pub api_url: String,
    /// Timeout for the whole HTTP exchange
    pub timeout: Duration,
}

impl Default for SeverityConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_GEMINI_API_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_SEVERITY_TIMEOUT_SECS),
        }
    }
}

/// Top-level configuration for the bot process
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub bot_token: String,
    pub model: ModelConfig,
    pub severity: SeverityConfig,
    /// Directory holding per-message temporary images
    pub temp_dir: PathBuf,
    /// Diagnosis history file; history is not written when unset
    pub diagnosis_log_path: Option<PathBuf>,
    /// Upper bound on a single inference run
    pub classifier_timeout: Duration,
    pub log_format: LogFormat,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            model: ModelConfig::default(),
            severity: SeverityConfig::default(),
            temp_dir: env::temp_dir(),
            diagnosis_log_path: None,
            classifier_timeout: Duration::from_secs(DEFAULT_CLASSIFIER_TIMEOUT_SECS),
            log_format: LogFormat::default(),
        }
    }
}

impl BotConfig {
    /// Build the configuration from environment variables.
    ///
    /// `TELEGRAM_BOT_TOKEN` is required; everything else falls back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let bot_token = non_empty("TELEGRAM_BOT_TOKEN").context("TELEGRAM_BOT_TOKEN must be set")?;

        let input_size = match non_empty("MODEL_INPUT_SIZE") {
            Some(v) => v.parse::<u32>().context("MODEL_INPUT_SIZE must be a positive integer")?,
            None => DEFAULT_INPUT_SIZE,
        };
        if input_size == 0 {
            anyhow::bail!("MODEL_INPUT_SIZE must be a positive integer");
        }

        let secs = |key: &str, default: u64| -> Result<Duration> {
            match non_empty(key) {
                Some(v) => Ok(Duration::from_secs(
                    v.parse::<u64>().with_context(|| format!("{key} must be a number of seconds"))?,
                )),
                None => Ok(Duration::from_secs(default)),
            }
        };

        Ok(Self {
            bot_token,
            model: ModelConfig {
                model_path: non_empty("MODEL_PATH").map(PathBuf::from).unwrap_or(defaults.model.model_path),
                labels_path: non_empty("LABELS_PATH").map(PathBuf::from).unwrap_or(defaults.model.labels_path),
                input_size,
            },
            severity: SeverityConfig {
                api_key: non_empty("GEMINI_API_KEY"),
                api_url: non_empty("GEMINI_API_URL").unwrap_or(defaults.severity.api_url),
                timeout: secs("SEVERITY_TIMEOUT_SECS", DEFAULT_SEVERITY_TIMEOUT_SECS)?,
            },
            temp_dir: non_empty("TEMP_DIR").map(PathBuf::from).unwrap_or(defaults.temp_dir),
            diagnosis_log_path: non_empty("DIAGNOSIS_LOG_PATH").map(PathBuf::from),
            classifier_timeout: secs("CLASSIFIER_TIMEOUT_SECS", DEFAULT_CLASSIFIER_TIMEOUT_SECS)?,
            log_format: non_empty("LOG_FORMAT").map(|v| LogFormat::parse(&v)).unwrap_or_default(),
        })
    }
}
