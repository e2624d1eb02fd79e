use std::net::SocketAddr;

use crate::error::AppError;
use crate::resolver::{ResolverPolicy, DEFAULT_CATEGORY_TITLE};

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_MODEL: &str = "xiaomi/mimo-v2-flash:free";

/// Service configuration loaded from environment variables.
///
/// The classifier's HTTP client has its own settings (`OPENAI_*`), see
/// `journal_common::openai::OpenAiClientConfig`.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to.
    pub listen_addr: SocketAddr,
    /// Chat model used for classification.
    pub model: String,
    /// Redis connection URL. `None` keeps categories in process memory.
    pub redis_url: Option<String>,
    /// Create a category from a hallucinated id instead of failing the request.
    pub recovery_creation: bool,
    /// Title used when the classifier proposes none.
    pub default_title: String,
    /// Requests per second admitted by the rate limiter; 0 disables it.
    pub rate_limit_rps: u32,
}

impl Config {
    /// Optional:
    /// - `CATEGORIZER_LISTEN_ADDR` (default: "0.0.0.0:8080")
    /// - `CLASSIFIER_MODEL` (default: "xiaomi/mimo-v2-flash:free")
    /// - `REDIS_URL`
    /// - `RECOVERY_CREATION` (default: true)
    /// - `DEFAULT_CATEGORY_TITLE` (default: "General")
    /// - `RATE_LIMIT_RPS` (default: 0, disabled)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let listen_addr = get("CATEGORIZER_LISTEN_ADDR")
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr = listen_addr.parse::<SocketAddr>().map_err(|e| {
            AppError::Config(format!(
                "CATEGORIZER_LISTEN_ADDR is not a socket address ({listen_addr}): {e}"
            ))
        })?;

        let recovery_creation = match get("RECOVERY_CREATION") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                AppError::Config(format!("RECOVERY_CREATION must be true or false, got {raw:?}"))
            })?,
            None => true,
        };

        let rate_limit_rps = match get("RATE_LIMIT_RPS") {
            Some(raw) => raw.parse::<u32>().map_err(|_| {
                AppError::Config(format!("RATE_LIMIT_RPS must be a non-negative integer, got {raw:?}"))
            })?,
            None => 0,
        };

        Ok(Self {
            listen_addr,
            model: get("CLASSIFIER_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            redis_url: get("REDIS_URL"),
            recovery_creation,
            default_title: get("DEFAULT_CATEGORY_TITLE")
                .unwrap_or_else(|| DEFAULT_CATEGORY_TITLE.to_string()),
            rate_limit_rps,
        })
    }

    pub fn resolver_policy(&self) -> ResolverPolicy {
        ResolverPolicy {
            recovery_creation: self.recovery_creation,
            default_title: self.default_title.clone(),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
