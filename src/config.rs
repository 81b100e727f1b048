//! Configuration
//!
//! Read once from the environment (and `.env` if present) at start-up.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
pub const DEFAULT_MAX_TOKENS: u32 = 1500;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 20;

/// Settings for the text-generation backend
#[derive(Clone, Debug)]
pub struct GeneratorConfig {
    /// Missing keys are reported when a suggestion is requested, not at start-up
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_ANTHROPIC_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub server_addr: String,
    pub generator: GeneratorConfig,
    pub fetch_timeout: Duration,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let api_key = env::var("ANTHROPIC_API_KEY").ok().filter(|k| !k.trim().is_empty());

        Self {
            database_path: database_path(),
            server_addr: env::var("CREAMERY_SERVER_ADDR")
                .unwrap_or_else(|_| DEFAULT_SERVER_ADDR.to_string()),
            generator: GeneratorConfig {
                api_key,
                base_url: env::var("ANTHROPIC_BASE_URL")
                    .unwrap_or_else(|_| DEFAULT_ANTHROPIC_BASE_URL.to_string()),
                model: env::var("CREAMERY_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
                max_tokens: parse_var("CREAMERY_MAX_TOKENS", DEFAULT_MAX_TOKENS),
                temperature: parse_var("CREAMERY_TEMPERATURE", DEFAULT_TEMPERATURE),
            },
            fetch_timeout: Duration::from_secs(parse_var(
                "CREAMERY_FETCH_TIMEOUT_SECS",
                DEFAULT_FETCH_TIMEOUT_SECS,
            )),
        }
    }
}

/// Read a variable, keeping the default when it is unset or unparsable
fn parse_var<T: FromStr + Copy + std::fmt::Display>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                warn!("Ignoring invalid {}={:?}, using {}", name, raw, default);
                default
            }
        },
        Err(_) => default,
    }
}

/// Get the database path from environment or use `<project>/data/creamery.db`
fn database_path() -> PathBuf {
    env::var("CREAMERY_DATABASE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let mut path = env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|p| p.to_path_buf()))
                .unwrap_or_else(|| PathBuf::from("."));

            // Go up from target/release or target/debug to project root
            if path.ends_with("release") || path.ends_with("debug") {
                if let Some(grandparent) = path.parent().and_then(|p| p.parent()) {
                    path = grandparent.to_path_buf();
                }
            }

            path.push("data");
            path.push("creamery.db");
            path
        })
}
