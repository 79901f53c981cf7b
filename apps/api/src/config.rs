use std::fmt::Display;
use std::str::FromStr;

use anyhow::{bail, Context, Result};

use crate::llm_client::DEFAULT_MODEL;
use crate::pipeline::capability::{Capability, CapabilitySet};
use crate::pipeline::topology::Topology;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    /// Candidates evaluated in parallel per evaluate request.
    pub evaluation_concurrency: usize,
    pub pipeline: PipelineConfig,
}

/// Everything the evaluator needs to build its role graph and run it.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub model: String,
    pub turn_budget: u32,
    pub topology: Topology,
    pub enable_web_search: bool,
    pub web_search_max_uses: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            turn_budget: 10,
            topology: Topology::Chain,
            enable_web_search: true,
            web_search_max_uses: 3,
        }
    }
}

impl PipelineConfig {
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            model: lookup("LLM_MODEL").unwrap_or(defaults.model),
            turn_budget: parse_or(lookup("TURN_BUDGET"), "TURN_BUDGET", defaults.turn_budget)?,
            topology: parse_or(
                lookup("PIPELINE_TOPOLOGY"),
                "PIPELINE_TOPOLOGY",
                defaults.topology,
            )?,
            enable_web_search: parse_or(
                lookup("ENABLE_WEB_SEARCH"),
                "ENABLE_WEB_SEARCH",
                defaults.enable_web_search,
            )?,
            web_search_max_uses: parse_or(
                lookup("WEB_SEARCH_MAX_USES"),
                "WEB_SEARCH_MAX_USES",
                defaults.web_search_max_uses,
            )?,
        };
        if config.turn_budget == 0 {
            bail!("TURN_BUDGET must be at least 1");
        }
        Ok(config)
    }

    /// Capabilities bound for this deployment; roles requesting anything else run without it.
    pub fn capabilities(&self) -> CapabilitySet {
        let set = CapabilitySet::new();
        if self.enable_web_search {
            set.with(Capability::web_search(self.web_search_max_uses))
        } else {
            set
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let evaluation_concurrency: usize = parse_or(
            std::env::var("EVALUATION_CONCURRENCY").ok(),
            "EVALUATION_CONCURRENCY",
            4,
        )?;

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: parse_or(std::env::var("PORT").ok(), "PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            evaluation_concurrency: evaluation_concurrency.max(1),
            pipeline: PipelineConfig::from_lookup(|key| std::env::var(key).ok())?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{key} has invalid value '{raw}': {e}")),
    }
}
