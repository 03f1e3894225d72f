mod fetch;
mod model;
mod pipeline;
mod search;
mod server;
mod store;

pub use fetch::*;
pub use model::*;
pub use pipeline::*;
pub use search::*;
pub use server::*;
pub use store::*;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub message: String,
}

impl Config {
    /// Load from an optional TOML file, then apply environment overrides.
    /// Env wins over file, matching the teacher's config-loading precedence.
    pub fn load(path: Option<&std::path::Path>) -> crate::error::Result<Self> {
        let mut cfg = match path {
            Some(p) if p.exists() => {
                let text = std::fs::read_to_string(p)?;
                toml::from_str(&text)
                    .map_err(|e| crate::error::Error::Config(format!("parsing {}: {e}", p.display())))?
            }
            _ => Config::default(),
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("WSA_PORT") {
            if let Ok(p) = v.parse() {
                self.server.port = p;
            }
        }
        if let Ok(v) = std::env::var("WSA_HOST") {
            self.server.host = v;
        }
        if let Ok(v) = std::env::var("WSA_LOG_FILTER") {
            self.server.log_filter = v;
        }
        if let Ok(v) = std::env::var("DATABASE_URL") {
            self.store.database_url = Some(v);
        }
        if let Ok(v) = std::env::var("WSA_MODEL_BASE_URL") {
            self.model.base_url = v;
        }
        if let Ok(v) = std::env::var("WSA_MODEL_API_KEY") {
            self.model.api_key = Some(v);
        }
        if let Ok(v) = std::env::var("WSA_MODEL_DEFAULT") {
            self.model.default_model = v;
        }
        if let Ok(v) = std::env::var("WSA_SEARX_BASE_URL") {
            self.search.searx_base_url = v;
        }
        if let Ok(v) = std::env::var("WSA_SERPER_API_KEY") {
            self.search.serper_api_key = Some(v);
        }
    }

    /// Mirrors the teacher's `Config::validate()`: collects warnings and
    /// errors rather than failing fast on the first problem.
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        if self.store.database_url.is_none() {
            issues.push(ValidationIssue {
                severity: Severity::Error,
                message: "store.database_url (or $DATABASE_URL) is required".into(),
            });
        }
        if !self.model.is_configured() {
            issues.push(ValidationIssue {
                severity: Severity::Warning,
                message: "model.api_key is unset; runs will use the degenerate search-only path"
                    .into(),
            });
        }
        if self.search.provider == SearchProvider::Serper && self.search.serper_api_key.is_none() {
            issues.push(ValidationIssue {
                severity: Severity::Error,
                message: "search.provider = serper requires search.serper_api_key".into(),
            });
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_flags_missing_database_url() {
        let cfg = Config::default();
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|i| i.severity == Severity::Error && i.message.contains("database_url")));
    }

    #[test]
    fn configured_model_silences_warning() {
        let mut cfg = Config::default();
        cfg.model.api_key = Some("sk-test".into());
        let issues = cfg.validate();
        assert!(!issues
            .iter()
            .any(|i| i.message.contains("degenerate search-only path")));
    }
}
