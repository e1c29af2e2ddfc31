use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// API bearer token and the role it grants.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiToken {
    pub token: String,
    pub role: String,
}

/// [server] block from config.toml.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Bearer tokens accepted by the API. An empty list disables
    /// authentication (local development).
    #[serde(default)]
    pub tokens: Vec<ApiToken>,
}

fn default_bind() -> String {
    "127.0.0.1:8686".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: default_bind(),
            tokens: Vec::new(),
        }
    }
}

/// Top-level qbank config file structure.
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct QbankConfig {
    /// Database path override; defaults to ~/.qbank/qbank.db.
    pub database: Option<PathBuf>,
    #[serde(default)]
    pub server: ServerConfig,
}

impl QbankConfig {
    /// Load config from ~/.qbank/config.toml. Returns default if file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = config_path()?;
        if !path.exists() {
            return Ok(QbankConfig::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: QbankConfig =
            toml::from_str(&content).with_context(|| "Failed to parse config.toml")?;
        Ok(config)
    }

    /// Display config with tokens redacted.
    pub fn display_redacted(&self) -> String {
        let mut lines = Vec::new();
        if let Some(ref db) = self.database {
            lines.push(format!("database = \"{}\"", db.display()));
        }
        lines.push("[server]".to_string());
        lines.push(format!("  bind = \"{}\"", self.server.bind));
        if self.server.tokens.is_empty() {
            lines.push("  # no tokens configured (auth disabled)".to_string());
        }
        for t in &self.server.tokens {
            let redacted = if t.token.len() > 8 {
                format!("{}...{}", &t.token[..4], &t.token[t.token.len() - 4..])
            } else {
                "****".to_string()
            };
            lines.push(format!(
                "  token = \"{}\" (role: {})",
                redacted, t.role
            ));
        }
        lines.join("\n")
    }
}

/// Path to the config file: ~/.qbank/config.toml
pub fn config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".qbank").join("config.toml"))
}

/// Default config template content.
pub fn default_config_template() -> &'static str {
    r#"# ~/.qbank/config.toml

# database = "/path/to/qbank.db"

[server]
bind = "127.0.0.1:8686"

# Bearer tokens accepted by the HTTP API. Roles: admin, content_manager,
# viewer. With no tokens configured the API runs unauthenticated.
# [[server.tokens]]
# token = "generate-a-long-random-string"
# role = "admin"
"#
}

/// Create the default config file if it doesn't already exist.
pub fn init_config() -> Result<bool> {
    let path = config_path()?;
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, default_config_template())?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let cfg: QbankConfig = toml::from_str(
            r#"
            database = "/tmp/qbank.db"
            [server]
            bind = "0.0.0.0:9000"
            [[server.tokens]]
            token = "abcd1234efgh5678"
            role = "admin"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.server.bind, "0.0.0.0:9000");
        assert_eq!(cfg.server.tokens.len(), 1);
        assert_eq!(cfg.server.tokens[0].role, "admin");
    }

    #[test]
    fn empty_config_uses_defaults() {
        let cfg: QbankConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.server.bind, "127.0.0.1:8686");
        assert!(cfg.server.tokens.is_empty());
        assert!(cfg.database.is_none());
    }

    #[test]
    fn redacted_display_hides_token_body() {
        let cfg: QbankConfig = toml::from_str(
            r#"
            [[server.tokens]]
            token = "abcd1234efgh5678"
            role = "viewer"
            "#,
        )
        .unwrap();
        let shown = cfg.display_redacted();
        assert!(!shown.contains("abcd1234efgh5678"));
        assert!(shown.contains("abcd...5678"));
    }
}
