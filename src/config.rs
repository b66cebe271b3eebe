// ⚙️ Configuration - CLI arg > environment > TOML file > defaults

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const ENV_DB: &str = "ORG_LEDGER_DB";
pub const ENV_ADDR: &str = "ORG_LEDGER_ADDR";
pub const CONFIG_FILE: &str = "org-ledger.toml";

const DEFAULT_DB: &str = "org-ledger.db";
const DEFAULT_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_RANK_DEPTH: usize = 5;

/// Resolved runtime configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    pub db_path: PathBuf,
    pub bind_addr: String,
    /// How many entries the top/worst performance lists carry
    pub rank_depth: usize,
}

/// Optional overrides read from `org-ledger.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    pub db_path: Option<String>,
    pub bind_addr: Option<String>,
    pub rank_depth: Option<usize>,
}

impl LedgerConfig {
    /// Resolve configuration, highest priority first:
    /// 1. command-line argument (db path only)
    /// 2. ORG_LEDGER_* environment variables
    /// 3. org-ledger.toml in the working directory
    /// 4. compiled defaults
    pub fn resolve(cli_db: Option<&str>) -> Result<LedgerConfig> {
        let file = load_file_config(Path::new(CONFIG_FILE))?;
        Ok(Self::layer(
            cli_db,
            std::env::var(ENV_DB).ok(),
            std::env::var(ENV_ADDR).ok(),
            file,
        ))
    }

    fn layer(
        cli_db: Option<&str>,
        env_db: Option<String>,
        env_addr: Option<String>,
        file: Option<FileConfig>,
    ) -> LedgerConfig {
        let file = file.unwrap_or_default();

        let db_path = cli_db
            .map(String::from)
            .or(env_db)
            .or(file.db_path)
            .unwrap_or_else(|| DEFAULT_DB.to_string());

        let bind_addr = env_addr
            .or(file.bind_addr)
            .unwrap_or_else(|| DEFAULT_ADDR.to_string());

        LedgerConfig {
            db_path: PathBuf::from(db_path),
            bind_addr,
            rank_depth: file.rank_depth.unwrap_or(DEFAULT_RANK_DEPTH).max(1),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self::layer(None, None, None, None)
    }
}

/// A missing file is fine (None); a malformed one is an error worth
/// surfacing rather than silently ignoring.
fn load_file_config(path: &Path) -> Result<Option<FileConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    let config =
        toml::from_str(&content).with_context(|| format!("Failed to parse {:?}", path))?;
    Ok(Some(config))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LedgerConfig::default();
        assert_eq!(config.db_path, PathBuf::from("org-ledger.db"));
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.rank_depth, 5);
    }

    #[test]
    fn test_cli_beats_env_beats_file() {
        let file = FileConfig {
            db_path: Some("file.db".to_string()),
            bind_addr: Some("127.0.0.1:9000".to_string()),
            rank_depth: Some(3),
        };

        let config = LedgerConfig::layer(
            Some("cli.db"),
            Some("env.db".to_string()),
            None,
            Some(file.clone()),
        );
        assert_eq!(config.db_path, PathBuf::from("cli.db"));
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.rank_depth, 3);

        let config = LedgerConfig::layer(None, Some("env.db".to_string()), None, Some(file));
        assert_eq!(config.db_path, PathBuf::from("env.db"));
    }

    #[test]
    fn test_file_config_parses() {
        let parsed: FileConfig =
            toml::from_str("db_path = \"x.db\"\nrank_depth = 7\n").unwrap();
        assert_eq!(parsed.db_path.as_deref(), Some("x.db"));
        assert_eq!(parsed.rank_depth, Some(7));
        assert!(parsed.bind_addr.is_none());
    }

    #[test]
    fn test_rank_depth_floor_is_one() {
        let file = FileConfig {
            rank_depth: Some(0),
            ..Default::default()
        };
        let config = LedgerConfig::layer(None, None, None, Some(file));
        assert_eq!(config.rank_depth, 1);
    }
}
