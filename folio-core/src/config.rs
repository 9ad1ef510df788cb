use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::planner::{DEFAULT_HOME_RECENT, PlanOptions};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Parsing(#[from] toml::de::Error),
}

/// Site-wide settings, usually read from `folio.toml`.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub site: SiteConfig,
    pub home: HomeConfig,
}

impl Config {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&data)?;

        Ok(config)
    }

    pub fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            home_recent: self.home.recent,
        }
    }
}

/// Exposed to every template as `site`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SiteConfig {
    pub title: String,
    pub description: String,
    pub author: String,
    pub base_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "Folio".into(),
            description: "Notes and posts, with math that renders".into(),
            author: String::new(),
            base_url: String::new(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct HomeConfig {
    /// Newest documents per collection shown on the home page
    pub recent: usize,
}

impl Default for HomeConfig {
    fn default() -> Self {
        Self {
            recent: DEFAULT_HOME_RECENT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("folio.toml");
        std::fs::write(&path, "[site]\ntitle = \"Lab notes\"\n\n[build]\noutput = \"docs\"\n").unwrap();

        let config = Config::read(&path).unwrap();
        assert_eq!(config.site.title, "Lab notes");
        assert_eq!(config.site.base_url, "");
        assert_eq!(config.home.recent, DEFAULT_HOME_RECENT);
        assert_eq!(config.plan_options(), PlanOptions::default());
    }

    #[test]
    fn test_home_recent() {
        let config: Config = toml::from_str("[home]\nrecent = 3\n").unwrap();
        assert_eq!(config.plan_options().home_recent, 3);
    }

    #[test]
    fn test_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("folio.toml");
        std::fs::write(&path, "[site\n").unwrap();

        assert!(matches!(Config::read(&path), Err(ConfigError::Parsing(_))));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Config::read("/nowhere/folio.toml"),
            Err(ConfigError::Io(_))
        ));
    }
}
