use anyhow::Result;
use clap::ArgMatches;
use clap::parser::ValueSource;
use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Complete configuration that merges CLI args, env vars, config files, and defaults
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FolioConfig {
    /// Build configuration
    #[serde(default)]
    pub build: BuildConfig,
    /// Site configuration (from folio-core)
    #[serde(flatten)]
    pub site: folio_core::config::Config,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Content root with one subdirectory per collection
    pub content: String,
    /// Output directory for generated site
    pub output: String,
    /// Theme (template) directory
    pub theme: String,
    /// Static assets copied to <output>/static
    pub static_dir: String,
    /// Configuration file path
    pub config: String,
    /// Host for dev server
    pub host: String,
    /// Port for dev server
    pub port: u16,
    /// Open browser automatically
    pub open: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            content: "./content".to_string(),
            output: "./output".to_string(),
            theme: "./theme".to_string(),
            static_dir: "./static".to_string(),
            config: "./folio.toml".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8000,
            open: false,
        }
    }
}

impl BuildConfig {
    pub fn content_dir(&self) -> PathBuf {
        PathBuf::from(&self.content)
    }

    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.output)
    }

    pub fn theme_dir(&self) -> PathBuf {
        PathBuf::from(&self.theme)
    }

    pub fn static_path(&self) -> PathBuf {
        PathBuf::from(&self.static_dir)
    }

    pub fn config_file(&self) -> PathBuf {
        PathBuf::from(&self.config)
    }
}

/// CLI argument id to config key. Only flags the user actually typed
/// override lower layers; clap defaults do not.
const CLI_KEYS: &[(&str, &str)] = &[
    ("content", "build.content"),
    ("output", "build.output"),
    ("theme", "build.theme"),
    ("static", "build.static_dir"),
    ("config", "build.config"),
    ("host", "build.host"),
    ("port", "build.port"),
];

fn typed_on_command_line(args: &ArgMatches, id: &str) -> bool {
    matches!(args.try_contains_id(id), Ok(true))
        && args.value_source(id) == Some(ValueSource::CommandLine)
}

impl FolioConfig {
    /// Load configuration with cascading precedence:
    /// 1. CLI arguments (highest priority)
    /// 2. Environment variables (FOLIO_*)
    /// 3. Configuration file
    /// 4. Defaults (lowest priority)
    pub fn load(args: &ArgMatches) -> Result<Self> {
        Self::load_with_env(args, None)
    }

    /// Like [`FolioConfig::load`], but reads `FOLIO_*` variables from `env`
    /// instead of the process environment when it is given.
    fn load_with_env(args: &ArgMatches, env: Option<config::Map<String, String>>) -> Result<Self> {
        let config_file = args
            .try_get_one::<String>("config")
            .ok()
            .flatten()
            .cloned()
            .unwrap_or_else(|| BuildConfig::default().config);

        let mut builder = ConfigBuilder::builder();

        // 1. Start with defaults
        builder = builder.add_source(config::Config::try_from(&Self::default())?);

        // 2. Add configuration file if it exists
        if Path::new(&config_file).exists() {
            builder = builder.add_source(File::with_name(&config_file));
        }

        // 3. Add environment variables with FOLIO_ prefix
        builder = builder.add_source(
            Environment::with_prefix("FOLIO")
                .prefix_separator("_")
                .separator("__") // Use double underscore for nested keys
                .try_parsing(true)
                .source(env),
        );

        // 4. Override with CLI arguments (highest priority)
        let mut cli_overrides: HashMap<String, String> = HashMap::new();
        for (id, key) in CLI_KEYS {
            if typed_on_command_line(args, id) {
                if let Some(value) = args.get_one::<String>(id) {
                    cli_overrides.insert(key.to_string(), value.clone());
                }
            }
        }
        if args.try_get_one::<bool>("open").ok().flatten() == Some(&true) {
            cli_overrides.insert("build.open".to_string(), "true".to_string());
        }

        for (key, value) in cli_overrides {
            builder = builder.set_override(key, value)?;
        }

        // Build and deserialize
        let config = builder.build()?;
        let folio_config: FolioConfig = config.try_deserialize()?;

        Ok(folio_config)
    }

    /// Get the build configuration
    pub fn build_config(&self) -> &BuildConfig {
        &self.build
    }
}
