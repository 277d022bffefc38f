use super::models::Config;
use config::{ConfigError, Environment, File, FileFormat};
use std::env;
use std::path::{Path, PathBuf};

const CONFIG_ENV_VAR: &str = "PODIUM_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/layout.toml";
const ENV_PREFIX: &str = "PODIUM";
const ENV_SEPARATOR: &str = "__";

/// Path of the config file: `PODIUM_CONFIG` or the default location
pub fn default_path() -> PathBuf {
    env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Load configuration with priority (lowest first):
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if it exists)
/// 3. Variables from a `.env` file (via dotenvy)
/// 4. System environment variables
pub fn load(config_path: Option<PathBuf>) -> Result<Config, ConfigError> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    load_from_sources(&config_path.unwrap_or_else(default_path))
}

/// Load configuration from a specific file plus the environment
pub fn load_from_sources(config_path: &Path) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!(path = %config_path.display(), "Loading configuration");
        builder = builder.add_source(
            File::from(config_path)
                .format(FileFormat::Toml)
                .required(false),
        );
    } else {
        tracing::warn!(
            path = %config_path.display(),
            "Configuration file not found, using defaults and environment overrides"
        );
    }

    // PODIUM__PROXY__TIMEOUT_MS -> proxy.timeout_ms
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}
