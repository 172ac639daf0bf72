//! Orchestrator configuration loader.
//!
//! Reads `config.toml` from the data directory and deserializes it into
//! [`OrchestratorConfig`]. Falls back to defaults when the file is missing
//! or malformed; a bad config file must never stop the orchestrator from
//! starting.

use std::path::Path;

use orchestry_types::config::OrchestratorConfig;

/// Load orchestrator configuration from `{data_dir}/config.toml`.
///
/// - Missing file: returns [`OrchestratorConfig::default()`].
/// - Unreadable or unparseable file: logs a warning and returns the default.
/// - Partial file: unspecified fields take their defaults.
pub async fn load_config(data_dir: &Path) -> OrchestratorConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return OrchestratorConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return OrchestratorConfig::default();
        }
    };

    match toml::from_str::<OrchestratorConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            OrchestratorConfig::default()
        }
    }
}
