use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::{collections::HashMap, net::SocketAddr, path::PathBuf, str::FromStr};
use tokio::fs;
use tracing::debug;
use tracing_subscriber::filter::LevelFilter;

// --- Logging Configuration ---

#[derive(Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoggingFormat {
    #[default]
    Text,
    Json,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoggingOutput {
    #[default]
    Stdout,
    File {
        path: PathBuf,
    },
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LoggingFormat,
    #[serde(default)]
    pub output: LoggingOutput,
}

// --- Top-Level Configuration ---

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct LanternConfig {
    #[serde(default)]
    pub server: HashMap<String, ServerConfig>,
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

// --- Server Block Configuration ---

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub handler: HandlerConfig,
}

// --- Handler Configuration ---

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
#[serde(deny_unknown_fields)]
pub enum HandlerConfig {
    Drive(HandlerDriveConfig),
    HealthCheck(HandlerHealthCheckConfig),
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct HandlerDriveConfig {
    /// Directory whose immediate subdirectories seed the drive store;
    /// each subdirectory name becomes a drive key.
    #[serde(default)]
    pub drives_root: Option<PathBuf>,
    /// Forwarded to the drive store: resolving an unknown key creates a
    /// fresh empty drive instead of answering 404.
    #[serde(default)]
    pub writable: Option<bool>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct HandlerHealthCheckConfig {}

// --- Loading and Validation ---

/// Loads and parses the configuration from a TOML file, then validates it.
///
/// Returns `Ok(LanternConfig)` if the file was read, parsed, and validated
/// successfully.
pub async fn load_and_validate_config(path: &str) -> Result<LanternConfig> {
    let config_content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read configuration file at '{}'", path))?;

    debug!("Read config file content from {}", path);

    let raw_config: LanternConfig = toml::from_str(&config_content)
        .with_context(|| format!("Failed to parse TOML configuration from '{}'", path))?;

    debug!("Parsed TOML configuration successfully.");

    validate_config(&raw_config).context("Configuration validation failed")?;

    debug!("Configuration validation passed.");

    Ok(raw_config)
}

/// Performs validation checks on the parsed LanternConfig.
pub fn validate_config(config: &LanternConfig) -> Result<()> {
    if config.server.is_empty() && config.logging.is_none() {
        bail!("Configuration must define at least one [server] block or a [logging] block.");
    }

    // --- Logging Validation ---
    if let Some(log_config) = &config.logging {
        if LevelFilter::from_str(&log_config.level.to_uppercase()).is_err() {
            bail!(
                "Invalid log level '{}' in [logging] configuration. Use one of: trace, debug, info, warn, error.",
                log_config.level
            );
        }
        if let LoggingOutput::File { path } = &log_config.output {
            if path.as_os_str().is_empty() {
                bail!("Logging output type 'file' requires a non-empty 'path'.");
            }
        }
        debug!("Logging config validated.");
    }

    // --- Server Validation ---
    for (name, server_config) in &config.server {
        debug!(server_name = %name, "Validating server config");

        match &server_config.handler {
            HandlerConfig::Drive(drive_config) => {
                if let Some(drives_root) = &drive_config.drives_root {
                    if drives_root.as_os_str().is_empty() {
                        bail!(
                            "Server '{}': Handler type 'drive' requires a non-empty 'drives_root' when set.",
                            name
                        );
                    }
                } else if !drive_config.writable.unwrap_or(false) {
                    // With nothing seeded and nothing creatable, every
                    // request would 404.
                    bail!(
                        "Server '{}': Handler type 'drive' requires 'drives_root' or 'writable = true'.",
                        name
                    );
                }
                debug!(server_name = %name, "Drive handler config validated.");
            }
            HandlerConfig::HealthCheck(_) => {
                // no specific validation needed for health check handler
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<LanternConfig> {
        let config: LanternConfig = toml::from_str(content)?;
        validate_config(&config)?;
        Ok(config)
    }

    #[test]
    fn minimal_drive_server_parses() {
        let config = parse(
            r#"
[server.gateway]
listen_addr = "127.0.0.1:8080"

[server.gateway.handler]
type = "drive"
drives_root = "./drives"
"#,
        )
        .unwrap();
        assert_eq!(config.server.len(), 1);
    }

    #[test]
    fn writable_store_needs_no_drives_root() {
        parse(
            r#"
[server.gateway]
listen_addr = "127.0.0.1:8080"

[server.gateway.handler]
type = "drive"
writable = true
"#,
        )
        .unwrap();
    }

    #[test]
    fn drive_handler_without_root_or_writable_is_rejected() {
        let err = parse(
            r#"
[server.gateway]
listen_addr = "127.0.0.1:8080"

[server.gateway.handler]
type = "drive"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("drives_root"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(
            parse(
                r#"
[server.gateway]
listen_addr = "127.0.0.1:8080"
surprise = true

[server.gateway.handler]
type = "drive"
writable = true
"#,
            )
            .is_err()
        );
    }

    #[test]
    fn bad_log_level_is_rejected() {
        let err = parse(
            r#"
[logging]
level = "loud"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Invalid log level"));
    }
}
