//! Configuration module for the stale-order sweeper.
//!
//! This module provides the service configuration: which settings backend and
//! order repository to use, how often to sweep, how to page through orders
//! and whether to expose the HTTP API. Configuration is read from TOML files
//! and validated before any component is built.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files:
//! - Use `include = ["file1.toml", "file2.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)
//!
//! ## Environment Variables
//!
//! Values may reference `${VAR}` or `${VAR:-default}`; references are resolved
//! before parsing.

#[cfg(any(test, feature = "testing"))]
pub mod builders;
mod loader;

pub use loader::ConfigLoader;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message only; the full error echoes the input.
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the sweeper service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Identity of this sweeper instance.
	pub sweeper: SweeperConfig,
	/// When sweeps run.
	#[serde(default)]
	pub schedule: ScheduleConfig,
	/// How a sweep pages through orders.
	#[serde(default)]
	pub sweep: SweepConfig,
	/// Storage backend holding the sweep settings.
	pub settings: SettingsConfig,
	/// Order repository the sweep reads from and cancels through.
	pub orders: OrdersConfig,
	/// Configuration for the HTTP API server.
	pub api: Option<ApiConfig>,
}

/// Configuration specific to the sweeper instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SweeperConfig {
	/// Unique identifier for this sweeper instance, used in logs.
	pub id: String,
}

/// Periodic trigger configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScheduleConfig {
	/// Seconds between two scheduled sweeps. Defaults to one hour.
	#[serde(default = "default_interval_seconds")]
	pub interval_seconds: u64,
	/// Seconds to wait before the first scheduled sweep. Defaults to five minutes.
	#[serde(default = "default_initial_delay_seconds")]
	pub initial_delay_seconds: u64,
}

impl Default for ScheduleConfig {
	fn default() -> Self {
		Self {
			interval_seconds: default_interval_seconds(),
			initial_delay_seconds: default_initial_delay_seconds(),
		}
	}
}

fn default_interval_seconds() -> u64 {
	3600
}

fn default_initial_delay_seconds() -> u64 {
	300
}

/// Paging and retry behaviour of a sweep.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SweepConfig {
	/// Orders requested per page.
	#[serde(default = "default_page_size")]
	pub page_size: usize,
	/// Attempts per page before a status is abandoned.
	#[serde(default = "default_page_fetch_attempts")]
	pub page_fetch_attempts: u32,
	/// Delay before the first retry; doubles on each further attempt.
	#[serde(default = "default_retry_base_delay_ms")]
	pub retry_base_delay_ms: u64,
}

impl Default for SweepConfig {
	fn default() -> Self {
		Self {
			page_size: default_page_size(),
			page_fetch_attempts: default_page_fetch_attempts(),
			retry_base_delay_ms: default_retry_base_delay_ms(),
		}
	}
}

fn default_page_size() -> usize {
	200
}

fn default_page_fetch_attempts() -> u32 {
	3
}

fn default_retry_base_delay_ms() -> u64 {
	500
}

/// Configuration for the settings storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SettingsConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for the order repository.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrdersConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of repository implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Whether the API server is enabled.
	#[serde(default)]
	pub enabled: bool,
	/// Host address to bind the server to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to bind the server to.
	#[serde(default = "default_api_port")]
	pub port: u16,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

/// Resolves environment variables in a string.
///
/// Replaces `${VAR_NAME}` with the value of the environment variable and
/// supports defaults with `${VAR_NAME:-default_value}`.
///
/// Input strings are limited to 1MB.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last_end = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let var_name = var_name.as_str();

		let value = match std::env::var(var_name) {
			Ok(v) => v,
			Err(_) => match cap.get(2) {
				Some(default) => default.as_str().to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name
					)))
				},
			},
		};

		result.push_str(&input[last_end..full_match.start()]);
		result.push_str(&value);
		last_end = full_match.end();
	}
	result.push_str(&input[last_end..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, following include directives.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf
			.parent()
			.filter(|p| !p.as_os_str().is_empty())
			.unwrap_or_else(|| Path::new("."));

		let mut loader = ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Validates the configuration.
	///
	/// Checks identity, schedule and paging bounds, and that each primary
	/// implementation has a matching implementation table. The contents of
	/// implementation tables are validated by the components themselves.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.sweeper.id.is_empty() {
			return Err(ConfigError::Validation("Sweeper ID cannot be empty".into()));
		}

		if !(60..=86400).contains(&self.schedule.interval_seconds) {
			return Err(ConfigError::Validation(format!(
				"schedule.interval_seconds must be between 60 and 86400, got {}",
				self.schedule.interval_seconds
			)));
		}
		if self.schedule.initial_delay_seconds > 86400 {
			return Err(ConfigError::Validation(
				"schedule.initial_delay_seconds cannot exceed 86400 (24 hours)".into(),
			));
		}

		if !(1..=1000).contains(&self.sweep.page_size) {
			return Err(ConfigError::Validation(format!(
				"sweep.page_size must be between 1 and 1000, got {}",
				self.sweep.page_size
			)));
		}
		if !(1..=10).contains(&self.sweep.page_fetch_attempts) {
			return Err(ConfigError::Validation(format!(
				"sweep.page_fetch_attempts must be between 1 and 10, got {}",
				self.sweep.page_fetch_attempts
			)));
		}
		if self.sweep.retry_base_delay_ms > 60_000 {
			return Err(ConfigError::Validation(
				"sweep.retry_base_delay_ms cannot exceed 60000".into(),
			));
		}

		validate_primary(
			"settings",
			&self.settings.primary,
			&self.settings.implementations,
		)?;
		validate_primary("orders", &self.orders.primary, &self.orders.implementations)?;

		if let Some(ref api) = self.api {
			if api.enabled && api.host.is_empty() {
				return Err(ConfigError::Validation(
					"API host cannot be empty when the API is enabled".into(),
				));
			}
		}

		Ok(())
	}
}

fn validate_primary(
	section: &str,
	primary: &str,
	implementations: &HashMap<String, toml::Value>,
) -> Result<(), ConfigError> {
	if implementations.is_empty() {
		return Err(ConfigError::Validation(format!(
			"At least one {} implementation must be configured",
			section
		)));
	}
	if primary.is_empty() {
		return Err(ConfigError::Validation(format!(
			"{} primary implementation cannot be empty",
			section
		)));
	}
	if !implementations.contains_key(primary) {
		return Err(ConfigError::Validation(format!(
			"Primary {} implementation '{}' not found in implementations",
			section, primary
		)));
	}
	Ok(())
}

/// Parses TOML, resolving environment variables first and validating after.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const MINIMAL: &str = r#"
[sweeper]
id = "sweeper-test"

[settings]
primary = "memory"
[settings.implementations.memory]

[orders]
primary = "memory"
[orders.implementations.memory]
"#;

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("SWEEPER_TEST_HOST", "localhost");
		std::env::set_var("SWEEPER_TEST_PORT", "5432");

		let input = "host = \"${SWEEPER_TEST_HOST}:${SWEEPER_TEST_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "host = \"localhost:5432\"");

		std::env::remove_var("SWEEPER_TEST_HOST");
		std::env::remove_var("SWEEPER_TEST_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "value = \"${SWEEPER_MISSING_VAR:-default_value}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "value = \"default_value\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let input = "value = \"${SWEEPER_MISSING_VAR}\"";
		let result = resolve_env_vars(input);
		assert!(result.is_err());
		assert!(result.unwrap_err().to_string().contains("SWEEPER_MISSING_VAR"));
	}

	#[test]
	fn test_minimal_config_uses_defaults() {
		let config: Config = MINIMAL.parse().unwrap();
		assert_eq!(config.sweeper.id, "sweeper-test");
		assert_eq!(config.schedule.interval_seconds, 3600);
		assert_eq!(config.schedule.initial_delay_seconds, 300);
		assert_eq!(config.sweep.page_size, 200);
		assert_eq!(config.sweep.page_fetch_attempts, 3);
		assert_eq!(config.sweep.retry_base_delay_ms, 500);
		assert!(config.api.is_none());
	}

	#[test]
	fn test_config_with_env_vars() {
		std::env::set_var("SWEEPER_TEST_ID", "from-env");
		let config_str = MINIMAL.replace("sweeper-test", "${SWEEPER_TEST_ID}");
		let config: Config = config_str.parse().unwrap();
		assert_eq!(config.sweeper.id, "from-env");
		std::env::remove_var("SWEEPER_TEST_ID");
	}

	#[test]
	fn test_page_size_bounds() {
		let config_str = format!("{}\n[sweep]\npage_size = 0\n", MINIMAL);
		let err = config_str.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("page_size"));

		let config_str = format!("{}\n[sweep]\npage_size = 1000\n", MINIMAL);
		assert!(config_str.parse::<Config>().is_ok());
	}

	#[test]
	fn test_interval_bounds() {
		let config_str = format!("{}\n[schedule]\ninterval_seconds = 30\n", MINIMAL);
		let err = config_str.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("interval_seconds"));
	}

	#[test]
	fn test_fetch_attempt_bounds() {
		let config_str = format!("{}\n[sweep]\npage_fetch_attempts = 11\n", MINIMAL);
		assert!(config_str.parse::<Config>().is_err());
	}

	#[test]
	fn test_unknown_primary_rejected() {
		let config_str = MINIMAL.replacen("primary = \"memory\"", "primary = \"redis\"", 1);
		let err = config_str.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("'redis' not found"));
	}

	#[test]
	fn test_api_section() {
		let config_str = format!("{}\n[api]\nenabled = true\nport = 8080\n", MINIMAL);
		let config: Config = config_str.parse().unwrap();
		let api = config.api.unwrap();
		assert!(api.enabled);
		assert_eq!(api.host, "127.0.0.1");
		assert_eq!(api.port, 8080);
	}

	#[test]
	fn test_shipped_config_parses() {
		let config: Config = include_str!("../../../config/sweeper.toml").parse().unwrap();
		assert_eq!(config.orders.primary, "file");
		assert_eq!(config.sweep.page_size, 200);
		assert!(config.api.is_some_and(|api| api.enabled));
	}
}
