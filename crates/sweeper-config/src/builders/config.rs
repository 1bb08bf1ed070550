//! Configuration builder for tests and local development.

use crate::{
	ApiConfig, Config, OrdersConfig, ScheduleConfig, SettingsConfig, SweepConfig, SweeperConfig,
};
use std::collections::HashMap;

/// Builder for creating `Config` instances with a fluent API.
///
/// Defaults to in-memory settings and orders, the default schedule, and no
/// API server.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	sweeper_id: String,
	schedule: ScheduleConfig,
	sweep: SweepConfig,
	settings_primary: String,
	settings_implementations: HashMap<String, toml::Value>,
	orders_primary: String,
	orders_implementations: HashMap<String, toml::Value>,
	api: Option<ApiConfig>,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

fn empty_table() -> toml::Value {
	toml::Value::Table(toml::Table::new())
}

impl ConfigBuilder {
	/// Creates a new `ConfigBuilder` with default values suitable for testing.
	pub fn new() -> Self {
		Self {
			sweeper_id: "test-sweeper".to_string(),
			schedule: ScheduleConfig::default(),
			sweep: SweepConfig::default(),
			settings_primary: "memory".to_string(),
			settings_implementations: HashMap::from([("memory".to_string(), empty_table())]),
			orders_primary: "memory".to_string(),
			orders_implementations: HashMap::from([("memory".to_string(), empty_table())]),
			api: None,
		}
	}

	pub fn sweeper_id(mut self, id: impl Into<String>) -> Self {
		self.sweeper_id = id.into();
		self
	}

	pub fn interval_seconds(mut self, interval: u64) -> Self {
		self.schedule.interval_seconds = interval;
		self
	}

	pub fn initial_delay_seconds(mut self, delay: u64) -> Self {
		self.schedule.initial_delay_seconds = delay;
		self
	}

	pub fn page_size(mut self, page_size: usize) -> Self {
		self.sweep.page_size = page_size;
		self
	}

	/// Sets fetch attempts and the first retry delay.
	pub fn retry(mut self, attempts: u32, base_delay_ms: u64) -> Self {
		self.sweep.page_fetch_attempts = attempts;
		self.sweep.retry_base_delay_ms = base_delay_ms;
		self
	}

	/// Selects the settings backend and its configuration table.
	pub fn settings_backend(mut self, name: impl Into<String>, config: toml::Value) -> Self {
		let name = name.into();
		self.settings_implementations.insert(name.clone(), config);
		self.settings_primary = name;
		self
	}

	/// Selects the order repository and its configuration table.
	pub fn orders_backend(mut self, name: impl Into<String>, config: toml::Value) -> Self {
		let name = name.into();
		self.orders_implementations.insert(name.clone(), config);
		self.orders_primary = name;
		self
	}

	pub fn api(mut self, api: Option<ApiConfig>) -> Self {
		self.api = api;
		self
	}

	/// Builds the `Config` with the configured values.
	pub fn build(self) -> Config {
		Config {
			sweeper: SweeperConfig {
				id: self.sweeper_id,
			},
			schedule: self.schedule,
			sweep: self.sweep,
			settings: SettingsConfig {
				primary: self.settings_primary,
				implementations: self.settings_implementations,
			},
			orders: OrdersConfig {
				primary: self.orders_primary,
				implementations: self.orders_implementations,
			},
			api: self.api,
		}
	}
}
