//! Builder for constructing sweep engines.
//!
//! Composes a `SweepEngine` from configuration, using factory functions to
//! create the settings storage backend and the order repository by name.

use crate::engine::{event_bus::EventBus, SweepEngine, SweepOptions};
use std::collections::HashMap;
use std::sync::Arc;
use sweeper_config::Config;
use sweeper_orders::{OrderError, OrderRepository};
use sweeper_storage::{SettingsStore, StorageError, StorageInterface, StorageService};
use thiserror::Error;

/// Errors that can occur during engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions for every pluggable component, keyed by implementation name.
pub struct SweeperFactories<SF, OF> {
	pub storage_factories: HashMap<String, SF>,
	pub order_factories: HashMap<String, OF>,
}

/// Builder for constructing a `SweepEngine` with pluggable implementations.
pub struct SweeperBuilder {
	config: Config,
}

impl SweeperBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds the engine. Only the primary implementation of each component
	/// is instantiated.
	pub fn build<SF, OF>(self, factories: SweeperFactories<SF, OF>) -> Result<SweepEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
		OF: Fn(&toml::Value) -> Result<Box<dyn OrderRepository>, OrderError>,
	{
		let settings_backend = load_primary::<dyn StorageInterface, _, _>(
			"settings",
			&self.config.settings.primary,
			&self.config.settings.implementations,
			&factories.storage_factories,
		)?;
		let settings = SettingsStore::new(Arc::new(StorageService::new(settings_backend)));

		let orders: Arc<dyn OrderRepository> = Arc::from(load_primary::<dyn OrderRepository, _, _>(
			"orders",
			&self.config.orders.primary,
			&self.config.orders.implementations,
			&factories.order_factories,
		)?);

		let options = SweepOptions::from_config(&self.config.sweep);
		tracing::info!(
			sweeper_id = %self.config.sweeper.id,
			page_size = options.page_size,
			fetch_attempts = options.fetch_attempts,
			"Sweep engine built"
		);

		Ok(SweepEngine::new(settings, orders, options, EventBus::new(1000)))
	}
}

fn load_primary<T: ?Sized, E: std::fmt::Display, F>(
	component: &'static str,
	primary: &str,
	implementations: &HashMap<String, toml::Value>,
	factories: &HashMap<String, F>,
) -> Result<Box<T>, BuilderError>
where
	F: Fn(&toml::Value) -> Result<Box<T>, E>,
{
	let config = implementations.get(primary).ok_or_else(|| {
		BuilderError::Config(format!(
			"Primary {} implementation '{}' has no configuration",
			component, primary
		))
	})?;
	let factory = factories.get(primary).ok_or_else(|| {
		BuilderError::MissingComponent(format!("{} implementation '{}'", component, primary))
	})?;

	match factory(config) {
		Ok(implementation) => {
			tracing::info!(component = component, implementation = %primary, enabled = true, "Loaded");
			Ok(implementation)
		},
		Err(e) => {
			tracing::error!(
				component = component,
				implementation = %primary,
				error = %e,
				"Failed to create implementation"
			);
			Err(BuilderError::Config(format!(
				"Failed to create {} implementation '{}': {}",
				component, primary, e
			)))
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use sweeper_config::builders::ConfigBuilder;
	use sweeper_orders::OrderRepositoryFactory;
	use sweeper_storage::StorageFactory;
	use sweeper_types::{Order, OrderId, OrderStatus};

	fn factories() -> SweeperFactories<StorageFactory, OrderRepositoryFactory> {
		SweeperFactories {
			storage_factories: sweeper_storage::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
			order_factories: sweeper_orders::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
		}
	}

	#[tokio::test]
	async fn test_build_with_memory_backends() {
		let config = ConfigBuilder::new().page_size(25).build();
		let engine = SweeperBuilder::new(config).build(factories()).unwrap();

		assert_eq!(engine.options().page_size, 25);
		engine.initialize().await.unwrap();
		assert!(engine.settings().read().await.unwrap().enabled);

		engine
			.orders()
			.upsert(Order::new(
				1,
				OrderStatus::Pending,
				chrono::Utc::now() - chrono::Duration::days(2),
			))
			.await
			.unwrap();
		let result = engine.run_sweep(chrono::Utc::now()).await.unwrap();
		assert_eq!(result.total_cancelled(), 1);
		assert_eq!(
			engine.orders().get(OrderId(1)).await.unwrap().status,
			OrderStatus::Cancelled
		);
	}

	#[test]
	fn test_unknown_implementation_is_missing_component() {
		let config = ConfigBuilder::new()
			.orders_backend("shopify", toml::Value::Table(toml::Table::new()))
			.build();
		let result = SweeperBuilder::new(config).build(factories());
		assert!(matches!(result, Err(BuilderError::MissingComponent(_))));
	}

	#[test]
	fn test_factory_error_is_config_error() {
		let bad: toml::Value = toml::from_str("storage_path = \"\"").unwrap();
		let config = ConfigBuilder::new().settings_backend("file", bad).build();
		let result = SweeperBuilder::new(config).build(factories());
		assert!(matches!(result, Err(BuilderError::Config(_))));
	}
}
