//! File-backed order repository.
//!
//! Orders are JSON documents in the `orders` namespace of a file storage
//! backend. Queries scan the namespace; this suits a local order export of a
//! few thousand orders, not a live shop database.

use crate::state::apply_transition;
use crate::{
	OrderError, OrderQuery, OrderRepository, OrderRepositoryFactory, OrderRepositoryRegistry,
};
use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use sweeper_storage::implementations::file::FileStorage;
use sweeper_storage::{StorageError, StorageService};
use sweeper_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Order, OrderId, OrderStatus, Schema,
	StorageKey, ValidationError,
};
use tokio::sync::Mutex;

/// Order repository persisting each order as a file.
pub struct FileOrderRepository {
	storage: Arc<StorageService>,
	/// Serializes read-modify-write cycles.
	write_lock: Mutex<()>,
}

impl FileOrderRepository {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self {
			storage,
			write_lock: Mutex::new(()),
		}
	}

	/// Opens a repository rooted at `path`.
	pub fn open(path: impl Into<PathBuf>) -> Self {
		Self::new(Arc::new(StorageService::new(Box::new(FileStorage::new(
			path.into(),
		)))))
	}

	async fn load_all(&self) -> Result<Vec<Order>, OrderError> {
		let entries: Vec<(String, Order)> = self
			.storage
			.retrieve_all(StorageKey::Orders.as_str())
			.await
			.map_err(storage_error)?;
		Ok(entries.into_iter().map(|(_, order)| order).collect())
	}

	async fn load(&self, id: OrderId) -> Result<Order, OrderError> {
		self.storage
			.retrieve(StorageKey::Orders.as_str(), &id.to_string())
			.await
			.map_err(|e| match e {
				StorageError::NotFound => OrderError::NotFound(id),
				other => storage_error(other),
			})
	}

	async fn save(&self, order: &Order) -> Result<(), OrderError> {
		self.storage
			.store(StorageKey::Orders.as_str(), &order.id.to_string(), order)
			.await
			.map_err(storage_error)
	}
}

fn storage_error(e: StorageError) -> OrderError {
	match e {
		StorageError::Backend(msg) => OrderError::Unavailable(msg),
		other => OrderError::Storage(other.to_string()),
	}
}

#[async_trait]
impl OrderRepository for FileOrderRepository {
	async fn is_available(&self) -> bool {
		match self.storage.list_ids(StorageKey::Orders.as_str()).await {
			Ok(_) => true,
			Err(e) => {
				tracing::warn!(error = %e, "Order storage is not readable");
				false
			},
		}
	}

	async fn query(&self, query: &OrderQuery) -> Result<Vec<Order>, OrderError> {
		let orders = self.load_all().await?;
		Ok(query.apply(&orders))
	}

	async fn get(&self, id: OrderId) -> Result<Order, OrderError> {
		self.load(id).await
	}

	async fn transition(
		&self,
		id: OrderId,
		target: OrderStatus,
		note: Option<String>,
	) -> Result<(), OrderError> {
		let _guard = self.write_lock.lock().await;
		let mut order = self.load(id).await?;
		apply_transition(&mut order, target, note, Utc::now())?;
		self.save(&order).await
	}

	async fn upsert(&self, order: Order) -> Result<(), OrderError> {
		let _guard = self.write_lock.lock().await;
		self.save(&order).await
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileOrderRepositorySchema)
	}
}

/// Configuration schema for the file repository.
pub struct FileOrderRepositorySchema;

impl ConfigSchema for FileOrderRepositorySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![
				Field::new("storage_path", FieldType::String).with_validator(|value| {
					match value.as_str() {
						Some("") => Err("storage_path cannot be empty".to_string()),
						_ => Ok(()),
					}
				}),
			],
		);
		schema.validate(config)
	}
}

/// Factory function to create a file order repository from configuration.
///
/// Configuration parameters:
/// - `storage_path`: Directory holding the order documents (default: "./data/orders")
pub fn create_repository(config: &toml::Value) -> Result<Box<dyn OrderRepository>, OrderError> {
	FileOrderRepositorySchema
		.validate(config)
		.map_err(|e| OrderError::Configuration(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or("./data/orders");

	Ok(Box::new(FileOrderRepository::open(storage_path)))
}

/// Registry for the file order repository.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = OrderRepositoryFactory;

	fn factory() -> Self::Factory {
		create_repository
	}
}

impl OrderRepositoryRegistry for Registry {}
