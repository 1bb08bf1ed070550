//! In-memory storage backend.
//!
//! Useful for tests and for running the sweeper against a throwaway order set;
//! nothing survives a restart.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use sweeper_types::{ConfigSchema, ImplementationRegistry, Schema, ValidationError};
use tokio::sync::RwLock;

/// In-memory storage implementation backed by a `HashMap`.
#[derive(Clone, Default)]
pub struct MemoryStorage {
	store: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl StorageInterface for MemoryStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let store = self.store.read().await;
		store.get(key).cloned().ok_or(StorageError::NotFound)
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let mut store = self.store.write().await;
		store.insert(key.to_string(), value);
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let mut store = self.store.write().await;
		store.remove(key);
		Ok(())
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		let store = self.store.read().await;
		Ok(store.contains_key(key))
	}

	async fn list_ids(&self, namespace: &str) -> Result<Vec<String>, StorageError> {
		let prefix = format!("{}:", namespace);
		let store = self.store.read().await;
		Ok(store
			.keys()
			.filter_map(|key| key.strip_prefix(&prefix))
			.map(str::to_string)
			.collect())
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryStorageSchema)
	}
}

/// Configuration schema for MemoryStorage. No fields are accepted or needed.
pub struct MemoryStorageSchema;

impl ConfigSchema for MemoryStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(vec![], vec![]).validate(config)
	}
}

/// Factory function to create a memory storage backend from configuration.
pub fn create_storage(_config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	Ok(Box::new(MemoryStorage::new()))
}

/// Registry for the memory storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_basic_operations() {
		let storage = MemoryStorage::new();

		let key = "settings:current";
		let value = b"{}".to_vec();
		storage.set_bytes(key, value.clone()).await.unwrap();
		assert_eq!(storage.get_bytes(key).await.unwrap(), value);
		assert!(storage.exists(key).await.unwrap());

		storage.delete(key).await.unwrap();
		assert!(!storage.exists(key).await.unwrap());
		assert!(matches!(
			storage.get_bytes(key).await,
			Err(StorageError::NotFound)
		));
	}

	#[tokio::test]
	async fn test_overwrite() {
		let storage = MemoryStorage::new();
		storage.set_bytes("orders:1", b"v1".to_vec()).await.unwrap();
		storage.set_bytes("orders:1", b"v2".to_vec()).await.unwrap();
		assert_eq!(storage.get_bytes("orders:1").await.unwrap(), b"v2".to_vec());
	}

	#[tokio::test]
	async fn test_list_ids_strips_namespace() {
		let storage = MemoryStorage::new();
		storage.set_bytes("orders:1", vec![]).await.unwrap();
		storage.set_bytes("orders:22", vec![]).await.unwrap();
		storage.set_bytes("ordersx:3", vec![]).await.unwrap();
		storage.set_bytes("settings:current", vec![]).await.unwrap();

		let mut ids = storage.list_ids("orders").await.unwrap();
		ids.sort();
		assert_eq!(ids, vec!["1".to_string(), "22".to_string()]);
	}

	#[test]
	fn test_schema_rejects_non_table() {
		let schema = MemoryStorageSchema;
		assert!(schema.validate(&toml::Value::Integer(1)).is_err());
		assert!(schema
			.validate(&toml::Value::Table(toml::Table::new()))
			.is_ok());
	}
}
