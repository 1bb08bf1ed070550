//! Storage module for the stale-order sweeper.
//!
//! This module provides a key/value abstraction over storage backends
//! (in-memory and file-based), a typed `StorageService` on top of it, and the
//! `SettingsStore` that persists the sweep settings.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use sweeper_types::{ConfigSchema, ImplementationRegistry};
use thiserror::Error;

pub mod settings;

pub use settings::SettingsStore;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs when a requested item is not found.
	#[error("Not found")]
	NotFound,
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Low-level interface for storage backends.
///
/// Keys have the form `namespace:id`. Backends store opaque bytes and must
/// make each `set_bytes` atomic with respect to concurrent readers.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes, replacing any previous value.
	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

	/// Deletes the value associated with the given key.
	async fn delete(&self, key: &str) -> Result<(), StorageError>;

	/// Checks if a key exists in storage.
	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	/// Lists the ids stored under a namespace, in no particular order.
	async fn list_ids(&self, namespace: &str) -> Result<Vec<String>, StorageError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Type alias for storage factory functions.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Get all registered storage implementations.
///
/// Returns a vector of (name, factory) tuples for all available storage implementations.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

fn storage_key(namespace: &str, id: &str) -> String {
	format!("{}:{}", namespace, id)
}

/// High-level storage service that provides typed operations.
///
/// Values are serialized to JSON before they reach the backend.
pub struct StorageService {
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	/// Creates a new StorageService with the specified backend.
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	/// Stores a serializable value, replacing any previous value.
	pub async fn store<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend
			.set_bytes(&storage_key(namespace, id), bytes)
			.await
	}

	/// Retrieves and deserializes a value from storage.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<T, StorageError> {
		let bytes = self.backend.get_bytes(&storage_key(namespace, id)).await?;
		serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	/// Retrieves a value, mapping a missing key to `None`.
	pub async fn retrieve_optional<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<Option<T>, StorageError> {
		match self.retrieve(namespace, id).await {
			Ok(value) => Ok(Some(value)),
			Err(StorageError::NotFound) => Ok(None),
			Err(e) => Err(e),
		}
	}

	/// Removes a value from storage.
	pub async fn remove(&self, namespace: &str, id: &str) -> Result<(), StorageError> {
		self.backend.delete(&storage_key(namespace, id)).await
	}

	/// Checks if a value exists in storage.
	pub async fn exists(&self, namespace: &str, id: &str) -> Result<bool, StorageError> {
		self.backend.exists(&storage_key(namespace, id)).await
	}

	/// Lists the ids stored under a namespace.
	pub async fn list_ids(&self, namespace: &str) -> Result<Vec<String>, StorageError> {
		self.backend.list_ids(namespace).await
	}

	/// Retrieves every value in a namespace.
	///
	/// Entries removed between listing and reading are skipped.
	pub async fn retrieve_all<T: DeserializeOwned>(
		&self,
		namespace: &str,
	) -> Result<Vec<(String, T)>, StorageError> {
		let ids = self.backend.list_ids(namespace).await?;
		let mut values = Vec::with_capacity(ids.len());
		for id in ids {
			match self.retrieve(namespace, &id).await {
				Ok(value) => values.push((id, value)),
				Err(StorageError::NotFound) => continue,
				Err(e) => return Err(e),
			}
		}
		Ok(values)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use implementations::memory::MemoryStorage;
	use serde::Deserialize;

	#[derive(Debug, PartialEq, Serialize, Deserialize)]
	struct Record {
		name: String,
		count: u32,
	}

	fn service() -> StorageService {
		StorageService::new(Box::new(MemoryStorage::new()))
	}

	#[tokio::test]
	async fn test_typed_store_and_retrieve() {
		let storage = service();
		let record = Record {
			name: "a".into(),
			count: 3,
		};
		storage.store("records", "1", &record).await.unwrap();

		let loaded: Record = storage.retrieve("records", "1").await.unwrap();
		assert_eq!(loaded, record);
		assert!(storage.exists("records", "1").await.unwrap());

		storage.remove("records", "1").await.unwrap();
		let missing: Option<Record> = storage.retrieve_optional("records", "1").await.unwrap();
		assert!(missing.is_none());
	}

	#[tokio::test]
	async fn test_retrieve_all_is_scoped_to_namespace() {
		let storage = service();
		for i in 0..3 {
			let record = Record {
				name: format!("r{}", i),
				count: i,
			};
			storage.store("records", &i.to_string(), &record).await.unwrap();
		}
		storage.store("other", "x", &Record { name: "x".into(), count: 9 }).await.unwrap();

		let mut all: Vec<(String, Record)> = storage.retrieve_all("records").await.unwrap();
		all.sort_by(|a, b| a.0.cmp(&b.0));
		assert_eq!(all.len(), 3);
		assert_eq!(all[2].1.name, "r2");
	}

	#[tokio::test]
	async fn test_type_mismatch_is_serialization_error() {
		let storage = service();
		storage.store("records", "1", &"just a string").await.unwrap();
		let result: Result<Record, _> = storage.retrieve("records", "1").await;
		assert!(matches!(result, Err(StorageError::Serialization(_))));
	}
}
