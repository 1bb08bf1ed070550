//! In-memory order repository.
//!
//! Holds orders in a `BTreeMap` behind a read-write lock. Cloning the
//! repository shares the same orders, which lets the host and tests keep a
//! handle while the sweep engine owns another.

use crate::state::apply_transition;
use crate::{
	OrderError, OrderQuery, OrderRepository, OrderRepositoryFactory, OrderRepositoryRegistry,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use sweeper_types::{
	ConfigSchema, ImplementationRegistry, Order, OrderId, OrderStatus, Schema, ValidationError,
};
use tokio::sync::RwLock;

/// In-memory order repository.
#[derive(Clone)]
pub struct MemoryOrderRepository {
	orders: Arc<RwLock<BTreeMap<OrderId, Order>>>,
	available: Arc<AtomicBool>,
}

impl Default for MemoryOrderRepository {
	fn default() -> Self {
		Self::new()
	}
}

impl MemoryOrderRepository {
	pub fn new() -> Self {
		Self {
			orders: Arc::new(RwLock::new(BTreeMap::new())),
			available: Arc::new(AtomicBool::new(true)),
		}
	}

	/// Creates a repository holding the given orders.
	pub fn with_orders(orders: impl IntoIterator<Item = Order>) -> Self {
		let map = orders.into_iter().map(|o| (o.id, o)).collect();
		Self {
			orders: Arc::new(RwLock::new(map)),
			available: Arc::new(AtomicBool::new(true)),
		}
	}

	/// Simulates the platform going away or coming back.
	pub fn set_available(&self, available: bool) {
		self.available.store(available, Ordering::SeqCst);
	}

	/// Returns a snapshot of every order, ordered by id.
	pub async fn snapshot(&self) -> Vec<Order> {
		self.orders.read().await.values().cloned().collect()
	}

	fn ensure_available(&self) -> Result<(), OrderError> {
		if self.available.load(Ordering::SeqCst) {
			Ok(())
		} else {
			Err(OrderError::Unavailable("memory repository switched off".into()))
		}
	}
}

#[async_trait]
impl OrderRepository for MemoryOrderRepository {
	async fn is_available(&self) -> bool {
		self.available.load(Ordering::SeqCst)
	}

	async fn query(&self, query: &OrderQuery) -> Result<Vec<Order>, OrderError> {
		self.ensure_available()?;
		let orders = self.orders.read().await;
		Ok(query.apply(orders.values()))
	}

	async fn get(&self, id: OrderId) -> Result<Order, OrderError> {
		self.ensure_available()?;
		self.orders
			.read()
			.await
			.get(&id)
			.cloned()
			.ok_or(OrderError::NotFound(id))
	}

	async fn transition(
		&self,
		id: OrderId,
		target: OrderStatus,
		note: Option<String>,
	) -> Result<(), OrderError> {
		self.ensure_available()?;
		let mut orders = self.orders.write().await;
		let order = orders.get_mut(&id).ok_or(OrderError::NotFound(id))?;
		apply_transition(order, target, note, Utc::now())
	}

	async fn upsert(&self, order: Order) -> Result<(), OrderError> {
		self.ensure_available()?;
		self.orders.write().await.insert(order.id, order);
		Ok(())
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryOrderRepositorySchema)
	}
}

/// Configuration schema for the memory repository. No fields are needed.
pub struct MemoryOrderRepositorySchema;

impl ConfigSchema for MemoryOrderRepositorySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(vec![], vec![]).validate(config)
	}
}

/// Factory function to create an empty in-memory repository.
pub fn create_repository(_config: &toml::Value) -> Result<Box<dyn OrderRepository>, OrderError> {
	Ok(Box::new(MemoryOrderRepository::new()))
}

/// Registry for the memory order repository.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = OrderRepositoryFactory;

	fn factory() -> Self::Factory {
		create_repository
	}
}

impl OrderRepositoryRegistry for Registry {}
