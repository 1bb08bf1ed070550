//! Order repository module for the stale-order sweeper.
//!
//! The sweep never owns orders. It reads them page by page through an
//! `OrderRepository` and asks the repository to move stale ones to
//! `Cancelled`. Implementations are selected by name from configuration.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sweeper_types::{ConfigSchema, ImplementationRegistry, Order, OrderId, OrderStatus};
use thiserror::Error;

pub mod state;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Errors that can occur during order repository operations.
#[derive(Debug, Error)]
pub enum OrderError {
	/// The order platform cannot be reached.
	#[error("Order repository unavailable: {0}")]
	Unavailable(String),
	#[error("Order not found: {0}")]
	NotFound(OrderId),
	/// The transition is not allowed from the order's current state.
	#[error("Invalid transition of order {id} from {from} to {to}: {reason}")]
	InvalidTransition {
		id: OrderId,
		from: OrderStatus,
		to: OrderStatus,
		reason: String,
	},
	#[error("Storage error: {0}")]
	Storage(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// One page of a candidate query.
///
/// Matches orders with exactly `status` created strictly before
/// `created_before`, ordered by `(created_at, id)` ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderQuery {
	pub status: OrderStatus,
	pub created_before: DateTime<Utc>,
	/// Number of matching orders to skip.
	pub offset: usize,
	/// Maximum number of orders to return.
	pub page_size: usize,
}

impl OrderQuery {
	/// Builds the query for a 1-based page number.
	pub fn page(
		status: OrderStatus,
		created_before: DateTime<Utc>,
		page: usize,
		page_size: usize,
	) -> Self {
		Self {
			status,
			created_before,
			offset: page.saturating_sub(1).saturating_mul(page_size),
			page_size,
		}
	}

	/// Whether an order belongs to the result set, ignoring paging.
	pub fn matches(&self, order: &Order) -> bool {
		order.status == self.status && order.created_at < self.created_before
	}

	/// Applies filtering, ordering and paging to a full set of orders.
	pub fn apply<'a>(&self, orders: impl IntoIterator<Item = &'a Order>) -> Vec<Order> {
		let mut matching: Vec<&Order> = orders.into_iter().filter(|o| self.matches(o)).collect();
		matching.sort_by_key(|o| (o.created_at, o.id));
		matching
			.into_iter()
			.skip(self.offset)
			.take(self.page_size)
			.cloned()
			.collect()
	}
}

/// Contract between the sweep and the host order platform.
///
/// A page shorter than `page_size` means there are no further results for
/// the query.
#[async_trait]
pub trait OrderRepository: Send + Sync {
	/// Whether the platform can currently serve queries.
	async fn is_available(&self) -> bool;

	/// Returns one page of orders matching the query.
	async fn query(&self, query: &OrderQuery) -> Result<Vec<Order>, OrderError>;

	/// Looks up a single order.
	async fn get(&self, id: OrderId) -> Result<Order, OrderError>;

	/// Moves an order to `target`, appending `note` as a private note.
	///
	/// The transition is validated against the order's current state; a paid
	/// order is never cancelled.
	async fn transition(
		&self,
		id: OrderId,
		target: OrderStatus,
		note: Option<String>,
	) -> Result<(), OrderError>;

	/// Inserts or replaces an order. Used by the host to load orders.
	async fn upsert(&self, order: Order) -> Result<(), OrderError>;

	/// Returns the configuration schema for this implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Type alias for order repository factory functions.
pub type OrderRepositoryFactory =
	fn(&toml::Value) -> Result<Box<dyn OrderRepository>, OrderError>;

/// Registry trait for order repository implementations.
pub trait OrderRepositoryRegistry:
	ImplementationRegistry<Factory = OrderRepositoryFactory>
{
}

/// Get all registered order repository implementations.
pub fn get_all_implementations() -> Vec<(&'static str, OrderRepositoryFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}
