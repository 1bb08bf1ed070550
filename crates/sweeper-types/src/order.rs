//! Order types consumed by the sweep.
//!
//! Orders are owned by the order repository; the sweep only reads them and
//! requests a single transition to `Cancelled`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of an order in the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<u64> for OrderId {
	fn from(id: u64) -> Self {
		Self(id)
	}
}

/// Status of an order in the host platform.
///
/// Only `Pending` and `OnHold` can be targeted by a sweep; the remaining
/// variants exist so that repositories can report the full lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
	/// Awaiting payment.
	Pending,
	/// Payment received, order being fulfilled.
	Processing,
	/// Awaiting manual confirmation of payment.
	OnHold,
	/// Fulfilled.
	Completed,
	/// Cancelled by an operator, the customer or a sweep.
	Cancelled,
	/// Refunded after payment.
	Refunded,
	/// Payment failed or was declined.
	Failed,
}

impl OrderStatus {
	/// Returns the wire name of the status.
	pub fn as_str(&self) -> &'static str {
		match self {
			OrderStatus::Pending => "pending",
			OrderStatus::Processing => "processing",
			OrderStatus::OnHold => "on-hold",
			OrderStatus::Completed => "completed",
			OrderStatus::Cancelled => "cancelled",
			OrderStatus::Refunded => "refunded",
			OrderStatus::Failed => "failed",
		}
	}

	/// Statuses that imply a payment was captured.
	pub fn is_paid_status(&self) -> bool {
		matches!(self, OrderStatus::Processing | OrderStatus::Completed)
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for OrderStatus {
	type Err = UnknownStatus;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"pending" => Ok(OrderStatus::Pending),
			"processing" => Ok(OrderStatus::Processing),
			"on-hold" => Ok(OrderStatus::OnHold),
			"completed" => Ok(OrderStatus::Completed),
			"cancelled" => Ok(OrderStatus::Cancelled),
			"refunded" => Ok(OrderStatus::Refunded),
			"failed" => Ok(OrderStatus::Failed),
			other => Err(UnknownStatus(other.to_string())),
		}
	}
}

/// Error returned when a status name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown status: {0}")]
pub struct UnknownStatus(pub String);

/// Statuses a sweep is allowed to target.
///
/// Ordering is only used to keep settings and results deterministic; statuses
/// are swept independently of each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusKey {
	Pending,
	OnHold,
}

impl StatusKey {
	/// Returns the wire name, also used for `{status}` in note templates.
	pub fn as_str(&self) -> &'static str {
		match self {
			StatusKey::Pending => "pending",
			StatusKey::OnHold => "on-hold",
		}
	}

	/// Threshold in hours used when none is configured.
	pub fn default_hours(&self) -> u32 {
		match self {
			StatusKey::Pending => 24,
			StatusKey::OnHold => 72,
		}
	}

	/// The order status this key selects.
	pub fn order_status(&self) -> OrderStatus {
		match self {
			StatusKey::Pending => OrderStatus::Pending,
			StatusKey::OnHold => OrderStatus::OnHold,
		}
	}

	/// Returns an iterator over all StatusKey variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[Self::Pending, Self::OnHold].into_iter()
	}
}

impl fmt::Display for StatusKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for StatusKey {
	type Err = UnknownStatus;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"pending" => Ok(StatusKey::Pending),
			"on-hold" => Ok(StatusKey::OnHold),
			other => Err(UnknownStatus(other.to_string())),
		}
	}
}

/// A note attached to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderNote {
	pub content: String,
	/// Private notes are only shown to operators.
	#[serde(default)]
	pub customer_visible: bool,
	pub added_at: DateTime<Utc>,
}

impl OrderNote {
	/// Creates a note that is only visible to operators.
	pub fn private(content: impl Into<String>, added_at: DateTime<Utc>) -> Self {
		Self {
			content: content.into(),
			customer_visible: false,
			added_at,
		}
	}
}

/// An order as reported by the order repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
	/// Unique identifier for this order.
	pub id: OrderId,
	/// Current status of the order.
	pub status: OrderStatus,
	/// When the order was created (UTC).
	pub created_at: DateTime<Utc>,
	/// When the order was last modified.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub updated_at: Option<DateTime<Utc>>,
	/// When a payment was recorded, if any.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub paid_at: Option<DateTime<Utc>>,
	/// Notes attached to the order, oldest first.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub notes: Vec<OrderNote>,
}

impl Order {
	/// Creates an unpaid order without notes.
	pub fn new(id: u64, status: OrderStatus, created_at: DateTime<Utc>) -> Self {
		Self {
			id: OrderId(id),
			status,
			created_at,
			updated_at: None,
			paid_at: None,
			notes: Vec::new(),
		}
	}

	/// Whether the order has been paid.
	///
	/// An order counts as paid once a payment was recorded, even if its status
	/// still reads as awaiting payment.
	pub fn is_paid(&self) -> bool {
		self.paid_at.is_some() || self.status.is_paid_status()
	}
}
