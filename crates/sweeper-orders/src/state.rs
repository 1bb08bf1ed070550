//! Order status transition rules.
//!
//! Repositories validate every requested transition here before persisting
//! it, so that an order which changed state after the sweep fetched it is
//! rejected instead of overwritten.

use crate::OrderError;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use sweeper_types::{Order, OrderNote, OrderStatus};

/// Checks if a status transition is allowed by the lifecycle table.
pub fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
	use OrderStatus::*;

	static TRANSITIONS: Lazy<HashMap<OrderStatus, HashSet<OrderStatus>>> = Lazy::new(|| {
		HashMap::from([
			(
				Pending,
				HashSet::from([Processing, OnHold, Completed, Cancelled, Failed]),
			),
			(
				OnHold,
				HashSet::from([Pending, Processing, Completed, Cancelled, Failed]),
			),
			(Processing, HashSet::from([OnHold, Completed, Refunded])),
			(Completed, HashSet::from([Refunded])),
			(Failed, HashSet::from([Pending, Processing, Cancelled])),
			(Cancelled, HashSet::new()), // terminal
			(Refunded, HashSet::new()),  // terminal
		])
	});

	TRANSITIONS
		.get(&from)
		.is_some_and(|allowed| allowed.contains(&to))
}

/// Validates a transition of `order` to `target`.
pub fn check_transition(order: &Order, target: OrderStatus) -> Result<(), OrderError> {
	if target == OrderStatus::Cancelled && order.is_paid() {
		return Err(OrderError::InvalidTransition {
			id: order.id,
			from: order.status,
			to: target,
			reason: "order has been paid".to_string(),
		});
	}
	if !is_valid_transition(order.status, target) {
		return Err(OrderError::InvalidTransition {
			id: order.id,
			from: order.status,
			to: target,
			reason: "not allowed by the order lifecycle".to_string(),
		});
	}
	Ok(())
}

/// Validates and applies a transition in place.
///
/// Only the status, the modification time and the notes change. An empty
/// note is not attached.
pub fn apply_transition(
	order: &mut Order,
	target: OrderStatus,
	note: Option<String>,
	now: DateTime<Utc>,
) -> Result<(), OrderError> {
	check_transition(order, target)?;
	order.status = target;
	order.updated_at = Some(now);
	if let Some(content) = note.filter(|n| !n.trim().is_empty()) {
		order.notes.push(OrderNote::private(content, now));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;

	fn created() -> DateTime<Utc> {
		Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
	}

	#[test]
	fn test_awaiting_payment_can_be_cancelled() {
		assert!(is_valid_transition(OrderStatus::Pending, OrderStatus::Cancelled));
		assert!(is_valid_transition(OrderStatus::OnHold, OrderStatus::Cancelled));
	}

	#[test]
	fn test_terminal_states() {
		assert!(!is_valid_transition(OrderStatus::Cancelled, OrderStatus::Cancelled));
		assert!(!is_valid_transition(OrderStatus::Cancelled, OrderStatus::Pending));
		assert!(!is_valid_transition(OrderStatus::Refunded, OrderStatus::Cancelled));
		assert!(!is_valid_transition(OrderStatus::Completed, OrderStatus::Cancelled));
	}

	#[test]
	fn test_paid_order_is_never_cancelled() {
		let mut order = Order::new(9, OrderStatus::Pending, created());
		order.paid_at = Some(created());
		let err = check_transition(&order, OrderStatus::Cancelled).unwrap_err();
		assert!(matches!(err, OrderError::InvalidTransition { .. }));
		assert!(err.to_string().contains("paid"));
	}

	#[test]
	fn test_apply_transition_appends_private_note() {
		let now = created() + chrono::Duration::days(2);
		let mut order = Order::new(1, OrderStatus::OnHold, created());
		apply_transition(
			&mut order,
			OrderStatus::Cancelled,
			Some("stale".to_string()),
			now,
		)
		.unwrap();

		assert_eq!(order.status, OrderStatus::Cancelled);
		assert_eq!(order.updated_at, Some(now));
		assert_eq!(order.notes.len(), 1);
		assert!(!order.notes[0].customer_visible);
		assert_eq!(order.created_at, created());
	}

	#[test]
	fn test_apply_transition_skips_empty_note() {
		let mut order = Order::new(1, OrderStatus::Pending, created());
		apply_transition(&mut order, OrderStatus::Cancelled, Some("  ".into()), created())
			.unwrap();
		assert!(order.notes.is_empty());
	}

	#[test]
	fn test_rejected_transition_leaves_order_untouched() {
		let mut order = Order::new(1, OrderStatus::Completed, created());
		let before = order.clone();
		assert!(apply_transition(&mut order, OrderStatus::Cancelled, None, created()).is_err());
		assert_eq!(order, before);
	}
}
