//! Event types published while a sweep runs.
//!
//! The engine broadcasts these on its event bus so that other components
//! (the HTTP API, log shippers, tests) can follow a sweep without polling.
//! Publishing is best effort; a sweep never waits on subscribers.

use crate::{OrderId, SkipReason, StatusKey, SweepOutcome, SweepResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Main event type for a sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SweepEvent {
	/// A sweep began measuring ages against `now`.
	SweepStarted { now: DateTime<Utc> },
	/// An order was moved to `Cancelled`.
	OrderCancelled {
		order_id: OrderId,
		status: StatusKey,
		/// Whether a note was attached with the transition.
		noted: bool,
	},
	/// An order was left untouched by the safety filter.
	OrderSkipped {
		order_id: OrderId,
		status: StatusKey,
		outcome: SweepOutcome,
	},
	/// The repository failed or rejected a cancellation.
	TransitionFailed {
		order_id: OrderId,
		status: StatusKey,
		reason: String,
	},
	/// Paging through a status was abandoned after a fetch failure.
	StatusAborted { status: StatusKey, reason: String },
	/// A sweep finished, or returned early without sweeping.
	SweepCompleted { result: SweepResult },
}

impl SweepEvent {
	/// The early-exit reason carried by a completion event, if any.
	pub fn skip_reason(&self) -> Option<SkipReason> {
		match self {
			SweepEvent::SweepCompleted { result } => result.skipped,
			_ => None,
		}
	}
}
