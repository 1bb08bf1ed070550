//! Sweep of a single status.
//!
//! Cancelled orders drop out of the `(status, created_before)` result set
//! while the sweep pages through it. The offset therefore only advances past
//! orders that stay in the set (skipped, failed or already seen), so no
//! candidate is missed when earlier pages shrink underneath the cursor.
//!
//! An order whose cancellation was rejected may or may not have left the
//! set, so it is not counted up front. If it comes back on a later page it
//! is counted then, as a duplicate. After one full page of duplicates the
//! offset is past every retained order, so a second one in a row means the
//! repository is not honouring the offset.

use super::note::render_note;
use super::SweepEngine;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use sweeper_orders::{OrderError, OrderQuery};
use sweeper_types::{
	Order, OrderId, OrderStatus, StatusKey, StatusTally, SweepEvent, SweepOutcome, SweepSettings,
};
use tracing::instrument;

/// Computes `now - hours`, truncated to whole seconds.
///
/// Returns `None` when the result falls outside the representable range.
pub(crate) fn cutoff_for(now: DateTime<Utc>, hours: u32) -> Option<DateTime<Utc>> {
	let seconds = now.timestamp().checked_sub(i64::from(hours) * 3600)?;
	DateTime::from_timestamp(seconds, 0)
}

impl SweepEngine {
	/// Sweeps one status. Returns `None` when the status is not swept at all.
	#[instrument(skip_all, fields(status = %status))]
	pub(super) async fn sweep_status(
		&self,
		settings: &SweepSettings,
		status: StatusKey,
		now: DateTime<Utc>,
	) -> Option<StatusTally> {
		let hours = settings.hours_for(status);
		if hours < 1 {
			tracing::warn!(hours, "Threshold below one hour, status not swept");
			return None;
		}
		let Some(cutoff) = cutoff_for(now, hours) else {
			tracing::warn!(hours, "Cutoff out of range, status not swept");
			return None;
		};

		let mut tally = StatusTally::new(hours, cutoff);
		let page_size = self.options.page_size;
		let mut seen: HashSet<OrderId> = HashSet::new();
		let mut offset = 0usize;
		let mut stale_pages = 0u32;

		loop {
			let query = OrderQuery {
				status: status.order_status(),
				created_before: cutoff,
				offset,
				page_size,
			};
			let page = match self.fetch_page(&query).await {
				Ok(page) => page,
				Err(e) => {
					tracing::warn!(cutoff = %cutoff, offset, error = %e, "Page fetch failed, abandoning status");
					self.abort(&mut tally, status, e.to_string());
					break;
				},
			};
			tally.pages += 1;

			let fetched = page.len();
			let mut progressed = false;
			for order in page {
				if !seen.insert(order.id) {
					offset += 1;
					continue;
				}
				progressed = true;
				let outcome = self.process_order(settings, status, hours, &order).await;
				tally.record(outcome);
				if matches!(outcome, SweepOutcome::SkippedPaid | SweepOutcome::Failed) {
					offset += 1;
				}
			}

			if fetched < page_size {
				break;
			}
			if progressed {
				stale_pages = 0;
			} else {
				stale_pages += 1;
				if stale_pages > 1 {
					self.abort(&mut tally, status, "pagination made no progress".to_string());
					break;
				}
			}
		}

		tracing::info!(
			cutoff = %cutoff,
			pages = tally.pages,
			scanned = tally.scanned,
			cancelled = tally.cancelled,
			failed = tally.failed,
			"Status swept"
		);
		Some(tally)
	}

	fn abort(&self, tally: &mut StatusTally, status: StatusKey, reason: String) {
		self.event_bus
			.publish(SweepEvent::StatusAborted {
				status,
				reason: reason.clone(),
			})
			.ok();
		tally.aborted = Some(reason);
	}

	/// Fetches a page, retrying transient failures with exponential backoff.
	async fn fetch_page(&self, query: &OrderQuery) -> Result<Vec<Order>, OrderError> {
		let mut attempt = 1;
		loop {
			match self.orders.query(query).await {
				Ok(page) => return Ok(page),
				Err(e @ OrderError::Unavailable(_)) => return Err(e),
				Err(e) if attempt >= self.options.fetch_attempts => return Err(e),
				Err(e) => {
					let delay = self.options.retry_delay(attempt);
					tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "Retrying page fetch");
					tokio::time::sleep(delay).await;
					attempt += 1;
				},
			}
		}
	}

	/// Applies the safety filter to one candidate and cancels it if it passes.
	async fn process_order(
		&self,
		settings: &SweepSettings,
		status: StatusKey,
		hours: u32,
		order: &Order,
	) -> SweepOutcome {
		let outcome = if order.is_paid() {
			SweepOutcome::SkippedPaid
		} else if order.status != status.order_status() {
			SweepOutcome::SkippedRace
		} else {
			return self.cancel(settings, status, hours, order.id).await;
		};

		tracing::debug!(order_id = %order.id, outcome = %outcome, "Order skipped");
		self.event_bus
			.publish(SweepEvent::OrderSkipped {
				order_id: order.id,
				status,
				outcome,
			})
			.ok();
		outcome
	}

	async fn cancel(
		&self,
		settings: &SweepSettings,
		status: StatusKey,
		hours: u32,
		order_id: OrderId,
	) -> SweepOutcome {
		let note = settings
			.add_note
			.then(|| render_note(&settings.note_template, hours, status, order_id))
			.filter(|note| !note.trim().is_empty());
		let noted = note.is_some();

		match self
			.orders
			.transition(order_id, OrderStatus::Cancelled, note)
			.await
		{
			Ok(()) => {
				tracing::info!(order_id = %order_id, noted, "Order cancelled");
				self.event_bus
					.publish(SweepEvent::OrderCancelled {
						order_id,
						status,
						noted,
					})
					.ok();
				SweepOutcome::Cancelled
			},
			Err(e @ (OrderError::InvalidTransition { .. } | OrderError::NotFound(_))) => {
				tracing::debug!(order_id = %order_id, reason = %e, "Order changed since it was fetched");
				self.event_bus
					.publish(SweepEvent::OrderSkipped {
						order_id,
						status,
						outcome: SweepOutcome::SkippedRace,
					})
					.ok();
				SweepOutcome::SkippedRace
			},
			Err(e) => {
				tracing::warn!(order_id = %order_id, error = %e, "Failed to cancel order");
				self.event_bus
					.publish(SweepEvent::TransitionFailed {
						order_id,
						status,
						reason: e.to_string(),
					})
					.ok();
				SweepOutcome::Failed
			},
		}
	}
}
