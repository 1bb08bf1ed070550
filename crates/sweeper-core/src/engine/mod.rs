//! Stale-order sweep engine.
//!
//! The engine walks every targeted status, computes the status cutoff from
//! the sweep instant and cancels unpaid orders created before it. Settings
//! are read once at the start of a sweep and never change while it runs.

pub mod event_bus;
pub mod lifecycle;
pub mod note;
mod status;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use sweeper_config::SweepConfig;
use sweeper_orders::OrderRepository;
use sweeper_storage::SettingsStore;
use sweeper_types::{SkipReason, SweepEvent, SweepResult, SweepSettings};
use thiserror::Error;
use tracing::instrument;

/// Errors that can occur during engine operations.
///
/// Per-order and per-page failures never surface here; they are recorded in
/// the `SweepResult`.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Settings error: {0}")]
	Settings(String),
	#[error("Service error: {0}")]
	Service(String),
}

/// Paging and retry parameters of a sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepOptions {
	/// Orders requested per page.
	pub page_size: usize,
	/// Attempts per page before the status is abandoned.
	pub fetch_attempts: u32,
	/// Delay before the first retry. Doubles on every further retry.
	pub retry_base_delay: Duration,
}

impl Default for SweepOptions {
	fn default() -> Self {
		Self::from_config(&SweepConfig::default())
	}
}

impl SweepOptions {
	pub fn from_config(config: &SweepConfig) -> Self {
		Self {
			page_size: config.page_size.max(1),
			fetch_attempts: config.page_fetch_attempts.max(1),
			retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
		}
	}

	/// Delay to wait after the given failed attempt (1-based).
	pub fn retry_delay(&self, attempt: u32) -> Duration {
		let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
		self.retry_base_delay.saturating_mul(factor)
	}
}

/// Cancels stale unpaid orders through an order repository.
#[derive(Clone)]
pub struct SweepEngine {
	/// Source of the sweep settings.
	pub(crate) settings: SettingsStore,
	/// Repository the sweep reads from and cancels through.
	pub(crate) orders: Arc<dyn OrderRepository>,
	pub(crate) options: SweepOptions,
	/// Event bus for sweep progress.
	pub(crate) event_bus: event_bus::EventBus,
}

impl SweepEngine {
	pub fn new(
		settings: SettingsStore,
		orders: Arc<dyn OrderRepository>,
		options: SweepOptions,
		event_bus: event_bus::EventBus,
	) -> Self {
		Self {
			settings,
			orders,
			options,
			event_bus,
		}
	}

	/// Reads the current settings and runs one sweep measured against `now`.
	///
	/// Only a failure to read the settings is an error.
	pub async fn run_sweep(&self, now: DateTime<Utc>) -> Result<SweepResult, EngineError> {
		let settings = self
			.settings
			.read()
			.await
			.map_err(|e| EngineError::Settings(e.to_string()))?;
		Ok(self.run_sweep_with(&settings, now).await)
	}

	/// Runs one sweep with explicit settings.
	///
	/// Statuses are swept one after another; a failure in one never stops the
	/// others.
	#[instrument(skip_all, fields(now = %now))]
	pub async fn run_sweep_with(&self, settings: &SweepSettings, now: DateTime<Utc>) -> SweepResult {
		if !settings.enabled {
			tracing::debug!("Auto-cancel disabled, skipping sweep");
			return self.finish(SweepResult::skipped(now, SkipReason::Disabled));
		}

		if !self.orders.is_available().await {
			tracing::warn!("Order repository unavailable, skipping sweep");
			return self.finish(SweepResult::skipped(now, SkipReason::RepositoryUnavailable));
		}

		self.event_bus.publish(SweepEvent::SweepStarted { now }).ok();

		let mut result = SweepResult::new(now);
		for &status in &settings.target_statuses {
			if let Some(tally) = self.sweep_status(settings, status, now).await {
				result.per_status.insert(status, tally);
			}
		}

		tracing::info!(
			scanned = result.total_scanned(),
			cancelled = result.total_cancelled(),
			failed = result.total_failed(),
			"Sweep finished"
		);
		self.finish(result)
	}

	fn finish(&self, result: SweepResult) -> SweepResult {
		self.event_bus
			.publish(SweepEvent::SweepCompleted {
				result: result.clone(),
			})
			.ok();
		result
	}

	pub fn settings(&self) -> &SettingsStore {
		&self.settings
	}

	pub fn orders(&self) -> &Arc<dyn OrderRepository> {
		&self.orders
	}

	pub fn options(&self) -> &SweepOptions {
		&self.options
	}

	/// Returns a reference to the event bus.
	pub fn event_bus(&self) -> &event_bus::EventBus {
		&self.event_bus
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_retry_delay_doubles() {
		let options = SweepOptions {
			page_size: 10,
			fetch_attempts: 4,
			retry_base_delay: Duration::from_millis(500),
		};
		assert_eq!(options.retry_delay(1), Duration::from_millis(500));
		assert_eq!(options.retry_delay(2), Duration::from_millis(1000));
		assert_eq!(options.retry_delay(3), Duration::from_millis(2000));
		assert_eq!(options.retry_delay(0), Duration::from_millis(500));
	}

	#[test]
	fn test_options_from_config() {
		let config = SweepConfig {
			page_size: 0,
			page_fetch_attempts: 0,
			retry_base_delay_ms: 20,
		};
		let options = SweepOptions::from_config(&config);
		assert_eq!(options.page_size, 1);
		assert_eq!(options.fetch_attempts, 1);
		assert_eq!(options.retry_base_delay, Duration::from_millis(20));
		assert_eq!(SweepOptions::default().page_size, 200);
	}
}
