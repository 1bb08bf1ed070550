//! Periodic and manual triggering of sweeps.
//!
//! The scheduler owns the run lock. At most one sweep runs at a time: a
//! periodic tick that finds a sweep in progress is skipped, and a manual
//! trigger is rejected with `SchedulerError::SweepInProgress`.

use crate::engine::SweepEngine;
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use sweeper_config::ScheduleConfig;
use sweeper_types::SweepResult;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Errors returned by a manual trigger.
#[derive(Debug, Error)]
pub enum SchedulerError {
	#[error("A sweep is already in progress")]
	SweepInProgress,
	#[error("Settings error: {0}")]
	Settings(String),
}

/// Runs the sweep engine on a fixed interval and on demand.
#[derive(Clone)]
pub struct SweepScheduler {
	engine: SweepEngine,
	run_lock: Arc<Mutex<()>>,
	interval: Duration,
	initial_delay: Duration,
}

impl SweepScheduler {
	pub fn new(engine: SweepEngine, interval: Duration, initial_delay: Duration) -> Self {
		Self {
			engine,
			run_lock: Arc::new(Mutex::new(())),
			interval: interval.max(Duration::from_secs(1)),
			initial_delay,
		}
	}

	pub fn from_config(engine: SweepEngine, config: &ScheduleConfig) -> Self {
		Self::new(
			engine,
			Duration::from_secs(config.interval_seconds),
			Duration::from_secs(config.initial_delay_seconds),
		)
	}

	pub fn engine(&self) -> &SweepEngine {
		&self.engine
	}

	/// Whether a sweep currently holds the run lock.
	pub fn is_running(&self) -> bool {
		self.run_lock.try_lock().is_err()
	}

	/// Runs one sweep now, measured against the current time.
	pub async fn run_now(&self) -> Result<SweepResult, SchedulerError> {
		let _guard = self
			.run_lock
			.try_lock()
			.map_err(|_| SchedulerError::SweepInProgress)?;

		tracing::info!("Manual sweep triggered");
		self.engine
			.run_sweep(Utc::now())
			.await
			.map_err(|e| SchedulerError::Settings(e.to_string()))
	}

	/// Runs sweeps on the configured interval until `shutdown` resolves.
	///
	/// The first sweep starts after the initial delay. Ticks missed while a
	/// sweep runs are dropped, not replayed.
	pub async fn run_until<F>(&self, shutdown: F)
	where
		F: Future<Output = ()>,
	{
		tracing::info!(
			interval_secs = self.interval.as_secs(),
			initial_delay_secs = self.initial_delay.as_secs(),
			"Scheduler started"
		);

		let mut ticker = interval_at(Instant::now() + self.initial_delay, self.interval);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
		tokio::pin!(shutdown);

		loop {
			tokio::select! {
				_ = &mut shutdown => {
					tracing::info!("Scheduler stopping");
					break;
				}
				_ = ticker.tick() => {
					self.tick().await;
				}
			}
		}
	}

	async fn tick(&self) {
		let Ok(_guard) = self.run_lock.try_lock() else {
			tracing::warn!("Previous sweep still running, skipping scheduled run");
			return;
		};

		match self.engine.run_sweep(Utc::now()).await {
			Ok(result) => tracing::info!(summary = %result.summary(), "Scheduled sweep complete"),
			Err(e) => tracing::error!(error = %e, "Scheduled sweep failed"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::engine::{event_bus::EventBus, SweepOptions};
	use chrono::Duration as ChronoDuration;
	use sweeper_orders::implementations::memory::MemoryOrderRepository;
	use sweeper_orders::OrderRepository;
	use sweeper_storage::implementations::memory::MemoryStorage;
	use sweeper_storage::{SettingsStore, StorageService};
	use sweeper_types::{Order, OrderId, OrderStatus};
	use tokio::sync::oneshot;

	fn scheduler(repo: &MemoryOrderRepository) -> SweepScheduler {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let engine = SweepEngine::new(
			SettingsStore::new(storage),
			Arc::new(repo.clone()),
			SweepOptions::default(),
			EventBus::new(100),
		);
		SweepScheduler::new(engine, Duration::from_secs(3600), Duration::from_secs(300))
	}

	fn stale_order(id: u64) -> Order {
		Order::new(id, OrderStatus::Pending, Utc::now() - ChronoDuration::hours(48))
	}

	#[tokio::test]
	async fn test_run_now_returns_result() {
		let repo = MemoryOrderRepository::with_orders([stale_order(1)]);
		let scheduler = scheduler(&repo);

		let result = scheduler.run_now().await.unwrap();

		assert_eq!(result.total_cancelled(), 1);
		assert!(!scheduler.is_running());
	}

	#[tokio::test]
	async fn test_manual_trigger_rejected_while_running() {
		let repo = MemoryOrderRepository::with_orders([stale_order(1)]);
		let scheduler = scheduler(&repo);

		let _guard = scheduler.run_lock.try_lock().unwrap();
		assert!(scheduler.is_running());
		assert!(matches!(
			scheduler.clone().run_now().await,
			Err(SchedulerError::SweepInProgress)
		));

		scheduler.tick().await;
		assert_eq!(repo.get(OrderId(1)).await.unwrap().status, OrderStatus::Pending);
	}

	#[tokio::test(start_paused = true)]
	async fn test_first_run_waits_for_initial_delay() {
		let repo = MemoryOrderRepository::with_orders([stale_order(1)]);
		let scheduler = scheduler(&repo);
		let (stop, stopped) = oneshot::channel::<()>();

		let task = tokio::spawn({
			let scheduler = scheduler.clone();
			async move {
				scheduler
					.run_until(async {
						stopped.await.ok();
					})
					.await
			}
		});

		tokio::time::sleep(Duration::from_secs(299)).await;
		assert_eq!(repo.get(OrderId(1)).await.unwrap().status, OrderStatus::Pending);

		tokio::time::sleep(Duration::from_secs(2)).await;
		assert_eq!(repo.get(OrderId(1)).await.unwrap().status, OrderStatus::Cancelled);

		// Orders arriving later are picked up on the next interval.
		repo.upsert(stale_order(2)).await.unwrap();
		tokio::time::sleep(Duration::from_secs(3600)).await;
		assert_eq!(repo.get(OrderId(2)).await.unwrap().status, OrderStatus::Cancelled);

		stop.send(()).unwrap();
		task.await.unwrap();
	}
}
