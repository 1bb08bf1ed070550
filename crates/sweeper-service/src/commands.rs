//! Operator commands behind the CLI.

use crate::server;
use std::path::Path;
use sweeper_config::Config;
use sweeper_core::{SweepEngine, SweepScheduler};
use sweeper_orders::OrderRepository;
use sweeper_storage::SettingsStore;
use sweeper_types::{
	Order, RawHours, RawSettings, StatusKey, SweepEvent, SweepResult, SweepSettings,
};
use tokio::sync::broadcast::{self, error::RecvError};

/// Flags of `settings set`. Omitted flags keep the stored value.
#[derive(clap::Args, Debug, Default)]
pub struct SettingsArgs {
	/// Master switch
	#[arg(long)]
	pub enabled: Option<bool>,
	/// Comma-separated statuses to sweep (pending, on-hold)
	#[arg(long, value_delimiter = ',')]
	pub statuses: Option<Vec<String>>,
	/// Threshold for one status, e.g. `--hours pending=48`; repeatable
	#[arg(long, value_name = "STATUS=HOURS")]
	pub hours: Vec<String>,
	/// Whether to attach a private note to cancelled orders
	#[arg(long)]
	pub add_note: Option<bool>,
	/// Note template; supports {hours}, {status} and {order_id}
	#[arg(long)]
	pub note_template: Option<String>,
}

impl SettingsArgs {
	/// Overlays the flags onto the current settings.
	pub fn apply(self, current: &SweepSettings) -> Result<RawSettings, String> {
		let mut raw = RawSettings::from(current);
		if let Some(enabled) = self.enabled {
			raw.enabled = Some(enabled);
		}
		if let Some(statuses) = self.statuses {
			raw.statuses = Some(statuses);
		}
		for pair in self.hours {
			let (status, hours) = pair
				.split_once('=')
				.ok_or_else(|| format!("expected STATUS=HOURS, got '{}'", pair))?;
			let status = status.trim();
			if status.parse::<StatusKey>().is_err() {
				return Err(format!("unknown status '{}'", status));
			}
			raw.hours
				.insert(status.to_string(), RawHours::Text(hours.to_string()));
		}
		if let Some(add_note) = self.add_note {
			raw.add_note = Some(add_note);
		}
		if let Some(template) = self.note_template {
			raw.note_template = Some(template);
		}
		Ok(raw)
	}
}

/// Runs scheduled sweeps until Ctrl+C, with the API server when enabled.
pub async fn run(engine: SweepEngine, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
	let events = tokio::spawn(log_events(engine.event_bus().subscribe()));
	let scheduler = SweepScheduler::from_config(engine, &config.schedule);
	let shutdown = async {
		if let Err(e) = tokio::signal::ctrl_c().await {
			tracing::error!(error = %e, "Failed to listen for shutdown signal");
		}
	};

	match config.api.clone().filter(|api| api.enabled) {
		Some(api_config) => {
			tokio::select! {
				_ = scheduler.run_until(shutdown) => {
					tracing::info!("Scheduler finished");
				}
				result = server::start_server(api_config, scheduler.clone()) => {
					tracing::info!("API server finished");
					result?;
				}
			}
		},
		None => {
			tracing::info!("Starting scheduler only");
			scheduler.run_until(shutdown).await;
		},
	}

	events.abort();
	Ok(())
}

/// Logs every sweep event at debug level until the bus closes.
/// Returns the number of events logged.
pub async fn log_events(mut events: broadcast::Receiver<SweepEvent>) -> usize {
	let mut logged = 0;
	loop {
		match events.recv().await {
			Ok(event) => {
				tracing::debug!(?event, "Sweep event");
				logged += 1;
			},
			Err(RecvError::Lagged(missed)) => {
				tracing::warn!(missed, "Event logger lagged behind");
			},
			Err(RecvError::Closed) => break,
		}
	}
	logged
}

/// Runs a single sweep immediately.
pub async fn run_now(
	engine: SweepEngine,
	config: &Config,
) -> Result<SweepResult, Box<dyn std::error::Error>> {
	let scheduler = SweepScheduler::from_config(engine, &config.schedule);
	Ok(scheduler.run_now().await?)
}

pub async fn update_settings(
	store: &SettingsStore,
	update: SettingsArgs,
) -> Result<SweepSettings, Box<dyn std::error::Error>> {
	let current = store.read().await?;
	let raw = update.apply(&current)?;
	Ok(store.write(&raw).await?)
}

/// Upserts every order of a JSON array file. Returns the number imported.
pub async fn import_orders(
	orders: &dyn OrderRepository,
	file: &Path,
) -> Result<usize, Box<dyn std::error::Error>> {
	let bytes = tokio::fs::read(file).await?;
	let parsed: Vec<Order> = serde_json::from_slice(&bytes)?;
	let count = parsed.len();
	for order in parsed {
		orders.upsert(order).await?;
	}
	tracing::info!(count, file = %file.display(), "Orders imported");
	Ok(count)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc;
	use sweeper_core::EventBus;
	use sweeper_orders::implementations::memory::MemoryOrderRepository;
	use sweeper_storage::implementations::memory::MemoryStorage;
	use sweeper_storage::StorageService;
	use sweeper_types::{OrderId, OrderStatus};
	use tempfile::tempdir;

	fn store() -> SettingsStore {
		SettingsStore::new(Arc::new(StorageService::new(Box::new(MemoryStorage::new()))))
	}

	#[tokio::test]
	async fn test_update_keeps_unset_values() {
		let store = store();
		let update = SettingsArgs {
			hours: vec!["pending=48".to_string()],
			..Default::default()
		};

		let settings = update_settings(&store, update).await.unwrap();

		assert!(settings.enabled);
		assert!(settings.add_note);
		assert_eq!(settings.hours_for(StatusKey::Pending), 48);
		assert_eq!(settings.hours_for(StatusKey::OnHold), 72);
		assert_eq!(settings.target_statuses.len(), 2);
	}

	#[tokio::test]
	async fn test_update_switches_and_statuses() {
		let store = store();
		let update = SettingsArgs {
			enabled: Some(false),
			statuses: Some(vec!["on-hold".to_string()]),
			add_note: Some(false),
			..Default::default()
		};

		let settings = update_settings(&store, update).await.unwrap();

		assert!(!settings.enabled);
		assert!(!settings.add_note);
		assert_eq!(
			settings.target_statuses.into_iter().collect::<Vec<_>>(),
			vec![StatusKey::OnHold]
		);
		assert!(!store.read().await.unwrap().enabled);
	}

	#[tokio::test]
	async fn test_log_events_drains_until_bus_closes() {
		let bus = EventBus::new(8);
		let events = bus.subscribe();
		let now = chrono::Utc::now();
		bus.publish(SweepEvent::SweepStarted { now }).unwrap();
		bus.publish(SweepEvent::SweepStarted { now }).unwrap();
		drop(bus);

		assert_eq!(log_events(events).await, 2);
	}

	#[test]
	fn test_malformed_hours_flag() {
		let current = SweepSettings::default();
		let missing_equals = SettingsArgs {
			hours: vec!["pending".to_string()],
			..Default::default()
		};
		assert!(missing_equals.apply(&current).is_err());

		let unknown = SettingsArgs {
			hours: vec!["shipped=4".to_string()],
			..Default::default()
		};
		assert!(unknown.apply(&current).unwrap_err().contains("shipped"));
	}

	#[tokio::test]
	async fn test_import_orders_from_json() {
		let dir = tempdir().unwrap();
		let file = dir.path().join("orders.json");
		tokio::fs::write(
			&file,
			r#"[
				{"id": 1, "status": "pending", "created_at": "2024-01-01T00:00:00Z"},
				{"id": 2, "status": "on-hold", "created_at": "2024-01-02T00:00:00Z",
				 "paid_at": "2024-01-02T01:00:00Z"}
			]"#,
		)
		.await
		.unwrap();
		let repo = MemoryOrderRepository::new();

		let count = import_orders(&repo, &file).await.unwrap();

		assert_eq!(count, 2);
		let second = repo.get(OrderId(2)).await.unwrap();
		assert_eq!(second.status, OrderStatus::OnHold);
		assert!(second.is_paid());
	}

	#[tokio::test]
	async fn test_import_rejects_malformed_file() {
		let dir = tempdir().unwrap();
		let file = dir.path().join("orders.json");
		tokio::fs::write(&file, r#"{"id": 1}"#).await.unwrap();

		assert!(import_orders(&MemoryOrderRepository::new(), &file).await.is_err());
	}
}
