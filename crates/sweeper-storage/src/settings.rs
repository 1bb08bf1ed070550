//! Persistence for sweep settings.
//!
//! Settings live in a single document under the `settings` namespace. Reads
//! merge the stored document with defaults; writes go through the settings
//! validator first, so the stored document is always well formed.

use crate::{StorageError, StorageService};
use std::sync::Arc;
use sweeper_types::{RawSettings, StorageKey, SweepSettings};

const SETTINGS_ID: &str = "current";

/// Configuration store for the sweep settings.
#[derive(Clone)]
pub struct SettingsStore {
	storage: Arc<StorageService>,
}

impl SettingsStore {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Returns the persisted settings merged with defaults.
	///
	/// A missing document yields the defaults.
	pub async fn read(&self) -> Result<SweepSettings, StorageError> {
		let stored: Option<SweepSettings> = self
			.storage
			.retrieve_optional(StorageKey::Settings.as_str(), SETTINGS_ID)
			.await?;
		Ok(stored.map(SweepSettings::with_defaults).unwrap_or_default())
	}

	/// Normalizes and persists operator input, returning what was stored.
	pub async fn write(&self, raw: &RawSettings) -> Result<SweepSettings, StorageError> {
		let settings = SweepSettings::normalize(raw);
		self.storage
			.store(StorageKey::Settings.as_str(), SETTINGS_ID, &settings)
			.await?;
		tracing::info!(
			enabled = settings.enabled,
			statuses = ?settings.target_statuses,
			"Sweep settings updated"
		);
		Ok(settings)
	}

	/// Persists the defaults when nothing has been stored yet.
	///
	/// Existing settings are left untouched. Returns the effective settings.
	pub async fn activate(&self) -> Result<SweepSettings, StorageError> {
		if self
			.storage
			.exists(StorageKey::Settings.as_str(), SETTINGS_ID)
			.await?
		{
			return self.read().await;
		}

		let settings = SweepSettings::default();
		self.storage
			.store(StorageKey::Settings.as_str(), SETTINGS_ID, &settings)
			.await?;
		tracing::info!("Stored default sweep settings");
		Ok(settings)
	}
}
