//! Reading and updating the sweep settings.

use crate::apis::error::APIError;
use sweeper_storage::SettingsStore;
use sweeper_types::{RawSettings, SweepSettings};

pub async fn get_settings(store: &SettingsStore) -> Result<SweepSettings, APIError> {
	Ok(store.read().await?)
}

/// Stores a full settings submission. Absent switches read as off.
pub async fn update_settings(
	store: &SettingsStore,
	raw: RawSettings,
) -> Result<SweepSettings, APIError> {
	Ok(store.write(&raw).await?)
}
