//! Lifecycle management for the sweep engine.

use super::{EngineError, SweepEngine};

impl SweepEngine {
	/// Stores default settings on first start and reports what will run.
	pub async fn initialize(&self) -> Result<(), EngineError> {
		tracing::info!("Initializing sweep engine");

		let settings = self
			.settings
			.activate()
			.await
			.map_err(|e| EngineError::Settings(e.to_string()))?;

		if !self.orders.is_available().await {
			tracing::warn!("Order repository is not reachable yet; sweeps will be skipped until it is");
		}

		tracing::info!(
			enabled = settings.enabled,
			statuses = ?settings.target_statuses,
			page_size = self.options.page_size,
			"Sweep engine ready"
		);
		Ok(())
	}

	pub async fn shutdown(&self) -> Result<(), EngineError> {
		tracing::info!("Shutting down sweep engine");
		Ok(())
	}
}
