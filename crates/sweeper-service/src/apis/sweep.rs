//! Manual sweep trigger.

use crate::apis::error::APIError;
use serde::Serialize;
use sweeper_core::SweepScheduler;
use sweeper_types::SweepResult;

/// Response for a manual sweep.
#[derive(Debug, Serialize)]
pub struct SweepResponse {
	/// One-line operator message.
	pub message: String,
	pub result: SweepResult,
}

/// Runs a sweep immediately unless one is already running.
pub async fn trigger_sweep(scheduler: &SweepScheduler) -> Result<SweepResponse, APIError> {
	let result = scheduler.run_now().await?;
	Ok(SweepResponse {
		message: result.summary(),
		result,
	})
}
