//! Results reported by a sweep.

use crate::StatusKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// What happened to a single candidate order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SweepOutcome {
	/// The order was moved to `Cancelled`.
	Cancelled,
	/// The order was paid and left untouched.
	SkippedPaid,
	/// The order changed status after it was fetched.
	SkippedRace,
	/// The repository rejected or failed the transition.
	Failed,
}

impl fmt::Display for SweepOutcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			SweepOutcome::Cancelled => "cancelled",
			SweepOutcome::SkippedPaid => "skipped-paid",
			SweepOutcome::SkippedRace => "skipped-race",
			SweepOutcome::Failed => "failed",
		};
		f.write_str(name)
	}
}

/// Why a sweep did nothing at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
	/// Settings have the master switch off.
	Disabled,
	/// The order platform could not be reached.
	RepositoryUnavailable,
}

/// Counters for one swept status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTally {
	/// Threshold the cutoff was computed from.
	pub hours: u32,
	/// Orders created strictly before this instant were candidates.
	pub cutoff: DateTime<Utc>,
	/// Number of page fetches issued.
	pub pages: usize,
	/// Candidate orders examined.
	pub scanned: usize,
	pub cancelled: usize,
	pub skipped_paid: usize,
	pub skipped_race: usize,
	pub failed: usize,
	/// Set when a page fetch failed and the status was abandoned.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub aborted: Option<String>,
}

impl StatusTally {
	/// Creates an empty tally for a status swept with the given cutoff.
	pub fn new(hours: u32, cutoff: DateTime<Utc>) -> Self {
		Self {
			hours,
			cutoff,
			pages: 0,
			scanned: 0,
			cancelled: 0,
			skipped_paid: 0,
			skipped_race: 0,
			failed: 0,
			aborted: None,
		}
	}

	/// Counts one examined order.
	pub fn record(&mut self, outcome: SweepOutcome) {
		self.scanned += 1;
		match outcome {
			SweepOutcome::Cancelled => self.cancelled += 1,
			SweepOutcome::SkippedPaid => self.skipped_paid += 1,
			SweepOutcome::SkippedRace => self.skipped_race += 1,
			SweepOutcome::Failed => self.failed += 1,
		}
	}
}

/// Aggregate result of one sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepResult {
	/// The instant the sweep measured ages against.
	pub started_at: DateTime<Utc>,
	/// Set when the sweep returned without looking at any order.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub skipped: Option<SkipReason>,
	/// Tallies for each swept status.
	pub per_status: BTreeMap<StatusKey, StatusTally>,
}

impl SweepResult {
	/// A result for a sweep that ran.
	pub fn new(started_at: DateTime<Utc>) -> Self {
		Self {
			started_at,
			skipped: None,
			per_status: BTreeMap::new(),
		}
	}

	/// A result for a sweep that did nothing.
	pub fn skipped(started_at: DateTime<Utc>, reason: SkipReason) -> Self {
		Self {
			started_at,
			skipped: Some(reason),
			per_status: BTreeMap::new(),
		}
	}

	pub fn total_scanned(&self) -> usize {
		self.per_status.values().map(|t| t.scanned).sum()
	}

	pub fn total_cancelled(&self) -> usize {
		self.per_status.values().map(|t| t.cancelled).sum()
	}

	pub fn total_failed(&self) -> usize {
		self.per_status.values().map(|t| t.failed).sum()
	}

	/// Statuses whose pagination was abandoned.
	pub fn aborted_statuses(&self) -> Vec<StatusKey> {
		self.per_status
			.iter()
			.filter(|(_, tally)| tally.aborted.is_some())
			.map(|(key, _)| *key)
			.collect()
	}

	/// Whether every status ran to completion without transition failures.
	pub fn is_clean(&self) -> bool {
		self.total_failed() == 0 && self.aborted_statuses().is_empty()
	}

	/// One-line message for operators.
	pub fn summary(&self) -> String {
		match self.skipped {
			Some(SkipReason::Disabled) => "Auto-cancel is disabled; nothing was swept.".to_string(),
			Some(SkipReason::RepositoryUnavailable) => {
				"Order platform unavailable; nothing was swept.".to_string()
			},
			None => {
				let parts: Vec<String> = self
					.per_status
					.iter()
					.map(|(key, tally)| {
						let mut part = format!(
							"{}: {} scanned, {} cancelled, {} paid, {} changed, {} failed",
							key,
							tally.scanned,
							tally.cancelled,
							tally.skipped_paid,
							tally.skipped_race,
							tally.failed
						);
						if tally.aborted.is_some() {
							part.push_str(" (aborted)");
						}
						part
					})
					.collect();
				if parts.is_empty() {
					"Auto-cancel task executed; no statuses targeted.".to_string()
				} else {
					format!("Auto-cancel task executed. {}", parts.join("; "))
				}
			},
		}
	}
}
