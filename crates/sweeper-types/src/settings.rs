//! Sweep settings and their validator.
//!
//! `SweepSettings` is the well-formed configuration the sweep engine runs
//! with. Operators submit `RawSettings`, which `SweepSettings::normalize`
//! turns into well-formed settings by dropping unknown statuses, clamping
//! thresholds and filling in defaults. Normalization never fails.

use crate::StatusKey;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Note template used when none is configured.
pub const DEFAULT_NOTE_TEMPLATE: &str =
	"Order auto-cancelled after {hours} hours in status \"{status}\" with no payment.";

/// Settings that drive a sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepSettings {
	/// Master switch. A disabled sweep touches nothing.
	pub enabled: bool,
	/// Statuses whose stale orders get cancelled.
	pub target_statuses: BTreeSet<StatusKey>,
	/// Age threshold in hours per status.
	pub hours_by_status: BTreeMap<StatusKey, u32>,
	/// Whether to attach a private note to cancelled orders.
	pub add_note: bool,
	/// Note template; supports `{hours}`, `{status}` and `{order_id}`.
	pub note_template: String,
}

impl Default for SweepSettings {
	fn default() -> Self {
		Self {
			enabled: true,
			target_statuses: StatusKey::all().collect(),
			hours_by_status: StatusKey::all()
				.map(|key| (key, key.default_hours()))
				.collect(),
			add_note: true,
			note_template: DEFAULT_NOTE_TEMPLATE.to_string(),
		}
	}
}

impl SweepSettings {
	/// Threshold for a status, falling back to the status default when unset.
	///
	/// The value is returned as stored; callers must still treat values below
	/// one as "do not sweep".
	pub fn hours_for(&self, status: StatusKey) -> u32 {
		self.hours_by_status
			.get(&status)
			.copied()
			.unwrap_or_else(|| status.default_hours())
	}

	/// Fills thresholds missing from a persisted document with defaults.
	pub fn with_defaults(mut self) -> Self {
		for key in StatusKey::all() {
			self.hours_by_status
				.entry(key)
				.or_insert_with(|| key.default_hours());
		}
		self
	}

	/// Normalizes raw operator input into well-formed settings.
	///
	/// The raw payload is treated as a complete form submission: absent
	/// switches read as off and an absent status list selects nothing, while
	/// absent thresholds and template keep their defaults.
	pub fn normalize(raw: &RawSettings) -> Self {
		let target_statuses = raw
			.statuses
			.iter()
			.flatten()
			.filter_map(|s| s.trim().parse::<StatusKey>().ok())
			.collect();

		let hours_by_status = StatusKey::all()
			.map(|key| {
				let hours = raw
					.hours
					.get(key.as_str())
					.and_then(RawHours::to_hours)
					.unwrap_or_else(|| key.default_hours());
				(key, hours)
			})
			.collect();

		// A blank template falls back to the default.
		let note_template = raw
			.note_template
			.as_deref()
			.map(sanitize_text)
			.filter(|template| !template.is_empty())
			.unwrap_or_else(|| DEFAULT_NOTE_TEMPLATE.to_string());

		Self {
			enabled: raw.enabled.unwrap_or(false),
			target_statuses,
			hours_by_status,
			add_note: raw.add_note.unwrap_or(false),
			note_template,
		}
	}
}

/// Unvalidated settings as submitted by an operator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSettings {
	#[serde(default)]
	pub enabled: Option<bool>,
	#[serde(default)]
	pub statuses: Option<Vec<String>>,
	/// Thresholds keyed by status wire name.
	#[serde(default)]
	pub hours: BTreeMap<String, RawHours>,
	#[serde(default)]
	pub add_note: Option<bool>,
	#[serde(default)]
	pub note_template: Option<String>,
}

impl From<&SweepSettings> for RawSettings {
	fn from(settings: &SweepSettings) -> Self {
		Self {
			enabled: Some(settings.enabled),
			statuses: Some(
				settings
					.target_statuses
					.iter()
					.map(|key| key.as_str().to_string())
					.collect(),
			),
			hours: settings
				.hours_by_status
				.iter()
				.map(|(key, hours)| (key.as_str().to_string(), RawHours::Number(*hours as i64)))
				.collect(),
			add_note: Some(settings.add_note),
			note_template: Some(settings.note_template.clone()),
		}
	}
}

/// A threshold as submitted: either a number or free text from a form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawHours {
	Number(i64),
	Text(String),
}

impl RawHours {
	/// Parses the threshold, clamping to at least one hour.
	///
	/// Returns `None` for text that is not an integer.
	pub fn to_hours(&self) -> Option<u32> {
		let value = match self {
			RawHours::Number(n) => *n,
			RawHours::Text(text) => text.trim().parse::<i64>().ok()?,
		};
		Some(value.clamp(1, u32::MAX as i64) as u32)
	}
}

/// Reduces free text to a single clean line.
///
/// Markup tags are removed, control characters and line breaks become spaces,
/// and whitespace runs collapse to a single space. A `<` that does not open a
/// tag is kept as text.
pub fn sanitize_text(input: &str) -> String {
	let mut stripped = String::with_capacity(input.len());
	let mut rest = input;
	while let Some(c) = rest.chars().next() {
		let after = &rest[c.len_utf8()..];
		if c == '<' && opens_tag(after) {
			if let Some(end) = after.find('>') {
				rest = &after[end + 1..];
				continue;
			}
		}
		stripped.push(if c.is_control() { ' ' } else { c });
		rest = after;
	}
	stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn opens_tag(after: &str) -> bool {
	after
		.chars()
		.next()
		.is_some_and(|c| c.is_ascii_alphabetic() || c == '/' || c == '!')
}
