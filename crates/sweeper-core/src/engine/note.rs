//! Cancellation note rendering.

use sweeper_types::{OrderId, StatusKey};

/// Substitutes `{hours}`, `{status}` and `{order_id}` in a note template.
///
/// Substitution is single pass: text produced by a substitution is never
/// scanned again. Unknown placeholders are kept verbatim.
pub fn render_note(template: &str, hours: u32, status: StatusKey, order_id: OrderId) -> String {
	let replacements = [
		("{hours}", hours.to_string()),
		("{status}", status.as_str().to_string()),
		("{order_id}", order_id.to_string()),
	];

	let mut rendered = String::with_capacity(template.len() + 16);
	let mut rest = template;
	while let Some(start) = rest.find('{') {
		rendered.push_str(&rest[..start]);
		let tail = &rest[start..];
		match replacements
			.iter()
			.find(|(placeholder, _)| tail.starts_with(placeholder))
		{
			Some((placeholder, value)) => {
				rendered.push_str(value);
				rest = &tail[placeholder.len()..];
			},
			None => {
				rendered.push('{');
				rest = &tail[1..];
			},
		}
	}
	rendered.push_str(rest);
	rendered
}
