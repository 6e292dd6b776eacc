use std::collections::HashSet;

use crate::EntityKind;

/// Builds the text embedded for an entity: `"<label>: <text>. <tag-label>: <tags>"`.
///
/// Absent text renders as an empty string and an untagged entity keeps its tag segment with an
/// empty list, so the output is always well formed. Duplicate tag names are dropped, keeping the
/// first occurrence.
pub fn build_entity_text(kind: EntityKind, text: Option<&str>, tags: &[String]) -> String {
	let mut seen = HashSet::with_capacity(tags.len());
	let unique: Vec<&str> =
		tags.iter().map(String::as_str).filter(|tag| seen.insert(*tag)).collect();

	format!(
		"{}: {}. {}: {}",
		kind.text_label(),
		text.unwrap_or_default(),
		kind.tag_label(),
		unique.join(", ")
	)
}
