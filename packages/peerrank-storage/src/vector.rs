use crate::{Error, Result};

/// Renders a vector in pgvector's text form, for binding as `$n::text::vector`.
pub fn format_vector_text(vec: &[f32]) -> String {
	let mut out = String::from("[");

	for (idx, value) in vec.iter().enumerate() {
		if idx > 0 {
			out.push(',');
		}
		out.push_str(&value.to_string());
	}

	out.push(']');

	out
}

pub fn parse_pg_vector(text: &str) -> Result<Vec<f32>> {
	let inner = text
		.trim()
		.strip_prefix('[')
		.and_then(|rest| rest.strip_suffix(']'))
		.ok_or_else(|| Error::InvalidArgument(format!("Malformed vector text {text:?}.")))?;

	if inner.trim().is_empty() {
		return Ok(Vec::new());
	}

	inner
		.split(',')
		.map(|part| {
			part.trim()
				.parse::<f32>()
				.map_err(|_| Error::InvalidArgument(format!("Malformed vector component {part:?}.")))
		})
		.collect()
}
