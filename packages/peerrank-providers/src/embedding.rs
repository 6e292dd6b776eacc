use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use peerrank_config::EmbeddingProviderConfig;

use crate::{Error, Result};

/// Embeds one text with the configured service.
///
/// Blank input is rejected before any request is made.
pub async fn embed(cfg: &EmbeddingProviderConfig, text: &str) -> Result<Vec<f32>> {
	if text.trim().is_empty() {
		return Err(Error::InvalidInput { message: "Text is empty after trimming.".to_string() });
	}

	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = request_body(cfg, text);
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;
	let vec = match cfg.provider_id.as_str() {
		"openai" => parse_openai_response(json)?,
		_ => parse_ollama_response(json)?,
	};

	if vec.len() != cfg.dimensions as usize {
		return Err(Error::embedding(format!(
			"Embedding dimension {} does not match configured dimensions {}.",
			vec.len(),
			cfg.dimensions
		)));
	}

	Ok(vec)
}

fn request_body(cfg: &EmbeddingProviderConfig, text: &str) -> Value {
	match cfg.provider_id.as_str() {
		"openai" => serde_json::json!({
			"model": cfg.model,
			"input": [text],
			"dimensions": cfg.dimensions,
		}),
		_ => serde_json::json!({
			"model": cfg.model,
			"prompt": text,
		}),
	}
}

fn parse_ollama_response(json: Value) -> Result<Vec<f32>> {
	let embedding = json
		.get("embedding")
		.and_then(|v| v.as_array())
		.ok_or_else(|| Error::embedding("Embedding response is missing embedding array."))?;

	parse_vector(embedding)
}

fn parse_openai_response(json: Value) -> Result<Vec<f32>> {
	let data = json
		.get("data")
		.and_then(|v| v.as_array())
		.ok_or_else(|| Error::embedding("Embedding response is missing data array."))?;
	let first = data
		.iter()
		.min_by_key(|item| item.get("index").and_then(|v| v.as_u64()).unwrap_or(0))
		.ok_or_else(|| Error::embedding("Embedding response data array is empty."))?;
	let embedding = first
		.get("embedding")
		.and_then(|v| v.as_array())
		.ok_or_else(|| Error::embedding("Embedding item missing embedding array."))?;

	parse_vector(embedding)
}

fn parse_vector(values: &[Value]) -> Result<Vec<f32>> {
	if values.is_empty() {
		return Err(Error::embedding("Embedding array is empty."));
	}

	let mut vec = Vec::with_capacity(values.len());

	for value in values {
		let number =
			value.as_f64().ok_or_else(|| Error::embedding("Embedding value must be numeric."))?;
		let component = number as f32;

		if !component.is_finite() {
			return Err(Error::embedding("Embedding value is out of range."));
		}

		vec.push(component);
	}

	Ok(vec)
}
