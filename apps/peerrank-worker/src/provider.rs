use std::{future::Future, pin::Pin};

use peerrank_config::EmbeddingProviderConfig;
use peerrank_providers::embedding;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Turns entity text into a vector. Swapped for stubs in tests.
pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		text: &'a str,
	) -> BoxFuture<'a, peerrank_providers::Result<Vec<f32>>>;
}

/// Calls the configured HTTP embedding service.
pub struct HttpEmbedding;
impl EmbeddingProvider for HttpEmbedding {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		text: &'a str,
	) -> BoxFuture<'a, peerrank_providers::Result<Vec<f32>>> {
		Box::pin(embedding::embed(cfg, text))
	}
}
