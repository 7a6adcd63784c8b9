//! Embedding client for OpenAI-compatible `/embeddings` endpoints.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{RemoteEndpoint, RemoteServiceError, RetryPolicy, build_client, post_json};

const SERVICE: &str = "embeddings";

/// Converts texts into fixed-length vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier, recorded in the index manifest.
    fn model(&self) -> &str;

    /// Embed one batch. Returns exactly one vector per input, in input order.
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RemoteServiceError>;
}

/// Embed any number of texts in batches of at most `batch_size`.
///
/// `on_batch(done, total)` is called after every completed batch.
pub async fn embed_in_batches<F>(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    batch_size: usize,
    mut on_batch: F,
) -> Result<Vec<Vec<f32>>, RemoteServiceError>
where
    F: FnMut(usize, usize) + Send,
{
    let batch_size = batch_size.max(1);
    let mut vectors = Vec::with_capacity(texts.len());

    for batch in texts.chunks(batch_size) {
        let embedded = provider.embed_batch(batch).await?;
        if embedded.len() != batch.len() {
            return Err(RemoteServiceError::InvalidResponse {
                service: SERVICE,
                reason: format!(
                    "{} embeddings returned for {} inputs",
                    embedded.len(),
                    batch.len()
                ),
            });
        }
        vectors.extend(embedded);
        on_batch(vectors.len(), texts.len());
    }

    Ok(vectors)
}

/// Embeddings client that talks to OpenAI-compatible endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiEmbeddings {
    client: Client,
    endpoint: RemoteEndpoint,
    model: String,
    policy: RetryPolicy,
}

impl OpenAiEmbeddings {
    /// Builds a new embeddings client.
    pub fn new(
        endpoint: RemoteEndpoint,
        model: impl Into<String>,
        policy: RetryPolicy,
    ) -> Result<Self, RemoteServiceError> {
        let client = build_client(&policy)?;
        Ok(Self {
            client,
            endpoint,
            model: model.into(),
            policy,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RemoteServiceError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: inputs,
        };
        let resp = post_json(
            &self.client,
            &self.endpoint,
            "embeddings",
            &request,
            &self.policy,
            SERVICE,
        )
        .await?;

        let parsed: EmbeddingResponse =
            resp.json()
                .await
                .map_err(|e| RemoteServiceError::InvalidResponse {
                    service: SERVICE,
                    reason: e.to_string(),
                })?;
        let vectors = in_input_order(parsed.data, inputs.len())?;

        tracing::debug!(target: "remote", "embedded {} texts with {}", inputs.len(), self.model);
        Ok(vectors)
    }
}

/// Order response entries by `index`, which must cover `0..expected` exactly once.
fn in_input_order(
    mut data: Vec<EmbeddingData>,
    expected: usize,
) -> Result<Vec<Vec<f32>>, RemoteServiceError> {
    if data.len() != expected {
        return Err(RemoteServiceError::InvalidResponse {
            service: SERVICE,
            reason: format!("{} embeddings returned for {expected} inputs", data.len()),
        });
    }

    data.sort_by_key(|entry| entry.index);
    if let Some((position, entry)) = data
        .iter()
        .enumerate()
        .find(|(position, entry)| entry.index != *position)
    {
        return Err(RemoteServiceError::InvalidResponse {
            service: SERVICE,
            reason: format!(
                "embedding indices are not 0..{expected}: found {} at position {position}",
                entry.index
            ),
        });
    }

    Ok(data.into_iter().map(|entry| entry.embedding).collect())
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records batch sizes and returns the batch position as a 1-d vector.
    struct CountingProvider {
        batches: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        fn model(&self) -> &str {
            "counting"
        }

        async fn embed_batch(
            &self,
            inputs: &[String],
        ) -> Result<Vec<Vec<f32>>, RemoteServiceError> {
            self.batches.lock().unwrap().push(inputs.len());
            Ok(inputs
                .iter()
                .map(|text| vec![text.parse::<f32>().unwrap()])
                .collect())
        }
    }

    #[tokio::test]
    async fn test_embed_in_batches_caps_batch_size_and_keeps_order() {
        let provider = CountingProvider {
            batches: Mutex::new(Vec::new()),
        };
        let texts: Vec<String> = (0..7).map(|i| i.to_string()).collect();
        let mut progress = Vec::new();

        let vectors = embed_in_batches(&provider, &texts, 3, |done, total| {
            progress.push((done, total))
        })
        .await
        .unwrap();

        assert_eq!(*provider.batches.lock().unwrap(), vec![3, 3, 1]);
        assert_eq!(progress, vec![(3, 7), (6, 7), (7, 7)]);
        let flat: Vec<f32> = vectors.into_iter().flatten().collect();
        assert_eq!(flat, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    fn entry(index: usize, value: f32) -> EmbeddingData {
        EmbeddingData {
            embedding: vec![value],
            index,
        }
    }

    #[test]
    fn test_in_input_order_sorts_by_index() {
        let vectors = in_input_order(vec![entry(2, 2.0), entry(0, 0.0), entry(1, 1.0)], 3).unwrap();
        assert_eq!(vectors, vec![vec![0.0], vec![1.0], vec![2.0]]);
    }

    #[test]
    fn test_in_input_order_rejects_duplicate_or_missing_indices() {
        let duplicate = in_input_order(vec![entry(0, 0.0), entry(0, 1.0), entry(2, 2.0)], 3);
        assert!(matches!(
            duplicate,
            Err(RemoteServiceError::InvalidResponse { .. })
        ));

        let out_of_range = in_input_order(vec![entry(1, 1.0), entry(2, 2.0)], 2);
        assert!(out_of_range.is_err());

        let short = in_input_order(vec![entry(0, 0.0)], 2);
        assert!(short.is_err());
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_request() {
        let endpoint = RemoteEndpoint::new("http://127.0.0.1:9", None);
        let client =
            OpenAiEmbeddings::new(endpoint, "BAAI/bge-m3", RetryPolicy::default()).unwrap();

        let err = client.embed_batch(&["hello".to_string()]).await.unwrap_err();
        assert!(matches!(err, RemoteServiceError::MissingCredentials { .. }));
    }
}
