use async_trait::async_trait;
use reqwest::{Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::{Duration, Instant};

use kbsearch_core::config::VectorStoreSettings;
use kbsearch_core::traits::VectorStore;
use kbsearch_core::types::{Candidate, Point, ScrollPage, ScrollRequest};
use kbsearch_core::{Error, Result};

use crate::wire::{
    error_message, CreateCollectionRequest, Envelope, ExistsResult, QueryRequest, QueryResult, ScoredPoint, ScrollBody,
    ScrollResult, UpsertPoint, UpsertRequest,
};

/// A named-vector collection on a Qdrant server, spoken to over its REST API.
pub struct QdrantStore {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    vector_name: String,
}

impl std::fmt::Debug for QdrantStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantStore")
            .field("base_url", &self.base_url)
            .field("collection", &self.collection)
            .field("vector_name", &self.vector_name)
            .finish_non_exhaustive()
    }
}

impl QdrantStore {
    pub fn new(settings: &VectorStoreSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .build()
            .map_err(|e| Error::VectorStore(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: settings.url.trim_end_matches('/').to_string(),
            collection: settings.collection.clone(),
            vector_name: settings.vector_name.clone(),
        })
    }

    pub fn collection(&self) -> &str { &self.collection }

    fn url(&self, suffix: &str) -> String {
        format!("{}/collections/{}{}", self.base_url, self.collection, suffix)
    }

    async fn send<B: Serialize + ?Sized>(&self, method: Method, url: String, body: Option<&B>) -> Result<Response> {
        let mut request = self.client.request(method.clone(), &url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .await
            .map_err(|e| Error::VectorStore(format!("{method} {url} failed: {e}")))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_else(|_| "unable to read response body".into());
            return Err(Error::VectorStore(format!("{method} {url} returned {status}: {}", error_message(&body))));
        }
        Ok(response)
    }

    async fn call<B: Serialize + ?Sized, T: DeserializeOwned>(&self, method: Method, url: String, body: Option<&B>) -> Result<T> {
        let response = self.send(method, url, body).await?;
        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| Error::VectorStore(format!("failed to parse response: {e}")))?;
        Ok(envelope.result)
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn query(&self, vector: &[f32], limit: usize) -> Result<Vec<Candidate>> {
        let start = Instant::now();
        let body = QueryRequest { query: vector, using: &self.vector_name, limit, with_payload: true };
        let result: QueryResult = self.call(Method::POST, self.url("/points/query"), Some(&body)).await?;
        let candidates: Vec<Candidate> = result.points.into_iter().map(ScoredPoint::into_candidate).collect();
        tracing::debug!(
            collection = %self.collection,
            limit,
            hits = candidates.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "similarity query"
        );
        Ok(candidates)
    }

    async fn upsert(&self, points: &[Point]) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        let body = UpsertRequest {
            points: points
                .iter()
                .map(|p| UpsertPoint {
                    id: &p.id,
                    vector: std::iter::once((self.vector_name.as_str(), p.vector.as_slice())).collect(),
                    payload: &p.payload,
                })
                .collect(),
        };
        self.send(Method::PUT, self.url("/points?wait=true"), Some(&body)).await?;
        tracing::debug!(collection = %self.collection, points = points.len(), "upserted points");
        Ok(())
    }

    async fn scroll(&self, request: &ScrollRequest) -> Result<ScrollPage> {
        let body = ScrollBody {
            limit: request.limit,
            offset: request.offset.as_ref(),
            with_payload: true,
            with_vector: request.with_vectors,
        };
        let result: ScrollResult = self.call(Method::POST, self.url("/points/scroll"), Some(&body)).await?;
        Ok(ScrollPage {
            points: result.points.into_iter().map(|p| p.into_stored(&self.vector_name)).collect(),
            next_offset: result.next_page_offset,
        })
    }

    async fn create_collection(&self, dim: usize) -> Result<()> {
        let body = CreateCollectionRequest::cosine(&self.vector_name, dim);
        self.send(Method::PUT, self.url(""), Some(&body)).await?;
        tracing::info!(collection = %self.collection, vector = %self.vector_name, dim, "created collection");
        Ok(())
    }

    async fn delete_collection(&self) -> Result<()> {
        self.send::<()>(Method::DELETE, self.url(""), None).await?;
        tracing::info!(collection = %self.collection, "deleted collection");
        Ok(())
    }

    async fn collection_exists(&self) -> Result<bool> {
        let result: ExistsResult = self.call::<(), _>(Method::GET, self.url("/exists"), None).await?;
        Ok(result.exists)
    }
}
