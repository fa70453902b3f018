//! Qdrant vector store adapter
//!
//! Drives the store over its HTTP API. The collection is created lazily on
//! first use with a fixed schema: 512-dim cosine vectors, HNSW m=16 /
//! ef_construct=200, INT8 scalar quantization (quantile 0.99, always in
//! RAM), keyword payload indexes on `track_id` and `genre`. Creation is
//! idempotent: losing a concurrent create race is treated as success.
//!
//! Points are keyed by fresh UUIDs; `track_id` in the payload is the
//! stable back-reference for deletes and result mapping.

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ServiceConfig;
use crate::services::embedding::AudioChunk;

/// Upsert batch size, keeping individual requests bounded
const UPSERT_BATCH_SIZE: usize = 100;

/// HNSW search width at query time
const QUERY_HNSW_EF: u64 = 128;

/// Vector store errors
#[derive(Debug, Error)]
pub enum QdrantError {
    /// Transport-level failure
    #[error("Qdrant network error: {0}")]
    Network(String),

    /// Store answered with an error status
    #[error("Qdrant API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// Response body did not parse
    #[error("Failed to parse Qdrant response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for QdrantError {
    fn from(e: reqwest::Error) -> Self {
        QdrantError::Network(e.to_string())
    }
}

/// Static payload fields attached to every point of a track
#[derive(Debug, Clone, Default)]
pub struct PointMetadata {
    pub artist: String,
    pub title: String,
    pub genre: String,
}

/// A scored point from a similarity query
#[derive(Debug, Clone, Deserialize)]
pub struct ScoredPoint {
    /// Point id (UUID string or integer, depending on store config)
    pub id: serde_json::Value,
    /// Cosine similarity score
    pub score: f64,
    /// Point payload
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    result: QueryResult,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    #[serde(default)]
    points: Vec<ScoredPoint>,
}

#[derive(Debug, Serialize)]
struct UpsertPoint {
    id: String,
    vector: Vec<f32>,
    payload: serde_json::Value,
}

/// Qdrant HTTP client
#[derive(Debug, Clone)]
pub struct QdrantClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    collection: String,
    dim: usize,
}

impl QdrantClient {
    /// Build a client from service configuration.
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.qdrant_url.trim_end_matches('/').to_string(),
            api_key: config.qdrant_api_key.clone(),
            collection: config.qdrant_collection.clone(),
            dim: config.embedding_dim,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .http
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(key) = &self.api_key {
            builder = builder.header("api-key", key);
        }
        builder
    }

    /// Verify the store is reachable.
    pub async fn health_check(&self) -> Result<(), QdrantError> {
        let response = self.request(reqwest::Method::GET, "/collections").send().await?;
        if !response.status().is_success() {
            return Err(QdrantError::Api {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }

    /// Create the collection and its payload indexes if absent.
    pub async fn ensure_collection(&self) -> Result<(), QdrantError> {
        if self.collection_exists().await? {
            return Ok(());
        }

        let schema = json!({
            "vectors": { "size": self.dim, "distance": "Cosine" },
            "hnsw_config": { "m": 16, "ef_construct": 200 },
            "quantization_config": {
                "scalar": { "type": "int8", "quantile": 0.99, "always_ram": true }
            }
        });

        let response = self
            .request(
                reqwest::Method::PUT,
                &format!("/collections/{}", self.collection),
            )
            .json(&schema)
            .send()
            .await?;

        if !response.status().is_success() {
            // A concurrent first-upsert may have won the create race; an
            // existing collection is the outcome we wanted.
            if self.collection_exists().await? {
                debug!(collection = %self.collection, "Collection created concurrently");
            } else {
                return Err(QdrantError::Api {
                    status: response.status().as_u16(),
                    body: response.text().await.unwrap_or_default(),
                });
            }
        } else {
            info!(collection = %self.collection, dim = self.dim, "Created vector collection");
        }

        for field in ["track_id", "genre"] {
            let response = self
                .request(
                    reqwest::Method::PUT,
                    &format!("/collections/{}/index", self.collection),
                )
                .json(&json!({ "field_name": field, "field_schema": "keyword" }))
                .send()
                .await?;
            if !response.status().is_success() {
                warn!(
                    field,
                    status = response.status().as_u16(),
                    "Payload index creation failed (may already exist)"
                );
            }
        }

        Ok(())
    }

    async fn collection_exists(&self) -> Result<bool, QdrantError> {
        let response = self
            .request(
                reqwest::Method::GET,
                &format!("/collections/{}", self.collection),
            )
            .send()
            .await?;
        Ok(response.status().is_success())
    }

    /// Upsert all chunk embeddings for a track. Returns the point count.
    pub async fn upsert_chunks(
        &self,
        track_id: Uuid,
        chunks: &[AudioChunk],
        metadata: &PointMetadata,
    ) -> Result<usize, QdrantError> {
        if chunks.is_empty() {
            return Ok(0);
        }

        self.ensure_collection().await?;

        let points: Vec<UpsertPoint> = chunks
            .iter()
            .map(|chunk| UpsertPoint {
                id: Uuid::new_v4().to_string(),
                vector: chunk.embedding.clone(),
                payload: json!({
                    "track_id": track_id.to_string(),
                    "offset_sec": chunk.offset_sec,
                    "chunk_index": chunk.chunk_index,
                    "duration_sec": chunk.duration_sec,
                    "artist": metadata.artist,
                    "title": metadata.title,
                    "genre": metadata.genre,
                }),
            })
            .collect();

        for batch in points.chunks(UPSERT_BATCH_SIZE) {
            let response = self
                .request(
                    reqwest::Method::PUT,
                    &format!("/collections/{}/points?wait=true", self.collection),
                )
                .json(&json!({ "points": batch }))
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(QdrantError::Api {
                    status: response.status().as_u16(),
                    body: response.text().await.unwrap_or_default(),
                });
            }
        }

        info!(track_id = %track_id, points = points.len(), "Upserted chunk embeddings");
        Ok(points.len())
    }

    /// Delete every point whose payload `track_id` matches.
    pub async fn delete_track(&self, track_id: Uuid) -> Result<(), QdrantError> {
        let body = json!({
            "filter": {
                "must": [
                    { "key": "track_id", "match": { "value": track_id.to_string() } }
                ]
            }
        });

        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/collections/{}/points/delete?wait=true", self.collection),
            )
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(QdrantError::Api {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        info!(track_id = %track_id, "Deleted track embeddings");
        Ok(())
    }

    /// Nearest-neighbour query with payloads.
    pub async fn query(
        &self,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, QdrantError> {
        let body = json!({
            "query": vector,
            "limit": limit,
            "with_payload": true,
            "params": { "hnsw_ef": QUERY_HNSW_EF }
        });

        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/collections/{}/points/query", self.collection),
            )
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(QdrantError::Api {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| QdrantError::Parse(e.to_string()))?;

        Ok(parsed.result.points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_response_parses_points() {
        let body = r#"{
            "result": {
                "points": [
                    {
                        "id": "3f2c8a62-0000-0000-0000-000000000001",
                        "score": 0.91,
                        "payload": {
                            "track_id": "9b2e41f2-8c1d-4b7a-9d30-111111111111",
                            "offset_sec": 5.0,
                            "chunk_index": 1
                        }
                    }
                ]
            },
            "status": "ok",
            "time": 0.002
        }"#;
        let parsed: QueryResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.result.points.len(), 1);
        assert_eq!(parsed.result.points[0].score, 0.91);
    }

    #[test]
    fn missing_points_defaults_to_empty() {
        let parsed: QueryResponse = serde_json::from_str(r#"{"result": {}}"#).unwrap();
        assert!(parsed.result.points.is_empty());
    }

    #[tokio::test]
    async fn empty_chunk_list_upserts_nothing() {
        let client = QdrantClient::from_config(&ServiceConfig::default());
        let count = client
            .upsert_chunks(Uuid::new_v4(), &[], &PointMetadata::default())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn unreachable_store_surfaces_network_error() {
        // Discard port: connection is refused immediately
        let config = ServiceConfig {
            qdrant_url: "http://127.0.0.1:9".to_string(),
            ..ServiceConfig::default()
        };
        let client = QdrantClient::from_config(&config);

        assert!(matches!(
            client.delete_track(Uuid::new_v4()).await,
            Err(QdrantError::Network(_))
        ));
        assert!(matches!(
            client.health_check().await,
            Err(QdrantError::Network(_))
        ));
    }
}
