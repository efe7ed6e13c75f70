//! In-memory vector index: brute-force cosine scan over a hash map.
//!
//! Fine for tests, demos, and small corpora; anything durable should use
//! [`crate::stores::SqliteVectorIndex`].

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::stores::{EmbeddedRecord, RetrievedChunk, UpsertReport, VectorIndex};
use crate::types::RagError;

#[derive(Debug, Default)]
pub struct MemoryVectorIndex {
    records: RwLock<HashMap<String, EmbeddedRecord>>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn upsert(&self, records: Vec<EmbeddedRecord>) -> Result<UpsertReport, RagError> {
        let mut guard = self.records.write();
        let mut report = UpsertReport::default();
        for record in records {
            guard.insert(record.id.clone(), record);
            report.succeeded += 1;
        }
        Ok(report)
    }

    async fn search(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievedChunk>, RagError> {
        let guard = self.records.read();
        let mut hits: Vec<RetrievedChunk> = guard
            .values()
            .filter(|record| record.vector.len() == vector.len())
            .map(|record| RetrievedChunk {
                id: record.id.clone(),
                url: record.url.clone(),
                chunk_index: record.chunk_index,
                text: record.text.clone(),
                score: cosine_similarity(&record.vector, vector),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn delete_by_url(&self, url: &str) -> Result<usize, RagError> {
        let mut guard = self.records.write();
        let before = guard.len();
        guard.retain(|_, record| record.url != url);
        Ok(before - guard.len())
    }

    async fn count(&self) -> Result<usize, RagError> {
        Ok(self.records.read().len())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, url: &str, vector: Vec<f32>, text: &str) -> EmbeddedRecord {
        EmbeddedRecord {
            id: id.to_string(),
            url: url.to_string(),
            chunk_index: 0,
            text: text.to_string(),
            vector,
            metadata: json!({}),
        }
    }

    #[tokio::test]
    async fn upsert_same_id_overwrites() {
        let index = MemoryVectorIndex::new();
        index
            .upsert(vec![record("a#0", "a", vec![1.0, 0.0], "first")])
            .await
            .unwrap();
        index
            .upsert(vec![record("a#0", "a", vec![0.0, 1.0], "second")])
            .await
            .unwrap();

        assert_eq!(index.count().await.unwrap(), 1);
        let hits = index.search(&[0.0, 1.0], 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "second");
    }

    #[tokio::test]
    async fn search_ranks_by_similarity_and_caps_at_top_k() {
        let index = MemoryVectorIndex::new();
        index
            .upsert(vec![
                record("a#0", "a", vec![1.0, 0.0], "aligned"),
                record("a#1", "a", vec![0.7, 0.7], "diagonal"),
                record("a#2", "a", vec![0.0, 1.0], "orthogonal"),
            ])
            .await
            .unwrap();

        let hits = index.search(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "aligned");
        assert_eq!(hits[1].text, "diagonal");
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn empty_index_returns_no_hits() {
        let index = MemoryVectorIndex::new();
        let hits = index.search(&[1.0, 0.0], 5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn delete_by_url_removes_only_that_source() {
        let index = MemoryVectorIndex::new();
        index
            .upsert(vec![
                record("a#0", "https://a", vec![1.0, 0.0], "keep me out"),
                record("b#0", "https://b", vec![0.0, 1.0], "keep me in"),
            ])
            .await
            .unwrap();

        let removed = index.delete_by_url("https://a").await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(index.count().await.unwrap(), 1);
    }
}
