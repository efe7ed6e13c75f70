//! SQLite vector index tests against a throwaway database file.

use serde_json::json;
use tempfile::tempdir;

use ragloom::stores::{EmbeddedRecord, SqliteVectorIndex, VectorIndex};

fn record(id: &str, url: &str, chunk_index: usize, text: &str, vector: Vec<f32>) -> EmbeddedRecord {
    EmbeddedRecord {
        id: id.to_string(),
        url: url.to_string(),
        chunk_index,
        text: text.to_string(),
        vector,
        metadata: json!({ "char_start": 0, "char_end": text.len(), "depth": 0 }),
    }
}

#[tokio::test]
async fn upsert_then_search_ranks_by_similarity() {
    let dir = tempdir().unwrap();
    let index = SqliteVectorIndex::open(dir.path().join("index.sqlite"))
        .await
        .unwrap();

    let report = index
        .upsert(vec![
            record("u#0", "u", 0, "aligned", vec![1.0, 0.0, 0.0]),
            record("u#1", "u", 1, "diagonal", vec![0.7, 0.7, 0.0]),
            record("u#2", "u", 2, "orthogonal", vec![0.0, 0.0, 1.0]),
        ])
        .await
        .unwrap();
    assert_eq!(report.succeeded, 3);
    assert!(report.is_clean());
    assert_eq!(index.count().await.unwrap(), 3);

    let hits = index.search(&[1.0, 0.0, 0.0], 2).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].text, "aligned");
    assert_eq!(hits[1].text, "diagonal");
    assert!(hits[0].score >= hits[1].score);
}

#[tokio::test]
async fn upserting_the_same_id_overwrites_in_place() {
    let dir = tempdir().unwrap();
    let index = SqliteVectorIndex::open(dir.path().join("index.sqlite"))
        .await
        .unwrap();

    index
        .upsert(vec![record("p#0", "p", 0, "first text", vec![1.0, 0.0, 0.0])])
        .await
        .unwrap();
    index
        .upsert(vec![record(
            "p#0",
            "p",
            0,
            "second text",
            vec![0.0, 1.0, 0.0],
        )])
        .await
        .unwrap();

    assert_eq!(index.count().await.unwrap(), 1);
    let hits = index.search(&[0.0, 1.0, 0.0], 10).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].text, "second text");
    assert!(hits[0].score > 0.99);
}

#[tokio::test]
async fn search_on_fresh_index_returns_nothing() {
    let dir = tempdir().unwrap();
    let index = SqliteVectorIndex::open(dir.path().join("index.sqlite"))
        .await
        .unwrap();

    let hits = index.search(&[1.0, 0.0, 0.0], 5).await.unwrap();
    assert!(hits.is_empty());
    assert_eq!(index.count().await.unwrap(), 0);
}

#[tokio::test]
async fn delete_by_url_removes_chunks_and_vectors() {
    let dir = tempdir().unwrap();
    let index = SqliteVectorIndex::open(dir.path().join("index.sqlite"))
        .await
        .unwrap();

    index
        .upsert(vec![
            record("https://a#0", "https://a", 0, "from a", vec![1.0, 0.0, 0.0]),
            record("https://a#1", "https://a", 1, "also a", vec![0.9, 0.1, 0.0]),
            record("https://b#0", "https://b", 0, "from b", vec![0.0, 1.0, 0.0]),
        ])
        .await
        .unwrap();

    let removed = index.delete_by_url("https://a").await.unwrap();
    assert_eq!(removed, 2);
    assert_eq!(index.count().await.unwrap(), 1);

    // The survivor is still searchable; the deleted vectors are gone.
    let hits = index.search(&[0.0, 1.0, 0.0], 10).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].text, "from b");
}

#[tokio::test]
async fn reopening_the_database_preserves_records() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.sqlite");

    {
        let index = SqliteVectorIndex::open(&path).await.unwrap();
        index
            .upsert(vec![record("d#0", "d", 0, "durable", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap();
    }

    let index = SqliteVectorIndex::open(&path).await.unwrap();
    assert_eq!(index.count().await.unwrap(), 1);
    let hits = index.search(&[1.0, 0.0, 0.0], 1).await.unwrap();
    assert_eq!(hits[0].text, "durable");
}
