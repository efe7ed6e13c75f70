//! SQLite-backed vector index using the `sqlite-vec` extension.
//!
//! Layout: a `chunks` table holding text and metadata with
//! `id TEXT PRIMARY KEY`, and a `chunk_vectors` vec0 virtual table holding
//! embeddings, joined by rowid. Similarity search runs through
//! `vec_distance_cosine`; scores reported to callers are `1 - distance`.

use std::mem::transmute;
use std::os::raw::c_char;
use std::path::Path;
use std::sync::Once;

use async_trait::async_trait;
use tokio_rusqlite::{Connection, OptionalExtension, ffi};
use tracing::debug;

use crate::stores::{EmbeddedRecord, RetrievedChunk, UpsertFailure, UpsertReport, VectorIndex};
use crate::types::RagError;

#[derive(Clone)]
pub struct SqliteVectorIndex {
    conn: Connection,
}

impl SqliteVectorIndex {
    /// Opens (or creates) the index at `path` and prepares the schema.
    ///
    /// The vector table itself is created lazily on first upsert, once the
    /// embedding dimensionality is known.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, RagError> {
        Self::register_sqlite_vec()?;
        let conn = Connection::open(path)
            .await
            .map_err(|err| RagError::Index(err.to_string()))?;

        conn.call(|conn| -> Result<(), tokio_rusqlite::Error> {
            // Confirm the extension actually loaded.
            conn.query_row("select vec_version()", [], |row| row.get::<_, String>(0))?;
            conn.execute(
                "CREATE TABLE IF NOT EXISTS chunks (
                    id TEXT PRIMARY KEY,
                    url TEXT,
                    chunk_index INTEGER,
                    content TEXT,
                    metadata TEXT
                )",
                [],
            )?;
            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_chunks_url ON chunks(url)",
                [],
            )?;
            Ok(())
        })
        .await
        .map_err(|err| RagError::Index(err.to_string()))?;

        Ok(Self { conn })
    }

    fn register_sqlite_vec() -> Result<(), RagError> {
        use std::sync::Mutex;

        static INIT: Once = Once::new();
        static INIT_RESULT: Mutex<Option<Result<(), String>>> = Mutex::new(None);

        INIT.call_once(|| {
            let result = unsafe {
                type SqliteExtensionInit = unsafe extern "C" fn(
                    *mut ffi::sqlite3,
                    *mut *mut c_char,
                    *const ffi::sqlite3_api_routines,
                ) -> i32;

                let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
                let init_fn: SqliteExtensionInit =
                    transmute::<unsafe extern "C" fn(), SqliteExtensionInit>(init);
                let rc = ffi::sqlite3_auto_extension(Some(init_fn));
                if rc != 0 {
                    Err(format!(
                        "failed to register sqlite-vec extension (code {rc})"
                    ))
                } else {
                    Ok(())
                }
            };
            *INIT_RESULT.lock().expect("init result mutex poisoned") = Some(result);
        });

        INIT_RESULT
            .lock()
            .expect("init result mutex poisoned")
            .clone()
            .expect("init was called but result not set")
            .map_err(RagError::Index)
    }
}

/// Pre-serialized row, so JSON encoding happens before the connection hop.
struct PreparedRow {
    id: String,
    url: String,
    chunk_index: i64,
    content: String,
    metadata: String,
    embedding: String,
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    async fn upsert(&self, records: Vec<EmbeddedRecord>) -> Result<UpsertReport, RagError> {
        if records.is_empty() {
            return Ok(UpsertReport::default());
        }

        let dims = records[0].vector.len();
        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let embedding = serde_json::to_string(&record.vector)
                .map_err(|err| RagError::Index(err.to_string()))?;
            rows.push(PreparedRow {
                id: record.id,
                url: record.url,
                chunk_index: record.chunk_index as i64,
                content: record.text,
                metadata: record.metadata.to_string(),
                embedding,
            });
        }

        let report = self
            .conn
            .call(move |conn| -> Result<UpsertReport, tokio_rusqlite::Error> {
                conn.execute(
                    &format!(
                        "CREATE VIRTUAL TABLE IF NOT EXISTS chunk_vectors \
                         USING vec0(embedding float[{dims}])"
                    ),
                    [],
                )?;

                let mut report = UpsertReport::default();
                for row in &rows {
                    // One transaction per record: an interrupted batch never
                    // leaves a chunk without its vector.
                    let result: Result<(), tokio_rusqlite::Error> = (|| {
                        let tx = conn.transaction()?;
                        let existing: Option<i64> = tx
                            .query_row(
                                "SELECT rowid FROM chunks WHERE id = ?1",
                                [&row.id],
                                |r| r.get(0),
                            )
                            .optional()?;
                        let rowid = match existing {
                            Some(rowid) => {
                                tx.execute(
                                    "UPDATE chunks SET url = ?1, chunk_index = ?2, \
                                     content = ?3, metadata = ?4 WHERE rowid = ?5",
                                    (&row.url, row.chunk_index, &row.content, &row.metadata, rowid),
                                )?;
                                tx.execute(
                                    "DELETE FROM chunk_vectors WHERE rowid = ?1",
                                    [rowid],
                                )?;
                                rowid
                            }
                            None => {
                                tx.execute(
                                    "INSERT INTO chunks (id, url, chunk_index, content, metadata) \
                                     VALUES (?1, ?2, ?3, ?4, ?5)",
                                    (&row.id, &row.url, row.chunk_index, &row.content, &row.metadata),
                                )?;
                                tx.last_insert_rowid()
                            }
                        };
                        tx.execute(
                            "INSERT INTO chunk_vectors (rowid, embedding) VALUES (?1, ?2)",
                            (rowid, &row.embedding),
                        )?;
                        tx.commit()?;
                        Ok(())
                    })();

                    match result {
                        Ok(()) => report.succeeded += 1,
                        Err(err) => report.failures.push(UpsertFailure {
                            id: row.id.clone(),
                            message: err.to_string(),
                        }),
                    }
                }
                Ok(report)
            })
            .await
            .map_err(|err| RagError::Index(err.to_string()))?;

        debug!(
            succeeded = report.succeeded,
            failed = report.failures.len(),
            "upsert batch finished"
        );
        Ok(report)
    }

    async fn search(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievedChunk>, RagError> {
        let query_json =
            serde_json::to_string(vector).map_err(|err| RagError::Index(err.to_string()))?;

        self.conn
            .call(move |conn| -> Result<Vec<RetrievedChunk>, tokio_rusqlite::Error> {
                let tables: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master \
                     WHERE type = 'table' AND name = 'chunk_vectors'",
                    [],
                    |row| row.get(0),
                )?;
                if tables == 0 {
                    // Nothing has been upserted yet.
                    return Ok(Vec::new());
                }

                let mut stmt = conn.prepare(&format!(
                    "SELECT c.id, c.url, c.chunk_index, c.content, \
                     vec_distance_cosine(v.embedding, vec_f32(?1)) AS distance \
                     FROM chunks c \
                     JOIN chunk_vectors v ON v.rowid = c.rowid \
                     ORDER BY distance ASC \
                     LIMIT {top_k}"
                ))?;

                let rows = stmt.query_map([&query_json], |row| {
                    let distance: f32 = row.get(4)?;
                    Ok(RetrievedChunk {
                        id: row.get(0)?,
                        url: row.get(1)?,
                        chunk_index: row.get::<_, i64>(2)? as usize,
                        text: row.get(3)?,
                        score: 1.0 - distance,
                    })
                })?;

                let mut hits = Vec::new();
                for row in rows {
                    hits.push(row?);
                }
                Ok(hits)
            })
            .await
            .map_err(|err| RagError::Index(err.to_string()))
    }

    async fn delete_by_url(&self, url: &str) -> Result<usize, RagError> {
        let url = url.to_string();
        self.conn
            .call(move |conn| -> Result<usize, tokio_rusqlite::Error> {
                let tx = conn.transaction()?;
                let tables: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM sqlite_master \
                     WHERE type = 'table' AND name = 'chunk_vectors'",
                    [],
                    |row| row.get(0),
                )?;
                if tables > 0 {
                    tx.execute(
                        "DELETE FROM chunk_vectors WHERE rowid IN \
                         (SELECT rowid FROM chunks WHERE url = ?1)",
                        [&url],
                    )?;
                }
                let deleted = tx.execute("DELETE FROM chunks WHERE url = ?1", [&url])?;
                tx.commit()?;
                Ok(deleted)
            })
            .await
            .map_err(|err| RagError::Index(err.to_string()))
    }

    async fn count(&self) -> Result<usize, RagError> {
        self.conn
            .call(|conn| -> Result<usize, tokio_rusqlite::Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
                Ok(count as usize)
            })
            .await
            .map_err(|err| RagError::Index(err.to_string()))
    }
}
