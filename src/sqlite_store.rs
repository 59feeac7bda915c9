//! SQLite-backed [`DocumentStore`] implementation.
//!
//! Documents and chunks live in the `documents` and `chunks` tables (see
//! [`migrate`](crate::migrate)). Staged chunks are rows with `active = 0`;
//! [`commit`](DocumentStore::commit) flips them and deletes the previous
//! version inside one transaction.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use docqa_core::models::{Chunk, Document, DocumentStatus};
use docqa_core::store::{blob_to_vec, vec_to_blob, CommittedChunk, DocumentStore};
use docqa_core::{QaError, Result};

/// SQLite implementation of the [`DocumentStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn db_err(e: sqlx::Error) -> QaError {
    QaError::storage(e)
}

const DOCUMENT_COLUMNS: &str =
    "id, title, content, content_type, content_hash, ingested_at, status, last_error";

const CHUNK_COLUMNS: &str =
    "id, document_id, chunk_index, start_offset, end_offset, text, hash, embedding";

fn row_to_document(row: &SqliteRow) -> Result<Document> {
    let status: String = row.get("status");
    Ok(Document {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        content_type: row.get("content_type"),
        content_hash: row.get("content_hash"),
        ingested_at: row.get("ingested_at"),
        status: status.parse()?,
        last_error: row.get("last_error"),
    })
}

fn row_to_chunk(row: &SqliteRow) -> Chunk {
    let chunk_index: i64 = row.get("chunk_index");
    let start: i64 = row.get("start_offset");
    let end: i64 = row.get("end_offset");
    let embedding: Option<Vec<u8>> = row.get("embedding");
    Chunk {
        id: row.get("id"),
        document_id: row.get("document_id"),
        chunk_index: chunk_index as usize,
        start: start as usize,
        end: end as usize,
        text: row.get("text"),
        hash: row.get("hash"),
        embedding: embedding.map(|b| blob_to_vec(&b)),
    }
}

/// Append `(?, ?, ...)` binding every id.
fn push_id_list<'a>(builder: &mut QueryBuilder<'a, Sqlite>, ids: &'a [String]) {
    builder.push("(");
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(")");
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(row_to_document).transpose()
    }

    async fn list_documents(&self) -> Result<Vec<Document>> {
        let rows = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(row_to_document).collect()
    }

    async fn put_document(&self, doc: &Document) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, title, content, content_type, content_hash,
                                   ingested_at, status, last_error)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                content = excluded.content,
                content_type = excluded.content_type,
                content_hash = excluded.content_hash,
                ingested_at = excluded.ingested_at,
                status = excluded.status,
                last_error = excluded.last_error
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.title)
        .bind(&doc.content)
        .bind(&doc.content_type)
        .bind(&doc.content_hash)
        .bind(doc.ingested_at)
        .bind(doc.status.as_str())
        .bind(&doc.last_error)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn set_status(
        &self,
        id: &str,
        status: DocumentStatus,
        last_error: Option<&str>,
    ) -> Result<()> {
        let result = sqlx::query("UPDATE documents SET status = ?, last_error = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(last_error)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(QaError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn stage_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        for chunk in chunks {
            let blob = chunk.embedding.as_deref().map(vec_to_blob);
            let dims = chunk.embedding.as_ref().map_or(0, |v| v.len() as i64);
            sqlx::query(
                r#"
                INSERT INTO chunks (id, document_id, chunk_index, start_offset, end_offset,
                                    text, hash, embedding, dims, active)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0)
                "#,
            )
            .bind(&chunk.id)
            .bind(&chunk.document_id)
            .bind(chunk.chunk_index as i64)
            .bind(chunk.start as i64)
            .bind(chunk.end as i64)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .bind(blob)
            .bind(dims)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn discard_chunks(&self, chunk_ids: &[String]) -> Result<()> {
        if chunk_ids.is_empty() {
            return Ok(());
        }
        let mut builder = QueryBuilder::<Sqlite>::new("DELETE FROM chunks WHERE id IN ");
        push_id_list(&mut builder, chunk_ids);
        builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn commit(&self, doc: &Document, active: &[String]) -> Result<Vec<String>> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query(
            r#"
            INSERT INTO documents (id, title, content, content_type, content_hash,
                                   ingested_at, status, last_error)
            VALUES (?, ?, ?, ?, ?, ?, 'indexed', NULL)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                content = excluded.content,
                content_type = excluded.content_type,
                content_hash = excluded.content_hash,
                ingested_at = excluded.ingested_at,
                status = 'indexed',
                last_error = NULL
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.title)
        .bind(&doc.content)
        .bind(&doc.content_type)
        .bind(&doc.content_hash)
        .bind(doc.ingested_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        let mut removed_query =
            QueryBuilder::<Sqlite>::new("SELECT id FROM chunks WHERE document_id = ");
        removed_query.push_bind(&doc.id);

        if !active.is_empty() {
            let mut activate = QueryBuilder::<Sqlite>::new(
                "UPDATE chunks SET active = 1 WHERE document_id = ",
            );
            activate.push_bind(&doc.id);
            activate.push(" AND id IN ");
            push_id_list(&mut activate, active);
            let result = activate
                .build()
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;

            if result.rows_affected() != active.len() as u64 {
                // Dropping the transaction rolls it back.
                return Err(QaError::Storage(format!(
                    "cannot commit document '{}': {} of {} chunks are not staged for it",
                    doc.id,
                    active.len() as u64 - result.rows_affected(),
                    active.len()
                )));
            }

            removed_query.push(" AND id NOT IN ");
            push_id_list(&mut removed_query, active);
        }

        let removed: Vec<String> = removed_query
            .build()
            .fetch_all(&mut *tx)
            .await
            .map_err(db_err)?
            .iter()
            .map(|row| row.get("id"))
            .collect();

        if !removed.is_empty() {
            let mut delete = QueryBuilder::<Sqlite>::new("DELETE FROM chunks WHERE id IN ");
            push_id_list(&mut delete, &removed);
            delete
                .build()
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(removed)
    }

    async fn active_chunk_ids(&self, document_id: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT id FROM chunks WHERE document_id = ? AND active = 1 ORDER BY chunk_index ASC",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.iter().map(|row| row.get("id")).collect())
    }

    async fn get_chunks(&self, chunk_ids: &[String]) -> Result<Vec<Chunk>> {
        if chunk_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {CHUNK_COLUMNS} FROM chunks WHERE active = 1 AND id IN "
        ));
        push_id_list(&mut builder, chunk_ids);
        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(rows.iter().map(row_to_chunk).collect())
    }

    async fn delete_document(&self, id: &str) -> Result<Option<Vec<String>>> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let chunk_ids: Vec<String> = sqlx::query("SELECT id FROM chunks WHERE document_id = ?")
            .bind(id)
            .fetch_all(&mut *tx)
            .await
            .map_err(db_err)?
            .iter()
            .map(|row| row.get("id"))
            .collect();

        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        let deleted = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        if deleted.rows_affected() == 0 {
            return Ok(None);
        }

        tx.commit().await.map_err(db_err)?;
        Ok(Some(chunk_ids))
    }

    async fn committed_chunks(&self) -> Result<Vec<CommittedChunk>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.document_id, c.chunk_index, c.start_offset, c.end_offset,
                   c.text, c.hash, c.embedding, d.title
            FROM chunks c
            JOIN documents d ON d.id = c.document_id
            WHERE c.active = 1 AND c.embedding IS NOT NULL AND d.status = 'indexed'
            ORDER BY c.document_id ASC, c.chunk_index ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows
            .iter()
            .map(|row| CommittedChunk {
                chunk: row_to_chunk(row),
                title: row.get("title"),
            })
            .collect())
    }

    async fn purge_staged(&self) -> Result<usize> {
        let result = sqlx::query("DELETE FROM chunks WHERE active = 0")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_core::chunk::{chunk_text, ChunkConfig};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::migrate::apply(&pool).await.unwrap();
        SqliteStore::new(pool)
    }

    fn doc(id: &str, content: &str) -> Document {
        Document {
            id: id.to_string(),
            title: format!("{id} title"),
            content: content.to_string(),
            content_type: "text/plain".to_string(),
            content_hash: docqa_core::chunk::sha256_hex(content),
            ingested_at: 1_700_000_000,
            status: DocumentStatus::Pending,
            last_error: None,
        }
    }

    fn embedded_chunks(doc: &Document) -> Vec<Chunk> {
        let config = ChunkConfig::new(20, 5).unwrap();
        let mut chunks = chunk_text(&doc.id, &doc.content, &config).unwrap();
        for (i, c) in chunks.iter_mut().enumerate() {
            c.embedding = Some(vec![i as f32 + 1.0, 0.5, -0.25]);
        }
        chunks
    }

    fn ids(chunks: &[Chunk]) -> Vec<String> {
        chunks.iter().map(|c| c.id.clone()).collect()
    }

    #[tokio::test]
    async fn test_staged_chunks_hidden_until_commit() {
        let store = store().await;
        let d = doc("guide", "Chapter one text. Chapter two text. Chapter three.");
        store.put_document(&d).await.unwrap();
        let chunks = embedded_chunks(&d);
        store.stage_chunks(&chunks).await.unwrap();

        assert!(store.get_chunks(&ids(&chunks)).await.unwrap().is_empty());
        assert!(store.committed_chunks().await.unwrap().is_empty());

        let removed = store.commit(&d, &ids(&chunks)).await.unwrap();
        assert!(removed.is_empty());

        let loaded = store.get_chunks(&ids(&chunks)).await.unwrap();
        assert_eq!(loaded.len(), chunks.len());
        let first = loaded.iter().find(|c| c.chunk_index == 0).unwrap();
        assert_eq!(first.embedding.as_deref(), Some(&[1.0f32, 0.5, -0.25][..]));
        assert_eq!((first.start, first.end), (chunks[0].start, chunks[0].end));

        let stored = store.get_document("guide").await.unwrap().unwrap();
        assert_eq!(stored.status, DocumentStatus::Indexed);
        assert_eq!(store.active_chunk_ids("guide").await.unwrap(), ids(&chunks));
    }

    #[tokio::test]
    async fn test_commit_swaps_versions() {
        let store = store().await;
        let v1 = doc("guide", "Old version of the guide text.");
        store.put_document(&v1).await.unwrap();
        let old = embedded_chunks(&v1);
        store.stage_chunks(&old).await.unwrap();
        store.commit(&v1, &ids(&old)).await.unwrap();

        let v2 = doc("guide", "New version.");
        let new = embedded_chunks(&v2);
        store.stage_chunks(&new).await.unwrap();

        // Old version still served while the new one is staged.
        assert_eq!(store.active_chunk_ids("guide").await.unwrap(), ids(&old));

        let mut removed = store.commit(&v2, &ids(&new)).await.unwrap();
        removed.sort();
        let mut expected = ids(&old);
        expected.sort();
        assert_eq!(removed, expected);
        assert_eq!(store.active_chunk_ids("guide").await.unwrap(), ids(&new));
        assert_eq!(
            store.get_document("guide").await.unwrap().unwrap().content,
            "New version."
        );
    }

    #[tokio::test]
    async fn test_commit_rejects_foreign_chunks() {
        let store = store().await;
        let a = doc("a", "Alpha text.");
        let b = doc("b", "Bravo text.");
        store.put_document(&a).await.unwrap();
        store.put_document(&b).await.unwrap();
        let b_chunks = embedded_chunks(&b);
        store.stage_chunks(&b_chunks).await.unwrap();

        let err = store.commit(&a, &ids(&b_chunks)).await.unwrap_err();
        assert!(matches!(err, QaError::Storage(_)));
        // Rolled back: document a was not marked indexed.
        let a_stored = store.get_document("a").await.unwrap().unwrap();
        assert_eq!(a_stored.status, DocumentStatus::Pending);
    }

    #[tokio::test]
    async fn test_discard_and_purge_staged() {
        let store = store().await;
        let d = doc("guide", "Chapter one text. Chapter two text.");
        store.put_document(&d).await.unwrap();
        let chunks = embedded_chunks(&d);
        store.stage_chunks(&chunks).await.unwrap();
        store.discard_chunks(&ids(&chunks)[..1]).await.unwrap();

        assert_eq!(store.purge_staged().await.unwrap(), chunks.len() - 1);
        assert_eq!(store.purge_staged().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_document_cascades() {
        let store = store().await;
        let d = doc("guide", "Chapter one text. Chapter two text.");
        store.put_document(&d).await.unwrap();
        let chunks = embedded_chunks(&d);
        store.stage_chunks(&chunks).await.unwrap();
        store.commit(&d, &ids(&chunks)).await.unwrap();

        let removed = store.delete_document("guide").await.unwrap().unwrap();
        assert_eq!(removed.len(), chunks.len());
        assert!(store.get_document("guide").await.unwrap().is_none());
        assert!(store.get_chunks(&ids(&chunks)).await.unwrap().is_empty());
        assert!(store.delete_document("guide").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_status_and_listing() {
        let store = store().await;
        store.put_document(&doc("b", "Bravo.")).await.unwrap();
        store.put_document(&doc("a", "Alpha.")).await.unwrap();

        store
            .set_status("a", DocumentStatus::Failed, Some("embedder down"))
            .await
            .unwrap();
        let listed = store.list_documents().await.unwrap();
        assert_eq!(listed[0].id, "a");
        assert_eq!(listed[0].status, DocumentStatus::Failed);
        assert_eq!(listed[0].last_error.as_deref(), Some("embedder down"));
        assert_eq!(listed[1].id, "b");

        let err = store
            .set_status("missing", DocumentStatus::Indexed, None)
            .await
            .unwrap_err();
        assert!(matches!(err, QaError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_committed_chunks_carry_titles() {
        let store = store().await;
        let d = doc("guide", "Chapter one text. Chapter two text.");
        store.put_document(&d).await.unwrap();
        let chunks = embedded_chunks(&d);
        store.stage_chunks(&chunks).await.unwrap();
        store.commit(&d, &ids(&chunks)).await.unwrap();

        let committed = store.committed_chunks().await.unwrap();
        assert_eq!(committed.len(), chunks.len());
        assert!(committed.iter().all(|c| c.title == "guide title"));
        assert_eq!(committed[0].chunk.chunk_index, 0);
    }
}
