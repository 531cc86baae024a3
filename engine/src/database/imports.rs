//! Corpus import bookkeeping for the import scanner.

use anyhow::{anyhow, Result};
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

use super::records::{from_millis, parse_uuid, to_millis, CorpusImport, CorpusImportStatus};
use super::Database;
use crate::errors::StoreError;

fn import_from_row(row: &SqliteRow) -> Result<CorpusImport> {
    let id: String = row.try_get("id")?;
    let status: String = row.try_get("status")?;
    let total_size_bytes: i64 = row.try_get("total_size_bytes")?;

    Ok(CorpusImport {
        id: parse_uuid("corpus_imports.id", &id)?,
        folder: row.try_get("folder")?,
        path: row.try_get("path")?,
        name: row.try_get("name")?,
        status: status.parse()?,
        total_size_bytes: u64::try_from(total_size_bytes).map_err(|_| StoreError::Corrupt {
            field: "corpus_imports.total_size_bytes".to_string(),
            value: total_size_bytes.to_string(),
        })?,
        created_at: from_millis(row.try_get("created_at_ms")?)?,
        updated_at: from_millis(row.try_get("updated_at_ms")?)?,
    })
}

impl Database {
    /// Folders that must not be reported again (everything but FAILED)
    pub async fn get_reported_import_folders(&self) -> Result<HashSet<String>> {
        let folders: Vec<String> =
            sqlx::query_scalar("SELECT folder FROM corpus_imports WHERE status != 'FAILED'")
                .fetch_all(&self.pool)
                .await?;

        Ok(folders.into_iter().collect())
    }

    /// Insert or revive the row for `folder` as DETECTED and return it.
    ///
    /// A FAILED row keeps its id so earlier events still point at it.
    pub async fn upsert_detected_import_in(
        conn: &mut SqliteConnection,
        folder: &str,
        path: &str,
        name: &str,
        total_size_bytes: u64,
    ) -> Result<CorpusImport> {
        let now = to_millis(Utc::now());
        let size = i64::try_from(total_size_bytes)
            .map_err(|_| anyhow!("Import size {} does not fit the store", total_size_bytes))?;

        sqlx::query(
            r#"
            INSERT INTO corpus_imports (
                id, folder, path, name, status, total_size_bytes, created_at_ms, updated_at_ms
            ) VALUES (?, ?, ?, ?, 'DETECTED', ?, ?, ?)
            ON CONFLICT(folder) DO UPDATE SET
                path = excluded.path,
                name = excluded.name,
                status = 'DETECTED',
                total_size_bytes = excluded.total_size_bytes,
                updated_at_ms = excluded.updated_at_ms
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(folder)
        .bind(path)
        .bind(name)
        .bind(size)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        let row = sqlx::query(
            r#"
            SELECT id, folder, path, name, status, total_size_bytes, created_at_ms, updated_at_ms
            FROM corpus_imports
            WHERE folder = ?
            "#,
        )
        .bind(folder)
        .fetch_one(&mut *conn)
        .await?;

        let import = import_from_row(&row)?;
        debug!("Corpus import {} recorded for folder {}", import.id, folder);
        Ok(import)
    }

    pub async fn get_corpus_import(&self, id: Uuid) -> Result<Option<CorpusImport>> {
        let row = sqlx::query(
            r#"
            SELECT id, folder, path, name, status, total_size_bytes, created_at_ms, updated_at_ms
            FROM corpus_imports
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(import_from_row).transpose()
    }

    /// Guarded status change, false when the row was not in `from`
    pub async fn set_corpus_import_status(
        &self,
        id: Uuid,
        from: CorpusImportStatus,
        to: CorpusImportStatus,
    ) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        Self::set_corpus_import_status_in(&mut conn, id, from, to).await
    }

    pub async fn set_corpus_import_status_in(
        conn: &mut SqliteConnection,
        id: Uuid,
        from: CorpusImportStatus,
        to: CorpusImportStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE corpus_imports
            SET status = ?, updated_at_ms = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(to.as_str())
        .bind(to_millis(Utc::now()))
        .bind(id.to_string())
        .bind(from.as_str())
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
