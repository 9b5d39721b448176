//! `sources` table: [`SourceStore`] for [`Storage`].

use async_trait::async_trait;
use libsql::params;
use topicrawl_shared::{
    NewSource, Result, Source, SourceIds, SourceStore, SourceUpdate, TaskSource, TopicrawlError,
};

use crate::{Storage, parse_col, parse_ts, storage_err, ts};

/// Upper bound on bound parameters per `IN (...)` lookup.
const LOOKUP_CHUNK: usize = 200;

#[async_trait]
impl SourceStore for Storage {
    async fn get_by_urls(&self, urls: &[String]) -> Result<Vec<Source>> {
        let mut sources = Vec::new();

        for chunk in urls.chunks(LOOKUP_CHUNK) {
            let placeholders = (1..=chunk.len())
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ");
            let values: Vec<libsql::Value> = chunk
                .iter()
                .map(|u| libsql::Value::from(u.clone()))
                .collect();

            let mut rows = self
                .conn
                .query(
                    &format!(
                        "SELECT id, url, title, status, created_at, updated_at
                           FROM sources WHERE url IN ({placeholders})"
                    ),
                    values,
                )
                .await
                .map_err(storage_err)?;

            while let Some(row) = rows.next().await.map_err(storage_err)? {
                sources.push(row_to_source(&row)?);
            }
        }

        Ok(sources)
    }

    async fn create(&self, sources: &[NewSource]) -> Result<SourceIds> {
        let mut ids = SourceIds::with_capacity(sources.len());
        if sources.is_empty() {
            return Ok(ids);
        }

        let _guard = self.write().await;
        let tx = self.conn.transaction().await.map_err(storage_err)?;

        for source in sources {
            let now = ts(&source.created_at);
            // A concurrent launch of another task may have inserted the URL
            // since it was looked up; take over that row instead of failing.
            let mut rows = tx
                .query(
                    "INSERT INTO sources (url, title, status, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?4)
                     ON CONFLICT(url) DO UPDATE
                        SET title = excluded.title,
                            status = excluded.status,
                            updated_at = excluded.updated_at
                     RETURNING id",
                    params![
                        source.url.as_str(),
                        source.title.as_str(),
                        source.status.as_str(),
                        now.as_str()
                    ],
                )
                .await
                .map_err(storage_err)?;

            let row = rows
                .next()
                .await
                .map_err(storage_err)?
                .ok_or_else(|| TopicrawlError::Storage("source insert returned no id".into()))?;
            ids.insert(source.url.clone(), row.get::<i64>(0).map_err(storage_err)?);
        }

        tx.commit().await.map_err(storage_err)?;
        tracing::debug!(count = ids.len(), "sources created");
        Ok(ids)
    }

    async fn update(&self, sources: &[SourceUpdate]) -> Result<SourceIds> {
        let mut ids = SourceIds::with_capacity(sources.len());
        if sources.is_empty() {
            return Ok(ids);
        }

        let _guard = self.write().await;
        let tx = self.conn.transaction().await.map_err(storage_err)?;

        for source in sources {
            // An unavailable page has no title; keep the last known one.
            let mut rows = tx
                .query(
                    "UPDATE sources
                        SET title = CASE WHEN ?2 = '' THEN title ELSE ?2 END,
                            status = ?3,
                            updated_at = ?4
                      WHERE id = ?1
                     RETURNING url, id",
                    params![
                        source.id,
                        source.title.as_str(),
                        source.status.as_str(),
                        ts(&source.updated_at)
                    ],
                )
                .await
                .map_err(storage_err)?;

            if let Some(row) = rows.next().await.map_err(storage_err)? {
                ids.insert(
                    row.get::<String>(0).map_err(storage_err)?,
                    row.get::<i64>(1).map_err(storage_err)?,
                );
            }
        }

        tx.commit().await.map_err(storage_err)?;
        tracing::debug!(count = ids.len(), "sources updated");
        Ok(ids)
    }

    async fn get_by_task_id(&self, task_id: i64) -> Result<Vec<TaskSource>> {
        let mut rows = self
            .conn
            .query(
                "SELECT s.id, s.url, s.title, s.status, s.created_at, s.updated_at,
                        ts.launch_id, ts.weight, ts.parent_source_id
                   FROM task_sources ts
                   JOIN sources s ON s.id = ts.source_id
                  WHERE ts.task_id = ?1
                    AND ts.launch_id = (SELECT MAX(id) FROM launches
                                         WHERE task_id = ?1 AND status = 'finished')
                  ORDER BY ts.weight DESC, s.id",
                params![task_id],
            )
            .await
            .map_err(storage_err)?;

        let mut sources = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            sources.push(TaskSource {
                source: row_to_source(&row)?,
                launch_id: row.get::<i64>(6).map_err(storage_err)?,
                weight: row.get::<f64>(7).map_err(storage_err)?,
                parent_source_id: row.get::<Option<i64>>(8).map_err(storage_err)?,
            });
        }
        Ok(sources)
    }
}

/// Map the leading `id, url, title, status, created_at, updated_at` columns.
fn row_to_source(row: &libsql::Row) -> Result<Source> {
    let created_at: String = row.get(4).map_err(storage_err)?;
    let updated_at: String = row.get(5).map_err(storage_err)?;

    Ok(Source {
        id: row.get::<i64>(0).map_err(storage_err)?,
        url: row.get::<String>(1).map_err(storage_err)?,
        title: row.get::<String>(2).map_err(storage_err)?,
        status: parse_col(row, 3)?,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}
