//! `launches` table: [`LaunchStore`] for [`Storage`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::params;
use topicrawl_shared::{ErrorSlug, Launch, LaunchStatus, LaunchStore, Result, TopicrawlError};

use crate::{Storage, parse_col, parse_opt_ts, parse_ts, storage_err, ts};

const LAUNCH_COLUMNS: &str =
    "id, number, task_id, started_at, finished_at, sources_viewed, status, error";

#[async_trait]
impl LaunchStore for Storage {
    async fn create(&self, task_id: i64, started_at: DateTime<Utc>) -> Result<(i64, i64)> {
        let _guard = self.write().await;
        let tx = self.conn.transaction().await.map_err(storage_err)?;

        let mut rows = tx
            .query(
                "SELECT COALESCE(MAX(number), 0) + 1 FROM launches WHERE task_id = ?1",
                params![task_id],
            )
            .await
            .map_err(storage_err)?;
        let number = match rows.next().await.map_err(storage_err)? {
            Some(row) => row.get::<i64>(0).map_err(storage_err)?,
            None => 1,
        };
        drop(rows);

        let mut rows = tx
            .query(
                "INSERT INTO launches (number, task_id, started_at, sources_viewed, status)
                 VALUES (?1, ?2, ?3, 0, ?4)
                 RETURNING id",
                params![
                    number,
                    task_id,
                    ts(&started_at),
                    LaunchStatus::InProgress.as_str()
                ],
            )
            .await
            .map_err(storage_err)?;
        let id = rows
            .next()
            .await
            .map_err(storage_err)?
            .ok_or_else(|| TopicrawlError::Storage("launch insert returned no id".into()))?
            .get::<i64>(0)
            .map_err(storage_err)?;
        drop(rows);

        tx.commit().await.map_err(storage_err)?;
        tracing::debug!(task_id, launch_id = id, number, "launch started");
        Ok((id, number))
    }

    async fn finish(
        &self,
        id: i64,
        finished_at: DateTime<Utc>,
        sources_viewed: i64,
        error: Option<ErrorSlug>,
    ) -> Result<()> {
        let status = match error {
            Some(_) => LaunchStatus::Failed,
            None => LaunchStatus::Finished,
        };

        let affected = {
            let _guard = self.write().await;
            self.conn
                .execute(
                    "UPDATE launches
                        SET finished_at = ?2, sources_viewed = ?3, status = ?4, error = ?5
                      WHERE id = ?1",
                    params![
                        id,
                        ts(&finished_at),
                        sources_viewed,
                        status.as_str(),
                        error.map(|slug| slug.as_str())
                    ],
                )
                .await
                .map_err(storage_err)?
        };

        if affected == 0 {
            return Err(TopicrawlError::NotFound {
                entity: "launch",
                id,
            });
        }
        Ok(())
    }

    async fn get(&self, id: i64) -> Result<Launch> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {LAUNCH_COLUMNS} FROM launches WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await.map_err(storage_err)? {
            Some(row) => row_to_launch(&row),
            None => Err(TopicrawlError::NotFound {
                entity: "launch",
                id,
            }),
        }
    }

    async fn list_by_task(&self, task_id: i64) -> Result<Vec<Launch>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {LAUNCH_COLUMNS} FROM launches WHERE task_id = ?1 ORDER BY number DESC"
                ),
                params![task_id],
            )
            .await
            .map_err(storage_err)?;

        let mut launches = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            launches.push(row_to_launch(&row)?);
        }
        Ok(launches)
    }
}

fn row_to_launch(row: &libsql::Row) -> Result<Launch> {
    let started_at: String = row.get(3).map_err(storage_err)?;
    let finished_at: Option<String> = row.get(4).map_err(storage_err)?;
    let error: Option<String> = row.get(7).map_err(storage_err)?;

    Ok(Launch {
        id: row.get::<i64>(0).map_err(storage_err)?,
        number: row.get::<i64>(1).map_err(storage_err)?,
        task_id: row.get::<i64>(2).map_err(storage_err)?,
        started_at: parse_ts(&started_at)?,
        finished_at: parse_opt_ts(finished_at)?,
        sources_viewed: row.get::<i64>(5).map_err(storage_err)?,
        status: parse_col(row, 6)?,
        error: error.map(|slug| slug.parse()).transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_storage;
    use topicrawl_shared::{TaskParams, TaskStore};

    async fn task_id(storage: &Storage) -> i64 {
        let params = TaskParams {
            depth_level: 1,
            min_weight: 0.0,
            max_sources: 10,
            max_neighbours_per_source: 10,
        };
        TaskStore::create(storage, "rust", &params, Utc::now())
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn numbers_increase_per_task() {
        let storage = test_storage().await;
        let first_task = task_id(&storage).await;
        let second_task = task_id(&storage).await;

        let (_, n1) = LaunchStore::create(&storage, first_task, Utc::now()).await.unwrap();
        let (_, n2) = LaunchStore::create(&storage, first_task, Utc::now()).await.unwrap();
        let (_, other) = LaunchStore::create(&storage, second_task, Utc::now()).await.unwrap();

        assert_eq!((n1, n2, other), (1, 2, 1));
    }

    #[tokio::test]
    async fn finish_records_outcome() {
        let storage = test_storage().await;
        let task = task_id(&storage).await;

        let (ok, _) = LaunchStore::create(&storage, task, Utc::now()).await.unwrap();
        storage.finish(ok, Utc::now(), 7, None).await.unwrap();
        let launch = storage.get(ok).await.unwrap();
        assert_eq!(launch.status, LaunchStatus::Finished);
        assert_eq!(launch.sources_viewed, 7);
        assert!(launch.finished_at.is_some());
        assert!(launch.error.is_none());

        let (failed, _) = LaunchStore::create(&storage, task, Utc::now()).await.unwrap();
        storage
            .finish(failed, Utc::now(), 0, Some(ErrorSlug::LaunchTimeout))
            .await
            .unwrap();
        let launch = storage.get(failed).await.unwrap();
        assert_eq!(launch.status, LaunchStatus::Failed);
        assert_eq!(launch.error, Some(ErrorSlug::LaunchTimeout));

        let listed = storage.list_by_task(task).await.unwrap();
        assert_eq!(listed.iter().map(|l| l.number).collect::<Vec<_>>(), vec![2, 1]);
    }

    #[tokio::test]
    async fn unknown_launch_is_not_found() {
        let storage = test_storage().await;
        assert!(matches!(
            storage.get(9).await.unwrap_err(),
            TopicrawlError::NotFound { entity: "launch", .. }
        ));
        assert!(storage.finish(9, Utc::now(), 0, None).await.is_err());
    }
}
