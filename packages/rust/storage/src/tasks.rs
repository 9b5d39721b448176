//! `tasks` table: [`TaskStore`] for [`Storage`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::params;
use topicrawl_shared::{
    Result, Task, TaskFilter, TaskParams, TaskStatus, TaskStore, TaskSummary, TopicrawlError,
};

use crate::{Storage, parse_col, parse_opt_ts, parse_ts, storage_err, ts};

const TASK_COLUMNS: &str = "id, query, status, depth_level, min_weight, max_sources, \
     max_neighbours_per_source, created_at, updated_at, processed_at";

#[async_trait]
impl TaskStore for Storage {
    async fn create(&self, query: &str, params: &TaskParams, at: DateTime<Utc>) -> Result<Task> {
        let id = {
            let _guard = self.write().await;
            let now = ts(&at);
            let mut rows = self
                .conn
                .query(
                    "INSERT INTO tasks (query, status, depth_level, min_weight, max_sources,
                                        max_neighbours_per_source, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                     RETURNING id",
                    params![
                        query,
                        TaskStatus::Created.as_str(),
                        params.depth_level as i64,
                        params.min_weight,
                        params.max_sources as i64,
                        params.max_neighbours_per_source as i64,
                        now.as_str()
                    ],
                )
                .await
                .map_err(storage_err)?;
            let row = rows
                .next()
                .await
                .map_err(storage_err)?
                .ok_or_else(|| TopicrawlError::Storage("task insert returned no id".into()))?;
            row.get::<i64>(0).map_err(storage_err)?
        };

        tracing::debug!(task_id = id, query, "task created");
        self.get_by_id(id).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Task> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await.map_err(storage_err)? {
            Some(row) => row_to_task(&row),
            None => Err(TopicrawlError::NotFound { entity: "task", id }),
        }
    }

    async fn list(&self, filter: &TaskFilter) -> Result<Vec<TaskSummary>> {
        let status = filter.status.map(|s| s.as_str());
        let query = filter.query.as_deref().filter(|q| !q.trim().is_empty());
        // SQLite treats a negative LIMIT as "no limit".
        let limit = filter.limit.map(i64::from).unwrap_or(-1);
        let offset = filter.offset.map(i64::from).unwrap_or(0);

        let mut rows = self
            .conn
            .query(
                "SELECT t.id, t.query, t.status,
                        (SELECT COUNT(*) FROM task_sources ts
                          WHERE ts.task_id = t.id
                            AND ts.launch_id = (SELECT MAX(l.id) FROM launches l
                                                 WHERE l.task_id = t.id AND l.status = 'finished'))
                 FROM tasks t
                 WHERE (?1 IS NULL OR t.status = ?1)
                   AND (?2 IS NULL OR t.query LIKE '%' || ?2 || '%')
                 ORDER BY t.id DESC
                 LIMIT ?3 OFFSET ?4",
                params![status, query, limit, offset],
            )
            .await
            .map_err(storage_err)?;

        let mut tasks = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            tasks.push(TaskSummary {
                id: row.get::<i64>(0).map_err(storage_err)?,
                query: row.get::<String>(1).map_err(storage_err)?,
                status: parse_col(&row, 2)?,
                count_sources: row.get::<i64>(3).map_err(storage_err)?,
            });
        }
        Ok(tasks)
    }

    async fn update_params(&self, id: i64, params: &TaskParams, at: DateTime<Utc>) -> Result<Task> {
        let affected = {
            let _guard = self.write().await;
            self.conn
                .execute(
                    "UPDATE tasks
                        SET depth_level = ?2, min_weight = ?3, max_sources = ?4,
                            max_neighbours_per_source = ?5, updated_at = ?6
                      WHERE id = ?1",
                    params![
                        id,
                        params.depth_level as i64,
                        params.min_weight,
                        params.max_sources as i64,
                        params.max_neighbours_per_source as i64,
                        ts(&at)
                    ],
                )
                .await
                .map_err(storage_err)?
        };

        if affected == 0 {
            return Err(TopicrawlError::NotFound { entity: "task", id });
        }
        self.get_by_id(id).await
    }

    async fn set_status(
        &self,
        id: i64,
        from: TaskStatus,
        to: TaskStatus,
        at: DateTime<Utc>,
    ) -> Result<()> {
        if !from.can_transition_to(to) {
            return Err(TopicrawlError::InvalidTransition {
                task_id: id,
                from,
                to,
            });
        }

        let affected = {
            let _guard = self.write().await;
            self.conn
                .execute(
                    "UPDATE tasks SET status = ?3, updated_at = ?4 WHERE id = ?1 AND status = ?2",
                    params![id, from.as_str(), to.as_str(), ts(&at)],
                )
                .await
                .map_err(storage_err)?
        };

        if affected == 0 {
            // Either the task is gone or someone else moved it first.
            let current = self.get_by_id(id).await?;
            return Err(TopicrawlError::InvalidTransition {
                task_id: id,
                from: current.status,
                to,
            });
        }

        tracing::debug!(task_id = id, %from, %to, "task status changed");
        Ok(())
    }

    async fn process(&self, id: i64, at: DateTime<Utc>) -> Result<Task> {
        let affected = {
            let _guard = self.write().await;
            let now = ts(&at);
            self.conn
                .execute(
                    "UPDATE tasks SET status = ?2, processed_at = ?3, updated_at = ?3
                      WHERE id = ?1 AND status IN (?4, ?5)",
                    params![
                        id,
                        TaskStatus::InProcessing.as_str(),
                        now.as_str(),
                        TaskStatus::Created.as_str(),
                        TaskStatus::Active.as_str()
                    ],
                )
                .await
                .map_err(storage_err)?
        };

        let task = self.get_by_id(id).await?;
        if affected == 0 {
            return Err(TopicrawlError::InvalidTaskState {
                task_id: id,
                status: task.status,
            });
        }
        Ok(task)
    }

    async fn find_in_statuses(&self, statuses: &[TaskStatus]) -> Result<Vec<Task>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = (1..=statuses.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let values: Vec<libsql::Value> = statuses
            .iter()
            .map(|s| libsql::Value::from(s.as_str().to_string()))
            .collect();

        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {TASK_COLUMNS} FROM tasks WHERE status IN ({placeholders}) ORDER BY id"
                ),
                values,
            )
            .await
            .map_err(storage_err)?;

        let mut tasks = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            tasks.push(row_to_task(&row)?);
        }
        Ok(tasks)
    }
}

fn row_to_task(row: &libsql::Row) -> Result<Task> {
    let created_at: String = row.get(7).map_err(storage_err)?;
    let updated_at: String = row.get(8).map_err(storage_err)?;
    let processed_at: Option<String> = row.get(9).map_err(storage_err)?;

    Ok(Task {
        id: row.get::<i64>(0).map_err(storage_err)?,
        query: row.get::<String>(1).map_err(storage_err)?,
        status: parse_col(row, 2)?,
        params: TaskParams {
            depth_level: row.get::<u32>(3).map_err(storage_err)?,
            min_weight: row.get::<f64>(4).map_err(storage_err)?,
            max_sources: row.get::<u32>(5).map_err(storage_err)?,
            max_neighbours_per_source: row.get::<u32>(6).map_err(storage_err)?,
        },
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
        processed_at: parse_opt_ts(processed_at)?,
    })
}
