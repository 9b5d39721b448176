//! `task_sources` table: [`TaskEdgeStore`] for [`Storage`].

use async_trait::async_trait;
use libsql::params;
use topicrawl_shared::{Result, TaskEdgeStore, TaskSourceEdge};

use crate::{Storage, storage_err};

#[async_trait]
impl TaskEdgeStore for Storage {
    async fn create(&self, edges: &[TaskSourceEdge]) -> Result<()> {
        if edges.is_empty() {
            return Ok(());
        }

        let _guard = self.write().await;
        let tx = self.conn.transaction().await.map_err(storage_err)?;

        for edge in edges {
            tx.execute(
                "INSERT INTO task_sources (task_id, launch_id, source_id, parent_source_id, weight)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    edge.task_id,
                    edge.launch_id,
                    edge.source_id,
                    edge.parent_source_id,
                    edge.weight
                ],
            )
            .await
            .map_err(storage_err)?;
        }

        tx.commit().await.map_err(storage_err)?;
        tracing::debug!(count = edges.len(), "task sources recorded");
        Ok(())
    }
}
