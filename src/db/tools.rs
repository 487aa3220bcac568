use uuid::Uuid;

use super::Db;
use crate::models::{NewToolDefinition, ToolDefinition};

impl Db {
    /// Batch-insert the tool definitions observed by one scan, atomically.
    /// Re-observing a known `(server, name, hash)` triple only bumps its
    /// `last_seen`, so every distinct revision of a tool is retained.
    pub async fn insert_tool_definitions(
        &self,
        server_id: Uuid,
        tools: &[NewToolDefinition],
    ) -> Result<(), sqlx::Error> {
        if tools.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for tool in tools {
            sqlx::query(
                r#"
                INSERT INTO tool_definitions (
                    server_id, tool_name, description, parameters, content_hash
                ) VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (server_id, tool_name, content_hash)
                DO UPDATE SET last_seen = NOW()
                "#,
            )
            .bind(server_id)
            .bind(&tool.tool_name)
            .bind(&tool.description)
            .bind(&tool.parameters)
            .bind(&tool.content_hash)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await
    }

    /// The tool set as of the most recent scan: rows whose `last_seen` was
    /// bumped by (or after) that scan. Must be called before the current
    /// scan's snapshot and tool batch are inserted; per-server scans are
    /// strictly sequential so the read cannot race. Empty when the server
    /// has never been scanned.
    pub async fn latest_tool_set(&self, server_id: Uuid) -> Result<Vec<ToolDefinition>, sqlx::Error> {
        sqlx::query_as::<_, ToolDefinition>(
            r#"
            SELECT id, server_id, tool_name, description, parameters,
                   content_hash, first_seen, last_seen
            FROM tool_definitions
            WHERE server_id = $1
              AND last_seen >= (SELECT MAX(scanned_at) FROM scans WHERE server_id = $1)
            ORDER BY tool_name
            "#,
        )
        .bind(server_id)
        .fetch_all(&self.pool)
        .await
    }
}
