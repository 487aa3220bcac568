use uuid::Uuid;

use super::Db;
use crate::models::{Mutation, NewMutation};

const MUTATION_COLUMNS: &str = "id, server_id, tool_name, old_hash, new_hash, \
     old_description, new_description, old_parameters, new_parameters, \
     severity, severity_reason, detected_at";

impl Db {
    pub async fn insert_mutation(
        &self,
        server_id: Uuid,
        mutation: &NewMutation,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO mutations (
                server_id, tool_name, old_hash, new_hash,
                old_description, new_description, old_parameters, new_parameters,
                severity, severity_reason
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(server_id)
        .bind(&mutation.tool_name)
        .bind(&mutation.old_hash)
        .bind(&mutation.new_hash)
        .bind(&mutation.old_description)
        .bind(&mutation.new_description)
        .bind(&mutation.old_parameters)
        .bind(&mutation.new_parameters)
        .bind(&mutation.severity)
        .bind(&mutation.severity_reason)
        .execute(&self.pool)
        .await
        .map(|_| ())
    }

    pub async fn mutations_for_server(
        &self,
        server_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Mutation>, i64), sqlx::Error> {
        let total =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM mutations WHERE server_id = $1")
                .bind(server_id)
                .fetch_one(&self.pool)
                .await?;

        let mutations = sqlx::query_as::<_, Mutation>(&format!(
            "SELECT {MUTATION_COLUMNS} FROM mutations WHERE server_id = $1 \
             ORDER BY detected_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(server_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((mutations, total))
    }

    pub async fn recent_mutations(&self, limit: i64) -> Result<Vec<Mutation>, sqlx::Error> {
        sqlx::query_as::<_, Mutation>(&format!(
            "SELECT {MUTATION_COLUMNS} FROM mutations ORDER BY detected_at DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }
}
