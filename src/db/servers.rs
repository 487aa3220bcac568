use uuid::Uuid;

use super::Db;
use crate::discovery::DiscoveredServer;
use crate::models::{Server, Stats};

const SERVER_COLUMNS: &str = "id, name, source_url, package_registry, package_name, \
     description, author, license, stars, transport, tools_count, trust_score, \
     first_seen, last_scanned, scan_status, scan_error, created_at, updated_at";

impl Db {
    /// Insert or refresh a discovered server, deduplicated on `source_url`.
    /// Repeat discoveries update the descriptive fields (last writer wins)
    /// without touching scan state.
    pub async fn upsert_server(&self, server: &DiscoveredServer) -> Result<Uuid, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO servers (
                name, source_url, package_registry, package_name,
                description, author, license, stars
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (source_url)
            DO UPDATE SET
                name = EXCLUDED.name,
                package_registry = EXCLUDED.package_registry,
                package_name = EXCLUDED.package_name,
                description = EXCLUDED.description,
                author = EXCLUDED.author,
                license = EXCLUDED.license,
                stars = EXCLUDED.stars,
                updated_at = NOW()
            RETURNING id
            "#,
        )
        .bind(&server.name)
        .bind(&server.source_url)
        .bind(&server.package_registry)
        .bind(&server.package_name)
        .bind(&server.description)
        .bind(&server.author)
        .bind(&server.license)
        .bind(server.stars)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get_server(&self, id: Uuid) -> Result<Option<Server>, sqlx::Error> {
        sqlx::query_as::<_, Server>(&format!(
            "SELECT {SERVER_COLUMNS} FROM servers WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn list_servers(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Server>, i64), sqlx::Error> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM servers")
            .fetch_one(&self.pool)
            .await?;

        let servers = sqlx::query_as::<_, Server>(&format!(
            "SELECT {SERVER_COLUMNS} FROM servers \
             ORDER BY trust_score DESC, created_at DESC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((servers, total))
    }

    /// Full-text search over name + description.
    pub async fn search_servers(
        &self,
        query: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Server>, i64), sqlx::Error> {
        const MATCH: &str = "to_tsvector('english', coalesce(name, '') || ' ' || coalesce(description, '')) \
             @@ plainto_tsquery('english', $1)";

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM servers WHERE {MATCH}"
        ))
        .bind(query)
        .fetch_one(&self.pool)
        .await?;

        let servers = sqlx::query_as::<_, Server>(&format!(
            "SELECT {SERVER_COLUMNS} FROM servers WHERE {MATCH} \
             ORDER BY trust_score DESC, created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(query)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((servers, total))
    }

    pub async fn update_scan_status(
        &self,
        id: Uuid,
        status: &str,
        error: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE servers SET scan_status = $1, scan_error = $2, updated_at = NOW() WHERE id = $3",
        )
        .bind(status)
        .bind(error)
        .bind(id)
        .execute(&self.pool)
        .await
        .map(|_| ())
    }

    pub async fn update_server_after_scan(
        &self,
        id: Uuid,
        trust_score: i32,
        tools_count: i32,
        transport: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE servers SET trust_score = $1, tools_count = $2, transport = $3, \
             last_scanned = NOW(), scan_status = 'completed', scan_error = NULL, \
             updated_at = NOW() WHERE id = $4",
        )
        .bind(trust_score)
        .bind(tools_count)
        .bind(transport)
        .bind(id)
        .execute(&self.pool)
        .await
        .map(|_| ())
    }

    /// Servers due for scanning: never scanned, completed more than a day
    /// ago, or failed more than a week ago. Pending first, then stalest.
    pub async fn servers_due_for_scan(&self, limit: i64) -> Result<Vec<Server>, sqlx::Error> {
        sqlx::query_as::<_, Server>(&format!(
            r#"
            SELECT {SERVER_COLUMNS} FROM servers
            WHERE scan_status = 'pending'
               OR (scan_status = 'completed' AND last_scanned < NOW() - INTERVAL '24 hours')
               OR (scan_status = 'failed' AND last_scanned < NOW() - INTERVAL '7 days')
            ORDER BY
                CASE
                    WHEN scan_status = 'pending' THEN 1
                    WHEN scan_status = 'completed' THEN 2
                    ELSE 3
                END,
                last_scanned ASC NULLS FIRST
            LIMIT $1
            "#
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn stats(&self) -> Result<Stats, sqlx::Error> {
        let total_servers = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM servers")
            .fetch_one(&self.pool)
            .await?;
        let total_scans = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM scans")
            .fetch_one(&self.pool)
            .await?;
        let critical_findings = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM scans \
             WHERE tool_integrity_status = 'critical' \
                OR auth_status = 'critical' \
                OR exposure_status = 'critical'",
        )
        .fetch_one(&self.pool)
        .await?;
        let total_mutations = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM mutations")
            .fetch_one(&self.pool)
            .await?;
        let avg_trust_score = sqlx::query_scalar::<_, f64>(
            "SELECT COALESCE(AVG(trust_score), 0)::FLOAT8 FROM servers WHERE trust_score >= 0",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(Stats {
            total_servers,
            total_scans,
            critical_findings,
            total_mutations,
            avg_trust_score,
        })
    }
}
