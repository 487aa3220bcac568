use uuid::Uuid;

use super::Db;
use crate::models::{NewScan, Scan};

const SCAN_COLUMNS: &str = "id, server_id, scanned_at, tool_integrity_status, tool_integrity_details, \
     auth_status, auth_details, exposure_status, exposure_details, \
     trust_score, tool_definitions_hash, scan_duration_ms";

impl Db {
    /// Insert an immutable scan snapshot; returns its id and timestamp.
    pub async fn insert_scan(
        &self,
        scan: &NewScan,
    ) -> Result<(Uuid, chrono::DateTime<chrono::Utc>), sqlx::Error> {
        sqlx::query_as::<_, (Uuid, chrono::DateTime<chrono::Utc>)>(
            r#"
            INSERT INTO scans (
                server_id, tool_integrity_status, tool_integrity_details,
                auth_status, auth_details, exposure_status, exposure_details,
                trust_score, tool_definitions_hash, scan_duration_ms
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, scanned_at
            "#,
        )
        .bind(scan.server_id)
        .bind(&scan.tool_integrity_status)
        .bind(&scan.tool_integrity_details)
        .bind(&scan.auth_status)
        .bind(&scan.auth_details)
        .bind(&scan.exposure_status)
        .bind(&scan.exposure_details)
        .bind(scan.trust_score)
        .bind(&scan.tool_definitions_hash)
        .bind(scan.scan_duration_ms)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn latest_scan_for_server(
        &self,
        server_id: Uuid,
    ) -> Result<Option<Scan>, sqlx::Error> {
        sqlx::query_as::<_, Scan>(&format!(
            "SELECT {SCAN_COLUMNS} FROM scans WHERE server_id = $1 \
             ORDER BY scanned_at DESC LIMIT 1"
        ))
        .bind(server_id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn scan_history(
        &self,
        server_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Scan>, i64), sqlx::Error> {
        let total =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM scans WHERE server_id = $1")
                .bind(server_id)
                .fetch_one(&self.pool)
                .await?;

        let scans = sqlx::query_as::<_, Scan>(&format!(
            "SELECT {SCAN_COLUMNS} FROM scans WHERE server_id = $1 \
             ORDER BY scanned_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(server_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((scans, total))
    }

    /// Most recent scans carrying at least one critical check status.
    pub async fn recent_critical_scans(&self, limit: i64) -> Result<Vec<Scan>, sqlx::Error> {
        sqlx::query_as::<_, Scan>(&format!(
            "SELECT {SCAN_COLUMNS} FROM scans \
             WHERE tool_integrity_status = 'critical' \
                OR auth_status = 'critical' \
                OR exposure_status = 'critical' \
             ORDER BY scanned_at DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }
}
