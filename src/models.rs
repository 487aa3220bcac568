use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// DB row types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Server {
    pub id: uuid::Uuid,
    pub name: String,
    pub source_url: String,
    pub package_registry: Option<String>,
    pub package_name: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub license: Option<String>,
    pub stars: i32,
    pub transport: Option<String>,
    pub tools_count: i32,
    /// -1 until the first completed scan.
    pub trust_score: i32,
    pub first_seen: chrono::DateTime<chrono::Utc>,
    pub last_scanned: Option<chrono::DateTime<chrono::Utc>>,
    pub scan_status: String,
    pub scan_error: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Scan {
    pub id: uuid::Uuid,
    pub server_id: uuid::Uuid,
    pub scanned_at: chrono::DateTime<chrono::Utc>,
    pub tool_integrity_status: String,
    pub tool_integrity_details: Value,
    pub auth_status: String,
    pub auth_details: Value,
    pub exposure_status: String,
    pub exposure_details: Value,
    pub trust_score: i32,
    pub tool_definitions_hash: Option<String>,
    pub scan_duration_ms: Option<i32>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ToolDefinition {
    pub id: uuid::Uuid,
    pub server_id: uuid::Uuid,
    pub tool_name: String,
    pub description: Option<String>,
    pub parameters: Option<Value>,
    pub content_hash: String,
    pub first_seen: chrono::DateTime<chrono::Utc>,
    pub last_seen: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Mutation {
    pub id: uuid::Uuid,
    pub server_id: uuid::Uuid,
    pub tool_name: String,
    pub old_hash: String,
    pub new_hash: String,
    pub old_description: Option<String>,
    pub new_description: Option<String>,
    pub old_parameters: Option<Value>,
    pub new_parameters: Option<Value>,
    pub severity: String,
    pub severity_reason: Option<String>,
    pub detected_at: chrono::DateTime<chrono::Utc>,
}

// ---------------------------------------------------------------------------
// Insert payloads
// ---------------------------------------------------------------------------

/// One scan snapshot, ready to persist. Statuses are the lowercase strings
/// stored in the `scans` table; details are the serialized check reports.
#[derive(Debug)]
pub struct NewScan {
    pub server_id: uuid::Uuid,
    pub tool_integrity_status: String,
    pub tool_integrity_details: Value,
    pub auth_status: String,
    pub auth_details: Value,
    pub exposure_status: String,
    pub exposure_details: Value,
    pub trust_score: i32,
    pub tool_definitions_hash: String,
    pub scan_duration_ms: i32,
}

#[derive(Debug)]
pub struct NewToolDefinition {
    pub tool_name: String,
    pub description: Option<String>,
    pub parameters: Option<Value>,
    pub content_hash: String,
}

#[derive(Debug)]
pub struct NewMutation {
    pub tool_name: String,
    pub old_hash: String,
    pub new_hash: String,
    pub old_description: Option<String>,
    pub new_description: Option<String>,
    pub old_parameters: Option<Value>,
    pub new_parameters: Option<Value>,
    pub severity: String,
    pub severity_reason: String,
}

// ---------------------------------------------------------------------------
// Global statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub total_servers: i64,
    pub total_scans: i64,
    pub critical_findings: i64,
    pub total_mutations: i64,
    /// Mean over servers that have been scanned at least once.
    pub avg_trust_score: f64,
}

// ---------------------------------------------------------------------------
// API envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

#[derive(Debug, Serialize)]
pub struct Meta {
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl Pagination {
    /// Clamped (page, per_page): page >= 1, 1 <= per_page <= 100.
    pub fn resolve(&self) -> (u32, u32) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        (page, per_page)
    }

    pub fn offset(&self) -> i64 {
        let (page, per_page) = self.resolve();
        i64::from(page - 1) * i64::from(per_page)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub database: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults() {
        let p = Pagination {
            page: None,
            per_page: None,
        };
        assert_eq!(p.resolve(), (1, 20));
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn pagination_clamps_out_of_range_values() {
        let p = Pagination {
            page: Some(0),
            per_page: Some(5000),
        };
        assert_eq!(p.resolve(), (1, 100));
    }

    #[test]
    fn pagination_offset_advances_by_page_size() {
        let p = Pagination {
            page: Some(3),
            per_page: Some(25),
        };
        assert_eq!(p.offset(), 50);
    }
}
