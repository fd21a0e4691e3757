use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_GOLD_LIMIT: i64 = 100;
pub const MAX_GOLD_LIMIT: i64 = 1000;

// Request models
#[derive(Debug, Deserialize)]
pub struct GoldQuery {
    pub limit: Option<i64>,
}

impl GoldQuery {
    /// Requested row limit, clamped to `1..=MAX_GOLD_LIMIT`.
    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_GOLD_LIMIT)
            .clamp(1, MAX_GOLD_LIMIT) as usize
    }
}

// Response models
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub service: &'static str,
    pub version: &'static str,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database_connected: bool,
    pub storage_accessible: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub total_records: usize,
    pub entity_count: usize,
    pub date_range: Option<DateRange>,
    pub last_updated: Option<String>,
}

impl MetricsResponse {
    pub fn empty() -> Self {
        Self {
            total_records: 0,
            entity_count: 0,
            date_range: None,
            last_updated: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GoldDataResponse {
    pub data: Vec<Value>,
    pub count: usize,
    pub total_available: usize,
}
