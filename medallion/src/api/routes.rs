use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use chrono::Utc;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::models::{
    DateRange, GoldDataResponse, GoldQuery, HealthResponse, MetricsResponse, ServiceInfo,
};
use crate::schema::{AGGREGATED_AT, DATE, ENTITY_ID};
use crate::services::AppError;
use crate::storage::Repository;
use crate::utils::arrow::batches_to_json;

type SharedRepository = Arc<dyn Repository>;

pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: "medallion",
        version: env!("CARGO_PKG_VERSION"),
        status: "running",
    })
}

pub async fn health(State(repository): State<SharedRepository>) -> Json<HealthResponse> {
    let storage_ok = repository.health_check().await;

    Json(HealthResponse {
        status: if storage_ok { "healthy" } else { "unhealthy" },
        database_connected: storage_ok,
        storage_accessible: storage_ok,
        timestamp: Utc::now(),
    })
}

pub async fn metrics(
    State(repository): State<SharedRepository>,
) -> Result<Json<MetricsResponse>, AppError> {
    let gold = repository.read_gold().await?;

    let total_records = gold.row_count().await?;
    if total_records == 0 {
        return Ok(Json(MetricsResponse::empty()));
    }

    let entity_count = if gold.has_column(ENTITY_ID) {
        gold.distinct_count(ENTITY_ID).await?
    } else {
        0
    };

    let date_range = if gold.has_column(DATE) {
        gold.min_max(DATE)
            .await?
            .map(|(start, end)| DateRange { start, end })
    } else {
        None
    };

    let last_updated = if gold.has_column(AGGREGATED_AT) {
        gold.min_max(AGGREGATED_AT).await?.map(|(_, latest)| latest)
    } else {
        None
    };

    Ok(Json(MetricsResponse {
        total_records,
        entity_count,
        date_range,
        last_updated,
    }))
}

pub async fn gold(
    Query(params): Query<GoldQuery>,
    State(repository): State<SharedRepository>,
) -> Result<Json<GoldDataResponse>, AppError> {
    let limit = params.effective_limit();
    let gold = repository.read_gold().await?;

    let total_available = gold.row_count().await?;
    let batches = gold.limit(limit)?.collect().await?;
    let data = batches_to_json(&batches)?;

    Ok(Json(GoldDataResponse {
        count: data.len(),
        data,
        total_available,
    }))
}

pub fn routes(repository: SharedRepository) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/gold", get(gold))
        .layer(TraceLayer::new_for_http())
        .with_state(repository)
}
