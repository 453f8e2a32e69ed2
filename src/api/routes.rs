use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::db::tables::{self, BlockFilters};
use crate::domain::{display_hash, Block};
use crate::error::IndexerError;
use crate::kv::{counter_key, KvStore};

#[derive(Debug, Deserialize)]
pub struct ListBlocksQuery {
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub skip: u32,
    pub number: Option<u32>,
    pub start_number: Option<u32>,
    pub end_number: Option<u32>,
    pub hash: Option<String>,
    pub created_by: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BlockListProjection {
    pub number: u32,
    pub hash: String,
    pub parent_hash: String,
    pub peer_id: String,
    pub timestamp: u64,
    pub transaction_count: u32,
    pub transaction_fees: String,
    pub transaction_amount: String,
    pub internal_transaction_amount: String,
    pub internal_transaction_count: u32,
    pub failed_transaction_count: u32,
    pub block_time: u64,
}

impl From<Block> for BlockListProjection {
    fn from(block: Block) -> Self {
        Self {
            number: block.number,
            hash: display_hash(&block.hash),
            parent_hash: display_hash(&block.parent_hash),
            peer_id: block.peer_id,
            timestamp: block.timestamp,
            transaction_count: block.transaction_count,
            transaction_fees: block.transaction_fees,
            transaction_amount: block.transaction_amount,
            internal_transaction_amount: block.internal_transaction_amount,
            internal_transaction_count: block.internal_transaction_count,
            failed_transaction_count: block.failed_transaction_count,
            block_time: block.block_time,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for IndexerError {
    fn into_response(self) -> Response {
        match self {
            IndexerError::ClientError(message) => {
                (StatusCode::UNPROCESSABLE_ENTITY, Json(ErrorBody { error: message }))
                    .into_response()
            }
            IndexerError::NotFound => (
                StatusCode::NOT_FOUND,
                Json(ErrorBody {
                    error: "not found".to_string(),
                }),
            )
                .into_response(),
            IndexerError::Transient(err) | IndexerError::Fatal(err) => {
                tracing::error!(error = %err, "internal error serving request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorBody {
                        error: "internal error".to_string(),
                    }),
                )
                    .into_response()
            }
        }
    }
}

pub async fn list_blocks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListBlocksQuery>,
) -> Result<Response, IndexerError> {
    let filters = BlockFilters {
        limit: query.limit,
        skip: query.skip,
        number: query.number,
        start_number: query.start_number,
        end_number: query.end_number,
        hash: query.hash,
        created_by: query.created_by,
    }
    .validated(state.config.max_page_size)?;

    let blocks = tables::select_blocks(&state.pool, &filters).await?;

    if blocks.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let count = state
        .kv
        .get_counter(&counter_key(&state.config.network_name, "block"))
        .await
        .unwrap_or(0)
        .max(0);

    let projections: Vec<BlockListProjection> = blocks.into_iter().map(Into::into).collect();

    let mut headers = HeaderMap::new();
    headers.insert(
        "X-TOTAL-COUNT",
        HeaderValue::from_str(&count.to_string()).unwrap_or(HeaderValue::from_static("0")),
    );

    Ok((headers, Json(projections)).into_response())
}

pub async fn get_block(
    State(state): State<Arc<AppState>>,
    Path(number): Path<String>,
) -> Result<Json<BlockListProjection>, IndexerError> {
    let number: u32 = number
        .parse()
        .map_err(|_| IndexerError::ClientError("number must be an unsigned integer".to_string()))?;
    let block = tables::select_block(&state.pool, number).await?;
    Ok(Json(block.into()))
}

#[derive(Debug, Serialize)]
pub struct VersionInfo {
    pub version: &'static str,
}

pub async fn version() -> Json<VersionInfo> {
    Json(VersionInfo {
        version: crate::config::VERSION_MESSAGE,
    })
}

#[derive(Debug, Serialize)]
pub struct MetadataInfo {
    pub name: String,
    pub network_name: String,
}

pub async fn metadata(State(state): State<Arc<AppState>>) -> Json<MetadataInfo> {
    Json(MetadataInfo {
        name: state.config.name.clone(),
        network_name: state.config.network_name.clone(),
    })
}

pub async fn health() -> StatusCode {
    StatusCode::OK
}
