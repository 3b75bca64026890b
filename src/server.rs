use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::info;

use crate::db_error::{Error, Result};
use crate::sql::{Database, ExecutionResult};
use crate::types::Schema;

type SharedDb = Arc<Mutex<Database>>;

/// HTTP 封装
///
/// 语句文本原样进入 `execute()`，结果结构化转发；引擎本身没有
/// 并发原语，调用方的互斥由这里的 Mutex 保证（宿主层面串行化）。
pub async fn serve(db: Database, addr: &str) -> Result<()> {
    let state: SharedDb = Arc::new(Mutex::new(db));
    let app = Router::new()
        .route("/query", post(run_query))
        .route("/tables", get(list_tables))
        .route("/tables/{name}", get(describe_table))
        .with_state(state);
    let listener = TcpListener::bind(addr).await?;
    info!(addr, "http server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct QueryRequest {
    sql: String,
}

#[derive(Debug, Serialize)]
struct TableInfo {
    name: String,
    schema: Schema,
    indexes: Vec<String>,
}

async fn run_query(
    State(db): State<SharedDb>,
    Json(request): Json<QueryRequest>,
) -> Json<ExecutionResult> {
    match db.lock() {
        Ok(mut db) => Json(db.execute(&request.sql)),
        Err(err) => Json(ExecutionResult {
            success: false,
            error: Some(Error::from(err).to_string()),
            ..ExecutionResult::default()
        }),
    }
}

async fn list_tables(
    State(db): State<SharedDb>,
) -> std::result::Result<Json<Vec<String>>, StatusCode> {
    let db = db.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(db.list_tables()))
}

async fn describe_table(
    State(db): State<SharedDb>,
    Path(name): Path<String>,
) -> std::result::Result<Json<TableInfo>, StatusCode> {
    let db = db.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let schema = db.get_schema(&name).ok_or(StatusCode::NOT_FOUND)?.clone();
    let indexes = db.get_indexes(&name).unwrap_or_default();
    Ok(Json(TableInfo {
        name,
        schema,
        indexes,
    }))
}
