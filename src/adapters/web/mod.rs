//! Read-only JSON dashboard over the message store.
//!
//! Endpoints:
//!   /stats              - store counters
//!   /messages           - paginated messages, ?chat_id=N&tab=new|processed&page=N
//!   /summaries          - recent summaries
//!   /api/messages       - messages by explicit ids, ?ids=1,2,3

use crate::domain::DomainError;
use crate::ports::MessageStore;
use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

const PAGE_SIZE: u32 = 20;

type Store = Arc<dyn MessageStore>;

/// Store and input failures as HTTP responses.
enum WebError {
    BadRequest(String),
    Internal(String),
}

impl From<DomainError> for WebError {
    fn from(e: DomainError) -> Self {
        WebError::Internal(e.to_string())
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            WebError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            WebError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub fn router(store: Store) -> Router {
    Router::new()
        .route("/stats", get(stats))
        .route("/messages", get(messages))
        .route("/summaries", get(summaries))
        .route("/api/messages", get(messages_by_ids))
        .with_state(store)
}

pub async fn serve(port: u16, store: Store) -> Result<(), DomainError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| DomainError::Serve(format!("bind {}: {}", addr, e)))?;
    info!(%addr, "dashboard listening");
    axum::serve(listener, router(store))
        .await
        .map_err(|e| DomainError::Serve(format!("serve: {}", e)))?;
    Ok(())
}

async fn stats(State(store): State<Store>) -> Result<impl IntoResponse, WebError> {
    Ok(Json(store.stats().await?))
}

#[derive(Deserialize, Default)]
struct MessagesQuery {
    chat_id: Option<i64>,
    tab: Option<String>,
    page: Option<u32>,
}

async fn messages(
    State(store): State<Store>,
    Query(query): Query<MessagesQuery>,
) -> Result<impl IntoResponse, WebError> {
    let summarized = match query.tab.as_deref() {
        None | Some("new") => false,
        Some("processed") => true,
        Some(other) => {
            return Err(WebError::BadRequest(format!("unknown tab: {}", other)));
        }
    };
    let page = query.page.unwrap_or(1).max(1);
    let offset = (page - 1) * PAGE_SIZE;
    let rows = store
        .messages_page(query.chat_id, summarized, PAGE_SIZE, offset)
        .await?;
    Ok(Json(json!({
        "page": page,
        "page_size": PAGE_SIZE,
        "messages": rows,
    })))
}

async fn summaries(State(store): State<Store>) -> Result<impl IntoResponse, WebError> {
    Ok(Json(store.recent_summaries(PAGE_SIZE).await?))
}

#[derive(Deserialize, Default)]
struct IdsQuery {
    ids: Option<String>,
}

async fn messages_by_ids(
    State(store): State<Store>,
    Query(query): Query<IdsQuery>,
) -> Result<impl IntoResponse, WebError> {
    let raw = query.ids.unwrap_or_default();
    let mut ids = Vec::new();
    for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let id: i32 = token
            .parse()
            .map_err(|_| WebError::BadRequest(format!("bad message id: {}", token)))?;
        ids.push(id);
    }
    Ok(Json(store.messages_by_ids(&ids).await?))
}
