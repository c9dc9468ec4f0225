//! HTTP 服务
//!
//! - GET /{*path}  - 交给 RequestGateway（原始路径 + 查询串，由网关解码透传命令）
//! - GET /         - 空路径，按透传命令处理
//!
//! 设备交互是阻塞的，每个请求在 `spawn_blocking` 中执行；
//! 命令链路内部保证同一时刻只有一条命令在等待应答。

use crate::gateway::{GatewayResponse, Request, RequestGateway};
use anyhow::Result;
use axum::{
    Router,
    extract::State,
    http::{StatusCode, Uri},
    response::{Html, IntoResponse, Json, Response},
    routing::get,
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{debug, error};

#[derive(Clone)]
struct AppState {
    gateway: Arc<RequestGateway>,
}

/// 构造路由（CORS 全开放）
pub fn router(gateway: Arc<RequestGateway>) -> Router {
    Router::new()
        .route("/", get(dispatch))
        .route("/{*path}", get(dispatch))
        .layer(CorsLayer::permissive())
        .with_state(AppState { gateway })
}

/// 在 `listener` 上运行服务，直到 `shutdown` 完成
pub async fn serve(
    listener: TcpListener,
    gateway: Arc<RequestGateway>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    axum::serve(listener, router(gateway))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn dispatch(State(state): State<AppState>, uri: Uri) -> Response {
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    respond(state, Request::from_path(target)).await
}

async fn respond(state: AppState, request: Request) -> Response {
    debug!("Request: {:?}", request);
    let gateway = state.gateway.clone();
    match tokio::task::spawn_blocking(move || gateway.handle(request)).await {
        Ok(GatewayResponse::Text(text)) => Html(text).into_response(),
        Ok(GatewayResponse::Stats(record)) => Json(record).into_response(),
        Err(e) => {
            error!("Request handler panicked: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
        },
    }
}
