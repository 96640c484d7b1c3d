//! HTTP surface: WebSocket subscriber channel plus read-only status routes
//!
//! | Route      | Purpose                                        |
//! |------------|------------------------------------------------|
//! | `/ws`      | live `aggregateUpdated` / `recordsFound` / `notification` events |
//! | `/health`  | liveness                                       |
//! | `/metrics` | counters + record count (re-reads the data file) |
//! | `/status`  | uptime, memory, system info, metrics          |
//!
//! Every request is logged with status and latency. Handler panics are
//! caught and answered with a generic 500 carrying a correlation id.

use crate::error::{MonitorError, MonitorResult};
use crate::hub::Subscription;
use crate::metrics::{format_mb, resident_memory_bytes};
use crate::pipeline::{panic_message, MonitorPipeline, Trigger};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Request, State,
    },
    http::{Method, StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<MonitorPipeline>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/status", get(status))
        .fallback(not_found)
        .with_state(state)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(middleware::from_fn(log_requests))
}

/// Serve until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> MonitorResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        log::info!("🌐 Server listening on http://{}", addr);
    }

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| MonitorError::internal(format!("server error: {}", e)))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let hub = state.pipeline.hub().clone();
    let Subscription { id, mut events } = hub.register();
    let (mut sink, mut stream) = socket.split();

    // Same pipeline as a file change, scoped to the newcomer
    let pipeline = state.pipeline.clone();
    tokio::spawn(async move {
        if let Err(e) = pipeline.dispatch(Trigger::SubscriberJoined(id)).await {
            log::debug!("Subscriber {} initial push failed: {}", id, e);
        }
    });

    let mut send_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    log::warn!("⚠️  Failed to encode event: {}", e);
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Client frames carry no meaning; we only watch for the close
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = stream.next().await {
            if let Message::Close(_) = message {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    hub.unregister(id);
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "uptime": state.pipeline.metrics().uptime_secs(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn metrics(State(state): State<AppState>) -> Json<Value> {
    let count = state.pipeline.read_records().await.len();
    let metrics = state.pipeline.metrics();
    metrics.set_records_found(count);

    log::debug!("Metrics endpoint accessed");
    Json(json!(metrics.snapshot()))
}

async fn status(State(state): State<AppState>) -> Json<Value> {
    let count = state.pipeline.read_records().await.len();
    let metrics = state.pipeline.metrics();
    metrics.set_records_found(count);

    let rss = resident_memory_bytes();
    let cached = state.pipeline.cached();

    log::debug!("Status endpoint accessed");
    Json(json!({
        "uptime": metrics.uptime_secs(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "memory": {
            "rss": rss,
            "formatted": {
                "rss": rss.map(format_mb),
            },
        },
        "system": {
            "platform": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
            "cpus": std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            "version": env!("CARGO_PKG_VERSION"),
        },
        "balance": cached.as_ref().map(|agg| agg.value.to_string()),
        "balanceUpdatedAt": cached.as_ref().map(|agg| agg.computed_at_utc.to_rfc3339()),
        "subscribers": state.pipeline.hub().subscriber_count(),
        "metrics": metrics.snapshot(),
    }))
}

async fn not_found(method: Method, uri: Uri) -> (StatusCode, Json<Value>) {
    log::warn!("Route not found: {} {}", method, uri);
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Route not found" })))
}

async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = Instant::now();

    let response = next.run(req).await;

    log::info!(
        "{} {} {} - {}ms",
        method,
        uri,
        response.status().as_u16(),
        start.elapsed().as_millis()
    );
    response
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let err = MonitorError::internal(format!(
        "request handler panicked: {}",
        panic_message(&*panic)
    ));
    let error_id = err.correlation_id().unwrap_or_default().to_string();

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": "Internal server error",
            "errorId": error_id,
        })),
    )
        .into_response()
}
