//! Per-procedure request metrics

use axum::{extract::Request, middleware::Next, response::Response};
use tutorly_common::metrics::RequestMetrics;

/// Procedure name of an RPC path (`/rpc/catalog.unlockSheet` → `catalog.unlockSheet`)
pub fn procedure_name(path: &str) -> &str {
    path.strip_prefix("/rpc/").unwrap_or(path)
}

pub async fn track_procedure(request: Request, next: Next) -> Response {
    let metrics = RequestMetrics::start(procedure_name(request.uri().path()));
    let response = next.run(request).await;
    metrics.finish(response.status().as_u16());
    response
}
