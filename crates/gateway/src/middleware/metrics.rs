//! Per-request metrics

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use cortex_common::metrics::RequestMetrics;

/// Record method, matched route, status and latency for every request
pub async fn track_metrics(request: Request, next: Next) -> Response {
    // Route templates keep label cardinality bounded
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let tracker = RequestMetrics::start(request.method().as_str(), &route);

    let response = next.run(request).await;
    tracker.finish(response.status().as_u16());
    response
}
