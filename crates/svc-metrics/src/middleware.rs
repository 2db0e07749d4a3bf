//! Axum integration: request instrumentation and the scrape endpoint.

use crate::exposition;
use crate::http_server::HttpServerMetrics;
use crate::registry::Registry;
use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use std::time::Instant;

/// Name of the calling client, recorded as the `client` label.
///
/// Insert it as a request extension in an outer layer (for example after
/// authenticating the caller). Requests without it are recorded with an
/// empty client.
#[derive(Debug, Clone)]
pub struct ClientName(pub String);

/// Counts every request and records its latency once the inner service
/// has produced a response.
///
/// ```ignore
/// let metrics = Arc::new(HttpServerMetrics::new(&registry, "shop")?);
/// let app = Router::new()
///     .route("/orders/:id", get(handler))
///     .layer(axum::middleware::from_fn_with_state(metrics, track_requests));
/// ```
pub async fn track_requests(
    State(metrics): State<Arc<HttpServerMetrics>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let client = request
        .extensions()
        .get::<ClientName>()
        .map(|c| c.0.clone())
        .unwrap_or_default();

    let response = next.run(request).await;

    let status = response.status();
    metrics.inc(method.as_str(), status.as_str(), &path, &client);
    metrics.write_timing(start, method.as_str(), status.as_str(), &path, &client);
    response
}

/// Serves the registry in the Prometheus text format.
pub async fn render_metrics(State(registry): State<Registry>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, exposition::CONTENT_TYPE)], registry.render())
}
