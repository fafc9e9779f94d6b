use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderMap;
use bytes::Bytes;
use metrics::counter;
use tracing::{instrument, warn, Span};

use crate::api::{WebhookError, WebhookResponse, WebhookResponseCode};
use crate::prometheus::report_dropped_events;
use crate::router;

/// Receives one webhook delivery: the body is buffered by axum, the pipeline
/// decodes, validates and dispatches it. Any failure answers 429 with the
/// error text so the provider redelivers on its own schedule.
#[instrument(skip_all, fields(content_type))]
pub async fn event(
    State(state): State<router::State>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<WebhookResponse, WebhookError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());
    Span::current().record("content_type", content_type.unwrap_or("unknown"));

    counter!("webhook_events_received_total").increment(1);

    if let Err(err) = state.dispatcher.handle(content_type, body).await {
        report_dropped_events(err.to_metric_tag());
        warn!("rejected webhook payload: {}", err);
        return Err(err);
    }

    Ok(WebhookResponse {
        status: WebhookResponseCode::Ok,
    })
}

pub async fn index() -> &'static str {
    "webhooks"
}
