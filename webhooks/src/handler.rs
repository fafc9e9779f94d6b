use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use metrics::counter;
use tracing::info;

use crate::api::WebhookError;
use crate::events::{Bounce, Click, Complaint, Delivered, Drop, Event, Open, Unsubscribe};
use crate::payload::RawPayload;
use crate::signature::{self, SigningKey};

/// One callback slot per event variant. Every method defaults to a
/// successful no-op, so implementers only override the variants they care
/// about. Callbacks run on the execution context that received the request:
/// lengthy work should be handed off (e.g. to a bounded queue that reports
/// backpressure instead of blocking) rather than done inline.
#[async_trait]
pub trait EventHandler {
    async fn on_bounce(&self, _event: Bounce) -> Result<(), WebhookError> {
        Ok(())
    }
    async fn on_click(&self, _event: Click) -> Result<(), WebhookError> {
        Ok(())
    }
    async fn on_complaint(&self, _event: Complaint) -> Result<(), WebhookError> {
        Ok(())
    }
    async fn on_delivered(&self, _event: Delivered) -> Result<(), WebhookError> {
        Ok(())
    }
    async fn on_drop(&self, _event: Drop) -> Result<(), WebhookError> {
        Ok(())
    }
    async fn on_open(&self, _event: Open) -> Result<(), WebhookError> {
        Ok(())
    }
    async fn on_unsubscribe(&self, _event: Unsubscribe) -> Result<(), WebhookError> {
        Ok(())
    }
}

/// Reference handler that logs every event it receives.
pub struct LogHandler;

#[async_trait]
impl EventHandler for LogHandler {
    async fn on_bounce(&self, event: Bounce) -> Result<(), WebhookError> {
        info!("bounce event: {:?}", event);
        Ok(())
    }
    async fn on_click(&self, event: Click) -> Result<(), WebhookError> {
        info!("click event: {:?}", event);
        Ok(())
    }
    async fn on_complaint(&self, event: Complaint) -> Result<(), WebhookError> {
        info!("complaint event: {:?}", event);
        Ok(())
    }
    async fn on_delivered(&self, event: Delivered) -> Result<(), WebhookError> {
        info!("delivered event: {:?}", event);
        Ok(())
    }
    async fn on_drop(&self, event: Drop) -> Result<(), WebhookError> {
        info!("drop event: {:?}", event);
        Ok(())
    }
    async fn on_open(&self, event: Open) -> Result<(), WebhookError> {
        info!("open event: {:?}", event);
        Ok(())
    }
    async fn on_unsubscribe(&self, event: Unsubscribe) -> Result<(), WebhookError> {
        info!("unsubscribe event: {:?}", event);
        Ok(())
    }
}

/// Single-shot decode/validate/dispatch pipeline. Holds only read-only state
/// (the handler and the optional signing key), so one dispatcher serves any
/// number of concurrent requests.
#[derive(Clone)]
pub struct Dispatcher {
    handler: Arc<dyn EventHandler + Send + Sync>,
    signing_key: Option<SigningKey>,
}

impl Dispatcher {
    /// With no signing key, payloads are dispatched without validation.
    pub fn new(
        handler: impl EventHandler + Send + Sync + 'static,
        signing_key: Option<SigningKey>,
    ) -> Self {
        Self {
            handler: Arc::new(handler),
            signing_key,
        }
    }

    /// Runs the full pipeline from raw body bytes, usable without the HTTP
    /// layer.
    pub async fn handle(
        &self,
        content_type: Option<&str>,
        body: Bytes,
    ) -> Result<(), WebhookError> {
        let payload = RawPayload::from_bytes(content_type, body).await?;
        let event = Event::from_payload(payload)?;
        self.dispatch(event).await
    }

    /// Validates the event if a key is configured, then invokes the matching
    /// callback. An invalid signature never reaches a callback; a callback
    /// error is returned verbatim.
    pub async fn dispatch(&self, event: Event) -> Result<(), WebhookError> {
        if let Some(key) = &self.signing_key {
            signature::validate(&event, key)?;
        }

        let name = event.name().to_owned();
        match event {
            Event::Bounce(e) => self.handler.on_bounce(e).await,
            Event::Click(e) => self.handler.on_click(e).await,
            Event::Complaint(e) => self.handler.on_complaint(e).await,
            Event::Delivered(e) => self.handler.on_delivered(e).await,
            Event::Drop(e) => self.handler.on_drop(e).await,
            Event::Open(e) => self.handler.on_open(e).await,
            Event::Unsubscribe(e) => self.handler.on_unsubscribe(e).await,
        }?;

        counter!("webhook_events_dispatched_total", "event" => name).increment(1);
        Ok(())
    }
}
