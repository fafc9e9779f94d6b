use std::future::ready;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use health::HealthRegistry;
use tower_http::trace::TraceLayer;

use crate::endpoint;
use crate::handler::Dispatcher;
use crate::prometheus::{setup_metrics_recorder, track_metrics};

#[derive(Clone)]
pub struct State {
    pub dispatcher: Arc<Dispatcher>,
}

pub fn router(dispatcher: Dispatcher, liveness: HealthRegistry, metrics: bool) -> Router {
    let state = State {
        dispatcher: Arc::new(dispatcher),
    };

    let router = Router::new()
        .route("/", get(endpoint::index))
        .route("/_readiness", get(endpoint::index))
        .route("/_liveness", get(move || ready(liveness.get_status())))
        .route("/hooks", post(endpoint::event))
        .route("/hooks/", post(endpoint::event))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(track_metrics))
        .with_state(state);

    // Don't install metrics unless asked to
    // Installing a global recorder when the crate is used as a library
    // (during tests etc) does not work well.
    if metrics {
        let recorder_handle = setup_metrics_recorder();
        router.route("/metrics", get(move || ready(recorder_handle.render())))
    } else {
        router
    }
}
