use std::future::Future;
use std::time::Duration;

use health::HealthRegistry;
use tokio::net::TcpListener;

use crate::config::Config;
use crate::handler::{Dispatcher, LogHandler};
use crate::router;
use crate::signature::SigningKey;

pub async fn serve<F>(config: Config, listener: TcpListener, shutdown: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let liveness = HealthRegistry::new("liveness");
    let reporter = liveness.register("http", Duration::from_secs(30)).await;
    tokio::spawn(async move {
        // Heartbeat: the probe goes stale if the runtime stops scheduling us
        let mut tick = tokio::time::interval(Duration::from_secs(10));
        loop {
            tick.tick().await;
            reporter.report_healthy().await;
        }
    });

    let signing_key = config.signing_key.clone().map(SigningKey::new);
    let dispatcher = Dispatcher::new(LogHandler, signing_key);
    let app = router::router(dispatcher, liveness, config.export_prometheus);

    tracing::info!("listening on {:?}", listener.local_addr().unwrap());
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await
        .unwrap()
}
