use envconfig::Envconfig;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use webhooks::config::Config;
use webhooks::server::serve;

async fn shutdown() {
    let mut term = signal::unix::signal(signal::unix::SignalKind::terminate())
        .expect("failed to register SIGTERM handler");

    let mut interrupt = signal::unix::signal(signal::unix::SignalKind::interrupt())
        .expect("failed to register SIGINT handler");

    tokio::select! {
        _ = term.recv() => {},
        _ = interrupt.recv() => {},
    };

    tracing::info!("Shutting down gracefully...");
}

#[tokio::main]
async fn main() {
    let config = Config::init_from_env().expect("Invalid configuration:");

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let listener = TcpListener::bind(config.address)
        .await
        .expect("could not bind to address");

    serve(config, listener, shutdown()).await
}
