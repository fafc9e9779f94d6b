use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tokio::sync::mpsc;
use tracing::warn;

/// Liveness reporting for the components of a service.
///
/// Components register against a `HealthRegistry` and periodically report
/// in through their `HealthHandle`. The process is healthy only while every
/// registered component has recently reported healthy: a component that
/// reports unhealthy, or that misses its deadline, fails the probe.

#[derive(Default, Debug)]
pub struct HealthStatus {
    /// True if every registered component is currently healthy.
    pub healthy: bool,
    /// Current status of each registered component, for display.
    pub components: HashMap<String, ComponentStatus>,
}

impl IntoResponse for HealthStatus {
    /// Maps the overall status to a status code, with the per-component
    /// detail in the body for debugging.
    fn into_response(self) -> Response {
        let body = format!("{self:?}");
        match self.healthy {
            true => (StatusCode::OK, body),
            false => (StatusCode::INTERNAL_SERVER_ERROR, body),
        }
        .into_response()
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ComponentStatus {
    /// Set when a component is newly registered, before its first report.
    Starting,
    /// Recently reported healthy, must report again before the date.
    HealthyUntil(time::OffsetDateTime),
    /// Reported unhealthy.
    Unhealthy,
    /// Set when the HealthyUntil deadline is missed.
    Stalled,
}

struct HealthMessage {
    component: String,
    status: ComponentStatus,
}

#[derive(Clone)]
pub struct HealthHandle {
    component: String,
    deadline: Duration,
    sender: mpsc::Sender<HealthMessage>,
}

impl HealthHandle {
    /// Report healthy, valid until the component's deadline. Must be called
    /// more frequently than the deadline for the probe to stay green.
    pub async fn report_healthy(&self) {
        self.report_status(ComponentStatus::HealthyUntil(
            time::OffsetDateTime::now_utc() + self.deadline,
        ))
        .await
    }

    /// Report an explicit component status, returns when the message is queued.
    pub async fn report_status(&self, status: ComponentStatus) {
        let message = HealthMessage {
            component: self.component.clone(),
            status,
        };
        if let Err(err) = self.sender.send(message).await {
            warn!("failed to report health status: {}", err)
        }
    }
}

#[derive(Clone)]
pub struct HealthRegistry {
    name: String,
    components: Arc<RwLock<HashMap<String, ComponentStatus>>>,
    sender: mpsc::Sender<HealthMessage>,
}

impl HealthRegistry {
    pub fn new(name: &str) -> Self {
        let (tx, mut rx) = mpsc::channel::<HealthMessage>(16);
        let registry = Self {
            name: name.to_owned(),
            components: Default::default(),
            sender: tx,
        };

        let components = registry.components.clone();
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                if let Ok(mut map) = components.write() {
                    _ = map.insert(message.component, message.status);
                } else {
                    // Poisoned lock: the probes will fail and the process restart
                    warn!("poisoned HealthRegistry lock")
                }
            }
        });

        registry
    }

    /// Registers a new component. The returned handle should be passed to the
    /// component so it can report its status as it runs.
    pub async fn register(&self, component: &str, deadline: Duration) -> HealthHandle {
        let handle = HealthHandle {
            component: component.to_owned(),
            deadline,
            sender: self.sender.clone(),
        };
        handle.report_status(ComponentStatus::Starting).await;
        handle
    }

    /// Returns the overall process status, computed from the status of every
    /// registered component. Usable as an axum handler.
    pub fn get_status(&self) -> HealthStatus {
        let components = self
            .components
            .read()
            .expect("poisoned HealthRegistry lock");

        let now = time::OffsetDateTime::now_utc();
        let mut result = HealthStatus {
            // Unhealthy until at least one component has registered
            healthy: !components.is_empty(),
            components: Default::default(),
        };

        for (name, status) in components.iter() {
            match status {
                ComponentStatus::HealthyUntil(until) if until.gt(&now) => {
                    _ = result.components.insert(name.clone(), status.clone());
                }
                ComponentStatus::HealthyUntil(_) => {
                    result.healthy = false;
                    _ = result
                        .components
                        .insert(name.clone(), ComponentStatus::Stalled);
                }
                _ => {
                    result.healthy = false;
                    _ = result.components.insert(name.clone(), status.clone());
                }
            }
        }

        match result.healthy {
            true => tracing::debug!("{} health check ok", self.name),
            false => warn!("{} health check failed: {:?}", self.name, result.components),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::ops::{Add, Sub};
    use std::time::Duration;

    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use time::OffsetDateTime;

    use crate::{ComponentStatus, HealthRegistry, HealthStatus};

    async fn assert_or_retry<F>(check: F)
    where
        F: Fn() -> bool,
    {
        let deadline = OffsetDateTime::now_utc().add(Duration::from_secs(5));
        while !check() && OffsetDateTime::now_utc().lt(&deadline) {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(check())
    }

    #[tokio::test]
    async fn defaults_to_unhealthy() {
        let registry = HealthRegistry::new("liveness");
        assert!(!registry.get_status().healthy);
    }

    #[tokio::test]
    async fn one_component() {
        let registry = HealthRegistry::new("liveness");

        // New components are registered in Starting
        let handle = registry.register("one", Duration::from_secs(30)).await;
        assert_or_retry(|| registry.get_status().components.len() == 1).await;
        let mut status = registry.get_status();
        assert!(!status.healthy);
        assert_eq!(
            status.components.get("one"),
            Some(&ComponentStatus::Starting)
        );

        // Status goes healthy once the component reports
        handle.report_healthy().await;
        assert_or_retry(|| registry.get_status().healthy).await;
        status = registry.get_status();
        assert_eq!(status.components.len(), 1);

        // Status goes unhealthy if the component says so
        handle.report_status(ComponentStatus::Unhealthy).await;
        assert_or_retry(|| !registry.get_status().healthy).await;
        status = registry.get_status();
        assert_eq!(
            status.components.get("one"),
            Some(&ComponentStatus::Unhealthy)
        );
    }

    #[tokio::test]
    async fn staleness_check() {
        let registry = HealthRegistry::new("liveness");
        let handle = registry.register("one", Duration::from_secs(30)).await;

        handle.report_healthy().await;
        assert_or_retry(|| registry.get_status().healthy).await;

        // A component whose last report has expired is stalled and fails the probe
        handle
            .report_status(ComponentStatus::HealthyUntil(
                OffsetDateTime::now_utc().sub(Duration::from_secs(1)),
            ))
            .await;
        assert_or_retry(|| !registry.get_status().healthy).await;
        let status = registry.get_status();
        assert_eq!(
            status.components.get("one"),
            Some(&ComponentStatus::Stalled)
        );
    }

    #[tokio::test]
    async fn several_components() {
        let registry = HealthRegistry::new("liveness");
        let handle1 = registry.register("one", Duration::from_secs(30)).await;
        let handle2 = registry.register("two", Duration::from_secs(30)).await;
        assert_or_retry(|| registry.get_status().components.len() == 2).await;

        // First component going healthy is not enough
        handle1.report_healthy().await;
        assert_or_retry(|| {
            registry.get_status().components.get("one").unwrap() != &ComponentStatus::Starting
        })
        .await;
        assert!(!registry.get_status().healthy);

        // Second component going healthy brings the health to green
        handle2.report_healthy().await;
        assert_or_retry(|| registry.get_status().healthy).await;

        // Either component going unhealthy takes the health back down
        handle1.report_status(ComponentStatus::Unhealthy).await;
        assert_or_retry(|| !registry.get_status().healthy).await;
    }

    #[tokio::test]
    async fn into_response() {
        let nok = HealthStatus::default().into_response();
        assert_eq!(nok.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let ok = HealthStatus {
            healthy: true,
            components: Default::default(),
        }
        .into_response();
        assert_eq!(ok.status(), StatusCode::OK);
    }
}
