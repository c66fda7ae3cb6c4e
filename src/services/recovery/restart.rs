//! Запрос перезапуска обслуживающего процесса у внешней инфраструктуры.

use async_trait::async_trait;
use log::{info, warn};
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Результат запроса перезапуска
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartOutcome {
    Requested,
    /// A build or deployment is running; the infrastructure retries on its own.
    DeploymentInProgress,
    Failed(String),
}

#[async_trait]
pub trait RestartControl: Send + Sync {
    async fn request_restart(&self, service_id: &str) -> RestartOutcome;
}

/// Перезапуск через HTTP API хостинга
pub struct HttpRestartControl {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpRestartControl {
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.into(),
            token,
        }
    }
}

#[async_trait]
impl RestartControl for HttpRestartControl {
    async fn request_restart(&self, service_id: &str) -> RestartOutcome {
        info!("Requesting restart of {} via {}", service_id, self.endpoint);

        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "service_id": service_id }));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                info!("Restart of {} requested", service_id);
                RestartOutcome::Requested
            }
            Ok(response) if response.status() == StatusCode::CONFLICT => {
                warn!("Restart of {} skipped: deployment in progress", service_id);
                RestartOutcome::DeploymentInProgress
            }
            Ok(response) => {
                let status = response.status();
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|e| format!("failed to read error response: {}", e));
                RestartOutcome::Failed(format!("status {}: {}", status, body))
            }
            Err(e) => RestartOutcome::Failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_server::serve_once;

    #[tokio::test]
    async fn test_restart_requested() {
        let (base, request) = serve_once("200 OK", String::new()).await;
        let control = HttpRestartControl::new(format!("{}/restart", base), Some("secret".into()));
        assert_eq!(control.request_restart("svc-1").await, RestartOutcome::Requested);

        let request = request.await.unwrap();
        assert!(request.head.starts_with("POST /restart"));
        assert!(request.head.to_lowercase().contains("authorization: bearer secret"));
        assert!(request.body.contains("svc-1"));
    }

    #[tokio::test]
    async fn test_conflict_means_deployment_in_progress() {
        let (base, _) = serve_once("409 Conflict", String::new()).await;
        let control = HttpRestartControl::new(format!("{}/restart", base), None);
        assert_eq!(control.request_restart("svc-1").await, RestartOutcome::DeploymentInProgress);
    }

    #[tokio::test]
    async fn test_server_error_is_failure() {
        let (base, _) = serve_once("500 Internal Server Error", "boom".to_string()).await;
        let control = HttpRestartControl::new(format!("{}/restart", base), None);
        assert!(matches!(control.request_restart("svc-1").await, RestartOutcome::Failed(_)));
    }
}
