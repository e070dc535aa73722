//! Periodic self-ping

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Config;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Issues a GET against a URL on a fixed interval
///
/// Failures are logged and the next tick proceeds as usual. The first ping
/// goes out one full interval after `start`.
pub struct KeepAliveService {
    enabled: bool,
    url: String,
    interval: Duration,
    client: reqwest::Client,
    running: Arc<RwLock<bool>>,
    task: Arc<RwLock<Option<JoinHandle<()>>>>,
}

impl KeepAliveService {
    pub fn new(config: &Config) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            enabled: config.keepalive.enabled,
            url: config.keepalive_url(),
            interval: Duration::from_secs(config.keepalive.interval_secs.max(1)),
            client,
            running: Arc::new(RwLock::new(false)),
            task: Arc::new(RwLock::new(None)),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Start the ping loop; no-op when disabled or already running
    pub async fn start(&self) {
        if !self.enabled {
            info!("Keep-alive disabled");
            return;
        }

        {
            let mut running = self.running.write().await;
            if *running {
                debug!("Keep-alive already running");
                return;
            }
            *running = true;
        }

        let client = self.client.clone();
        let url = self.url.clone();
        let interval = self.interval;
        let running = Arc::clone(&self.running);

        let task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if !*running.read().await {
                    break;
                }
                match ping(&client, &url).await {
                    Ok(status) => debug!("Keep-alive ping {} -> {}", url, status),
                    Err(e) => warn!("Keep-alive ping {} failed: {}", url, e),
                }
            }
        });

        *self.task.write().await = Some(task);
        info!(
            "Keep-alive started ({} every {}s)",
            self.url,
            self.interval.as_secs()
        );
    }

    pub async fn stop(&self) {
        *self.running.write().await = false;
        if let Some(task) = self.task.write().await.take() {
            task.abort();
        }
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Send one ping right away
    pub async fn ping_now(&self) -> crate::Result<u16> {
        ping(&self.client, &self.url).await
    }
}

async fn ping(client: &reqwest::Client, url: &str) -> crate::Result<u16> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| crate::Error::Internal(format!("keep-alive request failed: {}", e)))?;
    Ok(response.status().as_u16())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(url: Option<String>, enabled: bool, interval_secs: u64) -> Config {
        let mut config = Config::default();
        config.keepalive.enabled = enabled;
        config.keepalive.url = url;
        config.keepalive.interval_secs = interval_secs;
        config
    }

    #[tokio::test]
    async fn test_disabled_service_does_not_start() {
        let service = KeepAliveService::new(&config_for(None, false, 60));
        service.start().await;
        assert!(!service.is_running().await);
    }

    #[tokio::test]
    async fn test_defaults_to_local_health_endpoint() {
        let service = KeepAliveService::new(&config_for(None, true, 60));
        assert_eq!(service.url(), "http://127.0.0.1:3000/api/health");
    }

    #[tokio::test]
    async fn test_start_stop() {
        let service = KeepAliveService::new(&config_for(None, true, 3600));
        service.start().await;
        assert!(service.is_running().await);
        service.stop().await;
        assert!(!service.is_running().await);
    }

    #[tokio::test]
    async fn test_ping_now_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/health"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/api/health", server.uri());
        let service = KeepAliveService::new(&config_for(Some(url), true, 60));
        assert_eq!(service.ping_now().await.unwrap(), 200);
    }

    #[tokio::test]
    async fn test_loop_pings_on_interval() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let service = KeepAliveService::new(&config_for(Some(server.uri()), true, 1));
        service.start().await;
        tokio::time::sleep(Duration::from_millis(1500)).await;
        service.stop().await;

        let received = server.received_requests().await.unwrap_or_default();
        assert!(!received.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_url_is_an_error() {
        let service = KeepAliveService::new(&config_for(
            Some("http://127.0.0.1:9/unreachable".to_string()),
            true,
            60,
        ));
        assert!(service.ping_now().await.is_err());
    }
}
