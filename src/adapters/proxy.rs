use crate::domain::model::{ProxyCheck, ProxyCheckStatus};
use crate::domain::ports::ProxyClassifier;
use crate::utils::error::{PppError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_PROXY_TIMEOUT: Duration = Duration::from_secs(4);

#[derive(Debug, Deserialize)]
struct ProxyCheckResponse {
    status: Option<String>,
    message: Option<String>,
    data: Option<ProxyCheckData>,
}

#[derive(Debug, Deserialize)]
struct ProxyCheckData {
    is_proxy: Option<bool>,
}

/// Proxy/VPN check over HTTP: `GET {endpoint}?ip=..&key=..` answering
/// `{"status": "...", "message": "...", "data": {"is_proxy": bool}}`.
pub struct HttpProxyClassifier {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpProxyClassifier {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        // 建不出帶逾時的 client 就直接失敗，不退回沒有逾時的預設值
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        })
    }
}

#[async_trait]
impl ProxyClassifier for HttpProxyClassifier {
    async fn check(&self, ip: &str) -> Result<ProxyCheck> {
        let mut request = self.client.get(&self.endpoint).query(&[("ip", ip)]);
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key.as_str())]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PppError::ProxyCheckError {
                message: format!("proxy check returned HTTP {}", status),
            });
        }

        let body: ProxyCheckResponse = response.json().await?;
        if body.status.as_deref() == Some("error") {
            return Ok(ProxyCheck::error(
                body.message.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }

        Ok(ProxyCheck {
            status: ProxyCheckStatus::Ok,
            message: body.message,
            is_proxy: body.data.and_then(|data| data.is_proxy),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn test_check_sends_ip_and_key() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/check")
                .query_param("ip", "185.220.101.1")
                .query_param("key", "secret");
            then.status(200).json_body(serde_json::json!({
                "status": "success",
                "data": {"ip": "185.220.101.1", "is_proxy": true}
            }));
        });

        let classifier = HttpProxyClassifier::new(
            server.url("/check"),
            Some("secret".to_string()),
            DEFAULT_PROXY_TIMEOUT,
        )
        .unwrap();
        let check = classifier.check("185.220.101.1").await.unwrap();

        api_mock.assert();
        assert_eq!(check, ProxyCheck::proxy());
    }

    #[tokio::test]
    async fn test_error_status_is_reported_not_raised() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/check");
            then.status(200).json_body(serde_json::json!({
                "status": "error",
                "message": "Invalid API key"
            }));
        });

        let classifier = HttpProxyClassifier::new(server.url("/check"), None, DEFAULT_PROXY_TIMEOUT).unwrap();
        let check = classifier.check("8.8.8.8").await.unwrap();

        assert_eq!(check, ProxyCheck::error("Invalid API key"));
    }

    #[tokio::test]
    async fn test_missing_verdict_stays_unknown() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/check");
            then.status(200).json_body(serde_json::json!({"status": "success"}));
        });

        let classifier = HttpProxyClassifier::new(server.url("/check"), None, DEFAULT_PROXY_TIMEOUT).unwrap();
        let check = classifier.check("8.8.8.8").await.unwrap();

        assert_eq!(check.status, ProxyCheckStatus::Ok);
        assert_eq!(check.is_proxy, None);
    }

    #[tokio::test]
    async fn test_http_failure_is_an_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/check");
            then.status(429);
        });

        let classifier = HttpProxyClassifier::new(server.url("/check"), None, DEFAULT_PROXY_TIMEOUT).unwrap();
        assert!(matches!(
            classifier.check("8.8.8.8").await,
            Err(PppError::ProxyCheckError { .. })
        ));
    }

    #[tokio::test]
    async fn test_configured_timeout_is_applied() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/check");
            then.status(200)
                .delay(Duration::from_secs(2))
                .json_body(serde_json::json!({"status": "success", "data": {"is_proxy": false}}));
        });

        let classifier =
            HttpProxyClassifier::new(server.url("/check"), None, Duration::from_millis(200)).unwrap();
        let err = classifier.check("8.8.8.8").await.unwrap_err();
        assert!(matches!(err, PppError::ApiError(ref e) if e.is_timeout()));
    }
}
