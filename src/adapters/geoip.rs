use crate::domain::ports::GeoIpProvider;
use crate::utils::error::{PppError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_GEOIP_ENDPOINT: &str = "http://ipwhois.app";
pub const DEFAULT_GEOIP_TIMEOUT: Duration = Duration::from_secs(4);

#[derive(Debug, Deserialize)]
struct IpWhoisResponse {
    success: Option<bool>,
    message: Option<String>,
    country_code: Option<String>,
}

/// Geo-IP lookups against the ipwhois.app JSON API (`GET {endpoint}/json/{ip}`).
pub struct IpWhoisProvider {
    client: Client,
    endpoint: String,
}

impl IpWhoisProvider {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        // 建不出帶逾時的 client 就直接失敗，不退回沒有逾時的預設值
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    fn lookup_url(&self, ip: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(ip.as_bytes()).collect();
        format!("{}/json/{}", self.endpoint, encoded)
    }
}

#[async_trait]
impl GeoIpProvider for IpWhoisProvider {
    async fn lookup(&self, ip: &str) -> Result<String> {
        let url = self.lookup_url(ip);
        tracing::debug!("Geo-IP request to: {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PppError::GeoIpError {
                message: format!("ipwhois returned HTTP {}", status),
            });
        }

        let body: IpWhoisResponse = response.json().await?;
        if body.success == Some(false) {
            return Err(PppError::GeoIpError {
                message: body
                    .message
                    .unwrap_or_else(|| "ipwhois reported an unsuccessful lookup".to_string()),
            });
        }

        body.country_code
            .map(|code| code.trim().to_string())
            .filter(|code| !code.is_empty())
            .ok_or_else(|| PppError::GeoIpError {
                message: format!("no country code for {}", ip),
            })
    }
}
