use crate::utils::error::{PppError, Result};
use crate::utils::validation::Validate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Latest PPP conversion factor for one country, keyed by ISO-3166 alpha-3 code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PppRecord {
    pub country_code: String,
    pub country_name: String,
    pub factor: Decimal,
}

impl PppRecord {
    pub fn new(
        country_code: impl Into<String>,
        country_name: impl Into<String>,
        factor: Decimal,
    ) -> Self {
        Self {
            country_code: country_code.into(),
            country_name: country_name.into(),
            factor,
        }
    }

    /// 係數為 0 代表沒有資料，不可拿來乘
    pub fn usable_factor(&self) -> Option<Decimal> {
        if self.factor.is_zero() {
            None
        } else {
            Some(self.factor)
        }
    }
}

impl Validate for PppRecord {
    fn validate(&self) -> Result<()> {
        if self.country_code.trim().is_empty() {
            return Err(PppError::ValidationError {
                message: format!("PPP record '{}' has an empty country code", self.country_name),
            });
        }
        if self.factor.is_sign_negative() && !self.factor.is_zero() {
            return Err(PppError::ValidationError {
                message: format!(
                    "PPP factor for {} cannot be negative: {}",
                    self.country_code, self.factor
                ),
            });
        }
        Ok(())
    }
}

/// Outcome of pricing one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceAdjustment {
    pub country_code_iso2: String,
    pub country_name: String,
    pub adjusted_price: Decimal,
    pub ppp_disabled: bool,
}

/// Signals the web layer hands over for one pricing request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub client_ip: Option<String>,
    /// Country code set by a trusted upstream (e.g. the `CF-IPCountry` header).
    pub trusted_country: Option<String>,
}

impl RequestContext {
    pub fn new(client_ip: impl Into<String>) -> Self {
        Self {
            client_ip: Some(client_ip.into()),
            trusted_country: None,
        }
    }

    pub fn with_trusted_country(mut self, country: impl Into<String>) -> Self {
        self.trusted_country = Some(country.into());
        self
    }

    pub fn ip(&self) -> Option<&str> {
        self.client_ip
            .as_deref()
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
    }

    pub fn trusted_country(&self) -> Option<&str> {
        self.trusted_country
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyCheckStatus {
    Ok,
    Error,
}

/// Raw verdict returned by a proxy classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyCheck {
    pub status: ProxyCheckStatus,
    pub message: Option<String>,
    pub is_proxy: Option<bool>,
}

impl ProxyCheck {
    pub fn clean() -> Self {
        Self {
            status: ProxyCheckStatus::Ok,
            message: None,
            is_proxy: Some(false),
        }
    }

    pub fn proxy() -> Self {
        Self {
            status: ProxyCheckStatus::Ok,
            message: None,
            is_proxy: Some(true),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ProxyCheckStatus::Error,
            message: Some(message.into()),
            is_proxy: None,
        }
    }
}
