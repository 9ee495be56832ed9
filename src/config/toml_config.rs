use crate::adapters::geoip::DEFAULT_GEOIP_ENDPOINT;
use crate::core::csv_parser::{
    MalformedCellPolicy, ParserOptions, DEFAULT_FIRST_VALUE_COLUMN, DEFAULT_HEADER_ROWS,
};
use crate::core::pricing::ProxyErrorPolicy;
use crate::utils::error::{PppError, Result};
use crate::utils::validation::{self, Validate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_PLAN: &str = "lifetime";
const DEFAULT_TIMEOUT_SECONDS: u64 = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub import: ImportConfig,
    pub geoip: Option<GeoIpConfig>,
    pub proxy: Option<ProxyConfig>,
    #[serde(default = "default_plans")]
    pub plans: HashMap<String, PlanConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    pub csv_path: String,
    pub header_rows: Option<usize>,
    pub first_value_column: Option<usize>,
    pub on_malformed_cell: Option<MalformedCellPolicy>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoIpConfig {
    pub endpoint: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub on_error: Option<ProxyErrorPolicy>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanConfig {
    pub price_in_usd: Decimal,
    /// Opaque catalog id for the checkout layer.
    pub product_id: Option<String>,
}

fn default_plans() -> HashMap<String, PlanConfig> {
    let mut plans = HashMap::new();
    plans.insert(
        DEFAULT_PLAN.to_string(),
        PlanConfig {
            price_in_usd: Decimal::from(98),
            product_id: None,
        },
    );
    plans
}

impl AppConfig {
    /// Config with only the two required paths set; everything else at defaults.
    pub fn with_paths(database_path: impl Into<String>, csv_path: impl Into<String>) -> Self {
        Self {
            database: DatabaseConfig {
                path: database_path.into(),
            },
            import: ImportConfig {
                csv_path: csv_path.into(),
                header_rows: None,
                first_value_column: None,
                on_malformed_cell: None,
            },
            geoip: None,
            proxy: None,
            plans: default_plans(),
        }
    }

    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| PppError::ConfigError {
            message: format!("cannot read {}: {}", path.as_ref().display(), e),
        })?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| PppError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${PROXY_API_KEY})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| PppError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn parser_options(&self) -> ParserOptions {
        ParserOptions {
            header_rows: self.import.header_rows.unwrap_or(DEFAULT_HEADER_ROWS),
            first_value_column: self
                .import
                .first_value_column
                .unwrap_or(DEFAULT_FIRST_VALUE_COLUMN),
            on_malformed_cell: self.import.on_malformed_cell.unwrap_or_default(),
        }
    }

    pub fn geoip_endpoint(&self) -> &str {
        self.geoip
            .as_ref()
            .and_then(|geoip| geoip.endpoint.as_deref())
            .unwrap_or(DEFAULT_GEOIP_ENDPOINT)
    }

    pub fn geoip_timeout(&self) -> Duration {
        Duration::from_secs(
            self.geoip
                .as_ref()
                .and_then(|geoip| geoip.timeout_seconds)
                .unwrap_or(DEFAULT_TIMEOUT_SECONDS),
        )
    }

    pub fn proxy_timeout(&self) -> Duration {
        Duration::from_secs(
            self.proxy
                .as_ref()
                .and_then(|proxy| proxy.timeout_seconds)
                .unwrap_or(DEFAULT_TIMEOUT_SECONDS),
        )
    }

    pub fn proxy_error_policy(&self) -> ProxyErrorPolicy {
        self.proxy
            .as_ref()
            .and_then(|proxy| proxy.on_error)
            .unwrap_or_default()
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_path("database.path", &self.database.path)?;

        validation::validate_path("import.csv_path", &self.import.csv_path)?;
        validation::validate_file_extension("import.csv_path", &self.import.csv_path, &["csv"])?;
        if let Some(column) = self.import.first_value_column {
            validation::validate_positive_number("import.first_value_column", column, 2)?;
        }

        if let Some(geoip) = &self.geoip {
            if let Some(endpoint) = &geoip.endpoint {
                validation::validate_url("geoip.endpoint", endpoint)?;
            }
            if let Some(timeout) = geoip.timeout_seconds {
                validation::validate_range("geoip.timeout_seconds", timeout, 1, 60)?;
            }
        }

        if let Some(proxy) = &self.proxy {
            validation::validate_url("proxy.endpoint", &proxy.endpoint)?;
            if let Some(api_key) = &proxy.api_key {
                // 未設定的 ${VAR} 會原樣留下
                if api_key.starts_with("${") {
                    return Err(PppError::InvalidConfigValueError {
                        field: "proxy.api_key".to_string(),
                        value: api_key.clone(),
                        reason: "environment variable is not set".to_string(),
                    });
                }
                validation::validate_non_empty_string("proxy.api_key", api_key)?;
            }
            if let Some(timeout) = proxy.timeout_seconds {
                validation::validate_range("proxy.timeout_seconds", timeout, 1, 60)?;
            }
        }

        if self.plans.is_empty() {
            return Err(PppError::ConfigValidationError {
                field: "plans".to_string(),
                message: "at least one plan must be configured".to_string(),
            });
        }
        for (name, plan) in &self.plans {
            validation::validate_non_negative_decimal(
                &format!("plans.{}.price_in_usd", name),
                plan.price_in_usd,
            )?;
        }

        Ok(())
    }
}
