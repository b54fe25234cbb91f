use dotenvy::dotenv;
use ipnet::IpNet;
use serde::Deserialize;
use std::env;

pub const DEFAULT_API_URL: &str = "https://service.unitedpayment.ge";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedIps {
    Any,
    Cidrs(Vec<IpNet>),
}

/// Merchant credentials and mode. This is the settings provider the payment
/// services read from.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct GatewaySettings {
    pub dealer_code: String,
    pub username: String,
    pub password: String,
    pub test_mode: bool,
    pub api_url: String,
}

impl GatewaySettings {
    /// The gateway can take payments only with a complete credential set.
    pub fn is_configured(&self) -> bool {
        !self.dealer_code.trim().is_empty()
            && !self.username.trim().is_empty()
            && !self.password.trim().is_empty()
    }

    pub fn with_credentials(mut self, dealer_code: String, username: String, password: String) -> Self {
        self.dealer_code = dealer_code;
        self.username = username;
        self.password = password;
        self
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct StorefrontSettings {
    pub checkout_url: String,
    pub confirmation_url: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub public_base_url: String,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub allowed_ips: AllowedIps,
    pub trusted_proxy_depth: usize,
    pub log_json: bool,
    pub log_request_body: bool,
    pub cors_allowed_origins: Option<String>,
    pub gateway: GatewaySettings,
    pub storefront: StorefrontSettings,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let server_port: u16 = non_empty("SERVER_PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()?;
        let public_base_url = non_empty("PUBLIC_BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{}", server_port))
            .trim_end_matches('/')
            .to_string();
        url::Url::parse(&public_base_url)
            .map_err(|e| anyhow::anyhow!("PUBLIC_BASE_URL is not a valid URL: {}", e))?;

        let allowed_ips = parse_allowed_ips(&non_empty("ALLOWED_IPS").unwrap_or_else(|| "*".to_string()))?;
        let trusted_proxy_depth = non_empty("TRUSTED_PROXY_DEPTH")
            .unwrap_or_else(|| "0".to_string())
            .parse()?;

        let gateway = GatewaySettings {
            dealer_code: non_empty("GATEWAY_DEALER_CODE").unwrap_or_default(),
            username: non_empty("GATEWAY_USERNAME").unwrap_or_default(),
            password: non_empty("GATEWAY_PASSWORD").unwrap_or_default(),
            test_mode: parse_bool(non_empty("GATEWAY_TEST_MODE").as_deref(), true)?,
            api_url: non_empty("GATEWAY_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        };

        let storefront = StorefrontSettings {
            checkout_url: non_empty("CHECKOUT_URL")
                .unwrap_or_else(|| format!("{}/checkout", public_base_url)),
            confirmation_url: non_empty("CONFIRMATION_URL")
                .unwrap_or_else(|| format!("{}/checkout/order-received", public_base_url)),
        };

        Ok(Config {
            server_port,
            public_base_url,
            database_url: non_empty("DATABASE_URL"),
            redis_url: non_empty("REDIS_URL"),
            allowed_ips,
            trusted_proxy_depth,
            log_json: matches!(non_empty("LOG_FORMAT").as_deref(), Some("json")),
            log_request_body: parse_bool(non_empty("LOG_REQUEST_BODY").as_deref(), false)?,
            cors_allowed_origins: non_empty("CORS_ALLOWED_ORIGINS"),
            gateway,
            storefront,
        })
    }

    /// Problems that keep the service from taking real payments.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.server_port == 0 {
            problems.push("SERVER_PORT must be greater than 0".to_string());
        }
        if !self.gateway.is_configured() {
            problems.push(
                "GATEWAY_DEALER_CODE, GATEWAY_USERNAME and GATEWAY_PASSWORD must all be set"
                    .to_string(),
            );
        }
        if !self.gateway.test_mode {
            if let Err(e) = url::Url::parse(&self.gateway.api_url) {
                problems.push(format!("GATEWAY_API_URL is not a valid URL: {}", e));
            }
        }
        for (name, value) in [
            ("CHECKOUT_URL", &self.storefront.checkout_url),
            ("CONFIRMATION_URL", &self.storefront.confirmation_url),
        ] {
            if url::Url::parse(value).is_err() {
                problems.push(format!("{} is not a valid URL", name));
            }
        }
        problems
    }
}

fn parse_bool(raw: Option<&str>, default: bool) -> anyhow::Result<bool> {
    match raw.map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => anyhow::bail!("invalid boolean value: {}", v),
    }
}

pub fn parse_allowed_ips(raw: &str) -> anyhow::Result<AllowedIps> {
    let value = raw.trim();
    if value == "*" {
        return Ok(AllowedIps::Any);
    }

    let cidrs = value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::parse::<IpNet>)
        .collect::<Result<Vec<_>, _>>()?;

    if cidrs.is_empty() {
        anyhow::bail!("ALLOWED_IPS must be '*' or a comma-separated list of CIDRs");
    }

    Ok(AllowedIps::Cidrs(cidrs))
}
