//! Environment-driven configuration.

use std::env;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    /// Payment processor API base URL.
    pub payco_api_url: String,
    /// Payment processor OAuth token endpoint.
    pub payco_sso_url: String,
    /// Shared secret for processor webhook signatures. When unset the
    /// signature check is skipped, which is only acceptable in
    /// development.
    pub payco_webhook_secret: Option<String>,
    /// Commerce platform API base URL.
    pub nuvemshop_api_url: String,
    /// Comma-separated list; unset means permissive CORS.
    pub cors_allowed_origins: Option<String>,
    pub environment: String,
}

const DEFAULT_PAYCO_API_URL: &str = "https://api.payments.payco.com.br";
const DEFAULT_PAYCO_SSO_URL: &str =
    "https://sso.payco.com.br/auth/realms/payco/protocol/openid-connect/token";
const DEFAULT_NUVEMSHOP_API_URL: &str = "https://api.nuvemshop.com.br/v1";

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let server_port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .context("PORT must be a valid port number")?;

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        Ok(Self {
            server_port,
            database_url,
            payco_api_url: env::var("PAYCO_API_URL")
                .unwrap_or_else(|_| DEFAULT_PAYCO_API_URL.to_string()),
            payco_sso_url: env::var("PAYCO_SSO_URL")
                .unwrap_or_else(|_| DEFAULT_PAYCO_SSO_URL.to_string()),
            payco_webhook_secret: env::var("PAYCO_WEBHOOK_SECRET").ok(),
            nuvemshop_api_url: env::var("NUVEMSHOP_API_URL")
                .unwrap_or_else(|_| DEFAULT_NUVEMSHOP_API_URL.to_string()),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS").ok(),
            environment: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        url::Url::parse(&self.payco_api_url).context("PAYCO_API_URL is not a valid URL")?;
        url::Url::parse(&self.payco_sso_url).context("PAYCO_SSO_URL is not a valid URL")?;
        url::Url::parse(&self.nuvemshop_api_url)
            .context("NUVEMSHOP_API_URL is not a valid URL")?;
        if self.is_production() && self.payco_webhook_secret.is_none() {
            anyhow::bail!("PAYCO_WEBHOOK_SECRET must be set in production");
        }
        Ok(())
    }
}
