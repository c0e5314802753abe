use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub issuer: String,
    pub audience: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// Attributes shared by the `accessToken` and `refreshToken` cookies.
#[derive(Debug, Clone, Deserialize)]
pub struct CookieConfig {
    pub secure: bool,
    pub max_age_secs: i64,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            secure: true,
            max_age_secs: 24 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub public_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub cookies: CookieConfig,
    pub storage: StorageConfig,
    pub cors_origin: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL")?;

        let jwt = JwtConfig {
            access_secret: std::env::var("ACCESS_TOKEN_SECRET").context("ACCESS_TOKEN_SECRET")?,
            refresh_secret: std::env::var("REFRESH_TOKEN_SECRET")
                .context("REFRESH_TOKEN_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "vidtube".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "vidtube-users".into()),
            access_ttl_minutes: env_parse("ACCESS_TOKEN_TTL_MINUTES").unwrap_or(15),
            refresh_ttl_minutes: env_parse("REFRESH_TOKEN_TTL_MINUTES").unwrap_or(60 * 24 * 10),
        };

        let defaults = CookieConfig::default();
        let cookies = CookieConfig {
            secure: std::env::var("COOKIE_SECURE")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(defaults.secure),
            max_age_secs: env_parse("COOKIE_MAX_AGE_SECS").unwrap_or(defaults.max_age_secs),
        };

        let endpoint = std::env::var("S3_ENDPOINT").context("S3_ENDPOINT")?;
        let bucket = std::env::var("S3_BUCKET").context("S3_BUCKET")?;
        let public_url = std::env::var("S3_PUBLIC_URL")
            .unwrap_or_else(|_| format!("{}/{}", endpoint.trim_end_matches('/'), bucket));
        let storage = StorageConfig {
            access_key: std::env::var("S3_ACCESS_KEY").context("S3_ACCESS_KEY")?,
            secret_key: std::env::var("S3_SECRET_KEY").context("S3_SECRET_KEY")?,
            region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into()),
            public_url: public_url.trim_end_matches('/').to_string(),
            endpoint,
            bucket,
        };

        let cors_origin =
            std::env::var("CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:5173".into());

        let config = Self {
            database_url,
            jwt,
            cookies,
            storage,
            cors_origin,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.jwt.access_secret != self.jwt.refresh_secret,
            "ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must differ"
        );
        anyhow::ensure!(
            self.jwt.access_ttl_minutes > 0 && self.jwt.refresh_ttl_minutes > 0,
            "token TTLs must be positive"
        );
        anyhow::ensure!(
            self.cookies.max_age_secs > 0,
            "COOKIE_MAX_AGE_SECS must be positive"
        );
        Ok(())
    }
}

fn env_parse(key: &str) -> Option<i64> {
    std::env::var(key).ok().and_then(|v| v.parse::<i64>().ok())
}
