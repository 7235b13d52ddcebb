use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub allow_origin: String,
    pub allow_methods: Vec<String>,
    pub allow_headers: Vec<String>,
    pub max_age: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub host: String,
    pub port: u16,
    pub jwt: JwtConfig,
    pub cors: CorsConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let required = |key: &str| lookup(key).with_context(|| format!("{key} must be set"));
        let or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.into());

        let database_url = required("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: required("JWT_SECRET")?,
        };
        let cors = CorsConfig {
            allow_origin: or("CORS_ALLOW_ORIGIN", "*"),
            allow_methods: split_list(&or("CORS_ALLOW_METHODS", "GET,POST,PUT,DELETE,OPTIONS")),
            allow_headers: split_list(&or("CORS_ALLOW_HEADERS", "Content-Type,Authorization")),
            max_age: or("CORS_MAX_AGE", "600")
                .parse()
                .context("CORS_MAX_AGE must be a number of seconds")?,
        };

        Ok(Self {
            database_url,
            db_max_connections: or("DB_MAX_CONNECTIONS", "10")
                .parse()
                .context("DB_MAX_CONNECTIONS must be a number")?,
            host: or("APP_HOST", "0.0.0.0"),
            port: or("APP_PORT", "8100")
                .parse()
                .context("APP_PORT must be a port number")?,
            jwt,
            cors,
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}
