use std::env;
use std::path::PathBuf;

/// Runtime configuration loaded from the environment.
///
/// `main` calls `dotenv().ok()` first, so a local `.env` file can supply
/// any of these values during development.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub server_host: String,
    pub server_port: u16,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    /// Whether `POST /api/auth/register` accepts new accounts
    pub allow_registration: bool,
    /// Adds the `Secure` attribute to the session cookie
    pub cookie_secure: bool,
    /// Prebuilt frontend bundle served behind the page gate
    pub static_dir: Option<PathBuf>,
    pub purge_interval_seconds: u64,
    pub cors_origin: Option<String>,
}

impl Config {
    /// Reads the configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URL` or `JWT_SECRET` is missing, or if a
    /// numeric/boolean variable cannot be parsed.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
        let jwt_secret =
            env::var("JWT_SECRET").map_err(|_| anyhow::anyhow!("JWT_SECRET must be set"))?;

        Ok(Self {
            database_url,
            database_max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 10)?,
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: parse_var("SERVER_PORT", 3000)?,
            jwt_secret,
            jwt_issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "stocklet".to_string()),
            jwt_audience: env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "stocklet-web".to_string()),
            allow_registration: parse_var("ALLOW_REGISTRATION", false)?,
            cookie_secure: parse_var("COOKIE_SECURE", false)?,
            static_dir: env::var("STATIC_DIR").ok().map(PathBuf::from),
            purge_interval_seconds: parse_var("PURGE_INTERVAL_SECONDS", 300)?,
            cors_origin: env::var("CORS_ORIGIN").ok(),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, anyhow::Error> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|_| anyhow::anyhow!("Invalid {}: {}", name, raw)),
        _ => Ok(default),
    }
}
