use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use chrono::Duration;

const DEVELOPMENT_JWT_SECRET: &str = "loan-portal-development-secret";
const DEFAULT_CLIENT_URL: &str = "http://localhost:5173";
const MAX_SESSION_SECS: i64 = 365 * 24 * 60 * 60;
const MAX_OTP_TTL_SECS: i64 = 24 * 60 * 60;
const LOCAL_CLIENT_ORIGINS: [&str; 4] = [
    "http://localhost:5173",
    "http://localhost:5174",
    "http://localhost:5175",
    "http://localhost:5176",
];

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }

    pub fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub auth: AuthConfig,
    pub mail: MailConfig,
    pub predictor: PredictorConfig,
    pub cors: CorsConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment =
            AppEnvironment::from_str(&var("APP_ENV").unwrap_or_else(|| "development".to_string()));

        let host = var("APP_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = var("APP_PORT")
            .or_else(|| var("PORT"))
            .unwrap_or_else(|| "5000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = var("APP_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let jwt_secret = match var("JWT_SECRET") {
            Some(secret) => secret,
            None if environment.is_production() => {
                return Err(ConfigError::MissingSecret("JWT_SECRET"))
            }
            None => DEVELOPMENT_JWT_SECRET.to_string(),
        };

        let session_ttl = parse_duration(&var("JWT_EXPIRES_IN").unwrap_or_else(|| "7d".to_string()))
            .ok_or(ConfigError::InvalidDuration("JWT_EXPIRES_IN"))?;
        let otp_ttl = number_or::<i64>("OTP_TTL_SECONDS", 600)
            .ok()
            .filter(|secs| (1..=MAX_OTP_TTL_SECS).contains(secs))
            .and_then(Duration::try_seconds)
            .ok_or(ConfigError::InvalidNumber("OTP_TTL_SECONDS"))?;
        let bcrypt_cost = number_or("BCRYPT_COST", 10)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::InvalidNumber("BCRYPT_COST"));
        }
        let cookie_secure = flag("COOKIE_SECURE")?.unwrap_or(false);

        let admin = match (var("ADMIN_EMAIL"), var("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminSeed {
                name: var("ADMIN_NAME").unwrap_or_else(|| "Administrator".to_string()),
                email,
                password,
            }),
            _ => None,
        };

        let mail_port = number_or("MAIL_PORT", 465)?;
        let mail = MailConfig {
            host: var("MAIL_HOST"),
            user: var("MAIL_USER"),
            password: var("MAIL_PASS"),
            port: mail_port,
            secure: flag("MAIL_SECURE")?.unwrap_or(mail_port == 465),
        };

        let predictor = PredictorConfig {
            base_url: var("PREDICTOR_URL").unwrap_or_else(|| "http://localhost:8000".to_string()),
            timeout_secs: number_or("PREDICTOR_TIMEOUT_SECS", 15)?,
        };

        let cors = CorsConfig {
            client_url: var("CLIENT_URL").unwrap_or_else(|| DEFAULT_CLIENT_URL.to_string()),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            auth: AuthConfig {
                jwt_secret,
                session_ttl,
                otp_ttl,
                bcrypt_cost,
                cookie_secure,
                admin,
            },
            mail,
            predictor,
            cors,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Session, OTP, and password hashing settings.
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub session_ttl: Duration,
    pub otp_ttl: Duration,
    pub bcrypt_cost: u32,
    pub cookie_secure: bool,
    pub admin: Option<AdminSeed>,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("session_ttl", &self.session_ttl)
            .field("otp_ttl", &self.otp_ttl)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("cookie_secure", &self.cookie_secure)
            .field("admin", &self.admin.as_ref().map(|seed| &seed.email))
            .finish()
    }
}

/// Administrator account created at startup when configured.
#[derive(Clone)]
pub struct AdminSeed {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// SMTP relay settings. Delivery is disabled unless host, user, and password are all set.
#[derive(Clone)]
pub struct MailConfig {
    pub host: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub port: u16,
    pub secure: bool,
}

impl fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailConfig")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("port", &self.port)
            .field("secure", &self.secure)
            .finish()
    }
}

/// Location of the external credit-risk prediction service.
#[derive(Debug, Clone)]
pub struct PredictorConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub client_url: String,
}

impl CorsConfig {
    /// Configured client origin followed by the local dev-server ports, deduplicated.
    pub fn allowed_origins(&self) -> Vec<String> {
        let mut origins = vec![self.client_url.clone()];
        for origin in LOCAL_CLIENT_ORIGINS {
            if !origins.iter().any(|existing| existing == origin) {
                origins.push(origin.to_string());
            }
        }
        origins
    }
}

/// Parses `7d`, `12h`, `30m`, `45s`, or a bare number of seconds, up to one year.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let amount: i64 = digits.parse().ok()?;

    let seconds = match unit.trim() {
        "" | "s" => amount,
        "m" => amount.checked_mul(60)?,
        "h" => amount.checked_mul(60 * 60)?,
        "d" => amount.checked_mul(24 * 60 * 60)?,
        _ => return None,
    };

    if !(1..=MAX_SESSION_SECS).contains(&seconds) {
        return None;
    }
    Duration::try_seconds(seconds)
}

fn var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn flag(key: &'static str) -> Result<Option<bool>, ConfigError> {
    let Some(raw) = var(key) else {
        return Ok(None);
    };
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(Some(true)),
        "false" | "0" | "no" | "off" => Ok(Some(false)),
        _ => Err(ConfigError::InvalidFlag(key)),
    }
}

fn number_or<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match var(key) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidNumber(key)),
        None => Ok(default),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidDuration(&'static str),
    InvalidNumber(&'static str),
    InvalidFlag(&'static str),
    MissingSecret(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidDuration(key) => {
                write!(f, "{key} must look like 7d, 12h, 30m, 45s or a number of seconds")
            }
            ConfigError::InvalidNumber(key) => write!(f, "{key} is not a valid number"),
            ConfigError::InvalidFlag(key) => {
                write!(f, "{key} must be one of true/false, 1/0, yes/no, on/off")
            }
            ConfigError::MissingSecret(key) => write!(f, "{key} is required in production"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidDuration(_)
            | ConfigError::InvalidNumber(_)
            | ConfigError::InvalidFlag(_)
            | ConfigError::MissingSecret(_) => None,
        }
    }
}
