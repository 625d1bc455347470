use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub sender: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimiterConfig {
    pub enabled: bool,
    pub rps: f64,
    pub burst: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub env: String,
    pub smtp: SmtpConfig,
    pub limiter: LimiterConfig,
    pub cors_trusted_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".into());

        let smtp = SmtpConfig {
            host: std::env::var("SMTP_HOST").unwrap_or_else(|_| "smtp.mailtrap.io".into()),
            port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(25),
            username: std::env::var("SMTP_USERNAME").unwrap_or_default(),
            password: std::env::var("SMTP_PASSWORD").unwrap_or_default(),
            sender: std::env::var("SMTP_SENDER")
                .unwrap_or_else(|_| "Stridelog <no-reply@stridelog.net>".into()),
        };

        let limiter = LimiterConfig {
            enabled: std::env::var("LIMITER_ENABLED")
                .map(|v| v != "false")
                .unwrap_or(true),
            rps: std::env::var("LIMITER_RPS")
                .ok()
                .and_then(|v| v.parse::<f64>().ok())
                .unwrap_or(2.0),
            burst: std::env::var("LIMITER_BURST")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(4),
        };

        let cors_trusted_origins = std::env::var("CORS_TRUSTED_ORIGINS")
            .map(|v| {
                v.split_whitespace()
                    .map(|s| s.to_string())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        Ok(Self {
            database_url,
            env,
            smtp,
            limiter,
            cors_trusted_origins,
        })
    }
}
