use std::{fmt::Display, path::PathBuf, str::FromStr};

use anyhow::{Context, bail};
use cardsurvey_stats::UnknownOptionPolicy;
use tracing::info;

const PLACEHOLDER_SECRETS: &[&str] = &["dev-secret-change-me", "change-me-to-a-random-string"];

pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    pub unknown_option: UnknownOptionPolicy,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::load(|key| std::env::var(key).ok())
    }

    fn load(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = var("CARDSURVEY_JWT_SECRET")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .context("CARDSURVEY_JWT_SECRET must be set")?;
        if PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("CARDSURVEY_JWT_SECRET is still the example placeholder");
        }

        let ttl_days: i64 = try_load(&var, "CARDSURVEY_TOKEN_TTL_DAYS", "30")?;
        if ttl_days <= 0 {
            bail!("CARDSURVEY_TOKEN_TTL_DAYS must be positive");
        }

        Ok(Self {
            host: try_load(&var, "CARDSURVEY_HOST", "0.0.0.0")?,
            port: try_load(&var, "CARDSURVEY_PORT", "3000")?,
            db_path: try_load(&var, "CARDSURVEY_DB_PATH", "cardsurvey.db")?,
            jwt_secret,
            token_ttl: chrono::Duration::days(ttl_days),
            unknown_option: try_load(&var, "CARDSURVEY_UNKNOWN_OPTION", "reject")?,
        })
    }
}

fn try_load<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = var(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.parse()
        .map_err(|e| anyhow::anyhow!("invalid {key} value {raw:?}: {e}"))
}
