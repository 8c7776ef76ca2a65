use std::path::PathBuf;

use anyhow::Context;
use tracing::warn;

/// Placeholder JWT secrets that must not be used outside development.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

const DEFAULT_JWT_SECRET: &str = "dev-secret-change-me";

/// An account created at startup rather than through registration.
#[derive(Debug, Clone)]
pub struct SeedAccount {
    pub email: String,
    pub phone: String,
    pub national_id: String,
    pub display_name: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub upload_dir: PathBuf,
    /// `None` means permissive CORS.
    pub allowed_origin: Option<String>,
    pub admin: Option<SeedAccount>,
    pub seed_demo: bool,
}

impl Config {
    /// Read configuration from `ALERTA_*` environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup; `from_env` passes the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match var("ALERTA_PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("ALERTA_PORT is not a valid port: {raw:?}"))?,
            None => 4000,
        };

        let jwt_secret = var("ALERTA_JWT_SECRET").unwrap_or_else(|| DEFAULT_JWT_SECRET.into());
        if PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            warn!("ALERTA_JWT_SECRET is unset or still a placeholder; do not run like this in production");
        }

        let admin = match (var("ALERTA_ADMIN_EMAIL"), var("ALERTA_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(SeedAccount {
                email,
                password,
                phone: var("ALERTA_ADMIN_PHONE").unwrap_or_else(|| "+51911111111".into()),
                national_id: var("ALERTA_ADMIN_NATIONAL_ID").unwrap_or_else(|| "00000000".into()),
                display_name: var("ALERTA_ADMIN_NAME").unwrap_or_else(|| "Administrator".into()),
            }),
            (None, None) => None,
            _ => anyhow::bail!("ALERTA_ADMIN_EMAIL and ALERTA_ADMIN_PASSWORD must be set together"),
        };

        let seed_demo = var("ALERTA_SEED_DEMO")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            host: var("ALERTA_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            jwt_secret,
            upload_dir: var("ALERTA_UPLOAD_DIR")
                .unwrap_or_else(|| "./uploads".into())
                .into(),
            allowed_origin: var("ALERTA_ALLOWED_ORIGIN"),
            admin,
            seed_demo,
        })
    }
}

/// Demo citizen seeded when `ALERTA_SEED_DEMO` is set.
pub fn demo_citizen() -> SeedAccount {
    SeedAccount {
        email: "demo@alerta.pe".into(),
        phone: "+51999999999".into(),
        national_id: "11111111".into(),
        display_name: "Demo Citizen".into(),
        password: "12345678".into(),
    }
}
