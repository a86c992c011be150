use std::env;

const DEV_JWT_SECRET: &str = "dev-secret-change-me";
const MAX_JWT_TTL_DAYS: i64 = 3650;
const MAX_OTP_EXPIRY_MINUTES: i64 = 24 * 60;

/// Server configuration loaded from `NOTES_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: String,
    pub jwt_secret: String,
    pub jwt_ttl_days: i64,
    /// How long an issued OTP stays valid.
    pub otp_expiry_minutes: i64,
    /// Single origin allowed by CORS.
    pub frontend_url: String,
    /// Audience for Google ID tokens. Google sign-in is refused when unset.
    pub google_client_id: Option<String>,
    /// HTTP mail API endpoint. Falls back to the logging mailer when unset.
    pub mail_api_url: Option<String>,
    pub mail_api_key: Option<String>,
    pub mail_from: String,
    /// Enables the dispatch diagnostics store and the developer routes.
    pub dev_endpoints: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = get("NOTES_JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("NOTES_JWT_SECRET not set, using the development secret");
            DEV_JWT_SECRET.to_string()
        });

        Ok(Config {
            host: get("NOTES_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(get("NOTES_PORT"), "NOTES_PORT", 8000)?,
            db_path: get("NOTES_DB_PATH").unwrap_or_else(|| "notes.db".to_string()),
            jwt_secret,
            jwt_ttl_days: parse_in_range(get("NOTES_JWT_TTL_DAYS"), "NOTES_JWT_TTL_DAYS", 30, MAX_JWT_TTL_DAYS)?,
            otp_expiry_minutes: parse_in_range(
                get("NOTES_OTP_EXPIRY_MINUTES"),
                "NOTES_OTP_EXPIRY_MINUTES",
                10,
                MAX_OTP_EXPIRY_MINUTES,
            )?,
            frontend_url: get("NOTES_FRONTEND_URL").unwrap_or_else(|| "http://localhost:3000".to_string()),
            google_client_id: get("NOTES_GOOGLE_CLIENT_ID"),
            mail_api_url: get("NOTES_MAIL_API_URL"),
            mail_api_key: get("NOTES_MAIL_API_KEY"),
            mail_from: get("NOTES_MAIL_FROM").unwrap_or_else(|| "Notes App <no-reply@notes.local>".to_string()),
            dev_endpoints: parse_bool(get("NOTES_DEV_ENDPOINTS"), "NOTES_DEV_ENDPOINTS")?,
        })
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError> {
    match value {
        Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid(key, v)),
        None => Ok(default),
    }
}

/// Like `parse_or`, but the value must lie in `1..=max`.
fn parse_in_range(value: Option<String>, key: &'static str, default: i64, max: i64) -> Result<i64, ConfigError> {
    let raw = value.clone();
    let parsed = parse_or(value, key, default)?;
    if !(1..=max).contains(&parsed) {
        return Err(ConfigError::Invalid(key, raw.unwrap_or_else(|| parsed.to_string())));
    }
    Ok(parsed)
}

fn parse_bool(value: Option<String>, key: &'static str) -> Result<bool, ConfigError> {
    match value.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid(key, v.clone())),
        },
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: '{1}'")]
    Invalid(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.otp_expiry_minutes, 10);
        assert_eq!(config.jwt_ttl_days, 30);
        assert_eq!(config.frontend_url, "http://localhost:3000");
        assert_eq!(config.jwt_secret, DEV_JWT_SECRET);
        assert!(config.google_client_id.is_none());
        assert!(config.mail_api_url.is_none());
        assert!(!config.dev_endpoints);
    }

    #[test]
    fn values_are_read_and_parsed() {
        let config = config_from(&[
            ("NOTES_PORT", "9000"),
            ("NOTES_OTP_EXPIRY_MINUTES", "3"),
            ("NOTES_GOOGLE_CLIENT_ID", "client-123"),
            ("NOTES_DEV_ENDPOINTS", "true"),
            ("NOTES_MAIL_API_URL", ""),
        ])
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.otp_expiry_minutes, 3);
        assert_eq!(config.google_client_id.as_deref(), Some("client-123"));
        assert!(config.dev_endpoints);
        assert!(config.mail_api_url.is_none());
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = config_from(&[("NOTES_OTP_EXPIRY_MINUTES", "ten")]).unwrap_err();
        assert!(err.to_string().contains("NOTES_OTP_EXPIRY_MINUTES"));
        assert!(config_from(&[("NOTES_DEV_ENDPOINTS", "maybe")]).is_err());
    }

    #[test]
    fn durations_must_be_positive_and_bounded() {
        for value in ["0", "-5", "999999999999999"] {
            let err = config_from(&[("NOTES_OTP_EXPIRY_MINUTES", value)]).unwrap_err();
            assert!(err.to_string().contains("NOTES_OTP_EXPIRY_MINUTES"), "accepted {value}");

            let err = config_from(&[("NOTES_JWT_TTL_DAYS", value)]).unwrap_err();
            assert!(err.to_string().contains("NOTES_JWT_TTL_DAYS"), "accepted {value}");
        }

        let config = config_from(&[("NOTES_OTP_EXPIRY_MINUTES", "1440"), ("NOTES_JWT_TTL_DAYS", "1")]).unwrap();
        assert_eq!(config.otp_expiry_minutes, 1440);
        assert_eq!(config.jwt_ttl_days, 1);
    }
}
