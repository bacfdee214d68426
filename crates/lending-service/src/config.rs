use base64::{engine::general_purpose, Engine as _};
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default gRPC methods reachable without a bearer token.
pub const DEFAULT_AUTH_EXCLUDED_METHODS: &str = "Register,Login,RefreshToken,IsUserExist";

/// bcrypt cost bounds accepted by the `bcrypt` crate.
pub const MIN_BCRYPT_COST: u32 = 4;
pub const MAX_BCRYPT_COST: u32 = 31;
pub const DEFAULT_BCRYPT_COST: u32 = 12;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub grpc_bind_address: String,
    pub http_bind_address: String,
    pub db_max_connections: u32,
    pub bcrypt_cost: u32,
    pub jwt: JwtConfig,
    pub jwks_url: Option<String>,
    pub jwks_cache_ttl: Duration,
    pub auth_excluded_methods: Vec<String>,
    pub default_country_code: String,
    pub smtp: SmtpConfig,
    pub notification_queue_capacity: usize,
    pub notification_from: String,
    pub log_json: bool,
}

/// Token signing configuration.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Signing keys; the first entry signs new tokens.
    pub keys: Vec<SigningKeyConfig>,
    pub access_token_issuer: String,
    pub access_token_ttl: Duration,
    pub refresh_token_issuer: String,
    pub refresh_token_ttl: Duration,
    pub refresh_token_extended_ttl: Duration,
}

/// One configured RSA key pair. Both PEMs arrive base64 encoded.
#[derive(Debug, Clone)]
pub struct SigningKeyConfig {
    pub kid: String,
    pub private_key_pem: SecretString,
    pub public_key_pem: String,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize)]
struct RawSigningKey {
    kid: String,
    private_key: String,
    public_key: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("Invalid JWT_KEYS: {0}")]
    InvalidSigningKeys(String),
}

fn invalid(name: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        reason: reason.into(),
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing)
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = required(vars, "DATABASE_URL")?;

        let grpc_bind_address = optional(vars, "GRPC_BIND_ADDRESS", "0.0.0.0:50051");
        let http_bind_address = optional(vars, "HTTP_BIND_ADDRESS", "0.0.0.0:8080");
        let db_max_connections = parse_number(vars, "DB_MAX_CONNECTIONS", 5u32)?;

        let bcrypt_cost = parse_number(vars, "BCRYPT_COST", DEFAULT_BCRYPT_COST)?;
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&bcrypt_cost) {
            return Err(invalid(
                "BCRYPT_COST",
                format!("must be between {MIN_BCRYPT_COST} and {MAX_BCRYPT_COST}"),
            ));
        }

        let jwt = JwtConfig {
            keys: parse_signing_keys(&required(vars, "JWT_KEYS")?)?,
            access_token_issuer: required(vars, "JWT_ACCESS_TOKEN_ISSUER")?,
            access_token_ttl: parse_duration_var(vars, "JWT_ACCESS_TOKEN_TTL", "15m")?,
            refresh_token_issuer: required(vars, "JWT_REFRESH_TOKEN_ISSUER")?,
            refresh_token_ttl: parse_duration_var(vars, "JWT_REFRESH_TOKEN_TTL", "24h")?,
            refresh_token_extended_ttl: parse_duration_var(
                vars,
                "JWT_REFRESH_TOKEN_EXTENDED_TTL",
                "720h",
            )?,
        };

        if jwt.access_token_issuer == jwt.refresh_token_issuer {
            return Err(invalid(
                "JWT_REFRESH_TOKEN_ISSUER",
                "must differ from JWT_ACCESS_TOKEN_ISSUER",
            ));
        }

        let jwks_url = vars.get("JWKS_URL").filter(|v| !v.is_empty()).cloned();
        let jwks_cache_ttl = Duration::from_secs(parse_number(vars, "JWKS_CACHE_TTL_SECONDS", 300u64)?);

        let auth_excluded_methods = optional(vars, "AUTH_EXCLUDED_METHODS", DEFAULT_AUTH_EXCLUDED_METHODS)
            .split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(String::from)
            .collect();

        let default_country_code = optional(vars, "DEFAULT_COUNTRY_CODE", "+62");
        if !default_country_code.starts_with('+') {
            return Err(invalid("DEFAULT_COUNTRY_CODE", "must start with '+'"));
        }

        let smtp_enabled = parse_bool(vars, "SMTP_ENABLED", false)?;
        let smtp_host = vars.get("SMTP_HOST").cloned().unwrap_or_default();
        if smtp_enabled && smtp_host.is_empty() {
            return Err(ConfigError::MissingEnvVar("SMTP_HOST".to_string()));
        }
        let smtp = SmtpConfig {
            enabled: smtp_enabled,
            host: smtp_host,
            port: parse_number(vars, "SMTP_PORT", 1025u16)?,
        };

        let notification_queue_capacity = parse_number(vars, "NOTIFICATION_QUEUE_CAPACITY", 256usize)?;
        if notification_queue_capacity == 0 {
            return Err(invalid("NOTIFICATION_QUEUE_CAPACITY", "must be positive"));
        }
        let notification_from = optional(vars, "NOTIFICATION_FROM", "loan@service.com");

        let log_json = vars
            .get("LOG_FORMAT")
            .is_some_and(|v| v.eq_ignore_ascii_case("json"));

        Ok(Config {
            database_url,
            grpc_bind_address,
            http_bind_address,
            db_max_connections,
            bcrypt_cost,
            jwt,
            jwks_url,
            jwks_cache_ttl,
            auth_excluded_methods,
            default_country_code,
            smtp,
            notification_queue_capacity,
            notification_from,
            log_json,
        })
    }
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn optional(vars: &HashMap<String, String>, name: &str, default: &str) -> String {
    vars.get(name)
        .filter(|v| !v.is_empty())
        .cloned()
        .unwrap_or_else(|| default.to_string())
}

fn parse_number<T>(vars: &HashMap<String, String>, name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match vars.get(name).filter(|v| !v.is_empty()) {
        Some(value) => value.trim().parse().map_err(|e| invalid(name, format!("{e}"))),
        None => Ok(default),
    }
}

fn parse_bool(vars: &HashMap<String, String>, name: &str, default: bool) -> Result<bool, ConfigError> {
    match vars.get(name).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if v.is_empty() => Ok(default),
        Some(v) => match v.as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(invalid(name, "expected true or false")),
        },
    }
}

fn parse_duration_var(
    vars: &HashMap<String, String>,
    name: &str,
    default: &str,
) -> Result<Duration, ConfigError> {
    let raw = optional(vars, name, default);
    parse_duration(&raw).map_err(|reason| invalid(name, reason))
}

/// Parse durations such as `15m`, `24h` or `1h30m`.
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err("empty duration".to_string());
    }

    let mut total = 0u64;
    let mut digits = String::new();
    for c in value.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }

        let unit = match c {
            's' => 1,
            'm' => 60,
            'h' => 3600,
            other => return Err(format!("unknown unit '{other}' in {value:?}")),
        };
        let amount: u64 = digits
            .parse()
            .map_err(|_| format!("missing number before '{c}' in {value:?}"))?;
        total = amount
            .checked_mul(unit)
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(|| format!("duration {value:?} overflows"))?;
        digits.clear();
    }

    if !digits.is_empty() {
        return Err(format!("missing unit in {value:?}"));
    }
    if total == 0 {
        return Err("duration must be positive".to_string());
    }

    Ok(Duration::from_secs(total))
}

fn parse_signing_keys(raw: &str) -> Result<Vec<SigningKeyConfig>, ConfigError> {
    let entries: Vec<RawSigningKey> =
        serde_json::from_str(raw).map_err(|e| ConfigError::InvalidSigningKeys(e.to_string()))?;

    if entries.is_empty() {
        return Err(ConfigError::InvalidSigningKeys(
            "at least one key is required".to_string(),
        ));
    }

    let mut keys = Vec::with_capacity(entries.len());
    for entry in entries {
        if entry.kid.is_empty() {
            return Err(ConfigError::InvalidSigningKeys("empty kid".to_string()));
        }
        if keys.iter().any(|k: &SigningKeyConfig| k.kid == entry.kid) {
            return Err(ConfigError::InvalidSigningKeys(format!(
                "duplicate kid {}",
                entry.kid
            )));
        }

        let private_key_pem = decode_pem(&entry.kid, "private_key", &entry.private_key)?;
        let public_key_pem = decode_pem(&entry.kid, "public_key", &entry.public_key)?;

        keys.push(SigningKeyConfig {
            kid: entry.kid,
            private_key_pem: SecretString::from(private_key_pem),
            public_key_pem,
        });
    }

    Ok(keys)
}

fn decode_pem(kid: &str, field: &str, encoded: &str) -> Result<String, ConfigError> {
    let bytes = general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| ConfigError::InvalidSigningKeys(format!("{kid}.{field}: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|_| ConfigError::InvalidSigningKeys(format!("{kid}.{field}: not UTF-8")))
}
