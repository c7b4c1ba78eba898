//! Admin configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHELFDESK_BACKEND_URL` - Base URL of the hosted backend (auth + tables)
//! - `SHELFDESK_API_KEY` - Public API key sent with every backend request
//!
//! ## Optional
//! - `SHELFDESK_PRODUCTS_TABLE` - Table holding the catalog (default: products)
//! - `SHELFDESK_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 10)
//! - `SHELFDESK_DELETE_POLICY` - `keep-removed` (default) or `restore`
//! - `SHELFDESK_ADMIN_EMAIL` - Email of the admin account used by the CLI
//! - `SHELFDESK_ADMIN_PASSWORD` - Password of that account
//! - `ADMIN_LOG_JSON` - Set to `1` or `true` for JSON log lines
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Sentry error sample rate (default: 1.0)

use std::collections::HashMap;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::catalog::DeletePolicy;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_PRODUCTS_TABLE: &str = "products";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Admin application configuration.
///
/// Implements `Debug` manually to redact the API key and admin password.
#[derive(Clone)]
pub struct AdminConfig {
    /// Base URL of the hosted backend
    pub backend_url: Url,
    /// Public API key
    pub api_key: SecretString,
    /// Collection the product store reads and writes
    pub products_table: String,
    /// Timeout for a single backend request
    pub request_timeout: Duration,
    /// What happens to a product whose remote delete failed
    pub delete_policy: DeletePolicy,
    /// Admin account email for non-interactive sign-in
    pub admin_email: Option<String>,
    /// Admin account password for non-interactive sign-in
    pub admin_password: Option<SecretString>,
    /// Emit JSON log lines instead of text
    pub log_json: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
}

impl std::fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminConfig")
            .field("backend_url", &self.backend_url.as_str())
            .field("api_key", &"[REDACTED]")
            .field("products_table", &self.products_table)
            .field("request_timeout", &self.request_timeout)
            .field("delete_policy", &self.delete_policy)
            .field("admin_email", &self.admin_email)
            .field(
                "admin_password",
                &self.admin_password.as_ref().map(|_| "[REDACTED]"),
            )
            .field("log_json", &self.log_json)
            .field("sentry_dsn", &self.sentry_dsn)
            .field("sentry_environment", &self.sentry_environment)
            .field("sentry_sample_rate", &self.sentry_sample_rate)
            .finish()
    }
}

impl AdminConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Same as [`AdminConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend_url = get_required_env(&lookup, "SHELFDESK_BACKEND_URL")?;
        let backend_url = Url::parse(&backend_url).map_err(|e| {
            ConfigError::InvalidEnvVar("SHELFDESK_BACKEND_URL".to_string(), e.to_string())
        })?;
        if !matches!(backend_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEnvVar(
                "SHELFDESK_BACKEND_URL".to_string(),
                format!("unsupported scheme '{}'", backend_url.scheme()),
            ));
        }

        let api_key = get_validated_secret(&lookup, "SHELFDESK_API_KEY")?;

        let products_table =
            get_env_or_default(&lookup, "SHELFDESK_PRODUCTS_TABLE", DEFAULT_PRODUCTS_TABLE);
        if products_table.trim().is_empty() {
            return Err(ConfigError::InvalidEnvVar(
                "SHELFDESK_PRODUCTS_TABLE".to_string(),
                "must not be empty".to_string(),
            ));
        }

        let timeout_secs = match lookup("SHELFDESK_REQUEST_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|e| {
                ConfigError::InvalidEnvVar(
                    "SHELFDESK_REQUEST_TIMEOUT_SECS".to_string(),
                    e.to_string(),
                )
            })?,
            None => DEFAULT_REQUEST_TIMEOUT_SECS,
        };

        let delete_policy = match lookup("SHELFDESK_DELETE_POLICY") {
            Some(raw) => raw.parse::<DeletePolicy>().map_err(|e| {
                ConfigError::InvalidEnvVar("SHELFDESK_DELETE_POLICY".to_string(), e)
            })?,
            None => DeletePolicy::default(),
        };

        let admin_email = lookup("SHELFDESK_ADMIN_EMAIL")
            .map(|email| email.trim().to_string())
            .filter(|email| !email.is_empty());
        let admin_password = lookup("SHELFDESK_ADMIN_PASSWORD")
            .filter(|password| !password.is_empty())
            .map(SecretString::from);

        let log_json = lookup("ADMIN_LOG_JSON")
            .is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true"));

        let sentry_dsn = lookup("SENTRY_DSN").filter(|dsn| !dsn.trim().is_empty());
        let sentry_environment = lookup("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = lookup("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);

        Ok(Self {
            backend_url,
            api_key,
            products_table,
            request_timeout: Duration::from_secs(timeout_secs),
            delete_policy,
            admin_email,
            admin_password,
            log_json,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env<F>(lookup: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an environment variable with a default value.
fn get_env_or_default<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).unwrap_or_else(|| default.to_string())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // API keys are long random strings
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the key issued by the backend."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret.
fn get_validated_secret<F>(lookup: &F, key: &str) -> Result<SecretString, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = get_required_env(lookup, key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
