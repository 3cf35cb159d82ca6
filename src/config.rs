use crate::errors::GatewayError;
use anyhow::{Context, Result};
use clap::Parser;
use std::{env, fmt, time::Duration};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub storage: StorageConfig,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Pre-signed header broker for S3-compatible storage")]
pub struct Args {
    /// Host to bind to (overrides DOCUMENT_GATEWAY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides DOCUMENT_GATEWAY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides DOCUMENT_GATEWAY_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

/// Settings for the S3-compatible backend.
///
/// Access key id, secret key, host and bucket are mandatory, but their
/// absence is only reported when an operation needs them (see
/// [`StorageConfig::credentials`]).
#[derive(Clone)]
pub struct StorageConfig {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub host: Option<String>,
    pub bucket: Option<String>,
    pub region: String,
    pub service: String,
    /// Replaces `https://{host}` as the URI base (MinIO, LocalStack, ...).
    pub endpoint_url: Option<String>,
    pub timeout: Duration,
    pub max_attempts: u32,
}

/// Credential context handed to the signer.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub service: String,
}

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_SERVICE: &str = "s3";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("DOCUMENT_GATEWAY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_env("DOCUMENT_GATEWAY_PORT", 3000u16)?;
        let env_db = env::var("DOCUMENT_GATEWAY_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/document_gateway.db".into());

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            storage: StorageConfig::from_env()?,
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl StorageConfig {
    /// Read the `S3_*` environment variables. Blank values count as unset.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            access_key_id: non_blank_env("S3_ACCESS_KEY_ID"),
            secret_access_key: non_blank_env("S3_SECRET_ACCESS_KEY"),
            host: non_blank_env("S3_HOST"),
            bucket: non_blank_env("S3_BUCKET"),
            region: non_blank_env("S3_REGION").unwrap_or_else(|| DEFAULT_REGION.into()),
            service: non_blank_env("S3_SERVICE").unwrap_or_else(|| DEFAULT_SERVICE.into()),
            endpoint_url: non_blank_env("S3_ENDPOINT_URL"),
            timeout: Duration::from_secs(parse_env("S3_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?),
            max_attempts: parse_env("S3_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?,
        })
    }

    /// Check the mandatory settings and build the signing context.
    ///
    /// Fails on the first missing value, in the order access key id,
    /// secret key, host, bucket.
    pub fn credentials(&self) -> Result<Credentials, GatewayError> {
        let access_key_id = required(&self.access_key_id, "S3 access key id")?;
        let secret_access_key = required(&self.secret_access_key, "S3 secret access key")?;
        required(&self.host, "S3 host")?;
        required(&self.bucket, "S3 bucket")?;

        Ok(Credentials {
            access_key_id: access_key_id.to_string(),
            secret_access_key: secret_access_key.to_string(),
            region: self.region.clone(),
            service: self.service.clone(),
        })
    }

    /// Base of every composed object URI, without a trailing slash.
    pub fn base_url(&self) -> Option<String> {
        if let Some(endpoint) = self.endpoint_url.as_deref() {
            return Some(endpoint.trim_end_matches('/').to_string());
        }
        self.host
            .as_deref()
            .filter(|h| !h.is_empty())
            .map(|h| format!("https://{}", h))
    }
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field("host", &self.host)
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("service", &self.service)
            .field("endpoint_url", &self.endpoint_url)
            .field("timeout", &self.timeout)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("region", &self.region)
            .field("service", &self.service)
            .finish()
    }
}

fn required<'a>(value: &'a Option<String>, what: &str) -> Result<&'a str, GatewayError> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| GatewayError::Config(format!("missing {}", what)))
}

fn non_blank_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> StorageConfig {
        StorageConfig {
            access_key_id: Some("AKID".into()),
            secret_access_key: Some("secret".into()),
            host: Some("store.example.com".into()),
            bucket: Some("docs".into()),
            region: DEFAULT_REGION.into(),
            service: DEFAULT_SERVICE.into(),
            endpoint_url: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    #[test]
    fn credentials_built_from_complete_config() {
        let creds = complete().credentials().unwrap();
        assert_eq!(creds.access_key_id, "AKID");
        assert_eq!(creds.secret_access_key, "secret");
        assert_eq!(creds.region, "us-east-1");
        assert_eq!(creds.service, "s3");
    }

    #[test]
    fn each_mandatory_setting_is_reported() {
        let cases: [(fn(&mut StorageConfig), &str); 4] = [
            (|c| c.access_key_id = None, "missing S3 access key id"),
            (|c| c.secret_access_key = None, "missing S3 secret access key"),
            (|c| c.host = None, "missing S3 host"),
            (|c| c.bucket = Some("  ".into()), "missing S3 bucket"),
        ];
        for (clear, expected) in cases {
            let mut cfg = complete();
            clear(&mut cfg);
            match cfg.credentials() {
                Err(GatewayError::Config(msg)) => assert_eq!(msg, expected),
                other => panic!("expected config error, got {:?}", other),
            }
        }
    }

    #[test]
    fn first_missing_setting_wins() {
        let cfg = StorageConfig {
            bucket: None,
            secret_access_key: None,
            ..complete()
        };
        let err = cfg.credentials().unwrap_err();
        assert_eq!(err.to_string(), "configuration error: missing S3 secret access key");
    }

    #[test]
    fn endpoint_url_overrides_host_base() {
        let mut cfg = complete();
        assert_eq!(cfg.base_url().as_deref(), Some("https://store.example.com"));

        cfg.endpoint_url = Some("http://localhost:9000/".into());
        assert_eq!(cfg.base_url().as_deref(), Some("http://localhost:9000"));

        cfg.endpoint_url = None;
        cfg.host = None;
        assert_eq!(cfg.base_url(), None);
    }

    #[test]
    fn debug_output_redacts_secret() {
        let rendered = format!("{:?}", complete());
        assert!(!rendered.contains("\"secret\""));
        assert!(rendered.contains("<redacted>"));

        let creds = format!("{:?}", complete().credentials().unwrap());
        assert!(!creds.contains("\"secret\""));
    }
}
