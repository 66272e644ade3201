use std::time::Duration;

use crate::{env_or_default, ConfigError, FromEnv};

/// A single named NATS connection, read from environment variables prefixed
/// with `NATS_` (the default connection) or `NATS_{NAME}_` for additional
/// connections registered by the composition root.
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    pub name: String,
    pub url: String,
    pub token: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl ConnectionConfig {
    /// Load the default connection from `NATS_URL` (falling back to the
    /// conventional local dev address) plus optional `NATS_TOKEN` /
    /// `NATS_USER` / `NATS_PASSWORD` credentials.
    pub fn default_from_env() -> Self {
        Self {
            name: "default".to_string(),
            url: env_or_default("NATS_URL", "nats://127.0.0.1:4222"),
            token: std::env::var("NATS_TOKEN").ok(),
            user: std::env::var("NATS_USER").ok(),
            password: std::env::var("NATS_PASSWORD").ok(),
        }
    }
}

/// JetStream consumer error policy (spec §6 `consumer.*`).
#[derive(Clone, Debug)]
pub struct ConsumerPolicyConfig {
    pub max_redeliveries: u32,
    pub nak_delay: Duration,
    pub enable_dlq: bool,
    pub dlq_stream_suffix: String,
}

impl Default for ConsumerPolicyConfig {
    fn default() -> Self {
        Self {
            max_redeliveries: 5,
            nak_delay: Duration::from_secs(5),
            enable_dlq: true,
            dlq_stream_suffix: "-dlq".to_string(),
        }
    }
}

impl FromEnv for ConsumerPolicyConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            max_redeliveries: parse_or_default(
                "CONSUMER_MAX_REDELIVERIES",
                defaults.max_redeliveries,
            )?,
            nak_delay: Duration::from_secs(parse_or_default(
                "CONSUMER_NAK_DELAY_SECS",
                defaults.nak_delay.as_secs(),
            )?),
            enable_dlq: parse_or_default("CONSUMER_ENABLE_DLQ", defaults.enable_dlq)?,
            dlq_stream_suffix: env_or_default("CONSUMER_DLQ_STREAM_SUFFIX", &defaults.dlq_stream_suffix),
        })
    }
}

/// Retry + circuit-breaker policy for the resilient publish client and the
/// outbox processor (spec §6 `resilience.*`).
#[derive(Clone, Debug)]
pub struct ResilienceConfig {
    pub max_retry_attempts: u32,
    pub base_delay: Duration,
    pub failure_ratio: f64,
    pub sampling_duration: Duration,
    pub break_duration: Duration,
    pub minimum_throughput: u32,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_retry_attempts: 3,
            base_delay: Duration::from_secs(1),
            failure_ratio: 0.5,
            sampling_duration: Duration::from_secs(30),
            break_duration: Duration::from_secs(30),
            minimum_throughput: 10,
        }
    }
}

impl FromEnv for ResilienceConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            max_retry_attempts: parse_or_default(
                "RESILIENCE_MAX_RETRY_ATTEMPTS",
                defaults.max_retry_attempts,
            )?,
            base_delay: Duration::from_secs(parse_or_default(
                "RESILIENCE_BASE_DELAY_SECS",
                defaults.base_delay.as_secs(),
            )?),
            failure_ratio: parse_or_default("RESILIENCE_FAILURE_RATIO", defaults.failure_ratio)?,
            sampling_duration: Duration::from_secs(parse_or_default(
                "RESILIENCE_SAMPLING_DURATION_SECS",
                defaults.sampling_duration.as_secs(),
            )?),
            break_duration: Duration::from_secs(parse_or_default(
                "RESILIENCE_BREAK_DURATION_SECS",
                defaults.break_duration.as_secs(),
            )?),
            minimum_throughput: parse_or_default(
                "RESILIENCE_MINIMUM_THROUGHPUT",
                defaults.minimum_throughput,
            )?,
        })
    }
}

/// Outbox processor tuning (spec §6 `outbox.*`).
#[derive(Clone, Debug)]
pub struct OutboxConfig {
    pub batch_size: u32,
    pub processing_interval: Duration,
    pub max_retries: u32,
    pub retention_period: Duration,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            processing_interval: Duration::from_secs(5),
            max_retries: 5,
            retention_period: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

impl FromEnv for OutboxConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            batch_size: parse_or_default("OUTBOX_BATCH_SIZE", defaults.batch_size)?,
            processing_interval: Duration::from_secs(parse_or_default(
                "OUTBOX_PROCESSING_INTERVAL_SECS",
                defaults.processing_interval.as_secs(),
            )?),
            max_retries: parse_or_default("OUTBOX_MAX_RETRIES", defaults.max_retries)?,
            retention_period: Duration::from_secs(parse_or_default(
                "OUTBOX_RETENTION_PERIOD_SECS",
                defaults.retention_period.as_secs(),
            )?),
        })
    }
}

/// KV cache bucket configuration (spec §6 `cache.*`).
#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub bucket_name: String,
    pub default_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            bucket_name: "cache".to_string(),
            default_ttl: Duration::from_secs(60 * 60),
        }
    }
}

impl FromEnv for CacheConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            bucket_name: env_or_default("CACHE_BUCKET_NAME", &defaults.bucket_name),
            default_ttl: Duration::from_secs(parse_or_default(
                "CACHE_DEFAULT_TTL_SECS",
                defaults.default_ttl.as_secs(),
            )?),
        })
    }
}

/// Object-store bucket configuration (spec §6 `blob.*`).
#[derive(Clone, Debug)]
pub struct BlobConfig {
    pub bucket_name: String,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            bucket_name: "blobs".to_string(),
        }
    }
}

impl FromEnv for BlobConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            bucket_name: env_or_default("BLOB_BUCKET_NAME", &defaults.bucket_name),
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|e| ConfigError::ParseError {
            key: key.to_string(),
            details: format!("{}", e),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_config_defaults_to_local_dev_url() {
        temp_env::with_var_unset("NATS_URL", || {
            let conn = ConnectionConfig::default_from_env();
            assert_eq!(conn.url, "nats://127.0.0.1:4222");
            assert_eq!(conn.name, "default");
        });
    }

    #[test]
    fn consumer_policy_defaults_match_spec() {
        temp_env::with_vars(
            [
                ("CONSUMER_MAX_REDELIVERIES", None::<&str>),
                ("CONSUMER_NAK_DELAY_SECS", None::<&str>),
                ("CONSUMER_ENABLE_DLQ", None::<&str>),
                ("CONSUMER_DLQ_STREAM_SUFFIX", None::<&str>),
            ],
            || {
                let policy = ConsumerPolicyConfig::from_env().unwrap();
                assert_eq!(policy.max_redeliveries, 5);
                assert_eq!(policy.nak_delay, Duration::from_secs(5));
                assert!(policy.enable_dlq);
                assert_eq!(policy.dlq_stream_suffix, "-dlq");
            },
        );
    }

    #[test]
    fn resilience_config_reads_overrides() {
        temp_env::with_var("RESILIENCE_MAX_RETRY_ATTEMPTS", Some("7"), || {
            let resilience = ResilienceConfig::from_env().unwrap();
            assert_eq!(resilience.max_retry_attempts, 7);
        });
    }

    #[test]
    fn outbox_config_invalid_value_is_parse_error() {
        temp_env::with_var("OUTBOX_BATCH_SIZE", Some("not-a-number"), || {
            let result = OutboxConfig::from_env();
            assert!(result.is_err());
        });
    }

    #[test]
    fn cache_config_defaults() {
        temp_env::with_vars(
            [
                ("CACHE_BUCKET_NAME", None::<&str>),
                ("CACHE_DEFAULT_TTL_SECS", None::<&str>),
            ],
            || {
                let cache = CacheConfig::from_env().unwrap();
                assert_eq!(cache.bucket_name, "cache");
                assert_eq!(cache.default_ttl, Duration::from_secs(3600));
            },
        );
    }
}
