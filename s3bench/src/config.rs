//! Configuration for the benchmark.
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to
//! lowest):
//!
//! 1. Environment variables (prefixed with `S3BENCH__`)
//! 2. YAML configuration file (specified via `-c` or `--config` flag)
//! 3. Defaults
//!
//! Environment variables use double underscores (`__`) to denote nested configuration
//! structures. For example:
//!
//! - `S3BENCH__TARGET__BUCKET=my-bucket` sets the bucket to benchmark against
//! - `S3BENCH__STORAGE__ENDPOINT=http://localhost:9000` points the client at MinIO
//! - `S3BENCH__SWEEP__PRESET=read-fanout` selects a named sweep
//!
//! The same configuration in YAML:
//!
//! ```yaml
//! target:
//!   bucket: my-bucket
//! storage:
//!   type: s3compatible
//!   endpoint: http://localhost:9000
//! sweep:
//!   preset: read-fanout
//! ```

use std::fmt;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use bytesize::ByteSize;
use figment::providers::{Env, Format, Serialized, Yaml};
use s3bench_core::{FailurePolicy, Mode, ObjectTarget, PayloadSizing, Preset, SweepPlan};
use secrecy::{CloneableSecret, SecretBox, SerializableSecret, zeroize::Zeroize};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "S3BENCH__";

/// Newtype around `String` that protects against accidental logging of secrets in the
/// configuration. Use with [`secrecy::SecretBox`].
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfigSecret(String);

impl ConfigSecret {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for ConfigSecret {
    fn from(str: &str) -> Self {
        ConfigSecret(str.to_string())
    }
}

impl fmt::Debug for ConfigSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "[redacted]")
    }
}

impl CloneableSecret for ConfigSecret {}
impl SerializableSecret for ConfigSecret {}
impl Zeroize for ConfigSecret {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

/// The object all batches read and write.
#[derive(Debug, Deserialize, Serialize)]
pub struct Target {
    /// Bucket holding the object. The bucket must exist before the run.
    ///
    /// Defaults to `latency-throughput-test`.
    pub bucket: String,
    /// Key of the object. Write batches overwrite it repeatedly.
    ///
    /// Defaults to `test-file.txt`.
    pub key: String,
}

impl Target {
    pub fn object(&self) -> ObjectTarget {
        ObjectTarget::new(&self.bucket, &self.key)
    }
}

impl Default for Target {
    fn default() -> Self {
        Self {
            bucket: "latency-throughput-test".to_owned(),
            key: "test-file.txt".to_owned(),
        }
    }
}

/// Storage client configuration.
///
/// The `type` field in YAML or `__TYPE` in environment variables determines which variant is used.
#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Storage {
    /// S3-compatible storage (type `"s3compatible"`).
    ///
    /// Without `access_key` and `secret_key`, credentials are resolved from the environment
    /// (`AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`), the shared profile, or instance metadata.
    S3Compatible {
        /// Region of the bucket, e.g. `us-west-2`.
        region: String,
        /// Custom endpoint URL, e.g. `http://localhost:9000` for MinIO.
        #[serde(default)]
        endpoint: Option<String>,
        /// Address the bucket in the path instead of the host name.
        #[serde(default)]
        path_style: bool,
        /// Timeout applied by the client to every request. The benchmark sets none by itself.
        #[serde(default, with = "humantime_serde")]
        request_timeout: Option<Duration>,
        #[serde(default)]
        access_key: Option<SecretBox<ConfigSecret>>,
        #[serde(default)]
        secret_key: Option<SecretBox<ConfigSecret>>,
    },

    /// In-process storage for dry runs (type `"memory"`).
    ///
    /// Nothing leaves the process, so timings only reflect the benchmark's own overhead.
    Memory {
        /// Stores an object of this size at the target before the sweep, so read-only sweeps can
        /// run.
        #[serde(default)]
        preload: Option<ByteSize>,
    },
}

impl Default for Storage {
    fn default() -> Self {
        Storage::S3Compatible {
            region: "us-west-2".to_owned(),
            endpoint: None,
            path_style: false,
            request_timeout: None,
            access_key: None,
            secret_key: None,
        }
    }
}

/// The sweep to run, selected by the `preset` field.
#[derive(Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(tag = "preset", rename_all = "kebab-case")]
pub enum Sweep {
    /// Workers 1 to 128, sizes 1 KiB to 1 GiB split across the workers, 10 repetitions, writes
    /// and reads.
    #[default]
    ReadWriteScaling,
    /// 1000 workers reading a 1 MB object, 3 repetitions.
    ReadFanout,
    /// One worker writing and reading 1 KiB and 1 MiB objects, 10 repetitions.
    Sequential,
    /// A fully configured sweep.
    Custom {
        workers: Vec<usize>,
        sizes: Vec<ByteSize>,
        repetitions: usize,
        sizing: PayloadSizing,
        mode: Mode,
    },
}

impl Sweep {
    pub fn plan(&self) -> SweepPlan {
        match self {
            Sweep::ReadWriteScaling => Preset::ReadWriteScaling.plan(),
            Sweep::ReadFanout => Preset::ReadFanout.plan(),
            Sweep::Sequential => Preset::Sequential.plan(),
            Sweep::Custom {
                workers,
                sizes,
                repetitions,
                sizing,
                mode,
            } => SweepPlan {
                workers: workers.clone(),
                sizes: sizes.iter().map(ByteSize::as_u64).collect(),
                repetitions: *repetitions,
                sizing: *sizing,
                mode: *mode,
            },
        }
    }
}

/// One-shot diagnostics performed before the sweep. Failures are logged and never abort the run.
#[derive(Debug, Deserialize, Serialize)]
pub struct Diagnostics {
    /// CPU bitmask to pin the process to, e.g. `4` for CPU 2 only.
    ///
    /// The current affinity is always logged. Defaults to `None` (keep the inherited affinity).
    pub cpu_affinity: Option<u64>,

    /// Resolve the S3 credentials at startup and log the access key id.
    ///
    /// Defaults to `true`.
    pub credentials: bool,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            cpu_affinity: None,
            credentials: true,
        }
    }
}

/// Runtime configuration for the tokio runtime driving the requests.
#[derive(Debug, Deserialize, Serialize)]
pub struct Runtime {
    /// Number of worker threads. Defaults to the number of CPU cores.
    ///
    /// # Environment Variable
    ///
    /// `S3BENCH__RUNTIME__WORKER_THREADS`
    pub worker_threads: usize,
}

impl Default for Runtime {
    fn default() -> Self {
        Self {
            worker_threads: num_cpus::get(),
        }
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// [`LogFormat::Pretty`] for a TTY, otherwise [`LogFormat::Simplified`].
    Auto,

    /// Compact output with colors.
    Pretty,

    /// Plain text output.
    Simplified,

    /// JSON lines.
    Json,
}

mod display_fromstr {
    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: std::fmt::Display,
    {
        serializer.collect_str(&value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: std::str::FromStr,
        <T as std::str::FromStr>::Err: std::fmt::Display,
    {
        use serde::Deserialize;
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Logging configuration. Logs are always written to stderr; batch lines go to stdout.
#[derive(Debug, Deserialize, Serialize)]
pub struct Logging {
    /// Minimum log level. `RUST_LOG` takes precedence when set.
    ///
    /// Defaults to `INFO`.
    #[serde(with = "display_fromstr")]
    pub level: LevelFilter,

    /// Defaults to `auto`.
    pub format: LogFormat,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
        }
    }
}

/// [Sentry](https://sentry.io/) error reporting. Disabled unless a DSN is configured.
#[derive(Debug, Deserialize, Serialize)]
pub struct Sentry {
    pub dsn: Option<SecretBox<ConfigSecret>>,
    pub environment: Option<String>,
    /// Sample rate for error events. Defaults to `1.0`.
    pub sample_rate: f32,
}

impl Sentry {
    pub fn is_enabled(&self) -> bool {
        self.dsn.is_some()
    }
}

impl Default for Sentry {
    fn default() -> Self {
        Self {
            dsn: None,
            environment: None,
            sample_rate: 1.0,
        }
    }
}

/// Main configuration struct.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    pub target: Target,
    pub storage: Storage,
    pub sweep: Sweep,
    /// What to do when a batch fails. Defaults to `abort`.
    pub on_failure: FailurePolicy,
    pub diagnostics: Diagnostics,
    pub runtime: Runtime,
    pub logging: Logging,
    pub sentry: Sentry,
}

impl Config {
    /// Loads configuration from defaults, the optional YAML file, and the environment, with later
    /// sources overriding earlier ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML file cannot be read or parsed, or if any value is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn defaults_match_read_write_scaling() {
        figment::Jail::expect_with(|_jail| {
            let config = Config::load(None).unwrap();

            assert_eq!(config.target.object().to_string(), "latency-throughput-test/test-file.txt");
            assert_eq!(config.sweep, Sweep::ReadWriteScaling);
            assert_eq!(config.on_failure, FailurePolicy::Abort);
            assert!(config.diagnostics.credentials);

            let Storage::S3Compatible { region, .. } = &config.storage else {
                panic!("expected s3 storage");
            };
            assert_eq!(region, "us-west-2");

            Ok(())
        });
    }

    #[test]
    fn configurable_via_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("S3BENCH__TARGET__BUCKET", "whatever");
            jail.set_env("S3BENCH__STORAGE__TYPE", "s3compatible");
            jail.set_env("S3BENCH__STORAGE__REGION", "eu-central-1");
            jail.set_env("S3BENCH__STORAGE__ENDPOINT", "http://localhost:9000");
            jail.set_env("S3BENCH__STORAGE__REQUEST_TIMEOUT", "30s");
            jail.set_env("S3BENCH__STORAGE__SECRET_KEY", "abcde");
            jail.set_env("S3BENCH__SWEEP__PRESET", "read-fanout");
            jail.set_env("S3BENCH__ON_FAILURE", "skip");
            jail.set_env("S3BENCH__DIAGNOSTICS__CPU_AFFINITY", "4");

            let config = Config::load(None).unwrap();

            assert_eq!(config.target.bucket, "whatever");
            assert_eq!(config.sweep, Sweep::ReadFanout);
            assert_eq!(config.on_failure, FailurePolicy::Skip);
            assert_eq!(config.diagnostics.cpu_affinity, Some(4));

            let Storage::S3Compatible {
                region,
                endpoint,
                request_timeout,
                secret_key,
                ..
            } = &config.storage
            else {
                panic!("expected s3 storage");
            };
            assert_eq!(region, "eu-central-1");
            assert_eq!(endpoint.as_deref(), Some("http://localhost:9000"));
            assert_eq!(*request_timeout, Some(Duration::from_secs(30)));
            assert_eq!(
                secret_key.as_ref().unwrap().expose_secret().as_str(),
                "abcde"
            );

            Ok(())
        });
    }

    #[test]
    fn configurable_via_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
            storage:
                type: memory
                preload: 1MB
            sweep:
                preset: custom
                workers: [1, 4, 16]
                sizes: [1KiB, 2MiB]
                repetitions: 5
                sizing: divided
                mode: read-write
            logging:
                level: debug
                format: json
            "#,
            )
            .unwrap();

        figment::Jail::expect_with(|_jail| {
            let config = Config::load(Some(tempfile.path())).unwrap();

            let Storage::Memory { preload } = &dbg!(&config).storage else {
                panic!("expected memory storage");
            };
            assert_eq!(*preload, Some(ByteSize::mb(1)));

            let plan = config.sweep.plan();
            assert_eq!(plan.workers, [1, 4, 16]);
            assert_eq!(plan.sizes, [1024, 2 * 1024 * 1024]);
            assert_eq!(plan.repetitions, 5);
            assert_eq!(plan.sizing, PayloadSizing::Divided);
            assert_eq!(plan.mode, Mode::ReadWrite);

            assert_eq!(config.logging.level, LevelFilter::DEBUG);
            assert_eq!(config.logging.format, LogFormat::Json);

            Ok(())
        });
    }

    #[test]
    fn configured_with_env_and_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
            target:
                bucket: from-yaml
                key: object.bin
            sweep:
                preset: sequential
            "#,
            )
            .unwrap();

        figment::Jail::expect_with(|jail| {
            jail.set_env("S3BENCH__TARGET__BUCKET", "from-env");

            let config = Config::load(Some(tempfile.path())).unwrap();

            // Env should overwrite the yaml config
            assert_eq!(config.target.bucket, "from-env");
            assert_eq!(config.target.key, "object.bin");
            assert_eq!(config.sweep, Sweep::Sequential);

            Ok(())
        });
    }

    #[test]
    fn secrets_are_redacted() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("S3BENCH__STORAGE__ACCESS_KEY", "AKIAEXAMPLE");
            jail.set_env("S3BENCH__SENTRY__DSN", "https://key@sentry.example/1");

            let config = Config::load(None).unwrap();
            let debug = format!("{config:?}");

            assert!(config.sentry.is_enabled());
            assert!(!debug.contains("AKIAEXAMPLE"));
            assert!(!debug.contains("key@sentry"));

            Ok(())
        });
    }
}
