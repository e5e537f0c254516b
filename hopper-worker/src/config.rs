//! Worker configuration
//!
//! Defines the queue location, polling cadence, retry budget and
//! maintenance intervals of a worker process.

use std::path::PathBuf;
use std::time::Duration;

use hopper_store::StoreConfig;

/// Worker configuration
///
/// Intervals are configurable so tests and local runs can spin faster than
/// a production worker driving a real browser.
#[derive(Debug, Clone)]
pub struct Config {
    /// Unique identifier for this worker instance
    pub worker_id: String,

    /// Directory holding the partition files and the lock
    pub queue_dir: PathBuf,

    /// How long to wait before polling again when the queue is empty
    pub poll_interval: Duration,

    /// Pause between two processed jobs
    pub cooldown: Duration,

    /// Pause after a store error (lock timeout, I/O)
    pub error_backoff: Duration,

    /// Retries granted to a failing job; it is attempted at most
    /// `max_retries + 1` times
    pub max_retries: u32,

    /// A processing job older than this is considered abandoned
    pub stale_threshold: Duration,

    /// How often the reaper scans for stale jobs
    pub reap_interval: Duration,

    /// Longest wait for the queue lock
    pub lock_timeout: Duration,

    /// Lifetime of a cached page
    pub cache_ttl: Duration,

    /// Maximum number of cached pages
    pub cache_capacity: usize,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(worker_id: String, queue_dir: PathBuf) -> Self {
        Self {
            worker_id,
            queue_dir,
            poll_interval: Duration::from_secs(15),
            cooldown: Duration::from_secs(5),
            error_backoff: Duration::from_secs(30),
            max_retries: 2,
            stale_threshold: Duration::from_secs(900),
            reap_interval: Duration::from_secs(60),
            lock_timeout: Duration::from_secs(10),
            cache_ttl: Duration::from_secs(600),
            cache_capacity: 256,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - HOPPER_QUEUE_DIR (default: queue_system)
    /// - HOPPER_WORKER_ID (default: random UUID)
    /// - POLL_INTERVAL (seconds, default: 15)
    /// - COOLDOWN_INTERVAL (seconds, default: 5)
    /// - ERROR_BACKOFF (seconds, default: 30)
    /// - MAX_RETRIES (default: 2)
    /// - STALE_THRESHOLD (seconds, default: 900)
    /// - REAP_INTERVAL (seconds, default: 60)
    /// - LOCK_TIMEOUT (seconds, default: 10)
    /// - CACHE_TTL (seconds, default: 600)
    /// - CACHE_CAPACITY (default: 256)
    ///
    /// A variable that is set but does not parse is an error; it never falls
    /// back to the default.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Creates configuration from any variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let vars = EnvVars { lookup };

        let worker_id = lookup_nonempty(&vars, "HOPPER_WORKER_ID").unwrap_or(defaults.worker_id);

        let queue_dir = lookup_nonempty(&vars, "HOPPER_QUEUE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.queue_dir);

        Ok(Self {
            worker_id,
            queue_dir,
            poll_interval: vars.secs("POLL_INTERVAL")?.unwrap_or(defaults.poll_interval),
            cooldown: vars.secs("COOLDOWN_INTERVAL")?.unwrap_or(defaults.cooldown),
            error_backoff: vars.secs("ERROR_BACKOFF")?.unwrap_or(defaults.error_backoff),
            max_retries: vars.parse("MAX_RETRIES")?.unwrap_or(defaults.max_retries),
            stale_threshold: vars.secs("STALE_THRESHOLD")?.unwrap_or(defaults.stale_threshold),
            reap_interval: vars.secs("REAP_INTERVAL")?.unwrap_or(defaults.reap_interval),
            lock_timeout: vars.secs("LOCK_TIMEOUT")?.unwrap_or(defaults.lock_timeout),
            cache_ttl: vars.secs("CACHE_TTL")?.unwrap_or(defaults.cache_ttl),
            cache_capacity: vars.parse("CACHE_CAPACITY")?.unwrap_or(defaults.cache_capacity),
        })
    }

    /// Store settings derived from this configuration
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::default().with_lock_timeout(self.lock_timeout)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.worker_id.is_empty() {
            anyhow::bail!("worker_id cannot be empty");
        }

        if self.queue_dir.as_os_str().is_empty() {
            anyhow::bail!("queue_dir cannot be empty");
        }

        if self.poll_interval.is_zero() {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.reap_interval.is_zero() {
            anyhow::bail!("reap_interval must be greater than 0");
        }

        if self.lock_timeout.is_zero() {
            anyhow::bail!("lock_timeout must be greater than 0");
        }

        if self.stale_threshold < self.reap_interval {
            anyhow::bail!("stale_threshold must be at least reap_interval");
        }

        if self.cache_ttl.is_zero() {
            anyhow::bail!("cache_ttl must be greater than 0");
        }

        if self.cache_capacity == 0 {
            anyhow::bail!("cache_capacity must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(
            uuid::Uuid::new_v4().to_string(),
            PathBuf::from("queue_system"),
        )
    }
}

struct EnvVars<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvVars<F> {
    fn parse<T: std::str::FromStr>(&self, name: &str) -> anyhow::Result<Option<T>> {
        match (self.lookup)(name) {
            Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
                anyhow::anyhow!("{} must be a non-negative integer, got '{}'", name, raw)
            }),
            None => Ok(None),
        }
    }

    fn secs(&self, name: &str) -> anyhow::Result<Option<Duration>> {
        Ok(self.parse::<u64>(name)?.map(Duration::from_secs))
    }
}

fn lookup_nonempty<F: Fn(&str) -> Option<String>>(vars: &EnvVars<F>, name: &str) -> Option<String> {
    (vars.lookup)(name).filter(|value| !value.trim().is_empty())
}
