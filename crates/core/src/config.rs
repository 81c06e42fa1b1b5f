use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::{
    api::RetryPolicy,
    environment::{Environment, EnvironmentError},
    paths::{get_config_path, get_root_state_dir},
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Environment(#[from] EnvironmentError),

    #[error("Invalid base URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Timer periods of the session.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingConfig {
    pub completion_poll: Duration,
    pub estimator_step: Duration,
    pub queue_poll: Duration,
    pub availability_poll: Duration,
    pub persist: Duration,
    pub view_refresh: Duration,
    /// Delay between a confirmed cancellation and the view reset
    pub cancel_reset_delay: Duration,
    /// Processing time after which a request is flagged `timeout`
    pub soft_timeout: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            completion_poll: Duration::from_secs(2),
            estimator_step: Duration::from_secs(3),
            queue_poll: Duration::from_secs(5),
            availability_poll: Duration::from_secs(60),
            persist: Duration::from_secs(30),
            view_refresh: Duration::from_secs(1),
            cancel_reset_delay: Duration::from_secs(2),
            soft_timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub environment: Environment,
    /// Host only; the API root is `host + "/api"`
    pub host: Url,
    pub state_dir: PathBuf,
    pub timing: TimingConfig,
    pub retry: RetryPolicy,
}

/// Values given on the command line, applied last.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub environment: Option<Environment>,
    pub base_url: Option<String>,
    pub state_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    environment: Option<String>,
    base_url: Option<String>,
    state_dir: Option<PathBuf>,
    #[serde(default)]
    timing: TimingFile,
    #[serde(default)]
    retry: RetryFile,
}

#[derive(Debug, Default, Deserialize)]
struct TimingFile {
    completion_poll_ms: Option<u64>,
    estimator_step_ms: Option<u64>,
    queue_poll_ms: Option<u64>,
    availability_poll_ms: Option<u64>,
    persist_ms: Option<u64>,
    soft_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RetryFile {
    max_retries: Option<u32>,
    base_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
    call_timeout_ms: Option<u64>,
}

impl ClientConfig {
    pub fn for_environment(environment: Environment) -> Self {
        let host = Url::parse(environment.config().host).expect("built-in host is a valid URL");
        Self {
            environment,
            host,
            state_dir: get_root_state_dir(),
            timing: TimingConfig::default(),
            retry: RetryPolicy::default(),
        }
    }

    /// Client configured against an explicit host, e.g. a test server.
    pub fn with_host(host: &str, state_dir: &Path) -> Result<Self, ConfigError> {
        let host = Url::parse(host)?;
        let environment = Environment::for_host(host.host_str().unwrap_or_default());
        Ok(Self {
            environment,
            host,
            state_dir: state_dir.to_path_buf(),
            timing: TimingConfig::default(),
            retry: RetryPolicy::default(),
        })
    }

    /// Defaults, then the config file, then environment variables, then overrides.
    pub fn load(overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        let file = read_config_file(&get_config_path())?;

        let mut environment = match &file.environment {
            Some(name) => name.parse()?,
            None => Environment::default(),
        };
        if std::env::var_os(environment.config().env_var).is_some() {
            environment = Environment::from_env()?;
        }
        if let Some(env) = overrides.environment {
            environment = env;
        }

        let mut config = Self::for_environment(environment);
        let base_url = overrides
            .base_url
            .or_else(|| std::env::var("SHORTREELS_BASE_URL").ok())
            .or(file.base_url);
        if let Some(base_url) = base_url {
            config.host = Url::parse(&base_url)?;
        }

        if let Some(dir) = overrides
            .state_dir
            .or_else(|| std::env::var_os("SHORTREELS_STATE_DIR").map(PathBuf::from))
            .or(file.state_dir)
        {
            config.state_dir = dir;
        }

        apply_timing(&mut config.timing, &file.timing);
        apply_retry(&mut config.retry, &file.retry);
        Ok(config)
    }

    /// API root with exactly one `/api` segment, without a trailing slash.
    pub fn api_base(&self) -> String {
        let host = self.host.as_str().trim_end_matches('/');
        if host.ends_with("/api") {
            host.to_string()
        } else {
            format!("{}/api", host)
        }
    }

    /// Resolve a backend-relative artifact URL (`/api/serve-video/..`) against the host.
    pub fn resolve(&self, url: &str) -> String {
        match self.host.join(url) {
            Ok(resolved) => resolved.to_string(),
            Err(_) => url.to_string(),
        }
    }

    /// Artifact URL with a cache-busting timestamp
    pub fn video_url(&self, request_id: &str, watermarked: bool) -> String {
        format!(
            "{}/serve-video/{}?watermarked={}&t={}",
            self.api_base(),
            request_id,
            watermarked,
            chrono::Utc::now().timestamp_millis()
        )
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    if !path.exists() {
        return Ok(ConfigFile::default());
    }
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn apply_timing(timing: &mut TimingConfig, file: &TimingFile) {
    let ms = Duration::from_millis;
    if let Some(v) = file.completion_poll_ms {
        timing.completion_poll = ms(v);
    }
    if let Some(v) = file.estimator_step_ms {
        timing.estimator_step = ms(v);
    }
    if let Some(v) = file.queue_poll_ms {
        timing.queue_poll = ms(v);
    }
    if let Some(v) = file.availability_poll_ms {
        timing.availability_poll = ms(v);
    }
    if let Some(v) = file.persist_ms {
        timing.persist = ms(v);
    }
    if let Some(v) = file.soft_timeout_secs {
        timing.soft_timeout = Duration::from_secs(v);
    }
}

fn apply_retry(retry: &mut RetryPolicy, file: &RetryFile) {
    if let Some(v) = file.max_retries {
        retry.max_retries = v;
    }
    if let Some(v) = file.base_delay_ms {
        retry.base_delay = Duration::from_millis(v);
    }
    if let Some(v) = file.max_delay_ms {
        retry.max_delay = Duration::from_millis(v);
    }
    if let Some(v) = file.call_timeout_ms {
        retry.call_timeout = Duration::from_millis(v);
    }
}
