//! Crawl configuration: the recognized options loaded from a TOML file,
//! validated once at startup into an in-memory `Config`. A typestate
//! builder is also provided for programmatic construction, so a required
//! field like the seed URL can't be skipped at compile time.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::ConfigError;

/// Content hash algorithm selector. Only `sha256` is implemented; the enum
/// is kept open so a future algorithm can be added without breaking the
/// wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgo {
    Sha256,
}

impl Default for HashAlgo {
    fn default() -> Self {
        Self::Sha256
    }
}

impl std::fmt::Display for HashAlgo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HashAlgo::Sha256 => write!(f, "sha256"),
        }
    }
}

/// On-disk / wire representation of the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawConfig {
    pub seed_urls: Vec<String>,
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    pub max_pages: Option<usize>,
    #[serde(default)]
    pub allowed_path_prefix: Vec<String>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    pub timeout_secs: Option<u64>,
    pub output_dir: PathBuf,
    #[serde(default)]
    pub hash_algo: HashAlgo,
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: f64,
    #[serde(default)]
    pub jitter_secs: f64,
    pub random_seed: Option<u64>,
}

fn default_max_depth() -> u32 {
    3
}
fn default_user_agent() -> String {
    "docscrawl/0.1".to_string()
}
fn default_base_delay_secs() -> f64 {
    1.0
}

/// Validated, in-memory configuration. Always holds exactly one seed URL;
/// if the config file lists more than one, only the first is honored.
#[derive(Debug, Clone)]
pub struct Config {
    pub seed_url: Url,
    pub max_depth: u32,
    pub max_pages: Option<usize>,
    pub allowed_path_prefixes: Vec<String>,
    pub user_agent: String,
    pub timeout: Option<Duration>,
    pub output_dir: PathBuf,
    pub hash_algo: HashAlgo,
    pub base_delay: Duration,
    pub jitter: Duration,
    pub random_seed: Option<u64>,
}

impl Config {
    /// Load and validate a config file. Any failure here is a fatal
    /// `ConfigError` raised before the crawl loop ever starts.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let raw: RawConfig = toml::from_str(&text)?;
        Self::from_raw(raw)
    }

    pub fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let first = raw
            .seed_urls
            .first()
            .ok_or_else(|| ConfigError::Invalid("seedUrls must contain at least one URL".into()))?;
        let seed_url = Url::parse(first)
            .map_err(|e| ConfigError::Invalid(format!("invalid seed URL {first}: {e}")))?;
        if seed_url.host_str().is_none() {
            return Err(ConfigError::Invalid(format!("seed URL {first} has no host")));
        }

        Ok(Self {
            seed_url,
            max_depth: raw.max_depth,
            max_pages: raw.max_pages,
            allowed_path_prefixes: raw.allowed_path_prefix,
            user_agent: raw.user_agent,
            timeout: raw.timeout_secs.map(Duration::from_secs),
            output_dir: raw.output_dir,
            hash_algo: raw.hash_algo,
            base_delay: Duration::from_secs_f64(raw.base_delay_secs.max(0.0)),
            jitter: Duration::from_secs_f64(raw.jitter_secs.max(0.0)),
            random_seed: raw.random_seed,
        })
    }
}

// ---------------------------------------------------------------------
// Typestate builder for programmatic construction (tests, embedding).
// ---------------------------------------------------------------------

pub struct Missing;
pub struct Ready;

pub struct ConfigBuilder<State = Missing> {
    seed_url: Option<Url>,
    output_dir: Option<PathBuf>,
    max_depth: u32,
    max_pages: Option<usize>,
    allowed_path_prefixes: Vec<String>,
    user_agent: String,
    timeout: Option<Duration>,
    hash_algo: HashAlgo,
    base_delay: Duration,
    jitter: Duration,
    random_seed: Option<u64>,
    _state: PhantomData<State>,
}

impl Default for ConfigBuilder<Missing> {
    fn default() -> Self {
        Self {
            seed_url: None,
            output_dir: None,
            max_depth: default_max_depth(),
            max_pages: None,
            allowed_path_prefixes: Vec::new(),
            user_agent: default_user_agent(),
            timeout: None,
            hash_algo: HashAlgo::default(),
            base_delay: Duration::from_secs_f64(default_base_delay_secs()),
            jitter: Duration::ZERO,
            random_seed: None,
            _state: PhantomData,
        }
    }
}

impl ConfigBuilder<Missing> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn seed_url(self, url: Url) -> ConfigBuilder<Ready> {
        ConfigBuilder {
            seed_url: Some(url),
            output_dir: self.output_dir,
            max_depth: self.max_depth,
            max_pages: self.max_pages,
            allowed_path_prefixes: self.allowed_path_prefixes,
            user_agent: self.user_agent,
            timeout: self.timeout,
            hash_algo: self.hash_algo,
            base_delay: self.base_delay,
            jitter: self.jitter,
            random_seed: self.random_seed,
            _state: PhantomData,
        }
    }
}

impl<State> ConfigBuilder<State> {
    #[must_use]
    pub fn max_depth(mut self, depth: u32) -> Self {
        self.max_depth = depth;
        self
    }

    #[must_use]
    pub fn max_pages(mut self, pages: usize) -> Self {
        self.max_pages = Some(pages);
        self
    }

    #[must_use]
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = ua.into();
        self
    }

    #[must_use]
    pub fn base_delay(mut self, d: Duration) -> Self {
        self.base_delay = d;
        self
    }

    #[must_use]
    pub fn jitter(mut self, d: Duration) -> Self {
        self.jitter = d;
        self
    }

    #[must_use]
    pub fn random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    #[must_use]
    pub fn allowed_path_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.allowed_path_prefixes = prefixes;
        self
    }
}

impl ConfigBuilder<Ready> {
    pub fn build(self) -> Result<Config, ConfigError> {
        let seed_url = self.seed_url.expect("Ready state guarantees seed_url is set");
        Ok(Config {
            seed_url,
            max_depth: self.max_depth,
            max_pages: self.max_pages,
            allowed_path_prefixes: self.allowed_path_prefixes,
            user_agent: self.user_agent,
            timeout: self.timeout,
            output_dir: self.output_dir.unwrap_or_else(|| PathBuf::from("./out")),
            hash_algo: self.hash_algo,
            base_delay: self.base_delay,
            jitter: self.jitter,
            random_seed: self.random_seed,
        })
    }
}
