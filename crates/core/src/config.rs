use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff: RetryBackoff,
}

#[derive(Clone, Debug)]
pub struct SearchConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub timeout_secs: u64,
    /// Extra attempts after a retryable provider failure. Zero surfaces the first failure.
    pub max_retries: u32,
    pub backoff: RetryBackoff,
    pub currency: String,
    pub language: String,
    pub country: String,
    pub max_results: usize,
}

/// Exponential delay between retry attempts, capped at `max_delay_ms`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryBackoff {
    pub initial_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
}

impl RetryBackoff {
    /// Retries fire immediately.
    pub const NONE: Self = Self { initial_delay_ms: 0, multiplier: 1.0, max_delay_ms: 0 };

    /// Delay before retry number `attempt`, counting from 1.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let millis = self.initial_delay_ms as f64 * self.multiplier.powi(exponent);
        Duration::from_millis(millis.min(self.max_delay_ms as f64) as u64)
    }
}

impl Default for RetryBackoff {
    fn default() -> Self {
        Self { initial_delay_ms: 500, multiplier: 2.0, max_delay_ms: 8_000 }
    }
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    /// Deterministic keyword reasoning; no network.
    Heuristic,
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
    Ollama,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Heuristic => "heuristic",
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Ollama => "ollama",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub search_api_key: Option<String>,
    pub search_max_retries: Option<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://tripdesk.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                provider: LlmProvider::Heuristic,
                api_key: None,
                base_url: None,
                model: "gpt-4o-mini".to_string(),
                timeout_secs: 30,
                max_retries: 2,
                backoff: RetryBackoff::default(),
            },
            search: SearchConfig {
                api_key: None,
                base_url: "https://serpapi.com/search".to_string(),
                timeout_secs: 30,
                max_retries: 0,
                backoff: RetryBackoff::default(),
                currency: "USD".to_string(),
                language: "en".to_string(),
                country: "us".to_string(),
                max_results: 5,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "heuristic" => Ok(Self::Heuristic),
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected heuristic|openai|anthropic|ollama)"
            ))),
        }
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("tripdesk.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(SecretString::from(api_key));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
            llm.backoff.apply_to(&mut self.llm.backoff);
        }

        if let Some(search) = patch.search {
            if let Some(api_key) = search.api_key {
                self.search.api_key = Some(SecretString::from(api_key));
            }
            if let Some(base_url) = search.base_url {
                self.search.base_url = base_url;
            }
            if let Some(timeout_secs) = search.timeout_secs {
                self.search.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = search.max_retries {
                self.search.max_retries = max_retries;
            }
            search.backoff.apply_to(&mut self.search.backoff);
            if let Some(currency) = search.currency {
                self.search.currency = currency;
            }
            if let Some(language) = search.language {
                self.search.language = language;
            }
            if let Some(country) = search.country {
                self.search.country = country;
            }
            if let Some(max_results) = search.max_results {
                self.search.max_results = max_results;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("TRIPDESK_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("TRIPDESK_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_env("TRIPDESK_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("TRIPDESK_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_env("TRIPDESK_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("TRIPDESK_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("TRIPDESK_LLM_API_KEY") {
            self.llm.api_key = Some(SecretString::from(value));
        }
        if let Some(value) = read_env("TRIPDESK_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("TRIPDESK_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("TRIPDESK_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_env("TRIPDESK_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("TRIPDESK_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_env("TRIPDESK_LLM_MAX_RETRIES", &value)?;
        }
        env_backoff("TRIPDESK_LLM", &mut self.llm.backoff)?;

        let search_key =
            read_env("TRIPDESK_SEARCH_API_KEY").or_else(|| read_env("SERPAPI_API_KEY"));
        if let Some(value) = search_key {
            self.search.api_key = Some(SecretString::from(value));
        }
        if let Some(value) = read_env("TRIPDESK_SEARCH_BASE_URL") {
            self.search.base_url = value;
        }
        if let Some(value) = read_env("TRIPDESK_SEARCH_TIMEOUT_SECS") {
            self.search.timeout_secs = parse_env("TRIPDESK_SEARCH_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("TRIPDESK_SEARCH_MAX_RETRIES") {
            self.search.max_retries = parse_env("TRIPDESK_SEARCH_MAX_RETRIES", &value)?;
        }
        env_backoff("TRIPDESK_SEARCH", &mut self.search.backoff)?;
        if let Some(value) = read_env("TRIPDESK_SEARCH_CURRENCY") {
            self.search.currency = value;
        }
        if let Some(value) = read_env("TRIPDESK_SEARCH_LANGUAGE") {
            self.search.language = value;
        }
        if let Some(value) = read_env("TRIPDESK_SEARCH_COUNTRY") {
            self.search.country = value;
        }
        if let Some(value) = read_env("TRIPDESK_SEARCH_MAX_RESULTS") {
            self.search.max_results = parse_env("TRIPDESK_SEARCH_MAX_RESULTS", &value)?;
        }

        let log_level =
            read_env("TRIPDESK_LOGGING_LEVEL").or_else(|| read_env("TRIPDESK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("TRIPDESK_LOGGING_FORMAT").or_else(|| read_env("TRIPDESK_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(search_api_key) = overrides.search_api_key {
            self.search.api_key = Some(SecretString::from(search_api_key));
        }
        if let Some(max_retries) = overrides.search_max_retries {
            self.search.max_retries = max_retries;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_llm(&self.llm)?;
        validate_search(&self.search)?;
        validate_logging(&self.logging)?;
        Ok(())
    }

    pub fn has_search_credentials(&self) -> bool {
        self.search
            .api_key
            .as_ref()
            .map(|key| !key.expose_secret().trim().is_empty())
            .unwrap_or(false)
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("tripdesk.toml"), PathBuf::from("config/tripdesk.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    validate_backoff("llm", &llm.backoff)?;

    match llm.provider {
        LlmProvider::Heuristic => {}
        LlmProvider::OpenAi | LlmProvider::Anthropic => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for openai/anthropic providers".to_string(),
                ));
            }
        }
        LlmProvider::Ollama => {
            let missing =
                llm.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.base_url is required for ollama provider (e.g. http://localhost:11434)"
                        .to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn validate_search(search: &SearchConfig) -> Result<(), ConfigError> {
    if !search.base_url.starts_with("http://") && !search.base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "search.base_url must start with http:// or https://".to_string(),
        ));
    }

    if search.timeout_secs == 0 || search.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "search.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if search.max_retries > 5 {
        return Err(ConfigError::Validation("search.max_retries must be at most 5".to_string()));
    }
    validate_backoff("search", &search.backoff)?;

    if search.max_results == 0 || search.max_results > 20 {
        return Err(ConfigError::Validation(
            "search.max_results must be in range 1..=20".to_string(),
        ));
    }

    let currency = search.currency.trim();
    if currency.len() != 3 || !currency.chars().all(|ch| ch.is_ascii_alphabetic()) {
        return Err(ConfigError::Validation(format!(
            "search.currency must be a 3-letter ISO code, got `{currency}`"
        )));
    }

    Ok(())
}

fn validate_backoff(section: &str, backoff: &RetryBackoff) -> Result<(), ConfigError> {
    if !backoff.multiplier.is_finite() || backoff.multiplier < 1.0 {
        return Err(ConfigError::Validation(format!(
            "{section}.retry_backoff_multiplier must be a number of at least 1.0"
        )));
    }
    if backoff.initial_delay_ms > 60_000 || backoff.max_delay_ms > 60_000 {
        return Err(ConfigError::Validation(format!(
            "{section} retry delays must be at most 60000 ms"
        )));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// `{prefix}_RETRY_INITIAL_DELAY_MS`, `{prefix}_RETRY_BACKOFF_MULTIPLIER`, `{prefix}_RETRY_MAX_DELAY_MS`.
fn env_backoff(prefix: &str, backoff: &mut RetryBackoff) -> Result<(), ConfigError> {
    let key = format!("{prefix}_RETRY_INITIAL_DELAY_MS");
    if let Some(value) = read_env(&key) {
        backoff.initial_delay_ms = parse_env(&key, &value)?;
    }
    let key = format!("{prefix}_RETRY_BACKOFF_MULTIPLIER");
    if let Some(value) = read_env(&key) {
        backoff.multiplier = parse_env(&key, &value)?;
    }
    let key = format!("{prefix}_RETRY_MAX_DELAY_MS");
    if let Some(value) = read_env(&key) {
        backoff.max_delay_ms = parse_env(&key, &value)?;
    }
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    llm: Option<LlmPatch>,
    search: Option<SearchPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    #[serde(flatten)]
    backoff: BackoffPatch,
}

#[derive(Debug, Default, Deserialize)]
struct SearchPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    #[serde(flatten)]
    backoff: BackoffPatch,
    currency: Option<String>,
    language: Option<String>,
    country: Option<String>,
    max_results: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct BackoffPatch {
    retry_initial_delay_ms: Option<u64>,
    retry_backoff_multiplier: Option<f64>,
    retry_max_delay_ms: Option<u64>,
}

impl BackoffPatch {
    fn apply_to(self, backoff: &mut RetryBackoff) {
        if let Some(initial_delay_ms) = self.retry_initial_delay_ms {
            backoff.initial_delay_ms = initial_delay_ms;
        }
        if let Some(multiplier) = self.retry_backoff_multiplier {
            backoff.multiplier = multiplier;
        }
        if let Some(max_delay_ms) = self.retry_max_delay_ms {
            backoff.max_delay_ms = max_delay_ms;
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
