use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use toml::Value;
use tripdesk_core::config::{AppConfig, ConfigOverrides, LoadOptions};

/// One effective setting: dotted key, display value, and the env vars that can set it.
struct Entry {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

impl Entry {
    fn new(key: &'static str, value: impl ToString, env_keys: &'static [&'static str]) -> Self {
        Self { key, value: value.to_string(), env_keys }
    }
}

pub fn run(options: LoadOptions) -> String {
    let config_path = options.config_path.clone().or_else(detect_config_path);
    let flagged = flagged_keys(&options.overrides);
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };
    let file_doc = load_config_file_doc(config_path.as_deref());

    let mut lines = vec![
        "effective config (source precedence: flag > env > file > default):".to_string(),
    ];
    for entry in entries(&config) {
        let source = if flagged.contains(&entry.key) {
            "flag".to_string()
        } else {
            field_source(&entry, file_doc.as_ref(), config_path.as_deref())
        };
        lines.push(format!("- {} = {} (source: {source})", entry.key, entry.value));
    }
    lines.join("\n")
}

fn entries(config: &AppConfig) -> Vec<Entry> {
    vec![
        Entry::new("database.url", &config.database.url, &["TRIPDESK_DATABASE_URL"]),
        Entry::new(
            "database.max_connections",
            config.database.max_connections,
            &["TRIPDESK_DATABASE_MAX_CONNECTIONS"],
        ),
        Entry::new(
            "database.timeout_secs",
            config.database.timeout_secs,
            &["TRIPDESK_DATABASE_TIMEOUT_SECS"],
        ),
        Entry::new("llm.provider", config.llm.provider.as_str(), &["TRIPDESK_LLM_PROVIDER"]),
        Entry::new("llm.model", &config.llm.model, &["TRIPDESK_LLM_MODEL"]),
        Entry::new(
            "llm.base_url",
            config.llm.base_url.as_deref().unwrap_or("<unset>"),
            &["TRIPDESK_LLM_BASE_URL"],
        ),
        Entry::new("llm.api_key", redact(config.llm.api_key.as_ref()), &["TRIPDESK_LLM_API_KEY"]),
        Entry::new("llm.timeout_secs", config.llm.timeout_secs, &["TRIPDESK_LLM_TIMEOUT_SECS"]),
        Entry::new("llm.max_retries", config.llm.max_retries, &["TRIPDESK_LLM_MAX_RETRIES"]),
        Entry::new(
            "llm.retry_initial_delay_ms",
            config.llm.backoff.initial_delay_ms,
            &["TRIPDESK_LLM_RETRY_INITIAL_DELAY_MS"],
        ),
        Entry::new(
            "llm.retry_backoff_multiplier",
            config.llm.backoff.multiplier,
            &["TRIPDESK_LLM_RETRY_BACKOFF_MULTIPLIER"],
        ),
        Entry::new(
            "llm.retry_max_delay_ms",
            config.llm.backoff.max_delay_ms,
            &["TRIPDESK_LLM_RETRY_MAX_DELAY_MS"],
        ),
        Entry::new(
            "search.api_key",
            redact(config.search.api_key.as_ref()),
            &["TRIPDESK_SEARCH_API_KEY", "SERPAPI_API_KEY"],
        ),
        Entry::new("search.base_url", &config.search.base_url, &["TRIPDESK_SEARCH_BASE_URL"]),
        Entry::new(
            "search.timeout_secs",
            config.search.timeout_secs,
            &["TRIPDESK_SEARCH_TIMEOUT_SECS"],
        ),
        Entry::new(
            "search.max_retries",
            config.search.max_retries,
            &["TRIPDESK_SEARCH_MAX_RETRIES"],
        ),
        Entry::new(
            "search.retry_initial_delay_ms",
            config.search.backoff.initial_delay_ms,
            &["TRIPDESK_SEARCH_RETRY_INITIAL_DELAY_MS"],
        ),
        Entry::new(
            "search.retry_backoff_multiplier",
            config.search.backoff.multiplier,
            &["TRIPDESK_SEARCH_RETRY_BACKOFF_MULTIPLIER"],
        ),
        Entry::new(
            "search.retry_max_delay_ms",
            config.search.backoff.max_delay_ms,
            &["TRIPDESK_SEARCH_RETRY_MAX_DELAY_MS"],
        ),
        Entry::new("search.currency", &config.search.currency, &["TRIPDESK_SEARCH_CURRENCY"]),
        Entry::new("search.language", &config.search.language, &["TRIPDESK_SEARCH_LANGUAGE"]),
        Entry::new("search.country", &config.search.country, &["TRIPDESK_SEARCH_COUNTRY"]),
        Entry::new(
            "search.max_results",
            config.search.max_results,
            &["TRIPDESK_SEARCH_MAX_RESULTS"],
        ),
        Entry::new(
            "logging.level",
            &config.logging.level,
            &["TRIPDESK_LOGGING_LEVEL", "TRIPDESK_LOG_LEVEL"],
        ),
        Entry::new(
            "logging.format",
            format!("{:?}", config.logging.format).to_ascii_lowercase(),
            &["TRIPDESK_LOGGING_FORMAT", "TRIPDESK_LOG_FORMAT"],
        ),
    ]
}

fn flagged_keys(overrides: &ConfigOverrides) -> Vec<&'static str> {
    [
        ("database.url", overrides.database_url.is_some()),
        ("logging.level", overrides.log_level.is_some()),
        ("llm.provider", overrides.llm_provider.is_some()),
        ("llm.model", overrides.llm_model.is_some()),
        ("search.api_key", overrides.search_api_key.is_some()),
        ("search.max_retries", overrides.search_max_retries.is_some()),
    ]
    .into_iter()
    .filter_map(|(key, set)| set.then_some(key))
    .collect()
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("tripdesk.toml"), PathBuf::from("config/tripdesk.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(entry: &Entry, file_doc: Option<&Value>, file_path: Option<&Path>) -> String {
    if let Some(env_key) = entry.env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = file_doc {
        if contains_path(doc, entry.key) {
            let file_path = file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

/// Keeps a short prefix so operators can tell keys apart without exposing them.
fn redact(secret: Option<&SecretString>) -> String {
    let Some(secret) = secret else {
        return "<unset>".to_string();
    };
    let value = secret.expose_secret().trim();
    match value.char_indices().nth(4) {
        Some((cut, _)) if value.len() > 12 => format!("{}***", &value[..cut]),
        _ if value.is_empty() => "<empty>".to_string(),
        _ => "<redacted>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::redact;

    #[test]
    fn secrets_are_never_printed_in_full() {
        assert_eq!(redact(None), "<unset>");
        assert_eq!(redact(Some(&SecretString::from("   "))), "<empty>");
        assert_eq!(redact(Some(&SecretString::from("short"))), "<redacted>");
        assert_eq!(redact(Some(&SecretString::from("serp-0123456789abcdef"))), "serp***");
    }
}
