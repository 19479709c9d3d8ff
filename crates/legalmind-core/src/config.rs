use std::collections::HashMap;

use anyhow::Result;

/// Full client configuration. Everything comes from env/.env; sensitive
/// fields (tokens) are never written anywhere by this crate.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the analysis service.
    pub api_base_url: String,
    /// Bearer token for the analysis service, if already known. When empty,
    /// the token provider falls back to the credentials file.
    pub access_token: String,
    /// JSON credentials file written by the auth provider's CLI/session.
    pub credentials_path: String,
    /// User id attached to uploads and history keys. Empty = anonymous.
    pub user_id: String,
    /// Directory for the local fallback chat-history cache.
    pub cache_dir: String,

    // Polling / persistence timing
    pub poll_interval_ms: u64,
    pub poll_backoff_ms: u64,
    pub persist_debounce_ms: u64,
    pub request_timeout_s: u64,
}

fn parse_dotenv() -> HashMap<String, String> {
    let mut map = HashMap::new();
    let Ok(contents) = std::fs::read_to_string(".env") else {
        return map;
    };
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            map.insert(k.trim().to_string(), v.trim().to_string());
        }
    }
    map
}

fn get(key: &str, dotenv: &HashMap<String, String>) -> Option<String> {
    std::env::var(key).ok().or_else(|| dotenv.get(key).cloned())
}

fn get_str(key: &str, dotenv: &HashMap<String, String>, default: &str) -> String {
    get(key, dotenv).unwrap_or_else(|| default.to_string())
}

fn get_u64(key: &str, dotenv: &HashMap<String, String>, default: u64) -> u64 {
    get(key, dotenv)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn resolve_tilde(path: &str) -> String {
    if path.starts_with("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return format!("{}/{}", home, path.strip_prefix("~/").unwrap_or(path));
        }
    }
    path.to_string()
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let dotenv = parse_dotenv();

        let home = std::env::var("HOME").unwrap_or_default();
        let default_credentials = format!("{}/.legalmind/credentials.json", home);
        let default_cache = format!("{}/.legalmind/cache", home);

        let credentials_path = get_str("LEGALMIND_CREDENTIALS_PATH", &dotenv, &default_credentials);
        let cache_dir = get_str("LEGALMIND_CACHE_DIR", &dotenv, &default_cache);

        Ok(Config {
            api_base_url: get_str("LEGALMIND_API_URL", &dotenv, "http://localhost:8000"),
            access_token: get_str("LEGALMIND_ACCESS_TOKEN", &dotenv, ""),
            credentials_path: resolve_tilde(&credentials_path),
            user_id: get_str("LEGALMIND_USER_ID", &dotenv, ""),
            cache_dir: resolve_tilde(&cache_dir),
            poll_interval_ms: get_u64("LEGALMIND_POLL_INTERVAL_MS", &dotenv, 2000),
            poll_backoff_ms: get_u64("LEGALMIND_POLL_BACKOFF_MS", &dotenv, 4000),
            persist_debounce_ms: get_u64("LEGALMIND_PERSIST_DEBOUNCE_MS", &dotenv, 2000),
            request_timeout_s: get_u64("LEGALMIND_REQUEST_TIMEOUT_S", &dotenv, 30),
        })
    }
}

/// Read the bearer token from a credentials JSON file. Accepts either
/// `{"access_token": "..."}` at the root or `{"session": {"access_token": ...}}`.
pub fn read_token_from_credentials(path: &str) -> Option<String> {
    let contents = std::fs::read_to_string(path).ok()?;
    let v: serde_json::Value = serde_json::from_str(&contents).ok()?;
    v.get("access_token")
        .and_then(|t| t.as_str())
        .map(str::to_string)
        .or_else(|| {
            v.get("session")
                .and_then(|s| s.get("access_token"))
                .and_then(|t| t.as_str())
                .map(str::to_string)
        })
        .filter(|t| !t.is_empty())
}

/// Read the user id from the same credentials file, if present.
pub fn read_user_from_credentials(path: &str) -> Option<String> {
    let contents = std::fs::read_to_string(path).ok()?;
    let v: serde_json::Value = serde_json::from_str(&contents).ok()?;
    v.get("user_id")
        .and_then(|t| t.as_str())
        .map(str::to_string)
        .or_else(|| {
            v.get("user")
                .and_then(|u| u.get("id"))
                .and_then(|t| t.as_str())
                .map(str::to_string)
        })
        .filter(|t| !t.is_empty())
}
