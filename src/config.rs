use anyhow::{anyhow, Result};
use tokio::time::Duration;
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// Loading states stay on screen at least this long; `MIN_VISIBLE_MS` can
/// only raise it.
pub const MIN_VISIBLE_FLOOR_MS: u64 = 900;

#[derive(Debug, Clone)]
pub struct Config {
    /// Concatenated verbatim with each request path.
    pub api_base_url: String,
    pub session_db_path: String,
    pub min_visible_ms: u64,
    pub reveal_settle_ms: u64,
    pub http_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any variable source; unset and empty values both fall back.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| get(key).filter(|v| !v.trim().is_empty());
        let num = |key: &str, default: u64| var(key).and_then(|v| v.trim().parse().ok()).unwrap_or(default);
        Self {
            api_base_url: var("API_BASE_URL")
                .or_else(|| var("NEXT_PUBLIC_API_BASE_URL"))
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            session_db_path: var("SESSION_DB_PATH").unwrap_or_else(|| "./dropoutfx-session.sqlite".to_string()),
            min_visible_ms: num("MIN_VISIBLE_MS", MIN_VISIBLE_FLOOR_MS),
            reveal_settle_ms: num("REVEAL_SETTLE_MS", 100),
            http_timeout_secs: num("HTTP_TIMEOUT_SECS", 30),
        }
    }

    pub fn with_api_base_url(mut self, base: impl Into<String>) -> Self {
        self.api_base_url = base.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.api_base_url)
            .map_err(|e| anyhow!("invalid API base URL {:?}: {}", self.api_base_url, e))?;
        match url.scheme() {
            "http" | "https" => Ok(()),
            other => Err(anyhow!("unsupported API base URL scheme: {}", other)),
        }
    }

    pub fn min_visible(&self) -> Duration {
        Duration::from_millis(self.min_visible_ms.max(MIN_VISIBLE_FLOOR_MS))
    }

    pub fn reveal_settle(&self) -> Duration {
        Duration::from_millis(self.reveal_settle_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            session_db_path: String::new(),
            min_visible_ms: MIN_VISIBLE_FLOOR_MS,
            reveal_settle_ms: 100,
            http_timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_points_at_local_backend() {
        let cfg = Config::default();
        assert_eq!(cfg.api_base_url, "http://localhost:8000");
        assert_eq!(cfg.min_visible(), Duration::from_millis(900));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_base_urls() {
        assert!(Config::default().with_api_base_url("not a url").validate().is_err());
        assert!(Config::default().with_api_base_url("ftp://example.com").validate().is_err());
        assert!(Config::default().with_api_base_url("https://api.example.com/v1").validate().is_ok());
    }

    fn lookup(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| pairs.iter().find(|(k, _)| *k == key).map(|(_, v)| v.to_string())
    }

    #[test]
    fn test_empty_base_url_falls_through_to_public_variable() {
        let cfg = Config::from_lookup(lookup(&[
            ("API_BASE_URL", ""),
            ("NEXT_PUBLIC_API_BASE_URL", "https://api.example.com"),
        ]));
        assert_eq!(cfg.api_base_url, "https://api.example.com");

        let cfg = Config::from_lookup(lookup(&[
            ("API_BASE_URL", "http://primary:8000"),
            ("NEXT_PUBLIC_API_BASE_URL", "https://api.example.com"),
        ]));
        assert_eq!(cfg.api_base_url, "http://primary:8000");

        let cfg = Config::from_lookup(lookup(&[("API_BASE_URL", "  ")]));
        assert_eq!(cfg.api_base_url, DEFAULT_API_BASE_URL);
    }

    #[test]
    fn test_min_visible_cannot_drop_below_floor() {
        let cfg = Config::from_lookup(lookup(&[("MIN_VISIBLE_MS", "0")]));
        assert_eq!(cfg.min_visible(), Duration::from_millis(900));

        let cfg = Config {
            min_visible_ms: 250,
            ..Config::default()
        };
        assert_eq!(cfg.min_visible(), Duration::from_millis(900));

        let cfg = Config::from_lookup(lookup(&[("MIN_VISIBLE_MS", "1500")]));
        assert_eq!(cfg.min_visible(), Duration::from_millis(1500));
    }
}
