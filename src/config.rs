use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_WS_URL: &str = "ws://localhost:8080/ws/simulations";
pub const DEFAULT_DRAFTS_DB: &str = "sqlite://simrule_drafts.db?mode=rwc";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// 运行配置（来自环境变量 / .env）
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub api_url: String,
    pub ws_url: String,
    pub user_id: Option<String>,
    pub request_timeout: Duration,
    pub proxy: Option<String>,
    pub drafts_db_url: String,
    pub log_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            user_id: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            proxy: None,
            drafts_db_url: DEFAULT_DRAFTS_DB.to_string(),
            log_dir: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 通过任意键值查找构造，空白值视为未设置
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let request_timeout = get("SIMRULE_REQUEST_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        Self {
            api_url: get("SIMRULE_API_URL").unwrap_or(defaults.api_url),
            ws_url: get("SIMRULE_WS_URL").unwrap_or(defaults.ws_url),
            user_id: get("SIMRULE_USER_ID"),
            request_timeout,
            proxy: get("SIMRULE_PROXY"),
            drafts_db_url: get("SIMRULE_DRAFTS_DB").unwrap_or(defaults.drafts_db_url),
            log_dir: get("SIMRULE_LOG_DIR").map(PathBuf::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_when_unset() {
        let cfg = AppConfig::from_lookup(|_| None);
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn reads_values_and_ignores_garbage() {
        let env: HashMap<&str, &str> = [
            ("SIMRULE_API_URL", "https://rules.example/api"),
            ("SIMRULE_USER_ID", "  qa-team "),
            ("SIMRULE_REQUEST_TIMEOUT_SECS", "abc"),
            ("SIMRULE_PROXY", "   "),
        ]
        .into_iter()
        .collect();
        let cfg = AppConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.api_url, "https://rules.example/api");
        assert_eq!(cfg.user_id.as_deref(), Some("qa-team"));
        assert_eq!(cfg.request_timeout, Duration::from_secs(30));
        assert_eq!(cfg.proxy, None);
    }
}
