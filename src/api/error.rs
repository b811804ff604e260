use serde_json::Value;
use std::time::Duration;

/// HTTP 调用错误
///
/// `Aborted` 只表示调用方主动取消，界面层据此决定不提示用户。
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("request aborted")]
    Aborted,
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        message: String,
        details: Option<Value>,
        correlation_id: Option<String>,
    },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("failed to encode request body: {0}")]
    Encode(String),
}

impl ApiError {
    pub fn is_abort(&self) -> bool {
        matches!(self, ApiError::Aborted)
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            ApiError::Http { correlation_id, .. } => correlation_id.as_deref(),
            _ => None,
        }
    }
}

const MAX_RAW_MESSAGE: usize = 200;

/// 从错误响应体中尽量提取可读信息
///
/// 依次尝试 JSON 字段 `message`/`error`/`detail`/`title`（字符串或内嵌 `message`），
/// 其次是原始文本（截断），最后退回状态码描述。
pub fn extract_error_message(body: &str, fallback: &str) -> (String, Option<Value>) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (fallback.to_string(), None);
    }

    if let Ok(json) = serde_json::from_str::<Value>(trimmed) {
        let message = ["message", "error", "detail", "title"]
            .iter()
            .filter_map(|key| json.get(*key))
            .find_map(|v| match v {
                Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
                Value::Object(_) => v.get("message").and_then(|m| m.as_str()).map(str::to_string),
                _ => None,
            })
            .unwrap_or_else(|| fallback.to_string());
        return (message, Some(json));
    }

    let message = if trimmed.chars().count() > MAX_RAW_MESSAGE {
        let cut: String = trimmed.chars().take(MAX_RAW_MESSAGE).collect();
        format!("{}...", cut)
    } else {
        trimmed.to_string()
    };
    (message, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prefers_json_message_fields() {
        let (msg, details) = extract_error_message(r#"{"message":"scenario missing"}"#, "Not Found");
        assert_eq!(msg, "scenario missing");
        assert_eq!(details, Some(json!({"message": "scenario missing"})));

        let (msg, _) = extract_error_message(r#"{"error":{"message":"bad rule"}}"#, "x");
        assert_eq!(msg, "bad rule");

        let (msg, _) = extract_error_message(r#"{"detail":"","title":"Conflict"}"#, "x");
        assert_eq!(msg, "Conflict");
    }

    #[test]
    fn falls_back_to_text_then_reason() {
        let (msg, details) = extract_error_message("upstream exploded", "Bad Gateway");
        assert_eq!(msg, "upstream exploded");
        assert!(details.is_none());

        let (msg, _) = extract_error_message("   ", "Bad Gateway");
        assert_eq!(msg, "Bad Gateway");

        let long = "x".repeat(500);
        let (msg, _) = extract_error_message(&long, "");
        assert_eq!(msg.len(), 203);
    }

    #[test]
    fn abort_is_distinguishable() {
        assert!(ApiError::Aborted.is_abort());
        assert!(!ApiError::Timeout(Duration::from_secs(1)).is_abort());
        assert!(!ApiError::Network("reset".into()).is_abort());
    }
}
