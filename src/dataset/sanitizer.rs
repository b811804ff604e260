use super::model::Record;
use log::warn;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// 检测用的危险模式（按顺序匹配，命中任意一个即触发清理）
const DANGEROUS_PATTERNS: &[&str] = &[
    r"(?i)<\s*/?\s*script\b",
    r"(?i)javascript\s*:",
    r"(?i)vbscript\s*:",
    r"(?i)\bon[a-z]+\s*=",
    r"(?i)data\s*:\s*text/html",
    r"(?i)<\s*/?\s*(iframe|object|embed|form|input)\b",
    r"(?i)<\s*img\b[^>]*\bonerror\b",
    r"(?i)expression\s*\(",
    r"(?i)url\s*\(\s*javascript",
    r"(?i)&#(x[0-9a-f]+|[0-9]+);?",
];

/// 清理用的删除模式，覆盖上面每一种检测模式
const STRIP_PATTERNS: &[&str] = &[
    r"(?is)<\s*script\b[^>]*>.*?<\s*/\s*script\s*>",
    r"<[^>]*>",
    r"(?i)<\s*/?\s*(script|iframe|object|embed|form|input|img)\b",
    r"(?i)javascript\s*:",
    r"(?i)vbscript\s*:",
    r"(?i)\bon[a-z]+\s*=",
    r"(?i)data\s*:\s*text/html",
    r"(?i)expression\s*\(",
    r"(?i)url\s*\(\s*javascript",
    r"(?i)&#(x[0-9a-f]+|[0-9]+);?",
];

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("static sanitizer pattern"))
        .collect()
}

fn dangerous_patterns() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| compile(DANGEROUS_PATTERNS))
}

fn strip_patterns() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| compile(STRIP_PATTERNS))
}

pub fn contains_dangerous_content(value: &str) -> bool {
    dangerous_patterns().iter().any(|re| re.is_match(value))
}

fn strip_once(value: &str) -> String {
    strip_patterns()
        .iter()
        .fold(value.to_string(), |acc, re| re.replace_all(&acc, "").into_owned())
}

/// 清理字符串中的标签/脚本注入内容
///
/// 未命中任何危险模式时原样返回。命中后反复删除直到结果稳定，
/// 因此删除后拼接出的新片段也会被清理，结果满足幂等。
pub fn sanitize_input(value: &str) -> String {
    if !contains_dangerous_content(value) {
        return value.to_string();
    }

    let mut current = value.to_string();
    loop {
        let next = strip_once(&current);
        if next == current {
            break;
        }
        current = next;
    }

    warn!(
        "检测到潜在注入内容，已清理 ({} -> {} 字符)",
        value.chars().count(),
        current.chars().count()
    );
    current
}

/// 只清理记录顶层的字符串值，嵌套对象/数组保持原样
pub fn sanitize_record(record: &mut Record) {
    for value in record.values_mut() {
        if let Value::String(s) = value {
            if contains_dangerous_content(s) {
                *s = sanitize_input(s);
            }
        }
    }
}
