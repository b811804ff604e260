use super::error::DatasetError;
use log::warn;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

pub const MAX_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
pub const MAX_RECORDS: usize = 10_000;
pub const MAX_HEADER_LENGTH: usize = 100;

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// 导入上限
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestLimits {
    pub max_file_size: u64,
    pub max_records: usize,
    pub max_header_length: usize,
}

impl Default for IngestLimits {
    fn default() -> Self {
        Self {
            max_file_size: MAX_FILE_SIZE_BYTES,
            max_records: MAX_RECORDS,
            max_header_length: MAX_HEADER_LENGTH,
        }
    }
}

fn header_name_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static header pattern"))
}

pub fn validate_file_size(size: u64, limits: &IngestLimits) -> Result<(), DatasetError> {
    if size > limits.max_file_size {
        return Err(DatasetError::FileTooLarge {
            actual_mib: size as f64 / BYTES_PER_MIB,
            max_mib: limits.max_file_size as f64 / BYTES_PER_MIB,
        });
    }
    Ok(())
}

/// 校验表头：非空、无空白列名、大小写不敏感去重、长度上限
///
/// 不符合 `字母/下划线 + 字母/数字/下划线` 的列名只记录警告，不拒绝。
pub fn validate_headers(headers: &[String], limits: &IngestLimits) -> Result<(), DatasetError> {
    if headers.is_empty() {
        return Err(DatasetError::EmptyHeaderRow);
    }

    let mut seen = HashSet::with_capacity(headers.len());
    for (idx, header) in headers.iter().enumerate() {
        let column = idx + 1;
        let trimmed = header.trim();
        if trimmed.is_empty() {
            return Err(DatasetError::EmptyHeader { column });
        }
        if !seen.insert(trimmed.to_lowercase()) {
            return Err(DatasetError::DuplicateHeader(trimmed.to_string()));
        }
        let len = trimmed.chars().count();
        if len > limits.max_header_length {
            return Err(DatasetError::HeaderTooLong {
                column,
                len,
                max: limits.max_header_length,
            });
        }
        if !header_name_pattern().is_match(trimmed) {
            warn!("列名 \"{}\" 含有非常规字符，部分后端可能无法识别", trimmed);
        }
    }
    Ok(())
}

/// 每一行的列数必须与表头一致；`rows` 为 (行号, 列数)
pub fn validate_column_consistency(
    expected: usize,
    rows: impl IntoIterator<Item = (usize, usize)>,
) -> Result<(), DatasetError> {
    for (row, actual) in rows {
        if actual != expected {
            return Err(DatasetError::ColumnCountMismatch {
                row,
                actual,
                expected,
            });
        }
    }
    Ok(())
}

pub fn validate_record_count(count: usize, limits: &IngestLimits) -> Result<(), DatasetError> {
    if count > limits.max_records {
        return Err(DatasetError::TooManyRecords {
            actual: count,
            max: limits.max_records,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn oversized_file_reports_both_sizes() {
        let limits = IngestLimits::default();
        let err = validate_file_size(15 * 1024 * 1024, &limits).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("15.00 MiB"), "{msg}");
        assert!(msg.contains("10.00 MiB"), "{msg}");
        assert!(validate_file_size(MAX_FILE_SIZE_BYTES, &limits).is_ok());
    }

    #[test]
    fn duplicate_headers_are_case_insensitive() {
        let err = validate_headers(&headers(&["id", "Name", "NAME"]), &IngestLimits::default())
            .unwrap_err();
        assert!(matches!(err, DatasetError::DuplicateHeader(ref h) if h == "NAME"));
        assert!(err.to_string().contains("NAME"));
    }

    #[test]
    fn blank_and_long_headers_are_rejected() {
        let limits = IngestLimits::default();
        assert!(matches!(
            validate_headers(&headers(&["id", "  "]), &limits),
            Err(DatasetError::EmptyHeader { column: 2 })
        ));
        assert!(matches!(
            validate_headers(&[], &limits),
            Err(DatasetError::EmptyHeaderRow)
        ));
        let long = "x".repeat(101);
        assert!(matches!(
            validate_headers(&[long], &limits),
            Err(DatasetError::HeaderTooLong { len: 101, max: 100, .. })
        ));
    }

    #[test]
    fn unusual_header_names_only_warn() {
        let limits = IngestLimits::default();
        assert!(validate_headers(&headers(&["first name", "2nd", "ok_1"]), &limits).is_ok());
    }

    #[test]
    fn column_mismatch_names_row_and_counts() {
        let err = validate_column_consistency(2, vec![(2, 2), (3, 3)]).unwrap_err();
        assert_eq!(err.to_string(), "row 3 has 3 columns but the header has 2");
    }

    #[test]
    fn record_ceiling() {
        let limits = IngestLimits::default();
        assert!(validate_record_count(10_000, &limits).is_ok());
        let err = validate_record_count(10_001, &limits).unwrap_err();
        assert!(err.to_string().contains("10001"));
        assert!(err.to_string().contains("10000"));
    }
}
