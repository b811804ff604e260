use super::error::DatasetError;
use super::model::Record;
use super::sanitizer::{sanitize_input, sanitize_record};
use super::validator::{validate_column_consistency, validate_headers, IngestLimits};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use serde_json::{Number, Value};
use std::io::Cursor;

/// 去掉 UTF-8 BOM 后按文本读取
pub fn decode_text(bytes: &[u8]) -> Result<&str, DatasetError> {
    let text = std::str::from_utf8(bytes).map_err(|_| DatasetError::InvalidEncoding)?;
    Ok(text.strip_prefix('\u{feff}').unwrap_or(text))
}

/// 单元格文本 -> JSON 值
///
/// 规则依次为：空串或 `null` -> null，`true`/`false` -> 布尔，可解析为实数 -> 数字，
/// 否则为去空白并清理后的字符串。
pub fn coerce_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    if trimmed.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Some(n) = parse_number(trimmed) {
        return Value::Number(n);
    }
    clean_text(trimmed)
}

/// 清理后为空的文本按空值处理
fn clean_text(trimmed: &str) -> Value {
    let cleaned = sanitize_input(trimmed);
    if cleaned.trim().is_empty() {
        Value::Null
    } else {
        Value::String(cleaned)
    }
}

fn parse_number(s: &str) -> Option<Number> {
    let numeric_chars = s
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'));
    if !numeric_chars || !s.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    if let Ok(i) = s.parse::<i64>() {
        return Some(Number::from(i));
    }
    s.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(Number::from_f64)
}

/// `id`、`*_id`、`*Id` 列保留原始文本（前导零、超长编号不被转成数字）
fn is_identifier_column(header: &str) -> bool {
    header.eq_ignore_ascii_case("id")
        || header.to_ascii_lowercase().ends_with("_id")
        || (header.len() > 2 && header.ends_with("Id"))
}

fn coerce_identifier(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
        Value::Null
    } else {
        clean_text(trimmed)
    }
}

fn clean_header(raw: &str) -> String {
    raw.trim().trim_matches('"').trim().to_string()
}

/// 按行号保存的原始 CSV 行
struct CsvRow {
    line: usize,
    fields: Vec<String>,
}

fn read_csv_rows(text: &str) -> Result<Vec<CsvRow>, DatasetError> {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(normalized.as_bytes());

    let lines: Vec<&str> = normalized.split('\n').collect();
    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| DatasetError::Csv(e.to_string()))?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(rows.len() + 1);
        // 空行按原始文本判断，`""` 是一个空单元格而不是空行
        let blank_line = lines
            .get(line.saturating_sub(1))
            .map_or(true, |raw| raw.trim().is_empty());
        if record.len() <= 1 && blank_line {
            continue;
        }
        rows.push(CsvRow {
            line,
            fields: record.iter().map(|f| f.to_string()).collect(),
        });
    }
    Ok(rows)
}

pub fn parse_csv(text: &str) -> Result<Vec<Record>, DatasetError> {
    parse_csv_with_limits(text, &IngestLimits::default())
}

/// 解析 CSV：首个非空行为表头，其余每行必须与表头列数一致
pub fn parse_csv_with_limits(
    text: &str,
    limits: &IngestLimits,
) -> Result<Vec<Record>, DatasetError> {
    let mut rows = read_csv_rows(text)?.into_iter();
    let header_row = rows.next().ok_or(DatasetError::CsvTooShort)?;
    let data_rows: Vec<CsvRow> = rows.collect();
    if data_rows.is_empty() {
        return Err(DatasetError::CsvTooShort);
    }

    let headers: Vec<String> = header_row.fields.iter().map(|h| clean_header(h)).collect();
    validate_headers(&headers, limits)?;
    validate_column_consistency(
        headers.len(),
        data_rows.iter().map(|r| (r.line, r.fields.len())),
    )?;

    let id_columns: Vec<bool> = headers.iter().map(|h| is_identifier_column(h)).collect();
    let records = data_rows
        .iter()
        .map(|row| {
            headers
                .iter()
                .zip(&id_columns)
                .zip(&row.fields)
                .map(|((header, is_id), raw)| {
                    let value = if *is_id {
                        coerce_identifier(raw)
                    } else {
                        coerce_value(raw)
                    };
                    (header.clone(), value)
                })
                .collect::<Record>()
        })
        .collect();
    Ok(records)
}

/// 解析 JSON：数组中的每个对象为一条记录，单个对象包装成一条记录
///
/// 不检查各记录字段是否一致。
pub fn parse_json(text: &str) -> Result<Vec<Record>, DatasetError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| DatasetError::InvalidJson(e.to_string()))?;

    let mut records = match value {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Object(map) => Ok(map),
                _ => Err(DatasetError::JsonEntryNotObject { index }),
            })
            .collect::<Result<Vec<_>, _>>()?,
        Value::Object(map) => vec![map],
        Value::Null => return Err(DatasetError::UnexpectedJsonShape("null")),
        Value::Bool(_) => return Err(DatasetError::UnexpectedJsonShape("boolean")),
        Value::Number(_) => return Err(DatasetError::UnexpectedJsonShape("number")),
        Value::String(_) => return Err(DatasetError::UnexpectedJsonShape("string")),
    };

    records.iter_mut().for_each(sanitize_record);
    Ok(records)
}

/// 能精确表示为整数的实数
fn whole_number(f: f64) -> Option<i64> {
    (f.fract() == 0.0 && f.abs() < 9.0e15).then_some(f as i64)
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::Bool(b) => Value::Bool(*b),
        Data::Int(i) => Value::Number(Number::from(*i)),
        Data::Float(f) => match whole_number(*f) {
            Some(i) => Value::Number(Number::from(i)),
            None => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
        },
        Data::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Value::Null
            } else {
                clean_text(trimmed)
            }
        }
        other => Value::String(other.to_string()),
    }
}

/// 标识列的单元格：数字按文本保存，`1.0` 记为 `"1"`
fn identifier_cell(cell: &Data) -> Value {
    match cell {
        Data::Int(i) => Value::String(i.to_string()),
        Data::Float(f) => Value::String(match whole_number(*f) {
            Some(i) => i.to_string(),
            None => f.to_string(),
        }),
        Data::Bool(b) => Value::String(b.to_string()),
        Data::String(s) => coerce_identifier(s),
        other => cell_value(other),
    }
}

pub fn parse_excel(bytes: &[u8]) -> Result<Vec<Record>, DatasetError> {
    parse_excel_with_limits(bytes, &IngestLimits::default())
}

/// 解析表格文件：只读第一个工作表，首行作为表头
pub fn parse_excel_with_limits(
    bytes: &[u8],
    limits: &IngestLimits,
) -> Result<Vec<Record>, DatasetError> {
    let cursor = Cursor::new(bytes.to_vec());
    let mut workbook = open_workbook_auto_from_rs(cursor)
        .map_err(|e| DatasetError::Spreadsheet(e.to_string()))?;

    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(DatasetError::NoSheets)?;
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| DatasetError::Spreadsheet(e.to_string()))?;

    let mut rows = range.rows();
    let header_row = rows
        .next()
        .ok_or_else(|| DatasetError::EmptySheet(sheet.clone()))?;
    let headers: Vec<String> = header_row
        .iter()
        .map(|cell| clean_header(&cell.to_string()))
        .collect();
    validate_headers(&headers, limits)?;

    let id_columns: Vec<bool> = headers.iter().map(|h| is_identifier_column(h)).collect();
    let records: Vec<Record> = rows
        .filter(|row| !row.iter().all(|cell| matches!(cell, Data::Empty)))
        .map(|row| {
            headers
                .iter()
                .zip(&id_columns)
                .zip(row.iter())
                .map(|((header, is_id), cell)| {
                    let value = if *is_id {
                        identifier_cell(cell)
                    } else {
                        cell_value(cell)
                    };
                    (header.clone(), value)
                })
                .collect::<Record>()
        })
        .collect();

    if records.is_empty() {
        return Err(DatasetError::EmptySheet(sheet));
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn coercion_rules() {
        assert_eq!(coerce_value(""), Value::Null);
        assert_eq!(coerce_value("  NULL "), Value::Null);
        assert_eq!(coerce_value("TRUE"), Value::Bool(true));
        assert_eq!(coerce_value("false"), Value::Bool(false));
        assert_eq!(coerce_value("42"), json!(42));
        assert_eq!(coerce_value("-3.5"), json!(-3.5));
        assert_eq!(coerce_value("1e3"), json!(1000.0));
        assert_eq!(coerce_value("  hello "), json!("hello"));
        assert_eq!(coerce_value("NaN"), json!("NaN"));
        assert_eq!(coerce_value("inf"), json!("inf"));
        assert_eq!(coerce_value("1-2"), json!("1-2"));
    }

    #[test]
    fn csv_quotes_and_line_endings() {
        let text = "\"name\",note\r\n\"Smith, J\",\"said \"\"hi\"\"\"\r\rDoe,plain\r";
        let records = parse_csv(text).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["name"], "Smith, J");
        assert_eq!(records[0]["note"], "said \"hi\"");
        assert_eq!(records[1]["name"], "Doe");
    }

    #[test]
    fn csv_header_order_is_preserved() {
        let records = parse_csv("z,a,m\n1,2,3\n").unwrap();
        let keys: Vec<&String> = records[0].keys().collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }

    #[test]
    fn csv_needs_header_and_data() {
        assert!(matches!(parse_csv(""), Err(DatasetError::CsvTooShort)));
        assert!(matches!(parse_csv("a,b\n\n"), Err(DatasetError::CsvTooShort)));
    }

    #[test]
    fn csv_mismatch_uses_file_line_numbers() {
        let err = parse_csv("a,b\n1,2\n\n3\n").unwrap_err();
        assert!(matches!(
            err,
            DatasetError::ColumnCountMismatch { row: 4, actual: 1, expected: 2 }
        ));
    }

    #[test]
    fn csv_cells_are_sanitized() {
        let records = parse_csv("name\n<script>x()</script>Eve\n").unwrap();
        assert_eq!(records[0]["name"], "Eve");
    }

    #[test]
    fn markup_only_cell_becomes_null() {
        let records = parse_csv("name,n\n<script>x()</script>,1\n").unwrap();
        assert_eq!(records[0]["name"], Value::Null);
        assert_eq!(records[0]["n"], 1);
        assert_eq!(coerce_value("<iframe></iframe>"), Value::Null);
    }

    #[test]
    fn quoted_empty_row_is_a_record() {
        let records = parse_csv("a\n\"\"\n2\n").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["a"], Value::Null);
        assert_eq!(records[1]["a"], 2);

        // 只有空白的行仍然跳过
        let records = parse_csv("a\n   \n2\n").unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn identifier_cells_render_as_text() {
        assert_eq!(identifier_cell(&Data::Float(1.0)), json!("1"));
        assert_eq!(identifier_cell(&Data::Float(2.5)), json!("2.5"));
        assert_eq!(identifier_cell(&Data::Int(7)), json!("7"));
        assert_eq!(identifier_cell(&Data::String(" 007 ".into())), json!("007"));
        assert_eq!(identifier_cell(&Data::Empty), Value::Null);
    }

    #[test]
    fn identifier_columns_stay_text() {
        let records = parse_csv("id,customer_id,accountId,score\n007,12,99,5\n").unwrap();
        assert_eq!(records[0]["id"], "007");
        assert_eq!(records[0]["customer_id"], "12");
        assert_eq!(records[0]["accountId"], "99");
        assert_eq!(records[0]["score"], 5);
    }

    #[test]
    fn json_object_becomes_single_record() {
        let records = parse_json(r#"{"a": 1, "b": "x"}"#).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["a"], 1);
    }

    #[test]
    fn json_rejects_other_shapes() {
        assert!(matches!(
            parse_json("42"),
            Err(DatasetError::UnexpectedJsonShape("number"))
        ));
        assert!(matches!(
            parse_json("[{\"a\":1}, 3]"),
            Err(DatasetError::JsonEntryNotObject { index: 1 })
        ));
        assert!(matches!(parse_json("{oops"), Err(DatasetError::InvalidJson(_))));
    }

    #[test]
    fn json_records_may_differ_in_shape() {
        let records = parse_json(r#"[{"a": 1}, {"b": 2, "c": null}]"#).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[1].get("a").is_none());
    }

    #[test]
    fn garbage_is_not_a_workbook() {
        assert!(matches!(
            parse_excel(b"definitely not a zip"),
            Err(DatasetError::Spreadsheet(_))
        ));
    }

    proptest! {
        #[test]
        fn csv_yields_one_record_per_row(
            cols in 1usize..6,
            rows in prop::collection::vec(prop::collection::vec("[a-z0-9]{0,5}", 6), 1..20),
        ) {
            let headers: Vec<String> = (0..cols).map(|i| format!("col_{i}")).collect();
            let mut text = headers.join(",");
            text.push('\n');
            for row in &rows {
                // 保证每行至少有一个非空单元格，避免被当作空行跳过
                let mut cells: Vec<String> = row[..cols].to_vec();
                cells[0] = format!("v{}", cells[0]);
                text.push_str(&cells.join(","));
                text.push('\n');
            }
            let records = parse_csv(&text).unwrap();
            prop_assert_eq!(records.len(), rows.len());
            for record in &records {
                let keys: Vec<String> = record.keys().cloned().collect();
                prop_assert_eq!(&keys, &headers);
            }
        }

        #[test]
        fn csv_short_row_is_reported(
            extra_rows in 0usize..5,
        ) {
            let mut text = String::from("a,b,c\n");
            for _ in 0..extra_rows {
                text.push_str("1,2,3\n");
            }
            text.push_str("1,2\n");
            let err = parse_csv(&text).unwrap_err();
            let is_expected = matches!(
                err,
                DatasetError::ColumnCountMismatch { row, actual: 2, expected: 3 } if row == extra_rows + 2
            );
            prop_assert!(is_expected);
        }
    }
}
