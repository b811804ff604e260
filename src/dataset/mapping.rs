use super::model::{FieldMapping, Record, TransformationType};
use chrono::{DateTime, NaiveDate};
use serde_json::{Number, Value};

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum MappingError {
    #[error("cannot convert field \"{field}\" value {value} to {target:?}")]
    Conversion {
        field: String,
        value: String,
        target: TransformationType,
    },
}

/// 按字段映射把一条数据集记录转换为事实对象
///
/// 源字段缺失或为 null 时使用默认值（若有）；否则目标字段为 null。
pub fn apply_mappings(record: &Record, mappings: &[FieldMapping]) -> Result<Record, MappingError> {
    let mut fact = Record::new();
    for mapping in mappings {
        let source = record
            .get(&mapping.dataset_field)
            .filter(|v| !v.is_null())
            .or(mapping.default_value.as_ref())
            .cloned()
            .unwrap_or(Value::Null);

        let value = match (mapping.transformation, source) {
            (_, Value::Null) => Value::Null,
            (None, v) => v,
            (Some(target), v) => transform(&mapping.dataset_field, v, target)?,
        };
        fact.insert(mapping.fact_field.clone(), value);
    }
    Ok(fact)
}

fn transform(field: &str, value: Value, target: TransformationType) -> Result<Value, MappingError> {
    let fail = |v: &Value| MappingError::Conversion {
        field: field.to_string(),
        value: v.to_string(),
        target,
    };

    let converted = match target {
        TransformationType::String => Some(match &value {
            Value::String(s) => Value::String(s.clone()),
            other => Value::String(other.to_string()),
        }),
        TransformationType::Integer | TransformationType::Long => {
            as_integer(&value).map(|i| Value::Number(Number::from(i)))
        }
        TransformationType::Double => as_double(&value)
            .and_then(Number::from_f64)
            .map(Value::Number),
        TransformationType::Boolean => as_bool(&value).map(Value::Bool),
        TransformationType::Date => as_date(&value).map(|d| Value::String(d.format("%Y-%m-%d").to_string())),
    };

    let converted = converted.ok_or_else(|| fail(&value))?;
    if target == TransformationType::Integer {
        if let Some(i) = converted.as_i64() {
            if i32::try_from(i).is_err() {
                return Err(fail(&value));
            }
        }
    }
    Ok(converted)
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        // i64::MAX as f64 等于 2^63，超出 i64，所以上界不含
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && (i64::MIN as f64..i64::MAX as f64).contains(f))
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn as_double(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn as_date(value: &Value) -> Option<NaiveDate> {
    let s = value.as_str()?.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
}

fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_' && *c != '-' && !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// 按名称（忽略大小写、`_`、`-`）自动匹配数据集字段与事实字段
pub fn suggest_mappings(dataset_fields: &[String], fact_fields: &[String]) -> Vec<FieldMapping> {
    dataset_fields
        .iter()
        .filter_map(|field| {
            let key = normalize_name(field);
            fact_fields
                .iter()
                .find(|target| normalize_name(target) == key)
                .map(|target| FieldMapping {
                    dataset_field: field.clone(),
                    fact_field: target.clone(),
                    transformation: None,
                    default_value: None,
                })
        })
        .collect()
}
