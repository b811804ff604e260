use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// 一行解析后的数据：字段名 -> 值，保持表头顺序
pub type Record = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DatasetFormat {
    Csv,
    Json,
    Excel,
}

impl DatasetFormat {
    /// 根据文件扩展名推断格式，未知扩展名按 JSON 处理
    pub fn from_file_name(file_name: &str) -> Self {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("csv") => DatasetFormat::Csv,
            Some("xlsx") | Some("xls") => DatasetFormat::Excel,
            _ => DatasetFormat::Json,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetFormat::Csv => "CSV",
            DatasetFormat::Json => "JSON",
            DatasetFormat::Excel => "EXCEL",
        }
    }
}

impl std::fmt::Display for DatasetFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 上传给后端的数据集载荷
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DatasetPayload {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub fact_type: String,
    pub format: DatasetFormat,
    pub records: Vec<Record>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// 后端保存后的数据集（版本号由后端分配）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub fact_type: String,
    pub format: DatasetFormat,
    #[serde(default)]
    pub records: Vec<Record>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub version: u32,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransformationType {
    String,
    Integer,
    Long,
    Double,
    Boolean,
    Date,
}

/// 数据集字段 -> 事实类型字段
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    pub dataset_field: String,
    pub fact_field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformation: Option<TransformationType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_follows_extension() {
        assert_eq!(DatasetFormat::from_file_name("people.csv"), DatasetFormat::Csv);
        assert_eq!(DatasetFormat::from_file_name("PEOPLE.CSV"), DatasetFormat::Csv);
        assert_eq!(DatasetFormat::from_file_name("book.xlsx"), DatasetFormat::Excel);
        assert_eq!(DatasetFormat::from_file_name("old.xls"), DatasetFormat::Excel);
        assert_eq!(DatasetFormat::from_file_name("facts.json"), DatasetFormat::Json);
        assert_eq!(DatasetFormat::from_file_name("no_extension"), DatasetFormat::Json);
    }

    #[test]
    fn payload_serializes_camel_case() {
        let payload = DatasetPayload {
            name: "customers".to_string(),
            description: None,
            fact_type: "Customer".to_string(),
            format: DatasetFormat::Csv,
            records: Vec::new(),
            tags: vec!["smoke".to_string()],
        };
        let v = serde_json::to_value(&payload).unwrap();
        assert_eq!(v["factType"], "Customer");
        assert_eq!(v["format"], "CSV");
        assert!(v.get("description").is_none());
    }
}
