use super::error::DatasetError;
use super::model::{Dataset, DatasetFormat, DatasetPayload};
use super::parser::{decode_text, parse_csv_with_limits, parse_excel_with_limits, parse_json};
use super::validator::{validate_file_size, validate_record_count, IngestLimits};
use crate::api::{ApiClient, ApiError};
use log::info;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// 数据集元信息（名称缺省时取文件名去掉扩展名）
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    pub name: Option<String>,
    pub description: Option<String>,
    pub fact_type: String,
    pub tags: Vec<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum UploadError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// 文件 -> 数据集载荷
///
/// 顺序：大小 -> 格式 -> 读取 -> 解析（CSV 同时校验表头/列数并清理单元格）-> 记录数上限 -> 组装。
/// 任一步失败即整体失败，不会产生部分结果。
#[derive(Debug, Clone, Default)]
pub struct DatasetIngestor {
    limits: IngestLimits,
}

impl DatasetIngestor {
    pub fn new(limits: IngestLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &IngestLimits {
        &self.limits
    }

    /// 读取本地文件；在读取内容之前先按文件元数据检查大小
    pub async fn ingest_file(
        &self,
        path: &Path,
        options: IngestOptions,
    ) -> Result<DatasetPayload, DatasetError> {
        let meta = tokio::fs::metadata(path).await?;
        validate_file_size(meta.len(), &self.limits)?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let bytes = tokio::fs::read(path).await?;
        self.ingest_bytes(&file_name, &bytes, options)
    }

    pub fn ingest_bytes(
        &self,
        file_name: &str,
        bytes: &[u8],
        options: IngestOptions,
    ) -> Result<DatasetPayload, DatasetError> {
        validate_file_size(bytes.len() as u64, &self.limits)?;

        let format = DatasetFormat::from_file_name(file_name);
        let records = match format {
            DatasetFormat::Csv => parse_csv_with_limits(decode_text(bytes)?, &self.limits)?,
            DatasetFormat::Json => parse_json(decode_text(bytes)?)?,
            DatasetFormat::Excel => parse_excel_with_limits(bytes, &self.limits)?,
        };
        validate_record_count(records.len(), &self.limits)?;

        let name = options
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| strip_extension(file_name));

        info!(
            "✓ 数据集解析完成: {} [{}] {} 条记录",
            name,
            format,
            records.len()
        );

        Ok(DatasetPayload {
            name,
            description: options.description.filter(|d| !d.trim().is_empty()),
            fact_type: options.fact_type,
            format,
            records,
            tags: options.tags,
        })
    }
}

fn strip_extension(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => file_name.to_string(),
    }
}

/// 解析本地文件并上传，解析失败时不会发起网络请求
pub async fn upload_file(
    api: &ApiClient,
    ingestor: &DatasetIngestor,
    path: &Path,
    options: IngestOptions,
    cancel: Option<&CancellationToken>,
) -> Result<Dataset, UploadError> {
    let payload = ingestor.ingest_file(path, options).await?;
    let dataset = api.create_dataset(&payload, cancel).await?;
    info!(
        "✓ 数据集已上传: {} (id: {}, version: {})",
        dataset.name, dataset.id, dataset.version
    );
    Ok(dataset)
}
