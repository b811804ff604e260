use super::client::ApiClient;
use super::dto::FactSchema;
use super::error::ApiError;
use log::debug;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// 事实类型结构缓存
///
/// 由调用方持有并注入，生命周期与测试隔离都是显式的。
#[derive(Default)]
pub struct FactSchemaCache {
    entries: Mutex<HashMap<String, FactSchema>>,
}

impl FactSchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, FactSchema>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn cached(&self, fact_type: &str) -> Option<FactSchema> {
        self.lock().get(fact_type).cloned()
    }

    pub fn insert(&self, schema: FactSchema) {
        self.lock().insert(schema.fact_type.clone(), schema);
    }

    pub fn invalidate(&self, fact_type: &str) -> bool {
        self.lock().remove(fact_type).is_some()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// 命中缓存直接返回，否则向后端查询并写入缓存
    pub async fn get(
        &self,
        api: &ApiClient,
        fact_type: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<FactSchema, ApiError> {
        if let Some(hit) = self.cached(fact_type) {
            debug!("fact schema cache hit [{}]", fact_type);
            return Ok(hit);
        }
        let schema = api.get_fact_schema(fact_type, cancel).await?;
        self.insert(schema.clone());
        Ok(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::dto::FactField;
    use std::time::Duration;

    fn schema(name: &str) -> FactSchema {
        FactSchema {
            fact_type: name.to_string(),
            fields: vec![FactField {
                name: "age".to_string(),
                field_type: Some("int".to_string()),
                required: true,
            }],
        }
    }

    #[test]
    fn caches_are_isolated_per_instance() {
        let a = FactSchemaCache::new();
        let b = FactSchemaCache::new();
        a.insert(schema("Customer"));
        assert_eq!(a.len(), 1);
        assert!(b.is_empty());
        assert!(a.invalidate("Customer"));
        assert!(!a.invalidate("Customer"));
    }

    #[tokio::test]
    async fn cached_entry_skips_network() {
        let cache = FactSchemaCache::new();
        cache.insert(schema("Customer"));
        // 不可达地址：若发起请求会失败
        let api = ApiClient::with_base_url("http://127.0.0.1:9", Duration::from_millis(200)).unwrap();
        let got = cache.get(&api, "Customer", None).await.unwrap();
        assert_eq!(got.field_names(), vec!["age".to_string()]);
    }
}
