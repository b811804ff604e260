use super::entity::{self, ActiveModel as DraftActiveModel, Entity as Draft};
use super::DraftError;
use chrono::Utc;
use log::{debug, info};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// 草稿超过该时长视为过期
pub const DRAFT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// 编辑器草稿的本地存储，按实体类型和 id 分键
#[derive(Clone)]
pub struct DraftStore {
    db: DatabaseConnection,
    ttl: Duration,
}

impl DraftStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db, ttl: DRAFT_TTL }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn key(entity_kind: &str, entity_id: &str) -> String {
        format!("{}:{}", entity_kind, entity_id)
    }

    pub async fn save<T: Serialize>(
        &self,
        entity_kind: &str,
        entity_id: &str,
        draft: &T,
    ) -> Result<(), DraftError> {
        self.save_at(entity_kind, entity_id, draft, Utc::now().timestamp())
            .await
    }

    async fn save_at<T: Serialize>(
        &self,
        entity_kind: &str,
        entity_id: &str,
        draft: &T,
        saved_at: i64,
    ) -> Result<(), DraftError> {
        let payload = serde_json::to_string(draft)?;
        let model = DraftActiveModel {
            key: Set(Self::key(entity_kind, entity_id)),
            entity_kind: Set(entity_kind.to_string()),
            entity_id: Set(entity_id.to_string()),
            payload: Set(payload),
            saved_at: Set(saved_at),
        };
        Draft::insert(model)
            .on_conflict(
                OnConflict::column(entity::Column::Key)
                    .update_columns([entity::Column::Payload, entity::Column::SavedAt])
                    .to_owned(),
            )
            .exec(&self.db)
            .await?;
        debug!("草稿已保存 [{}:{}]", entity_kind, entity_id);
        Ok(())
    }

    /// 读取草稿；过期条目会被删除并返回 `None`
    pub async fn load<T: DeserializeOwned>(
        &self,
        entity_kind: &str,
        entity_id: &str,
    ) -> Result<Option<T>, DraftError> {
        let key = Self::key(entity_kind, entity_id);
        let Some(model) = Draft::find_by_id(key.clone()).one(&self.db).await? else {
            return Ok(None);
        };
        if model.saved_at < self.cutoff() {
            Draft::delete_by_id(key).exec(&self.db).await?;
            info!("丢弃过期草稿 [{}:{}]", entity_kind, entity_id);
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&model.payload)?))
    }

    pub async fn clear(&self, entity_kind: &str, entity_id: &str) -> Result<bool, DraftError> {
        let res = Draft::delete_by_id(Self::key(entity_kind, entity_id))
            .exec(&self.db)
            .await?;
        Ok(res.rows_affected > 0)
    }

    /// 删除全部过期草稿，返回删除条数
    pub async fn purge_stale(&self) -> Result<u64, DraftError> {
        let res = Draft::delete_many()
            .filter(entity::Column::SavedAt.lt(self.cutoff()))
            .exec(&self.db)
            .await?;
        if res.rows_affected > 0 {
            info!("已清理 {} 条过期草稿", res.rows_affected);
        }
        Ok(res.rows_affected)
    }

    fn cutoff(&self) -> i64 {
        Utc::now().timestamp() - self.ttl.as_secs() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drafts::establish_connection;
    use serde_json::{json, Value};

    async fn store() -> DraftStore {
        let db = establish_connection("sqlite::memory:").await.unwrap();
        DraftStore::new(db)
    }

    #[tokio::test]
    async fn save_then_load_and_overwrite() {
        let store = store().await;
        store
            .save("scenario", "42", &json!({"name": "first"}))
            .await
            .unwrap();
        store
            .save("scenario", "42", &json!({"name": "second"}))
            .await
            .unwrap();
        let got: Option<Value> = store.load("scenario", "42").await.unwrap();
        assert_eq!(got, Some(json!({"name": "second"})));

        let other: Option<Value> = store.load("rule", "42").await.unwrap();
        assert_eq!(other, None);
    }

    #[tokio::test]
    async fn stale_draft_is_dropped_on_load() {
        let store = store().await;
        let old = Utc::now().timestamp() - 25 * 60 * 60;
        store
            .save_at("scenario", "7", &json!({"name": "old"}), old)
            .await
            .unwrap();
        let got: Option<Value> = store.load("scenario", "7").await.unwrap();
        assert_eq!(got, None);
        // 已被删除
        assert!(!store.clear("scenario", "7").await.unwrap());
    }

    #[tokio::test]
    async fn purge_removes_only_stale_entries() {
        let store = store().await;
        let old = Utc::now().timestamp() - 48 * 60 * 60;
        store.save_at("scenario", "1", &json!(1), old).await.unwrap();
        store.save_at("scenario", "2", &json!(2), old).await.unwrap();
        store.save("scenario", "3", &json!(3)).await.unwrap();

        assert_eq!(store.purge_stale().await.unwrap(), 2);
        let fresh: Option<i64> = store.load("scenario", "3").await.unwrap();
        assert_eq!(fresh, Some(3));
    }

    #[tokio::test]
    async fn clear_reports_whether_a_draft_existed() {
        let store = store().await;
        store.save("rule", "a", &json!({})).await.unwrap();
        assert!(store.clear("rule", "a").await.unwrap());
        assert!(!store.clear("rule", "a").await.unwrap());
    }
}
