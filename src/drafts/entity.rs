use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "drafts")]
pub struct Model {
    /// `{entity_kind}:{entity_id}`
    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String,
    pub entity_kind: String,
    pub entity_id: String,
    pub payload: String,
    /// unix 秒
    pub saved_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
