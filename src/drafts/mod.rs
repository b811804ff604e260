pub mod connection;
pub mod entity;
pub mod store;

pub use connection::establish_connection;
pub use store::{DraftStore, DRAFT_TTL};

#[derive(thiserror::Error, Debug)]
pub enum DraftError {
    #[error("draft storage error: {0}")]
    Db(#[from] sea_orm::DbErr),
    #[error("draft payload is not valid JSON: {0}")]
    Payload(#[from] serde_json::Error),
}
