pub mod client;
pub mod dto;
pub mod error;
pub mod pagination;
pub mod schema;
pub mod urls;

pub use client::ApiClient;
pub use error::ApiError;
pub use pagination::{paginate, Page};
pub use schema::FactSchemaCache;
