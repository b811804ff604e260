pub mod error;
pub mod ingest;
pub mod mapping;
pub mod model;
pub mod parser;
pub mod sanitizer;
pub mod validator;

pub use error::DatasetError;
pub use ingest::{upload_file, DatasetIngestor, IngestOptions, UploadError};
pub use mapping::{apply_mappings, suggest_mappings, MappingError};
pub use model::{Dataset, DatasetFormat, DatasetPayload, FieldMapping, Record, TransformationType};
pub use sanitizer::sanitize_input;
pub use validator::IngestLimits;
