//! ABOUTME: Backend capability traits implemented by the storage adapters
//! ABOUTME: Relational stores, vector index, object store, keyword index, cache, sinks

pub mod cache;
pub mod embedding;
pub mod keyword;
pub mod object;
pub mod relational;
pub mod sinks;
pub mod tool;
pub mod vector;

pub use cache::CacheStore;
pub use embedding::EmbeddingModel;
pub use keyword::{KeywordDocument, KeywordFilter, KeywordIndex};
pub use object::{bucket_name, validate_bucket_name, ObjectStore};
pub use relational::{
    ApiKeyStore, AuditStore, DocumentFilter, DocumentStore, MemoryStore, Repositories,
    TemplateStore, TenantStore, UserStore,
};
pub use sinks::{ToolTrace, TraceSink};
pub use tool::ToolHandler;
pub use vector::{DistanceMetric, VectorIndex};
