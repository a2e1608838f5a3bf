//! ABOUTME: Tenant-scoped backend adapters for ragserve
//! ABOUTME: Embedded relational, flat vector index, filesystem objects, keyword index, cache

pub mod cache;
pub mod keyword;
pub mod object;
pub mod relational;
pub mod retry;
pub mod vector;

pub use cache::MemoryCache;
#[cfg(feature = "postgres")]
pub use relational::postgres::PostgresRelational;
pub use keyword::MemoryKeywordIndex;
pub use object::FsObjectStore;
pub use relational::memory::MemoryRelational;
pub use retry::{with_backoff, RetryPolicy};
pub use vector::FlatVectorIndex;
