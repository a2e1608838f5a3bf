//! ABOUTME: Hybrid retrieval engine for ragserve
//! ABOUTME: Query embedding, parallel vector + keyword arms, score fusion, fallback

pub mod embedding;
pub mod hybrid;
pub mod keyword;
pub mod vector;

pub use embedding::LocalHashEmbedder;
pub use hybrid::{
    HybridConfig, HybridSearchOutcome, HybridSearchService, KeywordSearcher, SearchMode,
    VectorSearcher,
};
pub use keyword::KeywordSearchService;
pub use vector::VectorSearchService;
