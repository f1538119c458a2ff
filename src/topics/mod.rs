// Topic modeling — text normalization, embedding, reduction, clustering,
// and class-based keyword extraction.

pub mod cluster;
pub mod ctfidf;
pub mod embeddings;
pub mod hashing;
pub mod model;
pub mod normalize;
pub mod reduce;
pub mod registry;
pub mod traits;
