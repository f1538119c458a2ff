// Topic representation — turning raw c-TF-IDF keywords into something a
// person wants to read, with an ordered fallback chain of strategies.

pub mod baseline;
pub mod chain;
pub mod keybert;
pub mod openai;
pub mod traits;

pub use chain::{Enhancement, Enhancer};
pub use traits::RepresentationStrategy;
