pub mod recommender;
pub mod scoring;
pub mod tokenizer;

pub use crate::domain::model::{Product, SearchCandidate, SearchHit};
pub use crate::domain::ports::MarketplaceClient;
pub use crate::utils::error::Result;
