pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliConfig;

pub use adapters::{MercariClient, MercariClientConfig};
pub use app::recommend_tool::{run_recommendation_tool, serialize_products, ToolArguments};
pub use config::{toml_config::TomlConfig, RecommenderConfig};
pub use core::recommender::{EnrichmentOutcome, RecommendationService};
pub use domain::model::{Product, SearchCandidate, ShippingPreference};
pub use domain::ports::MarketplaceClient;
pub use utils::error::{RecommendError, Result};
