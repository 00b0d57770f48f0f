use crate::domain::model::{SearchCandidate, ShippingPreference};
use crate::utils::error::{RecommendError, Result};
use crate::utils::validation::Validate;
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "mercari-recommender")]
#[command(about = "Search Mercari Japan and rank listings for a shopping request")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Search keywords; repeat for alternative candidates
    #[arg(short, long = "query")]
    pub queries: Vec<String>,

    #[arg(long)]
    pub min_price: Option<u64>,

    #[arg(long)]
    pub max_price: Option<u64>,

    /// seller_pays, buyer_pays or any
    #[arg(long)]
    pub shipping: Option<String>,

    #[arg(long)]
    pub location: Option<String>,

    #[arg(long)]
    pub brand: Option<String>,

    /// Original user request, used for relevance scoring
    #[arg(long, default_value = "")]
    pub context: String,

    /// Raw get_recommendations tool arguments (JSON) instead of --query
    #[arg(long, conflicts_with = "queries")]
    pub tool_args: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,
}

impl CliConfig {
    /// 由命令列參數組出搜尋條件，每個 --query 共用同一組篩選
    pub fn candidates(&self) -> Vec<SearchCandidate> {
        let shipping = ShippingPreference::parse_lenient(self.shipping.as_deref());
        self.queries
            .iter()
            .map(|query| {
                let mut candidate = SearchCandidate::new(query.as_str())
                    .with_price_range(self.min_price, self.max_price)
                    .with_shipping(shipping);
                if let Some(location) = &self.location {
                    candidate = candidate.with_location(location.as_str());
                }
                if let Some(brand) = &self.brand {
                    candidate = candidate.with_brand(brand.as_str());
                }
                candidate
            })
            .collect()
    }

    /// 沒有給 --context 時以所有關鍵字代替
    pub fn context_text(&self) -> String {
        if self.context.trim().is_empty() {
            self.queries.join(" ")
        } else {
            self.context.clone()
        }
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        if self.queries.is_empty() && self.tool_args.is_none() {
            return Err(RecommendError::MissingConfigError {
                field: "--query or --tool-args".to_string(),
            });
        }
        if let Some(shipping) = &self.shipping {
            if !matches!(shipping.trim().to_ascii_lowercase().as_str(), "seller_pays" | "buyer_pays" | "any") {
                return Err(RecommendError::ConfigError {
                    message: format!(
                        "Unknown --shipping '{}', expected seller_pays, buyer_pays or any",
                        shipping
                    ),
                });
            }
        }
        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                return Err(RecommendError::InvalidConfigValueError {
                    field: "--min-price".to_string(),
                    value: min.to_string(),
                    reason: format!("must not exceed --max-price ({})", max),
                });
            }
        }
        Ok(())
    }
}
