use crate::config::{effective_max_price, global_max_price, RecommenderConfig};
use crate::core::recommender::RecommendationService;
use crate::domain::model::{Product, SearchCandidate, ShippingPreference};
use crate::domain::ports::MarketplaceClient;
use crate::utils::error::Result;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const TOOL_NAME: &str = "get_recommendations";

/// `get_recommendations` 工具呼叫的參數
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolArguments {
    #[serde(default)]
    pub candidates: Vec<CandidatePayload>,
}

/// LLM 產生的單一搜尋條件，欄位都可能缺漏或型別錯誤
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidatePayload {
    #[serde(default)]
    pub keywords: Option<Value>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub product_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient_price")]
    pub min_price_jpy: Option<u64>,
    #[serde(default, deserialize_with = "lenient_price")]
    pub max_price_jpy: Option<u64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub shipping_preference: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub brand: Option<String>,
}

/// 價格可能是整數、浮點數或字串；負數與無法辨識的值視為沒有限制
fn price_from_value(value: &Value) -> Option<u64> {
    let as_price = |price: f64| (price.is_finite() && price >= 0.0).then(|| price.round() as u64);
    match value {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().and_then(as_price)),
        Value::String(text) => {
            let text = text.trim();
            text.parse::<u64>()
                .ok()
                .or_else(|| text.parse::<f64>().ok().and_then(as_price))
        }
        _ => None,
    }
}

fn lenient_price<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(price_from_value))
}

/// 非字串的值直接忽略，不讓整個工具呼叫失敗
fn lenient_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(text)) => Some(text),
        _ => None,
    })
}

impl CandidatePayload {
    /// keywords 不是非空字串時回傳 `None`
    pub fn to_candidate(&self) -> Option<SearchCandidate> {
        let keywords = self.keywords.as_ref()?.as_str()?.trim();
        if keywords.is_empty() {
            return None;
        }

        let mut candidate = SearchCandidate::new(keywords)
            .with_price_range(self.min_price_jpy, self.max_price_jpy)
            .with_shipping(ShippingPreference::parse_lenient(
                self.shipping_preference.as_deref(),
            ));
        if let Some(location) = &self.location {
            candidate = candidate.with_location(location.as_str());
        }
        if let Some(brand) = &self.brand {
            candidate = candidate.with_brand(brand.as_str());
        }
        Some(candidate)
    }
}

impl ToolArguments {
    /// 解析失敗時記錄警告並視為沒有搜尋條件
    pub fn parse_lenient(arguments: &str) -> Self {
        match serde_json::from_str(arguments) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("⚠️ Failed to parse tool arguments: {}, using empty candidates", e);
                Self::default()
            }
        }
    }

    pub fn search_candidates(&self) -> Vec<SearchCandidate> {
        self.candidates
            .iter()
            .filter_map(CandidatePayload::to_candidate)
            .collect()
    }

    /// 全部 payload 中最嚴格的價格上限（包含 keywords 無效的 payload）
    pub fn global_max_price(&self) -> Option<u64> {
        self.candidates.iter().filter_map(|c| c.max_price_jpy).min()
    }
}

/// 執行一次推薦工具呼叫，回傳給對話層的 JSON 陣列
pub async fn run_recommendation_tool<C: MarketplaceClient>(
    client: C,
    base_config: RecommenderConfig,
    arguments: &str,
    user_query: &str,
) -> Result<serde_json::Value> {
    let args = ToolArguments::parse_lenient(arguments);
    let candidates = args.search_candidates();
    if candidates.is_empty() {
        tracing::info!("No valid candidates in {} call", TOOL_NAME);
        return Ok(serde_json::Value::Array(Vec::new()));
    }

    let bound = effective_max_price(base_config.max_price_jpy, args.global_max_price());
    let config = base_config.with_max_price(bound);
    let products = recommend_for(client, config, &candidates, user_query).await?;
    serialize_products(products)
}

/// 以設定與搜尋條件中較嚴格的價格上限建立 service 並執行推薦
pub async fn recommend_for<C: MarketplaceClient>(
    client: C,
    config: RecommenderConfig,
    candidates: &[SearchCandidate],
    user_query: &str,
) -> Result<Vec<Product>> {
    let bound = effective_max_price(config.max_price_jpy, global_max_price(candidates));
    let config = config.with_max_price(bound);
    RecommendationService::new(client, config)
        .recommend(candidates, user_query)
        .await
}

/// 轉成 JSON，並補上公開網址
pub fn serialize_products(products: Vec<Product>) -> Result<serde_json::Value> {
    let with_urls: Vec<Product> = products.into_iter().map(Product::with_listing_url).collect();
    Ok(serde_json::to_value(with_urls)?)
}
