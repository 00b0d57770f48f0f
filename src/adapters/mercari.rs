use crate::domain::model::{
    ItemDetail, SearchCandidate, SearchHit, SellerProfile, ShippingDuration, ShippingPreference,
};
use crate::domain::ports::MarketplaceClient;
use crate::utils::error::{RecommendError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_url, Validate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://api.mercari.jp/v2/entities:search";
pub const DEFAULT_ITEM_ENDPOINT: &str = "https://api.mercari.jp/items/get";

const STATUS_ON_SALE: &str = "STATUS_ON_SALE";
const SHIPPING_PAYER_BUYER: u8 = 1;
const SHIPPING_PAYER_SELLER: u8 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MercariClientConfig {
    pub search_endpoint: String,
    pub item_endpoint: String,
    /// 額外的 request header（例如 DPoP 驗證）
    pub headers: HashMap<String, String>,
    pub timeout_seconds: Option<u64>,
}

impl Default for MercariClientConfig {
    fn default() -> Self {
        Self {
            search_endpoint: DEFAULT_SEARCH_ENDPOINT.to_string(),
            item_endpoint: DEFAULT_ITEM_ENDPOINT.to_string(),
            headers: HashMap::new(),
            timeout_seconds: Some(15),
        }
    }
}

impl Validate for MercariClientConfig {
    fn validate(&self) -> Result<()> {
        validate_url("marketplace.search_endpoint", &self.search_endpoint)?;
        validate_url("marketplace.item_endpoint", &self.item_endpoint)?;
        for name in self.headers.keys() {
            validate_non_empty_string("marketplace.headers", name)?;
        }
        Ok(())
    }
}

/// 透過 HTTP 存取 Mercari API 的 client
pub struct MercariClient {
    config: MercariClientConfig,
    client: Client,
}

impl MercariClient {
    pub fn new(config: MercariClientConfig) -> Result<Self> {
        let mut builder = Client::builder().default_headers(build_headers(&config.headers)?);
        if let Some(timeout) = config.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(timeout));
        }
        let client = builder.build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &MercariClientConfig {
        &self.config
    }
}

fn build_headers(headers: &HashMap<String, String>) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for (key, value) in headers {
        let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
            RecommendError::InvalidConfigValueError {
                field: "marketplace.headers".to_string(),
                value: key.clone(),
                reason: format!("Invalid header name: {}", e),
            }
        })?;
        let value = HeaderValue::from_str(value).map_err(|e| {
            RecommendError::InvalidConfigValueError {
                field: format!("marketplace.headers.{}", key),
                value: value.clone(),
                reason: format!("Invalid header value: {}", e),
            }
        })?;
        map.insert(name, value);
    }
    Ok(map)
}

/// 地點與品牌併入關鍵字，API 沒有對應的文字篩選
pub fn build_keyword(candidate: &SearchCandidate) -> String {
    let mut keyword = candidate.query_text.clone();
    if let Some(location) = &candidate.location {
        keyword.push(' ');
        keyword.push_str(location);
    }
    if let Some(brand) = &candidate.brand {
        if !keyword.to_lowercase().contains(&brand.to_lowercase()) {
            keyword.push(' ');
            keyword.push_str(brand);
        }
    }
    keyword
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequestBody {
    page_size: usize,
    page_token: String,
    index_routing: &'static str,
    search_condition: SearchCondition,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchCondition {
    keyword: String,
    exclude_keyword: String,
    sort: &'static str,
    order: &'static str,
    status: Vec<&'static str>,
    price_min: u64,
    price_max: u64,
    shipping_payer_id: Vec<u8>,
}

impl SearchRequestBody {
    fn from_candidate(candidate: &SearchCandidate, limit: usize) -> Self {
        let shipping_payer_id = match candidate.shipping_preference {
            ShippingPreference::SellerPays => vec![SHIPPING_PAYER_SELLER],
            ShippingPreference::BuyerPays => vec![SHIPPING_PAYER_BUYER],
            ShippingPreference::Any => Vec::new(),
        };

        Self {
            page_size: limit,
            page_token: String::new(),
            index_routing: "INDEX_ROUTING_UNSPECIFIED",
            search_condition: SearchCondition {
                keyword: build_keyword(candidate),
                exclude_keyword: String::new(),
                sort: "SORT_SCORE",
                order: "ORDER_DESC",
                // 只搜尋販售中的商品
                status: vec![STATUS_ON_SALE],
                // 0 代表不限制
                price_min: candidate.min_price.unwrap_or(0),
                price_max: candidate.max_price.unwrap_or(0),
                shipping_payer_id,
            },
        }
    }
}

/// API 有時把數字包成字串回傳
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Numeric {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Numeric {
    fn as_u64(&self) -> Option<u64> {
        match self {
            Numeric::Integer(n) => u64::try_from(*n).ok(),
            Numeric::Float(f) if *f >= 0.0 && f.is_finite() => Some(*f as u64),
            Numeric::Float(_) => None,
            Numeric::Text(s) => s.trim().parse().ok(),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Numeric::Integer(n) => Some(*n as f64),
            Numeric::Float(f) => Some(*f),
            Numeric::Text(s) => s.trim().parse().ok(),
        }
    }

    fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        let seconds = i64::try_from(self.as_u64()?).ok()?;
        DateTime::from_timestamp(seconds, 0)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<WireSearchItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSearchItem {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    price: Option<Numeric>,
    #[serde(default)]
    item_type: String,
    created: Option<Numeric>,
}

impl WireSearchItem {
    fn into_hit(self) -> Option<SearchHit> {
        let Some(price_jpy) = self.price.as_ref().and_then(Numeric::as_u64) else {
            tracing::debug!("Skipping search item {} without a usable price", self.id);
            return None;
        };
        Some(SearchHit {
            created_at: self.created.as_ref().and_then(Numeric::as_timestamp),
            id: self.id,
            name: self.name,
            price_jpy,
            item_type: self.item_type,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ItemResponse {
    result: Option<String>,
    data: Option<WireItemDetail>,
}

#[derive(Debug, Deserialize)]
struct WireNamed {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireSeller {
    star_rating_score: Option<Numeric>,
    num_sell_items: Option<Numeric>,
}

#[derive(Debug, Deserialize)]
struct WireShippingPayer {
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireShippingDuration {
    min_days: Option<u32>,
    max_days: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct WireAttribute {
    name: Option<String>,
    #[serde(default)]
    values: Vec<WireNamed>,
}

#[derive(Debug, Deserialize)]
struct WireItemDetail {
    seller: Option<WireSeller>,
    item_condition: Option<WireNamed>,
    created: Option<Numeric>,
    shipping_payer: Option<WireShippingPayer>,
    shipping_duration: Option<WireShippingDuration>,
    item_category: Option<WireNamed>,
    description: Option<String>,
    #[serde(default)]
    item_attributes: Vec<WireAttribute>,
}

impl From<WireItemDetail> for ItemDetail {
    fn from(wire: WireItemDetail) -> Self {
        let attributes: BTreeMap<String, String> = wire
            .item_attributes
            .into_iter()
            .filter_map(|attribute| {
                let name = attribute.name?;
                let values: Vec<String> =
                    attribute.values.into_iter().filter_map(|v| v.name).collect();
                (!values.is_empty()).then(|| (name, values.join(", ")))
            })
            .collect();

        ItemDetail {
            seller: wire.seller.map(|seller| SellerProfile {
                star_rating_score: seller
                    .star_rating_score
                    .as_ref()
                    .and_then(Numeric::as_f64)
                    .unwrap_or(0.0),
                num_sell_items: seller
                    .num_sell_items
                    .as_ref()
                    .and_then(Numeric::as_u64)
                    .unwrap_or(0),
            }),
            condition_label: wire.item_condition.and_then(|c| c.name),
            created_at: wire.created.as_ref().and_then(Numeric::as_timestamp),
            shipping_payer_code: wire.shipping_payer.and_then(|p| p.code),
            shipping_duration: wire.shipping_duration.map(|d| ShippingDuration {
                min_days: d.min_days,
                max_days: d.max_days,
            }),
            category: wire.item_category.and_then(|c| c.name),
            description: wire.description,
            attributes: (!attributes.is_empty()).then_some(attributes),
        }
    }
}

#[async_trait]
impl MarketplaceClient for MercariClient {
    async fn search(&self, candidate: &SearchCandidate, limit: usize) -> Result<Vec<SearchHit>> {
        let body = SearchRequestBody::from_candidate(candidate, limit);
        tracing::debug!(
            "Making search request to: {} (keyword: {})",
            self.config.search_endpoint,
            body.search_condition.keyword
        );

        let response = self
            .client
            .post(&self.config.search_endpoint)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        tracing::debug!("Search response status: {}", status);
        if !status.is_success() {
            return Err(RecommendError::HttpStatusError {
                status: status.as_u16(),
                endpoint: self.config.search_endpoint.clone(),
            });
        }

        let payload: SearchResponse =
            response
                .json()
                .await
                .map_err(|e| RecommendError::DecodeError {
                    message: format!("search response: {}", e),
                })?;

        Ok(payload
            .items
            .into_iter()
            .filter_map(WireSearchItem::into_hit)
            .take(limit)
            .collect())
    }

    async fn enrich(&self, hit: &SearchHit) -> Result<Option<ItemDetail>> {
        let response = self
            .client
            .get(&self.config.item_endpoint)
            .query(&[("id", hit.id.as_str())])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(RecommendError::HttpStatusError {
                status: status.as_u16(),
                endpoint: self.config.item_endpoint.clone(),
            });
        }

        let payload: ItemResponse =
            response
                .json()
                .await
                .map_err(|e| RecommendError::DecodeError {
                    message: format!("item {}: {}", hit.id, e),
                })?;

        if payload.result.as_deref() != Some("OK") {
            tracing::debug!("Item {} returned result {:?}", hit.id, payload.result);
            return Ok(None);
        }
        Ok(payload.data.map(ItemDetail::from))
    }
}
