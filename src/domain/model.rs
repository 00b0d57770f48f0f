use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 市集上一般出品的 item type，其他類型（商店商品等）不參與推薦
pub const LISTING_ITEM_TYPE: &str = "ITEM_TYPE_MERCARI";

const LISTING_URL_BASE: &str = "https://jp.mercari.com/item";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShippingPreference {
    SellerPays,
    BuyerPays,
    #[default]
    Any,
}

impl ShippingPreference {
    /// 寬鬆解析：無法辨識的值一律視為 `Any`
    pub fn parse_lenient(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("seller_pays") => ShippingPreference::SellerPays,
            Some("buyer_pays") => ShippingPreference::BuyerPays,
            _ => ShippingPreference::Any,
        }
    }
}

/// 一組搜尋條件（關鍵字 + 選填的篩選）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCandidate {
    pub query_text: String,
    pub min_price: Option<u64>,
    pub max_price: Option<u64>,
    #[serde(default)]
    pub shipping_preference: ShippingPreference,
    pub location: Option<String>,
    pub brand: Option<String>,
}

impl SearchCandidate {
    pub fn new(query_text: impl Into<String>) -> Self {
        Self {
            query_text: query_text.into().trim().to_string(),
            min_price: None,
            max_price: None,
            shipping_preference: ShippingPreference::Any,
            location: None,
            brand: None,
        }
    }

    pub fn with_price_range(mut self, min_price: Option<u64>, max_price: Option<u64>) -> Self {
        self.min_price = min_price;
        self.max_price = max_price;
        self
    }

    pub fn with_shipping(mut self, preference: ShippingPreference) -> Self {
        self.shipping_preference = preference;
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = non_blank(location.into());
        self
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = non_blank(brand.into());
        self
    }

    pub fn is_well_formed(&self) -> bool {
        !self.query_text.trim().is_empty()
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// 批次搜尋回傳的原始結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub name: String,
    pub price_jpy: u64,
    pub item_type: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellerProfile {
    pub star_rating_score: f64,
    pub num_sell_items: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingDuration {
    pub min_days: Option<u32>,
    pub max_days: Option<u32>,
}

/// 單一商品詳細頁的資料
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemDetail {
    pub seller: Option<SellerProfile>,
    pub condition_label: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub shipping_payer_code: Option<String>,
    pub shipping_duration: Option<ShippingDuration>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub attributes: Option<BTreeMap<String, String>>,
}

impl ItemDetail {
    pub fn seller_pays_shipping(&self) -> bool {
        self.shipping_payer_code.as_deref() == Some("seller")
    }
}

/// 詳細資料合併後才有的欄位
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    pub description: Option<String>,
    pub category: Option<String>,
    pub attributes: Option<BTreeMap<String, String>>,
    pub shipping_fee_included: bool,
    pub shipping_days_min: Option<u32>,
    pub shipping_days_max: Option<u32>,
}

/// 推薦流程中的商品。`enrichment` 為 `Some` 時即為完整商品。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price_jpy: u64,
    pub item_type: String,
    pub seller_rating: Option<f64>,
    pub seller_sales_count: Option<u64>,
    pub condition_label: Option<String>,
    pub url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub enrichment: Option<Enrichment>,
}

impl From<&SearchHit> for Product {
    fn from(hit: &SearchHit) -> Self {
        Self {
            id: hit.id.clone(),
            name: hit.name.clone(),
            price_jpy: hit.price_jpy,
            item_type: hit.item_type.clone(),
            // 賣家與商品狀態要等詳細資料才會有
            seller_rating: None,
            seller_sales_count: None,
            condition_label: None,
            url: None,
            created_at: hit.created_at,
            enrichment: None,
        }
    }
}

impl Product {
    pub fn is_enriched(&self) -> bool {
        self.enrichment.is_some()
    }

    pub fn shipping_fee_included(&self) -> bool {
        self.enrichment
            .as_ref()
            .is_some_and(|e| e.shipping_fee_included)
    }

    pub fn listing_url(&self) -> Option<String> {
        if let Some(url) = &self.url {
            return Some(url.clone());
        }
        if !self.id.is_empty() && self.item_type == LISTING_ITEM_TYPE {
            return Some(format!("{}/{}", LISTING_URL_BASE, self.id));
        }
        None
    }

    /// 輸出前補上公開網址
    pub fn with_listing_url(mut self) -> Self {
        self.url = self.listing_url();
        self
    }
}
