use crate::domain::model::{Product, LISTING_ITEM_TYPE};

const RELEVANCE_WEIGHT: f64 = 4.0;
const RATING_WEIGHT: f64 = 1.2;
const PRICE_WEIGHT: f64 = 1.3;
const SHIPPING_BONUS: f64 = 0.5;

/// 最理想的價格落在預算的 70%
const PRICE_TARGET_RATIO: f64 = 0.7;

/// 預算達到這個金額才啟用最低價格門檻
const PRICE_FLOOR_MIN_BUDGET: u64 = 10_000;
const PRICE_FLOOR_ABSOLUTE: u64 = 500;
const PRICE_FLOOR_RATIO: f64 = 0.25;

/// 單次推薦呼叫內共用的評分器
#[derive(Debug, Clone)]
pub struct Scorer {
    tokens: Vec<String>,
    max_price_jpy: Option<u64>,
    min_seller_rating: f64,
}

impl Scorer {
    pub fn new(tokens: Vec<String>, max_price_jpy: Option<u64>, min_seller_rating: f64) -> Self {
        Self {
            tokens,
            // 預算為 0 視同沒有設定
            max_price_jpy: max_price_jpy.filter(|&price| price > 0),
            min_seller_rating,
        }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn max_price_jpy(&self) -> Option<u64> {
        self.max_price_jpy
    }

    /// 高預算時過濾掉明顯過低（多半是配件或誤植）的商品
    fn price_floor(&self) -> Option<u64> {
        let max_price = self.max_price_jpy?;
        if max_price < PRICE_FLOOR_MIN_BUDGET {
            return None;
        }
        let ratio_floor = (max_price as f64 * PRICE_FLOOR_RATIO) as u64;
        Some(PRICE_FLOOR_ABSOLUTE.max(ratio_floor))
    }

    pub fn passes_filters(&self, product: &Product) -> bool {
        if product.item_type != LISTING_ITEM_TYPE {
            return false;
        }
        if let Some(max_price) = self.max_price_jpy {
            if product.price_jpy > max_price {
                return false;
            }
        }
        if let Some(floor) = self.price_floor() {
            if product.price_jpy < floor {
                return false;
            }
        }
        product.seller_rating.unwrap_or(0.0) >= self.min_seller_rating
    }

    /// 商品名稱中出現的 token 比例，介於 0 與 1 之間
    pub fn relevance(&self, name: &str) -> f64 {
        if self.tokens.is_empty() {
            return 0.0;
        }
        let name = name.to_lowercase();
        let hits = self
            .tokens
            .iter()
            .filter(|token| !token.is_empty() && name.contains(token.as_str()))
            .count();
        hits as f64 / self.tokens.len() as f64
    }

    pub fn price_score(&self, price_jpy: u64) -> f64 {
        let Some(max_price) = self.max_price_jpy else {
            return 0.0;
        };
        let target = (max_price as f64 * PRICE_TARGET_RATIO).max(1.0);
        let diff = (price_jpy as f64 - target).abs();
        (1.0 - diff / target).max(0.0)
    }

    pub fn shallow_score(&self, product: &Product) -> f64 {
        let relevance = self.relevance(&product.name);
        let rating = product.seller_rating.unwrap_or(0.0);
        let price_score = self.price_score(product.price_jpy);
        relevance * RELEVANCE_WEIGHT + rating * RATING_WEIGHT + price_score * PRICE_WEIGHT
    }

    pub fn deep_score(&self, product: &Product) -> f64 {
        let shipping_bonus = if product.shipping_fee_included() {
            SHIPPING_BONUS
        } else {
            0.0
        };
        self.shallow_score(product) + shipping_bonus
    }
}

/// 依分數由高到低穩定排序，同分保留原本順序
pub fn rank_by<F>(products: Vec<Product>, score: F) -> Vec<Product>
where
    F: Fn(&Product) -> f64,
{
    let mut scored: Vec<(f64, Product)> = products
        .into_iter()
        .map(|product| (score(&product), product))
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().map(|(_, product)| product).collect()
}
