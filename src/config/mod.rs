#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

use crate::domain::model::SearchCandidate;
use crate::utils::error::Result;
use crate::utils::validation::{validate_positive_number, validate_range, Validate};
use std::time::Duration;

pub const DEFAULT_MAX_SHALLOW: usize = 120;
pub const DEFAULT_MAX_CANDIDATES: usize = 60;
pub const DEFAULT_MAX_RETURN: usize = 10;
pub const DEFAULT_MIN_SELLER_RATING: f64 = 0.0;

/// 推薦流程的調整參數，每次建立 service 時傳入
#[derive(Debug, Clone, PartialEq)]
pub struct RecommenderConfig {
    /// 每個搜尋條件最多取回的筆數
    pub max_shallow: usize,
    /// 篩選後送去抓詳細資料的筆數
    pub max_candidates: usize,
    /// 最終回傳的筆數
    pub max_return: usize,
    pub min_seller_rating: f64,
    pub max_price_jpy: Option<u64>,
    pub search_timeout: Option<Duration>,
    pub enrich_timeout: Option<Duration>,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            max_shallow: DEFAULT_MAX_SHALLOW,
            max_candidates: DEFAULT_MAX_CANDIDATES,
            max_return: DEFAULT_MAX_RETURN,
            min_seller_rating: DEFAULT_MIN_SELLER_RATING,
            max_price_jpy: None,
            search_timeout: None,
            enrich_timeout: None,
        }
    }
}

impl RecommenderConfig {
    pub fn with_max_price(mut self, max_price_jpy: Option<u64>) -> Self {
        self.max_price_jpy = max_price_jpy;
        self
    }

    pub fn with_timeouts(
        mut self,
        search_timeout: Option<Duration>,
        enrich_timeout: Option<Duration>,
    ) -> Self {
        self.search_timeout = search_timeout;
        self.enrich_timeout = enrich_timeout;
        self
    }
}

impl Validate for RecommenderConfig {
    fn validate(&self) -> Result<()> {
        validate_positive_number("ranking.max_shallow", self.max_shallow, 1)?;
        validate_positive_number("ranking.max_candidates", self.max_candidates, 1)?;
        validate_positive_number("ranking.max_return", self.max_return, 1)?;
        validate_range("ranking.min_seller_rating", self.min_seller_rating, 0.0, 5.0)?;
        Ok(())
    }
}

/// 所有搜尋條件中最嚴格（最小）的價格上限
pub fn global_max_price<'a, I>(candidates: I) -> Option<u64>
where
    I: IntoIterator<Item = &'a SearchCandidate>,
{
    candidates
        .into_iter()
        .filter_map(|candidate| candidate.max_price)
        .min()
}

/// 設定檔與搜尋條件的上限取較嚴格者；0 視同沒有設定
pub fn effective_max_price(configured: Option<u64>, requested: Option<u64>) -> Option<u64> {
    configured
        .into_iter()
        .chain(requested)
        .filter(|&price| price > 0)
        .min()
}
