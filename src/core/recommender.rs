use crate::config::RecommenderConfig;
use crate::core::scoring::{rank_by, Scorer};
use crate::core::tokenizer::tokenize;
use crate::domain::model::{Enrichment, ItemDetail, Product, SearchCandidate, SearchHit};
use crate::domain::ports::MarketplaceClient;
use crate::utils::error::{RecommendError, Result};
use futures::future::{join_all, try_join_all};
use futures::FutureExt;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

/// 單一商品抓取詳細資料的結果
#[derive(Debug, Clone, PartialEq)]
pub enum EnrichmentOutcome {
    Detailed(ItemDetail),
    Unavailable { item_id: String, reason: String },
}

/// 搜尋 → 篩選評分 → 抓詳細資料 → 合併重排
pub struct RecommendationService<C: MarketplaceClient> {
    client: C,
    config: RecommenderConfig,
}

impl<C: MarketplaceClient> RecommendationService<C> {
    pub fn new(client: C, config: RecommenderConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &RecommenderConfig {
        &self.config
    }

    /// 執行多組搜尋並回傳排序後的完整商品（最多 `max_return` 筆）。
    ///
    /// 任何一組搜尋失敗都會讓整個呼叫失敗；個別商品抓不到詳細資料只會被略過。
    pub async fn recommend(
        &self,
        candidates: &[SearchCandidate],
        context_text: &str,
    ) -> Result<Vec<Product>> {
        let started = Instant::now();

        let candidates: Vec<&SearchCandidate> =
            candidates.iter().filter(|c| c.is_well_formed()).collect();
        if candidates.is_empty() {
            tracing::debug!("No usable search candidates, skipping marketplace search");
            return Ok(Vec::new());
        }

        tracing::info!(
            "🔍 Searching marketplace with {} candidates (limit {} each)",
            candidates.len(),
            self.config.max_shallow
        );
        let per_candidate = self.search_all(&candidates).await?;
        let pool = pool_unique(per_candidate);
        tracing::info!("📥 Pooled {} unique items", pool.len());

        let scorer = self.build_scorer(&candidates, context_text);
        tracing::debug!("Relevance tokens: {:?}", scorer.tokens());

        let shortlist = self.shortlist(&pool, &scorer);
        tracing::info!(
            "🔄 {} items passed filters, enriching top {}",
            shortlist.len(),
            shortlist.len().min(self.config.max_candidates)
        );

        let enriched = self.enrich_all(&pool, shortlist).await;
        let mut ranked = rank_by(enriched, |product| scorer.deep_score(product));
        ranked.truncate(self.config.max_return);

        tracing::info!(
            "✅ Recommendation finished: {} items in {:?}",
            ranked.len(),
            started.elapsed()
        );
        Ok(ranked)
    }

    fn build_scorer(&self, candidates: &[&SearchCandidate], context_text: &str) -> Scorer {
        let mut text = context_text.to_string();
        for candidate in candidates {
            text.push(' ');
            text.push_str(&candidate.query_text);
        }
        Scorer::new(
            tokenize(&text),
            self.config.max_price_jpy,
            self.config.min_seller_rating,
        )
    }

    async fn search_all(&self, candidates: &[&SearchCandidate]) -> Result<Vec<Vec<SearchHit>>> {
        let searches = candidates
            .iter()
            .map(|candidate| self.search_one(candidate));
        try_join_all(searches).await
    }

    async fn search_one(&self, candidate: &SearchCandidate) -> Result<Vec<SearchHit>> {
        let operation = format!("search '{}'", candidate.query_text);
        let search = self.client.search(candidate, self.config.max_shallow);

        match with_timeout(self.config.search_timeout, &operation, search).await {
            Ok(hits) => {
                tracing::debug!("📡 {} returned {} items", operation, hits.len());
                Ok(hits)
            }
            Err(e) => {
                tracing::error!("❌ {} failed: {}", operation, e);
                Err(RecommendError::SearchFailed {
                    query: candidate.query_text.clone(),
                    source: Box::new(e),
                })
            }
        }
    }

    /// 依分數挑出最值得抓詳細資料的商品
    fn shortlist(&self, pool: &[SearchHit], scorer: &Scorer) -> Vec<Product> {
        let survivors: Vec<Product> = pool
            .iter()
            .map(Product::from)
            .filter(|product| scorer.passes_filters(product))
            .collect();

        let mut ranked = rank_by(survivors, |product| scorer.shallow_score(product));
        ranked.truncate(self.config.max_candidates);
        ranked
    }

    async fn enrich_all(&self, pool: &[SearchHit], shortlist: Vec<Product>) -> Vec<Product> {
        let by_id: HashMap<&str, &SearchHit> =
            pool.iter().map(|hit| (hit.id.as_str(), hit)).collect();

        let fetches = shortlist.into_iter().filter_map(|product| {
            let hit = *by_id.get(product.id.as_str())?;
            Some(async move {
                let outcome = self.enrich_one(hit).await;
                (product, outcome)
            })
        });
        let outcomes = join_all(fetches).await;

        let attempted = outcomes.len();
        let merged: Vec<Product> = outcomes
            .into_iter()
            .filter_map(|(product, outcome)| match outcome {
                EnrichmentOutcome::Detailed(detail) => Some(merge_detail(product, detail)),
                EnrichmentOutcome::Unavailable { .. } => None,
            })
            .collect();

        if merged.len() < attempted {
            tracing::info!(
                "⚠️ {} of {} items had no detail and were dropped",
                attempted - merged.len(),
                attempted
            );
        }
        merged
    }

    async fn enrich_one(&self, hit: &SearchHit) -> EnrichmentOutcome {
        let operation = format!("enrich '{}'", hit.id);
        let fetch = async {
            match AssertUnwindSafe(self.client.enrich(hit)).catch_unwind().await {
                Ok(result) => result,
                Err(_) => Err(RecommendError::DecodeError {
                    message: format!("{} panicked while reading item detail", operation),
                }),
            }
        };

        match with_timeout(self.config.enrich_timeout, &operation, fetch).await {
            Ok(Some(detail)) => EnrichmentOutcome::Detailed(detail),
            Ok(None) => {
                tracing::debug!("Item {} is no longer available", hit.id);
                EnrichmentOutcome::Unavailable {
                    item_id: hit.id.clone(),
                    reason: "listing no longer available".to_string(),
                }
            }
            Err(e) => {
                tracing::warn!("⚠️ Failed to {}: {}", operation, e);
                EnrichmentOutcome::Unavailable {
                    item_id: hit.id.clone(),
                    reason: e.to_string(),
                }
            }
        }
    }
}

async fn with_timeout<T, F>(limit: Option<Duration>, operation: &str, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, future)
            .await
            .unwrap_or_else(|_| {
                Err(RecommendError::TimeoutError {
                    operation: operation.to_string(),
                    timeout_ms: limit.as_millis() as u64,
                })
            }),
        None => future.await,
    }
}

/// 合併所有搜尋結果並依 id 去重，先出現的優先
pub fn pool_unique(per_candidate: Vec<Vec<SearchHit>>) -> Vec<SearchHit> {
    let mut seen = HashSet::new();
    per_candidate
        .into_iter()
        .flatten()
        .filter(|hit| !hit.id.is_empty() && seen.insert(hit.id.clone()))
        .collect()
}

/// 把詳細資料併入商品；詳細資料缺少的欄位保留原值
pub fn merge_detail(mut product: Product, detail: ItemDetail) -> Product {
    let shipping_fee_included = detail.seller_pays_shipping();

    if let Some(seller) = detail.seller {
        product.seller_rating = Some(seller.star_rating_score);
        product.seller_sales_count = Some(seller.num_sell_items);
    }
    if let Some(label) = detail.condition_label {
        product.condition_label = Some(label);
    }
    if let Some(created_at) = detail.created_at {
        product.created_at = Some(created_at);
    }

    product.enrichment = Some(Enrichment {
        description: detail.description,
        category: detail.category,
        attributes: detail.attributes,
        shipping_fee_included,
        shipping_days_min: detail.shipping_duration.and_then(|d| d.min_days),
        shipping_days_max: detail.shipping_duration.and_then(|d| d.max_days),
    });
    product
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{SellerProfile, ShippingDuration, LISTING_ITEM_TYPE};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeMarketplace {
        results: HashMap<String, Vec<SearchHit>>,
        failing_queries: HashSet<String>,
        slow_queries: HashSet<String>,
        details: HashMap<String, ItemDetail>,
        failing_items: HashSet<String>,
        slow_items: HashSet<String>,
        panicking_items: HashSet<String>,
        search_calls: AtomicUsize,
        enrich_calls: AtomicUsize,
    }

    impl FakeMarketplace {
        fn with_results(mut self, query: &str, hits: Vec<SearchHit>) -> Self {
            for hit in &hits {
                self.details
                    .entry(hit.id.clone())
                    .or_insert_with(ItemDetail::default);
            }
            self.results.insert(query.to_string(), hits);
            self
        }

        fn with_detail(mut self, id: &str, detail: ItemDetail) -> Self {
            self.details.insert(id.to_string(), detail);
            self
        }

        fn failing_query(mut self, query: &str) -> Self {
            self.failing_queries.insert(query.to_string());
            self
        }

        fn failing_item(mut self, id: &str) -> Self {
            self.failing_items.insert(id.to_string());
            self
        }

        fn removed_item(mut self, id: &str) -> Self {
            self.details.remove(id);
            self
        }
    }

    #[async_trait]
    impl MarketplaceClient for FakeMarketplace {
        async fn search(&self, candidate: &SearchCandidate, limit: usize) -> Result<Vec<SearchHit>> {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            if self.slow_queries.contains(&candidate.query_text) {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            if self.failing_queries.contains(&candidate.query_text) {
                return Err(RecommendError::HttpStatusError {
                    status: 503,
                    endpoint: "fake://search".to_string(),
                });
            }
            let mut hits = self
                .results
                .get(&candidate.query_text)
                .cloned()
                .unwrap_or_default();
            hits.truncate(limit);
            Ok(hits)
        }

        async fn enrich(&self, hit: &SearchHit) -> Result<Option<ItemDetail>> {
            self.enrich_calls.fetch_add(1, Ordering::SeqCst);
            if self.slow_items.contains(&hit.id) {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            if self.panicking_items.contains(&hit.id) {
                panic!("detail parser blew up for {}", hit.id);
            }
            if self.failing_items.contains(&hit.id) {
                return Err(RecommendError::HttpStatusError {
                    status: 500,
                    endpoint: "fake://items".to_string(),
                });
            }
            Ok(self.details.get(&hit.id).cloned())
        }
    }

    fn hit(id: &str, name: &str, price_jpy: u64) -> SearchHit {
        SearchHit {
            id: id.to_string(),
            name: name.to_string(),
            price_jpy,
            item_type: LISTING_ITEM_TYPE.to_string(),
            created_at: None,
        }
    }

    fn ids(products: &[Product]) -> Vec<&str> {
        products.iter().map(|p| p.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_empty_candidates_skip_marketplace() {
        let service = RecommendationService::new(FakeMarketplace::default(), RecommenderConfig::default());

        let result = service.recommend(&[], "anything").await.unwrap();
        assert!(result.is_empty());

        let blank = vec![SearchCandidate::new("   "), SearchCandidate::new("")];
        let result = service.recommend(&blank, "anything").await.unwrap();
        assert!(result.is_empty());

        assert_eq!(service.client.search_calls.load(Ordering::SeqCst), 0);
        assert_eq!(service.client.enrich_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_candidates_are_skipped() {
        let client = FakeMarketplace::default().with_results("switch", vec![hit("m1", "Switch", 20_000)]);
        let service = RecommendationService::new(client, RecommenderConfig::default());

        let candidates = vec![SearchCandidate::new(" "), SearchCandidate::new("switch")];
        let result = service.recommend(&candidates, "").await.unwrap();

        assert_eq!(ids(&result), vec!["m1"]);
        assert_eq!(service.client.search_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_pool_unique_keeps_first_occurrence() {
        let pooled = pool_unique(vec![
            vec![hit("a", "first a", 100), hit("b", "b", 100)],
            vec![hit("a", "second a", 999), hit("", "no id", 100), hit("c", "c", 100)],
            vec![hit("b", "second b", 100)],
        ]);

        assert_eq!(
            pooled.iter().map(|h| h.id.as_str()).collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
        assert_eq!(pooled[0].name, "first a");
        assert_eq!(pooled[0].price_jpy, 100);
    }

    #[tokio::test]
    async fn test_duplicates_across_candidates_enriched_once() {
        let client = FakeMarketplace::default()
            .with_results("ps5", vec![hit("m1", "PS5 本体", 40_000), hit("m2", "PS5 本体 美品", 42_000)])
            .with_results("プレステ5", vec![hit("m2", "PS5 本体 美品", 42_000), hit("m3", "プレステ5", 39_000)]);
        let service = RecommendationService::new(client, RecommenderConfig::default());

        let candidates = vec![SearchCandidate::new("ps5"), SearchCandidate::new("プレステ5")];
        let result = service.recommend(&candidates, "PS5 本体").await.unwrap();

        let mut result_ids = ids(&result);
        result_ids.sort();
        assert_eq!(result_ids, vec!["m1", "m2", "m3"]);
        assert_eq!(service.client.enrich_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_search_failure_fails_whole_call() {
        let client = FakeMarketplace::default()
            .with_results("a", vec![hit("m1", "a", 1_000)])
            .with_results("c", vec![hit("m3", "c", 1_000)])
            .failing_query("b");
        let service = RecommendationService::new(client, RecommenderConfig::default());

        let candidates = vec![
            SearchCandidate::new("a"),
            SearchCandidate::new("b"),
            SearchCandidate::new("c"),
        ];
        let err = service.recommend(&candidates, "").await.unwrap_err();

        match err {
            RecommendError::SearchFailed { query, source } => {
                assert_eq!(query, "b");
                assert!(matches!(*source, RecommendError::HttpStatusError { status: 503, .. }));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(service.client.enrich_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_enrichment_failures_are_isolated() {
        let client = FakeMarketplace::default()
            .with_results(
                "camera",
                vec![
                    hit("m1", "camera 1", 1_000),
                    hit("m2", "camera 2", 1_000),
                    hit("m3", "camera 3", 1_000),
                    hit("m4", "camera 4", 1_000),
                    hit("m5", "camera 5", 1_000),
                ],
            )
            .failing_item("m2")
            .removed_item("m4");
        let service = RecommendationService::new(client, RecommenderConfig::default());

        let result = service
            .recommend(&[SearchCandidate::new("camera")], "")
            .await
            .unwrap();

        assert_eq!(ids(&result), vec!["m1", "m3", "m5"]);
        assert!(result.iter().all(Product::is_enriched));
        assert_eq!(service.client.enrich_calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_panicking_enrichment_is_isolated() {
        let mut client = FakeMarketplace::default()
            .with_results("lens", vec![hit("m1", "lens", 1_000), hit("m2", "lens", 1_000)]);
        client.panicking_items.insert("m1".to_string());
        let service = RecommendationService::new(client, RecommenderConfig::default());

        let result = service
            .recommend(&[SearchCandidate::new("lens")], "")
            .await
            .unwrap();
        assert_eq!(ids(&result), vec!["m2"]);
    }

    #[tokio::test]
    async fn test_shipping_bonus_breaks_ties() {
        let seller_pays = ItemDetail {
            shipping_payer_code: Some("seller".to_string()),
            ..ItemDetail::default()
        };
        let buyer_pays = ItemDetail {
            shipping_payer_code: Some("buyer".to_string()),
            ..ItemDetail::default()
        };
        let client = FakeMarketplace::default()
            .with_results("desk", vec![hit("paid", "desk", 5_000), hit("free", "desk", 5_000)])
            .with_detail("paid", buyer_pays)
            .with_detail("free", seller_pays);
        let service = RecommendationService::new(client, RecommenderConfig::default());

        let result = service
            .recommend(&[SearchCandidate::new("desk")], "")
            .await
            .unwrap();

        assert_eq!(ids(&result), vec!["free", "paid"]);
        assert!(result[0].shipping_fee_included());
        assert!(!result[1].shipping_fee_included());
    }

    #[tokio::test]
    async fn test_ranking_uses_relevance_price_and_rating() {
        let rated = ItemDetail {
            seller: Some(SellerProfile {
                star_rating_score: 5.0,
                num_sell_items: 320,
            }),
            ..ItemDetail::default()
        };
        let client = FakeMarketplace::default()
            .with_results(
                "switch",
                vec![
                    hit("case", "ケース", 8_000),
                    hit("console", "Nintendo Switch 本体", 14_000),
                    hit("cheap", "Switch 本体", 2_000),
                    hit("rated", "Switch", 14_000),
                ],
            )
            .with_detail("rated", rated);
        let config = RecommenderConfig::default().with_max_price(Some(20_000));
        let service = RecommendationService::new(client, config);

        let result = service
            .recommend(&[SearchCandidate::new("switch")], "switch 本体")
            .await
            .unwrap();

        // cheap 低於 5000 的價格門檻被過濾
        assert_eq!(ids(&result), vec!["rated", "console", "case"]);
        assert_eq!(result[0].seller_rating, Some(5.0));
        assert_eq!(result[0].seller_sales_count, Some(320));
    }

    #[tokio::test]
    async fn test_caps_limit_enrichment_and_output() {
        let hits: Vec<SearchHit> = (0..30)
            .map(|i| hit(&format!("m{:02}", i), "bag", 1_000 + i))
            .collect();
        let client = FakeMarketplace::default().with_results("bag", hits);
        let config = RecommenderConfig {
            max_shallow: 25,
            max_candidates: 12,
            max_return: 5,
            ..RecommenderConfig::default()
        };
        let service = RecommendationService::new(client, config);

        let result = service
            .recommend(&[SearchCandidate::new("bag")], "")
            .await
            .unwrap();

        assert_eq!(service.client.enrich_calls.load(Ordering::SeqCst), 12);
        // 全部同分時維持搜尋結果的順序
        assert_eq!(ids(&result), vec!["m00", "m01", "m02", "m03", "m04"]);
    }

    #[tokio::test]
    async fn test_search_timeout_fails_fast() {
        let mut client = FakeMarketplace::default().with_results("fast", vec![hit("m1", "fast", 1_000)]);
        client.slow_queries.insert("slow".to_string());
        let config = RecommenderConfig::default()
            .with_timeouts(Some(Duration::from_millis(50)), None);
        let service = RecommendationService::new(client, config);

        let candidates = vec![SearchCandidate::new("fast"), SearchCandidate::new("slow")];
        let err = service.recommend(&candidates, "").await.unwrap_err();

        match err {
            RecommendError::SearchFailed { query, source } => {
                assert_eq!(query, "slow");
                assert!(matches!(*source, RecommendError::TimeoutError { timeout_ms: 50, .. }));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_enrich_timeout_drops_item() {
        let mut client = FakeMarketplace::default()
            .with_results("tv", vec![hit("slow", "tv", 1_000), hit("fast", "tv", 1_000)]);
        client.slow_items.insert("slow".to_string());
        let config = RecommenderConfig::default()
            .with_timeouts(None, Some(Duration::from_millis(50)));
        let service = RecommendationService::new(client, config);

        let result = service
            .recommend(&[SearchCandidate::new("tv")], "")
            .await
            .unwrap();
        assert_eq!(ids(&result), vec!["fast"]);
    }

    #[test]
    fn test_merge_detail_fills_fields() {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        let mut product = Product::from(&hit("m1", "Switch", 20_000));
        product.created_at = Some(Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap());

        let detail = ItemDetail {
            seller: Some(SellerProfile {
                star_rating_score: 4.0,
                num_sell_items: 12,
            }),
            condition_label: Some("目立った傷や汚れなし".to_string()),
            created_at: Some(created),
            shipping_payer_code: Some("seller".to_string()),
            shipping_duration: Some(ShippingDuration {
                min_days: Some(1),
                max_days: Some(2),
            }),
            category: Some("家庭用ゲーム機本体".to_string()),
            description: Some("動作確認済み".to_string()),
            attributes: None,
        };

        let merged = merge_detail(product, detail);
        assert_eq!(merged.seller_rating, Some(4.0));
        assert_eq!(merged.seller_sales_count, Some(12));
        assert_eq!(merged.condition_label.as_deref(), Some("目立った傷や汚れなし"));
        assert_eq!(merged.created_at, Some(created));

        let enrichment = merged.enrichment.unwrap();
        assert!(enrichment.shipping_fee_included);
        assert_eq!(enrichment.shipping_days_min, Some(1));
        assert_eq!(enrichment.shipping_days_max, Some(2));
        assert_eq!(enrichment.category.as_deref(), Some("家庭用ゲーム機本体"));
        assert_eq!(enrichment.description.as_deref(), Some("動作確認済み"));
    }

    #[test]
    fn test_merge_detail_keeps_existing_values_when_detail_is_sparse() {
        let created = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        let mut product = Product::from(&hit("m1", "Switch", 20_000));
        product.created_at = Some(created);
        product.condition_label = Some("新品、未使用".to_string());

        let merged = merge_detail(product, ItemDetail::default());
        assert_eq!(merged.seller_rating, None);
        assert_eq!(merged.seller_sales_count, None);
        assert_eq!(merged.condition_label.as_deref(), Some("新品、未使用"));
        assert_eq!(merged.created_at, Some(created));

        let enrichment = merged.enrichment.unwrap();
        assert!(!enrichment.shipping_fee_included);
        assert_eq!(enrichment.shipping_days_min, None);
        assert_eq!(enrichment.category, None);
    }
}
