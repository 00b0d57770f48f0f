use crate::domain::model::{ItemDetail, SearchCandidate, SearchHit};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// 市集 API 的邊界。實作必須能被多個 task 同時呼叫。
#[async_trait]
pub trait MarketplaceClient: Send + Sync {
    /// 依搜尋條件回傳最多 `limit` 筆結果。失敗必須以 `Err` 回傳，不可回空結果。
    async fn search(&self, candidate: &SearchCandidate, limit: usize) -> Result<Vec<SearchHit>>;

    /// 取得單一商品的詳細資料。`Ok(None)` 表示商品已不存在。
    async fn enrich(&self, hit: &SearchHit) -> Result<Option<ItemDetail>>;
}

#[async_trait]
impl<T: MarketplaceClient + ?Sized> MarketplaceClient for &T {
    async fn search(&self, candidate: &SearchCandidate, limit: usize) -> Result<Vec<SearchHit>> {
        (**self).search(candidate, limit).await
    }

    async fn enrich(&self, hit: &SearchHit) -> Result<Option<ItemDetail>> {
        (**self).enrich(hit).await
    }
}

#[async_trait]
impl<T: MarketplaceClient + ?Sized> MarketplaceClient for Arc<T> {
    async fn search(&self, candidate: &SearchCandidate, limit: usize) -> Result<Vec<SearchHit>> {
        (**self).search(candidate, limit).await
    }

    async fn enrich(&self, hit: &SearchHit) -> Result<Option<ItemDetail>> {
        (**self).enrich(hit).await
    }
}
