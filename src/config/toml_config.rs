use crate::adapters::mercari::{MercariClientConfig, DEFAULT_ITEM_ENDPOINT, DEFAULT_SEARCH_ENDPOINT};
use crate::config::RecommenderConfig;
use crate::utils::error::{RecommendError, Result};
use crate::utils::validation::Validate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

static ENV_VAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").unwrap());

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub marketplace: MarketplaceSection,
    #[serde(default)]
    pub ranking: RankingSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketplaceSection {
    pub search_endpoint: Option<String>,
    pub item_endpoint: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub headers: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RankingSection {
    pub max_shallow: Option<usize>,
    pub max_candidates: Option<usize>,
    pub max_return: Option<usize>,
    pub min_seller_rating: Option<f64>,
    pub max_price_jpy: Option<u64>,
    pub search_timeout_seconds: Option<u64>,
    pub enrich_timeout_seconds: Option<u64>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(RecommendError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| RecommendError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${MERCARI_DPOP})，找不到的變數保持原樣
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR_RE
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    pub fn recommender_config(&self) -> RecommenderConfig {
        let defaults = RecommenderConfig::default();
        let ranking = &self.ranking;
        RecommenderConfig {
            max_shallow: ranking.max_shallow.unwrap_or(defaults.max_shallow),
            max_candidates: ranking.max_candidates.unwrap_or(defaults.max_candidates),
            max_return: ranking.max_return.unwrap_or(defaults.max_return),
            min_seller_rating: ranking
                .min_seller_rating
                .unwrap_or(defaults.min_seller_rating),
            max_price_jpy: ranking.max_price_jpy,
            search_timeout: ranking.search_timeout_seconds.map(Duration::from_secs),
            enrich_timeout: ranking.enrich_timeout_seconds.map(Duration::from_secs),
        }
    }

    pub fn client_config(&self) -> MercariClientConfig {
        let marketplace = &self.marketplace;
        MercariClientConfig {
            search_endpoint: marketplace
                .search_endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_SEARCH_ENDPOINT.to_string()),
            item_endpoint: marketplace
                .item_endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_ITEM_ENDPOINT.to_string()),
            headers: marketplace.headers.clone().unwrap_or_default(),
            timeout_seconds: marketplace
                .timeout_seconds
                .or(MercariClientConfig::default().timeout_seconds),
        }
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.client_config().validate()?;
        self.recommender_config().validate()?;

        // 未替換的環境變數多半代表忘了設定
        if let Some(headers) = &self.marketplace.headers {
            for (name, value) in headers {
                if let Some(caps) = ENV_VAR_RE.captures(value) {
                    return Err(RecommendError::MissingConfigError {
                        field: format!("marketplace.headers.{} (env {})", name, &caps[1]),
                    });
                }
            }
        }
        Ok(())
    }
}
