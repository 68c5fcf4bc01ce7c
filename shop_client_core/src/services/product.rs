//! 商品服务

use crate::client::{decode, encode_segment, json_kind, ApiClient};
use crate::error::Result;
use crate::types::{CatalogQuery, Product, ProductPage};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// 商品服务
pub struct ProductService {
    client: Arc<ApiClient>,
}

impl ProductService {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    /// 分页获取商品
    pub async fn list_products(&self, limit: u64, skip: u64) -> Result<ProductPage> {
        debug!("Listing products limit={} skip={}", limit, skip);
        let response = self.client.get("/products", &page_query(limit, skip)).await?;
        decode(response)
    }

    /// 按 ID 获取商品
    pub async fn get_product(&self, id: i64) -> Result<Product> {
        let response = self.client.get(&format!("/products/{}", id), &[]).await?;
        decode(response)
    }

    /// 搜索商品
    ///
    /// 去掉空白后为空的搜索词直接返回空页，不发请求。
    pub async fn search_products(&self, query: &str, limit: u64, skip: u64) -> Result<ProductPage> {
        let query = query.trim();
        if query.is_empty() {
            debug!("Empty search query, skipping request");
            return Ok(ProductPage::empty());
        }

        let mut params = vec![("q", query.to_string())];
        params.extend(page_query(limit, skip));

        let response = self.client.get("/products/search", &params).await?;
        decode(response)
    }

    /// 获取分类列表
    ///
    /// 兼容三种响应：字符串数组、`{"categories": [...]}`，以及
    /// `[{"slug", "name", "url"}]` 对象数组（取 `slug`）。无法识别的形状返回空列表。
    pub async fn list_categories(&self) -> Result<Vec<String>> {
        let response = self.client.get_value("/products/categories", &[]).await?;
        Ok(parse_categories(response))
    }

    /// 按分类获取商品
    pub async fn list_by_category(&self, name: &str) -> Result<ProductPage> {
        let response = self.client.get(&category_path(name), &[]).await?;
        decode(response)
    }

    /// 按分类分页获取商品
    pub async fn list_by_category_paged(&self, name: &str, limit: u64, skip: u64) -> Result<ProductPage> {
        let response = self
            .client
            .get(&category_path(name), &page_query(limit, skip))
            .await?;
        decode(response)
    }

    /// 按查询条件取一页，供列表容器使用
    pub async fn fetch_page(&self, query: &CatalogQuery, limit: u64, skip: u64) -> Result<ProductPage> {
        match query {
            CatalogQuery::All => self.list_products(limit, skip).await,
            CatalogQuery::Search(q) => self.search_products(q, limit, skip).await,
            CatalogQuery::Category(name) => self.list_by_category_paged(name, limit, skip).await,
        }
    }
}

fn page_query(limit: u64, skip: u64) -> Vec<(&'static str, String)> {
    vec![("limit", limit.to_string()), ("skip", skip.to_string())]
}

fn category_path(name: &str) -> String {
    format!("/products/category/{}", encode_segment(name))
}

fn parse_categories(value: Value) -> Vec<String> {
    match value {
        Value::Array(items) => category_names(items),
        Value::Object(mut map) => match map.remove("categories") {
            Some(Value::Array(items)) => category_names(items),
            _ => {
                warn!("Categories object has no `categories` array, treating as empty");
                Vec::new()
            }
        },
        other => {
            warn!("Unrecognized categories response ({}), treating as empty", json_kind(&other));
            Vec::new()
        }
    }
}

fn category_names(items: Vec<Value>) -> Vec<String> {
    let total = items.len();
    let names: Vec<String> = items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(name) => Some(name),
            Value::Object(mut entry) => match entry.remove("slug") {
                Some(Value::String(slug)) => Some(slug),
                _ => None,
            },
            _ => None,
        })
        .collect();

    if names.len() != total {
        warn!("Skipped {} unrecognized category entries", total - names.len());
    }
    names
}
