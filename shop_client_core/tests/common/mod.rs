//! 集成测试公共设施

#![allow(dead_code)]

pub mod mock_backend;

use mock_backend::MockBackend;
use serde_json::{json, Value};
use shop_client_core::{ApiClient, AuthService, ClientConfig, MemoryStore, ProductService};
use std::sync::Arc;
use std::time::Duration;

/// 连接到模拟后端的完整客户端栈
pub struct TestStack {
    pub backend: MockBackend,
    pub store: Arc<MemoryStore>,
    pub client: Arc<ApiClient>,
    pub auth: Arc<AuthService>,
    pub products: Arc<ProductService>,
}

pub async fn stack() -> TestStack {
    stack_with_timeout(Duration::from_secs(5)).await
}

pub async fn stack_with_timeout(timeout: Duration) -> TestStack {
    let backend = MockBackend::start().await;
    let store = Arc::new(MemoryStore::new());
    let config = ClientConfig {
        base_url: backend.base_url(),
        timeout,
        verify_tls: false,
    };
    let client = Arc::new(ApiClient::new(config, store.clone()).expect("Failed to create client"));
    let auth = Arc::new(AuthService::new(client.clone(), store.clone()));
    let products = Arc::new(ProductService::new(client.clone()));

    TestStack {
        backend,
        store,
        client,
        auth,
        products,
    }
}

pub fn user_json(token: Option<&str>) -> Value {
    let mut user = json!({
        "id": 1,
        "username": "emilys",
        "email": "emily.johnson@x.dummyjson.com",
        "firstName": "Emily",
        "lastName": "Johnson",
        "gender": "female",
        "image": "https://dummyjson.com/icon/emilys/128"
    });
    if let Some(token) = token {
        user["token"] = json!(token);
    }
    user
}

pub fn product_json(id: u64) -> Value {
    json!({
        "id": id,
        "title": format!("Product {}", id),
        "description": "A product from the catalog",
        "category": "smartphones",
        "price": 9.99 + id as f64,
        "rating": 4.5,
        "stock": 10,
        "images": [format!("https://cdn.dummyjson.com/products/{}.png", id)]
    })
}

/// 一页商品：ID 从 `skip + 1` 开始连续编号
pub fn page_json(skip: u64, count: u64, total: u64, limit: u64) -> Value {
    let products: Vec<Value> = (skip + 1..=skip + count).map(product_json).collect();
    json!({
        "products": products,
        "total": total,
        "skip": skip,
        "limit": limit
    })
}
