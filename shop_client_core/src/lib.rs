//! 电商演示 API 客户端核心库
//!
//! 分层结构（由底向上）：
//! - 安全键值存储：保存登录令牌和用户 ID
//! - HTTP 请求管道：URL、请求头、JSON 编解码、错误分类
//! - 领域服务：认证、商品
//! - 响应式状态容器：会话、商品列表

pub mod client;
pub mod error;
pub mod services;
pub mod state;
pub mod storage;
pub mod types;

pub use client::{ApiClient, ClientConfig, JsonObject, DEFAULT_BASE_URL};
pub use error::{Error, Result};
pub use services::{AuthService, ProductService};
pub use state::{AsyncResult, CatalogContainer, CatalogState, Cursor, SessionContainer, SessionState};
pub use storage::{FileStore, MemoryStore, SecureStore};
pub use types::*;
