//! 商品列表状态容器
//!
//! 首页加载失败时用错误替换整个列表；加载更多失败时保留已有数据，
//! 错误通过 [`CatalogContainer::errors`] 旁路通知。

use crate::error::Error;
use crate::services::ProductService;
use crate::state::AsyncResult;
use crate::types::{CatalogQuery, Product};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

/// 默认每页条数
pub const DEFAULT_PAGE_SIZE: u64 = 10;

const ERROR_CHANNEL_CAPACITY: usize = 16;

/// 分页游标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Cursor {
    /// 下一页的偏移量
    pub skip: u64,
    pub limit: u64,
    /// 服务端报告的总数
    pub total: u64,
}

impl Cursor {
    fn reset(limit: u64) -> Self {
        Self {
            skip: 0,
            limit,
            total: 0,
        }
    }
}

/// 列表状态
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogState {
    pub query: CatalogQuery,
    pub products: AsyncResult<Vec<Product>>,
    pub cursor: Cursor,
    pub loading_more: bool,
    pub categories: AsyncResult<Vec<String>>,
}

impl CatalogState {
    fn new(limit: u64) -> Self {
        Self {
            query: CatalogQuery::All,
            products: AsyncResult::Data(Vec::new()),
            cursor: Cursor::reset(limit),
            loading_more: false,
            categories: AsyncResult::Data(Vec::new()),
        }
    }

    /// 已加载条数
    pub fn current_count(&self) -> u64 {
        self.products.data().map_or(0, |items| items.len() as u64)
    }

    pub fn has_more(&self) -> bool {
        self.products.data().is_some() && self.current_count() < self.cursor.total
    }
}

/// 商品列表容器
///
/// 每次首页加载递增代号，旧代号的结果（包括加载更多）到达时直接丢弃。
pub struct CatalogContainer {
    products: Arc<ProductService>,
    page_size: u64,
    state: watch::Sender<CatalogState>,
    errors: broadcast::Sender<Error>,
    generation: AtomicU64,
}

impl CatalogContainer {
    pub fn new(products: Arc<ProductService>) -> Self {
        Self::with_page_size(products, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(products: Arc<ProductService>, page_size: u64) -> Self {
        let page_size = page_size.max(1);
        let (state, _) = watch::channel(CatalogState::new(page_size));
        let (errors, _) = broadcast::channel(ERROR_CHANNEL_CAPACITY);
        Self {
            products,
            page_size,
            state,
            errors,
            generation: AtomicU64::new(0),
        }
    }

    /// 订阅状态变更
    pub fn subscribe(&self) -> watch::Receiver<CatalogState> {
        self.state.subscribe()
    }

    /// 订阅加载更多失败的通知
    pub fn errors(&self) -> broadcast::Receiver<Error> {
        self.errors.subscribe()
    }

    /// 当前状态快照
    pub fn state(&self) -> CatalogState {
        self.state.borrow().clone()
    }

    pub fn current_count(&self) -> u64 {
        self.state.borrow().current_count()
    }

    pub fn has_more(&self) -> bool {
        self.state.borrow().has_more()
    }

    /// 切换查询条件并重新加载首页
    pub async fn set_query(&self, query: CatalogQuery) {
        self.state.send_modify(|s| s.query = query);
        self.load_first_page().await;
    }

    /// 重置游标并加载首页，成功时整体替换列表
    pub async fn load_first_page(&self) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let limit = self.page_size;

        let mut query = CatalogQuery::All;
        self.state.send_modify(|s| {
            query = s.query.clone();
            s.products = AsyncResult::Loading;
            s.cursor = Cursor::reset(limit);
            s.loading_more = false;
        });

        debug!("Loading first page for {:?}", query);
        let result = self.products.fetch_page(&query, limit, 0).await;

        self.state.send_if_modified(|s| {
            if self.generation.load(Ordering::SeqCst) != generation {
                debug!("Discarding stale first page (generation {})", generation);
                return false;
            }
            match result {
                Ok(page) => {
                    s.cursor.skip = page.products.len() as u64;
                    s.cursor.total = page.total;
                    s.products = AsyncResult::Data(page.products);
                }
                Err(err) => {
                    warn!("First page failed: {}", err);
                    s.products = AsyncResult::Error(err);
                }
            }
            true
        });
    }

    /// 追加下一页
    ///
    /// 正在加载更多、列表不处于数据状态、或已加载完全部时不发请求。
    pub async fn load_more(&self) {
        let mut request = None;
        let generation = self.generation.load(Ordering::SeqCst);

        self.state.send_if_modified(|s| {
            if s.loading_more {
                return false;
            }
            let count = match &s.products {
                AsyncResult::Data(items) => items.len() as u64,
                _ => return false,
            };
            if count >= s.cursor.total {
                return false;
            }
            s.loading_more = true;
            request = Some((s.query.clone(), s.cursor.skip, s.cursor.limit));
            true
        });

        let Some((query, skip, limit)) = request else {
            debug!("Nothing more to load");
            return;
        };

        debug!("Loading more: skip={} limit={}", skip, limit);
        let result = self.products.fetch_page(&query, limit, skip).await;

        let mut failure = None;
        self.state.send_if_modified(|s| {
            if self.generation.load(Ordering::SeqCst) != generation {
                debug!("Discarding stale page at skip={}", skip);
                return false;
            }
            s.loading_more = false;
            match result {
                Ok(page) => {
                    if let AsyncResult::Data(items) = &mut s.products {
                        let received = page.products.len() as u64;
                        items.extend(page.products);
                        s.cursor.skip += received;
                        s.cursor.total = page.total;
                        if received == 0 {
                            // 服务端没有更多数据，收敛总数避免反复请求
                            s.cursor.total = items.len() as u64;
                        }
                    }
                }
                Err(err) => failure = Some(err),
            }
            true
        });

        if let Some(err) = failure {
            warn!("Load more failed, keeping {} loaded products: {}", self.current_count(), err);
            // 没有订阅者时发送失败是正常的
            let _ = self.errors.send(err);
        }
    }

    /// 下拉刷新，与加载首页相同
    pub async fn refresh(&self) {
        self.load_first_page().await;
    }

    /// 加载分类列表
    pub async fn load_categories(&self) {
        self.state.send_modify(|s| s.categories = AsyncResult::Loading);
        let result = self.products.list_categories().await;
        self.state.send_modify(|s| s.categories = result.into());
    }
}
