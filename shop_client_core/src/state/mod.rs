//! 响应式状态容器
//!
//! 容器保存最近一次结果，通过 `tokio::sync::watch` 向界面发布每次变更。
//! 服务层的错误在这里被转换成状态，不会再向上抛出。

pub mod catalog;
pub mod session;

pub use catalog::{CatalogContainer, CatalogState, Cursor, DEFAULT_PAGE_SIZE};
pub use session::{SessionContainer, SessionState};

use crate::error::Error;
use serde::Serialize;

/// 三态异步结果：加载中 / 数据 / 错误
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum AsyncResult<T> {
    Loading,
    Data(T),
    Error(Error),
}

impl<T> AsyncResult<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, AsyncResult::Loading)
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            AsyncResult::Data(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            AsyncResult::Error(err) => Some(err),
            _ => None,
        }
    }

    pub fn map<U, F>(self, f: F) -> AsyncResult<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            AsyncResult::Loading => AsyncResult::Loading,
            AsyncResult::Data(value) => AsyncResult::Data(f(value)),
            AsyncResult::Error(err) => AsyncResult::Error(err),
        }
    }
}

impl<T> From<crate::error::Result<T>> for AsyncResult<T> {
    fn from(result: crate::error::Result<T>) -> Self {
        match result {
            Ok(value) => AsyncResult::Data(value),
            Err(err) => AsyncResult::Error(err),
        }
    }
}
