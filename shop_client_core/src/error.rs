//! 错误类型定义

use serde::ser::{Serialize, SerializeMap, Serializer};
use thiserror::Error;

/// 无服务端消息时的兜底提示
pub const GENERIC_FAILURE_MESSAGE: &str = "Request failed";

/// 错误类型
///
/// 所有变体只携带字符串和状态码，可以克隆后放进状态容器里发布。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// 网络不可达
    #[error("Network error: {0}")]
    Network(String),

    /// 请求超时
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// 服务端返回非 2xx
    #[error("HTTP error (status {status}): {message}")]
    Http { status: u16, message: String },

    /// 2xx 但响应体无法解码
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// 安全存储不可用
    #[error("Storage error: {0}")]
    Storage(String),

    /// 参数错误
    #[error("Invalid parameter: {0}")]
    InvalidParam(String),
}

impl Error {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout(message.into())
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn invalid_param(message: impl Into<String>) -> Self {
        Self::InvalidParam(message.into())
    }

    /// 原始消息
    pub fn message(&self) -> &str {
        match self {
            Error::Network(message)
            | Error::Timeout(message)
            | Error::Http { message, .. }
            | Error::Protocol(message)
            | Error::Storage(message)
            | Error::InvalidParam(message) => message,
        }
    }

    /// 稳定的错误分类码
    pub fn code(&self) -> &'static str {
        match self {
            Error::Network(_) => "network",
            Error::Timeout(_) => "timeout",
            Error::Http { .. } => "http",
            Error::Protocol(_) => "protocol",
            Error::Storage(_) => "storage",
            Error::InvalidParam(_) => "invalid_param",
        }
    }

    /// HTTP 状态码（仅 Http 变体）
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 服务端拒绝了当前凭证
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// 是否值得重试：网络、超时和 5xx
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network(_) | Error::Timeout(_) => true,
            Error::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// 给界面展示的消息，永远不为空
    pub fn user_message(&self) -> String {
        let message = self.message().trim();

        if message.is_empty() {
            GENERIC_FAILURE_MESSAGE.to_string()
        } else {
            message.to_string()
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::storage(err.to_string())
    }
}

/// 序列化为 `{"kind": ..., "status"?: ..., "message": ...}`，供宿主读取
impl Serialize for Error {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let status = self.status();
        let mut map = serializer.serialize_map(Some(if status.is_some() { 3 } else { 2 }))?;
        map.serialize_entry("kind", self.code())?;
        if let Some(status) = status {
            map.serialize_entry("status", &status)?;
        }
        map.serialize_entry("message", self.message())?;
        map.end()
    }
}

/// 结果类型
pub type Result<T> = std::result::Result<T, Error>;
