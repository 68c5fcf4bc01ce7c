//! HTTP 请求管道
//!
//! 所有出站请求都经过 [`ApiClient`]：拼接 URL、注入请求头（含 Bearer 令牌）、
//! 序列化请求体、按状态码分类响应。其他层不直接接触 Authorization 头。

use crate::error::{Error, Result};
use crate::storage::{read_token, SecureStore};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// 演示 API 地址
pub const DEFAULT_BASE_URL: &str = "https://dummyjson.com";

/// 默认请求超时
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const JSON_CONTENT_TYPE: &str = "application/json";

/// 字符串键的 JSON 对象
pub type JsonObject = serde_json::Map<String, Value>;

/// 查询参数
pub type Query<'a> = [(&'a str, String)];

/// 客户端配置
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// 服务器 URL
    pub base_url: String,
    /// 请求超时
    pub timeout: Duration,
    /// 是否验证 TLS 证书
    pub verify_tls: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            verify_tls: true,
        }
    }
}

/// API 客户端
pub struct ApiClient {
    config: ClientConfig,
    http_client: Client,
    store: Arc<dyn SecureStore>,
}

impl ApiClient {
    /// 创建新的客户端实例，令牌从注入的存储中按请求读取
    pub fn new(config: ClientConfig, store: Arc<dyn SecureStore>) -> Result<Self> {
        Url::parse(&config.base_url)
            .map_err(|e| Error::invalid_param(format!("Invalid base URL {}: {}", config.base_url, e)))?;

        let http_client = Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|e| Error::network(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
            store,
        })
    }

    /// 使用默认配置创建客户端
    pub fn with_base_url(base_url: &str, store: Arc<dyn SecureStore>) -> Result<Self> {
        let config = ClientConfig {
            base_url: base_url.to_string(),
            ..ClientConfig::default()
        };
        Self::new(config, store)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// GET，响应必须是 JSON 对象
    pub async fn get(&self, path: &str, query: &Query<'_>) -> Result<JsonObject> {
        into_object(self.get_value(path, query).await?)
    }

    /// GET，返回任意 JSON 值（服务端可能直接返回数组）
    pub async fn get_value(&self, path: &str, query: &Query<'_>) -> Result<Value> {
        self.send(Method::GET, path, query, None, true).await
    }

    /// POST；登录和注册传 `include_auth = false`
    pub async fn post<B>(&self, path: &str, body: &B, include_auth: bool) -> Result<JsonObject>
    where
        B: Serialize + ?Sized,
    {
        let body = encode_body(body)?;
        into_object(self.send(Method::POST, path, &[], Some(body), include_auth).await?)
    }

    pub async fn put<B>(&self, path: &str, body: &B) -> Result<JsonObject>
    where
        B: Serialize + ?Sized,
    {
        let body = encode_body(body)?;
        into_object(self.send(Method::PUT, path, &[], Some(body), true).await?)
    }

    pub async fn patch<B>(&self, path: &str, body: &B) -> Result<JsonObject>
    where
        B: Serialize + ?Sized,
    {
        let body = encode_body(body)?;
        into_object(self.send(Method::PATCH, path, &[], Some(body), true).await?)
    }

    pub async fn delete(&self, path: &str) -> Result<JsonObject> {
        into_object(self.send(Method::DELETE, path, &[], None, true).await?)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &Query<'_>,
        body: Option<Vec<u8>>,
        include_auth: bool,
    ) -> Result<Value> {
        let url = build_url(&self.config.base_url, path, query)?;
        let headers = self.build_headers(include_auth).await?;

        debug!("{} {}", method, url.path());

        let mut request = self.http_client.request(method, url).headers(headers);
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| self.transport_error(&e))?;

        classify_response(status, &text)
    }

    /// 每次请求都重新读取令牌，避免使用刚被登出清除的令牌
    async fn build_headers(&self, include_auth: bool) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        headers.insert(ACCEPT, HeaderValue::from_static(JSON_CONTENT_TYPE));

        if include_auth {
            if let Some(token) = read_token(self.store.as_ref()).await? {
                let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|_| Error::invalid_param("Stored token is not a valid header value"))?;
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
        }

        Ok(headers)
    }

    fn transport_error(&self, err: &reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::timeout(format!(
                "No response within {}s",
                self.config.timeout.as_secs_f64()
            ))
        } else if err.is_decode() {
            Error::protocol(err.to_string())
        } else if err.is_builder() {
            Error::invalid_param(err.to_string())
        } else {
            Error::network(err.to_string())
        }
    }
}

/// 拼接绝对 URL：基础地址 + 路径 + 编码后的查询参数
pub fn build_url(base_url: &str, path: &str, query: &Query<'_>) -> Result<Url> {
    let raw = format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    );

    let url = if query.is_empty() {
        Url::parse(&raw)
    } else {
        Url::parse_with_params(&raw, query.iter().map(|(k, v)| (*k, v.as_str())))
    };

    url.map_err(|e| Error::invalid_param(format!("Invalid URL {}: {}", raw, e)))
}

/// 编码单个路径段（分类名等用户输入）
pub fn encode_segment(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

/// 按状态码分类响应
pub(crate) fn classify_response(status: u16, body: &str) -> Result<Value> {
    if !(200..300).contains(&status) {
        return Err(Error::http(status, extract_error_message(status, body)));
    }

    if body.trim().is_empty() {
        return Ok(Value::Object(JsonObject::new()));
    }

    serde_json::from_str(body)
        .map_err(|e| Error::protocol(format!("Malformed JSON in {} response: {}", status, e)))
}

/// 从错误响应中提取消息：`message`、`error`、`detail`，然后是原始文本
pub(crate) fn extract_error_message(status: u16, body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        for field in ["message", "error", "detail"] {
            if let Some(Value::String(message)) = map.get(field) {
                if !message.trim().is_empty() {
                    return message.clone();
                }
            }
        }
    }

    let raw = body.trim();
    if raw.is_empty() {
        format!("Request failed with status {}", status)
    } else {
        raw.to_string()
    }
}

fn into_object(value: Value) -> Result<JsonObject> {
    match value {
        Value::Object(map) => Ok(map),
        other => {
            warn!("Expected JSON object, got {}", json_kind(&other));
            Err(Error::protocol(format!(
                "Expected JSON object, got {}",
                json_kind(&other)
            )))
        }
    }
}

fn encode_body<B: Serialize + ?Sized>(body: &B) -> Result<Vec<u8>> {
    serde_json::to_vec(body).map_err(|e| Error::invalid_param(format!("Unserializable body: {}", e)))
}

/// 把响应对象解码为领域类型，字段不匹配视为协议错误
pub fn decode<T: DeserializeOwned>(object: JsonObject) -> Result<T> {
    serde_json::from_value(Value::Object(object))
        .map_err(|e| Error::protocol(format!("Unexpected response shape: {}", e)))
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
