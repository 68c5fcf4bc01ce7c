//! 认证服务

use crate::client::{decode, ApiClient};
use crate::error::Result;
use crate::storage::{read_token, SecureStore, REFRESH_TOKEN_KEY, TOKEN_KEY, USER_ID_KEY};
use crate::types::{LoginRequest, SignupRequest, User};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 认证服务
pub struct AuthService {
    client: Arc<ApiClient>,
    store: Arc<dyn SecureStore>,
}

impl AuthService {
    pub fn new(client: Arc<ApiClient>, store: Arc<dyn SecureStore>) -> Self {
        Self { client, store }
    }

    /// 用户登录
    ///
    /// 返回用户的 `token` 与实际保存的令牌一致：响应没有令牌（或为空）时为 `None`，
    /// 且不写存储。令牌最后写入，任何一步失败都会清理已写入的凭证。
    pub async fn login(&self, username: &str, password: &str) -> Result<User> {
        info!("Logging in user: {}", username);

        let response = self
            .client
            .post("/auth/login", &LoginRequest { username, password }, false)
            .await?;

        let token = string_field(&response, "token");
        let refresh_token = string_field(&response, "refreshToken");
        let mut user: User = decode(response)?;
        user.token = token;

        match &user.token {
            Some(token) => {
                if let Err(err) = self.persist(&user, token, refresh_token.as_deref()).await {
                    if let Err(cleanup) = self.logout().await {
                        warn!("Failed to roll back partial credentials: {}", cleanup);
                    }
                    return Err(err);
                }
                info!("User logged in successfully: {}", user.id);
            }
            None => warn!("Login response carried no token, session stays anonymous"),
        }

        Ok(user)
    }

    async fn persist(&self, user: &User, token: &str, refresh_token: Option<&str>) -> Result<()> {
        self.store.save(USER_ID_KEY, &user.id.to_string()).await?;
        if let Some(refresh_token) = refresh_token {
            self.store.save(REFRESH_TOKEN_KEY, refresh_token).await?;
        }
        self.store.save(TOKEN_KEY, token).await
    }

    /// 用户注册，服务端不签发令牌
    pub async fn signup(&self, request: &SignupRequest) -> Result<User> {
        info!("Registering user: {}", request.username);

        let response = self.client.post("/users/add", request, false).await?;
        let user: User = decode(response)?;

        info!("User registered successfully: {}", user.id);
        Ok(user)
    }

    /// 用户登出，仅清除本地凭证
    pub async fn logout(&self) -> Result<()> {
        self.store.delete(TOKEN_KEY).await?;
        self.store.delete(USER_ID_KEY).await?;
        self.store.delete(REFRESH_TOKEN_KEY).await?;
        info!("User logged out");
        Ok(())
    }

    /// 获取当前用户，用于校验已保存的令牌
    pub async fn get_current_user(&self) -> Result<User> {
        let response = self.client.get("/auth/me", &[]).await?;
        decode(response)
    }

    /// 只检查令牌是否存在，不向服务端校验
    pub async fn is_logged_in(&self) -> Result<bool> {
        Ok(read_token(self.store.as_ref()).await?.is_some())
    }

    /// 已缓存的用户 ID
    pub async fn stored_user_id(&self) -> Result<Option<i64>> {
        let raw = self.store.read(USER_ID_KEY).await?;
        Ok(raw.and_then(|id| match id.parse() {
            Ok(id) => Some(id),
            Err(_) => {
                debug!("Ignoring unparsable cached user id");
                None
            }
        }))
    }
}

fn string_field(object: &serde_json::Map<String, Value>, field: &str) -> Option<String> {
    object
        .get(field)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
