//! 会话状态容器

use crate::error::Error;
use crate::services::AuthService;
use crate::state::AsyncResult;
use crate::types::{SignupRequest, User};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// 会话状态
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum SessionState {
    Unknown,
    Loading,
    Authenticated(User),
    Anonymous,
    Failed(Error),
}

impl SessionState {
    pub fn user(&self) -> Option<&User> {
        match self {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    /// 转换为三态结果，`Data(None)` 表示没有会话
    pub fn to_async(&self) -> AsyncResult<Option<User>> {
        match self {
            SessionState::Unknown | SessionState::Loading => AsyncResult::Loading,
            SessionState::Authenticated(user) => AsyncResult::Data(Some(user.clone())),
            SessionState::Anonymous => AsyncResult::Data(None),
            SessionState::Failed(err) => AsyncResult::Error(err.clone()),
        }
    }
}

/// 会话容器
///
/// 重叠的 `login` 调用不会合并，最后完成的结果决定最终状态。
pub struct SessionContainer {
    auth: Arc<AuthService>,
    state: watch::Sender<SessionState>,
}

impl SessionContainer {
    pub fn new(auth: Arc<AuthService>) -> Self {
        let (state, _) = watch::channel(SessionState::Anonymous);
        Self { auth, state }
    }

    /// 订阅状态变更
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// 当前状态快照
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub async fn login(&self, username: &str, password: &str) {
        self.publish(SessionState::Loading);

        // 服务返回的 token 即已保存的令牌
        let next = match self.auth.login(username, password).await {
            Ok(user) if user.token.is_some() => SessionState::Authenticated(user),
            Ok(_) => SessionState::Anonymous,
            Err(err) => {
                warn!("Login failed: {}", err);
                SessionState::Failed(err)
            }
        };
        self.publish(next);
    }

    /// 注册成功后回到匿名状态，返回新建的用户
    pub async fn signup(&self, request: &SignupRequest) -> Option<User> {
        self.publish(SessionState::Loading);

        match self.auth.signup(request).await {
            Ok(user) => {
                self.publish(SessionState::Anonymous);
                Some(user)
            }
            Err(err) => {
                warn!("Signup failed: {}", err);
                self.publish(SessionState::Failed(err));
                None
            }
        }
    }

    /// 清除本地凭证后无条件回到匿名状态
    pub async fn logout(&self) {
        if let Err(err) = self.auth.logout().await {
            warn!("Failed to clear stored credentials: {}", err);
        }
        self.publish(SessionState::Anonymous);
    }

    /// 启动时检查已保存的令牌
    pub async fn restore_session(&self) {
        self.publish(SessionState::Loading);

        match self.auth.is_logged_in().await {
            Ok(true) => {}
            Ok(false) => {
                debug!("No stored token, starting anonymous");
                self.publish(SessionState::Anonymous);
                return;
            }
            Err(err) => {
                warn!("Cannot read stored token: {}", err);
                self.logout().await;
                return;
            }
        }

        match self.auth.get_current_user().await {
            Ok(user) => {
                info!("Restored session for user: {}", user.id);
                self.publish(SessionState::Authenticated(user));
            }
            Err(err) => {
                warn!("Stored session is no longer valid: {}", err);
                self.logout().await;
            }
        }
    }

    fn publish(&self, next: SessionState) {
        self.state.send_replace(next);
    }
}
