//! 安全键值存储
//!
//! 令牌、用户 ID 等凭证只通过 [`SecureStore`] 读写。移动端宿主把应用沙盒目录
//! 交给 [`FileStore`]；测试和无持久化需求的宿主使用 [`MemoryStore`]。

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// 登录令牌
pub const TOKEN_KEY: &str = "auth_token";
/// 当前用户 ID
pub const USER_ID_KEY: &str = "user_id";
/// 刷新令牌（目标后端不使用，仅保存）
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

const STORE_FILE_NAME: &str = "secure_store.json";

/// 安全存储接口
///
/// 读取不存在的键返回 `Ok(None)`，删除不存在的键视为成功。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SecureStore: Send + Sync {
    async fn save(&self, key: &str, value: &str) -> Result<()>;

    async fn read(&self, key: &str) -> Result<Option<String>>;

    async fn delete(&self, key: &str) -> Result<()>;

    async fn delete_all(&self) -> Result<()>;
}

/// 读取登录令牌，空字符串视为不存在
pub async fn read_token(store: &dyn SecureStore) -> Result<Option<String>> {
    Ok(store.read(TOKEN_KEY).await?.filter(|token| !token.is_empty()))
}

/// 内存存储
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecureStore for MemoryStore {
    async fn save(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        self.entries.write().await.clear();
        Ok(())
    }
}

/// 文件存储
///
/// 所有条目保存在一个 JSON 文件里，首次访问时加载。写入先落到临时文件再重命名，
/// Unix 下文件权限为 0600。
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    cache: Mutex<Option<HashMap<String, String>>>,
}

impl FileStore {
    /// 在指定目录下创建存储
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(STORE_FILE_NAME),
            cache: Mutex::new(None),
        }
    }

    /// 存储文件路径
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<HashMap<String, String>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(HashMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                Error::storage(format!("Corrupt store file {}: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(Error::storage(format!(
                "Failed to read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    async fn persist(&self, entries: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let data = serde_json::to_vec(entries)
            .map_err(|e| Error::storage(format!("Failed to encode store: {}", e)))?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &data).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).await?;
        }

        tokio::fs::rename(&tmp, &self.path).await?;
        debug!("Persisted {} secure entries", entries.len());
        Ok(())
    }

    /// 在缓存上执行修改并落盘
    async fn update<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut HashMap<String, String>),
    {
        let mut guard = self.cache.lock().await;
        let mut entries = match guard.take() {
            Some(entries) => entries,
            None => self.load().await?,
        };
        mutate(&mut entries);

        // 落盘失败时丢弃缓存，下次访问重新从磁盘加载
        self.persist(&entries).await?;
        *guard = Some(entries);
        Ok(())
    }
}

#[async_trait]
impl SecureStore for FileStore {
    async fn save(&self, key: &str, value: &str) -> Result<()> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
        .await
    }

    async fn read(&self, key: &str) -> Result<Option<String>> {
        let mut guard = self.cache.lock().await;
        if guard.is_none() {
            *guard = Some(self.load().await?);
        }
        Ok(guard.as_ref().and_then(|entries| entries.get(key).cloned()))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.update(|entries| {
            entries.remove(key);
        })
        .await
    }

    async fn delete_all(&self) -> Result<()> {
        self.update(|entries| entries.clear()).await
    }
}
