/// 会话存储
///
/// Access Token 由宿主应用的会话持有，这里只定义协作接口和一个进程内实现。
/// 每个请求通过 `RequestContext` 显式拿到会话，不依赖全局状态。
use oauth2::AccessToken;
use std::collections::HashMap;
use std::sync::RwLock;

/// 会话中保存 Access Token 的键
pub const ACCESS_TOKEN_KEY: &str = "google_access_token";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("未通过 Google 认证，请先登录")]
    NotAuthenticated,
}

/// 会话键值存储（由宿主应用实现并持久化）
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
    fn remove(&self, key: &str);
}

/// 进程内会话存储
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: String) {
        self.values
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) {
        self.values
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(key);
    }
}

/// 单次请求的上下文
#[derive(Clone, Copy)]
pub struct RequestContext<'a> {
    session: &'a dyn SessionStore,
}

impl<'a> RequestContext<'a> {
    pub fn new(session: &'a dyn SessionStore) -> Self {
        Self { session }
    }

    /// 读取当前会话的 Access Token
    ///
    /// # Errors
    /// 会话中没有 Token（或为空字符串）时返回 `NotAuthenticated`
    pub fn access_token(&self) -> Result<AccessToken, SessionError> {
        match self.session.get(ACCESS_TOKEN_KEY) {
            Some(token) if !token.is_empty() => Ok(AccessToken::new(token)),
            _ => Err(SessionError::NotAuthenticated),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_ok()
    }

    pub fn store_access_token(&self, token: &AccessToken) {
        self.session.set(ACCESS_TOKEN_KEY, token.secret().clone());
    }

    /// 退出登录
    pub fn clear_access_token(&self) {
        self.session.remove(ACCESS_TOKEN_KEY);
    }
}
