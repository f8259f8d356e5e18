/// HTTP 客户端构建
///
/// reqwest 推荐共享单个 Client 实例（复用连接池），
/// 这里负责按配置构建，由调用方注入到 AuthFlow / GmailApiClient
use once_cell::sync::Lazy;
use reqwest::Client;
use std::time::Duration;

use crate::config::HttpConfig;

/// 默认配置的共享客户端（懒初始化）
static DEFAULT_CLIENT: Lazy<Client> =
    Lazy::new(|| build_client(&HttpConfig::default()).unwrap_or_default());

/// 按配置构建 HTTP 客户端
///
/// 每个请求都有上限超时，避免外部服务无响应时调用方一直阻塞
pub fn build_client(config: &HttpConfig) -> reqwest::Result<Client> {
    Client::builder()
        // 连接池配置
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(300))
        // 超时配置
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .redirect(reqwest::redirect::Policy::limited(5))
        .user_agent(config.user_agent.as_str())
        .build()
}

/// 获取默认配置的共享客户端
pub fn default_client() -> Client {
    DEFAULT_CLIENT.clone()
}
