/// 应用配置
///
/// 优先级（从高到低）：
/// 1. 环境变量：`GMAIL_CLIENT_ID`, `GMAIL_CLIENT_SECRET`, `OAUTH_REDIRECT_URI`
/// 2. 配置文件：`<配置目录>/MailGate/config.toml` 的 `[oauth]` / `[http]` 段
/// 3. 默认值（占位符凭据）
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod oauth_config;

pub use oauth_config::OAuthConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub oauth: OAuthConfig,
    pub http: HttpConfig,
}

/// HTTP 客户端配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// 整体请求超时（秒）
    pub timeout_secs: u64,

    /// 连接建立超时（秒）
    pub connect_timeout_secs: u64,

    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            user_agent: format!("MailGate/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// 获取默认配置文件路径
///
/// 返回：`<配置目录>/MailGate/config.toml`
pub fn config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("无法获取配置目录"))?
        .join("MailGate");

    Ok(config_dir.join("config.toml"))
}

impl HttpConfig {
    /// 超时为 0 时回退到默认值（0 秒超时会让所有请求立即失败）
    pub fn normalize(&mut self) {
        let defaults = Self::default();

        if self.timeout_secs == 0 {
            tracing::warn!("⚠️ timeout_secs 不能为 0，使用默认值 {}", defaults.timeout_secs);
            self.timeout_secs = defaults.timeout_secs;
        }
        if self.connect_timeout_secs == 0 {
            tracing::warn!(
                "⚠️ connect_timeout_secs 不能为 0，使用默认值 {}",
                defaults.connect_timeout_secs
            );
            self.connect_timeout_secs = defaults.connect_timeout_secs;
        }
    }
}

/// 加载配置
///
/// `path` 为 `None` 时使用默认路径；文件不存在时写入一份默认配置作为模板
pub fn load(path: Option<&Path>) -> Result<AppConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_path()?,
    };

    let mut config = if path.exists() {
        let config = load_from_file(&path)?;
        tracing::info!("✅ 从配置文件加载配置: {}", path.display());
        config
    } else {
        tracing::debug!("配置文件不存在: {}，使用默认值", path.display());
        let config = AppConfig::default();
        match save(&config, &path) {
            Ok(()) => tracing::info!("📝 已生成配置模板: {}", path.display()),
            Err(e) => tracing::warn!("⚠️ 写入配置模板失败: {:#}", e),
        }
        config
    };

    config.http.normalize();

    if config.oauth.apply_env() {
        tracing::info!("✅ 从环境变量加载 OAuth2 凭据");
    }

    if config.oauth.is_placeholder() {
        tracing::warn!("⚠️ 未找到 OAuth2 凭据，使用默认占位符");
        tracing::warn!("请设置环境变量或创建配置文件：{}", path.display());
    }

    Ok(config)
}

/// 从配置文件加载
pub fn load_from_file(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("读取配置文件失败: {}", path.display()))?;

    toml::from_str(&content).context("解析配置文件失败")
}

/// 保存配置
pub fn save(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).context("创建配置目录失败")?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
