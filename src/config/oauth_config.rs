/// OAuth2 配置模块
///
/// 描述 Google OAuth2 客户端凭据与端点，启动时加载一次，之后不再修改
use oauth2::{AuthUrl, ClientId, ClientSecret, RedirectUrl, TokenUrl};
use serde::{Deserialize, Serialize};

/// Google 授权端点
pub const GOOGLE_AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/auth";

/// Google Token 端点
pub const GOOGLE_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// Google Token 信息端点（用于检测 Token 是否仍然有效）
pub const GOOGLE_TOKEN_INFO_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v1/tokeninfo";

/// OAuth2 配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// Google OAuth2 客户端 ID
    pub client_id: String,

    /// Google OAuth2 客户端密钥
    pub client_secret: String,

    /// 重定向 URI（授权完成后浏览器回到这里）
    pub redirect_uri: String,

    /// 请求的 API 权限范围
    pub scopes: Vec<String>,

    /// 授权端点
    pub authorization_endpoint: String,

    /// Token 交换端点
    pub token_endpoint: String,

    /// Token 信息端点
    pub token_info_endpoint: String,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: "YOUR_CLIENT_ID.apps.googleusercontent.com".to_string(),
            client_secret: "YOUR_CLIENT_SECRET".to_string(),
            redirect_uri: "http://localhost:8080".to_string(),
            scopes: vec![
                "https://www.googleapis.com/auth/gmail.send".to_string(), // 发送邮件
                "https://www.googleapis.com/auth/gmail.readonly".to_string(), // 读取邮件
                "https://www.googleapis.com/auth/gmail.labels".to_string(), // 标签
                "https://www.googleapis.com/auth/gmail.modify".to_string(), // 删除/移入回收站
            ],
            authorization_endpoint: GOOGLE_AUTH_ENDPOINT.to_string(),
            token_endpoint: GOOGLE_TOKEN_ENDPOINT.to_string(),
            token_info_endpoint: GOOGLE_TOKEN_INFO_ENDPOINT.to_string(),
        }
    }
}

impl OAuthConfig {
    /// 验证配置是否为默认占位符
    ///
    /// 用于检查用户是否已正确配置 OAuth2 凭据
    pub fn is_placeholder(&self) -> bool {
        self.client_id.contains("YOUR_CLIENT_ID")
            || self.client_secret.contains("YOUR_CLIENT_SECRET")
    }

    /// 用环境变量覆盖凭据
    ///
    /// 只有 `GMAIL_CLIENT_ID` 与 `GMAIL_CLIENT_SECRET` 同时存在时才生效，
    /// `OAUTH_REDIRECT_URI` 可选
    pub fn apply_env(&mut self) -> bool {
        let (Ok(client_id), Ok(client_secret)) = (
            std::env::var("GMAIL_CLIENT_ID"),
            std::env::var("GMAIL_CLIENT_SECRET"),
        ) else {
            return false;
        };

        self.client_id = client_id;
        self.client_secret = client_secret;

        if let Ok(redirect_uri) = std::env::var("OAUTH_REDIRECT_URI") {
            self.redirect_uri = redirect_uri;
        }

        true
    }

    pub fn client_id(&self) -> ClientId {
        ClientId::new(self.client_id.clone())
    }

    pub fn client_secret(&self) -> ClientSecret {
        ClientSecret::new(self.client_secret.clone())
    }

    pub fn auth_url(&self) -> Result<AuthUrl, url::ParseError> {
        AuthUrl::new(self.authorization_endpoint.clone())
    }

    pub fn token_url(&self) -> Result<TokenUrl, url::ParseError> {
        TokenUrl::new(self.token_endpoint.clone())
    }

    pub fn redirect_url(&self) -> Result<RedirectUrl, url::ParseError> {
        RedirectUrl::new(self.redirect_uri.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OAuthConfig::default();
        assert!(config.is_placeholder());
        assert_eq!(config.redirect_uri, "http://localhost:8080");
        assert_eq!(config.scopes.len(), 4);
        assert!(config.scopes.iter().any(|s| s.ends_with("gmail.modify")));
        assert_eq!(config.token_endpoint, GOOGLE_TOKEN_ENDPOINT);
    }

    #[test]
    fn test_is_placeholder() {
        let mut config = OAuthConfig::default();
        assert!(config.is_placeholder());

        config.client_id = "real-client-id.apps.googleusercontent.com".to_string();
        config.client_secret = "real-secret".to_string();
        assert!(!config.is_placeholder());
    }

    #[test]
    fn test_endpoint_validation() {
        let mut config = OAuthConfig::default();
        assert!(config.auth_url().is_ok());
        assert!(config.token_url().is_ok());
        assert!(config.redirect_url().is_ok());

        config.token_endpoint = "not a url".to_string();
        assert!(config.token_url().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: OAuthConfig = toml::from_str(
            r#"
            client_id = "id-from-file"
            client_secret = "secret-from-file"
            "#,
        )
        .unwrap();

        assert_eq!(config.client_id, "id-from-file");
        assert_eq!(config.authorization_endpoint, GOOGLE_AUTH_ENDPOINT);
        assert_eq!(config.scopes.len(), 4);
    }
}
