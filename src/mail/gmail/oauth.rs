/// Gmail OAuth2 授权码流程
///
/// 负责三件事：
/// 1. 生成授权 URL（纯函数，不发请求）
/// 2. 用授权码交换 Access Token（只请求一次，不重试）
/// 3. 检测 Access Token 是否仍然有效（尽力而为）
use oauth2::{AccessToken, AuthorizationCode};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use url::Url;

use crate::config::OAuthConfig;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Token 交换失败: {0}")]
    ExchangeFailed(String),

    #[error("OAuth2 配置无效: {0}")]
    InvalidConfig(String),
}

/// Token 端点响应（只关心 access_token）
#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    access_token: Option<String>,
}

/// 生成授权 URL
///
/// 参数顺序固定：client_id, redirect_uri, response_type, scope, access_type, prompt
pub fn build_authorization_url(config: &OAuthConfig) -> Result<Url, AuthError> {
    let auth_url = config
        .auth_url()
        .map_err(|e| AuthError::InvalidConfig(format!("授权端点: {}", e)))?;
    let redirect_url = config
        .redirect_url()
        .map_err(|e| AuthError::InvalidConfig(format!("redirect_uri: {}", e)))?;

    let mut url = auth_url.url().clone();
    url.query_pairs_mut()
        .append_pair("client_id", &config.client_id())
        .append_pair("redirect_uri", redirect_url.as_str())
        .append_pair("response_type", "code")
        .append_pair("scope", &config.scopes.join(" "))
        .append_pair("access_type", "offline")
        .append_pair("prompt", "consent");

    Ok(url)
}

/// OAuth2 认证协调器
///
/// 只持有不可变配置和注入的 HTTP 客户端，本身无状态
#[derive(Debug, Clone)]
pub struct AuthFlow {
    config: OAuthConfig,
    http: Client,
}

impl AuthFlow {
    pub fn new(config: OAuthConfig, http: Client) -> Self {
        Self { config, http }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    pub fn authorization_url(&self) -> Result<Url, AuthError> {
        build_authorization_url(&self.config)
    }

    /// 交换授权码为 Access Token
    ///
    /// 只有 HTTP 200 且响应里带 `access_token` 才算成功，
    /// 其余情况返回 `ExchangeFailed`，携带服务端响应体或传输错误信息
    pub async fn exchange_code_for_token(
        &self,
        code: &AuthorizationCode,
    ) -> Result<AccessToken, AuthError> {
        if code.secret().is_empty() {
            return Err(AuthError::ExchangeFailed("授权码为空".to_string()));
        }

        let token_url = self
            .config
            .token_url()
            .map_err(|e| AuthError::InvalidConfig(format!("Token 端点: {}", e)))?;

        tracing::debug!("交换 Token，redirect_uri: {}", self.config.redirect_uri);

        let client_id = self.config.client_id();
        let client_secret = self.config.client_secret();
        let params = [
            ("code", code.secret().as_str()),
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.secret().as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let response = self
            .http
            .post(token_url.url().clone())
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("❌ Token 交换请求失败: {}", e);
                AuthError::ExchangeFailed(e.to_string())
            })?;

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => format!("读取响应失败: {}", e),
        };

        if status != StatusCode::OK {
            tracing::error!("❌ Token 端点返回错误 {}: {}", status, body);
            return Err(AuthError::ExchangeFailed(body));
        }

        let parsed: TokenEndpointResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::error!("❌ 解析 Token 响应失败: {}", e);
            AuthError::ExchangeFailed(body.clone())
        })?;

        match parsed.access_token {
            Some(token) if !token.is_empty() => {
                tracing::info!("✅ Token 交换成功");
                tracing::debug!("Access Token: {}", mask_token(&token));
                Ok(AccessToken::new(token))
            }
            _ => {
                tracing::error!("❌ Token 响应缺少 access_token 字段");
                Err(AuthError::ExchangeFailed(body))
            }
        }
    }

    /// 检测 Access Token 是否有效
    ///
    /// 只有 HTTP 200 返回 true，任何错误都返回 false
    pub async fn check_token_valid(&self, token: &AccessToken) -> bool {
        let result = self
            .http
            .get(&self.config.token_info_endpoint)
            .query(&[("access_token", token.secret().as_str())])
            .bearer_auth(token.secret())
            .send()
            .await;

        match result {
            Ok(response) if response.status() == StatusCode::OK => true,
            Ok(response) => {
                tracing::debug!("Token 检测未通过: HTTP {}", response.status());
                false
            }
            Err(e) => {
                tracing::warn!("Token 检测请求失败: {}", e);
                false
            }
        }
    }
}

/// 日志里只显示 Token 的首尾几位
pub(crate) fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 10 {
        return "*".repeat(chars.len());
    }

    let head: String = chars[..5].iter().collect();
    let tail: String = chars[chars.len() - 5..].iter().collect();
    format!("{}...{}", head, tail)
}
