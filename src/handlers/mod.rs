/// 邮箱操作入口
///
/// 对应前端表单的提交动作：登录回调、写信、读信、搜索、删除。
/// 所有协作者（认证、API 客户端）在构造时注入，会话通过 `RequestContext` 显式传入。
use oauth2::{AccessToken, AuthorizationCode};
use std::collections::BTreeMap;
use url::Url;

use crate::mail::gmail::api::{DEFAULT_MAX_RESULTS, GmailApiClient, MailError};
use crate::mail::gmail::oauth::{AuthError, AuthFlow};
use crate::mail::gmail::types::{MessageSummary, ProviderResponse, SendRequest};
use crate::session::{RequestContext, SessionError};

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("认证失败: {0}")]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Mail(#[from] MailError),
}

/// 写信提交结果
#[derive(Debug)]
pub enum ComposeOutcome {
    Sent(ProviderResponse),
    DraftSaved(ProviderResponse),
}

/// 批量删除结果
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DeleteReport {
    pub deleted: Vec<String>,
    /// 被跳过的空 ID 数量
    pub skipped: usize,
}

pub struct MailboxHandlers {
    auth: AuthFlow,
    client: GmailApiClient,
}

impl MailboxHandlers {
    pub fn new(auth: AuthFlow, client: GmailApiClient) -> Self {
        Self { auth, client }
    }

    pub fn auth(&self) -> &AuthFlow {
        &self.auth
    }

    pub fn client(&self) -> &GmailApiClient {
        &self.client
    }

    /// 登录链接
    pub fn authorization_url(&self) -> Result<Url, HandlerError> {
        Ok(self.auth.authorization_url()?)
    }

    /// 处理 OAuth2 回调：交换授权码并写入会话
    pub async fn handle_oauth_callback(
        &self,
        ctx: &RequestContext<'_>,
        code: &str,
    ) -> Result<AccessToken, HandlerError> {
        let token = self
            .auth
            .exchange_code_for_token(&AuthorizationCode::new(code.to_string()))
            .await?;

        ctx.store_access_token(&token);
        tracing::info!("✅ 认证成功，Token 已写入会话");

        Ok(token)
    }

    /// 检测会话中的 Token 是否仍然有效
    pub async fn check_session(&self, ctx: &RequestContext<'_>) -> Result<bool, HandlerError> {
        let token = ctx.access_token()?;
        Ok(self.auth.check_token_valid(&token).await)
    }

    /// 写信提交：存草稿或发送，发送成功后按需打标签
    pub async fn submit_compose(
        &self,
        ctx: &RequestContext<'_>,
        request: &SendRequest,
    ) -> Result<ComposeOutcome, HandlerError> {
        let token = ctx.access_token()?;

        if request.to.trim().is_empty() {
            return Err(MailError::InvalidArgument("收件人不能为空".to_string()).into());
        }

        if request.is_draft {
            let response = self.client.save_draft(&token, request).await?;
            return Ok(ComposeOutcome::DraftSaved(response));
        }

        let response = self.client.send_email(&token, request).await?;

        if let Some(label_id) = request.label_id.as_deref().filter(|l| !l.is_empty()) {
            self.apply_label(&token, &response, label_id).await;
        }

        Ok(ComposeOutcome::Sent(response))
    }

    /// 打标签失败不影响发送结果，只记录日志
    async fn apply_label(&self, token: &AccessToken, sent: &ProviderResponse, label_id: &str) {
        let Some(message_id) = sent.get("id").and_then(|id| id.as_str()) else {
            tracing::warn!("⚠️ 发送响应中没有邮件 ID，无法添加标签 {}", label_id);
            return;
        };

        match self
            .client
            .modify_labels(token, message_id, &[label_id.to_string()], &[])
            .await
        {
            Ok(_) => tracing::info!("✅ 已为邮件 {} 添加标签 {}", message_id, label_id),
            Err(e) => tracing::warn!("⚠️ 添加标签失败: {}", e),
        }
    }

    /// 读取最近的邮件
    pub async fn read_emails(
        &self,
        ctx: &RequestContext<'_>,
        max_results: Option<u32>,
    ) -> Result<Vec<MessageSummary>, HandlerError> {
        let token = ctx.access_token()?;
        let max_results = max_results.unwrap_or(DEFAULT_MAX_RESULTS);
        Ok(self.client.list_messages(&token, max_results).await?)
    }

    /// 搜索邮件
    pub async fn search_emails(
        &self,
        ctx: &RequestContext<'_>,
        query: &str,
        label: Option<&str>,
    ) -> Result<Vec<MessageSummary>, HandlerError> {
        let token = ctx.access_token()?;
        Ok(self.client.search_messages(&token, query, label).await?)
    }

    /// 可选标签（ID → 名称）
    pub async fn available_labels(
        &self,
        ctx: &RequestContext<'_>,
    ) -> Result<BTreeMap<String, String>, HandlerError> {
        let token = ctx.access_token()?;
        let labels = self.client.get_labels(&token).await?;

        Ok(labels.into_iter().map(|l| (l.id, l.name)).collect())
    }

    /// 删除选中的邮件
    ///
    /// 空 ID 跳过；遇到第一封删除失败的邮件即停止
    pub async fn delete_selected(
        &self,
        ctx: &RequestContext<'_>,
        ids: &[String],
    ) -> Result<DeleteReport, HandlerError> {
        if ids.iter().all(|id| id.trim().is_empty()) {
            return Err(MailError::InvalidArgument("没有选择要删除的邮件".to_string()).into());
        }

        let token = ctx.access_token()?;
        tracing::debug!("准备删除 {} 封邮件", ids.len());

        let mut report = DeleteReport::default();
        for id in ids {
            if id.trim().is_empty() {
                tracing::warn!("⚠️ 跳过空的邮件 ID");
                report.skipped += 1;
                continue;
            }

            self.client.delete_message(&token, id).await?;
            report.deleted.push(id.clone());
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OAuthConfig;
    use crate::session::{ACCESS_TOKEN_KEY, MemorySessionStore, SessionStore};
    use reqwest::Client;
    use serde_json::json;
    use wiremock::matchers::{any, body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_handlers(server: &MockServer) -> MailboxHandlers {
        let config = OAuthConfig {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            token_endpoint: format!("{}/token", server.uri()),
            token_info_endpoint: format!("{}/tokeninfo", server.uri()),
            ..OAuthConfig::default()
        };

        MailboxHandlers::new(
            AuthFlow::new(config, Client::new()),
            GmailApiClient::new(Client::new()).with_api_base(format!("{}/me", server.uri())),
        )
    }

    fn logged_in_store() -> MemorySessionStore {
        let store = MemorySessionStore::new();
        store.set(ACCESS_TOKEN_KEY, "tok1".to_string());
        store
    }

    #[tokio::test]
    async fn test_oauth_callback_stores_token() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "tok1",
                "expires_in": 3599,
                "token_type": "Bearer",
            })))
            .mount(&server)
            .await;

        let handlers = make_handlers(&server);
        let store = MemorySessionStore::new();
        let ctx = RequestContext::new(&store);

        handlers.handle_oauth_callback(&ctx, "abc123").await.unwrap();
        assert_eq!(store.get(ACCESS_TOKEN_KEY).as_deref(), Some("tok1"));
    }

    #[tokio::test]
    async fn test_failed_callback_leaves_session_empty() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
            })))
            .mount(&server)
            .await;

        let handlers = make_handlers(&server);
        let store = MemorySessionStore::new();
        let ctx = RequestContext::new(&store);

        let err = handlers.handle_oauth_callback(&ctx, "abc123").await.unwrap_err();
        assert!(err.to_string().contains("invalid_grant"));
        assert!(!ctx.is_authenticated());
    }

    #[tokio::test]
    async fn test_unauthenticated_requests_make_no_calls() {
        let server = MockServer::start().await;

        Mock::given(any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let handlers = make_handlers(&server);
        let store = MemorySessionStore::new();
        let ctx = RequestContext::new(&store);

        let err = handlers.read_emails(&ctx, None).await.unwrap_err();
        assert!(matches!(
            err,
            HandlerError::Session(SessionError::NotAuthenticated)
        ));

        let err = handlers
            .delete_selected(&ctx, &["m1".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Session(_)));
    }

    #[tokio::test]
    async fn test_compose_draft_uses_drafts_endpoint() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/me/drafts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "d1"})))
            .expect(1)
            .mount(&server)
            .await;

        let handlers = make_handlers(&server);
        let store = logged_in_store();
        let ctx = RequestContext::new(&store);

        let request = SendRequest {
            to: "a@example.com".to_string(),
            is_draft: true,
            ..Default::default()
        };

        let outcome = handlers.submit_compose(&ctx, &request).await.unwrap();
        assert!(matches!(outcome, ComposeOutcome::DraftSaved(_)));
    }

    #[tokio::test]
    async fn test_compose_send_applies_label() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/me/messages/send"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "m9"})))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/me/messages/m9/modify"))
            .and(body_json(json!({
                "addLabelIds": ["Label_3"],
                "removeLabelIds": [],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "m9"})))
            .expect(1)
            .mount(&server)
            .await;

        let handlers = make_handlers(&server);
        let store = logged_in_store();
        let ctx = RequestContext::new(&store);

        let request = SendRequest {
            to: "a@example.com".to_string(),
            subject: "Report".to_string(),
            label_id: Some("Label_3".to_string()),
            ..Default::default()
        };

        let outcome = handlers.submit_compose(&ctx, &request).await.unwrap();
        assert!(matches!(outcome, ComposeOutcome::Sent(_)));
    }

    #[tokio::test]
    async fn test_compose_label_failure_is_not_fatal() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/me/messages/send"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "m9"})))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/me/messages/m9/modify"))
            .respond_with(ResponseTemplate::new(400).set_body_string("Invalid label"))
            .expect(1)
            .mount(&server)
            .await;

        let handlers = make_handlers(&server);
        let store = logged_in_store();
        let ctx = RequestContext::new(&store);

        let request = SendRequest {
            to: "a@example.com".to_string(),
            subject: "Report".to_string(),
            label_id: Some("Label_missing".to_string()),
            ..Default::default()
        };

        assert!(handlers.submit_compose(&ctx, &request).await.is_ok());
    }

    #[tokio::test]
    async fn test_available_labels_map() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/me/labels"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "labels": [
                    {"id": "Label_2", "name": "Travel"},
                    {"id": "INBOX", "name": "INBOX"},
                ]
            })))
            .mount(&server)
            .await;

        let handlers = make_handlers(&server);
        let store = logged_in_store();
        let ctx = RequestContext::new(&store);

        let labels = handlers.available_labels(&ctx).await.unwrap();
        assert_eq!(labels.get("Label_2").map(String::as_str), Some("Travel"));
        assert_eq!(labels.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_selected_skips_blank_ids() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .expect(2)
            .mount(&server)
            .await;

        let handlers = make_handlers(&server);
        let store = logged_in_store();
        let ctx = RequestContext::new(&store);

        let ids = vec!["m1".to_string(), " ".to_string(), "m2".to_string()];
        let report = handlers.delete_selected(&ctx, &ids).await.unwrap();

        assert_eq!(
            report,
            DeleteReport {
                deleted: vec!["m1".to_string(), "m2".to_string()],
                skipped: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_delete_selected_requires_selection() {
        let server = MockServer::start().await;
        let handlers = make_handlers(&server);
        let store = logged_in_store();
        let ctx = RequestContext::new(&store);

        let err = handlers.delete_selected(&ctx, &[]).await.unwrap_err();
        assert!(matches!(
            err,
            HandlerError::Mail(MailError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_selected_stops_at_first_failure() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/me/messages/bad"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/me/messages/bad/trash"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/me/messages/later"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let handlers = make_handlers(&server);
        let store = logged_in_store();
        let ctx = RequestContext::new(&store);

        let ids = vec!["bad".to_string(), "later".to_string()];
        let err = handlers.delete_selected(&ctx, &ids).await.unwrap_err();
        assert!(matches!(
            err,
            HandlerError::Mail(MailError::DeleteFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_check_session() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/tokeninfo"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let handlers = make_handlers(&server);
        let store = logged_in_store();
        let ctx = RequestContext::new(&store);

        assert!(handlers.check_session(&ctx).await.unwrap());
    }
}
