/// Gmail API 调用模块
///
/// 每个操作都是一次独立的请求/响应，客户端不保存任何跨调用状态。
/// Access Token 由调用方传入，这里不做刷新；过期时表现为 `ApiFailure`（通常是 401）。
use oauth2::AccessToken;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::mail::gmail::mime::build_mime_message;
use crate::mail::gmail::oauth::mask_token;
use crate::mail::gmail::types::{
    Label, LabelListResponse, MessageDetail, MessageListResponse, MessageSummary,
    ProviderResponse, SendRequest,
};

const DEFAULT_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// 搜索时固定的最大结果数
pub const SEARCH_MAX_RESULTS: u32 = 50;

/// 列表默认条数
pub const DEFAULT_MAX_RESULTS: u32 = 10;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("参数无效: {0}")]
    InvalidArgument(String),

    #[error("{action}失败{}: {body}", status_suffix(.status))]
    ApiFailure {
        action: &'static str,
        status: Option<u16>,
        body: String,
    },

    /// 列表响应中没有 `messages` 字段（只在内部使用，公开接口返回空列表）
    #[error("响应中没有邮件")]
    NoMessages,

    #[error("删除邮件失败: {delete}; 移入回收站也失败: {trash}")]
    DeleteFailed {
        delete: Box<MailError>,
        trash: Box<MailError>,
    },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

impl MailError {
    fn transport(action: &'static str, err: reqwest::Error) -> Self {
        Self::ApiFailure {
            action,
            status: None,
            body: err.to_string(),
        }
    }

    /// 服务端返回的 HTTP 状态码（传输错误时为 None）
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ApiFailure { status, .. } => *status,
            _ => None,
        }
    }
}

/// Gmail API 客户端
#[derive(Debug, Clone)]
pub struct GmailApiClient {
    http: Client,
    api_base: String,
}

impl GmailApiClient {
    /// 创建新的 Gmail API 客户端
    ///
    /// # Arguments
    /// * `http` - 共享的 HTTP 客户端（带超时配置）
    pub fn new(http: Client) -> Self {
        Self {
            http,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// 替换 API 根地址（形如 `.../gmail/v1/users/me`）
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// 发送邮件
    ///
    /// 收件人和主题不能为空，正文可以为空
    pub async fn send_email(
        &self,
        token: &AccessToken,
        request: &SendRequest,
    ) -> Result<ProviderResponse, MailError> {
        if request.to.trim().is_empty() {
            return Err(MailError::InvalidArgument("收件人不能为空".to_string()));
        }
        if request.subject.trim().is_empty() {
            return Err(MailError::InvalidArgument("主题不能为空".to_string()));
        }

        let raw = raw_message(request);
        let url = format!("{}/messages/send", self.api_base);

        tracing::debug!("发送邮件: to={}, 附件 {} 个", request.to, request.attachments.len());

        let response = self
            .send_json::<ProviderResponse>(
                "发送邮件",
                self.http.post(&url).json(&json!({ "raw": raw })),
                token,
            )
            .await?;

        tracing::info!("✅ 邮件已发送: {}", request.to);
        Ok(response)
    }

    /// 保存草稿
    pub async fn save_draft(
        &self,
        token: &AccessToken,
        request: &SendRequest,
    ) -> Result<ProviderResponse, MailError> {
        let raw = raw_message(request);
        let url = format!("{}/drafts", self.api_base);

        let response = self
            .send_json::<ProviderResponse>(
                "保存草稿",
                self.http
                    .post(&url)
                    .json(&json!({ "message": { "raw": raw } })),
                token,
            )
            .await?;

        tracing::info!("✅ 草稿已保存");
        Ok(response)
    }

    /// 获取最近的邮件摘要
    ///
    /// 一次列表请求 + 每封邮件一次详情请求；详情失败的邮件会被跳过
    pub async fn list_messages(
        &self,
        token: &AccessToken,
        max_results: u32,
    ) -> Result<Vec<MessageSummary>, MailError> {
        let url = format!("{}/messages", self.api_base);
        let request = self
            .http
            .get(&url)
            .query(&[("maxResults", max_results)]);

        match self.list_message_ids("获取邮件", request, token).await {
            Ok(ids) => Ok(self.fetch_summaries(token, ids).await),
            Err(MailError::NoMessages) => {
                tracing::info!("📭 没有邮件");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    /// 按文本和标签搜索邮件
    pub async fn search_messages(
        &self,
        token: &AccessToken,
        query: &str,
        label: Option<&str>,
    ) -> Result<Vec<MessageSummary>, MailError> {
        let q = build_search_query(query, label);
        let url = format!("{}/messages", self.api_base);
        let request = self
            .http
            .get(&url)
            .query(&[("q", q.as_str())])
            .query(&[("maxResults", SEARCH_MAX_RESULTS)]);

        tracing::debug!("搜索邮件: q={:?}", q);

        match self.list_message_ids("搜索邮件", request, token).await {
            Ok(ids) => Ok(self.fetch_summaries(token, ids).await),
            Err(MailError::NoMessages) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// 获取所有标签
    pub async fn get_labels(&self, token: &AccessToken) -> Result<Vec<Label>, MailError> {
        let url = format!("{}/labels", self.api_base);
        let response: LabelListResponse = self
            .send_json("获取标签", self.http.get(&url), token)
            .await?;

        match response.labels {
            Some(labels) => Ok(labels),
            None => {
                tracing::warn!("⚠️ 标签响应缺少 labels 字段，返回空列表");
                Ok(Vec::new())
            }
        }
    }

    /// 删除邮件
    ///
    /// 先尝试永久删除（必须是 204），失败则移入回收站（必须是 200）；
    /// 两者都失败时返回 `DeleteFailed`，同时携带两次的错误
    pub async fn delete_message(
        &self,
        token: &AccessToken,
        message_id: &str,
    ) -> Result<(), MailError> {
        if message_id.trim().is_empty() {
            tracing::error!("邮件 ID 为空");
            return Err(MailError::InvalidArgument("邮件 ID 不能为空".to_string()));
        }

        let delete_err = match self.hard_delete(token, message_id).await {
            Ok(()) => {
                tracing::info!("✅ 邮件已删除: {}", message_id);
                return Ok(());
            }
            Err(e) => e,
        };

        tracing::warn!("⚠️ 删除邮件 {} 失败，尝试移入回收站: {}", message_id, delete_err);

        match self.trash(token, message_id).await {
            Ok(()) => {
                tracing::info!("✅ 邮件已移入回收站: {}", message_id);
                Ok(())
            }
            Err(trash_err) => {
                tracing::error!("❌ 移入回收站也失败: {}", trash_err);
                Err(MailError::DeleteFailed {
                    delete: Box::new(delete_err),
                    trash: Box::new(trash_err),
                })
            }
        }
    }

    /// 给邮件添加/移除标签
    pub async fn modify_labels(
        &self,
        token: &AccessToken,
        message_id: &str,
        add: &[String],
        remove: &[String],
    ) -> Result<ProviderResponse, MailError> {
        if message_id.trim().is_empty() {
            return Err(MailError::InvalidArgument("邮件 ID 不能为空".to_string()));
        }

        let url = format!("{}/messages/{}/modify", self.api_base, message_id);
        self.send_json(
            "修改标签",
            self.http.post(&url).json(&json!({
                "addLabelIds": add,
                "removeLabelIds": remove,
            })),
            token,
        )
        .await
    }

    async fn hard_delete(&self, token: &AccessToken, message_id: &str) -> Result<(), MailError> {
        let url = format!("{}/messages/{}", self.api_base, message_id);
        self.expect_status("删除邮件", self.http.delete(&url), token, StatusCode::NO_CONTENT)
            .await
    }

    async fn trash(&self, token: &AccessToken, message_id: &str) -> Result<(), MailError> {
        let url = format!("{}/messages/{}/trash", self.api_base, message_id);
        self.expect_status("移入回收站", self.http.post(&url), token, StatusCode::OK)
            .await
    }

    /// 列表请求，返回邮件 ID；没有 `messages` 字段时返回 `NoMessages`
    async fn list_message_ids(
        &self,
        action: &'static str,
        request: RequestBuilder,
        token: &AccessToken,
    ) -> Result<Vec<String>, MailError> {
        let response: MessageListResponse = self.send_json(action, request, token).await?;

        let messages = response.messages.ok_or(MailError::NoMessages)?;
        tracing::debug!("{}: 列表返回 {} 封", action, messages.len());

        Ok(messages.into_iter().map(|m| m.id).collect())
    }

    /// 逐封获取详情（不批量），失败的跳过
    async fn fetch_summaries(&self, token: &AccessToken, ids: Vec<String>) -> Vec<MessageSummary> {
        let mut summaries = Vec::with_capacity(ids.len());

        for id in ids {
            match self.get_message_details(token, &id).await {
                Ok(detail) => summaries.push(detail.into_summary(id)),
                Err(e) => {
                    tracing::warn!("⚠️ 获取邮件 {} 详情失败，已跳过: {}", id, e);
                }
            }
        }

        summaries
    }

    async fn get_message_details(
        &self,
        token: &AccessToken,
        message_id: &str,
    ) -> Result<MessageDetail, MailError> {
        let url = format!("{}/messages/{}", self.api_base, message_id);
        let request = self.http.get(&url).query(&[
            ("format", "metadata"),
            ("metadataHeaders", "Subject"),
            ("metadataHeaders", "From"),
            ("metadataHeaders", "Date"),
        ]);

        self.send_json("获取邮件详情", request, token).await
    }

    /// 发送请求，2xx 时解析 JSON；其余情况转换为 `ApiFailure`
    async fn send_json<T: DeserializeOwned>(
        &self,
        action: &'static str,
        request: RequestBuilder,
        token: &AccessToken,
    ) -> Result<T, MailError> {
        let response = request
            .bearer_auth(token.secret())
            .send()
            .await
            .map_err(|e| {
                tracing::error!("❌ {}请求失败 (token {}): {}", action, mask_token(token.secret()), e);
                MailError::transport(action, e)
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| MailError::transport(action, e))?;

        if !status.is_success() {
            tracing::error!("❌ {}: Gmail API 返回错误 {}: {}", action, status, body);
            return Err(MailError::ApiFailure {
                action,
                status: Some(status.as_u16()),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!("❌ {}: 解析响应失败: {}", action, e);
            MailError::ApiFailure {
                action,
                status: Some(status.as_u16()),
                body: format!("无法解析响应 ({}): {}", e, body),
            }
        })
    }

    /// 发送请求，只有状态码严格等于 `expected` 才算成功
    async fn expect_status(
        &self,
        action: &'static str,
        request: RequestBuilder,
        token: &AccessToken,
        expected: StatusCode,
    ) -> Result<(), MailError> {
        let response = request
            .bearer_auth(token.secret())
            .send()
            .await
            .map_err(|e| MailError::transport(action, e))?;

        let status = response.status();
        if status == expected {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(MailError::ApiFailure {
            action,
            status: Some(status.as_u16()),
            body,
        })
    }
}

fn raw_message(request: &SendRequest) -> String {
    build_mime_message(
        &request.to,
        &request.subject,
        &request.body,
        &request.attachments,
        request.is_html,
    )
}

/// 拼接搜索条件：自由文本 + `label:<标签>`，空的部分省略
fn build_search_query(query: &str, label: Option<&str>) -> String {
    let mut parts = Vec::new();

    let query = query.trim();
    if !query.is_empty() {
        parts.push(query.to_string());
    }
    if let Some(label) = label.map(str::trim).filter(|l| !l.is_empty()) {
        parts.push(format!("label:{}", label));
    }

    parts.join(" ")
}
