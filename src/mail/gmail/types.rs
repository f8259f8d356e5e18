/// Gmail 数据结构
use serde::{Deserialize, Serialize};

use crate::mail::gmail::mime::Attachment;

/// 缺少 Subject 头时的占位值
pub const NO_SUBJECT: &str = "No subject";

/// 缺少 From / Date 头时的占位值
pub const UNKNOWN: &str = "Unknown";

/// 服务端原样返回的 JSON
pub type ProviderResponse = serde_json::Value;

/// 邮件摘要（列表 + 详情两次请求拼出来，不缓存）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageSummary {
    pub id: String,
    pub subject: String,
    pub from: String,
    pub date: String,
}

/// Gmail 标签
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
}

/// 一次发信 / 存草稿请求
#[derive(Debug, Clone, Default)]
pub struct SendRequest {
    /// 收件人，多个地址用逗号分隔
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<Attachment>,
    pub is_draft: bool,
    pub label_id: Option<String>,
    pub is_html: bool,
}

/// messages.list 响应
#[derive(Debug, Deserialize)]
pub(crate) struct MessageListResponse {
    pub messages: Option<Vec<MessageRef>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessageRef {
    pub id: String,
}

/// messages.get 响应（只取头部）
#[derive(Debug, Default, Deserialize)]
pub(crate) struct MessageDetail {
    #[serde(default)]
    pub payload: MessagePayload,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct MessagePayload {
    #[serde(default)]
    pub headers: Vec<MessageHeader>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessageHeader {
    pub name: String,
    pub value: String,
}

/// labels.list 响应
#[derive(Debug, Deserialize)]
pub(crate) struct LabelListResponse {
    pub labels: Option<Vec<Label>>,
}

impl MessageDetail {
    /// 转为摘要，缺失的头部使用占位值
    pub(crate) fn into_summary(self, id: String) -> MessageSummary {
        let mut subject = None;
        let mut from = None;
        let mut date = None;

        for header in self.payload.headers {
            match header.name.as_str() {
                "Subject" => subject = Some(header.value),
                "From" => from = Some(header.value),
                "Date" => date = Some(header.value),
                _ => {}
            }
        }

        MessageSummary {
            id,
            subject: subject.unwrap_or_else(|| NO_SUBJECT.to_string()),
            from: from.unwrap_or_else(|| UNKNOWN.to_string()),
            date: date.unwrap_or_else(|| UNKNOWN.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_from_headers() {
        let detail: MessageDetail = serde_json::from_str(
            r#"{"id":"m1","payload":{"headers":[
                {"name":"Subject","value":"Hello"},
                {"name":"From","value":"a@example.com"},
                {"name":"Date","value":"Mon, 1 Jan 2024 10:00:00 +0000"},
                {"name":"X-Other","value":"ignored"}
            ]}}"#,
        )
        .unwrap();

        let summary = detail.into_summary("m1".to_string());
        assert_eq!(summary.subject, "Hello");
        assert_eq!(summary.from, "a@example.com");
        assert_eq!(summary.date, "Mon, 1 Jan 2024 10:00:00 +0000");
    }

    #[test]
    fn test_summary_defaults_for_missing_headers() {
        let detail: MessageDetail = serde_json::from_str(r#"{"id":"m2"}"#).unwrap();
        let summary = detail.into_summary("m2".to_string());

        assert_eq!(summary.id, "m2");
        assert_eq!(summary.subject, NO_SUBJECT);
        assert_eq!(summary.from, UNKNOWN);
        assert_eq!(summary.date, UNKNOWN);
    }

    #[test]
    fn test_label_ignores_extra_fields() {
        let labels: LabelListResponse = serde_json::from_str(
            r#"{"labels":[{"id":"INBOX","name":"INBOX","type":"system"}]}"#,
        )
        .unwrap();

        assert_eq!(
            labels.labels.unwrap(),
            vec![Label {
                id: "INBOX".to_string(),
                name: "INBOX".to_string()
            }]
        );
    }
}
