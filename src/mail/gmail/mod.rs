/// Gmail 模块 - OAuth2 认证、MIME 构建与 REST API 调用
pub mod api;
pub mod callback;
pub mod mime;
pub mod oauth;
pub mod types;

// 重新导出常用类型
pub use api::{GmailApiClient, MailError};
pub use mime::{Attachment, build_mime_message};
pub use oauth::{AuthError, AuthFlow};
pub use types::{Label, MessageSummary, ProviderResponse, SendRequest};
