/// MIME 邮件构建
///
/// 生成 multipart/mixed 原始邮件，并按 Gmail `raw` 字段要求做 base64url（无填充）编码
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use chrono::Utc;
use std::path::Path;

/// base64 正文每行最大长度（RFC 2045）
const MAX_LINE_LENGTH: usize = 76;

/// 邮件附件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    /// 从文件读取附件，文件名取路径最后一段
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());

        Ok(Self { filename, bytes })
    }
}

/// 构建邮件并编码为 Gmail `raw` 字段格式
///
/// `to` 可以包含多个逗号分隔的地址
pub fn build_mime_message(
    to: &str,
    subject: &str,
    body: &str,
    attachments: &[Attachment],
    is_html: bool,
) -> String {
    let raw = build_raw_message(to, subject, body, attachments, is_html, &new_boundary());
    URL_SAFE_NO_PAD.encode(raw.as_bytes())
}

/// 每次调用都生成不同的 boundary（时间戳 + 随机数）
fn new_boundary() -> String {
    format!(
        "mailgate_{:x}_{:016x}",
        Utc::now().timestamp_micros(),
        rand::random::<u64>()
    )
}

fn build_raw_message(
    to: &str,
    subject: &str,
    body: &str,
    attachments: &[Attachment],
    is_html: bool,
    boundary: &str,
) -> String {
    let content_type = if is_html { "text/html" } else { "text/plain" };

    let mut raw = String::new();

    // 头部
    raw.push_str(&format!("To: {}\r\n", format_recipients(to)));
    raw.push_str(&format!("Subject: {}\r\n", encode_header(subject)));
    raw.push_str("MIME-Version: 1.0\r\n");
    raw.push_str(&format!(
        "Content-Type: multipart/mixed; boundary=\"{}\"\r\n\r\n",
        boundary
    ));

    // 正文
    raw.push_str(&format!("--{}\r\n", boundary));
    raw.push_str(&format!("Content-Type: {}; charset=UTF-8\r\n\r\n", content_type));
    raw.push_str(body);
    raw.push_str("\r\n\r\n");

    // 附件
    for attachment in attachments {
        let filename = sanitize_filename(&attachment.filename);
        raw.push_str(&format!("--{}\r\n", boundary));
        raw.push_str(&format!(
            "Content-Type: application/octet-stream; name=\"{}\"\r\n",
            filename
        ));
        raw.push_str(&format!(
            "Content-Disposition: attachment; filename=\"{}\"\r\n",
            filename
        ));
        raw.push_str("Content-Transfer-Encoding: base64\r\n\r\n");
        raw.push_str(&wrap_base64(&attachment.bytes));
        raw.push_str("\r\n");
    }

    raw.push_str(&format!("--{}--", boundary));
    raw
}

/// 拆分逗号分隔的收件人，去掉两端空白后用 ", " 重新拼接
fn format_recipients(to: &str) -> String {
    to.split(',')
        .map(|addr| strip_line_breaks(addr.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// 非 ASCII 的头部值使用 RFC 2047 编码
fn encode_header(value: &str) -> String {
    let value = strip_line_breaks(value);
    if value.is_ascii() {
        value
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(value.as_bytes()))
    }
}

/// 头部值中不允许出现换行（防止头部注入）
fn strip_line_breaks(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

fn sanitize_filename(name: &str) -> String {
    strip_line_breaks(name).replace('"', "'")
}

/// base64 编码后按 76 字符折行，每行以 CRLF 结尾
fn wrap_base64(bytes: &[u8]) -> String {
    let encoded = STANDARD.encode(bytes);
    let mut wrapped = String::with_capacity(encoded.len() + encoded.len() / MAX_LINE_LENGTH * 2 + 2);

    // base64 输出只含 ASCII，按字节切分是安全的
    for line in encoded.as_bytes().chunks(MAX_LINE_LENGTH) {
        wrapped.push_str(&String::from_utf8_lossy(line));
        wrapped.push_str("\r\n");
    }

    wrapped
}
