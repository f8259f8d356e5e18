/// 交互式登录
///
/// 在本地启动一个只接收一次请求的 HTTP 服务器作为 redirect_uri，
/// 打开浏览器让用户授权，收到回调后交换 Token 并写入会话
use anyhow::{Context, Result};
use oauth2::{AccessToken, AuthorizationCode};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tiny_http::{Header, Response, Server};
use tokio::sync::oneshot;
use url::Url;

use crate::mail::gmail::oauth::AuthFlow;
use crate::session::RequestContext;

/// OAuth2 回调超时时间（秒）
const CALLBACK_TIMEOUT_SECS: u64 = 120;

/// OAuth2 成功页面 HTML
const SUCCESS_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>授权成功 - MailGate</title>
    <style>
        body { font-family: -apple-system, "Segoe UI", Arial, sans-serif; text-align: center; margin-top: 15vh; }
        h1 { color: #4caf50; }
        p { color: #666; }
    </style>
</head>
<body>
    <h1>✓ 授权成功</h1>
    <p>Gmail 账户已连接，可以关闭此页面并返回终端。</p>
</body>
</html>"#;

/// OAuth2 错误页面 HTML
const ERROR_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>授权失败 - MailGate</title>
    <style>
        body { font-family: -apple-system, "Segoe UI", Arial, sans-serif; text-align: center; margin-top: 15vh; }
        h1 { color: #f44336; }
        p { color: #666; }
    </style>
</head>
<body>
    <h1>✗ 授权失败</h1>
    <p>Gmail 账户连接失败，请返回终端查看错误信息。</p>
</body>
</html>"#;

/// 回调请求的解析结果
#[derive(Debug, PartialEq, Eq)]
enum CallbackResult {
    Code(String),
    Denied(String),
    Invalid(&'static str),
}

/// 执行交互式 OAuth2 登录
///
/// 1. 生成授权 URL
/// 2. 在 redirect_uri 对应的本地端口上监听
/// 3. 打开浏览器
/// 4. 等待回调（带超时）
/// 5. 交换 Token 并写入会话
pub async fn authenticate(flow: &AuthFlow, ctx: &RequestContext<'_>) -> Result<AccessToken> {
    run_login(
        flow,
        ctx,
        Duration::from_secs(CALLBACK_TIMEOUT_SECS),
        open_browser,
    )
    .await
}

fn open_browser(auth_url: &Url) {
    if let Err(e) = webbrowser::open(auth_url.as_str()) {
        tracing::warn!("无法打开浏览器 ({})，请手动访问：", e);
    }
    println!("请在浏览器中完成授权：\n{}", auth_url);
}

async fn run_login<F>(
    flow: &AuthFlow,
    ctx: &RequestContext<'_>,
    timeout: Duration,
    launch: F,
) -> Result<AccessToken>
where
    F: FnOnce(&Url),
{
    tracing::info!("🔐 开始 Gmail OAuth2 认证流程");

    if flow.config().is_placeholder() {
        anyhow::bail!(
            "OAuth2 配置无效：请设置环境变量 GMAIL_CLIENT_ID / GMAIL_CLIENT_SECRET 或创建配置文件"
        );
    }

    let auth_url = flow.authorization_url()?;
    let port = callback_port(&flow.config().redirect_uri)?;

    let server = bind_local_server(port)?;
    tracing::info!("✅ 本地服务器启动: http://localhost:{}", port);

    let (code_tx, code_rx) = oneshot::channel();
    let listener = Arc::clone(&server);
    let server_handle = std::thread::spawn(move || wait_for_callback(&listener, code_tx));

    launch(&auth_url);

    let received_code = match tokio::time::timeout(timeout, code_rx).await {
        Ok(Ok(code)) => code,
        // 监听线程提前退出（用户拒绝授权等），返回线程自身的错误
        Ok(Err(_)) => {
            join_listener(server_handle)?;
            anyhow::bail!("本地服务器在收到授权码前退出");
        }
        Err(_) => {
            server.unblock();
            if let Err(e) = join_listener(server_handle) {
                tracing::debug!("监听线程退出: {:#}", e);
            }
            anyhow::bail!("授权超时：用户未在规定时间内完成授权");
        }
    };

    join_listener(server_handle).context("服务器关闭时出错")?;
    tracing::info!("✅ 收到授权回调");

    let token = flow
        .exchange_code_for_token(&received_code)
        .await
        .context("Token 交换失败")?;

    ctx.store_access_token(&token);
    tracing::info!("🎉 OAuth2 认证流程完成");

    Ok(token)
}

fn join_listener(handle: JoinHandle<Result<()>>) -> Result<()> {
    handle
        .join()
        .map_err(|_| anyhow::anyhow!("服务器线程 panic"))?
}

/// 从 redirect_uri 中取出本地监听端口
///
/// 只允许 localhost / 127.0.0.1，其它主机无法在本机接收回调
fn callback_port(redirect_uri: &str) -> Result<u16> {
    let url = Url::parse(redirect_uri).context("redirect_uri 不是合法的 URL")?;

    match url.host_str() {
        Some("localhost") | Some("127.0.0.1") => {}
        other => anyhow::bail!(
            "交互式登录要求 redirect_uri 指向本机，当前为: {}",
            other.unwrap_or("<空>")
        ),
    }

    url.port_or_known_default()
        .ok_or_else(|| anyhow::anyhow!("redirect_uri 缺少端口"))
}

/// 解析回调请求的 URL（path + query）
fn parse_callback(request_url: &str) -> CallbackResult {
    let Ok(parsed) = Url::parse(&format!("http://localhost{}", request_url)) else {
        return CallbackResult::Invalid("回调 URL 无法解析");
    };

    let params: HashMap<_, _> = parsed.query_pairs().into_owned().collect();

    if let Some(error) = params.get("error") {
        return CallbackResult::Denied(error.clone());
    }

    match params.get("code") {
        Some(code) if !code.is_empty() => CallbackResult::Code(code.clone()),
        _ => CallbackResult::Invalid("回调缺少 code 参数"),
    }
}

/// 在本机端口上启动 HTTP 服务器
fn bind_local_server(port: u16) -> Result<Arc<Server>> {
    let addr = format!("127.0.0.1:{}", port);
    let server = Server::http(&addr).map_err(|e| {
        anyhow::anyhow!("无法启动本地服务器（端口 {} 可能被占用）: {}", port, e)
    })?;

    tracing::debug!("本地服务器监听: {}", addr);
    Ok(Arc::new(server))
}

/// 等待 OAuth2 回调，收到授权码后通过 `code_tx` 交出
///
/// `Server::unblock` 会结束等待并返回 `Ok(())`
fn wait_for_callback(server: &Server, code_tx: oneshot::Sender<AuthorizationCode>) -> Result<()> {
    let html_header = Header::from_bytes(&b"Content-Type"[..], &b"text/html; charset=utf-8"[..])
        .map_err(|_| anyhow::anyhow!("无效的响应头"))?;

    for request in server.incoming_requests() {
        tracing::debug!("收到请求: {}", request.url());

        match parse_callback(request.url()) {
            CallbackResult::Code(code) => {
                let response = Response::from_string(SUCCESS_HTML).with_header(html_header.clone());
                request.respond(response)?;

                code_tx.send(AuthorizationCode::new(code)).ok();
                return Ok(());
            }
            CallbackResult::Denied(error) => {
                tracing::error!("用户拒绝授权: {}", error);
                let response = Response::from_string(ERROR_HTML).with_header(html_header.clone());
                request.respond(response)?;

                return Err(anyhow::anyhow!("用户拒绝授权: {}", error));
            }
            CallbackResult::Invalid(reason) => {
                // 浏览器可能顺带请求 favicon 等，忽略继续等待
                tracing::debug!("忽略请求: {}", reason);
                request.respond(Response::empty(404))?;
            }
        }
    }

    Ok(())
}
