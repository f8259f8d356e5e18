use anyhow::{Context, Result};
use clap::Parser;
use oauth2::AccessToken;

use mailgate::config;
use mailgate::handlers::{ComposeOutcome, MailboxHandlers};
use mailgate::mail::gmail::types::{MessageSummary, SendRequest};
use mailgate::mail::gmail::{Attachment, AuthFlow, GmailApiClient, callback};
use mailgate::session::{MemorySessionStore, RequestContext};
use mailgate::utils::http_client;

mod cli;

use cli::{Cli, Command};

fn main() -> Result<()> {
    // 1. 初始化日志
    init_logger()?;

    let cli = Cli::parse();

    // 2. 创建 Tokio 运行时
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(cli))
}

async fn run(cli: Cli) -> Result<()> {
    // 3. 加载配置并构建共享 HTTP 客户端
    let cfg = config::load(cli.config.as_deref())?;
    let http = http_client::build_client(&cfg.http).unwrap_or_else(|e| {
        tracing::warn!("⚠️ 按配置构建 HTTP 客户端失败: {}, 使用默认客户端", e);
        http_client::default_client()
    });

    let handlers = MailboxHandlers::new(
        AuthFlow::new(cfg.oauth, http.clone()),
        GmailApiClient::new(http),
    );

    // 4. 会话
    let store = MemorySessionStore::new();
    let ctx = RequestContext::new(&store);

    if !matches!(cli.command, Command::Login) {
        match cli.token.as_deref().filter(|t| !t.is_empty()) {
            Some(token) => ctx.store_access_token(&AccessToken::new(token.to_string())),
            None => {
                tracing::info!("未提供 Access Token，进入浏览器登录");
                callback::authenticate(handlers.auth(), &ctx).await?;
            }
        }
    }

    // 5. 执行命令
    match cli.command {
        Command::Login => {
            let token = callback::authenticate(handlers.auth(), &ctx).await?;
            println!("{}", token.secret());
        }
        Command::Check => {
            if handlers.check_session(&ctx).await? {
                println!("✓ Token 有效");
            } else {
                anyhow::bail!("Token 无效或已过期，请重新登录");
            }
        }
        Command::Send {
            to,
            subject,
            body,
            attachments,
            draft,
            label,
            html,
        } => {
            let mut loaded = Vec::with_capacity(attachments.len());
            for path in &attachments {
                let attachment = Attachment::from_path(path)
                    .await
                    .with_context(|| format!("读取附件失败: {}", path.display()))?;
                loaded.push(attachment);
            }

            let request = SendRequest {
                to,
                subject,
                body,
                attachments: loaded,
                is_draft: draft,
                label_id: label,
                is_html: html,
            };

            match handlers.submit_compose(&ctx, &request).await? {
                ComposeOutcome::Sent(response) => println!("✓ 已发送: {}", response),
                ComposeOutcome::DraftSaved(response) => println!("✓ 草稿已保存: {}", response),
            }
        }
        Command::List { max } => {
            let messages = handlers.read_emails(&ctx, Some(max)).await?;
            print_messages(&messages);
        }
        Command::Search { query, label } => {
            let messages = handlers
                .search_emails(&ctx, &query, label.as_deref())
                .await?;
            print_messages(&messages);
        }
        Command::Labels => {
            for (id, name) in handlers.available_labels(&ctx).await? {
                println!("{:<24} {}", id, name);
            }
        }
        Command::Delete { ids } => {
            let report = handlers.delete_selected(&ctx, &ids).await?;
            println!("✓ 已删除 {} 封邮件", report.deleted.len());
            if report.skipped > 0 {
                println!("  跳过 {} 个空 ID", report.skipped);
            }
        }
    }

    Ok(())
}

fn print_messages(messages: &[MessageSummary]) {
    if messages.is_empty() {
        println!("📭 没有邮件");
        return;
    }

    for message in messages {
        println!(
            "{}  {}  {}  {}",
            message.id, message.date, message.from, message.subject
        );
    }
}

/// 初始化日志系统
fn init_logger() -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailgate=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}
