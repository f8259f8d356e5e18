use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Gmail 命令行客户端", long_about = None)]
pub struct Cli {
    /// 配置文件路径（默认 <配置目录>/MailGate/config.toml）
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// 直接使用已有的 Access Token，跳过浏览器登录
    #[arg(long, global = true, env = "GMAIL_ACCESS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 通过浏览器完成 OAuth2 登录并输出 Access Token
    Login,

    /// 检查 Access Token 是否有效
    Check,

    /// 发送邮件或保存草稿
    Send {
        /// 收件人，多个地址用逗号分隔
        #[arg(long)]
        to: String,

        #[arg(long, default_value = "")]
        subject: String,

        #[arg(long, default_value = "")]
        body: String,

        /// 附件路径（可重复）
        #[arg(long = "attach")]
        attachments: Vec<PathBuf>,

        /// 只保存为草稿
        #[arg(long)]
        draft: bool,

        /// 发送后添加的标签 ID
        #[arg(long)]
        label: Option<String>,

        /// 正文为 HTML
        #[arg(long)]
        html: bool,
    },

    /// 列出最近的邮件
    List {
        #[arg(long, default_value_t = 10)]
        max: u32,
    },

    /// 搜索邮件
    Search {
        #[arg(default_value = "")]
        query: String,

        /// 按标签名过滤
        #[arg(long)]
        label: Option<String>,
    },

    /// 列出所有标签
    Labels,

    /// 删除邮件（失败时移入回收站）
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
}
