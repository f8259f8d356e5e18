//! MailGate - Gmail OAuth2 登录与邮件收发
pub mod config;
pub mod handlers;
pub mod mail;
pub mod session;
pub mod utils;
