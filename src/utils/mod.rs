/// 通用工具
pub mod http_client;
