//! 基础设施层 - 技术实现
//!
//! 提供配置加载、日志初始化以及索引服务和完成回调的 HTTP 客户端

pub mod config;
pub mod elasticsearch;
pub mod logging;
pub mod reporter;

pub use config::{AgentConfig, AgentConfigLoader};
pub use elasticsearch::ElasticsearchSink;
pub use logging::init_tracing;
pub use reporter::HttpCompletionReporter;
