//! Log Search Agent
//!
//! 主机侧日志检索：按时间窗口定位可能相关的日志文件（普通文件和 gzip），
//! 流式扫描、逐行匹配内容规则，把命中的行以结构化文档写入外部索引，
//! 最后发送一次完成回调。

pub mod error;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

pub use error::{AppError, Result, TimestampError};
pub use models::{
    CompletionReport, ContentRule, FreeSearchPayload, MatchMode, MatchedLine, ScanCounters,
    SearchRequest, TimeWindow,
};
pub use services::{
    CompletionReporter, IndexSink, ScanSettings, SearchContext, SearchOrchestrator, SearchOutcome,
};
