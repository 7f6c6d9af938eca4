pub mod counters;
pub mod document;
pub mod report;
pub mod request;

// 重新导出核心类型
pub use counters::ScanCounters;
pub use document::{DocumentTemplate, LogDocument, MatchedLine};
pub use report::{CompletionReport, ScanSummary};
pub use request::{ContentRule, FreeSearchPayload, MatchMode, SearchRequest, TimeWindow};
