//! 扫描核心服务
//!
//! 从叶子到根：规则匹配、逻辑行重建、时间采样、文件预筛选、
//! 压缩文件候选选择、全量扫描、上传管道、检索编排。

pub mod file_prefilter;
pub mod gz_selector;
pub mod line_reconstructor;
pub mod rule_matcher;
pub mod scan_engine;
pub mod search_orchestrator;
pub mod time_sampler;
pub mod upload_pipeline;

pub use file_prefilter::{FileKind, FilePreFilter, FileTimeSample};
pub use gz_selector::{assign_intervals, select as select_gz_candidates, GzCandidate};
pub use line_reconstructor::{LineReconstructor, DEFAULT_BUFFER_SIZE, TRUNCATION_MARKER};
pub use rule_matcher::RuleMatcher;
pub use scan_engine::{MatchSink, ScanEngine, ScanOutcome};
pub use search_orchestrator::{
    index_name, CompletionReporter, ScanSettings, SearchContext, SearchOrchestrator, SearchOutcome,
};
pub use time_sampler::{SampleMode, TimeWindowSampler, TimestampParser};
pub use upload_pipeline::{IndexSink, UploadHandle, UploadPipeline};
