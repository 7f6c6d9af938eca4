//! 检索编排
//!
//! 一次检索的完整流程：
//! 1. 确保目标索引存在
//! 2. 启动上传 worker
//! 3. 在阻塞线程上依次预筛选所有文件：普通文件通过即全量扫描，
//!    压缩文件只记录首行时间
//! 4. 对压缩文件分配区间、选出候选并全量扫描
//! 5. 等待上传全部落地，发送完成报告

use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::file_prefilter::{FileKind, FilePreFilter};
use super::gz_selector;
use super::line_reconstructor::DEFAULT_BUFFER_SIZE;
use super::rule_matcher::RuleMatcher;
use super::scan_engine::{ScanEngine, ScanOutcome};
use super::time_sampler::TimeWindowSampler;
use super::upload_pipeline::{
    IndexSink, UploadHandle, UploadPipeline, DEFAULT_QUEUE_CAPACITY, DEFAULT_UPLOAD_CONCURRENCY,
};
use crate::error::Result;
use crate::models::{CompletionReport, DocumentTemplate, ScanCounters, ScanSummary, SearchRequest};

/// 完成报告的接收端
#[async_trait]
pub trait CompletionReporter: Send + Sync {
    async fn report(&self, report: &CompletionReport) -> Result<()>;
}

/// 扫描参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSettings {
    pub buffer_size: usize,
    pub upload_concurrency: usize,
    pub upload_queue_capacity: usize,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            upload_concurrency: DEFAULT_UPLOAD_CONCURRENCY,
            upload_queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// 索引名：`{prefix}_{logType}_{YYYYMMDD}`
pub fn index_name(prefix: &str, log_type: &str, at: &DateTime<Local>) -> String {
    format!("{}_{}_{}", prefix, log_type, at.format("%Y%m%d"))
}

/// 单次检索的上下文，显式传给每个组件
#[derive(Debug, Clone)]
pub struct SearchContext {
    pub request: Arc<SearchRequest>,
    pub host_name: String,
    pub index_name: String,
    pub settings: ScanSettings,
}

impl SearchContext {
    pub fn new(
        request: SearchRequest,
        host_name: impl Into<String>,
        index_prefix: &str,
        settings: ScanSettings,
    ) -> Self {
        let index_name = index_name(index_prefix, &request.log_type, &Local::now());
        Self {
            request: Arc::new(request),
            host_name: host_name.into(),
            index_name,
            settings,
        }
    }
}

/// 一次检索的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    pub report: CompletionReport,
    pub summary: ScanSummary,
}

/// 检索编排器
#[derive(Clone)]
pub struct SearchOrchestrator {
    index_sink: Arc<dyn IndexSink>,
    reporter: Option<Arc<dyn CompletionReporter>>,
}

impl SearchOrchestrator {
    pub fn new(index_sink: Arc<dyn IndexSink>) -> Self {
        Self {
            index_sink,
            reporter: None,
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn CompletionReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// 后台运行检索，调用方立即返回
    pub fn spawn(&self, ctx: SearchContext, files: Vec<PathBuf>) -> JoinHandle<SearchOutcome> {
        let orchestrator = self.clone();
        tokio::spawn(async move { orchestrator.run(ctx, files).await })
    }

    /**
     * 执行一次检索
     *
     * 内部错误只记日志和计数，不会让整个检索失败；
     * 唯一的对外信号是报告里的 FailCount。
     */
    pub async fn run(&self, ctx: SearchContext, files: Vec<PathBuf>) -> SearchOutcome {
        let request = Arc::clone(&ctx.request);
        info!(
            task_id = %request.task_id,
            index = %ctx.index_name,
            files = files.len(),
            start = request.window.start,
            end = request.window.end,
            "Search started"
        );

        if let Err(e) = self
            .index_sink
            .ensure_index(&ctx.index_name, &request.headers)
            .await
        {
            warn!(index = %ctx.index_name, error = %e, "Failed to prepare index");
        }

        let counters = Arc::new(ScanCounters::new());
        let template = DocumentTemplate::new(
            &ctx.host_name,
            &request.task_id,
            &request.headers,
            &request.delimiter,
        );
        let pipeline = UploadPipeline::start(
            Arc::clone(&self.index_sink),
            ctx.index_name.as_str(),
            template,
            Arc::clone(&counters),
            ctx.settings.upload_concurrency,
            ctx.settings.upload_queue_capacity,
        );

        let handle = pipeline.handle();
        let scan_request = Arc::clone(&request);
        let scan_counters = Arc::clone(&counters);
        let settings = ctx.settings;
        let summary = match tokio::task::spawn_blocking(move || {
            scan_files(&scan_request, settings, files, handle, scan_counters)
        })
        .await
        {
            Ok(summary) => summary,
            Err(e) => {
                error!(task_id = %request.task_id, error = %e, "Scan thread panicked");
                ScanSummary::default()
            }
        };

        pipeline.finish().await;

        let report = CompletionReport {
            task_id: request.task_id.clone(),
            host_name: ctx.host_name.clone(),
            done_ts: Local::now().timestamp(),
            total_count: counters.matched(),
            fail_count: counters.failed(),
        };
        info!(
            task_id = %report.task_id,
            total = report.total_count,
            failed = report.fail_count,
            plain_scanned = summary.plain_scanned,
            gz_scanned = summary.gz_scanned,
            io_errors = summary.io_errors,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Search finished"
        );

        if let Some(reporter) = &self.reporter {
            if let Err(e) = reporter.report(&report).await {
                warn!(task_id = %report.task_id, error = %e, "Failed to deliver completion report");
            }
        }

        SearchOutcome { report, summary }
    }
}

/// 阻塞线程上的扫描主体；`uploads` 在返回时被丢弃
fn scan_files(
    request: &SearchRequest,
    settings: ScanSettings,
    files: Vec<PathBuf>,
    uploads: UploadHandle,
    counters: Arc<ScanCounters>,
) -> ScanSummary {
    let started = Instant::now();
    let window = request.window;
    let sampler = TimeWindowSampler::from_request(request);
    let prefilter = FilePreFilter::new(sampler.clone(), settings.buffer_size);
    let matcher = RuleMatcher::new(&request.rules);
    debug!(
        task_id = %request.task_id,
        date_format = %sampler.parser().layout().format,
        rules = matcher.rule_count(),
        files = files.len(),
        "Scan started"
    );
    let engine = ScanEngine::new(
        sampler,
        matcher,
        window,
        request.max_count,
        settings.buffer_size,
        counters,
    );

    let mut summary = ScanSummary {
        files_total: files.len(),
        ..Default::default()
    };
    let mut gz_samples: HashMap<PathBuf, i64> = HashMap::new();

    for path in files {
        if engine.cap_exceeded() {
            summary.stopped_by_cap = true;
            break;
        }

        let kind = FileKind::from_path(&path);
        if kind.is_compressed() {
            match prefilter.prefilter_gz(&path, &window) {
                Ok(sample) => {
                    if let (true, Some(start)) = (sample.valid, sample.observed_start) {
                        summary.gz_sampled += 1;
                        gz_samples.insert(path, start);
                    }
                }
                Err(e) => {
                    summary.io_errors += 1;
                    warn!(file = %path.display(), error = %e, "Failed to sample compressed file");
                }
            }
            continue;
        }

        match prefilter.prefilter_plain(&path, &window) {
            Ok(sample) if sample.valid => {
                summary.plain_scanned += 1;
                scan_one(&engine, &path, kind, &uploads, &mut summary);
            }
            Ok(_) => debug!(file = %path.display(), "File outside window, skipped"),
            Err(e) => {
                summary.io_errors += 1;
                warn!(file = %path.display(), error = %e, "Failed to sample file");
            }
        }
    }

    if !summary.stopped_by_cap && !gz_samples.is_empty() {
        let selected = gz_selector::select(&gz_samples, &window);
        info!(sampled = gz_samples.len(), selected = selected.len(), "Compressed candidates selected");

        for path in selected {
            if engine.cap_exceeded() {
                summary.stopped_by_cap = true;
                break;
            }
            summary.gz_scanned += 1;
            scan_one(&engine, &path, FileKind::from_path(&path), &uploads, &mut summary);
        }
    }

    summary.elapsed = started.elapsed();
    summary
}

fn scan_one(
    engine: &ScanEngine,
    path: &std::path::Path,
    kind: FileKind,
    uploads: &UploadHandle,
    summary: &mut ScanSummary,
) {
    match engine.scan(path, kind, uploads) {
        Ok(ScanOutcome {
            lines_read,
            stopped_by_cap,
            ..
        }) => {
            summary.lines_read += lines_read;
            summary.stopped_by_cap |= stopped_by_cap;
        }
        Err(e) => {
            summary.io_errors += 1;
            warn!(file = %path.display(), error = %e, "Scan aborted for file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_index_name_uses_local_date() {
        let at = Local.with_ymd_and_hms(2024, 1, 10, 23, 59, 0).earliest().unwrap();
        assert_eq!(index_name("log_search", "nginx", &at), "log_search_nginx_20240110");
    }

    #[test]
    fn test_default_settings() {
        let settings = ScanSettings::default();
        assert_eq!(settings.buffer_size, 4096);
        assert_eq!(settings.upload_concurrency, 5);
    }
}
