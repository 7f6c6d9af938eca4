//! 全量扫描
//!
//! 对选中的文件逐行做严格时间判断和规则匹配，命中的行交给上传端。
//! 命中计数先加后比：总数超过 maxCount 时立即停止当前文件。

use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::file_prefilter::FileKind;
use super::line_reconstructor::LineReconstructor;
use super::rule_matcher::RuleMatcher;
use super::time_sampler::TimeWindowSampler;
use crate::error::{AppError, Result};
use crate::models::{MatchedLine, ScanCounters, TimeWindow};

/// 命中行的去向
pub trait MatchSink {
    fn dispatch(&self, line: MatchedLine) -> Result<()>;
}

/// 单个文件的扫描结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    pub lines_read: u64,
    /// 从（解压后的）流中读取的字节数
    pub bytes_read: u64,
    pub matched: u64,
    pub stopped_by_cap: bool,
}

/// 扫描引擎，一次检索内复用
pub struct ScanEngine {
    sampler: TimeWindowSampler,
    matcher: RuleMatcher,
    window: TimeWindow,
    max_count: u64,
    buffer_size: usize,
    counters: Arc<ScanCounters>,
}

impl ScanEngine {
    pub fn new(
        sampler: TimeWindowSampler,
        matcher: RuleMatcher,
        window: TimeWindow,
        max_count: u64,
        buffer_size: usize,
        counters: Arc<ScanCounters>,
    ) -> Self {
        Self {
            sampler,
            matcher,
            window,
            max_count,
            buffer_size,
            counters,
        }
    }

    /// 命中总数是否已超过上限
    pub fn cap_exceeded(&self) -> bool {
        self.counters.cap_exceeded(self.max_count)
    }

    /**
     * 扫描一个文件（压缩文件透明解压）
     *
     * I/O 错误只放弃这一个文件；已分发的命中行不撤回。
     */
    pub fn scan<S: MatchSink>(&self, path: &Path, kind: FileKind, sink: &S) -> Result<ScanOutcome> {
        let stream = kind.open(path).map_err(|e| e.with_context("full scan"))?;
        let outcome = self.scan_reader(stream, sink).map_err(|e| match e {
            AppError::Io(io) => AppError::io_error(format!("read failed: {}", io), Some(path.to_path_buf())),
            other => other,
        })?;

        if outcome.stopped_by_cap {
            info!(file = %path.display(), matched = outcome.matched, max_count = self.max_count, "Match cap exceeded, scan stopped");
        } else {
            debug!(
                file = %path.display(),
                lines = outcome.lines_read,
                bytes = outcome.bytes_read,
                matched = outcome.matched,
                "File scanned"
            );
        }
        Ok(outcome)
    }

    pub fn scan_reader<R: Read, S: MatchSink>(&self, reader: R, sink: &S) -> Result<ScanOutcome> {
        let mut outcome = ScanOutcome::default();

        let mut lines = LineReconstructor::with_buffer_size(reader, self.buffer_size);
        for line in lines.by_ref() {
            let line = line?;
            outcome.lines_read += 1;

            let tokens = self.sampler.tokenize(&line);
            let Some(timestamp) = self.sampler.strict(&tokens, &self.window) else {
                continue;
            };
            if !self.matcher.matches(&tokens) {
                continue;
            }

            if let Err(e) = sink.dispatch(MatchedLine { tokens, timestamp }) {
                self.counters.record_failure();
                debug!(error = %e, "Dispatch failed");
            }
            outcome.matched += 1;

            if self.counters.record_match() > self.max_count {
                outcome.stopped_by_cap = true;
                break;
            }
        }

        outcome.bytes_read = lines.bytes_read();
        Ok(outcome)
    }
}
