//! 集成测试共用的夹具：内存索引、内存回调、日志文件生成

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime, TimeZone};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log_search_agent::models::document::TIME_FIELD;
use log_search_agent::models::LogDocument;
use log_search_agent::{
    AppError, CompletionReport, CompletionReporter, ContentRule, IndexSink, Result, SearchRequest,
    TimeWindow,
};

pub const DATE_FORMAT: &str = "2006-01-02 15:04:05";

/// 本地时区下 `YYYY-MM-DD HH:MM:SS` 对应的 Unix 秒
pub fn local_ts(text: &str) -> i64 {
    let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").unwrap();
    Local.from_local_datetime(&naive).earliest().unwrap().timestamp()
}

/// Unix 秒格式化为日志里的时间文本
pub fn log_time(ts: i64) -> String {
    Local
        .timestamp_opt(ts, 0)
        .earliest()
        .unwrap()
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// 每秒一行：`<date> <time> <level> <message>`
pub fn log_lines(start: i64, count: usize, level: &str) -> String {
    (0..count)
        .map(|i| format!("{} {} request-{}\n", log_time(start + i as i64), level, i))
        .collect()
}

pub fn write_plain(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

pub fn write_gz(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
    encoder.write_all(content).unwrap();
    encoder.finish().unwrap();
    path
}

pub fn request(window: TimeWindow, rules: Vec<ContentRule>, max_count: u64) -> SearchRequest {
    SearchRequest {
        window,
        task_id: "task01".to_string(),
        log_type: "nginx".to_string(),
        log_dirs: vec!["/var/log".to_string()],
        log_name: ".*".to_string(),
        delimiter: " ".to_string(),
        date_positions: vec![1, 2],
        date_format: DATE_FORMAT.to_string(),
        rules,
        headers: vec!["date".to_string(), "time".to_string(), "level".to_string()],
        max_count,
        collapse_empty_tokens: false,
    }
}

/// 内存索引：记录写入的文档，`_time` 在失败集合里的写入返回错误
#[derive(Default)]
pub struct MemorySink {
    pub documents: Mutex<Vec<LogDocument>>,
    pub ensured: Mutex<Vec<(String, Vec<String>)>>,
    pub failing_times: HashSet<i64>,
}

impl MemorySink {
    pub fn failing(times: impl IntoIterator<Item = i64>) -> Self {
        Self {
            failing_times: times.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn times(&self) -> Vec<i64> {
        let mut times: Vec<i64> = self
            .documents
            .lock()
            .unwrap()
            .iter()
            .map(|doc| doc.get(TIME_FIELD).unwrap().parse().unwrap())
            .collect();
        times.sort_unstable();
        times
    }
}

#[async_trait]
impl IndexSink for MemorySink {
    async fn ensure_index(&self, index: &str, headers: &[String]) -> Result<()> {
        self.ensured
            .lock()
            .unwrap()
            .push((index.to_string(), headers.to_vec()));
        Ok(())
    }

    async fn write(&self, _index: &str, document: &LogDocument) -> Result<()> {
        let ts: i64 = document.get(TIME_FIELD).unwrap_or("0").parse().unwrap_or(0);
        if self.failing_times.contains(&ts) {
            return Err(AppError::index_error("rejected by test sink"));
        }
        self.documents.lock().unwrap().push(document.clone());
        Ok(())
    }
}

/// 内存回调
#[derive(Default)]
pub struct MemoryReporter {
    pub reports: Mutex<Vec<CompletionReport>>,
}

#[async_trait]
impl CompletionReporter for MemoryReporter {
    async fn report(&self, report: &CompletionReport) -> Result<()> {
        self.reports.lock().unwrap().push(report.clone());
        Ok(())
    }
}
