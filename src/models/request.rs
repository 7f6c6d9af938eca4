//! 检索请求数据结构
//!
//! `FreeSearchPayload` 是上游传来的原始请求体（camelCase 字段），
//! 校验通过后转换为不可变的 `SearchRequest`，扫描核心只接收后者。

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::{Validate, ValidationError};

use crate::error::{AppError, Result};

/// startTime 必须小于该值
pub const MAX_START_TIME: i64 = 9_000_000_000;

/// 单次检索允许的最大时间窗口（秒）
pub const MAX_WINDOW_SECS: i64 = 24 * 3600;

/// 时间字段位置最多 3 个，且每个不超过 100
pub const MAX_DATE_POSITIONS: usize = 3;
const MAX_DATE_POSITION_INDEX: usize = 100;

static TASK_ID_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+$").expect("task id pattern is valid"));

/// logType 会出现在索引名里，禁止这些字符
const LOG_TYPE_FORBIDDEN: &[char] = &['#', '*', ':', ';', '?', ' ', '<', '>', '/', ',', '|', '_'];

/// 查询时间窗口 [start, end]，单位为 Unix 秒，两端都包含
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: i64,
    pub end: i64,
}

impl TimeWindow {
    /// 创建时间窗口，要求 `end >= start` 且跨度不超过 24 小时
    pub fn new(start: i64, end: i64) -> Result<Self> {
        if end < start {
            return Err(AppError::validation_error(
                "Error parameter endTime,info: endTime>=startTime",
            ));
        }
        if end - start > MAX_WINDOW_SECS {
            return Err(AppError::validation_error(
                "Error parameter endTime,info: endTime-startTime>1day",
            ));
        }
        Ok(Self { start, end })
    }

    /// 严格模式：两端包含
    pub fn contains(&self, ts: i64) -> bool {
        self.start <= ts && ts <= self.end
    }
}

/// 内容规则的匹配方式（线上协议：0 精确、1 模糊、2 正则）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum MatchMode {
    Exact,
    Substring,
    Regex,
}

impl TryFrom<u8> for MatchMode {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(MatchMode::Exact),
            1 => Ok(MatchMode::Substring),
            2 => Ok(MatchMode::Regex),
            other => Err(format!("way must be 0, 1 or 2, got {}", other)),
        }
    }
}

impl From<MatchMode> for u8 {
    fn from(mode: MatchMode) -> Self {
        match mode {
            MatchMode::Exact => 0,
            MatchMode::Substring => 1,
            MatchMode::Regex => 2,
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchMode::Exact => write!(f, "exact"),
            MatchMode::Substring => write!(f, "substring"),
            MatchMode::Regex => write!(f, "regex"),
        }
    }
}

/// 单条内容规则；一组规则之间是 AND 关系
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ContentRule {
    /// 匹配文本（精确值、子串或正则）
    #[serde(rename = "value")]
    #[validate(length(min = 1, max = 1024, message = "value must be 1-1024 characters"))]
    pub match_text: String,

    #[serde(rename = "way")]
    pub mode: MatchMode,

    /// 0 表示任意列，否则是从 1 开始的列号
    #[serde(rename = "colNum", default)]
    #[validate(range(max = 255, message = "colNum must be 0-255"))]
    pub column: usize,
}

impl ContentRule {
    pub fn new(match_text: impl Into<String>, mode: MatchMode, column: usize) -> Self {
        Self {
            match_text: match_text.into(),
            mode,
            column,
        }
    }
}

/// 上游传入的原始检索请求
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FreeSearchPayload {
    /// 目标主机名；存在时必须与本机一致
    #[serde(default)]
    pub host_name: Option<String>,

    /// 上界在 `SearchRequest::from_payload` 中检查
    #[validate(range(min = 1, message = "startTime must be positive"))]
    pub start_time: i64,

    #[validate(range(min = 1, message = "endTime must be positive"))]
    pub end_time: i64,

    #[validate(
        length(min = 2, max = 64, message = "taskId must be 2-64 characters"),
        custom(function = "validate_task_id")
    )]
    pub task_id: String,

    #[validate(
        length(min = 2, max = 20, message = "logType must be 2-20 characters"),
        custom(function = "validate_log_type")
    )]
    pub log_type: String,

    /// `|` 分隔的目录列表
    #[validate(length(min = 2, message = "logPath too short"))]
    pub log_path: String,

    /// 文件名正则
    #[validate(length(min = 1, max = 255, message = "logName must be 1-255 characters"))]
    pub log_name: String,

    #[validate(length(min = 1, max = 10, message = "delimiter must be 1-10 characters"))]
    pub delimiter: String,

    /// 逗号分隔、从 1 开始的时间字段位置，例如 "1,2"
    #[validate(length(min = 1, max = 10, message = "datePosition must be 1-10 characters"))]
    pub date_position: String,

    #[validate(length(min = 2, max = 64, message = "dateFormat must be 2-64 characters"))]
    pub date_format: String,

    #[serde(default)]
    #[validate(range(min = 1, max = 1_000_000, message = "maxCount must be 1-1000000"))]
    pub max_count: Option<u64>,

    #[serde(default)]
    #[validate(nested)]
    pub select_regular: Vec<ContentRule>,

    /// 分割后丢弃空字段（连续分隔符视为一个）
    #[serde(default)]
    pub de_all_in_one: bool,

    #[serde(default)]
    #[validate(custom(function = "validate_log_header"))]
    pub log_header: Vec<String>,
}

fn validate_task_id(task_id: &str) -> std::result::Result<(), ValidationError> {
    if !TASK_ID_REGEX.is_match(task_id) {
        return Err(ValidationError::new(
            "taskId must contain lowercase letters and digits only",
        ));
    }
    Ok(())
}

fn validate_log_type(log_type: &str) -> std::result::Result<(), ValidationError> {
    if !log_type.is_ascii() {
        return Err(ValidationError::new("logType must be ascii"));
    }
    if log_type.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(ValidationError::new("logType must be lowercase"));
    }
    if log_type.contains(LOG_TYPE_FORBIDDEN) {
        return Err(ValidationError::new("logType contains forbidden characters"));
    }
    Ok(())
}

fn validate_log_header(headers: &[String]) -> std::result::Result<(), ValidationError> {
    for header in headers {
        let len = header.trim().chars().count();
        if len == 0 || len > 20 {
            return Err(ValidationError::new(
                "logHeader value length must between 1 and 20",
            ));
        }
    }
    Ok(())
}

/// 解析 "1,2,3" 形式的时间字段位置（1 起始）
pub fn parse_date_positions(raw: &str) -> Result<Vec<usize>> {
    let positions = raw
        .split(',')
        .map(|part| {
            part.trim().parse::<usize>().map_err(|_| {
                AppError::validation_error(format!(
                    "Error parameter datePosition,info: {:?} is not a number",
                    part
                ))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if positions.is_empty() || positions.len() > MAX_DATE_POSITIONS {
        return Err(AppError::validation_error(
            "Error parameter datePosition,info: 1-3 positions required",
        ));
    }
    if positions
        .iter()
        .any(|&p| p == 0 || p > MAX_DATE_POSITION_INDEX)
    {
        return Err(AppError::validation_error(
            "Error parameter datePosition,info: positions must be 1-100",
        ));
    }
    Ok(positions)
}

/// 校验后的检索请求，扫描期间不可变
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub window: TimeWindow,
    pub task_id: String,
    pub log_type: String,
    /// 日志所在目录
    pub log_dirs: Vec<String>,
    /// 文件名正则
    pub log_name: String,
    pub delimiter: String,
    /// 1 起始的时间字段位置，1-3 个
    pub date_positions: Vec<usize>,
    pub date_format: String,
    pub rules: Vec<ContentRule>,
    /// 输出文档的表头（按位置对应）
    pub headers: Vec<String>,
    pub max_count: u64,
    pub collapse_empty_tokens: bool,
}

impl SearchRequest {
    /// 校验原始请求并转换
    ///
    /// `host_name` 为本机标识；`default_max_count` 在请求未带 `maxCount` 时使用。
    pub fn from_payload(
        payload: FreeSearchPayload,
        host_name: &str,
        default_max_count: u64,
    ) -> Result<Self> {
        payload
            .validate()
            .map_err(|e| AppError::validation_error(format!("Error parameter {}", e)))?;

        if let Some(requested_host) = &payload.host_name {
            if requested_host != host_name {
                return Err(AppError::validation_error(
                    "Error parameter hostName,info: not match hostName",
                ));
            }
        }

        if payload.start_time >= MAX_START_TIME {
            return Err(AppError::validation_error(
                "Error parameter startTime,info: startTime out of range",
            ));
        }
        let window = TimeWindow::new(payload.start_time, payload.end_time)?;
        let date_positions = parse_date_positions(&payload.date_position)?;

        Regex::new(&payload.log_name).map_err(|e| {
            AppError::validation_error(format!("Error parameter logName,info: {}", e))
        })?;

        let log_dirs = payload
            .log_path
            .split('|')
            .map(str::trim)
            .filter(|dir| !dir.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>();
        if log_dirs.is_empty() {
            return Err(AppError::validation_error(
                "Error parameter logPath,info: no directory given",
            ));
        }

        Ok(Self {
            window,
            task_id: payload.task_id,
            log_type: payload.log_type,
            log_dirs,
            log_name: payload.log_name,
            delimiter: payload.delimiter,
            date_positions,
            date_format: payload.date_format,
            rules: payload.select_regular,
            headers: payload
                .log_header
                .iter()
                .map(|h| h.trim().to_string())
                .collect(),
            max_count: payload.max_count.unwrap_or(default_max_count),
            collapse_empty_tokens: payload.de_all_in_one,
        })
    }
}
