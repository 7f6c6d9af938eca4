//! 匹配行与上传文档
//!
//! 每条命中的日志行被展开成一个扁平的 key→value 文档写入索引。

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// 时间字段（Unix 秒的字符串形式）
pub const TIME_FIELD: &str = "_time";
/// 主机标识字段
pub const HOST_FIELD: &str = "_hostname";
/// 任务 ID 字段
pub const TASK_FIELD: &str = "0,taskId";
/// 超出表头数量的剩余字段，用原分隔符拼接
pub const OVERFLOW_FIELD: &str = "&,undefined";

/// 一条命中的逻辑行：分割后的字段加上解析出的时间戳
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedLine {
    pub tokens: Vec<String>,
    pub timestamp: i64,
}

/// 写入索引的文档
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LogDocument(BTreeMap<String, String>);

impl LogDocument {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// 请求级的文档模板：主机、任务、表头和分隔符在一次检索内不变
#[derive(Debug, Clone)]
pub struct DocumentTemplate {
    host_name: Arc<str>,
    task_id: Arc<str>,
    headers: Arc<[String]>,
    delimiter: Arc<str>,
}

impl DocumentTemplate {
    pub fn new(host_name: &str, task_id: &str, headers: &[String], delimiter: &str) -> Self {
        Self {
            host_name: Arc::from(host_name),
            task_id: Arc::from(task_id),
            headers: Arc::from(headers.to_vec()),
            delimiter: Arc::from(delimiter),
        }
    }

    /// 把命中行展开成文档
    ///
    /// 固定字段先写入，表头按位置覆盖，剩余字段拼接后写入 `&,undefined`，
    /// 末尾的分隔符被去掉。
    pub fn render(&self, line: MatchedLine) -> LogDocument {
        let mut fields = BTreeMap::new();
        fields.insert(TIME_FIELD.to_string(), line.timestamp.to_string());
        fields.insert(HOST_FIELD.to_string(), self.host_name.to_string());
        fields.insert(TASK_FIELD.to_string(), self.task_id.to_string());

        let mut tokens = line.tokens.into_iter();
        for (header, token) in self.headers.iter().zip(tokens.by_ref()) {
            fields.insert(header.clone(), token);
        }

        let overflow = tokens.collect::<Vec<_>>().join(&*self.delimiter);
        // 行尾的空字段不保留：去掉末尾属于分隔符的字符
        let overflow = overflow.trim_end_matches(|c: char| self.delimiter.contains(c));
        fields.insert(OVERFLOW_FIELD.to_string(), overflow.to_string());

        LogDocument(fields)
    }
}
