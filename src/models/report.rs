//! 检索完成报告
//!
//! 扫描结束（普通文件和 gz 文件两个阶段都完成、上传全部落地）后，
//! 通过一次 HTTP 回调把结果发给上报端。

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 完成回调的负载，字段名与上报端约定一致（PascalCase）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CompletionReport {
    pub task_id: String,
    pub host_name: String,
    /// 完成时间（Unix 秒）
    pub done_ts: i64,
    /// 分发上传的命中行数
    pub total_count: u64,
    /// 写入索引失败的行数
    pub fail_count: u64,
}

/// 扫描过程统计，只用于日志
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// 输入文件总数
    pub files_total: usize,
    /// 通过预筛选并完整扫描的普通文件数
    pub plain_scanned: usize,
    /// 头部采样成功的 gz 文件数
    pub gz_sampled: usize,
    /// 区间筛选后完整扫描的 gz 文件数
    pub gz_scanned: usize,
    /// 因 I/O 错误放弃的文件数
    pub io_errors: usize,
    /// 完整扫描读取的逻辑行数
    pub lines_read: u64,
    /// 是否因达到 maxCount 提前结束
    pub stopped_by_cap: bool,
    pub elapsed: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_wire_format() {
        let report = CompletionReport {
            task_id: "task01".to_string(),
            host_name: "node-1".to_string(),
            done_ts: 1_704_902_400,
            total_count: 50,
            fail_count: 3,
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["TaskId"], "task01");
        assert_eq!(json["HostName"], "node-1");
        assert_eq!(json["DoneTs"], 1_704_902_400);
        assert_eq!(json["TotalCount"], 50);
        assert_eq!(json["FailCount"], 3);
    }
}
