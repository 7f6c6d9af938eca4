//! 检索计数器
//!
//! 扫描线程和所有上传 worker 共享同一组计数，全部使用原子操作更新。

use std::sync::atomic::{AtomicU64, Ordering};

/**
 * 单次检索的命中/失败计数
 *
 * 命中数由扫描线程在分发后递增，失败数由上传 worker 在写入失败时递增。
 */
#[derive(Debug, Default)]
pub struct ScanCounters {
    matched: AtomicU64,
    failed: AtomicU64,
}

impl ScanCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次命中，返回递增后的总数
    pub fn record_match(&self) -> u64 {
        self.matched.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn record_failure(&self) -> u64 {
        self.failed.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn matched(&self) -> u64 {
        self.matched.load(Ordering::Acquire)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Acquire)
    }

    /// 命中总数已超过上限（先加后比，所以最多多出一条）
    pub fn cap_exceeded(&self, cap: u64) -> bool {
        self.matched() > cap
    }
}
