//! 压缩文件候选选择
//!
//! 压缩文件只采样了首行时间。按首行时间排序后，每个文件的时间范围
//! 假定为 [自己的开始, 下一个文件的开始)，最后一个文件没有上界。
//! 范围与查询窗口相交的文件需要全量扫描（结果是必要集合的超集）。

use std::collections::HashMap;
use std::path::PathBuf;

use crate::models::TimeWindow;

/// 最后一个候选文件的区间上界
pub const OPEN_INTERVAL_END: i64 = i64::MAX;

/// 排序后带有推断区间的候选文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GzCandidate {
    pub path: PathBuf,
    pub start_ts: i64,
    /// 推断值，不是观测值
    pub interval_end: i64,
}

impl GzCandidate {
    /// 区间与窗口相交（两端包含）
    pub fn overlaps(&self, window: &TimeWindow) -> bool {
        self.start_ts <= window.end && self.interval_end >= window.start
    }
}

/**
 * 为采样结果分配区间
 *
 * 开始时间相同的文件按路径排序，保证结果稳定。
 */
pub fn assign_intervals(samples: &HashMap<PathBuf, i64>) -> Vec<GzCandidate> {
    let mut sorted: Vec<(&PathBuf, i64)> = samples.iter().map(|(path, &ts)| (path, ts)).collect();
    sorted.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));

    let next_starts = sorted
        .iter()
        .skip(1)
        .map(|&(_, ts)| ts)
        .chain(std::iter::once(OPEN_INTERVAL_END));

    sorted
        .iter()
        .zip(next_starts)
        .map(|(&(path, start_ts), interval_end)| GzCandidate {
            path: path.clone(),
            start_ts,
            interval_end,
        })
        .collect()
}

/// 选出需要全量扫描的压缩文件，按开始时间升序
pub fn select(samples: &HashMap<PathBuf, i64>, window: &TimeWindow) -> Vec<PathBuf> {
    assign_intervals(samples)
        .into_iter()
        .filter(|candidate| candidate.overlaps(window))
        .map(|candidate| candidate.path)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn samples(entries: &[(&str, i64)]) -> HashMap<PathBuf, i64> {
        entries
            .iter()
            .map(|(path, ts)| (PathBuf::from(path), *ts))
            .collect()
    }

    #[test]
    fn test_three_files_window_between() {
        let samples = samples(&[("c.gz", 300), ("a.gz", 100), ("b.gz", 200)]);
        let window = TimeWindow::new(150, 250).unwrap();

        let candidates = assign_intervals(&samples);
        assert_eq!(candidates[0].interval_end, 200);
        assert_eq!(candidates[1].interval_end, 300);
        assert_eq!(candidates[2].interval_end, OPEN_INTERVAL_END);

        assert_eq!(
            select(&samples, &window),
            vec![PathBuf::from("a.gz"), PathBuf::from("b.gz")]
        );
    }

    #[test]
    fn test_last_file_is_unbounded() {
        let samples = samples(&[("a.gz", 100), ("b.gz", 200)]);
        let window = TimeWindow::new(10_000, 10_100).unwrap();
        assert_eq!(select(&samples, &window), vec![PathBuf::from("b.gz")]);
    }

    #[test]
    fn test_window_before_all_files() {
        let samples = samples(&[("a.gz", 100), ("b.gz", 200)]);
        let window = TimeWindow::new(10, 50).unwrap();
        assert!(select(&samples, &window).is_empty());
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        let samples = samples(&[("a.gz", 100), ("b.gz", 200)]);
        // 窗口开始恰好等于 a 的推断上界
        let window = TimeWindow::new(200, 200).unwrap();
        assert_eq!(
            select(&samples, &window),
            vec![PathBuf::from("a.gz"), PathBuf::from("b.gz")]
        );
    }

    #[test]
    fn test_equal_start_times_keep_both_files() {
        let samples = samples(&[("b.gz", 100), ("a.gz", 100)]);
        let window = TimeWindow::new(100, 150).unwrap();
        assert_eq!(
            select(&samples, &window),
            vec![PathBuf::from("a.gz"), PathBuf::from("b.gz")]
        );
    }

    #[test]
    fn test_empty_samples() {
        assert!(select(&HashMap::new(), &TimeWindow::new(0, 1).unwrap()).is_empty());
    }

    proptest! {
        #[test]
        fn prop_intervals_cover_without_gaps(
            starts in prop::collection::hash_set(0i64..1_000_000, 1..30),
        ) {
            let samples: HashMap<PathBuf, i64> = starts
                .iter()
                .map(|ts| (PathBuf::from(format!("{}.gz", ts)), *ts))
                .collect();
            let candidates = assign_intervals(&samples);

            for pair in candidates.windows(2) {
                prop_assert_eq!(pair[0].interval_end, pair[1].start_ts);
                prop_assert!(pair[0].start_ts < pair[0].interval_end);
            }
            prop_assert_eq!(candidates.last().unwrap().interval_end, OPEN_INTERVAL_END);

            // 任何不早于最小开始时间的时刻都落在某个被选中的文件里
            let min = *starts.iter().min().unwrap();
            for probe in [min, min + 1, 500_000, 999_999, 5_000_000].into_iter().filter(|&p| p >= min) {
                let window = TimeWindow::new(probe, probe).unwrap();
                prop_assert!(!select(&samples, &window).is_empty());
            }
        }
    }
}
