//! 上传管道
//!
//! 固定数量的上传 worker 共享一个有界队列。扫描线程只负责入队，
//! 队列满时才阻塞；同时在途的写入数永远不超过 worker 数。
//! 写入失败只计数，不重试，也不影响扫描。

use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::scan_engine::MatchSink;
use crate::error::{AppError, Result};
use crate::models::{DocumentTemplate, LogDocument, MatchedLine, ScanCounters};

/// 默认并发上传数
pub const DEFAULT_UPLOAD_CONCURRENCY: usize = 5;

/// 默认队列容量
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// 索引写入端
#[async_trait]
pub trait IndexSink: Send + Sync {
    /// 索引不存在时按表头创建
    async fn ensure_index(&self, index: &str, headers: &[String]) -> Result<()>;

    /// 写入一条文档
    async fn write(&self, index: &str, document: &LogDocument) -> Result<()>;
}

/// 扫描线程持有的入队句柄
#[derive(Clone)]
pub struct UploadHandle {
    sender: mpsc::Sender<MatchedLine>,
}

impl UploadHandle {
    /**
     * 阻塞式入队
     *
     * 只能在非异步上下文（例如 `spawn_blocking` 线程）中调用。
     */
    pub fn submit(&self, line: MatchedLine) -> Result<()> {
        self.sender
            .blocking_send(line)
            .map_err(|_| AppError::Internal("upload workers are gone".to_string()))
    }
}

impl MatchSink for UploadHandle {
    fn dispatch(&self, line: MatchedLine) -> Result<()> {
        self.submit(line)
    }
}

/**
 * 上传管道
 *
 * `start` 必须在 tokio 运行时内调用；`finish` 关闭队列并等待所有
 * worker 把剩余的行写完，之后失败计数才是最终值。
 */
pub struct UploadPipeline {
    sender: mpsc::Sender<MatchedLine>,
    workers: Vec<JoinHandle<()>>,
}

impl UploadPipeline {
    pub fn start(
        sink: Arc<dyn IndexSink>,
        index: impl Into<Arc<str>>,
        template: DocumentTemplate,
        counters: Arc<ScanCounters>,
        concurrency: usize,
        queue_capacity: usize,
    ) -> Self {
        let index = index.into();
        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..concurrency.max(1))
            .map(|worker_id| {
                let worker = UploadWorker {
                    worker_id,
                    sink: Arc::clone(&sink),
                    index: Arc::clone(&index),
                    template: template.clone(),
                    counters: Arc::clone(&counters),
                    receiver: Arc::clone(&receiver),
                };
                tokio::spawn(worker.run())
            })
            .collect();

        Self { sender, workers }
    }

    pub fn handle(&self) -> UploadHandle {
        UploadHandle {
            sender: self.sender.clone(),
        }
    }

    /// 关闭队列并等待所有 worker 退出
    ///
    /// 所有 `UploadHandle` 必须先被丢弃，否则队列不会关闭。
    pub async fn finish(self) {
        drop(self.sender);
        for result in join_all(self.workers).await {
            if let Err(e) = result {
                error!(error = %e, "Upload worker panicked");
            }
        }
    }
}

struct UploadWorker {
    worker_id: usize,
    sink: Arc<dyn IndexSink>,
    index: Arc<str>,
    template: DocumentTemplate,
    counters: Arc<ScanCounters>,
    receiver: Arc<Mutex<mpsc::Receiver<MatchedLine>>>,
}

impl UploadWorker {
    async fn run(self) {
        let mut written = 0u64;
        loop {
            // 只在取下一条时持锁，写入期间其他 worker 可以继续取
            let next = self.receiver.lock().await.recv().await;
            let Some(line) = next else {
                break;
            };

            let document = self.template.render(line);
            match self.sink.write(&self.index, &document).await {
                Ok(()) => written += 1,
                Err(e) => {
                    let failed = self.counters.record_failure();
                    warn!(worker = self.worker_id, index = %self.index, error = %e, failed, "Index write failed");
                }
            }
        }
        debug!(worker = self.worker_id, written, "Upload worker finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::document::TIME_FIELD;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingSink {
        written: std::sync::Mutex<Vec<LogDocument>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        fail_times: Vec<String>,
    }

    #[async_trait]
    impl IndexSink for RecordingSink {
        async fn ensure_index(&self, _index: &str, _headers: &[String]) -> Result<()> {
            Ok(())
        }

        async fn write(&self, _index: &str, document: &LogDocument) -> Result<()> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(2)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let time = document.get(TIME_FIELD).unwrap_or_default().to_string();
            if self.fail_times.contains(&time) {
                return Err(AppError::index_error("rejected"));
            }
            self.written.lock().unwrap().push(document.clone());
            Ok(())
        }
    }

    fn line(ts: i64) -> MatchedLine {
        MatchedLine {
            tokens: vec!["a".to_string(), "b".to_string()],
            timestamp: ts,
        }
    }

    async fn run_pipeline(sink: Arc<RecordingSink>, lines: usize, concurrency: usize) -> Arc<ScanCounters> {
        let counters = Arc::new(ScanCounters::new());
        let template = DocumentTemplate::new("node-1", "task01", &["first".to_string()], " ");
        let pipeline = UploadPipeline::start(
            sink,
            "log_search_test_20240110",
            template,
            Arc::clone(&counters),
            concurrency,
            4,
        );

        let handle = pipeline.handle();
        tokio::task::spawn_blocking(move || {
            for ts in 0..lines {
                handle.submit(line(ts as i64)).unwrap();
            }
        })
        .await
        .unwrap();

        pipeline.finish().await;
        counters
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_all_lines_written() {
        let sink = Arc::new(RecordingSink::default());
        let counters = run_pipeline(Arc::clone(&sink), 40, 5).await;

        let written = sink.written.lock().unwrap();
        assert_eq!(written.len(), 40);
        assert_eq!(counters.failed(), 0);
        assert_eq!(written[0].get("first"), Some("a"));
        assert_eq!(written[0].get("&,undefined"), Some("b"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_in_flight_writes_bounded_by_concurrency() {
        let sink = Arc::new(RecordingSink::default());
        run_pipeline(Arc::clone(&sink), 60, 5).await;

        let max = sink.max_in_flight.load(Ordering::SeqCst);
        assert!(max <= 5, "max in flight was {}", max);
        assert!(max >= 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_failures_are_counted_not_retried() {
        let sink = Arc::new(RecordingSink {
            fail_times: vec!["3".to_string(), "7".to_string(), "11".to_string()],
            ..Default::default()
        });
        let counters = run_pipeline(Arc::clone(&sink), 20, 5).await;

        assert_eq!(counters.failed(), 3);
        assert_eq!(sink.written.lock().unwrap().len(), 17);
    }
}
