//! 文件级时间预筛选
//!
//! 只读文件头（和普通文件的文件尾）一个缓冲区，用首行/末行的时间
//! 粗略判断文件是否可能与查询窗口重叠。这是有损但便宜的筛选：
//! 首两行或末两行都坏掉的文件可能被误判。

use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use super::time_sampler::{SampleMode, TimeWindowSampler};
use crate::error::{AppError, Result};
use crate::models::TimeWindow;

/// tar 头块大小
pub const TAR_HEADER_SIZE: usize = 512;

/// 按文件名区分的文件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Plain,
    Gzip,
    /// `.tar.gz` / `.tgz`：解压后先跳过一个 tar 头
    TarGzip,
}

impl FileKind {
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            FileKind::TarGzip
        } else if name.ends_with(".gz") {
            FileKind::Gzip
        } else {
            FileKind::Plain
        }
    }

    pub fn is_compressed(self) -> bool {
        !matches!(self, FileKind::Plain)
    }

    /**
     * 打开文件并返回（必要时解压后的）字节流
     *
     * tar.gz 会先读掉 512 字节的 tar 头；头不完整时返回 I/O 错误。
     */
    pub fn open(self, path: &Path) -> Result<Box<dyn Read + Send>> {
        let file = File::open(path).map_err(|e| io_failure("open", path, e))?;
        match self {
            FileKind::Plain => Ok(Box::new(file)),
            FileKind::Gzip => Ok(Box::new(MultiGzDecoder::new(file))),
            FileKind::TarGzip => {
                let mut decoder = MultiGzDecoder::new(file);
                let mut header = [0u8; TAR_HEADER_SIZE];
                decoder
                    .read_exact(&mut header)
                    .map_err(|e| io_failure("skip tar header", path, e))?;
                Ok(Box::new(decoder))
            }
        }
    }
}

/// 单个文件的预筛选结果，只在一次检索中临时存在
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTimeSample {
    pub path: PathBuf,
    pub observed_start: Option<i64>,
    /// 只有普通文件才有
    pub observed_end: Option<i64>,
    pub valid: bool,
}

impl FileTimeSample {
    fn rejected(path: &Path, observed_start: Option<i64>, observed_end: Option<i64>) -> Self {
        Self {
            path: path.to_path_buf(),
            observed_start,
            observed_end,
            valid: false,
        }
    }
}

/// 文件预筛选器
#[derive(Debug, Clone)]
pub struct FilePreFilter {
    sampler: TimeWindowSampler,
    buffer_size: usize,
}

impl FilePreFilter {
    pub fn new(sampler: TimeWindowSampler, buffer_size: usize) -> Self {
        Self {
            sampler,
            buffer_size: buffer_size.max(1),
        }
    }

    /**
     * 普通文件预筛选
     *
     * 首行（解析失败则第二行）必须不晚于窗口结束，末行（解析失败则
     * 倒数第二行）必须不早于窗口开始，两项都通过才做全量扫描。
     * 文件不足一个缓冲区时，尾部检查复用头部读到的内容。
     */
    pub fn prefilter_plain(&self, path: &Path, window: &TimeWindow) -> Result<FileTimeSample> {
        let mut file = File::open(path).map_err(|e| io_failure("open", path, e))?;
        let head = read_up_to(&mut file, self.buffer_size).map_err(|e| io_failure("read head", path, e))?;
        let head_text = String::from_utf8_lossy(&head);
        let head_lines: Vec<&str> = head_text.split('\n').collect();

        let Some(start) = self.probe(head_lines.iter().copied()) else {
            debug!(file = %path.display(), "Head sample unparseable, file excluded");
            return Ok(FileTimeSample::rejected(path, None, None));
        };
        if !SampleMode::Head.admits(start, window.end) {
            debug!(file = %path.display(), head = start, "File starts after window, excluded");
            return Ok(FileTimeSample::rejected(path, Some(start), None));
        }

        let len = file
            .metadata()
            .map_err(|e| io_failure("stat", path, e))?
            .len();
        let tail_text = if len > self.buffer_size as u64 {
            file.seek(SeekFrom::End(-(self.buffer_size as i64)))
                .map_err(|e| io_failure("seek tail", path, e))?;
            let tail = read_up_to(&mut file, self.buffer_size).map_err(|e| io_failure("read tail", path, e))?;
            String::from_utf8_lossy(&tail).into_owned()
        } else {
            head_text.clone().into_owned()
        };

        let mut tail_lines: Vec<&str> = tail_text.split('\n').collect();
        if tail_lines.len() > 1 && tail_lines.last() == Some(&"") {
            tail_lines.pop();
        }

        let Some(end) = self.probe(tail_lines.iter().rev().copied()) else {
            debug!(file = %path.display(), "Tail sample unparseable, file excluded");
            return Ok(FileTimeSample::rejected(path, Some(start), None));
        };
        let valid = SampleMode::Tail.admits(end, window.start);
        trace!(file = %path.display(), head = start, tail = end, valid, "Plain file sampled");

        Ok(FileTimeSample {
            path: path.to_path_buf(),
            observed_start: Some(start),
            observed_end: Some(end),
            valid,
        })
    }

    /**
     * 压缩文件预筛选
     *
     * 只解压一个缓冲区，记录首行时间；尾部要全量解压才能知道，
     * 留给候选选择阶段处理。首行时间不可解析的文件直接淘汰。
     */
    pub fn prefilter_gz(&self, path: &Path, window: &TimeWindow) -> Result<FileTimeSample> {
        let kind = match FileKind::from_path(path) {
            FileKind::Plain => FileKind::Gzip,
            kind => kind,
        };
        let mut stream = kind.open(path)?;
        let head = read_up_to(&mut stream, self.buffer_size).map_err(|e| io_failure("decompress head", path, e))?;
        let head_text = String::from_utf8_lossy(&head);

        let Some(start) = self.probe(head_text.split('\n')) else {
            debug!(file = %path.display(), "Compressed head sample unparseable, dropped");
            return Ok(FileTimeSample::rejected(path, None, None));
        };
        let valid = SampleMode::Head.admits(start, window.end);
        trace!(file = %path.display(), head = start, valid, "Compressed file sampled");

        Ok(FileTimeSample {
            path: path.to_path_buf(),
            observed_start: Some(start),
            observed_end: None,
            valid,
        })
    }

    /// 取第一行的时间，解析失败时再试第二行
    fn probe<'a>(&self, mut lines: impl Iterator<Item = &'a str>) -> Option<i64> {
        let first = lines.next()?;
        match self.sampler.sample(first) {
            Ok(ts) => Some(ts),
            Err(e) => {
                trace!(error = %e, "First sampled line unparseable, trying the next one");
                lines.next().and_then(|second| self.sampler.sample(second).ok())
            }
        }
    }
}

/// 读满 `limit` 字节或到达流末尾
fn read_up_to<R: Read>(reader: &mut R, limit: usize) -> io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(limit);
    reader.take(limit as u64).read_to_end(&mut buf)?;
    Ok(buf)
}

fn io_failure(action: &str, path: &Path, error: io::Error) -> AppError {
    AppError::io_error(format!("{} failed: {}", action, error), Some(path.to_path_buf()))
}
