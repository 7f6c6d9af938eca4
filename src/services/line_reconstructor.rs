//! 逻辑行重建
//!
//! 按固定大小的块读取字节流（普通文件或解压后的 gzip 流），
//! 把跨块的半行拼回完整的逻辑行。超长的行被截断并加上可见标记，
//! 避免单行巨型文件把内存撑爆。

use std::collections::VecDeque;
use std::io::{self, Read};

/// 默认工作缓冲区大小
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// 超长行截断后追加的标记
pub const TRUNCATION_MARKER: &str = "......";

/**
 * 逻辑行迭代器
 *
 * 每次读取最多 `buffer_size` 字节，按 `\n` 切分；块的最后一段留在
 * carry 中，与下一块的开头拼接。流结束时 carry 无论是否为空都作为
 * 最后一行输出，因此 `lines.join("\n")` 能还原原始内容（超长行除外）。
 *
 * 只能向前读；想重新开始必须重新打开底层流。
 */
pub struct LineReconstructor<R: Read> {
    reader: R,
    buffer_size: usize,
    chunk: Vec<u8>,
    carry: Vec<u8>,
    /// 当前 carry 已超长，丢弃直到下一个换行
    truncated: bool,
    pending: VecDeque<String>,
    finished: bool,
    bytes_read: u64,
}

impl<R: Read> LineReconstructor<R> {
    pub fn new(reader: R) -> Self {
        Self::with_buffer_size(reader, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_buffer_size(reader: R, buffer_size: usize) -> Self {
        let buffer_size = buffer_size.max(1);
        Self {
            reader,
            buffer_size,
            chunk: vec![0; buffer_size],
            carry: Vec::with_capacity(buffer_size),
            truncated: false,
            pending: VecDeque::new(),
            finished: false,
            bytes_read: 0,
        }
    }

    /// 目前为止从底层流读取的字节数
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    fn read_chunk(&mut self) -> io::Result<usize> {
        loop {
            match self.reader.read(&mut self.chunk) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn absorb(&mut self, n: usize) {
        let mut start = 0;
        while let Some(offset) = self.chunk[start..n].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            append_bounded(&mut self.carry, &mut self.truncated, &self.chunk[start..end], self.buffer_size);
            let line = self.take_carry();
            self.pending.push_back(line);
            start = end + 1;
        }
        append_bounded(&mut self.carry, &mut self.truncated, &self.chunk[start..n], self.buffer_size);
    }

    fn take_carry(&mut self) -> String {
        let mut line = String::from_utf8_lossy(&self.carry).into_owned();
        if self.truncated {
            line.push_str(TRUNCATION_MARKER);
        }
        self.carry.clear();
        self.truncated = false;
        line
    }
}

fn append_bounded(carry: &mut Vec<u8>, truncated: &mut bool, bytes: &[u8], limit: usize) {
    if *truncated {
        return;
    }
    carry.extend_from_slice(bytes);
    if carry.len() > limit {
        carry.truncate(limit);
        *truncated = true;
    }
}

impl<R: Read> Iterator for LineReconstructor<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(line) = self.pending.pop_front() {
                return Some(Ok(line));
            }
            if self.finished {
                return None;
            }

            match self.read_chunk() {
                Ok(0) => {
                    self.finished = true;
                    let last = self.take_carry();
                    self.pending.push_back(last);
                }
                Ok(n) => {
                    self.bytes_read += n as u64;
                    self.absorb(n);
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    /// 每次最多返回 `step` 字节的读取器，模拟解压流的短读
    struct Trickle<'a> {
        data: &'a [u8],
        step: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    fn collect(input: &str, buffer_size: usize) -> Vec<String> {
        LineReconstructor::with_buffer_size(Cursor::new(input.as_bytes().to_vec()), buffer_size)
            .collect::<io::Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_lines_split_across_chunks_are_rejoined() {
        // 缓冲区放得下最长的行，但小于整个输入，块边界一定会切开某些行
        let lines = collect("alpha\nbravo\ncharlie", 8);
        assert_eq!(lines, vec!["alpha", "bravo", "charlie"]);
    }

    #[test]
    fn test_trailing_newline_yields_empty_last_line() {
        let lines = collect("a\nb\n", 16);
        assert_eq!(lines, vec!["a", "b", ""]);
    }

    #[test]
    fn test_empty_stream_yields_one_empty_line() {
        assert_eq!(collect("", 8), vec![""]);
    }

    #[test]
    fn test_overlong_line_is_truncated_with_marker() {
        let input = format!("{}\nshort", "x".repeat(20));
        let lines = collect(&input, 8);
        assert_eq!(lines, vec![format!("{}{}", "x".repeat(8), TRUNCATION_MARKER), "short".to_string()]);
    }

    #[test]
    fn test_line_of_exactly_buffer_size_is_kept() {
        let input = format!("{}\nnext", "y".repeat(8));
        let lines = collect(&input, 8);
        assert_eq!(lines[0], "y".repeat(8));
        assert_eq!(lines[1], "next");
    }

    #[test]
    fn test_short_reads() {
        let data = b"2024-01-10 a\n2024-01-10 b\n";
        let reader = Trickle { data, step: 3 };
        let lines: Vec<String> = LineReconstructor::with_buffer_size(reader, 64)
            .collect::<io::Result<_>>()
            .unwrap();
        assert_eq!(lines, vec!["2024-01-10 a", "2024-01-10 b", ""]);
    }

    #[test]
    fn test_bytes_read_tracks_stream() {
        let mut reconstructor = LineReconstructor::with_buffer_size(Cursor::new(b"ab\ncd".to_vec()), 2);
        while reconstructor.next().is_some() {}
        assert_eq!(reconstructor.bytes_read(), 5);
    }

    proptest! {
        #[test]
        fn prop_round_trip_for_lines_within_buffer(
            lines in prop::collection::vec("[a-z0-9 ]{0,12}", 0..20),
            buffer_size in 12usize..40,
            step in 1usize..17,
        ) {
            let input = lines.join("\n");
            let reader = Trickle { data: input.as_bytes(), step };
            let produced: Vec<String> = LineReconstructor::with_buffer_size(reader, buffer_size)
                .collect::<io::Result<_>>()
                .unwrap();
            prop_assert_eq!(produced.join("\n"), input);
        }

        #[test]
        fn prop_overlong_lines_are_truncated_deterministically(
            len in 1usize..64,
            buffer_size in 1usize..32,
        ) {
            let input = "z".repeat(len);
            let produced = collect(&input, buffer_size);
            prop_assert_eq!(produced.len(), 1);
            if len > buffer_size {
                prop_assert_eq!(&produced[0], &format!("{}{}", "z".repeat(buffer_size), TRUNCATION_MARKER));
            } else {
                prop_assert_eq!(&produced[0], &input);
            }
        }
    }
}
