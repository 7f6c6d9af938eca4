//! 日志文件定位
//!
//! 在每个给定目录下（不递归）列出文件名匹配 `logName` 正则的普通文件。

use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{AppError, Result};

/// 列出 `dirs` 中文件名匹配 `name_pattern` 的文件
///
/// 读不了的目录只记日志并跳过；最终一个文件都没有时返回校验错误。
pub fn locate<S: AsRef<str>>(dirs: &[S], name_pattern: &str) -> Result<Vec<PathBuf>> {
    let pattern = Regex::new(name_pattern).map_err(|e| {
        AppError::validation_error(format!("Error parameter logName,info: {}", e))
    })?;

    let mut files = Vec::new();
    for dir in dirs {
        files.extend(files_in_dir(Path::new(dir.as_ref()), &pattern));
    }

    if files.is_empty() {
        return Err(AppError::validation_error(
            "Error parameter logPath or logName,info: path or file not matched!",
        ));
    }

    debug!(count = files.len(), "Located candidate log files");
    Ok(files)
}

fn files_in_dir(dir: &Path, pattern: &Regex) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Failed to read log directory");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if pattern.is_match(&entry.file_name().to_string_lossy()) {
            files.push(entry.into_path());
        }
    }
    files
}
