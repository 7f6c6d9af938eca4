//! 通用工具函数模块
//!
//! 提供日期布局转换、字段切分和日志文件定位等通用工具。

pub mod date_layout;
pub mod log_locator;
pub mod tokenize;

pub use date_layout::{translate, ChronoLayout};
pub use log_locator::locate;
pub use tokenize::split_tokens;
