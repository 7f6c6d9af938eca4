use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/**
 * 应用错误类型 - 使用 miette 提供用户友好的错误诊断
 *
 * 扫描核心内部的错误大多在本地被吞掉（跳过行、排除文件、计数），
 * 只有单个文件的 I/O 错误和请求/配置校验错误会以这个类型向上传递。
 */
#[derive(Error, Debug, Diagnostic)]
pub enum AppError {
    #[error("IO error: {0}")]
    #[diagnostic(code(agent::io_error))]
    Io(#[from] std::io::Error),

    #[error("IO error: {message}")]
    #[diagnostic(code(agent::io_error_detailed))]
    IoDetailed {
        message: String,
        path: Option<PathBuf>,
    },

    #[error("Validation error: {0}")]
    #[diagnostic(
        code(agent::validation_error),
        help("Check that the search request meets the required format and constraints")
    )]
    Validation(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(
        code(agent::config_error),
        help("Check the agent configuration file and LOG_AGENT__* environment variables")
    )]
    Config(String),

    #[error("Index error: {0}")]
    #[diagnostic(code(agent::index_error))]
    Index(String),

    #[error("Network error: {0}")]
    #[diagnostic(code(agent::network_error))]
    Network(String),

    #[error("Report error: {0}")]
    #[diagnostic(code(agent::report_error))]
    Report(String),

    #[error("Internal error: {0}")]
    #[diagnostic(code(agent::internal_error))]
    Internal(String),
}

impl AppError {
    /**
     * 为错误添加上下文信息
     */
    pub fn with_context(self, context: impl Into<String>) -> Self {
        let context = context.into();
        match self {
            AppError::IoDetailed { message, path } => AppError::IoDetailed {
                message: format!("{}: {}", context, message),
                path,
            },
            AppError::Validation(message) => {
                AppError::Validation(format!("{}: {}", context, message))
            }
            AppError::Index(message) => AppError::Index(format!("{}: {}", context, message)),
            other => other,
        }
    }

    /**
     * 创建验证错误
     */
    pub fn validation_error(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    /**
     * 创建配置错误
     */
    pub fn config_error(message: impl Into<String>) -> Self {
        AppError::Config(message.into())
    }

    /**
     * 创建索引写入错误
     */
    pub fn index_error(message: impl Into<String>) -> Self {
        AppError::Index(message.into())
    }

    /**
     * 创建详细的IO错误
     */
    pub fn io_error(message: impl Into<String>, path: Option<PathBuf>) -> Self {
        AppError::IoDetailed {
            message: message.into(),
            path,
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        AppError::Network(error.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(error: config::ConfigError) -> Self {
        AppError::Config(error.to_string())
    }
}

/// 时间戳解析失败的原因
///
/// 对扫描来说这从来不是致命错误：调用方把它当作“跳过这一行”。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimestampError {
    #[error("date field {position} missing (line has {available} tokens)")]
    MissingToken { position: usize, available: usize },

    #[error("cannot parse {input:?} with {format:?}: {reason}")]
    Unparseable {
        input: String,
        format: String,
        reason: String,
    },

    #[error("{input:?} does not exist in the local timezone")]
    NonexistentLocalTime { input: String },
}

/**
 * 统一结果类型
 */
pub type Result<T> = std::result::Result<T, AppError>;
