//! 配置管理基础设施层
//!
//! 分层加载：
//! - 内置默认值
//! - 可选的 TOML 配置文件
//! - `LOG_AGENT__` 前缀的环境变量（例如 `LOG_AGENT__INDEX__URL`）

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::services::ScanSettings;

/// 默认配置文件位置
pub const DEFAULT_CONFIG_PATH: &str = "config/agent.toml";

/// 环境变量前缀
pub const ENV_PREFIX: &str = "LOG_AGENT";

/// 全局配置根结构
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AgentConfig {
    #[validate(nested)]
    pub agent: AgentSection,

    #[validate(nested)]
    pub scan: ScanConfig,

    #[validate(nested)]
    pub index: IndexConfig,

    #[validate(nested)]
    pub report: ReportConfig,

    #[validate(nested)]
    pub logging: LoggingConfig,
}

/// 主机标识
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AgentSection {
    /// 不设置时使用系统主机名
    #[validate(length(min = 1, max = 255))]
    pub host_name: Option<String>,
}

/// 扫描配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ScanConfig {
    #[validate(range(min = 512, max = 1048576))]
    pub buffer_size: usize,

    #[validate(range(min = 1, max = 64))]
    pub upload_concurrency: usize,

    #[validate(range(min = 1, max = 100000))]
    pub upload_queue_capacity: usize,

    /// 请求未带 maxCount 时使用
    #[validate(range(min = 1, max = 1000000))]
    pub default_max_count: u64,
}

/// 索引服务配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct IndexConfig {
    #[validate(length(min = 1, max = 500))]
    pub url: String,

    pub username: Option<String>,

    pub password: Option<String>,

    #[validate(range(min = 1, max = 600))]
    pub request_timeout_secs: u64,

    #[validate(length(min = 1, max = 100))]
    pub index_prefix: String,
}

/// 完成回调配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ReportConfig {
    /// 不设置时不发送回调
    #[validate(length(min = 1, max = 500))]
    pub url: Option<String>,

    #[validate(range(min = 1, max = 600))]
    pub timeout_secs: u64,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LoggingConfig {
    #[validate(length(min = 1, max = 200))]
    pub level: String,

    pub json: bool,

    /// 设置后额外按天滚动写入该目录
    pub directory: Option<PathBuf>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            buffer_size: 4096,
            upload_concurrency: 5,
            upload_queue_capacity: 64,
            default_max_count: 10_000,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:9200".to_string(),
            username: None,
            password: None,
            request_timeout_secs: 30,
            index_prefix: "log_search".to_string(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            directory: None,
        }
    }
}

impl From<&ScanConfig> for ScanSettings {
    fn from(config: &ScanConfig) -> Self {
        Self {
            buffer_size: config.buffer_size,
            upload_concurrency: config.upload_concurrency,
            upload_queue_capacity: config.upload_queue_capacity,
        }
    }
}

impl AgentConfig {
    /// 本机标识：配置优先，其次系统主机名，最后 "localhost"
    pub fn host_name(&self) -> String {
        self.agent
            .host_name
            .clone()
            .or_else(sysinfo::System::host_name)
            .unwrap_or_else(|| "localhost".to_string())
    }

    pub fn scan_settings(&self) -> ScanSettings {
        ScanSettings::from(&self.scan)
    }
}

/// 配置加载器
#[derive(Debug, Clone)]
pub struct AgentConfigLoader {
    file: PathBuf,
    /// 显式指定的文件必须存在
    required: bool,
    env_prefix: String,
}

impl Default for AgentConfigLoader {
    fn default() -> Self {
        Self {
            file: PathBuf::from(DEFAULT_CONFIG_PATH),
            required: false,
            env_prefix: ENV_PREFIX.to_string(),
        }
    }
}

impl AgentConfigLoader {
    /// `file` 为 None 时尝试默认位置，不存在也不报错
    pub fn new(file: Option<PathBuf>) -> Self {
        match file {
            Some(file) => Self {
                file,
                required: true,
                ..Default::default()
            },
            None => Self::default(),
        }
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    /**
     * 加载并校验配置
     *
     * # 错误
     * 文件格式错误、环境变量类型不对或校验失败时返回 `AppError::Config`
     */
    pub fn load(&self) -> Result<AgentConfig> {
        let defaults = Config::try_from(&AgentConfig::default())?;

        let config: AgentConfig = Config::builder()
            .add_source(defaults)
            .add_source(File::from(self.file.as_path()).required(self.required))
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config
            .validate()
            .map_err(|e| AppError::config_error(format!("invalid configuration: {}", e)))?;

        debug!(file = %self.file.display(), "Configuration loaded");
        Ok(config)
    }
}
