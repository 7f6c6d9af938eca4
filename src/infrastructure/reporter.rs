//! 完成回调

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;
use tracing::info;

use super::config::ReportConfig;
use crate::error::{AppError, Result};
use crate::models::CompletionReport;
use crate::services::CompletionReporter;

/// 上报端约定的内容类型
pub const REPORT_CONTENT_TYPE: &str = "text/json;charset=utf-8";

/// 把完成报告 POST 到配置的回调地址
#[derive(Debug, Clone)]
pub struct HttpCompletionReporter {
    client: Client,
    url: String,
}

impl HttpCompletionReporter {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// 没有配置回调地址时返回 None
    pub fn from_config(config: &ReportConfig) -> Result<Option<Self>> {
        config
            .url
            .as_ref()
            .map(|url| Self::new(url.clone(), Duration::from_secs(config.timeout_secs)))
            .transpose()
    }
}

#[async_trait]
impl CompletionReporter for HttpCompletionReporter {
    async fn report(&self, report: &CompletionReport) -> Result<()> {
        let body = serde_json::to_string(report)
            .map_err(|e| AppError::Report(format!("failed to encode report: {}", e)))?;

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, REPORT_CONTENT_TYPE)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Report(format!("callback {} answered {}", self.url, status)));
        }

        info!(task_id = %report.task_id, url = %self.url, "Completion report delivered");
        Ok(())
    }
}
