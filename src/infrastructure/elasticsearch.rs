//! Elasticsearch 兼容的索引写入端

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, info};

use super::config::IndexConfig;
use crate::error::{AppError, Result};
use crate::models::document::{HOST_FIELD, TASK_FIELD, TIME_FIELD};
use crate::models::LogDocument;
use crate::services::IndexSink;

/// 新建索引的 max_result_window
const MAX_RESULT_WINDOW: &str = "1000000000";

/**
 * 新建索引时使用的映射
 *
 * 固定字段和每个表头显式声明为 keyword，`_time` 按 epoch_second 解析；
 * 动态模板把其它字符串和日期字段也压成 keyword，避免表头名被自动推断成 date。
 */
pub fn index_mapping(headers: &[String]) -> Value {
    let mut properties = Map::new();
    properties.insert(
        TIME_FIELD.to_string(),
        json!({"type": "date", "format": "epoch_second"}),
    );
    for field in [HOST_FIELD, TASK_FIELD, "*"] {
        properties.insert(field.to_string(), json!({"type": "keyword"}));
    }
    for header in headers {
        properties.insert(header.clone(), json!({"type": "keyword"}));
    }

    json!({
        "settings": {"index": {"max_result_window": MAX_RESULT_WINDOW}},
        "mappings": {
            "dynamic_templates": [
                {"string_fields": {"match": "*", "match_mapping_type": "string", "mapping": {"type": "keyword"}}},
                {"date_fields": {"match": "*", "match_mapping_type": "date", "mapping": {"type": "keyword"}}}
            ],
            "properties": properties
        }
    })
}

/// 基于 reqwest 的索引写入端
#[derive(Debug, Clone)]
pub struct ElasticsearchSink {
    client: Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
}

impl ElasticsearchSink {
    pub fn new(config: &IndexConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.username {
            Some(username) => request.basic_auth(username, self.password.as_deref()),
            None => request,
        }
    }

    async fn index_exists(&self, index: &str) -> Result<bool> {
        let response = self.authorize(self.client.head(self.url(index))).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(AppError::index_error(format!(
                "unexpected status {} checking index {}",
                status, index
            ))),
        }
    }
}

#[async_trait]
impl IndexSink for ElasticsearchSink {
    async fn ensure_index(&self, index: &str, headers: &[String]) -> Result<()> {
        if self.index_exists(index).await? {
            debug!(index, "Index already exists");
            return Ok(());
        }

        let response = self
            .authorize(self.client.put(self.url(index)))
            .json(&index_mapping(headers))
            .send()
            .await?;
        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);

        if !status.is_success() {
            return Err(AppError::index_error(format!(
                "create index {} failed with {}: {}",
                index, status, body
            )));
        }
        if body.get("acknowledged").and_then(Value::as_bool) != Some(true) {
            return Err(AppError::index_error(format!("create index {} not acknowledged", index)));
        }

        info!(index, "Index created");
        Ok(())
    }

    async fn write(&self, index: &str, document: &LogDocument) -> Result<()> {
        let response = self
            .authorize(self.client.post(self.url(&format!("{}/_doc", index))))
            .json(document)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::index_error(format!("write to {} failed with {}: {}", index, status, body)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_forces_keyword_fields() {
        let mapping = index_mapping(&["date".to_string(), "method".to_string()]);
        let properties = &mapping["mappings"]["properties"];

        assert_eq!(properties["_time"]["type"], "date");
        assert_eq!(properties["_time"]["format"], "epoch_second");
        for field in ["_hostname", "0,taskId", "*", "date", "method"] {
            assert_eq!(properties[field]["type"], "keyword", "field {}", field);
        }

        let templates = mapping["mappings"]["dynamic_templates"].as_array().unwrap();
        assert_eq!(templates.len(), 2);
        assert_eq!(templates[1]["date_fields"]["mapping"]["type"], "keyword");
        assert_eq!(mapping["settings"]["index"]["max_result_window"], "1000000000");
    }

    #[test]
    fn test_sink_trims_trailing_slash() {
        let config = IndexConfig {
            url: "http://127.0.0.1:9200/".to_string(),
            ..Default::default()
        };
        let sink = ElasticsearchSink::new(&config).unwrap();
        assert_eq!(sink.url("log_search_nginx_20240110/_doc"), "http://127.0.0.1:9200/log_search_nginx_20240110/_doc");
    }
}
