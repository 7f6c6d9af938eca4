//! 命令行入口：读取一个检索请求（JSON），运行一次完整检索

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use log_search_agent::infrastructure::{
    init_tracing, AgentConfigLoader, ElasticsearchSink, HttpCompletionReporter,
};
use log_search_agent::utils::locate;
use log_search_agent::{FreeSearchPayload, SearchContext, SearchOrchestrator, SearchRequest};

#[derive(Debug, Parser)]
#[command(name = "log-search-agent", version, about = "Time-window log search and index upload")]
struct Args {
    /// 配置文件（TOML），默认 config/agent.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 检索请求 JSON 文件
    #[arg(short, long)]
    request: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let loader = AgentConfigLoader::new(args.config.clone());
    let config = loader.load().context("Failed to load configuration")?;
    let _guard = init_tracing(&config.logging).context("Failed to initialize logging")?;
    info!(config = %loader.file().display(), index = %config.index.url, "Configuration loaded");

    let raw = std::fs::read_to_string(&args.request)
        .with_context(|| format!("Failed to read request {}", args.request.display()))?;
    let payload: FreeSearchPayload =
        serde_json::from_str(&raw).context("Error parameter: request is not valid JSON")?;

    let host_name = config.host_name();
    let request = SearchRequest::from_payload(payload, &host_name, config.scan.default_max_count)?;
    let files = locate(&request.log_dirs, &request.log_name)?;

    let sink = Arc::new(ElasticsearchSink::new(&config.index)?);
    let mut orchestrator = SearchOrchestrator::new(sink);
    if let Some(reporter) = HttpCompletionReporter::from_config(&config.report)? {
        orchestrator = orchestrator.with_reporter(Arc::new(reporter));
    }

    let ctx = SearchContext::new(
        request,
        host_name,
        &config.index.index_prefix,
        config.scan_settings(),
    );
    info!(task_id = %ctx.request.task_id, files = files.len(), "Log search task is running");

    let outcome = orchestrator
        .spawn(ctx, files)
        .await
        .context("Search task panicked")?;
    println!("{}", serde_json::to_string(&outcome.report)?);

    Ok(())
}
