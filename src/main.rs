//! Wayfarer - 行程规划编排核心
//!
//! 入口：初始化日志、按配置装配 TripPlanner，对一份行程请求运行一次规划并输出 JSON。
//!
//! 用法：`wayfarer [request.json] [--agents flight,hotels] [--config path.toml]`
//! 不给请求文件时使用内置的巴黎演示请求。

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use wayfarer::core::{create_planner, TripRequest};

/// Wayfarer：对一份行程请求运行一次多 Agent 规划，输出 JSON
#[derive(Parser, Debug)]
#[command(name = "wayfarer")]
#[command(version, about, long_about = None)]
struct CliArgs {
    /// 行程请求 JSON 文件；缺省时使用巴黎演示请求
    request: Option<PathBuf>,

    /// 只运行这些 Agent（逗号分隔，如 flight,hotels）
    #[arg(long, value_delimiter = ',')]
    agents: Option<Vec<String>>,

    /// 配置文件路径（TOML）
    #[arg(long)]
    config: Option<PathBuf>,
}

fn demo_request() -> anyhow::Result<TripRequest> {
    serde_json::from_value(serde_json::json!({
        "destination": "Paris, France",
        "origin": "New York",
        "start_date": "2025-06-01",
        "end_date": "2025-06-04",
        "travelers": 2,
        "currency": "EUR",
        "preferences": {
            "travel_style": "moderate",
            "travel_mode": "walking",
            "interests": ["museums", "history"]
        },
        "budget": { "total": 4000.0 }
    }))
    .context("Failed to build demo request")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    wayfarer::observability::init();

    let cli = CliArgs::parse();
    let request = match &cli.request {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read request {}", path.display()))?;
            serde_json::from_str::<TripRequest>(&raw)
                .with_context(|| format!("Invalid trip request {}", path.display()))?
        }
        None => {
            tracing::info!("No request file given, using Paris demo request");
            demo_request()?
        }
    };

    let planner = create_planner(cli.config).context("Failed to create planner")?;
    let response = planner.run(&request, cli.agents.as_deref()).await;

    println!(
        "{}",
        serde_json::to_string_pretty(&response).context("Failed to serialize plan")?
    );
    if !response.success {
        std::process::exit(1);
    }
    Ok(())
}
