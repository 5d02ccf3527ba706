//! 最小示例：Bearer 认证模式

use std::{env, fmt, io::IsTerminal};

use chrono::Local;
use oai_adapter::{AdapterClient, ResponsesOutcome};
use serde_json::{Map, Value, json};
use tracing_subscriber::{
    EnvFilter,
    fmt::{format::Writer, time::FormatTime},
};

struct LoggerFormatter;

impl FormatTime for LoggerFormatter {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%d %H:%M:%S"))
    }
}

fn set_default_env(name: &str, value: &str) {
    if env::var_os(name).is_none() {
        // 单线程启动阶段，尚未 spawn 任何任务
        unsafe { env::set_var(name, value) };
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let is_terminal = std::io::stdout().is_terminal();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_timer(LoggerFormatter)
        .with_ansi(is_terminal)
        .init();

    set_default_env("OPENAI_AUTH_TYPE", "bearer");
    set_default_env("OPENAI_BASE_URL", "https://internal.company.ai");
    set_default_env("OPENAI_TOKEN", "REPLACE_WITH_BEARER");

    let client = AdapterClient::from_env()?;

    let mut opts = Map::new();
    opts.insert("max_tokens".to_string(), json!(8));

    let outcome = client
        .responses_create("demo-model", json!("ping"), opts, false)
        .await?;
    if let ResponsesOutcome::Complete(response) = outcome {
        println!(
            "{}",
            response.get("output_text").and_then(Value::as_str).unwrap_or("")
        );
    }

    Ok(())
}
