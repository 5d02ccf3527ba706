//! 最小示例：Basic 令牌模式
//!
//! 先发一次同步 responses 调用，再用 chat 接口消费一条流式响应。
//! 运行前把环境变量指向真实网关，否则请求会落在示例地址上。

use std::{env, fmt, io::IsTerminal};

use chrono::Local;
use futures_util::StreamExt;
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

    set_default_env("OPENAI_BASIC_BASE_URL", "https://internal.company.ai");
    // 会以 Authorization: Basic abc.def.ghi 发送
    set_default_env("OPENAI_BASIC_TOKEN", "abc.def.ghi");

    let client = AdapterClient::from_env()?;

    let outcome = client
        .responses_create("gpt-4o-mini", json!("hello"), Map::new(), false)
        .await?;
    if let ResponsesOutcome::Complete(response) = outcome {
        println!(
            "SYNC: {}",
            response.get("output_text").and_then(Value::as_str).unwrap_or("")
        );
    }

    let messages = vec![json!({
        "role": "user",
        "content": "stream a tiny poem no punctuation"
    })];
    let outcome = client
        .chat_create("gpt-4o-mini", &messages, Map::new(), true)
        .await?;

    match outcome {
        ResponsesOutcome::Stream(mut events) => {
            while let Some(event) = events.next().await {
                let event = event?;
                match event.get("type").and_then(Value::as_str) {
                    Some("response.delta") => {
                        let text = event
                            .pointer("/delta/output_text")
                            .and_then(Value::as_str)
                            .unwrap_or("");
                        print!("{text}");
                    }
                    Some("response.completed") => println!("\n[done]"),
                    _ => {}
                }
            }
        }
        // OPENAI_BASIC_DISABLE_STREAMING=1 时流式请求降级为同步响应
        ResponsesOutcome::Complete(response) => {
            println!(
                "{}",
                response.get("output_text").and_then(Value::as_str).unwrap_or("")
            );
        }
    }

    Ok(())
}
