//! 适配器客户端
//!
//! 对外的固定调用契约：`create` 风格的调用接收模型名、输入和流式
//! 意图，返回完整响应对象或增量事件序列。客户端本身只做翻译与
//! 归一化的编排，网络调用全部委托给注入的 [`Transport`]。

use std::sync::Arc;

use rayon::prelude::*;
use serde_json::{Map, Value};
use tracing::info;

use crate::{
    config::AtomicConfig,
    error::AdapterError,
    normalize::{normalize_response, stream::EventStream},
    translate::translate,
    transport::{HyperTransport, Transport},
};

/// 一次 create 调用的结果：完整响应或事件流
pub enum ResponsesOutcome {
    /// 同步调用（或流式被全局禁用后降级）的完整归一化响应
    Complete(Value),
    /// 流式调用的惰性事件序列，单消费者
    Stream(EventStream),
}

/// 适配器客户端，泛型于传输实现
pub struct AdapterClient<T: Transport = HyperTransport> {
    config: Arc<AtomicConfig>,
    transport: T,
}

impl AdapterClient<HyperTransport> {
    /// 从环境变量构造：配置解析一次并缓存，传输复用同一个 HTTP 客户端
    pub fn from_env() -> Result<Self, AdapterError> {
        let config = Arc::new(AtomicConfig::from_env()?);
        let base_url = config.get().base_url.clone();
        Ok(Self {
            config,
            transport: HyperTransport::new(&base_url),
        })
    }
}

impl<T: Transport> AdapterClient<T> {
    /// 注入配置与传输构造（测试用假传输走这里）
    pub fn with_transport(config: Arc<AtomicConfig>, transport: T) -> Self {
        Self { config, transport }
    }

    /// 当前配置快照持有者
    pub fn config(&self) -> &Arc<AtomicConfig> {
        &self.config
    }

    /// `responses.create` 等价调用
    ///
    /// `opts` 里的 `stream` 键会被剥离，流式意图只看 `stream` 参数。
    pub async fn responses_create(
        &self,
        model: &str,
        input: Value,
        opts: Map<String, Value>,
        stream: bool,
    ) -> Result<ResponsesOutcome, AdapterError> {
        self.create("/responses", model, input, opts, stream).await
    }

    /// `chat.completions.create` 等价调用：消息拍平成单个 prompt
    pub async fn chat_create(
        &self,
        model: &str,
        messages: &[Value],
        opts: Map<String, Value>,
        stream: bool,
    ) -> Result<ResponsesOutcome, AdapterError> {
        let prompt = messages_to_prompt(messages)?;
        self.create("/chat/completions", model, Value::String(prompt), opts, stream)
            .await
    }

    /// 共用的调用主干：组 payload → 翻译 → 传输 → 归一化
    async fn create(
        &self,
        logical_key: &str,
        model: &str,
        input: Value,
        mut opts: Map<String, Value>,
        stream: bool,
    ) -> Result<ResponsesOutcome, AdapterError> {
        opts.remove("stream");

        let mut payload = Map::new();
        payload.insert("model".to_string(), Value::String(model.to_string()));
        payload.insert("input".to_string(), input);
        for (key, value) in opts {
            payload.insert(key, value);
        }

        let config = self.config.get();
        let request = translate(&config, logical_key, model, &Value::Object(payload), stream)?;

        info!(
            "🔄 {} (model={}) -> {} (stream={})",
            logical_key, model, request.path, request.is_stream
        );

        if request.is_stream {
            let bytes = self.transport.open_stream(&request).await?;
            return Ok(ResponsesOutcome::Stream(EventStream::new(bytes)));
        }

        let raw = self.transport.send(&request).await?;
        let normalized = normalize_response(&raw)?;
        Ok(ResponsesOutcome::Complete(normalized))
    }
}

/// 把 chat 消息数组拍平成内部接口要求的 prompt 格式
///
/// 每条消息一行 `ROLE: 文本`，末尾补 `ASSISTANT:` 引导生成。
/// 只支持文本内容：字符串、`{type:"text"}` 块或其数组；
/// 其它内容类型报 `Translation` 错误，绝不把调试表示泄漏给模型。
pub fn messages_to_prompt(messages: &[Value]) -> Result<String, AdapterError> {
    let lines = messages
        .par_iter()
        .map(|message| {
            let role = message
                .get("role")
                .and_then(Value::as_str)
                .unwrap_or("user");
            let text = stringify_message_content(message.get("content")).map_err(|e| {
                AdapterError::translation(format!(
                    "unsupported chat message content for role {role:?}: {e}"
                ))
            })?;
            Ok(format!("{}: {}", role.to_uppercase(), text))
        })
        .collect::<Result<Vec<_>, AdapterError>>()?;

    let mut prompt = lines.join("\n");
    if !prompt.is_empty() {
        prompt.push('\n');
    }
    prompt.push_str("ASSISTANT:");
    Ok(prompt)
}

/// 提取消息内容里的纯文本；list-of-parts 编码时按换行拼接
fn stringify_message_content(content: Option<&Value>) -> Result<String, String> {
    match content {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(text)) => Ok(text.clone()),
        Some(Value::Object(part)) => {
            let part_type = part.get("type").and_then(Value::as_str);
            if part_type == Some("text")
                && let Some(text) = part.get("text").and_then(Value::as_str)
            {
                return Ok(text.to_string());
            }
            Err(format!("unsupported content part type: {part_type:?}"))
        }
        Some(Value::Array(parts)) => {
            let texts = parts
                .iter()
                .map(|part| stringify_message_content(Some(part)))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(texts
                .into_iter()
                .filter(|text| !text.is_empty())
                .collect::<Vec<_>>()
                .join("\n"))
        }
        Some(_) => Err("content must be text or a sequence of text parts".to_string()),
    }
}
