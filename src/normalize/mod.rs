//! 响应归一化
//!
//! 把上游任意形状的同步响应映射成调用方库期望的形状：
//! 保证 `output_text`、`id`、`usage` 三个字段存在，其余上游字段
//! 原样保留（非破坏性扩展，不做替换）。

pub mod stream;

use chrono::Utc;
use serde_json::{Map, Value, json};

use crate::error::AdapterError;

/// 同步响应归一化
///
/// `output_text` 的提取顺序：`result.text` → `text` →
/// `choices[0].message.content`，都不存在时为空字符串。
pub fn normalize_response(raw: &Value) -> Result<Value, AdapterError> {
    let Some(object) = raw.as_object() else {
        return Err(AdapterError::translation(
            "upstream response must be a JSON object",
        ));
    };

    let text = extract_output_text(object);

    let mut out = object.clone();
    out.insert("output_text".to_string(), Value::String(text));

    if !out.get("id").is_some_and(Value::is_string) {
        out.insert(
            "id".to_string(),
            Value::String(format!("resp-{}", Utc::now().timestamp_millis())),
        );
    }

    let usage = normalize_usage(object.get("usage"));
    out.insert("usage".to_string(), usage);

    Ok(Value::Object(out))
}

/// 从上游响应中提取输出文本
fn extract_output_text(object: &Map<String, Value>) -> String {
    if let Some(text) = object
        .get("result")
        .and_then(|r| r.get("text"))
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
    {
        return text.to_string();
    }
    if let Some(text) = object
        .get("text")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
    {
        return text.to_string();
    }
    object
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

/// usage 归一化：三个 token 计数字段总是存在，未知字段保留
fn normalize_usage(usage: Option<&Value>) -> Value {
    let mut out = usage
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    for key in ["prompt_tokens", "completion_tokens", "total_tokens"] {
        out.entry(key.to_string()).or_insert(Value::Null);
    }
    Value::Object(out)
}

/// 兜底 usage 形状（测试与文档用）
pub fn empty_usage() -> Value {
    json!({
        "prompt_tokens": null,
        "completion_tokens": null,
        "total_tokens": null
    })
}
