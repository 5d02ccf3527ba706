//! 请求体改写流水线
//!
//! 固定三步，保证输出确定：
//! 1. 按 `param_map` 改名（改名值覆盖同名已有字段）
//! 2. 移除 `drop_params` 中的字段（无条件）
//! 3. 默认白名单过滤，`extra_allow` 中的字段无视白名单放行

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};

/// 默认放行的标准补全参数（改名后的字段名）
const DEFAULT_ALLOWED_FIELDS: &[&str] = &[
    "model",
    "input",
    "instructions",
    "stream",
    "max_tokens",
    "max_output_tokens",
    "temperature",
    "top_p",
    "nucleus",
    "top_k",
    "stop",
    "stop_sequences",
    "n",
    "seed",
    "user",
    "metadata",
    "tools",
    "tool_choice",
    "parallel_tool_calls",
    "response_format",
    "presence_penalty",
    "frequency_penalty",
    "logit_bias",
    "logprobs",
    "top_logprobs",
    "modalities",
    "store",
    "reasoning",
    "text",
    "truncation",
    "previous_response_id",
];

/// 对请求体顶层字段执行改名 → 丢弃 → 白名单过滤
pub fn rewrite_payload(
    payload: &Map<String, Value>,
    param_map: &HashMap<String, String>,
    drop_params: &HashSet<String>,
    extra_allow: &HashSet<String>,
) -> Map<String, Value> {
    // 第一步：改名。先放入未改名字段，再写入改名字段，
    // 保证改名结果覆盖 payload 中已有的同名字段
    let mut renamed = Map::new();
    for (key, value) in payload {
        if !param_map.contains_key(key) {
            renamed.insert(key.clone(), value.clone());
        }
    }
    for (key, value) in payload {
        if let Some(target) = param_map.get(key) {
            renamed.insert(target.clone(), value.clone());
        }
    }

    // 第二步：丢弃；第三步：白名单 + extra_allow 放行
    let mut out = Map::new();
    for (key, value) in renamed {
        if drop_params.contains(&key) {
            continue;
        }
        if extra_allow.contains(&key) || DEFAULT_ALLOWED_FIELDS.contains(&key.as_str()) {
            out.insert(key, value);
        }
    }
    out
}
