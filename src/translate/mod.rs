//! 请求翻译器
//!
//! 给定逻辑端点、模型名、请求体和流式意图，产出具体的上游路径、
//! 请求头和改写后的请求体。纯函数：除不可变配置快照外不依赖任何状态，
//! 不做网络调用，可以在多线程/多任务间并发调用。

mod headers;
mod payload;

use http::HeaderMap;
use serde_json::{Map, Value};
use tracing::debug;

use crate::{config::AdapterConfig, error::AdapterError};

pub use headers::build_headers;
pub use payload::rewrite_payload;

/// 流式端点键的后缀约定
pub const STREAM_SUFFIX: &str = ":stream";

/// 翻译结果：交给传输层的全部要素
#[derive(Debug)]
pub struct TranslatedRequest {
    /// 上游请求路径
    pub path: String,
    /// 出站请求头（含认证头）
    pub headers: HeaderMap,
    /// 改写后的请求体
    pub body: Map<String, Value>,
    /// 实际生效的流式意图（disable_streaming 时被强制为 false）
    pub is_stream: bool,
}

/// 翻译一次逻辑调用
pub fn translate(
    config: &AdapterConfig,
    logical_key: &str,
    model: &str,
    payload: &Value,
    is_stream: bool,
) -> Result<TranslatedRequest, AdapterError> {
    let Some(payload) = payload.as_object() else {
        return Err(AdapterError::translation("payload must be a JSON object"));
    };

    // 全局禁用流式时强制降级为同步调用，调用方会拿到完整响应而不是事件流
    let effective_stream = is_stream && !config.disable_streaming;
    if is_stream && !effective_stream {
        debug!("流式请求被 OPENAI_BASIC_DISABLE_STREAMING 降级为同步调用");
    }

    let path = route_for(config, model, logical_key, effective_stream);
    let headers = build_headers(config.auth_type, &config.token, &config.default_headers)?;
    let body = rewrite_payload(
        payload,
        &config.param_map,
        &config.drop_params,
        &config.extra_allow,
    );

    debug!(
        "🔄 翻译完成: {} (model={}) -> {} (stream={})",
        logical_key, model, path, effective_stream
    );

    Ok(TranslatedRequest {
        path,
        headers,
        body,
        is_stream: effective_stream,
    })
}

/// 路径解析优先级：模型路由 > path_map > 逻辑键透传
///
/// 模型路由按配置顺序求值，命中即停；命中但未给出 path 时
/// 继续走 `path_map` 查找。
fn route_for(config: &AdapterConfig, model: &str, logical_key: &str, stream: bool) -> String {
    for route in &config.model_routes {
        if route.matches(model) {
            if let Some(path) = &route.path {
                return path.clone();
            }
            break;
        }
    }
    let key = if stream {
        format!("{logical_key}{STREAM_SUFFIX}")
    } else {
        logical_key.to_string()
    };
    config
        .path_map
        .get(&key)
        .cloned()
        .unwrap_or_else(|| logical_key.to_string())
}
