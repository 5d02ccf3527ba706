//! 适配器错误分类
//!
//! 四类错误对应四个阶段：
//! - `Config`：配置解析失败，构造阶段直接失败，不可重试
//! - `Translation`：单次请求翻译失败，只影响当前调用
//! - `Transport`：网络/HTTP 层失败，原样透传，重试策略由调用方决定
//! - `StreamTruncated`：流在收到结束标记前被关闭
//!
//! 所有错误都直接返回给调用方，核心内部不吞错、不隐式重试。

use thiserror::Error;

/// 适配器统一错误类型
#[derive(Debug, Error)]
pub enum AdapterError {
    /// 配置缺失、非法或为占位符示例值
    #[error("configuration error: {0}")]
    Config(String),

    /// 请求翻译失败（payload 不是对象、header 非法等）
    #[error("translation error: {0}")]
    Translation(String),

    /// 传输层失败（连接拒绝、TLS、超时、响应体不可解码）
    #[error("transport error: {0}")]
    Transport(String),

    /// 上游返回非 2xx 状态码
    #[error("upstream returned status {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    /// 流式响应在 `response.completed` 之前被关闭
    #[error("stream closed before end-of-stream marker")]
    StreamTruncated,
}

impl AdapterError {
    /// 配置错误的便捷构造
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config(reason.into())
    }

    /// 翻译错误的便捷构造
    pub fn translation(reason: impl Into<String>) -> Self {
        Self::Translation(reason.into())
    }

    /// 传输错误的便捷构造，保留来源错误的文本
    pub fn transport(source: impl std::fmt::Display) -> Self {
        Self::Transport(source.to_string())
    }
}
