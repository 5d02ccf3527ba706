//! OpenAI 客户端到内部网关的适配层
//!
//! 调用方继续使用标准的 `responses.create` / `chat.completions.create`
//! 调用形状，适配层负责三件事：
//! - 从环境变量解析网关地址、认证方式与各类映射表（[`config`]）
//! - 把逻辑调用翻译成网关实际的路径、请求头和请求体（[`translate`]）
//! - 把网关响应（同步或 SSE 流式）归一化回调用方期望的形状（[`normalize`]）
//!
//! 网络由 [`transport::Transport`] 承担，默认实现基于 hyper；
//! 测试时可注入假传输，翻译与归一化全程不碰网络。

pub mod client;
pub mod config;
pub mod error;
pub mod normalize;
pub mod translate;
pub mod transport;

pub use client::{AdapterClient, ResponsesOutcome};
pub use config::{AdapterConfig, AtomicConfig, AuthType};
pub use error::AdapterError;
pub use normalize::{normalize_response, stream::EventStream};
pub use translate::{TranslatedRequest, translate};
pub use transport::{ByteStream, HyperTransport, Transport};
