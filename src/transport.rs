//! 传输层
//!
//! [`Transport`] 是翻译核心与网络之间的缝：核心只把
//! `(path, headers, body, is_stream)` 交给它，拿回解码后的响应体或
//! 字节流。网络失败原样透传为 `Transport` 错误，核心不重试、不改写。
//!
//! [`HyperTransport`] 是自带实现：HTTP/HTTPS 连接器使用 webpki-roots
//! 内置证书，不依赖系统证书，提高跨平台稳定性。

use std::{io::Read, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use flate2::read::GzDecoder;
use futures_util::{StreamExt, stream::BoxStream};
use http::{
    Uri,
    header::{CONTENT_TYPE, HOST, HeaderValue},
};
use http_body_util::{BodyExt, BodyStream, Full};
use hyper::Request as HyperRequest;
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use serde_json::Value;
use tracing::{debug, info};

use crate::{error::AdapterError, translate::TranslatedRequest};

/// 传输层字节流：解码前的原始 chunk 序列
pub type ByteStream = BoxStream<'static, Result<Bytes, AdapterError>>;

/// HTTP 客户端类型别名
pub type HttpClient = Client<hyper_rustls::HttpsConnector<HttpConnector>, Full<Bytes>>;

/// 传输调用方约定
#[async_trait]
pub trait Transport: Send + Sync {
    /// 同步调用：返回解码后的响应体
    async fn send(&self, request: &TranslatedRequest) -> Result<Value, AdapterError>;

    /// 流式调用：返回原始字节流，由归一化层消费
    async fn open_stream(&self, request: &TranslatedRequest) -> Result<ByteStream, AdapterError>;
}

/// 基于 hyper 的自带传输实现
pub struct HyperTransport {
    client: Arc<HttpClient>,
    base_url: String,
    host: Option<String>,
}

impl HyperTransport {
    /// 创建支持 HTTP 和 HTTPS 的传输
    pub fn new(base_url: &str) -> Self {
        let https = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .build();

        let client = Client::builder(TokioExecutor::new()).build(https);

        let host = base_url
            .parse::<Uri>()
            .ok()
            .and_then(|uri| uri.authority().map(|a| a.host().to_string()));

        Self {
            client: Arc::new(client),
            base_url: base_url.trim_end_matches('/').to_string(),
            host,
        }
    }

    /// 组装出站请求：拼接 URL、复制翻译层的头、注入 host 与 content-type
    fn build_request(
        &self,
        request: &TranslatedRequest,
    ) -> Result<HyperRequest<Full<Bytes>>, AdapterError> {
        let url = join_url(&self.base_url, &request.path);
        debug!("Proxying to: {}", url);

        let mut builder = HyperRequest::builder().method("POST").uri(&url);

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if !request.headers.contains_key(CONTENT_TYPE) {
            builder = builder.header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        if let Some(host) = &self.host {
            builder = builder.header(HOST, host);
        }

        let body = serde_json::to_vec(&request.body)
            .map_err(|e| AdapterError::translation(format!("failed to serialize body: {e}")))?;

        builder
            .body(Full::new(Bytes::from(body)))
            .map_err(AdapterError::transport)
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn send(&self, request: &TranslatedRequest) -> Result<Value, AdapterError> {
        let proxy_req = self.build_request(request)?;

        let resp = self
            .client
            .request(proxy_req)
            .await
            .map_err(AdapterError::transport)?;
        let (parts, body) = resp.into_parts();

        let body_bytes = BodyExt::collect(body)
            .await
            .map_err(AdapterError::transport)?
            .to_bytes();

        // 检查并解压 gzip 编码的响应体
        let content_encoding = parts
            .headers
            .get("content-encoding")
            .and_then(|v| v.to_str().ok());
        let body_bytes = decompress_gzip_if_needed(&body_bytes, content_encoding);

        if !parts.status.is_success() {
            return Err(AdapterError::UpstreamStatus {
                status: parts.status.as_u16(),
                body: String::from_utf8_lossy(&body_bytes).into_owned(),
            });
        }

        serde_json::from_slice(&body_bytes)
            .map_err(|e| AdapterError::transport(format!("upstream body is not JSON: {e}")))
    }

    async fn open_stream(&self, request: &TranslatedRequest) -> Result<ByteStream, AdapterError> {
        let proxy_req = self.build_request(request)?;

        let resp = self
            .client
            .request(proxy_req)
            .await
            .map_err(AdapterError::transport)?;
        let (parts, body) = resp.into_parts();

        if !parts.status.is_success() {
            let body_bytes = BodyExt::collect(body)
                .await
                .map_err(AdapterError::transport)?
                .to_bytes();
            return Err(AdapterError::UpstreamStatus {
                status: parts.status.as_u16(),
                body: String::from_utf8_lossy(&body_bytes).into_owned(),
            });
        }

        info!("=== SSE 流式响应开始 ===");
        let stream = BodyStream::new(body)
            .filter_map(|frame| async move {
                match frame {
                    // 只保留数据帧，丢弃 trailer
                    Ok(f) => f.into_data().ok().map(Ok),
                    Err(e) => Some(Err(AdapterError::transport(e))),
                }
            })
            .boxed();
        Ok(stream)
    }
}

/// 拼接 base_url 与路径，保证正好一个斜杠分隔
fn join_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

/// 尝试解压 gzip 编码的响应体
///
/// 检查 content-encoding 头部，如果是 gzip 则自动解压；
/// 解压失败时退回原始响应体。
fn decompress_gzip_if_needed(body_bytes: &Bytes, content_encoding: Option<&str>) -> Bytes {
    let is_gzip = content_encoding.is_some_and(|enc| enc.to_lowercase().contains("gzip"));

    if !is_gzip {
        return body_bytes.clone();
    }

    let mut decoder = GzDecoder::new(&body_bytes[..]);
    let mut decompressed = Vec::new();
    match decoder.read_to_end(&mut decompressed) {
        Ok(_) => {
            debug!(
                "📦 gzip 解压成功: {} bytes → {} bytes",
                body_bytes.len(),
                decompressed.len()
            );
            decompressed.into()
        }
        Err(e) => {
            tracing::warn!("gzip 解压失败: {}，使用原始响应体", e);
            body_bytes.clone()
        }
    }
}
