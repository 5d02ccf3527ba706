//! 流式事件归一化
//!
//! 把上游 SSE 字节流翻译成调用方库期望的事件序列：
//! - `{"type":"delta","text":…}` → `response.delta`
//! - `{"type":"done"}` → `response.completed`
//! - 空行、非 JSON 行、无法识别的事件一律跳过
//!
//! [`EventStream`] 是惰性、单消费者、只进不退的序列：收到
//! `response.completed` 即干净结束；传输在结束标记之前关闭时，
//! 以 [`AdapterError::StreamTruncated`] 收尾，与干净结束可区分。

use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures_util::Stream;
use serde_json::{Value, json};

use crate::{error::AdapterError, transport::ByteStream};

/// 事件类型：增量文本
pub const EVENT_DELTA: &str = "response.delta";
/// 事件类型：干净结束标记
pub const EVENT_COMPLETED: &str = "response.completed";

/// 归一化单行 SSE 数据；无法识别时返回 None（调用方跳过该行）
pub fn normalize_stream_line(line: &str) -> Option<Value> {
    let mut raw = line.trim();
    if raw.is_empty() {
        return None;
    }
    if let Some(rest) = raw.strip_prefix("data:") {
        raw = rest.trim();
    }
    let msg: Value = serde_json::from_str(raw).ok()?;

    match msg.get("type").and_then(Value::as_str) {
        Some("delta") => {
            let text = msg.get("text").and_then(Value::as_str).unwrap_or("");
            Some(json!({
                "type": EVENT_DELTA,
                "delta": {"output_text": text}
            }))
        }
        Some("done") => Some(json!({"type": EVENT_COMPLETED})),
        _ => msg.get("text").and_then(Value::as_str).map(|text| {
            json!({
                "type": EVENT_DELTA,
                "delta": {"output_text": text}
            })
        }),
    }
}

/// 事件是否为干净结束标记
pub fn is_end_event(event: &Value) -> bool {
    event.get("type").and_then(Value::as_str) == Some(EVENT_COMPLETED)
}

/// 惰性事件流，包装传输层字节流
///
/// 单消费者：按值消费，无法克隆；跨 chunk 的半行会被缓冲重组。
pub struct EventStream {
    inner: Option<ByteStream>,
    buf: Vec<u8>,
    saw_end: bool,
    finished: bool,
}

impl EventStream {
    /// 包装一条传输层字节流
    pub fn new(inner: ByteStream) -> Self {
        Self {
            inner: Some(inner),
            buf: Vec::new(),
            saw_end: false,
            finished: false,
        }
    }

    /// 从缓冲中弹出下一个完整行对应的事件
    fn next_buffered_event(&mut self) -> Option<Value> {
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            // 按行做有损解码：行内非法 UTF-8 只影响该行，直接跳过
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = normalize_stream_line(&line) {
                return Some(event);
            }
        }
        None
    }
}

impl Stream for EventStream {
    type Item = Result<Value, AdapterError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }
        loop {
            if let Some(event) = this.next_buffered_event() {
                if is_end_event(&event) {
                    this.saw_end = true;
                    this.finished = true;
                }
                return Poll::Ready(Some(Ok(event)));
            }

            let Some(inner) = this.inner.as_mut() else {
                // 传输已关闭且缓冲耗尽：区分干净结束与截断
                this.finished = true;
                if this.saw_end {
                    return Poll::Ready(None);
                }
                return Poll::Ready(Some(Err(AdapterError::StreamTruncated)));
            };

            match inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => this.buf.extend_from_slice(&chunk),
                Poll::Ready(Some(Err(e))) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    this.inner = None;
                    // 末尾没有换行的残留数据按最后一行处理
                    if !this.buf.is_empty() {
                        this.buf.push(b'\n');
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
