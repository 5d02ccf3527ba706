//! 按模型路由覆盖
//!
//! 模式是简单 glob：`*` 匹配任意段，`?` 匹配单个字符，其余字符字面匹配。
//! 解析时把模式编译成锚定正则，匹配按配置顺序求值，命中即停（first-match-wins）。

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::AdapterError;

/// 单条模型路由：glob 模式 + 路径覆盖 + 其余覆盖字段原样保留
#[derive(Debug, Clone)]
pub struct ModelRoute {
    pattern: String,
    matcher: Regex,
    /// 显式路径覆盖；命中时优先于 `path_map`
    pub path: Option<String>,
    /// path 以外的覆盖字段，原样透传给调用方
    pub overrides: Map<String, Value>,
}

impl ModelRoute {
    /// 从配置条目解析一条路由
    pub fn parse(pattern: &str, cfg: &Map<String, Value>) -> Result<Self, AdapterError> {
        if pattern.is_empty() {
            return Err(AdapterError::config(
                "OPENAI_BASIC_MODEL_ROUTES patterns must be non-empty",
            ));
        }
        let matcher = compile_glob(pattern)?;

        let path = match cfg.get("path") {
            None => None,
            Some(Value::String(p)) => Some(p.clone()),
            Some(_) => {
                return Err(AdapterError::config(format!(
                    "OPENAI_BASIC_MODEL_ROUTES entry {pattern:?}: path must be a string"
                )));
            }
        };
        let overrides = cfg
            .iter()
            .filter(|(key, _)| key.as_str() != "path")
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(Self {
            pattern: pattern.to_string(),
            matcher,
            path,
            overrides,
        })
    }

    /// 原始 glob 模式
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// 模型名是否命中该路由（整串匹配）
    pub fn matches(&self, model: &str) -> bool {
        self.matcher.is_match(model)
    }
}

/// glob → 锚定正则：`*` → `.*`，`?` → `.`，其余字符转义
fn compile_glob(pattern: &str) -> Result<Regex, AdapterError> {
    let mut regex_src = String::with_capacity(pattern.len() + 8);
    regex_src.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => regex_src.push_str(".*"),
            '?' => regex_src.push('.'),
            other => regex_src.push_str(&regex::escape(&other.to_string())),
        }
    }
    regex_src.push('$');
    Regex::new(&regex_src).map_err(|e| {
        AdapterError::config(format!("invalid model route pattern {pattern:?}: {e}"))
    })
}
