//! 配置解析
//!
//! 从环境变量解析适配器的全部配置：凭证、路径映射、参数改名表、
//! 丢弃集合、白名单补充集合、按模型路由覆盖、附加请求头、流式开关。
//!
//! 解析是幂等的纯读取，默认在构造时解析一次并缓存为不可变快照；
//! 需要热更新时显式调用 [`AtomicConfig::reload`]，用 `arc-swap`
//! 原子替换快照，读路径永远无锁。

pub mod model_route;

use std::{
    collections::{HashMap, HashSet},
    env,
    sync::Arc,
};

use arc_swap::{ArcSwap, Guard};
use serde_json::Value;
use tracing::info;

use crate::error::AdapterError;

use self::model_route::ModelRoute;

/// 主/兼容两级 base URL 变量
const BASE_URL_VARS: &[&str] = &["OPENAI_BASE_URL", "OPENAI_BASIC_BASE_URL"];

/// Token 解析链，靠前的优先
const TOKEN_VARS: &[&str] = &[
    "OPENAI_TOKEN",
    "OPENAI_BEARER_TOKEN",
    "OPENAI_BASIC_TOKEN",
    "OPENAI_API_KEY",
    "OPENAI_KEY",
];

/// 文档示例值，绝不能当作真实凭证使用
const PLACEHOLDER_TOKENS: &[&str] = &["REPLACE_ME", "YOUR_TOKEN_HERE"];

/// 认证方式：决定 Authorization 头的前缀
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthType {
    #[default]
    Basic,
    Bearer,
}

impl AuthType {
    /// 生成 Authorization 头的值
    pub fn header_value(self, token: &str) -> String {
        match self {
            Self::Basic => format!("Basic {token}"),
            Self::Bearer => format!("Bearer {token}"),
        }
    }
}

/// 适配器配置快照，构造后不可变
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// 认证方式（basic / bearer）
    pub auth_type: AuthType,
    /// 上游基础地址，必须是绝对 http(s) URL
    pub base_url: String,
    /// 凭证，非空且不为占位符
    pub token: String,
    /// 逻辑端点 → 上游路径，流式变体带 `:stream` 后缀
    pub path_map: HashMap<String, String>,
    /// 顶层参数改名表
    pub param_map: HashMap<String, String>,
    /// 改名后无条件移除的参数
    pub drop_params: HashSet<String>,
    /// 绕过默认白名单的参数
    pub extra_allow: HashSet<String>,
    /// 按模型 glob 匹配的路由覆盖，按插入顺序求值
    pub model_routes: Vec<ModelRoute>,
    /// 全局禁用流式：请求方的 stream=true 会被降级为同步调用
    pub disable_streaming: bool,
    /// 附加到每个请求的头（不允许覆盖 Authorization）
    pub default_headers: HashMap<String, String>,
    /// 别名开关：仅供外部导入改写工具消费，对翻译本身无影响
    pub alias_openai: bool,
}

impl AdapterConfig {
    /// 从进程环境变量解析配置
    pub fn from_env() -> Result<Self, AdapterError> {
        Self::resolve(|name| env::var(name).ok())
    }

    /// 从任意查找函数解析配置（测试时注入假环境）
    pub fn resolve<F>(lookup: F) -> Result<Self, AdapterError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let auth_type = match pick_env(&lookup, &["OPENAI_AUTH_TYPE"])
            .map(|v| v.to_lowercase())
            .as_deref()
        {
            None | Some("basic") => AuthType::Basic,
            Some("bearer") => AuthType::Bearer,
            Some(other) => {
                return Err(AdapterError::config(format!(
                    "invalid auth type: OPENAI_AUTH_TYPE must be basic or bearer, got {other:?}"
                )));
            }
        };

        let base_url = pick_env(&lookup, BASE_URL_VARS)
            .ok_or_else(|| AdapterError::config("missing base url: set OPENAI_BASE_URL"))?;
        validate_base_url(&base_url)?;

        let token = pick_env(&lookup, TOKEN_VARS)
            .ok_or_else(|| AdapterError::config("missing token: set OPENAI_TOKEN"))?;
        if PLACEHOLDER_TOKENS.contains(&token.as_str()) {
            return Err(AdapterError::config(
                "placeholder token: OPENAI_TOKEN must be configured with a real credential",
            ));
        }

        let path_map = match load_json_env(&lookup, "OPENAI_BASIC_PATH_MAP")? {
            Some(value) => ensure_str_mapping("OPENAI_BASIC_PATH_MAP", &value)?,
            None => default_path_map(),
        };

        let param_map = match load_json_env(&lookup, "OPENAI_BASIC_PARAM_MAP")? {
            Some(value) => ensure_str_mapping("OPENAI_BASIC_PARAM_MAP", &value)?,
            None => default_param_map(),
        };

        let drop_params = match load_json_env(&lookup, "OPENAI_BASIC_DROP_PARAMS")? {
            Some(value) => ensure_str_set("OPENAI_BASIC_DROP_PARAMS", &value)?,
            None => ["logprobs", "tool_choice"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        };

        let extra_allow = match load_json_env(&lookup, "OPENAI_BASIC_EXTRA_ALLOW")? {
            Some(value) => ensure_str_set("OPENAI_BASIC_EXTRA_ALLOW", &value)?,
            None => std::iter::once("safety_profile".to_string()).collect(),
        };

        let model_routes = match load_json_env(&lookup, "OPENAI_BASIC_MODEL_ROUTES")? {
            Some(value) => ensure_model_routes("OPENAI_BASIC_MODEL_ROUTES", &value)?,
            None => Vec::new(),
        };

        let default_headers = match load_json_env(&lookup, "OPENAI_BASIC_HEADERS")? {
            Some(value) => ensure_str_mapping("OPENAI_BASIC_HEADERS", &value)?,
            None => HashMap::new(),
        };

        let disable_streaming = normalize_bool_env(&lookup, "OPENAI_BASIC_DISABLE_STREAMING")?;
        let alias_openai = normalize_bool_env(&lookup, "OPENAI_BASIC_ALIAS_OPENAI")?;

        Ok(Self {
            auth_type,
            base_url,
            token,
            path_map,
            param_map,
            drop_params,
            extra_allow,
            model_routes,
            disable_streaming,
            default_headers,
            alias_openai,
        })
    }
}

/// 按顺序取第一个非空白的环境变量值，去掉首尾空白
fn pick_env<F>(lookup: &F, names: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    for name in names {
        if let Some(raw) = lookup(name) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

/// 解析 JSON 形式的环境变量；未设置或空白返回 None
fn load_json_env<F>(lookup: &F, name: &str) -> Result<Option<Value>, AdapterError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| AdapterError::config(format!("invalid JSON for {name}: {e}")))
}

/// 校验值为 string → string 的对象
fn ensure_str_mapping(name: &str, value: &Value) -> Result<HashMap<String, String>, AdapterError> {
    let Some(object) = value.as_object() else {
        return Err(AdapterError::config(format!(
            "{name} must decode to an object mapping strings to strings"
        )));
    };
    let mut result = HashMap::with_capacity(object.len());
    for (key, item) in object {
        let Some(item) = item.as_str() else {
            return Err(AdapterError::config(format!(
                "{name} keys and values must be strings"
            )));
        };
        result.insert(key.clone(), item.to_string());
    }
    Ok(result)
}

/// 校验值为字符串数组
fn ensure_str_set(name: &str, value: &Value) -> Result<HashSet<String>, AdapterError> {
    let Some(items) = value.as_array() else {
        return Err(AdapterError::config(format!(
            "{name} must decode to an array of strings"
        )));
    };
    let mut result = HashSet::with_capacity(items.len());
    for item in items {
        let Some(item) = item.as_str() else {
            return Err(AdapterError::config(format!(
                "{name} entries must be strings"
            )));
        };
        result.insert(item.to_string());
    }
    Ok(result)
}

/// 校验值为 pattern → 覆盖对象 的映射，保持插入顺序
fn ensure_model_routes(name: &str, value: &Value) -> Result<Vec<ModelRoute>, AdapterError> {
    let Some(object) = value.as_object() else {
        return Err(AdapterError::config(format!(
            "{name} must decode to an object mapping strings to objects"
        )));
    };
    let mut routes = Vec::with_capacity(object.len());
    for (pattern, cfg) in object {
        let Some(cfg) = cfg.as_object() else {
            return Err(AdapterError::config(format!(
                "{name} entries must be objects"
            )));
        };
        routes.push(ModelRoute::parse(pattern, cfg)?);
    }
    Ok(routes)
}

/// 严格布尔解析；未设置返回 false
fn normalize_bool_env<F>(lookup: &F, name: &str) -> Result<bool, AdapterError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(false);
    };
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Ok(true),
        "" | "0" | "false" | "f" | "no" | "n" | "off" => Ok(false),
        other => Err(AdapterError::config(format!(
            "{name} must be a boolean flag (accepted values: 1/0/true/false/yes/no/on/off), got {other:?}"
        ))),
    }
}

/// base URL 必须是带 host 的绝对 http(s) 地址
fn validate_base_url(base_url: &str) -> Result<(), AdapterError> {
    let uri: http::Uri = base_url
        .parse()
        .map_err(|e| AdapterError::config(format!("invalid base url {base_url:?}: {e}")))?;
    let scheme_ok = matches!(uri.scheme_str(), Some("http" | "https"));
    if !scheme_ok || uri.authority().is_none() {
        return Err(AdapterError::config(format!(
            "invalid base url {base_url:?}: must be an absolute http(s) URL"
        )));
    }
    Ok(())
}

fn default_path_map() -> HashMap<String, String> {
    [
        ("/responses", "/api/generate"),
        ("/responses:stream", "/api/stream"),
        ("/chat/completions", "/api/generate"),
        ("/chat/completions:stream", "/api/stream"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_param_map() -> HashMap<String, String> {
    [("max_tokens", "max_output_tokens"), ("top_p", "nucleus")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// 全局原子配置快照，读无锁，重载时整体替换
pub struct AtomicConfig {
    inner: ArcSwap<AdapterConfig>,
}

impl AtomicConfig {
    /// 从环境变量解析并缓存配置（默认路径：构造时解析一次）
    pub fn from_env() -> Result<Self, AdapterError> {
        let config = AdapterConfig::from_env()?;
        log_config(&config);
        Ok(Self::new(config))
    }

    /// 用已有快照构造（测试注入）
    pub fn new(config: AdapterConfig) -> Self {
        Self {
            inner: ArcSwap::from(Arc::new(config)),
        }
    }

    /// 获取当前配置的 Guard（读操作）
    pub fn get(&self) -> Guard<Arc<AdapterConfig>> {
        self.inner.load()
    }

    /// 获取当前配置的 Arc 克隆（需要长期持有时）
    pub fn snapshot(&self) -> Arc<AdapterConfig> {
        self.inner.load_full()
    }

    /// 重新解析环境变量并原子替换快照
    ///
    /// 替换只发生在重算完成后，读路径不受影响；解析失败时保留旧快照。
    pub fn reload(&self) -> Result<(), AdapterError> {
        let new_config = AdapterConfig::from_env()?;
        info!("🔄 配置已重载: base_url={}", new_config.base_url);
        self.inner.store(Arc::new(new_config));
        Ok(())
    }
}

/// 打印配置摘要，凭证脱敏显示
fn log_config(config: &AdapterConfig) {
    info!(
        "✅ 配置已加载: base_url={}, auth_type={:?}, token={}***",
        config.base_url,
        config.auth_type,
        config.token.chars().take(8).collect::<String>()
    );
    info!(
        "path_map={} 项, param_map={} 项, drop={} 项, extra_allow={} 项, model_routes={} 项",
        config.path_map.len(),
        config.param_map.len(),
        config.drop_params.len(),
        config.extra_allow.len(),
        config.model_routes.len()
    );
    info!(
        "disable_streaming={}, default_headers={} 项",
        config.disable_streaming,
        config.default_headers.len()
    );
}
