//! 请求头构造
//!
//! 先放入用户配置的附加头，再无条件写入 Authorization，
//! 保证认证头永远胜过同名的用户头。

use std::collections::HashMap;

use http::{
    HeaderMap,
    header::{AUTHORIZATION, HeaderName, HeaderValue},
};

use crate::{config::AuthType, error::AdapterError};

/// 构造出站请求头：附加头 + 认证头
pub fn build_headers(
    auth_type: AuthType,
    token: &str,
    default_headers: &HashMap<String, String>,
) -> Result<HeaderMap, AdapterError> {
    let mut headers = HeaderMap::with_capacity(default_headers.len() + 1);

    for (name, value) in default_headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| AdapterError::translation(format!("invalid header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| AdapterError::translation(format!("invalid header value for {name}: {e}")))?;
        headers.insert(name, value);
    }

    // 认证头最后写入，覆盖任何同名附加头
    let auth_value = HeaderValue::from_str(&auth_type.header_value(token))
        .map_err(|e| AdapterError::translation(format!("token not usable in a header: {e}")))?;
    headers.insert(AUTHORIZATION, auth_value);

    Ok(headers)
}
