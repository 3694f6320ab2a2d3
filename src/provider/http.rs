use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use super::ProviderError;

/// 发送请求并按故障分类解析 JSON 响应
///
/// 401/403 视为凭证失效；超时、连接错误、5xx、429 以及其他非成功状态
/// 都视为暂时不可用。
pub(super) async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
) -> Result<T, ProviderError> {
    let resp = request.send().await.map_err(|e| {
        if e.is_timeout() {
            ProviderError::Unavailable("request timed out".to_string())
        } else {
            ProviderError::Unavailable(format!("request failed: {}", e))
        }
    })?;

    let status = resp.status();
    if let Some(err) = classify_status(status) {
        let body = resp.text().await.unwrap_or_default();
        tracing::debug!("Provider responded {}: {}", status, body);
        return Err(err);
    }

    resp.json::<T>()
        .await
        .map_err(|e| ProviderError::Unavailable(format!("malformed response: {}", e)))
}

pub(super) fn classify_status(status: StatusCode) -> Option<ProviderError> {
    if status.is_success() {
        return None;
    }
    Some(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::CredentialInvalid,
        other => ProviderError::Unavailable(format!("upstream status {}", other)),
    })
}

/// 拼接基础地址和路径，避免重复的斜杠
pub(super) fn endpoint(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
